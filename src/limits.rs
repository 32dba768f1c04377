//! Resource safety envelope: configurable bounds consulted at every boundary.

/// Resource limits consulted by every Writer/Reader operation before it
/// touches the buffer. A value of `0` disables that particular limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Total encoded bytes, checked on growth and on read framing.
    pub max_message_size: usize,
    /// Nesting levels (struct / map / composite sequence).
    pub max_depth: usize,
    /// Per-string byte length.
    pub max_string_length: usize,
    /// Per-bytes-value byte length.
    pub max_bytes_length: usize,
    /// Sequence/array element count.
    pub max_array_length: usize,
    /// Map entry count.
    pub max_map_size: usize,
    /// Unknown field on decode becomes `Error::UnknownField` instead of being skipped.
    pub strict_mode: bool,
    /// Validate that string bytes are well-formed UTF-8.
    pub validate_utf8: bool,
    /// Skip zero-valued struct fields on encode.
    pub omit_empty: bool,
    /// Sort map keys before emission so logically-equal maps encode identically.
    pub deterministic: bool,
}

impl Limits {
    /// Permissive defaults suited to trusted input.
    pub const fn default_limits() -> Self {
        Self {
            max_message_size: 64 * 1024 * 1024,
            max_depth: 100,
            max_string_length: 10 * 1024 * 1024,
            max_bytes_length: 100 * 1024 * 1024,
            max_array_length: 1_000_000,
            max_map_size: 1_000_000,
            strict_mode: false,
            validate_utf8: true,
            omit_empty: true,
            deterministic: true,
        }
    }

    /// Conservative bounds suited to untrusted input.
    pub const fn secure() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            max_depth: 32,
            max_string_length: 1024 * 1024,
            max_bytes_length: 10 * 1024 * 1024,
            max_array_length: 10_000,
            max_map_size: 10_000,
            strict_mode: false,
            validate_utf8: true,
            omit_empty: true,
            deterministic: true,
        }
    }

    pub fn with_max_message_size(mut self, v: usize) -> Self {
        self.max_message_size = v;
        self
    }

    pub fn with_max_depth(mut self, v: usize) -> Self {
        self.max_depth = v;
        self
    }

    pub fn with_max_string_length(mut self, v: usize) -> Self {
        self.max_string_length = v;
        self
    }

    pub fn with_max_bytes_length(mut self, v: usize) -> Self {
        self.max_bytes_length = v;
        self
    }

    pub fn with_max_array_length(mut self, v: usize) -> Self {
        self.max_array_length = v;
        self
    }

    pub fn with_max_map_size(mut self, v: usize) -> Self {
        self.max_map_size = v;
        self
    }

    pub fn with_strict_mode(mut self, v: bool) -> Self {
        self.strict_mode = v;
        self
    }

    pub fn with_validate_utf8(mut self, v: bool) -> Self {
        self.validate_utf8 = v;
        self
    }

    pub fn with_omit_empty(mut self, v: bool) -> Self {
        self.omit_empty = v;
        self
    }

    pub fn with_deterministic(mut self, v: bool) -> Self {
        self.deterministic = v;
        self
    }

    /// Checks `value` against `limit`; `limit == 0` means unlimited.
    pub(crate) fn check(limit: usize, value: usize) -> bool {
        limit == 0 || value <= limit
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::default_limits()
    }
}
