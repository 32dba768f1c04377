//! Error types for Cramberry operations.

use thiserror::Error;

/// Result type for Cramberry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Cramberry operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A varint's byte sequence could not be interpreted at all.
    #[error("invalid varint")]
    InvalidVarint,

    /// A varint's decoded magnitude does not fit in the target width.
    #[error("varint overflow")]
    VarintOverflow,

    /// A varint used more than the 10 bytes a 64-bit value can require.
    #[error("varint too long")]
    VarintTooLong,

    /// The buffer ended before a value could be fully read.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// A tag or skip-value byte named a wire type outside {0,1,2,5,6,7}.
    #[error("invalid wire type: {0}")]
    InvalidWireType(u8),

    /// A tag named field number 0, which is reserved for the end marker.
    #[error("invalid field number: {0}")]
    InvalidFieldNumber(u32),

    /// Decode-time registry miss: no type registered under this id.
    #[error("unknown type id: {0}")]
    UnknownType(u32),

    /// Encode-time registry miss: value's type was never registered.
    #[error("type not registered for encoding: {0}")]
    UnregisteredType(String),

    /// A registered encoder/decoder was invoked with the wrong concrete type.
    #[error("type mismatch for {0}")]
    TypeMismatch(String),

    /// Decode target was not an addressable pointer (API misuse).
    #[error("decode target is not a pointer")]
    NotPointer,

    /// Decode target pointer was nil (API misuse).
    #[error("decode target is nil")]
    NilPointer,

    /// Nesting depth exceeded `Limits::max_depth`.
    #[error("max depth exceeded: {limit}")]
    MaxDepthExceeded { limit: usize },

    /// Encoded message size exceeded `Limits::max_message_size`.
    #[error("max message size exceeded: {limit} bytes")]
    MaxSizeExceeded { limit: usize },

    /// A string exceeded `Limits::max_string_length`.
    #[error("max string length exceeded: {limit} bytes")]
    MaxStringLength { limit: usize },

    /// A bytes value exceeded `Limits::max_bytes_length`.
    #[error("max bytes length exceeded: {limit} bytes")]
    MaxBytesLength { limit: usize },

    /// A sequence exceeded `Limits::max_array_length`.
    #[error("max array length exceeded: {limit} elements")]
    MaxArrayLength { limit: usize },

    /// A map exceeded `Limits::max_map_size`.
    #[error("max map size exceeded: {limit} entries")]
    MaxMapSize { limit: usize },

    /// A string field's bytes were not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// The same type was registered twice.
    #[error("duplicate type registration: {0}")]
    DuplicateType(String),

    /// The same type id was registered to two different types.
    #[error("duplicate type id: {0}")]
    DuplicateTypeId(u32),

    /// A struct had two fields sharing the same field number.
    #[error("duplicate field number {0} in struct descriptor")]
    DuplicateFieldNumber(u32),

    /// `strict_mode` rejected a field number absent from the descriptor.
    #[error("unknown field {0} (strict mode)")]
    UnknownField(u32),

    /// A struct field marked `required` never appeared on the wire.
    #[error("required field missing: {0}")]
    RequiredFieldMissing(String),

    /// A length prefix decoded as negative (top bit set past sign boundary).
    #[error("negative length")]
    NegativeLength,

    /// An arithmetic computation over attacker-controlled sizes would overflow.
    #[error("size computation overflow")]
    Overflow,

    /// A map's key kind is not string/integer/float/bool.
    #[error("unsupported map key type")]
    UnsupportedMapKeyType,

    /// The writer had already taken an immutable view of its bytes.
    #[error("buffer is frozen")]
    FrozenBuffer,

    /// A zero-copy borrow was used after the originating Reader was reset.
    #[error("stale borrow: reader generation changed")]
    StaleBorrow,

    /// IO error from the streaming layer.
    #[error("IO error: {0}")]
    Io(String),

    /// Custom error message for consumer-defined failure paths.
    #[error("{0}")]
    Custom(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Coarse fault classification, per the taxonomy in the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Programming errors: never triggered by untrusted input alone.
    Fatal,
    /// Configuration-driven: a `Limits` bound was hit.
    LimitExceeded,
    /// Input-driven: malformed or schema-incompatible wire data.
    Protocol,
}

impl Error {
    /// Creates an "unexpected end of input" error.
    pub fn eof(needed: usize, available: usize) -> Self {
        Self::UnexpectedEof { needed, available }
    }

    /// Creates a custom error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Classifies this error per the Fatal / LimitExceeded / Protocol taxonomy.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Error::NotPointer
            | Error::NilPointer
            | Error::UnregisteredType(_)
            | Error::DuplicateType(_)
            | Error::DuplicateTypeId(_)
            | Error::DuplicateFieldNumber(_) => ErrorClass::Fatal,

            Error::MaxDepthExceeded { .. }
            | Error::MaxSizeExceeded { .. }
            | Error::MaxStringLength { .. }
            | Error::MaxBytesLength { .. }
            | Error::MaxArrayLength { .. }
            | Error::MaxMapSize { .. } => ErrorClass::LimitExceeded,

            _ => ErrorClass::Protocol,
        }
    }
}
