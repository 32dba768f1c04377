//! Structural metadata: the runtime type-descriptor protocol the reflective
//! translator consumes, and its process-wide cache (§4.5).

use std::any::TypeId as StdTypeId;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::types::TypeId;

/// The kind of a value the translator knows how to encode/decode.
///
/// This is the concrete form of the "runtime type-descriptor protocol" in
/// §4.4: composites recurse through a boxed/`Arc`-shared `Kind` rather than
/// through compile-time generics, since there is no schema-compiler in this
/// crate to generate one descriptor per concrete type.
#[derive(Debug, Clone)]
pub enum Kind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Seq(Box<Kind>),
    Map(Box<Kind>, Box<Kind>),
    Struct(Arc<StructDescriptor>),
    Optional(Box<Kind>),
    Polymorphic,
}

impl Kind {
    /// True for the primitive kinds eligible for packed sequence encoding.
    pub fn is_packable(&self) -> bool {
        matches!(
            self,
            Kind::Bool
                | Kind::I8
                | Kind::U8
                | Kind::I16
                | Kind::U16
                | Kind::I32
                | Kind::U32
                | Kind::I64
                | Kind::U64
                | Kind::F32
                | Kind::F64
        )
    }

    /// True for the kinds the map-key constraint (§4.4) allows.
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            Kind::Bool
                | Kind::I8
                | Kind::U8
                | Kind::I16
                | Kind::U16
                | Kind::I32
                | Kind::U32
                | Kind::I64
                | Kind::U64
                | Kind::F32
                | Kind::F64
                | Kind::String
        )
    }

    /// True when a value of this kind needs the outer varint-byte-length
    /// wrap when written as a struct field (so an unknown-field skip can
    /// treat it generically as length-delimited `BYTES`). Strings and bytes
    /// already carry their own length prefix and don't need a second one;
    /// scalars use a fixed/varint wire type with no wrap at all.
    pub fn needs_length_wrap(&self) -> bool {
        match self {
            Kind::Struct(_) | Kind::Seq(_) | Kind::Map(_, _) => true,
            Kind::Optional(inner) => inner.needs_length_wrap(),
            _ => false,
        }
    }
}

/// Describes one field of a struct: its wire field number, source name,
/// kind, and presence policy.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub field_number: u32,
    pub name: String,
    pub kind: Kind,
    pub required: bool,
    pub omit_empty: bool,
}

/// Cached per-type structural metadata: field descriptors sorted by field
/// number, ready for ascending-order encode and O(log n) decode lookup.
#[derive(Debug, Clone, Default)]
pub struct StructDescriptor {
    pub name: String,
    fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    /// Field descriptors in ascending field-number order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by its wire field number (O(log n): fields are sorted).
    pub fn by_field_number(&self, field_number: u32) -> Option<&FieldDescriptor> {
        self.fields
            .binary_search_by_key(&field_number, |f| f.field_number)
            .ok()
            .map(|i| &self.fields[i])
    }
}

/// Builds a [`StructDescriptor`], assigning field numbers sequentially
/// (starting at 1) where the caller does not supply one explicitly, and
/// rejecting duplicate field numbers (§4.5 steps 1-6).
#[derive(Debug, Default)]
pub struct StructDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    next_auto: u32,
}

impl StructDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            next_auto: 1,
        }
    }

    /// Adds a field with an explicit field number.
    pub fn field(
        mut self,
        field_number: u32,
        name: impl Into<String>,
        kind: Kind,
        required: bool,
        omit_empty: bool,
    ) -> Self {
        self.next_auto = self.next_auto.max(field_number + 1);
        self.fields.push(FieldDescriptor {
            field_number,
            name: name.into(),
            kind,
            required,
            omit_empty,
        });
        self
    }

    /// Adds a field, assigning the next sequential field number automatically.
    pub fn auto_field(
        mut self,
        name: impl Into<String>,
        kind: Kind,
        required: bool,
        omit_empty: bool,
    ) -> Self {
        let field_number = self.next_auto;
        self.next_auto += 1;
        self.fields.push(FieldDescriptor {
            field_number,
            name: name.into(),
            kind,
            required,
            omit_empty,
        });
        self
    }

    /// Sorts fields by field number and rejects duplicates, per §4.5.
    pub fn build(mut self) -> Result<StructDescriptor> {
        self.fields.sort_by_key(|f| f.field_number);
        for pair in self.fields.windows(2) {
            if pair[0].field_number == pair[1].field_number {
                return Err(Error::DuplicateFieldNumber(pair[0].field_number));
            }
        }
        Ok(StructDescriptor {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// Process-wide, read-mostly cache of [`StructDescriptor`]s keyed by the
/// Rust type's `TypeId`. First encode/decode of a type builds and publishes
/// the descriptor; every later call hits the cache.
static DESCRIPTOR_CACHE: Lazy<DashMap<StdTypeId, Arc<StructDescriptor>>> =
    Lazy::new(DashMap::new);

/// Returns the cached descriptor for `T`, building and publishing it via
/// `build` on first use.
pub fn descriptor_for<T: 'static>(
    build: impl FnOnce() -> Result<StructDescriptor>,
) -> Result<Arc<StructDescriptor>> {
    let key = StdTypeId::of::<T>();
    if let Some(existing) = DESCRIPTOR_CACHE.get(&key) {
        return Ok(existing.clone());
    }
    let built = Arc::new(build()?);
    tracing::debug!(type_name = std::any::type_name::<T>(), "built struct descriptor");
    DESCRIPTOR_CACHE.insert(key, built.clone());
    Ok(built)
}

/// Clears the descriptor cache. Exposed for test isolation; a library
/// consumer never needs to call this.
#[cfg(test)]
pub(crate) fn clear_cache_for_tests() {
    DESCRIPTOR_CACHE.clear();
}

/// Reserved polymorphic type-id kept for documentation purposes only.
pub const NIL_TYPE_ID: TypeId = crate::types::type_id_range::NIL;

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing;

    #[test]
    fn builder_sorts_and_assigns_sequential_numbers() {
        let d = StructDescriptorBuilder::new("Thing")
            .auto_field("a", Kind::Bool, false, true)
            .auto_field("b", Kind::String, false, true)
            .build()
            .unwrap();
        assert_eq!(d.fields()[0].field_number, 1);
        assert_eq!(d.fields()[1].field_number, 2);
    }

    #[test]
    fn builder_rejects_duplicate_field_numbers() {
        let err = StructDescriptorBuilder::new("Thing")
            .field(1, "a", Kind::Bool, false, true)
            .field(1, "b", Kind::String, false, true)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFieldNumber(1)));
    }

    #[test]
    fn by_field_number_finds_sorted_fields() {
        let d = StructDescriptorBuilder::new("Thing")
            .field(5, "e", Kind::Bool, false, true)
            .field(1, "a", Kind::Bool, false, true)
            .build()
            .unwrap();
        assert_eq!(d.by_field_number(1).unwrap().name, "a");
        assert_eq!(d.by_field_number(5).unwrap().name, "e");
        assert!(d.by_field_number(2).is_none());
    }

    #[test]
    fn cache_reuses_descriptor_for_same_type() {
        clear_cache_for_tests();
        let mut calls = 0;
        let _ = descriptor_for::<Thing>(|| {
            calls += 1;
            StructDescriptorBuilder::new("Thing").build()
        })
        .unwrap();
        let _ = descriptor_for::<Thing>(|| {
            calls += 1;
            StructDescriptorBuilder::new("Thing").build()
        })
        .unwrap();
        assert_eq!(calls, 1);
    }
}
