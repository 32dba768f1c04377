//! Type registry for polymorphic (`TYPEREF`) encoding/decoding (§4.8).
//!
//! This is the low-level, concrete-Rust-type API: callers hand-write an
//! `Encoder<T>`/`Decoder<T>` pair per registered type, in the same style as
//! a struct's own hand-written encode/decode functions. [`crate::value`]'s
//! `Value`-tree translator is a separate, higher-level mechanism that
//! resolves polymorphic fields through a caller-supplied closure instead.
//!
//! Per §3's `TYPEREF` wire format, a polymorphic value is `varint(type_id)`
//! followed immediately by the concrete value's own encoding, with no
//! additional length wrap — which is also why an unknown/foreign
//! `TYPEREF` field cannot be structurally skipped (§4.3).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::types::{type_id_range, TypeId, WireType};
use crate::writer::Writer;

/// Encoder function type.
pub type Encoder<T> = fn(&mut Writer, &T) -> Result<()>;

/// Decoder function type.
pub type Decoder<T> = fn(&mut Reader) -> Result<T>;

type AnyEncoder = Box<dyn Fn(&mut Writer, &dyn Any) -> Result<()> + Send + Sync>;
type AnyDecoder = Box<dyn Fn(&mut Reader) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

struct TypeRegistration {
    name: String,
    encoder: AnyEncoder,
    decoder: AnyDecoder,
}

struct Inner {
    by_id: HashMap<TypeId, TypeRegistration>,
    by_name: HashMap<String, TypeId>,
    next_type_id: TypeId,
}

/// Registry manages type registrations for polymorphic encoding/decoding.
///
/// Shares one [`parking_lot::RwLock`]-guarded table across clones via `Arc`,
/// so a registry can be built once and handed to every thread that needs to
/// encode or decode polymorphic fields concurrently.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<Inner>>,
}

impl Registry {
    /// Creates a new empty registry. User type ids start at [`type_id_range::USER_START`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                by_id: HashMap::new(),
                by_name: HashMap::new(),
                next_type_id: type_id_range::USER_START,
            })),
        }
    }

    /// Registers a type, assigning the next free user type id automatically.
    pub fn register<T>(&self, name: &str, encoder: Encoder<T>, decoder: Decoder<T>) -> Result<TypeId>
    where
        T: 'static + Send + Sync,
    {
        let next = self.inner.read().next_type_id;
        self.register_with_id(name, next, encoder, decoder)
    }

    /// Registers a type under a specific id.
    pub fn register_with_id<T>(
        &self,
        name: &str,
        type_id: TypeId,
        encoder: Encoder<T>,
        decoder: Decoder<T>,
    ) -> Result<TypeId>
    where
        T: 'static + Send + Sync,
    {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(name) {
            return Err(Error::DuplicateType(name.to_string()));
        }
        if inner.by_id.contains_key(&type_id) {
            return Err(Error::DuplicateTypeId(type_id));
        }

        let name_owned = name.to_string();
        let any_encoder: AnyEncoder = Box::new(move |writer, value| {
            let typed = value
                .downcast_ref::<T>()
                .ok_or_else(|| Error::TypeMismatch(name_owned.clone()))?;
            encoder(writer, typed)
        });
        let any_decoder: AnyDecoder =
            Box::new(move |reader| Ok(Box::new(decoder(reader)?) as Box<dyn Any + Send + Sync>));

        inner.by_id.insert(
            type_id,
            TypeRegistration {
                name: name.to_string(),
                encoder: any_encoder,
                decoder: any_decoder,
            },
        );
        inner.by_name.insert(name.to_string(), type_id);
        if type_id >= inner.next_type_id {
            inner.next_type_id = type_id + 1;
        }
        Ok(type_id)
    }

    /// Looks up the type id registered for `name`.
    pub fn id_for(&self, name: &str) -> Result<TypeId> {
        self.inner
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnregisteredType(name.to_string()))
    }

    /// Looks up the type name registered for `type_id`.
    pub fn name_for(&self, type_id: TypeId) -> Result<String> {
        self.inner
            .read()
            .by_id
            .get(&type_id)
            .map(|r| r.name.clone())
            .ok_or(Error::UnknownType(type_id))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    pub fn is_registered_id(&self, type_id: TypeId) -> bool {
        self.inner.read().by_id.contains_key(&type_id)
    }

    /// Writes a struct field tagged `TYPEREF`: the field tag, the type id,
    /// then the concrete value's own encoding inline (no extra length wrap).
    pub fn encode_polymorphic<T>(
        &self,
        writer: &mut Writer,
        field_number: u32,
        name: &str,
        value: &T,
    ) -> Result<()>
    where
        T: 'static,
    {
        let type_id = self.id_for(name)?;
        writer.write_tag(field_number, WireType::TypeRef)?;
        writer.write_varint(type_id as u64)?;
        let inner = self.inner.read();
        let reg = inner
            .by_id
            .get(&type_id)
            .ok_or(Error::UnknownType(type_id))?;
        (reg.encoder)(writer, value)
    }

    /// Reads a `varint(type_id)` followed by the registered decoder's own
    /// parse of the inline value, returning the type's name and an
    /// `Any`-erased boxed value. The caller downcasts via [`materialize`][Self::materialize].
    pub fn decode_polymorphic(&self, reader: &mut Reader) -> Result<(String, Box<dyn Any + Send + Sync>)> {
        let type_id = reader.read_varint()? as TypeId;
        let inner = self.inner.read();
        let reg = inner
            .by_id
            .get(&type_id)
            .ok_or(Error::UnknownType(type_id))?;
        let value = (reg.decoder)(reader)?;
        Ok((reg.name.clone(), value))
    }

    /// Decodes a polymorphic value known to be of concrete type `T`,
    /// downcasting the `Any`-erased result (§4.8's `materialize`).
    pub fn materialize<T: 'static>(&self, reader: &mut Reader) -> Result<T> {
        let (name, any_value) = self.decode_polymorphic(reader)?;
        any_value
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| Error::TypeMismatch(name))
    }

    /// Clears all registrations.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_id.clear();
        inner.by_name.clear();
        inner.next_type_id = type_id_range::USER_START;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
