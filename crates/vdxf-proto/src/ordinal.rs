//! Ordinal-addressed VDXF objects.
//!
//! # Wire Layout
//!
//! ```text
//! type:CompactSize
//! [key:20 bytes]          if type == TYPE_KEY
//! [key:var-string]        if type == TYPE_KEY_STRING or TYPE_ID_OR_CURRENCY
//! version:VarInt
//! data:var-slice
//! ```
//!
//! Any `type` outside the three sentinels is an ordinal and must resolve
//! through the registry. Objects addressed by an inline key decode their data
//! as opaque bytes, since the key alone does not name a decoder. With
//! [`DecodeContext::optimize_with_ordinal`] set, an inline key that has a
//! registered ordinal is replaced by that ordinal and its data decoded by the
//! bound payload kind, so a self-describing object normalises into its
//! compact form.

use bytes::Bytes;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    address::{Hash160, VdxfKey},
    buffer::{Reader, Writer, var_slice_len},
    errors::{ProtocolError, Result},
    hash,
    payloads::{PayloadKind, VdxfData},
    record::{DecodeContext, WireValue},
    registry::Registry,
    serde_helpers::biguint_dec,
    varint,
};

/// Type sentinel: 160-bit key follows inline.
pub const TYPE_KEY: u64 = 102;

/// Type sentinel: qualified key name follows as a string.
pub const TYPE_KEY_STRING: u64 = 103;

/// Type sentinel: identity or currency name follows as a string.
pub const TYPE_ID_OR_CURRENCY: u64 = 104;

/// True if `value` is one of the inline-key sentinels.
pub const fn is_reserved_type(value: u64) -> bool {
    matches!(value, TYPE_KEY | TYPE_KEY_STRING | TYPE_ID_OR_CURRENCY)
}

/// How an object names its schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VdxfAddressing {
    /// Registered ordinal
    Ordinal(u64),
    /// Inline 160-bit key
    Key(VdxfKey),
    /// Inline qualified key name, e.g. `vrsc::data.type.string`
    KeyString(String),
    /// Inline identity or currency name
    IdOrCurrency(String),
}

impl VdxfAddressing {
    /// Value written in the `type` field.
    pub const fn wire_type(&self) -> u64 {
        match self {
            Self::Ordinal(ordinal) => *ordinal,
            Self::Key(_) => TYPE_KEY,
            Self::KeyString(_) => TYPE_KEY_STRING,
            Self::IdOrCurrency(_) => TYPE_ID_OR_CURRENCY,
        }
    }

    /// True unless addressed by ordinal.
    pub const fn is_inline(&self) -> bool {
        !matches!(self, Self::Ordinal(_))
    }

    /// Canonical key of an inline address.
    ///
    /// Names are hashed relative to `root_system_name`; without it only the
    /// raw key form can be resolved.
    pub fn resolve_key(&self, root_system_name: Option<&str>) -> Result<VdxfKey> {
        let root = || root_system_name.ok_or(ProtocolError::MissingContext("rootSystemName"));
        match self {
            Self::Key(key) => Ok(*key),
            Self::KeyString(name) => VdxfKey::from_qualified_name(name, root()?),
            Self::IdOrCurrency(name) => Ok(VdxfKey::from_hash(hash::fqn_to_id(name, root()?)?)),
            Self::Ordinal(_) => {
                Err(ProtocolError::UnsupportedConversion { from: "ordinal", to: "inline key" })
            },
        }
    }

    fn key_material_len(&self) -> usize {
        match self {
            Self::Ordinal(_) => 0,
            Self::Key(_) => Hash160::LEN,
            Self::KeyString(name) | Self::IdOrCurrency(name) => var_slice_len(name.len()),
        }
    }
}

/// Versioned payload addressed by ordinal or inline key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdinalVdxfObject {
    /// Object version
    #[serde(with = "biguint_dec")]
    pub version: BigUint,
    /// Schema address
    pub addressing: VdxfAddressing,
    /// Payload
    pub data: VdxfData,
}

impl OrdinalVdxfObject {
    /// Version written by the constructors.
    pub const VERSION_CURRENT: u64 = 1;

    /// Object at the current version.
    pub fn new(addressing: VdxfAddressing, data: VdxfData) -> Self {
        Self { version: BigUint::from(Self::VERSION_CURRENT), addressing, data }
    }

    /// Ordinal-addressed object.
    pub fn with_ordinal(ordinal: u64, data: VdxfData) -> Self {
        Self::new(VdxfAddressing::Ordinal(ordinal), data)
    }

    /// Object addressed by an inline 160-bit key.
    pub fn with_key(key: VdxfKey, data: VdxfData) -> Self {
        Self::new(VdxfAddressing::Key(key), data)
    }

    /// Raw bytes of an object addressed by an inline key.
    pub fn raw(key: VdxfKey, bytes: impl Into<Bytes>) -> Self {
        Self::with_key(key, VdxfData::Bytes(bytes.into()))
    }

    /// Replace an ordinal with the inline key it stands for.
    ///
    /// The decoded payload is kept as is.
    pub fn into_key_addressed(self, registry: &Registry) -> Result<Self> {
        match self.addressing {
            VdxfAddressing::Ordinal(ordinal) => {
                let entry = registry.resolve(ordinal)?;
                Ok(Self { addressing: VdxfAddressing::Key(entry.key), ..self })
            },
            _ => Ok(self),
        }
    }

    /// Replace an inline key with its registered ordinal.
    ///
    /// Opaque data is decoded by the kind bound to the ordinal. Fails with
    /// `UnregisteredKey` if the key has no ordinal.
    pub fn into_ordinal_addressed(self, ctx: &DecodeContext<'_>) -> Result<Self> {
        if !self.addressing.is_inline() {
            return Ok(self);
        }
        let key = self.addressing.resolve_key(ctx.root_system_name())?;
        let (ordinal, kind) = ctx
            .registry()
            .lookup_key(&key)
            .ok_or_else(|| ProtocolError::UnregisteredKey(key.to_string()))?;

        let data = if self.data.kind() == kind {
            self.data
        } else {
            VdxfData::decode(kind, &self.data.to_bytes()?, ctx)?
        };
        Ok(Self { version: self.version, addressing: VdxfAddressing::Ordinal(ordinal), data })
    }
}

impl WireValue for OrdinalVdxfObject {
    fn byte_length(&self) -> Result<usize> {
        Ok(varint::compact_size_len(self.addressing.wire_type())
            + self.addressing.key_material_len()
            + varint::varint_len(&self.version)
            + var_slice_len(self.data.byte_length()?))
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        if let VdxfAddressing::Ordinal(ordinal) = self.addressing
            && is_reserved_type(ordinal)
        {
            return Err(ProtocolError::ReservedOrdinal(ordinal));
        }

        writer.write_compact_size(self.addressing.wire_type())?;
        match &self.addressing {
            VdxfAddressing::Ordinal(_) => {},
            VdxfAddressing::Key(key) => writer.write_slice(key.hash().as_bytes())?,
            VdxfAddressing::KeyString(name) | VdxfAddressing::IdOrCurrency(name) => {
                writer.write_string(name)?;
            },
        }
        writer.write_varint(&self.version)?;
        writer.write_compact_size(self.data.byte_length()? as u64)?;
        self.data.write(writer)
    }

    fn read(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Self> {
        let addressing = match reader.read_compact_size()? {
            TYPE_KEY => {
                VdxfAddressing::Key(VdxfKey::from_hash(Hash160::new(reader.read_array()?)))
            },
            TYPE_KEY_STRING => VdxfAddressing::KeyString(reader.read_string("key")?),
            TYPE_ID_OR_CURRENCY => VdxfAddressing::IdOrCurrency(reader.read_string("key")?),
            ordinal => VdxfAddressing::Ordinal(ordinal),
        };
        let version = reader.read_varint()?;
        let payload = reader.read_var_slice()?;

        let (addressing, kind) = match addressing {
            VdxfAddressing::Ordinal(ordinal) => {
                let entry = ctx.registry().resolve(ordinal)?;
                (VdxfAddressing::Ordinal(ordinal), entry.kind)
            },
            inline if ctx.optimizes_with_ordinal() => {
                let key = inline.resolve_key(ctx.root_system_name())?;
                match ctx.registry().lookup_key(&key) {
                    Some((ordinal, kind)) => {
                        tracing::trace!(
                            ordinal,
                            key = %key,
                            kind = %kind,
                            "Substituting registered ordinal for inline key"
                        );
                        (VdxfAddressing::Ordinal(ordinal), kind)
                    },
                    None => (inline, PayloadKind::Bytes),
                }
            },
            inline => (inline, PayloadKind::Bytes),
        };

        let data = VdxfData::decode(kind, payload, ctx)?;
        Ok(Self { version, addressing, data })
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::{
        ErrorKind,
        payloads::DataDescriptor,
        registry::{RegistrationMode, global},
    };

    fn key(byte: u8) -> VdxfKey {
        VdxfKey::from_hash(Hash160::new([byte; 20]))
    }

    #[test]
    fn ordinal_object_layout() {
        let object = OrdinalVdxfObject::with_ordinal(1, VdxfData::Utf8String("hi".to_string()));
        let bytes = object.to_bytes().unwrap();
        assert_eq!(&bytes[..], hex!("01 01 02 6869"));

        let ctx = DecodeContext::new(global());
        assert_eq!(OrdinalVdxfObject::from_bytes(&bytes, &ctx).unwrap(), object);
    }

    #[test]
    fn inline_key_decodes_as_raw_bytes() {
        let object = OrdinalVdxfObject::raw(key(9), Bytes::new());
        let bytes = object.to_bytes().unwrap();
        assert_eq!(bytes.len(), 1 + 20 + 1 + 1);
        assert_eq!(bytes[0], 102);

        let decoded = OrdinalVdxfObject::from_bytes(&bytes, &DecodeContext::default()).unwrap();
        assert_eq!(decoded, object);
    }

    #[test]
    fn optimisation_substitutes_registered_ordinal() {
        let mut registry = Registry::new();
        registry.register(55, key(9), PayloadKind::Utf8String, RegistrationMode::Strict).unwrap();

        let object = OrdinalVdxfObject::raw(key(9), Bytes::from_static(b"text"));
        let bytes = object.to_bytes().unwrap();

        let plain = DecodeContext::new(&registry);
        let decoded = OrdinalVdxfObject::from_bytes(&bytes, &plain).unwrap();
        assert_eq!(decoded.addressing, VdxfAddressing::Key(key(9)));

        let optimised = DecodeContext::new(&registry).optimize_with_ordinal(true);
        let decoded = OrdinalVdxfObject::from_bytes(&bytes, &optimised).unwrap();
        assert_eq!(decoded.addressing, VdxfAddressing::Ordinal(55));
        assert_eq!(decoded.data, VdxfData::Utf8String("text".to_string()));
    }

    #[test]
    fn optimisation_leaves_unknown_keys_alone() {
        let bytes = OrdinalVdxfObject::raw(key(3), Bytes::from_static(b"x")).to_bytes().unwrap();
        let ctx = DecodeContext::new(global()).optimize_with_ordinal(true);
        let decoded = OrdinalVdxfObject::from_bytes(&bytes, &ctx).unwrap();
        assert_eq!(decoded.addressing, VdxfAddressing::Key(key(3)));
        assert_eq!(decoded.data, VdxfData::Bytes(Bytes::from_static(b"x")));
    }

    #[test]
    fn key_string_needs_root_to_optimise() {
        let object = OrdinalVdxfObject::new(
            VdxfAddressing::KeyString("vrsc::data.type.string".to_string()),
            VdxfData::Bytes(Bytes::from_static(b"hey")),
        );
        let bytes = object.to_bytes().unwrap();

        let without_root = DecodeContext::new(global()).optimize_with_ordinal(true);
        assert_eq!(
            OrdinalVdxfObject::from_bytes(&bytes, &without_root),
            Err(ProtocolError::MissingContext("rootSystemName"))
        );

        let with_root = without_root.with_root_system_name("VRSC");
        let decoded = OrdinalVdxfObject::from_bytes(&bytes, &with_root).unwrap();
        assert_eq!(decoded.addressing, VdxfAddressing::Ordinal(1));
        assert_eq!(decoded.data, VdxfData::Utf8String("hey".to_string()));
    }

    #[test]
    fn unregistered_ordinal_is_fatal() {
        let err = OrdinalVdxfObject::from_bytes(&hex!("37 01 00"), &DecodeContext::default())
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnregisteredOrdinal(55));
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[test]
    fn reserved_ordinal_cannot_be_encoded() {
        let object = OrdinalVdxfObject::with_ordinal(TYPE_KEY, VdxfData::Bytes(Bytes::new()));
        assert_eq!(object.to_bytes(), Err(ProtocolError::ReservedOrdinal(TYPE_KEY)));
    }

    #[test]
    fn addressing_conversions_are_inverse() {
        let ctx = DecodeContext::new(global());
        let descriptor = DataDescriptor::new(Bytes::from_static(b"abc")).with_label("x");
        let compact = OrdinalVdxfObject::with_ordinal(0, VdxfData::DataDescriptor(descriptor));

        let keyed = compact.clone().into_key_addressed(global()).unwrap();
        assert!(keyed.addressing.is_inline());
        assert_eq!(keyed.clone().into_ordinal_addressed(&ctx).unwrap(), compact);

        // Through the wire the keyed form loses its decoder, conversion restores it.
        let reread = OrdinalVdxfObject::from_bytes(&keyed.to_bytes().unwrap(), &ctx).unwrap();
        assert_eq!(reread.data.kind(), PayloadKind::Bytes);
        assert_eq!(reread.into_ordinal_addressed(&ctx).unwrap(), compact);
    }

    #[test]
    fn unknown_key_cannot_become_ordinal() {
        let ctx = DecodeContext::new(global());
        let err = OrdinalVdxfObject::raw(key(1), Bytes::new()).into_ordinal_addressed(&ctx);
        assert_eq!(err, Err(ProtocolError::UnregisteredKey(key(1).to_string())));
    }

    #[test]
    fn payload_length_prefix_is_enforced() {
        // ordinal 2 (bytes), version 1, length 5 but only 2 bytes follow
        let ctx = DecodeContext::new(global());
        let err = OrdinalVdxfObject::from_bytes(&hex!("02 01 05 aabb"), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }
}
