//! Three-way identity reference: fully qualified name, I-address or X-address.
//!
//! Wire layout: `version:VarInt`, `type:VarInt`, then either a var-string
//! (FQN) or a raw 20-byte hash (I/X). Attaching a root system with
//! [`CompactAddressObject::with_root_system_name`] drops a trailing
//! `.<root system>` from the name; the name is then written as stored. The
//! decoder keeps the name verbatim and records the root system it was given
//! so [`CompactAddressObject::qualified_name`] can put a stripped suffix back.
//! The same bytes therefore decode to different display names under different
//! roots, and always re-encode to themselves.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    address::{Address, Hash160, I_ADDR_VERSION, VdxfKey, X_ADDR_VERSION},
    buffer::{Reader, Writer, var_slice_len},
    errors::{ProtocolError, Result},
    hash,
    record::{DecodeContext, WireValue},
    serde_helpers::biguint_dec,
    varint,
};

/// Wire discriminator of a [`CompactAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum AddressType {
    /// Dotted name relative to a root system
    Fqn = 1,
    /// Identity address
    IAddress = 2,
    /// VDXF key / currency tag address
    XAddress = 3,
}

impl AddressType {
    /// Parse a wire discriminator.
    pub const fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Fqn),
            2 => Some(Self::IAddress),
            3 => Some(Self::XAddress),
            _ => None,
        }
    }

    /// Wire discriminator.
    pub const fn to_u64(self) -> u64 {
        self as u64
    }
}

/// Address payload, interpreted by its variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompactAddress {
    /// Name as given, e.g. `alice.vrsc@`
    Fqn(String),
    /// Identity hash
    IAddress(Hash160),
    /// Key hash
    XAddress(Hash160),
}

impl CompactAddress {
    /// Wire discriminator of this variant.
    pub const fn address_type(&self) -> AddressType {
        match self {
            Self::Fqn(_) => AddressType::Fqn,
            Self::IAddress(_) => AddressType::IAddress,
            Self::XAddress(_) => AddressType::XAddress,
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Fqn(_) => "fqn",
            Self::IAddress(_) => "i-address",
            Self::XAddress(_) => "x-address",
        }
    }
}

/// Identity reference with its resolution context.
///
/// `root_system_name` is decode-time context, never written to the wire. `namespace`
/// is in-memory context naming the identity an FQN key lives under when it is
/// turned into an X-address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CompactAddressObjectJson", into = "CompactAddressObjectJson")]
pub struct CompactAddressObject {
    /// Record version
    pub version: BigUint,
    /// Address payload
    pub address: CompactAddress,
    /// Root system names are relative to
    pub root_system_name: Option<String>,
    /// Namespace identity for key derivation
    pub namespace: Option<String>,
}

impl CompactAddressObject {
    /// Version written by the constructors.
    pub const VERSION_CURRENT: u64 = 1;

    /// Wrap an address with the current version and no context.
    pub fn new(address: CompactAddress) -> Self {
        Self {
            version: BigUint::from(Self::VERSION_CURRENT),
            address,
            root_system_name: None,
            namespace: None,
        }
    }

    /// FQN reference.
    pub fn fqn(name: impl Into<String>) -> Self {
        Self::new(CompactAddress::Fqn(name.into()))
    }

    /// I-address reference.
    pub fn i_address(hash: Hash160) -> Self {
        Self::new(CompactAddress::IAddress(hash))
    }

    /// X-address reference.
    pub fn x_address(hash: Hash160) -> Self {
        Self::new(CompactAddress::XAddress(hash))
    }

    /// Attach the root system, dropping a trailing `.<root>` from an FQN.
    #[must_use]
    pub fn with_root_system_name(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        if let CompactAddress::Fqn(name) = &mut self.address
            && let Some(short) = strip_root_suffix(name, &root)
        {
            *name = short;
        }
        self.root_system_name = Some(root);
        self
    }

    /// Attach the key namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn root(&self) -> Result<&str> {
        self.root_system_name.as_deref().ok_or(ProtocolError::MissingContext("rootSystemName"))
    }

    /// Name as it goes on the wire. `None` for hash variants.
    pub fn serialized_name(&self) -> Option<&str> {
        match &self.address {
            CompactAddress::Fqn(name) => Some(name),
            CompactAddress::IAddress(_) | CompactAddress::XAddress(_) => None,
        }
    }

    /// Display name with the root suffix restored.
    ///
    /// Needs the root system: without it a stripped name is ambiguous.
    pub fn qualified_name(&self) -> Result<String> {
        let CompactAddress::Fqn(name) = &self.address else {
            return Err(ProtocolError::UnsupportedConversion {
                from: self.address.label(),
                to: "fqn",
            });
        };
        let root = self.root()?;

        let (body, at) = match name.strip_suffix('@') {
            Some(body) => (body, "@"),
            None => (name.as_str(), ""),
        };
        let already_rooted = body.eq_ignore_ascii_case(root)
            || body.rsplit_once('.').is_some_and(|(_, last)| last.eq_ignore_ascii_case(root));

        if already_rooted { Ok(name.clone()) } else { Ok(format!("{body}.{root}{at}")) }
    }

    /// Identity hash this reference points at.
    pub fn to_i_address(&self) -> Result<Hash160> {
        match &self.address {
            CompactAddress::IAddress(hash) => Ok(*hash),
            CompactAddress::Fqn(name) => hash::fqn_to_id(name, self.root()?),
            CompactAddress::XAddress(_) => {
                Err(ProtocolError::UnsupportedConversion { from: "x-address", to: "i-address" })
            },
        }
    }

    /// Key hash this reference points at.
    ///
    /// An FQN is read as `namespace::name` when a namespace is attached,
    /// otherwise as a qualified key name in its own right.
    pub fn to_x_address(&self) -> Result<Hash160> {
        match &self.address {
            CompactAddress::XAddress(hash) => Ok(*hash),
            CompactAddress::Fqn(name) => {
                let root = self.root()?;
                let key = match &self.namespace {
                    Some(namespace) => {
                        VdxfKey::from_qualified_name(&format!("{namespace}::{name}"), root)?
                    },
                    None => VdxfKey::from_qualified_name(name, root)?,
                };
                Ok(*key.hash())
            },
            CompactAddress::IAddress(_) => {
                Err(ProtocolError::UnsupportedConversion { from: "i-address", to: "x-address" })
            },
        }
    }
}

/// `name` without a trailing `.<root>` (any case), keeping a trailing `@`.
///
/// `None` when there is no such suffix.
fn strip_root_suffix(name: &str, root: &str) -> Option<String> {
    let (body, at) = match name.strip_suffix('@') {
        Some(body) => (body, "@"),
        None => (name, ""),
    };
    match body.rsplit_once('.') {
        Some((stem, last)) if !stem.is_empty() && last.eq_ignore_ascii_case(root) => {
            Some(format!("{stem}{at}"))
        },
        _ => None,
    }
}

impl WireValue for CompactAddressObject {
    fn byte_length(&self) -> Result<usize> {
        let body = match &self.address {
            CompactAddress::Fqn(name) => var_slice_len(name.len()),
            CompactAddress::IAddress(_) | CompactAddress::XAddress(_) => Hash160::LEN,
        };
        Ok(varint::varint_len(&self.version)
            + varint::varint_len_u64(self.address.address_type().to_u64())
            + body)
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_varint(&self.version)?;
        writer.write_varint_u64(self.address.address_type().to_u64())?;
        match &self.address {
            CompactAddress::Fqn(name) => writer.write_string(name),
            CompactAddress::IAddress(hash) | CompactAddress::XAddress(hash) => {
                writer.write_slice(hash.as_bytes())
            },
        }
    }

    fn read(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Self> {
        let version = reader.read_varint()?;
        let raw_type = reader.read_varint_u64("type")?;
        let address_type = AddressType::from_u64(raw_type)
            .ok_or(ProtocolError::UnknownType { field: "type", value: raw_type })?;

        let address = match address_type {
            AddressType::Fqn => CompactAddress::Fqn(reader.read_string("address")?),
            AddressType::IAddress => CompactAddress::IAddress(Hash160::new(reader.read_array()?)),
            AddressType::XAddress => CompactAddress::XAddress(Hash160::new(reader.read_array()?)),
        };

        Ok(Self {
            version,
            address,
            root_system_name: ctx.root_system_name().map(str::to_owned),
            namespace: None,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompactAddressObjectJson {
    #[serde(with = "biguint_dec")]
    version: BigUint,
    #[serde(rename = "type")]
    address_type: AddressType,
    address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root_system_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

impl From<CompactAddressObject> for CompactAddressObjectJson {
    fn from(value: CompactAddressObject) -> Self {
        let address_type = value.address.address_type();
        let address = match value.address {
            CompactAddress::Fqn(name) => name,
            CompactAddress::IAddress(hash) => hash.to_address(I_ADDR_VERSION).to_base58check(),
            CompactAddress::XAddress(hash) => hash.to_address(X_ADDR_VERSION).to_base58check(),
        };
        Self {
            version: value.version,
            address_type,
            address,
            root_system_name: value.root_system_name,
            namespace: value.namespace,
        }
    }
}

impl TryFrom<CompactAddressObjectJson> for CompactAddressObject {
    type Error = ProtocolError;

    fn try_from(value: CompactAddressObjectJson) -> Result<Self> {
        let address = match value.address_type {
            AddressType::Fqn => CompactAddress::Fqn(value.address),
            AddressType::IAddress => CompactAddress::IAddress(
                Address::from_base58check(&value.address)?.expect_version(I_ADDR_VERSION)?,
            ),
            AddressType::XAddress => CompactAddress::XAddress(
                Address::from_base58check(&value.address)?.expect_version(X_ADDR_VERSION)?,
            ),
        };
        Ok(Self {
            version: value.version,
            address,
            root_system_name: value.root_system_name,
            namespace: value.namespace,
        })
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::ErrorKind;

    fn rooted() -> DecodeContext<'static> {
        DecodeContext::default().with_root_system_name("VRSC")
    }

    #[test]
    fn root_suffix_is_stripped_on_the_wire() {
        let object = CompactAddressObject::fqn("bob.vrsc").with_root_system_name("VRSC");
        let bytes = object.to_bytes().unwrap();
        assert_eq!(&bytes[..], hex!("01 01 03 626f62"));

        let decoded = CompactAddressObject::from_bytes(&bytes, &rooted()).unwrap();
        assert_eq!(decoded.address, CompactAddress::Fqn("bob".to_string()));
        assert_eq!(decoded.qualified_name().unwrap(), "bob.VRSC");
    }

    #[test]
    fn rooted_decode_keeps_qualified_names_verbatim() {
        let wire = hex!("01 01 08 626f622e76727363");
        let decoded = CompactAddressObject::from_bytes(&wire, &rooted()).unwrap();
        assert_eq!(decoded.address, CompactAddress::Fqn("bob.vrsc".to_string()));
        assert_eq!(decoded.root_system_name.as_deref(), Some("VRSC"));
        assert_eq!(decoded.qualified_name().unwrap(), "bob.vrsc");
        assert_eq!(&decoded.to_bytes().unwrap()[..], wire);
        assert_eq!(
            decoded.to_i_address().unwrap(),
            CompactAddressObject::fqn("bob").with_root_system_name("VRSC").to_i_address().unwrap()
        );
    }

    #[test]
    fn stripping_keeps_the_at_sign() {
        let object = CompactAddressObject::fqn("bob.VRSC@").with_root_system_name("vrsc");
        assert_eq!(object.serialized_name().unwrap(), "bob@");
        assert_eq!(object.address, CompactAddress::Fqn("bob@".to_string()));

        let other = CompactAddressObject::fqn("bob.other@").with_root_system_name("VRSC");
        assert_eq!(other.serialized_name().unwrap(), "bob.other@");

        let root_only = CompactAddressObject::fqn("VRSC").with_root_system_name("VRSC");
        assert_eq!(root_only.serialized_name().unwrap(), "VRSC");
    }

    #[test]
    fn display_name_requires_context() {
        let decoded =
            CompactAddressObject::from_bytes(&hex!("01 01 03 626f62"), &DecodeContext::default())
                .unwrap();
        assert_eq!(decoded.root_system_name, None);
        assert_eq!(decoded.qualified_name(), Err(ProtocolError::MissingContext("rootSystemName")));
        assert_eq!(decoded.to_i_address(), Err(ProtocolError::MissingContext("rootSystemName")));

        let decoded =
            CompactAddressObject::from_bytes(&hex!("01 01 03 626f62"), &rooted()).unwrap();
        assert_eq!(decoded.qualified_name().unwrap(), "bob.VRSC");
    }

    #[test]
    fn suffix_does_not_change_identity() {
        let long = CompactAddressObject::fqn("alice.vrsc").with_root_system_name("VRSC");
        let short = CompactAddressObject::fqn("alice").with_root_system_name("VRSC");
        assert_eq!(long.to_i_address().unwrap(), short.to_i_address().unwrap());
    }

    #[test]
    fn hash_variants_round_trip() {
        let hash = Hash160::new([0x11; 20]);
        let objects =
            [CompactAddressObject::i_address(hash), CompactAddressObject::x_address(hash)];
        for object in objects {
            let bytes = object.to_bytes().unwrap();
            assert_eq!(bytes.len(), 22);
            let decoded = CompactAddressObject::from_bytes(&bytes, &DecodeContext::default());
            assert_eq!(decoded.unwrap(), object);
        }
    }

    #[test]
    fn cross_conversions_are_unsupported() {
        let hash = Hash160::new([0x22; 20]);
        let x = CompactAddressObject::x_address(hash);
        let i = CompactAddressObject::i_address(hash);

        assert_eq!(x.to_i_address().unwrap_err().kind(), ErrorKind::UnsupportedConversion);
        assert_eq!(i.to_x_address().unwrap_err().kind(), ErrorKind::UnsupportedConversion);
        assert_eq!(i.to_i_address().unwrap(), hash);
        assert_eq!(x.to_x_address().unwrap(), hash);
    }

    #[test]
    fn namespace_scopes_key_derivation() {
        let plain =
            CompactAddressObject::fqn("vrsc::data.type.string").with_root_system_name("VRSC");
        let scoped = CompactAddressObject::fqn("data.type.string")
            .with_root_system_name("VRSC")
            .with_namespace("vrsc");
        assert_eq!(plain.to_x_address().unwrap(), scoped.to_x_address().unwrap());
    }

    #[test]
    fn unknown_type_is_schema_violation() {
        let err = CompactAddressObject::from_bytes(&hex!("01 07"), &DecodeContext::default())
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType { field: "type", value: 7 });
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert!(err.to_string().starts_with("Unknown type"));
    }

    #[test]
    fn truncated_hash_is_malformed() {
        let err = CompactAddressObject::from_bytes(&hex!("01 02 aabb"), &DecodeContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn json_uses_base58_for_hashes() {
        let object = CompactAddressObject::i_address(Hash160::new([5; 20]));
        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["version"], "1");
        assert_eq!(json["type"], 2);
        assert!(json["address"].as_str().unwrap().starts_with('i'));
        assert!(json.get("rootSystemName").is_none());

        let back: CompactAddressObject = serde_json::from_value(json).unwrap();
        assert_eq!(back, object);
    }

    fn arb_address() -> impl Strategy<Value = CompactAddress> {
        prop_oneof![
            "[a-z]{1,12}(\\.[a-z]{1,8})?".prop_map(CompactAddress::Fqn),
            any::<[u8; 20]>().prop_map(|b| CompactAddress::IAddress(Hash160::new(b))),
            any::<[u8; 20]>().prop_map(|b| CompactAddress::XAddress(Hash160::new(b))),
        ]
    }

    proptest! {
        #[test]
        fn length_matches_encoding(address in arb_address(), version in 0u64..1_000_000) {
            let mut object = CompactAddressObject::new(address);
            object.version = BigUint::from(version);
            let bytes = object.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), object.byte_length().unwrap());

            // No root on either side: nothing is stripped.
            let decoded =
                CompactAddressObject::from_bytes(&bytes, &DecodeContext::default()).unwrap();
            prop_assert_eq!(&decoded, &object);

            // A root at decode time never changes the bytes.
            let rooted_decode = CompactAddressObject::from_bytes(&bytes, &rooted()).unwrap();
            prop_assert_eq!(rooted_decode.to_bytes().unwrap(), bytes);
        }
    }
}
