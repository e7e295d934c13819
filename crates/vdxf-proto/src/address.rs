//! 160-bit identifiers and their base58check text form.
//!
//! Every identity, currency and VDXF key is a 20-byte hash. The text form is
//! base58check over `version || hash`, where the version byte says how to
//! interpret the hash (identity or VDXF key).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    errors::{ProtocolError, Result},
    hash,
};

/// Version byte of identity addresses (`i...`).
pub const I_ADDR_VERSION: u8 = 102;

/// Version byte of VDXF key / currency tag addresses (`x...`).
pub const X_ADDR_VERSION: u8 = 137;

/// Raw 160-bit hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash160([u8; 20]);

impl Hash160 {
    /// Size in bytes.
    pub const LEN: usize = 20;

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice that must be exactly 20 bytes.
    pub fn from_slice(field: &'static str, bytes: &[u8]) -> Result<Self> {
        let array = bytes.try_into().map_err(|_| ProtocolError::InvalidFixedLength {
            field,
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Pair with a version byte.
    pub const fn to_address(self, version: u8) -> Address {
        Address::new(version, self)
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash160({})", hex::encode(self.0))
    }
}

/// Version byte plus 160-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    version: u8,
    hash: Hash160,
}

impl Address {
    /// Build from parts.
    pub const fn new(version: u8, hash: Hash160) -> Self {
        Self { version, hash }
    }

    /// Version byte.
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Hash bytes.
    pub const fn hash(&self) -> &Hash160 {
        &self.hash
    }

    /// Decode base58check text. Fails on a bad checksum or wrong length.
    pub fn from_base58check(text: &str) -> Result<Self> {
        let payload = bs58::decode(text)
            .with_check(None)
            .into_vec()
            .map_err(|e| ProtocolError::InvalidBase58(e.to_string()))?;

        let (version, hash) = payload
            .split_first()
            .ok_or_else(|| ProtocolError::InvalidBase58("empty payload".to_string()))?;

        Ok(Self { version: *version, hash: Hash160::from_slice("address", hash)? })
    }

    /// Encode as base58check text.
    pub fn to_base58check(&self) -> String {
        let mut payload = Vec::with_capacity(1 + Hash160::LEN);
        payload.push(self.version);
        payload.extend_from_slice(self.hash.as_bytes());
        bs58::encode(payload).with_check().into_string()
    }

    /// Hash, provided the version byte is `expected`.
    pub fn expect_version(&self, expected: u8) -> Result<Hash160> {
        if self.version != expected {
            return Err(ProtocolError::InvalidAddressVersion { expected, actual: self.version });
        }
        Ok(self.hash)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58check())
    }
}

impl FromStr for Address {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58check(s)
    }
}

/// Content-addressed 160-bit type identifier.
///
/// Derived by hashing a namespaced name such as
/// `vrsc::data.type.object.datadescriptor`. Displayed as an identity address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VdxfKey(Hash160);

impl VdxfKey {
    /// Wrap an already derived hash.
    pub const fn from_hash(hash: Hash160) -> Self {
        Self(hash)
    }

    /// Underlying hash.
    pub const fn hash(&self) -> &Hash160 {
        &self.0
    }

    /// Derive a key from `namespace::key.name`.
    ///
    /// The namespace resolves as an identity relative to `root_system_name`;
    /// the key name is hashed as a single component under it. A name with no
    /// `::` separator resolves as a plain identity name.
    pub fn from_qualified_name(name: &str, root_system_name: &str) -> Result<Self> {
        let id = match name.split_once("::") {
            Some((namespace, key)) => {
                if namespace.is_empty() || key.is_empty() {
                    return Err(ProtocolError::InvalidName(name.to_string()));
                }
                let namespace_id = hash::fqn_to_id(namespace, root_system_name)?;
                hash::name_to_id(key, Some(&namespace_id))
            },
            None => hash::fqn_to_id(name, root_system_name)?,
        };
        Ok(Self(id))
    }

    /// Text form of the key.
    pub fn to_address(&self) -> Address {
        self.0.to_address(I_ADDR_VERSION)
    }
}

impl fmt::Display for VdxfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_address(), f)
    }
}

impl FromStr for VdxfKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self(Address::from_base58check(s)?.expect_version(I_ADDR_VERSION)?))
    }
}

macro_rules! serde_via_str {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_via_str!(Address);
serde_via_str!(VdxfKey);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58check_round_trip() {
        let address = Hash160::new([7; 20]).to_address(I_ADDR_VERSION);
        let text = address.to_base58check();
        assert!(text.starts_with('i'));
        assert_eq!(Address::from_base58check(&text).unwrap(), address);
    }

    #[test]
    fn bad_checksum_is_malformed() {
        let mut text = Hash160::new([7; 20]).to_address(I_ADDR_VERSION).to_base58check();
        let last = text.pop().unwrap();
        text.push(if last == '1' { '2' } else { '1' });

        let err = Address::from_base58check(&text).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MalformedInput);
    }

    #[test]
    fn version_byte_is_checked() {
        let text = Hash160::new([1; 20]).to_address(X_ADDR_VERSION).to_string();
        assert_eq!(
            text.parse::<VdxfKey>(),
            Err(ProtocolError::InvalidAddressVersion {
                expected: I_ADDR_VERSION,
                actual: X_ADDR_VERSION
            })
        );
    }

    #[test]
    fn qualified_name_uses_namespace() {
        let a = VdxfKey::from_qualified_name("vrsc::data.type.string", "VRSC").unwrap();
        let b = VdxfKey::from_qualified_name("VRSC::data.type.string", "VRSC").unwrap();
        let c = VdxfKey::from_qualified_name("other::data.type.string", "VRSC").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(VdxfKey::from_qualified_name("::x", "VRSC").is_err());
    }

    #[test]
    fn key_json_is_base58() {
        let key = VdxfKey::from_hash(Hash160::new([9; 20]));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));
        assert_eq!(serde_json::from_str::<VdxfKey>(&json).unwrap(), key);
    }
}
