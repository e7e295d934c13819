//! Opaque Sapling blobs.
//!
//! Shielded keys and addresses are produced and consumed by an external
//! bech32 codec (`zs...`). On the wire they are raw fixed-length bytes; this
//! crate only checks the length.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    errors::{ProtocolError, Result},
    serde_helpers::decode_hex,
};

/// Decoded Sapling payment address (43 bytes: diversifier + pk_d).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaplingPaymentAddress([u8; Self::LEN]);

impl SaplingPaymentAddress {
    /// Size in bytes.
    pub const LEN: usize = 43;

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice that must be exactly 43 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        bytes.try_into().map(Self).map_err(|_| ProtocolError::InvalidFixedLength {
            field: "saplingPaymentAddress",
            expected: Self::LEN,
            actual: bytes.len(),
        })
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Debug for SaplingPaymentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaplingPaymentAddress({})", hex::encode(self.0))
    }
}

impl Serialize for SaplingPaymentAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SaplingPaymentAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = decode_hex(&text).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}
