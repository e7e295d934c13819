//! Identity signature bound to a system, identity and block height.
//!
//! # Wire Layout
//!
//! ```text
//! version:VarInt  flags:VarInt  signatureVersion:VarInt  hashType:VarInt
//! blockHeight:u32 LE
//! identityId:CompactAddressObject  systemId:CompactAddressObject
//! [vdxfKeys:array<20 bytes>]   if HAS_VDXF_KEYS
//! [boundHashes:vector]         if HAS_BOUND_HASHES
//! signature:var-slice
//! ```
//!
//! # Identity Hash
//!
//! The digest an identity signs is SHA-256 over the signed-data prefix, the
//! system id, the block height, the identity id and the payload hash. Two
//! orderings exist and both verify, selected by `signatureVersion`:
//!
//! - v1: prefix, system, height, identity, payload hash
//! - v2: system, height, identity, prefix, payload hash

use bitflags::bitflags;
use bytes::Bytes;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    address::{Hash160, VdxfKey},
    buffer::{Reader, Writer, array_len, var_slice_len, vector_len},
    compact_address::CompactAddressObject,
    errors::{ProtocolError, Result},
    record::{DecodeContext, FlaggedRecord, WireValue, check_known_bits, required},
    serde_helpers::{base64_bytes, biguint_dec, hex_bytes_vec_opt},
    varint,
};

/// Hash type code for SHA-256.
pub const HASH_TYPE_SHA256: u64 = 5;

/// Text every identity signature commits to, written as a var-slice.
pub const SIGNED_DATA_PREFIX: &str = "Verus signed data:\n";

bitflags! {
    /// Optional-field bits of a [`VerifiableSignatureData`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SignatureFlags: u32 {
        /// Signature commits to a list of VDXF keys
        const HAS_VDXF_KEYS = 0x01;
        /// Signature commits to extra hashes
        const HAS_BOUND_HASHES = 0x02;
    }
}

/// Signature by an identity, with everything needed to recompute its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableSignatureData {
    /// Record version
    #[serde(with = "biguint_dec")]
    pub version: BigUint,
    /// Stored flags
    pub flags: SignatureFlags,
    /// Selects the identity-hash ordering (1 or 2)
    pub signature_version: u64,
    /// Digest algorithm code
    #[serde(with = "biguint_dec")]
    pub hash_type: BigUint,
    /// Height the identity's keys are checked at
    pub block_height: u32,
    /// Signing identity
    pub identity_id: CompactAddressObject,
    /// Chain the identity lives on
    pub system_id: CompactAddressObject,
    /// Keys the signature commits to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vdxf_keys: Option<Vec<VdxfKey>>,
    /// Extra hashes the signature commits to
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_vec_opt")]
    pub bound_hashes: Option<Vec<Bytes>>,
    /// Raw signature bytes
    #[serde(with = "base64_bytes")]
    pub signature: Bytes,
}

impl VerifiableSignatureData {
    /// Version written by [`VerifiableSignatureData::new`].
    pub const VERSION_CURRENT: u64 = 1;

    /// Signature version written by [`VerifiableSignatureData::new`].
    pub const SIGNATURE_VERSION_CURRENT: u64 = 2;

    /// SHA-256 signature by `identity_id` on `system_id` at `block_height`.
    pub fn new(
        identity_id: CompactAddressObject,
        system_id: CompactAddressObject,
        block_height: u32,
        signature: impl Into<Bytes>,
    ) -> Self {
        Self {
            version: BigUint::from(Self::VERSION_CURRENT),
            flags: SignatureFlags::empty(),
            signature_version: Self::SIGNATURE_VERSION_CURRENT,
            hash_type: BigUint::from(HASH_TYPE_SHA256),
            block_height,
            identity_id,
            system_id,
            vdxf_keys: None,
            bound_hashes: None,
            signature: signature.into(),
        }
    }

    /// Digest the identity signs for a payload hashing to `payload_hash`.
    pub fn identity_hash(&self, payload_hash: &[u8; 32]) -> Result<[u8; 32]> {
        if self.hash_type != BigUint::from(HASH_TYPE_SHA256) {
            return Err(ProtocolError::UnsupportedHashType(self.hash_type.to_string()));
        }

        let system = self.system_id.to_i_address()?;
        let identity = self.identity_id.to_i_address()?;
        let prefix = signed_data_prefix()?;
        let height = self.block_height.to_le_bytes();

        let parts: [&[u8]; 5] = match self.signature_version {
            1 => [&prefix[..], system.as_bytes(), &height, identity.as_bytes(), payload_hash],
            2 => [system.as_bytes(), &height, identity.as_bytes(), &prefix[..], payload_hash],
            other => return Err(ProtocolError::UnsupportedSignatureVersion(other)),
        };

        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Ok(hasher.finalize().into())
    }

    fn key_hashes(keys: &[VdxfKey]) -> Vec<[u8; Hash160::LEN]> {
        keys.iter().map(|key| *key.hash().as_bytes()).collect()
    }
}

fn signed_data_prefix() -> Result<Bytes> {
    let mut writer = Writer::with_exact_len(var_slice_len(SIGNED_DATA_PREFIX.len()));
    writer.write_string(SIGNED_DATA_PREFIX)?;
    writer.finish()
}

impl FlaggedRecord for VerifiableSignatureData {
    type Flags = SignatureFlags;

    fn flags(&self) -> SignatureFlags {
        self.flags
    }

    fn calc_flags(&self) -> SignatureFlags {
        let mut flags = SignatureFlags::empty();
        flags.set(SignatureFlags::HAS_VDXF_KEYS, self.vdxf_keys.is_some());
        flags.set(SignatureFlags::HAS_BOUND_HASHES, self.bound_hashes.is_some());
        flags
    }

    fn set_flags(&mut self) {
        self.flags = self.calc_flags();
    }
}

impl WireValue for VerifiableSignatureData {
    fn byte_length(&self) -> Result<usize> {
        let mut len = varint::varint_len(&self.version)
            + varint::varint_len_u64(u64::from(self.flags.bits()))
            + varint::varint_len_u64(self.signature_version)
            + varint::varint_len(&self.hash_type)
            + 4
            + self.identity_id.byte_length()?
            + self.system_id.byte_length()?;

        if self.flags.contains(SignatureFlags::HAS_VDXF_KEYS) {
            let keys = required(self.vdxf_keys.as_ref(), "vdxfKeys")?;
            len += array_len(keys.len(), Hash160::LEN);
        }
        if self.flags.contains(SignatureFlags::HAS_BOUND_HASHES) {
            len += vector_len(required(self.bound_hashes.as_ref(), "boundHashes")?);
        }
        Ok(len + var_slice_len(self.signature.len()))
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_varint(&self.version)?;
        writer.write_varint_u64(u64::from(self.flags.bits()))?;
        writer.write_varint_u64(self.signature_version)?;
        writer.write_varint(&self.hash_type)?;
        writer.write_u32_le(self.block_height)?;
        self.identity_id.write(writer)?;
        self.system_id.write(writer)?;

        if self.flags.contains(SignatureFlags::HAS_VDXF_KEYS) {
            let keys = required(self.vdxf_keys.as_ref(), "vdxfKeys")?;
            writer.write_fixed_array(&Self::key_hashes(keys))?;
        }
        if self.flags.contains(SignatureFlags::HAS_BOUND_HASHES) {
            writer.write_vector(required(self.bound_hashes.as_ref(), "boundHashes")?)?;
        }
        writer.write_var_slice(&self.signature)
    }

    fn read(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Self> {
        let version = reader.read_varint()?;
        let bits = reader.read_varint_u32("signature.flags")?;
        check_known_bits("signature.flags", bits, SignatureFlags::all().bits())?;
        let flags = SignatureFlags::from_bits_retain(bits);

        let signature_version = reader.read_varint_u64("signatureVersion")?;
        let hash_type = reader.read_varint()?;
        let block_height = reader.read_u32_le()?;
        let identity_id = CompactAddressObject::read(reader, ctx)?;
        let system_id = CompactAddressObject::read(reader, ctx)?;

        let vdxf_keys = if flags.contains(SignatureFlags::HAS_VDXF_KEYS) {
            let hashes = reader.read_fixed_array::<{ Hash160::LEN }>()?;
            Some(hashes.into_iter().map(|h| VdxfKey::from_hash(Hash160::new(h))).collect())
        } else {
            None
        };
        let bound_hashes = if flags.contains(SignatureFlags::HAS_BOUND_HASHES) {
            Some(reader.read_vector()?.into_iter().map(Bytes::copy_from_slice).collect())
        } else {
            None
        };
        let signature = Bytes::copy_from_slice(reader.read_var_slice()?);

        Ok(Self {
            version,
            flags,
            signature_version,
            hash_type,
            block_height,
            identity_id,
            system_id,
            vdxf_keys,
            bound_hashes,
            signature,
        })
    }
}
