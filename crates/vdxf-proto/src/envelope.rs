//! Signed transport envelope around one or more ordinal objects.
//!
//! # Wire Layout
//!
//! ```text
//! version:VarInt  flags:VarInt
//! [signature:VerifiableSignatureData]  if SIGNED
//! [createdAt:VarInt]                   if HAS_CREATED_AT
//! [salt:var-slice]                     if HAS_SALT
//! [extension]                          if HAS_EXTENSION
//! details: OrdinalVdxfObject, or count:CompactSize + objects if MULTI_DETAILS
//! ```
//!
//! [`GenericRequest`] and [`GenericResponse`] are the same envelope with an
//! extension slot filled: a shielded response address for requests, the
//! originating request's hash for responses. The plain [`GenericEnvelope`]
//! has no extension and rejects `HAS_EXTENSION` at decode.
//!
//! # Signing
//!
//! [`Envelope::raw_data_sha256`] hashes the envelope's own encoding with the
//! signature omitted (flags unchanged), so the signature never covers itself.
//! [`Envelope::signing_hash`] folds that digest into the signature's identity
//! hash, which is what the identity actually signs.

use std::fmt;

use bitflags::bitflags;
use bytes::Bytes;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    buffer::{Reader, Writer, var_slice_len},
    errors::{ProtocolError, Result},
    hash,
    ordinal::OrdinalVdxfObject,
    record::{DecodeContext, FlaggedRecord, WireValue, check_known_bits, required},
    sapling::SaplingPaymentAddress,
    serde_helpers::{biguint_dec, hex_bytes, hex_bytes_opt, u64_dec_opt},
    signature::VerifiableSignatureData,
    varint,
};

bitflags! {
    /// Optional-field bits of an [`Envelope`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EnvelopeFlags: u32 {
        /// Signature present
        const SIGNED = 0x01;
        /// Creation time present
        const HAS_CREATED_AT = 0x02;
        /// Details are count-prefixed
        const MULTI_DETAILS = 0x04;
        /// Intended for a test network
        const IS_TESTNET = 0x08;
        /// Salt present
        const HAS_SALT = 0x10;
        /// Extension present
        const HAS_EXTENSION = 0x20;
    }
}

/// Record carried in an envelope's extension slot.
pub trait EnvelopeExtension:
    WireValue + Clone + PartialEq + fmt::Debug + Serialize + for<'de> Deserialize<'de>
{
    /// Whether this envelope type accepts `HAS_EXTENSION` at all.
    const SUPPORTED: bool = true;
}

/// Extension type of an envelope that has none. Uninhabited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoExtension {}

impl WireValue for NoExtension {
    fn byte_length(&self) -> Result<usize> {
        match *self {}
    }

    fn write(&self, _writer: &mut Writer) -> Result<()> {
        match *self {}
    }

    fn read(_reader: &mut Reader<'_>, _ctx: &DecodeContext<'_>) -> Result<Self> {
        Err(ProtocolError::UnknownFlags {
            field: "envelope.flags",
            bits: u64::from(EnvelopeFlags::HAS_EXTENSION.bits()),
        })
    }
}

impl EnvelopeExtension for NoExtension {
    const SUPPORTED: bool = false;
}

/// Request extension: where to send the encrypted response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestExtension {
    /// Shielded response address (43 raw bytes on the wire)
    pub response_address: SaplingPaymentAddress,
}

impl WireValue for RequestExtension {
    fn byte_length(&self) -> Result<usize> {
        Ok(SaplingPaymentAddress::LEN)
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_slice(self.response_address.as_bytes())
    }

    fn read(reader: &mut Reader<'_>, _ctx: &DecodeContext<'_>) -> Result<Self> {
        Ok(Self { response_address: SaplingPaymentAddress::new(reader.read_array()?) })
    }
}

impl EnvelopeExtension for RequestExtension {}

/// Response extension: the hash of the request being answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseExtension {
    /// Hash type of `request_hash`
    #[serde(with = "biguint_dec")]
    pub request_hash_type: BigUint,
    /// Request hash
    #[serde(with = "hex_bytes")]
    pub request_hash: Bytes,
}

impl WireValue for ResponseExtension {
    fn byte_length(&self) -> Result<usize> {
        Ok(varint::varint_len(&self.request_hash_type) + var_slice_len(self.request_hash.len()))
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_varint(&self.request_hash_type)?;
        writer.write_var_slice(&self.request_hash)
    }

    fn read(reader: &mut Reader<'_>, _ctx: &DecodeContext<'_>) -> Result<Self> {
        let request_hash_type = reader.read_varint()?;
        let request_hash = Bytes::copy_from_slice(reader.read_var_slice()?);
        Ok(Self { request_hash_type, request_hash })
    }
}

impl EnvelopeExtension for ResponseExtension {}

/// Envelope with no extension.
pub type GenericEnvelope = Envelope<NoExtension>;

/// Envelope carrying a request.
pub type GenericRequest = Envelope<RequestExtension>;

/// Envelope carrying a response.
pub type GenericResponse = Envelope<ResponseExtension>;

/// Transport wrapper: version, flags, optional signature, details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "X: EnvelopeExtension")]
pub struct Envelope<X> {
    /// Envelope version
    #[serde(with = "biguint_dec")]
    pub version: BigUint,
    /// Stored flags
    pub flags: EnvelopeFlags,
    /// Signature over the envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<VerifiableSignatureData>,
    /// Creation time, seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none", with = "u64_dec_opt")]
    pub created_at: Option<u64>,
    /// Salt making otherwise identical envelopes hash differently
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub salt: Option<Bytes>,
    /// Extension record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<X>,
    /// Payloads, at least one
    pub details: Vec<OrdinalVdxfObject>,
}

impl<X: EnvelopeExtension> Envelope<X> {
    /// Version written by [`Envelope::new`].
    pub const VERSION_CURRENT: u64 = 1;

    /// Lowest version [`WireValue::read`] accepts.
    pub const VERSION_FIRST: u64 = 1;

    /// Highest version [`WireValue::read`] accepts.
    pub const VERSION_LAST: u64 = 1;

    /// Unsigned envelope around `details`.
    pub fn new(details: Vec<OrdinalVdxfObject>) -> Self {
        let mut envelope = Self {
            version: BigUint::from(Self::VERSION_CURRENT),
            flags: EnvelopeFlags::empty(),
            signature: None,
            created_at: None,
            salt: None,
            extension: None,
            details,
        };
        envelope.set_flags();
        envelope
    }

    /// Attach a creation time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = Some(created_at);
        self.set_flags();
        self
    }

    /// Attach a salt.
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<Bytes>) -> Self {
        self.salt = Some(salt.into());
        self.set_flags();
        self
    }

    /// Attach the extension record.
    #[must_use]
    pub fn with_extension(mut self, extension: X) -> Self {
        self.extension = Some(extension);
        self.set_flags();
        self
    }

    /// Mark as intended for a test network.
    #[must_use]
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.flags.set(EnvelopeFlags::IS_TESTNET, testnet);
        self
    }

    /// Attach a signature.
    #[must_use]
    pub fn with_signature(mut self, signature: VerifiableSignatureData) -> Self {
        self.signature = Some(signature);
        self.set_flags();
        self
    }

    /// Whether the envelope targets a test network.
    pub const fn is_testnet(&self) -> bool {
        self.flags.contains(EnvelopeFlags::IS_TESTNET)
    }

    /// SHA-256 of the encoding, with or without the signature.
    pub fn raw_data_sha256(&self, include_sig: bool) -> Result<[u8; 32]> {
        let mut writer = Writer::with_exact_len(self.encoded_len(include_sig)?);
        self.write_fields(&mut writer, include_sig)?;
        Ok(hash::sha256(&writer.finish()?))
    }

    /// Digest the signing identity signs for this envelope.
    pub fn signing_hash(&self) -> Result<[u8; 32]> {
        let signature = required(self.signature.as_ref(), "signature")?;
        signature.identity_hash(&self.raw_data_sha256(false)?)
    }

    fn check_details(&self) -> Result<()> {
        match self.details.len() {
            0 => Err(ProtocolError::EmptyDetails),
            1 if self.flags.contains(EnvelopeFlags::MULTI_DETAILS) => Err(single_multi_detail()),
            1 => Ok(()),
            _ if self.flags.contains(EnvelopeFlags::MULTI_DETAILS) => Ok(()),
            _ => Err(ProtocolError::InconsistentFlags {
                field: "envelope.flags",
                reason: "several details without MULTI_DETAILS",
            }),
        }
    }

    fn encoded_len(&self, include_sig: bool) -> Result<usize> {
        self.check_details()?;

        let mut len = varint::varint_len(&self.version)
            + varint::varint_len_u64(u64::from(self.flags.bits()));

        if self.flags.contains(EnvelopeFlags::SIGNED) {
            let signature = required(self.signature.as_ref(), "signature")?;
            if include_sig {
                len += signature.byte_length()?;
            }
        }
        if self.flags.contains(EnvelopeFlags::HAS_CREATED_AT) {
            len += varint::varint_len_u64(*required(self.created_at.as_ref(), "createdAt")?);
        }
        if self.flags.contains(EnvelopeFlags::HAS_SALT) {
            len += var_slice_len(required(self.salt.as_ref(), "salt")?.len());
        }
        if self.flags.contains(EnvelopeFlags::HAS_EXTENSION) {
            len += required(self.extension.as_ref(), "extension")?.byte_length()?;
        }

        if self.flags.contains(EnvelopeFlags::MULTI_DETAILS) {
            len += varint::compact_size_len(self.details.len() as u64);
        }
        for detail in &self.details {
            len += detail.byte_length()?;
        }
        Ok(len)
    }

    fn write_fields(&self, writer: &mut Writer, include_sig: bool) -> Result<()> {
        self.check_details()?;

        writer.write_varint(&self.version)?;
        writer.write_varint_u64(u64::from(self.flags.bits()))?;

        if self.flags.contains(EnvelopeFlags::SIGNED) {
            let signature = required(self.signature.as_ref(), "signature")?;
            if include_sig {
                signature.write(writer)?;
            }
        }
        if self.flags.contains(EnvelopeFlags::HAS_CREATED_AT) {
            writer.write_varint_u64(*required(self.created_at.as_ref(), "createdAt")?)?;
        }
        if self.flags.contains(EnvelopeFlags::HAS_SALT) {
            writer.write_var_slice(required(self.salt.as_ref(), "salt")?)?;
        }
        if self.flags.contains(EnvelopeFlags::HAS_EXTENSION) {
            required(self.extension.as_ref(), "extension")?.write(writer)?;
        }

        if self.flags.contains(EnvelopeFlags::MULTI_DETAILS) {
            writer.write_compact_size(self.details.len() as u64)?;
        }
        for detail in &self.details {
            detail.write(writer)?;
        }
        Ok(())
    }

    fn known_flags() -> EnvelopeFlags {
        if X::SUPPORTED {
            EnvelopeFlags::all()
        } else {
            EnvelopeFlags::all().difference(EnvelopeFlags::HAS_EXTENSION)
        }
    }
}

impl<X: EnvelopeExtension> FlaggedRecord for Envelope<X> {
    type Flags = EnvelopeFlags;

    fn flags(&self) -> EnvelopeFlags {
        self.flags
    }

    fn calc_flags(&self) -> EnvelopeFlags {
        let mut flags = self.flags & EnvelopeFlags::IS_TESTNET;
        flags.set(EnvelopeFlags::SIGNED, self.signature.is_some());
        flags.set(EnvelopeFlags::HAS_CREATED_AT, self.created_at.is_some());
        flags.set(EnvelopeFlags::MULTI_DETAILS, self.details.len() > 1);
        flags.set(EnvelopeFlags::HAS_SALT, self.salt.is_some());
        flags.set(EnvelopeFlags::HAS_EXTENSION, self.extension.is_some());
        flags
    }

    fn set_flags(&mut self) {
        self.flags = self.calc_flags();
    }
}

impl<X: EnvelopeExtension> WireValue for Envelope<X> {
    fn byte_length(&self) -> Result<usize> {
        self.encoded_len(true)
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        self.write_fields(writer, true)
    }

    fn read(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Self> {
        let version = reader.read_varint()?;
        let supported = BigUint::from(Self::VERSION_FIRST)..=BigUint::from(Self::VERSION_LAST);
        if !supported.contains(&version) {
            return Err(ProtocolError::UnsupportedVersion {
                field: "envelope.version",
                version: version.to_string(),
            });
        }

        let bits = reader.read_varint_u32("envelope.flags")?;
        check_known_bits("envelope.flags", bits, Self::known_flags().bits())?;
        let flags = EnvelopeFlags::from_bits_retain(bits);

        let signature = if flags.contains(EnvelopeFlags::SIGNED) {
            Some(VerifiableSignatureData::read(reader, ctx)?)
        } else {
            None
        };
        let created_at = if flags.contains(EnvelopeFlags::HAS_CREATED_AT) {
            Some(reader.read_varint_u64("createdAt")?)
        } else {
            None
        };
        let salt = if flags.contains(EnvelopeFlags::HAS_SALT) {
            Some(Bytes::copy_from_slice(reader.read_var_slice()?))
        } else {
            None
        };
        let extension = if flags.contains(EnvelopeFlags::HAS_EXTENSION) {
            Some(X::read(reader, ctx)?)
        } else {
            None
        };

        let details = if flags.contains(EnvelopeFlags::MULTI_DETAILS) {
            let count = reader.read_compact_size()?;
            match count {
                0 => return Err(ProtocolError::EmptyDetails),
                1 => return Err(single_multi_detail()),
                _ => {},
            }
            // Every detail takes at least three bytes.
            let capacity =
                usize::try_from(count).unwrap_or(usize::MAX).min(reader.remaining() / 3);
            let mut details = Vec::with_capacity(capacity);
            for _ in 0..count {
                details.push(OrdinalVdxfObject::read(reader, ctx)?);
            }
            details
        } else {
            vec![OrdinalVdxfObject::read(reader, ctx)?]
        };

        Ok(Self { version, flags, signature, created_at, salt, extension, details })
    }
}

const fn single_multi_detail() -> ProtocolError {
    ProtocolError::InconsistentFlags {
        field: "envelope.flags",
        reason: "MULTI_DETAILS with a single detail",
    }
}
