//! Request for an application-scoped encryption key.
//!
//! # Wire Layout
//!
//! ```text
//! version:VarInt  flags:VarInt
//! [requestId:CompactAddressObject]           if HAS_REQUEST_ID
//! [encryptResponseToAddress:43 bytes]        if HAS_ENCRYPT_RESPONSE_TO_ADDRESS
//! derivationNumber:VarInt
//! [derivationId:CompactAddressObject]        if HAS_DERIVATION_ID
//! ```
//!
//! `requestId` is how a response is correlated with its request; the envelope
//! carries no correlation state of its own.

use bitflags::bitflags;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    buffer::{Reader, Writer},
    compact_address::CompactAddressObject,
    errors::Result,
    record::{DecodeContext, FlaggedRecord, WireValue, check_known_bits, required},
    sapling::SaplingPaymentAddress,
    serde_helpers::{biguint_dec, u64_dec},
    varint,
};

bitflags! {
    /// Optional-field bits of an [`AppEncryptionRequestDetails`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AppEncryptionFlags: u32 {
        /// Request id present
        const HAS_REQUEST_ID = 0x01;
        /// Shielded response address present
        const HAS_ENCRYPT_RESPONSE_TO_ADDRESS = 0x02;
        /// Derivation identity present
        const HAS_DERIVATION_ID = 0x04;
    }
}

/// Ask a wallet to derive an encryption key for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEncryptionRequestDetails {
    /// Record version
    #[serde(with = "biguint_dec")]
    pub version: BigUint,
    /// Stored flags
    pub flags: AppEncryptionFlags,
    /// Correlation id echoed by the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<CompactAddressObject>,
    /// Shielded address the response is encrypted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt_response_to_address: Option<SaplingPaymentAddress>,
    /// Key derivation index
    #[serde(with = "u64_dec")]
    pub derivation_number: u64,
    /// Identity the key is derived under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_id: Option<CompactAddressObject>,
}

impl AppEncryptionRequestDetails {
    /// Version written by [`AppEncryptionRequestDetails::new`].
    pub const VERSION_CURRENT: u64 = 1;

    /// Request for derivation index `derivation_number`, no optional fields.
    pub fn new(derivation_number: u64) -> Self {
        Self {
            version: BigUint::from(Self::VERSION_CURRENT),
            flags: AppEncryptionFlags::empty(),
            request_id: None,
            encrypt_response_to_address: None,
            derivation_number,
            derivation_id: None,
        }
    }

    /// Attach a request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: CompactAddressObject) -> Self {
        self.request_id = Some(request_id);
        self.set_flags();
        self
    }

    /// Attach the shielded response address.
    #[must_use]
    pub fn with_response_address(mut self, address: SaplingPaymentAddress) -> Self {
        self.encrypt_response_to_address = Some(address);
        self.set_flags();
        self
    }

    /// Attach the derivation identity.
    #[must_use]
    pub fn with_derivation_id(mut self, derivation_id: CompactAddressObject) -> Self {
        self.derivation_id = Some(derivation_id);
        self.set_flags();
        self
    }
}

impl FlaggedRecord for AppEncryptionRequestDetails {
    type Flags = AppEncryptionFlags;

    fn flags(&self) -> AppEncryptionFlags {
        self.flags
    }

    fn calc_flags(&self) -> AppEncryptionFlags {
        let mut flags = AppEncryptionFlags::empty();
        flags.set(AppEncryptionFlags::HAS_REQUEST_ID, self.request_id.is_some());
        flags.set(
            AppEncryptionFlags::HAS_ENCRYPT_RESPONSE_TO_ADDRESS,
            self.encrypt_response_to_address.is_some(),
        );
        flags.set(AppEncryptionFlags::HAS_DERIVATION_ID, self.derivation_id.is_some());
        flags
    }

    fn set_flags(&mut self) {
        self.flags = self.calc_flags();
    }
}

impl WireValue for AppEncryptionRequestDetails {
    fn byte_length(&self) -> Result<usize> {
        let mut len = varint::varint_len(&self.version)
            + varint::varint_len_u64(u64::from(self.flags.bits()));

        if self.flags.contains(AppEncryptionFlags::HAS_REQUEST_ID) {
            len += required(self.request_id.as_ref(), "requestId")?.byte_length()?;
        }
        if self.flags.contains(AppEncryptionFlags::HAS_ENCRYPT_RESPONSE_TO_ADDRESS) {
            required(self.encrypt_response_to_address.as_ref(), "encryptResponseToAddress")?;
            len += SaplingPaymentAddress::LEN;
        }
        len += varint::varint_len_u64(self.derivation_number);
        if self.flags.contains(AppEncryptionFlags::HAS_DERIVATION_ID) {
            len += required(self.derivation_id.as_ref(), "derivationId")?.byte_length()?;
        }
        Ok(len)
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_varint(&self.version)?;
        writer.write_varint_u64(u64::from(self.flags.bits()))?;

        if self.flags.contains(AppEncryptionFlags::HAS_REQUEST_ID) {
            required(self.request_id.as_ref(), "requestId")?.write(writer)?;
        }
        if self.flags.contains(AppEncryptionFlags::HAS_ENCRYPT_RESPONSE_TO_ADDRESS) {
            let address =
                required(self.encrypt_response_to_address.as_ref(), "encryptResponseToAddress")?;
            writer.write_slice(address.as_bytes())?;
        }
        writer.write_varint_u64(self.derivation_number)?;
        if self.flags.contains(AppEncryptionFlags::HAS_DERIVATION_ID) {
            required(self.derivation_id.as_ref(), "derivationId")?.write(writer)?;
        }
        Ok(())
    }

    fn read(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Self> {
        let version = reader.read_varint()?;
        let bits = reader.read_varint_u32("flags")?;
        check_known_bits("flags", bits, AppEncryptionFlags::all().bits())?;
        let flags = AppEncryptionFlags::from_bits_retain(bits);

        let request_id = if flags.contains(AppEncryptionFlags::HAS_REQUEST_ID) {
            Some(CompactAddressObject::read(reader, ctx)?)
        } else {
            None
        };
        let encrypt_response_to_address =
            if flags.contains(AppEncryptionFlags::HAS_ENCRYPT_RESPONSE_TO_ADDRESS) {
                Some(SaplingPaymentAddress::new(reader.read_array()?))
            } else {
                None
            };
        let derivation_number = reader.read_varint_u64("derivationNumber")?;
        let derivation_id = if flags.contains(AppEncryptionFlags::HAS_DERIVATION_ID) {
            Some(CompactAddressObject::read(reader, ctx)?)
        } else {
            None
        };

        Ok(Self {
            version,
            flags,
            request_id,
            encrypt_response_to_address,
            derivation_number,
            derivation_id,
        })
    }
}
