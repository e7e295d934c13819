//! Payload types carried by ordinal objects.
//!
//! [`PayloadKind`] is what the registry binds to a key; [`VdxfData`] is the
//! decoded value. Adding a payload type means adding a variant to both and a
//! match arm in [`VdxfData::decode`]; the compiler finds the rest.

pub mod app_encryption;
pub mod data_descriptor;

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use app_encryption::{AppEncryptionFlags, AppEncryptionRequestDetails};
pub use data_descriptor::{DataDescriptor, DataDescriptorFlags};

use crate::{
    buffer::Writer,
    errors::{ProtocolError, Result},
    record::{DecodeContext, WireValue},
    serde_helpers::hex_bytes,
};

/// Decoder a registry entry resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadKind {
    /// [`DataDescriptor`]
    DataDescriptor,
    /// UTF-8 text, no inner framing
    Utf8String,
    /// Opaque bytes; also the holder for unresolved keys
    Bytes,
    /// [`AppEncryptionRequestDetails`]
    AppEncryptionRequest,
}

impl PayloadKind {
    /// Stable name used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DataDescriptor => "dataDescriptor",
            Self::Utf8String => "utf8String",
            Self::Bytes => "bytes",
            Self::AppEncryptionRequest => "appEncryptionRequest",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded payload of an ordinal object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VdxfData {
    /// Data descriptor
    DataDescriptor(DataDescriptor),
    /// App encryption request
    AppEncryptionRequest(AppEncryptionRequestDetails),
    /// UTF-8 text
    Utf8String(String),
    /// Opaque bytes
    Bytes(#[serde(with = "hex_bytes")] Bytes),
}

impl VdxfData {
    /// Kind of this value.
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::DataDescriptor(_) => PayloadKind::DataDescriptor,
            Self::AppEncryptionRequest(_) => PayloadKind::AppEncryptionRequest,
            Self::Utf8String(_) => PayloadKind::Utf8String,
            Self::Bytes(_) => PayloadKind::Bytes,
        }
    }

    /// Encoded size, excluding the outer length prefix.
    pub fn byte_length(&self) -> Result<usize> {
        match self {
            Self::DataDescriptor(descriptor) => descriptor.byte_length(),
            Self::AppEncryptionRequest(details) => details.byte_length(),
            Self::Utf8String(text) => Ok(text.len()),
            Self::Bytes(bytes) => Ok(bytes.len()),
        }
    }

    /// Write the payload, excluding the outer length prefix.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        match self {
            Self::DataDescriptor(descriptor) => descriptor.write(writer),
            Self::AppEncryptionRequest(details) => details.write(writer),
            Self::Utf8String(text) => writer.write_slice(text.as_bytes()),
            Self::Bytes(bytes) => writer.write_slice(bytes),
        }
    }

    /// Standalone encoding of the payload.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = Writer::with_exact_len(self.byte_length()?);
        self.write(&mut writer)?;
        writer.finish()
    }

    /// Decode `bytes` as a payload of `kind`. The whole slice must be used.
    pub fn decode(kind: PayloadKind, bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<Self> {
        match kind {
            PayloadKind::DataDescriptor => {
                DataDescriptor::from_bytes(bytes, ctx).map(Self::DataDescriptor)
            },
            PayloadKind::AppEncryptionRequest => {
                AppEncryptionRequestDetails::from_bytes(bytes, ctx).map(Self::AppEncryptionRequest)
            },
            PayloadKind::Utf8String => std::str::from_utf8(bytes)
                .map(|text| Self::Utf8String(text.to_owned()))
                .map_err(|_| ProtocolError::InvalidUtf8 { field: "data" }),
            PayloadKind::Bytes => Ok(Self::Bytes(Bytes::copy_from_slice(bytes))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_dispatches_on_kind() {
        let ctx = DecodeContext::default();
        let descriptor = DataDescriptor::new(Bytes::from_static(b"abc"));
        let bytes = descriptor.to_bytes().unwrap();

        let typed = VdxfData::decode(PayloadKind::DataDescriptor, &bytes, &ctx).unwrap();
        assert_eq!(typed, VdxfData::DataDescriptor(descriptor));

        let raw = VdxfData::decode(PayloadKind::Bytes, &bytes, &ctx).unwrap();
        assert_eq!(raw.kind(), PayloadKind::Bytes);
        assert_eq!(raw.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn strings_must_be_utf8() {
        let ctx = DecodeContext::default();
        assert_eq!(
            VdxfData::decode(PayloadKind::Utf8String, &[0xff, 0xfe], &ctx),
            Err(ProtocolError::InvalidUtf8 { field: "data" })
        );
        assert_eq!(
            VdxfData::decode(PayloadKind::Utf8String, "héllo".as_bytes(), &ctx).unwrap(),
            VdxfData::Utf8String("héllo".to_string())
        );
    }

    #[test]
    fn typed_payload_rejects_trailing_bytes() {
        let ctx = DecodeContext::default();
        let err = VdxfData::decode(PayloadKind::DataDescriptor, &[0x01, 0x00, 0x00, 0xff], &ctx);
        assert_eq!(err, Err(ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn json_is_externally_tagged() {
        let json = serde_json::to_value(VdxfData::Bytes(Bytes::from_static(&[0xab]))).unwrap();
        assert_eq!(json, serde_json::json!({ "bytes": "ab" }));
    }
}
