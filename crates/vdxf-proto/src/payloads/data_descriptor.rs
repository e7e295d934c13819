//! Self-describing data blob with optional encryption material.
//!
//! # Wire Layout
//!
//! ```text
//! version:VarInt  flags:VarInt  objectdata:var-slice
//! [salt:var-slice]      if HAS_SALT
//! [epk:var-slice]       if HAS_EPK
//! [ivk:var-slice]       if HAS_IVK
//! [ssk:var-slice]       if HAS_SSK
//! [label:var-string]    if HAS_LABEL
//! [mimeType:var-string] if HAS_MIME_TYPE
//! ```
//!
//! `ENCRYPTED_DATA` is a marker bit with no field of its own.

use bitflags::bitflags;
use bytes::Bytes;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    buffer::{Reader, Writer, var_slice_len},
    errors::Result,
    record::{DecodeContext, FlaggedRecord, WireValue, check_known_bits, required},
    serde_helpers::{biguint_dec, hex_bytes, hex_bytes_opt},
    varint,
};

bitflags! {
    /// Optional-field bits of a [`DataDescriptor`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DataDescriptorFlags: u32 {
        /// `objectdata` is ciphertext
        const ENCRYPTED_DATA = 0x01;
        /// Salt present
        const HAS_SALT = 0x02;
        /// Ephemeral public key present
        const HAS_EPK = 0x04;
        /// Incoming viewing key present
        const HAS_IVK = 0x08;
        /// Symmetric session key present
        const HAS_SSK = 0x10;
        /// Label present
        const HAS_LABEL = 0x20;
        /// MIME type present
        const HAS_MIME_TYPE = 0x40;
    }
}

impl Default for DataDescriptorFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Data blob plus the metadata needed to interpret or decrypt it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDescriptor {
    /// Record version
    #[serde(with = "biguint_dec")]
    pub version: BigUint,
    /// Stored flags
    pub flags: DataDescriptorFlags,
    /// Payload bytes (plaintext or ciphertext)
    #[serde(with = "hex_bytes")]
    pub objectdata: Bytes,
    /// Encryption salt
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub salt: Option<Bytes>,
    /// Ephemeral public key
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub epk: Option<Bytes>,
    /// Incoming viewing key
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub ivk: Option<Bytes>,
    /// Symmetric session key
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub ssk: Option<Bytes>,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// MIME type of `objectdata`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl DataDescriptor {
    /// Version written by [`DataDescriptor::new`].
    pub const VERSION_CURRENT: u64 = 1;

    /// Longest label kept by [`DataDescriptor::with_label`], in bytes.
    pub const MAX_LABEL_LEN: usize = 64;

    /// Longest MIME type kept by [`DataDescriptor::with_mime_type`], in bytes.
    pub const MAX_MIME_TYPE_LEN: usize = 128;

    /// Plain descriptor around `objectdata`, flags empty.
    pub fn new(objectdata: impl Into<Bytes>) -> Self {
        Self {
            version: BigUint::from(Self::VERSION_CURRENT),
            flags: DataDescriptorFlags::empty(),
            objectdata: objectdata.into(),
            salt: None,
            epk: None,
            ivk: None,
            ssk: None,
            label: None,
            mime_type: None,
        }
    }

    /// Set the label, truncated to [`Self::MAX_LABEL_LEN`] bytes.
    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(truncate_utf8(label, Self::MAX_LABEL_LEN).to_owned());
        self.set_flags();
        self
    }

    /// Set the MIME type, truncated to [`Self::MAX_MIME_TYPE_LEN`] bytes.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(truncate_utf8(mime_type, Self::MAX_MIME_TYPE_LEN).to_owned());
        self.set_flags();
        self
    }

    /// Mark `objectdata` as ciphertext and attach its key material.
    #[must_use]
    pub fn with_encryption(
        mut self,
        salt: Option<Bytes>,
        epk: Option<Bytes>,
        ivk: Option<Bytes>,
        ssk: Option<Bytes>,
    ) -> Self {
        self.flags |= DataDescriptorFlags::ENCRYPTED_DATA;
        self.salt = salt;
        self.epk = epk;
        self.ivk = ivk;
        self.ssk = ssk;
        self.set_flags();
        self
    }

    /// Whether `objectdata` is ciphertext.
    pub const fn is_encrypted(&self) -> bool {
        self.flags.contains(DataDescriptorFlags::ENCRYPTED_DATA)
    }

    fn optional_slices(&self) -> [(DataDescriptorFlags, Option<&Bytes>, &'static str); 4] {
        [
            (DataDescriptorFlags::HAS_SALT, self.salt.as_ref(), "salt"),
            (DataDescriptorFlags::HAS_EPK, self.epk.as_ref(), "epk"),
            (DataDescriptorFlags::HAS_IVK, self.ivk.as_ref(), "ivk"),
            (DataDescriptorFlags::HAS_SSK, self.ssk.as_ref(), "ssk"),
        ]
    }

    fn optional_strings(&self) -> [(DataDescriptorFlags, Option<&String>, &'static str); 2] {
        [
            (DataDescriptorFlags::HAS_LABEL, self.label.as_ref(), "label"),
            (DataDescriptorFlags::HAS_MIME_TYPE, self.mime_type.as_ref(), "mimeType"),
        ]
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl FlaggedRecord for DataDescriptor {
    type Flags = DataDescriptorFlags;

    fn flags(&self) -> DataDescriptorFlags {
        self.flags
    }

    fn calc_flags(&self) -> DataDescriptorFlags {
        let mut flags = self.flags & DataDescriptorFlags::ENCRYPTED_DATA;
        flags.set(DataDescriptorFlags::HAS_SALT, self.salt.is_some());
        flags.set(DataDescriptorFlags::HAS_EPK, self.epk.is_some());
        flags.set(DataDescriptorFlags::HAS_IVK, self.ivk.is_some());
        flags.set(DataDescriptorFlags::HAS_SSK, self.ssk.is_some());
        flags.set(DataDescriptorFlags::HAS_LABEL, self.label.is_some());
        flags.set(DataDescriptorFlags::HAS_MIME_TYPE, self.mime_type.is_some());
        flags
    }

    fn set_flags(&mut self) {
        self.flags = self.calc_flags();
    }
}

impl WireValue for DataDescriptor {
    fn byte_length(&self) -> Result<usize> {
        let mut len = varint::varint_len(&self.version)
            + varint::varint_len_u64(u64::from(self.flags.bits()))
            + var_slice_len(self.objectdata.len());

        for (bit, value, field) in self.optional_slices() {
            if self.flags.contains(bit) {
                len += var_slice_len(required(value, field)?.len());
            }
        }
        for (bit, value, field) in self.optional_strings() {
            if self.flags.contains(bit) {
                len += var_slice_len(required(value, field)?.len());
            }
        }
        Ok(len)
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_varint(&self.version)?;
        writer.write_varint_u64(u64::from(self.flags.bits()))?;
        writer.write_var_slice(&self.objectdata)?;

        for (bit, value, field) in self.optional_slices() {
            if self.flags.contains(bit) {
                writer.write_var_slice(required(value, field)?)?;
            }
        }
        for (bit, value, field) in self.optional_strings() {
            if self.flags.contains(bit) {
                writer.write_string(required(value, field)?)?;
            }
        }
        Ok(())
    }

    fn read(reader: &mut Reader<'_>, _ctx: &DecodeContext<'_>) -> Result<Self> {
        let version = reader.read_varint()?;
        let bits = reader.read_varint_u32("flags")?;
        check_known_bits("flags", bits, DataDescriptorFlags::all().bits())?;
        let flags = DataDescriptorFlags::from_bits_retain(bits);

        let objectdata = Bytes::copy_from_slice(reader.read_var_slice()?);

        let mut read_slice = |bit| -> Result<Option<Bytes>> {
            if flags.contains(bit) {
                Ok(Some(Bytes::copy_from_slice(reader.read_var_slice()?)))
            } else {
                Ok(None)
            }
        };
        let salt = read_slice(DataDescriptorFlags::HAS_SALT)?;
        let epk = read_slice(DataDescriptorFlags::HAS_EPK)?;
        let ivk = read_slice(DataDescriptorFlags::HAS_IVK)?;
        let ssk = read_slice(DataDescriptorFlags::HAS_SSK)?;

        let label = if flags.contains(DataDescriptorFlags::HAS_LABEL) {
            Some(reader.read_string("label")?)
        } else {
            None
        };
        let mime_type = if flags.contains(DataDescriptorFlags::HAS_MIME_TYPE) {
            Some(reader.read_string("mimeType")?)
        } else {
            None
        };

        Ok(Self { version, flags, objectdata, salt, epk, ivk, ssk, label, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::errors::ProtocolError;

    fn decode(bytes: &[u8]) -> Result<DataDescriptor> {
        DataDescriptor::from_bytes(bytes, &DecodeContext::default())
    }

    #[test]
    fn objectdata_only() {
        let descriptor = DataDescriptor::new(Bytes::from_static(&hex!("deadbeef")));
        assert_eq!(descriptor.flags, DataDescriptorFlags::empty());

        let bytes = descriptor.to_bytes().unwrap();
        assert_eq!(&bytes[..], hex!("01 00 04 deadbeef"));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.objectdata.as_ref(), hex!("deadbeef"));
        assert_eq!(decoded, descriptor);
    }

    #[test]
    fn label_sets_its_bit() {
        let descriptor = DataDescriptor::new(Bytes::new()).with_label("hello");
        assert_eq!(descriptor.flags, DataDescriptorFlags::HAS_LABEL);

        let bytes = descriptor.to_bytes().unwrap();
        assert_eq!(&bytes[..], hex!("01 20 00 05 68656c6c6f"));
        assert_eq!(decode(&bytes).unwrap().label.as_deref(), Some("hello"));
    }

    #[test]
    fn fields_follow_bit_order() {
        let descriptor = DataDescriptor::new(Bytes::from_static(b"x"))
            .with_mime_type("text/plain")
            .with_label("l")
            .with_encryption(
                Some(Bytes::from_static(b"s")),
                None,
                None,
                Some(Bytes::from_static(b"k")),
            );

        assert_eq!(descriptor.flags.bits(), 0x01 | 0x02 | 0x10 | 0x20 | 0x40);
        let bytes = descriptor.to_bytes().unwrap();
        // salt, ssk, label, mime in ascending bit order after objectdata
        assert_eq!(&bytes[..6], hex!("01 73 01 78 01 73"));
        assert_eq!(decode(&bytes).unwrap(), descriptor);
    }

    #[test]
    fn label_and_mime_are_truncated_at_construction() {
        let long = "é".repeat(40);
        let descriptor =
            DataDescriptor::new(Bytes::new()).with_label(&long).with_mime_type(&"m".repeat(200));

        let label = descriptor.label.as_deref().unwrap();
        assert_eq!(label.len(), 64);
        assert!(long.starts_with(label));
        assert_eq!(descriptor.mime_type.as_deref().unwrap().len(), 128);
    }

    #[test]
    fn decode_does_not_truncate() {
        let mut descriptor = DataDescriptor::new(Bytes::new());
        descriptor.label = Some("l".repeat(100));
        descriptor.set_flags();

        let decoded = decode(&descriptor.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.label.unwrap().len(), 100);
    }

    #[test]
    fn set_flag_without_value_is_fatal() {
        let mut descriptor = DataDescriptor::new(Bytes::new());
        descriptor.flags = DataDescriptorFlags::HAS_MIME_TYPE;

        assert_eq!(descriptor.byte_length(), Err(ProtocolError::MissingField("mimeType")));
        assert_eq!(descriptor.to_bytes(), Err(ProtocolError::MissingField("mimeType")));
    }

    #[test]
    fn unset_flag_omits_value() {
        let mut descriptor = DataDescriptor::new(Bytes::new());
        descriptor.label = Some("ignored".to_string());

        assert!(!descriptor.flags_in_sync());
        assert_eq!(&descriptor.to_bytes().unwrap()[..], hex!("01 00 00"));
    }

    #[test]
    fn unknown_flag_bits_rejected() {
        assert_eq!(
            decode(&hex!("01 80 00 00")),
            Err(ProtocolError::UnknownFlags { field: "flags", bits: 0x80 })
        );
    }

    #[test]
    fn truncated_optional_field() {
        let err = decode(&hex!("01 20 00 05 6865")).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }

    #[test]
    fn json_omits_absent_fields() {
        let descriptor =
            DataDescriptor::new(Bytes::from_static(&hex!("deadbeef"))).with_label("hi");
        let json = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(json["version"], "1");
        assert_eq!(json["objectdata"], "deadbeef");
        assert_eq!(json["label"], "hi");
        assert!(json.get("mimeType").is_none());
        assert!(json.get("salt").is_none());

        let back: DataDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, descriptor);
    }

    fn arb_bytes() -> impl Strategy<Value = Option<Bytes>> {
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..40).prop_map(Bytes::from))
    }

    prop_compose! {
        fn arb_descriptor()(
            objectdata in proptest::collection::vec(any::<u8>(), 0..300),
            encrypted in any::<bool>(),
            salt in arb_bytes(),
            epk in arb_bytes(),
            ivk in arb_bytes(),
            ssk in arb_bytes(),
            label in proptest::option::of("[ -~]{0,64}"),
            mime_type in proptest::option::of("[a-z]{1,10}/[a-z]{1,10}"),
        ) -> DataDescriptor {
            let mut descriptor = DataDescriptor {
                flags: if encrypted {
                    DataDescriptorFlags::ENCRYPTED_DATA
                } else {
                    DataDescriptorFlags::empty()
                },
                salt,
                epk,
                ivk,
                ssk,
                label,
                mime_type,
                ..DataDescriptor::new(objectdata)
            };
            descriptor.set_flags();
            descriptor
        }
    }

    proptest! {
        #[test]
        fn round_trip(descriptor in arb_descriptor()) {
            let bytes = descriptor.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), descriptor.byte_length().unwrap());
            prop_assert_eq!(decode(&bytes).unwrap(), descriptor);
        }

        #[test]
        fn flags_are_a_fixed_point(mut descriptor in arb_descriptor()) {
            let before = descriptor.calc_flags();
            descriptor.set_flags();
            prop_assert_eq!(descriptor.calc_flags(), before);
            prop_assert!(descriptor.flags_in_sync());
        }
    }
}
