//! Shared conventions for wire records.
//!
//! [`WireValue`] is the measure-then-write contract every record implements.
//! [`FlaggedRecord`] is the optional-field convention: one flags field, one
//! bit per optional field, and `calc_flags` derived purely from which fields
//! are present. [`DecodeContext`] carries what a decoder cannot learn from the
//! bytes alone.

use std::fmt;

use bytes::Bytes;

use crate::{
    buffer::{Reader, Writer},
    errors::{ProtocolError, Result},
    registry::Registry,
};

/// Decode-time context.
///
/// The registry resolves ordinals; the root system name resolves names that
/// were stored relative to it; `optimize_with_ordinal` asks ordinal objects
/// carrying an inline key to normalise into their compact ordinal form.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'r> {
    registry: &'r Registry,
    root_system_name: Option<&'r str>,
    optimize_with_ordinal: bool,
}

impl<'r> DecodeContext<'r> {
    /// Context resolving ordinals through `registry`, with no root system and
    /// no ordinal optimisation.
    pub const fn new(registry: &'r Registry) -> Self {
        Self { registry, root_system_name: None, optimize_with_ordinal: false }
    }

    /// Supply the root system names are relative to.
    #[must_use]
    pub const fn with_root_system_name(mut self, name: &'r str) -> Self {
        self.root_system_name = Some(name);
        self
    }

    /// Enable or disable substituting registered ordinals for inline keys.
    #[must_use]
    pub const fn optimize_with_ordinal(mut self, enabled: bool) -> Self {
        self.optimize_with_ordinal = enabled;
        self
    }

    /// Registry used for ordinal lookups.
    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Root system name, if supplied.
    pub const fn root_system_name(&self) -> Option<&'r str> {
        self.root_system_name
    }

    /// Whether inline keys should be replaced by registered ordinals.
    pub const fn optimizes_with_ordinal(&self) -> bool {
        self.optimize_with_ordinal
    }
}

impl Default for DecodeContext<'static> {
    fn default() -> Self {
        Self::new(Registry::empty())
    }
}

/// A value with a byte-exact wire encoding.
///
/// `byte_length` must equal the number of bytes `write` produces. The
/// provided `to_bytes` allocates exactly that much and fails if the two ever
/// disagree, so no caller ever receives truncated output.
pub trait WireValue: Sized {
    /// Exact encoded size.
    fn byte_length(&self) -> Result<usize>;

    /// Write the encoding.
    fn write(&self, writer: &mut Writer) -> Result<()>;

    /// Read one value from the reader's current position.
    fn read(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Self>;

    /// Measure, allocate, write.
    fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = Writer::with_exact_len(self.byte_length()?);
        self.write(&mut writer)?;
        writer.finish()
    }

    /// Decode a buffer holding exactly one value.
    fn from_bytes(bytes: &[u8], ctx: &DecodeContext<'_>) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let value = Self::read(&mut reader, ctx)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Record whose optional fields are announced by a flags bitmask.
///
/// Bits are tested in ascending order when measuring, writing and reading.
/// Bit assignments are wire format and never change once released.
pub trait FlaggedRecord {
    /// Flags type (a `bitflags` set).
    type Flags: Copy + Eq + fmt::Debug;

    /// Flags as currently stored.
    fn flags(&self) -> Self::Flags;

    /// Flags implied by the fields currently present.
    fn calc_flags(&self) -> Self::Flags;

    /// Store `calc_flags()`.
    fn set_flags(&mut self);

    /// True when stored flags match the present fields.
    fn flags_in_sync(&self) -> bool {
        self.flags() == self.calc_flags()
    }
}

/// Backing value of a flag-gated field, or `MissingField`.
pub(crate) fn required<'a, T>(value: Option<&'a T>, field: &'static str) -> Result<&'a T> {
    value.ok_or(ProtocolError::MissingField(field))
}

/// Check decoded flag bits against the bits a record defines.
pub(crate) fn check_known_bits(field: &'static str, bits: u32, known: u32) -> Result<()> {
    match bits & !known {
        0 => Ok(()),
        unknown => Err(ProtocolError::UnknownFlags { field, bits: u64::from(unknown) }),
    }
}
