//! Error types for the VDXF wire format.
//!
//! Every variant is structured and names the offending field or value, so a
//! caller one layer up can reject a message precisely. [`ProtocolError::kind`]
//! projects each variant onto the four failure classes callers branch on.

use thiserror::Error;

/// Broad failure class of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bytes or text that cannot be decoded (short buffer, bad checksum, ...)
    MalformedInput,
    /// Structurally valid input that breaks a schema rule
    SchemaViolation,
    /// A conversion the value's variant cannot support
    UnsupportedConversion,
    /// Conflicting ordinal registration
    DuplicateRegistration,
}

/// Errors raised while encoding, decoding, converting or registering VDXF
/// values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // Malformed input
    /// Buffer ended before a field could be read
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the field required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// VarInt ran off the end of the buffer with the continuation bit set
    #[error("malformed varint: continuation bit set on final byte")]
    MalformedVarInt,

    /// CompactSize used a wider marker than the value needs
    #[error("non-canonical compact size encoding for value {0}")]
    NonCanonicalCompactSize(u64),

    /// Decoded integer does not fit the field's width
    #[error("value overflows field `{field}`")]
    ValueOverflow {
        /// Field being decoded
        field: &'static str,
    },

    /// Base58check text failed to decode or its checksum did not match
    #[error("invalid base58check: {0}")]
    InvalidBase58(String),

    /// Address carried an unexpected version byte
    #[error("invalid address version: expected {expected}, got {actual}")]
    InvalidAddressVersion {
        /// Version byte the caller required
        expected: u8,
        /// Version byte found
        actual: u8,
    },

    /// Text field is not valid UTF-8
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        /// Field being decoded
        field: &'static str,
    },

    /// Fixed-length blob had the wrong size
    #[error("field `{field}` must be {expected} bytes, got {actual}")]
    InvalidFixedLength {
        /// Field being decoded
        field: &'static str,
        /// Required length
        expected: usize,
        /// Length supplied
        actual: usize,
    },

    /// Hex text failed to decode
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Decoder finished with bytes left over
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    // Schema violations
    /// Discriminator value has no meaning for this field
    #[error("Unknown type for `{field}`: {value}")]
    UnknownType {
        /// Field holding the discriminator
        field: &'static str,
        /// Value found
        value: u64,
    },

    /// Ordinal is not bound in the registry
    #[error("unregistered ordinal: {0}")]
    UnregisteredOrdinal(u64),

    /// No ordinal is bound to the key
    #[error("no ordinal registered for key {0}")]
    UnregisteredKey(String),

    /// Ordinal collides with a reserved inline-key sentinel
    #[error("ordinal {0} is reserved for inline keys")]
    ReservedOrdinal(u64),

    /// A flag is set but its backing value is absent
    #[error("field `{0}` required but not provided")]
    MissingField(&'static str),

    /// Flags field carries bits with no defined meaning
    #[error("unknown bits in `{field}`: {bits:#x}")]
    UnknownFlags {
        /// Flags field being decoded
        field: &'static str,
        /// Offending bits
        bits: u64,
    },

    /// Record version outside the supported range
    #[error("unsupported version for `{field}`: {version}")]
    UnsupportedVersion {
        /// Record being decoded
        field: &'static str,
        /// Version found (decimal)
        version: String,
    },

    /// Hash type other than the ones the signature scheme defines
    #[error("unsupported hash type: {0}")]
    UnsupportedHashType(String),

    /// Signature version outside {1, 2}
    #[error("unsupported signature version: {0}")]
    UnsupportedSignatureVersion(u64),

    /// Operation needs decode-time context the caller did not supply
    #[error("missing context: {0}")]
    MissingContext(&'static str),

    /// Name cannot be resolved to an identity
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Stored flags disagree with a structural property of the record
    #[error("inconsistent `{field}`: {reason}")]
    InconsistentFlags {
        /// Flags field
        field: &'static str,
        /// What disagrees
        reason: &'static str,
    },

    /// Envelope carries no details
    #[error("envelope must carry at least one detail")]
    EmptyDetails,

    /// Measured length and written length disagree
    #[error("length mismatch: measured {expected} bytes, wrote {actual}")]
    LengthMismatch {
        /// Length computed by the measuring pass
        expected: usize,
        /// Length the writing pass produced or attempted
        actual: usize,
    },

    // Unsupported conversions
    /// Conversion not defined for this variant
    #[error("cannot convert {from} to {to}")]
    UnsupportedConversion {
        /// Source variant
        from: &'static str,
        /// Requested target
        to: &'static str,
    },

    // Registration
    /// Ordinal or key already bound to something else
    #[error("ordinal {ordinal} already bound to {existing}, refusing {attempted}")]
    DuplicateOrdinal {
        /// Ordinal being registered
        ordinal: u64,
        /// Key currently bound (base58check)
        existing: String,
        /// Key the caller tried to bind (base58check)
        attempted: String,
    },

    /// Key already bound to a different ordinal
    #[error("key {key} already bound to ordinal {existing}, refusing ordinal {attempted}")]
    DuplicateKey {
        /// Key being registered (base58check)
        key: String,
        /// Ordinal currently bound
        existing: u64,
        /// Ordinal the caller tried to bind
        attempted: u64,
    },
}

impl ProtocolError {
    /// Failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated { .. }
            | Self::MalformedVarInt
            | Self::NonCanonicalCompactSize(_)
            | Self::ValueOverflow { .. }
            | Self::InvalidBase58(_)
            | Self::InvalidAddressVersion { .. }
            | Self::InvalidUtf8 { .. }
            | Self::InvalidFixedLength { .. }
            | Self::InvalidHex(_)
            | Self::TrailingBytes(_) => ErrorKind::MalformedInput,

            Self::UnknownType { .. }
            | Self::UnregisteredOrdinal(_)
            | Self::UnregisteredKey(_)
            | Self::ReservedOrdinal(_)
            | Self::MissingField(_)
            | Self::UnknownFlags { .. }
            | Self::UnsupportedVersion { .. }
            | Self::UnsupportedHashType(_)
            | Self::UnsupportedSignatureVersion(_)
            | Self::MissingContext(_)
            | Self::InvalidName(_)
            | Self::InconsistentFlags { .. }
            | Self::EmptyDetails
            | Self::LengthMismatch { .. } => ErrorKind::SchemaViolation,

            Self::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,

            Self::DuplicateOrdinal { .. } | Self::DuplicateKey { .. } => {
                ErrorKind::DuplicateRegistration
            },
        }
    }
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
