//! Wire format for VDXF, the self-describing object protocol used to exchange
//! identity, payment and data-request payloads.
//!
//! Everything here is a pure, synchronous transform between structured values
//! and byte buffers. The layers, leaves first:
//!
//! 1. [`varint`]: CompactSize and the continuation-bit VarInt.
//! 2. [`buffer`]: cursor [`Reader`] and exact-length [`Writer`].
//! 3. [`compact_address`]: FQN / I-address / X-address references.
//! 4. [`record`]: the flag-driven optional-field convention ([`FlaggedRecord`])
//!    and the measure-then-write contract ([`WireValue`]).
//! 5. [`registry`] and [`ordinal`]: objects addressed by a compact ordinal or
//!    an inline key, dispatched to a payload decoder.
//! 6. [`envelope`]: the signed transport wrapper.
//!
//! # Encoding Discipline
//!
//! Every record measures itself before it writes, and the writer is allocated
//! with exactly that many bytes. A record whose two passes disagree fails with
//! [`ProtocolError::LengthMismatch`]; no caller ever sees truncated or padded
//! output.
//!
//! # Decode Context
//!
//! Some bytes cannot be interpreted alone: ordinals need a [`Registry`], and
//! names stored relative to a root system need that root back.
//! [`DecodeContext`] carries both, explicitly, into every decode call.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod buffer;
pub mod compact_address;
pub mod envelope;
pub mod errors;
pub mod hash;
pub mod ordinal;
pub mod payloads;
pub mod record;
pub mod registry;
pub mod sapling;
pub mod serde_helpers;
pub mod signature;
pub mod varint;

pub use address::{Address, Hash160, VdxfKey};
pub use buffer::{Reader, Writer};
pub use compact_address::{AddressType, CompactAddress, CompactAddressObject};
pub use envelope::{
    Envelope, EnvelopeExtension, EnvelopeFlags, GenericEnvelope, GenericRequest, GenericResponse,
    NoExtension, RequestExtension, ResponseExtension,
};
pub use errors::{ErrorKind, ProtocolError, Result};
pub use ordinal::{OrdinalVdxfObject, VdxfAddressing};
pub use payloads::{
    AppEncryptionFlags, AppEncryptionRequestDetails, DataDescriptor, DataDescriptorFlags,
    PayloadKind, VdxfData,
};
pub use record::{DecodeContext, FlaggedRecord, WireValue};
pub use registry::{Registration, RegistrationMode, Registry, register_ordinals};
pub use sapling::SaplingPaymentAddress;
pub use signature::{SignatureFlags, VerifiableSignatureData};
