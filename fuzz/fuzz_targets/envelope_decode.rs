//! Envelope decoding on arbitrary input.
//!
//! Decoding must never panic, and any envelope that decodes must re-encode
//! to exactly the bytes it came from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vdxf_proto::{DecodeContext, GenericEnvelope, GenericRequest, Registry, WireValue};

fuzz_target!(|data: &[u8]| {
    let registry = Registry::builtin();
    let ctx = DecodeContext::new(&registry).with_root_system_name("VRSC");

    if let Ok(envelope) = GenericEnvelope::from_bytes(data, &ctx) {
        let encoded = envelope.to_bytes().expect("decoded envelope must re-encode");
        assert_eq!(&encoded[..], data, "envelope re-encoding differs from input");
    }

    if let Ok(request) = GenericRequest::from_bytes(data, &ctx) {
        let encoded = request.to_bytes().expect("decoded request must re-encode");
        assert_eq!(&encoded[..], data, "request re-encoding differs from input");
    }
});
