//! Ordinal object decoding, with and without ordinal substitution.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vdxf_proto::{DecodeContext, OrdinalVdxfObject, Registry, WireValue};

fuzz_target!(|data: &[u8]| {
    let registry = Registry::builtin();
    let plain = DecodeContext::new(&registry);

    if let Ok(object) = OrdinalVdxfObject::from_bytes(data, &plain) {
        let encoded = object.to_bytes().expect("decoded object must re-encode");
        assert_eq!(&encoded[..], data);
        assert_eq!(object.byte_length().expect("length"), data.len());
    }

    // Substitution may change the addressing, so only decoding is checked.
    let optimised = plain.with_root_system_name("VRSC").optimize_with_ordinal(true);
    let _ = OrdinalVdxfObject::from_bytes(data, &optimised);
});
