//! Compact address decoding on arbitrary input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vdxf_proto::{CompactAddressObject, DecodeContext, WireValue};

fuzz_target!(|data: &[u8]| {
    let ctx = DecodeContext::default().with_root_system_name("VRSC");

    if let Ok(address) = CompactAddressObject::from_bytes(data, &ctx) {
        let encoded = address.to_bytes().expect("decoded address must re-encode");
        assert_eq!(&encoded[..], data);
        let _ = address.qualified_name();
    }
});
