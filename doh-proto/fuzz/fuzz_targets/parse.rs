#![no_main]

use doh_proto::buffer::BytePacketBuffer;
use doh_proto::packet::DnsPacket;

libfuzzer_sys::fuzz_target!(|buffer: BytePacketBuffer| {
    let _ = DnsPacket::try_from(buffer);
});
