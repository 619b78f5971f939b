use byteorder::LittleEndian;

use crate::io::BufMut;
use crate::protocol::{Capabilities, Encode};

// https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::SSLRequest
//
// The "short handshake" used to upgrade a plaintext connection to TLS
// before sending the real `HandshakeResponse41`: identical header to
// that packet, but stops right after the character set byte.
#[derive(Debug)]
pub struct SslRequest {
    pub max_packet_size: u32,
    pub client_collation: u8,
}

impl Encode for SslRequest {
    fn encode(&self, buf: &mut Vec<u8>, capabilities: Capabilities) {
        assert!(
            capabilities.contains(Capabilities::SSL),
            "SSL bit must be set in capabilities to send SslRequest"
        );

        buf.put_u32::<LittleEndian>(capabilities.bits() as u32);
        buf.put_u32::<LittleEndian>(self.max_packet_size);
        buf.put_u8(self.client_collation);
        buf.advance(23);
    }
}
