use byteorder::LittleEndian;

use crate::io::BufMut;
use crate::protocol::{Capabilities, Encode};

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_handshake_response.html
#[derive(Debug)]
pub struct HandshakeResponse<'a> {
    pub client_collation: u8,
    pub max_packet_size: u32,
    pub username: &'a str,
    pub database: Option<&'a str>,
    pub auth_plugin_name: Option<&'a str>,
    pub auth_response: Option<&'a [u8]>,
}

impl Encode for HandshakeResponse<'_> {
    fn encode(&self, buf: &mut Vec<u8>, capabilities: Capabilities) {
        // client capabilities : int<4>
        buf.put_u32::<LittleEndian>(capabilities.bits() as u32);

        // max packet size : int<4>
        buf.put_u32::<LittleEndian>(self.max_packet_size);

        // client character collation : int<1>
        buf.put_u8(self.client_collation);

        // reserved : string<23>
        buf.advance(23);

        // username : string<NUL>
        buf.put_str_nul(self.username);

        if let Some(auth_response) = self.auth_response {
            if capabilities.contains(Capabilities::PLUGIN_AUTH_LENENC_DATA) {
                buf.put_bytes_lenenc::<LittleEndian>(auth_response);
            } else if capabilities.contains(Capabilities::SECURE_CONNECTION) {
                buf.put_u8(auth_response.len() as u8);
                buf.put_bytes(auth_response);
            } else {
                buf.put_bytes(auth_response);
                buf.put_u8(0);
            }
        } else {
            buf.put_u8(0);
        }

        if capabilities.contains(Capabilities::CONNECT_WITH_DB) {
            buf.put_str_nul(self.database.unwrap_or(""));
        }

        if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            buf.put_str_nul(self.auth_plugin_name.unwrap_or("mysql_native_password"));
        }
    }
}
