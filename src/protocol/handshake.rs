use byteorder::LittleEndian;

use crate::io::Buf;
use crate::protocol::{Capabilities, Decode, Status};

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_handshake_v10.html
#[derive(Debug)]
pub struct Handshake {
    pub protocol_version: u8,
    pub server_version: Box<str>,
    pub connection_id: u32,
    pub server_capabilities: Capabilities,
    pub server_default_collation: u8,
    pub status: Status,
    pub auth_plugin_data: Box<[u8]>,
    pub auth_plugin_name: Option<Box<str>>,
}

impl Decode for Handshake {
    fn decode(mut buf: &[u8]) -> crate::Result<Self> {
        let protocol_version = buf.get_u8()?;
        let server_version = buf.get_str_nul()?.into();
        let connection_id = buf.get_u32::<LittleEndian>()?;

        let mut auth_plugin_data = buf.get_bytes(8)?.to_vec();

        // filler
        buf.advance(1);

        let capabilities_1 = buf.get_u16::<LittleEndian>()? as u32;

        // the packet stops here for a pre-4.1 server; we refuse to
        // operate without PROTOCOL_41 so always read the rest
        let server_default_collation = buf.get_u8()?;
        let status = Status::from_bits_truncate(buf.get_u16::<LittleEndian>()?);
        let capabilities_2 = buf.get_u16::<LittleEndian>()? as u32;

        let server_capabilities =
            Capabilities::from_bits_truncate(u64::from(capabilities_1 | (capabilities_2 << 16)));

        let auth_plugin_data_len = buf.get_u8()?;

        // reserved, all zero
        buf.advance(10);

        if server_capabilities.contains(Capabilities::SECURE_CONNECTION) {
            // the spec calls for `MAX(13, auth_plugin_data_len - 8)` bytes;
            // a server that omits CLIENT_PLUGIN_AUTH reports
            // auth_plugin_data_len == 0, so the saturating subtraction
            // must not be allowed to produce a bogus huge length
            let len = (auth_plugin_data_len as usize)
                .saturating_sub(8)
                .max(13);

            let part_2 = buf.get_bytes(len)?;

            // the second part is NUL-terminated; trim the stored data so
            // scramble algorithms don't see the trailing zero byte
            let trimmed = part_2
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(part_2.len());

            auth_plugin_data.extend_from_slice(&part_2[..trimmed]);
        }

        let auth_plugin_name = if server_capabilities.contains(Capabilities::PLUGIN_AUTH) {
            Some(buf.get_str_nul()?.into())
        } else {
            None
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            server_capabilities,
            server_default_collation,
            status,
            auth_plugin_data: auth_plugin_data.into_boxed_slice(),
            auth_plugin_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // server_version = "5.7.22-log", connection_id = 11, plugin =
    // mysql_native_password, a minimal handshake with PROTOCOL_41 +
    // SECURE_CONNECTION + PLUGIN_AUTH set.
    const HANDSHAKE_MYSQL_5_7: &[u8] = &[
        10, // protocol_version
        b'5', b'.', b'7', b'.', b'2', b'2', b'-', b'l', b'o', b'g', 0, // server_version
        11, 0, 0, 0, // connection_id
        1, 2, 3, 4, 5, 6, 7, 8, // auth_plugin_data_part_1
        0, // filler
        0xff, 0xff, // capability_flags_1 (all lower bits)
        33, // character_set (utf8_general_ci)
        2, 0, // status_flags (autocommit)
        0xff, 0xdf, // capability_flags_2
        21, // auth_plugin_data_len
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // reserved
        9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 0, // auth_plugin_data_part_2 (+ NUL)
        b'm', b'y', b's', b'q', b'l', b'_', b'n', b'a', b't', b'i', b'v', b'e', b'_', b'p', b'a',
        b's', b's', b'w', b'o', b'r', b'd', 0, // auth_plugin_name
    ];

    #[test]
    fn it_decodes_handshake() {
        let h = Handshake::decode(HANDSHAKE_MYSQL_5_7).unwrap();

        assert_eq!(h.protocol_version, 10);
        assert_eq!(&*h.server_version, "5.7.22-log");
        assert_eq!(h.connection_id, 11);
        assert!(h.server_capabilities.contains(Capabilities::PROTOCOL_41));
        assert!(h
            .server_capabilities
            .contains(Capabilities::SECURE_CONNECTION));
        assert_eq!(h.auth_plugin_data.len(), 20);
        assert_eq!(&*h.auth_plugin_name.unwrap(), "mysql_native_password");
    }
}
