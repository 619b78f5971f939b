use crate::io::Buf;
use crate::protocol::Decode;

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_auth_switch_request.html
#[derive(Debug)]
pub struct AuthSwitch {
    pub plugin_name: Box<str>,
    pub plugin_data: Box<[u8]>,
}

impl Decode for AuthSwitch {
    fn decode(mut buf: &[u8]) -> crate::Result<Self> {
        let header = buf.get_u8()?;
        if header != 0xFE {
            return Err(crate::error::protocol_err!(
                "expected AUTH_SWITCH_REQUEST (0xFE); received 0x{:X}",
                header
            ));
        }

        let plugin_name = buf.get_str_nul()?.into();

        // the remainder is the new scramble; servers commonly NUL
        // terminate it, but nothing requires it, so take everything left
        let plugin_data = buf.get_bytes(buf.len())?.to_vec().into_boxed_slice();

        Ok(Self {
            plugin_name,
            plugin_data,
        })
    }
}

/// `Auth-More-Data` (header `0x01`), used by `caching_sha2_password` to
/// carry the fast-auth result byte (`0x03`/`0x04`) or an RSA public key.
#[derive(Debug)]
pub struct AuthMoreData {
    pub data: Box<[u8]>,
}

impl Decode for AuthMoreData {
    fn decode(mut buf: &[u8]) -> crate::Result<Self> {
        let header = buf.get_u8()?;
        if header != 0x01 {
            return Err(crate::error::protocol_err!(
                "expected AUTH_MORE_DATA (0x01); received 0x{:X}",
                header
            ));
        }

        let data = buf.get_bytes(buf.len())?.to_vec().into_boxed_slice();

        Ok(Self { data })
    }
}
