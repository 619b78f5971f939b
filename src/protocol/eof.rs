use byteorder::LittleEndian;

use crate::io::Buf;
use crate::protocol::{Decode, Status};

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_basic_eof_packet.html
// https://mariadb.com/kb/en/eof_packet/
//
// Only observed when `DEPRECATE_EOF` is not negotiated; modern servers
// send an `OK_Packet` with the `SERVER_MORE_RESULTS_EXISTS` flag instead.
#[derive(Debug)]
pub struct EofPacket {
    pub warnings: u16,
    pub status: Status,
}

impl Decode for EofPacket {
    fn decode(mut buf: &[u8]) -> crate::Result<Self> {
        let header = buf.get_u8()?;
        if header != 0xFE {
            return Err(crate::error::protocol_err!(
                "expected EOF (0xFE); received 0x{:X}",
                header
            ));
        }

        let warnings = buf.get_u16::<LittleEndian>()?;
        let status = Status::from_bits_truncate(buf.get_u16::<LittleEndian>()?);

        Ok(Self { warnings, status })
    }
}
