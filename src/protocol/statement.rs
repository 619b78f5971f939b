use byteorder::LittleEndian;

use crate::io::Buf;
use crate::io::BufMut;
use crate::protocol::{Capabilities, Decode, Encode};

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_stmt_prepare.html
#[derive(Debug)]
pub struct StmtPrepare<'a> {
    pub sql: &'a str,
}

impl Encode for StmtPrepare<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x16);
        buf.put_str(self.sql);
    }
}

#[derive(Debug)]
pub struct StmtPrepareOk {
    pub statement_id: u32,
    pub columns: u16,
    pub params: u16,
    pub warnings: u16,
}

impl Decode for StmtPrepareOk {
    fn decode(mut buf: &[u8]) -> crate::Result<Self> {
        let header = buf.get_u8()?;
        if header != 0x00 {
            return Err(crate::error::protocol_err!(
                "expected COM_STMT_PREPARE_OK (0x00); received 0x{:X}",
                header
            ));
        }

        let statement_id = buf.get_u32::<LittleEndian>()?;
        let columns = buf.get_u16::<LittleEndian>()?;
        let params = buf.get_u16::<LittleEndian>()?;

        // filler, always 0x00
        buf.advance(1);

        let warnings = buf.get_u16::<LittleEndian>()?;

        Ok(Self {
            statement_id,
            columns,
            params,
            warnings,
        })
    }
}

bitflags::bitflags! {
    // https://mariadb.com/kb/en/library/com_stmt_execute/#flag
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cursor: u8 {
        const NO_CURSOR = 0;
        const READ_ONLY = 1;
        const FOR_UPDATE = 2;
        const SCROLLABLE = 4;
    }
}

/// One bound parameter of a `COM_STMT_EXECUTE`: the MySQL binary-protocol
/// type id, whether it is unsigned, and its already-encoded value bytes.
#[derive(Debug)]
pub struct BoundParameter<'a> {
    pub type_id: u8,
    pub is_unsigned: bool,
    pub value: &'a [u8],
}

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_stmt_execute.html
#[derive(Debug)]
pub struct StmtExecute<'a> {
    pub statement_id: u32,
    pub cursor: Cursor,
    pub null_bitmap: &'a [u8],
    pub params: &'a [BoundParameter<'a>],
}

impl Encode for StmtExecute<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x17);
        buf.put_u32::<LittleEndian>(self.statement_id);
        buf.put_u8(self.cursor.bits());

        // iteration count, always 1
        buf.put_u32::<LittleEndian>(1);

        if !self.params.is_empty() {
            buf.put_bytes(self.null_bitmap);

            // new-params-bound-flag
            buf.put_u8(1);

            for param in self.params {
                buf.put_u8(param.type_id);
                buf.put_u8(if param.is_unsigned { 0x80 } else { 0 });
            }

            for param in self.params {
                buf.put_bytes(param.value);
            }
        }
    }
}

// https://dev.mysql.com/doc/internals/en/com-stmt-close.html
#[derive(Debug)]
pub struct StmtClose {
    pub statement_id: u32,
}

impl Encode for StmtClose {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x19);
        buf.put_u32::<LittleEndian>(self.statement_id);
    }
}

// https://dev.mysql.com/doc/internals/en/com-stmt-reset.html
#[derive(Debug)]
pub struct StmtReset {
    pub statement_id: u32,
}

impl Encode for StmtReset {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x1a);
        buf.put_u32::<LittleEndian>(self.statement_id);
    }
}

// https://dev.mysql.com/doc/internals/en/com-stmt-send-long-data.html
#[derive(Debug)]
pub struct StmtSendLongData<'a> {
    pub statement_id: u32,
    pub param_index: u16,
    pub data: &'a [u8],
}

impl Encode for StmtSendLongData<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x18);
        buf.put_u32::<LittleEndian>(self.statement_id);
        buf.put_u16::<LittleEndian>(self.param_index);
        buf.put_bytes(self.data);
    }
}

/// Fetches the next batch of rows from an open server-side cursor, opened by
/// a prior `COM_STMT_EXECUTE` with `Cursor::READ_ONLY` set.
// https://dev.mysql.com/doc/internals/en/com-stmt-fetch.html
#[derive(Debug)]
pub struct StmtFetch {
    pub statement_id: u32,
    pub rows: u32,
}

impl Encode for StmtFetch {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x1c);
        buf.put_u32::<LittleEndian>(self.statement_id);
        buf.put_u32::<LittleEndian>(self.rows);
    }
}
