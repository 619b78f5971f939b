use byteorder::LittleEndian;

use crate::io::buf_ext::BufExt;
use crate::io::Buf;
use crate::protocol::{Decode, FieldFlags, TypeId};

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_query_response_text_resultset_column_definition.html
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub schema: Box<str>,
    pub table_alias: Box<str>,
    pub table: Box<str>,
    pub column_alias: Box<str>,
    pub column: Box<str>,
    pub char_set: u16,
    pub max_size: u32,
    pub type_id: TypeId,
    pub flags: FieldFlags,
    pub decimals: u8,
}

impl Decode for ColumnDefinition {
    fn decode(mut buf: &[u8]) -> crate::Result<Self> {
        let catalog = buf.get_str_lenenc::<LittleEndian>()?.unwrap_or_default();
        if catalog != "def" {
            return Err(crate::error::protocol_err!(
                "expected catalog 'def'; received {:?}",
                catalog
            ));
        }

        let schema = buf.get_str_lenenc::<LittleEndian>()?.unwrap_or_default().into();
        let table_alias = buf.get_str_lenenc::<LittleEndian>()?.unwrap_or_default().into();
        let table = buf.get_str_lenenc::<LittleEndian>()?.unwrap_or_default().into();
        let column_alias = buf.get_str_lenenc::<LittleEndian>()?.unwrap_or_default().into();
        let column = buf.get_str_lenenc::<LittleEndian>()?.unwrap_or_default().into();

        // the next field is always a lenenc integer whose value is fixed
        // at 0x0c (12): the length, in bytes, of the remaining
        // fixed-width fields in this packet.
        let len_fixed_fields = buf.get_uint_lenenc::<LittleEndian>()?.unwrap_or(0);
        if len_fixed_fields != 0x0c {
            return Err(crate::error::protocol_err!(
                "expected fixed-field length 0x0c; received 0x{:X}",
                len_fixed_fields
            ));
        }

        let char_set = buf.get_u16::<LittleEndian>()?;
        let max_size = buf.get_u32::<LittleEndian>()?;
        let type_id = TypeId(buf.get_u8()?);
        let flags = FieldFlags::from_bits_truncate(buf.get_u16::<LittleEndian>()?);
        let decimals = buf.get_u8()?;

        Ok(Self {
            schema,
            table_alias,
            table,
            column_alias,
            column,
            char_set,
            max_size,
            type_id,
            flags,
            decimals,
        })
    }
}
