use std::ops::Range;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::io::Buf;
use crate::protocol::TypeId;
use crate::value::MySqlValue;

/// The slice of a [`ColumnDefinition`](crate::protocol::ColumnDefinition)
/// a [`Row`] needs to decode its own values: the wire type and whether it
/// carries the `UNSIGNED` flag.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMeta {
    pub type_id: TypeId,
    pub unsigned: bool,
}

/// A single decoded result-set row. Holds onto the raw packet payload
/// and a per-column `Range` into it; values are sliced out lazily by
/// [`Row::get_raw`]/[`Row::get`] rather than copied up front.
pub struct Row {
    buffer: Box<[u8]>,
    values: Box<[Option<Range<usize>>]>,
    columns: Arc<[ColumnMeta]>,
    binary: bool,
}

impl Row {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The column's raw wire bytes, `None` for SQL NULL. Text-protocol
    /// rows carry the value's ASCII representation with the length-encoding
    /// prefix stripped; binary-protocol rows carry whatever
    /// [`TypeId`]-specific framing the wire format uses (fixed-width LE,
    /// a length-prefixed temporal layout, or a lenenc string/blob).
    pub fn get_raw(&self, index: usize) -> Option<&[u8]> {
        let range = self.values[index].as_ref()?;

        Some(&self.buffer[range.start..range.end])
    }

    /// The column decoded into an owned [`MySqlValue`].
    pub fn get(&self, index: usize) -> crate::Result<MySqlValue> {
        let meta = self.columns[index];

        match self.get_raw(index) {
            None => Ok(MySqlValue::Null),
            Some(raw) => MySqlValue::decode(self.binary, meta.type_id, meta.unsigned, raw),
        }
    }
}

/// Returns the total byte length (marker + value) of the length-encoded
/// field starting at `buf[0]`.
fn lenenc_field_len(buf: &[u8]) -> usize {
    match buf[0] {
        0xFB => 1,

        0xFC => 1 + 2 + LittleEndian::read_u16(&buf[1..]) as usize,
        0xFD => 1 + 3 + LittleEndian::read_u24(&buf[1..]) as usize,
        0xFE => 1 + 8 + LittleEndian::read_u64(&buf[1..]) as usize,

        value => 1 + value as usize,
    }
}

impl Row {
    /// Decodes a text-protocol row: every column is a length-encoded
    /// string (or the `0xFB` NULL marker), in column order, with no
    /// other framing.
    pub fn decode_text(buf: &[u8], columns: &Arc<[ColumnMeta]>) -> crate::Result<Self> {
        let buffer: Box<[u8]> = buf.into();
        let mut values = Vec::with_capacity(columns.len());
        let mut index = 0;

        for _ in 0..columns.len() {
            if buffer[index] == 0xFB {
                values.push(None);
                index += 1;
                continue;
            }

            let size = lenenc_field_len(&buffer[index..]);
            let value_len = value_len(&buffer[index..], size);
            let prefix_len = size - value_len;

            values.push(Some((index + prefix_len)..(index + size)));
            index += size;
        }

        Ok(Self {
            buffer,
            values: values.into_boxed_slice(),
            columns: Arc::clone(columns),
            binary: false,
        })
    }

    /// Decodes a binary-protocol row: a `0x00` header, a null-bitmap of
    /// `⌈(column_count+9)/8⌉` bytes (bit `i+2` marks column `i` NULL, the
    /// first two bits being reserved), then each non-NULL column encoded
    /// per its `TypeId`.
    pub fn decode_binary(buf: &[u8], columns: &Arc<[ColumnMeta]>) -> crate::Result<Self> {
        let mut cursor = buf;

        let header = cursor.get_u8()?;
        if header != 0 {
            return Err(crate::error::protocol_err!(
                "expected binary row header (0x00); received 0x{:X}",
                header
            ));
        }

        let null_bitmap_len = (columns.len() + 9) / 8;
        let null_bitmap = cursor.get_bytes(null_bitmap_len)?;

        let buffer: Box<[u8]> = cursor.into();
        let mut values = Vec::with_capacity(columns.len());
        let mut index = 0;

        for (i, meta) in columns.iter().enumerate() {
            let bit = i + 2;
            let is_null = null_bitmap[bit / 8] & (1 << (bit % 8)) != 0;

            if is_null {
                values.push(None);
                continue;
            }

            let size = binary_value_len(meta.type_id, &buffer[index..])?;
            values.push(Some(index..(index + size)));
            index += size;
        }

        Ok(Self {
            buffer,
            values: values.into_boxed_slice(),
            columns: Arc::clone(columns),
            binary: true,
        })
    }
}

/// Length, in bytes, of the value itself (excluding the lenenc prefix)
/// given the field's total encoded length `total`.
fn value_len(buf: &[u8], total: usize) -> usize {
    match buf[0] {
        0xFB => 0,
        0xFC => total - 3,
        0xFD => total - 4,
        0xFE => total - 9,
        _ => total - 1,
    }
}

fn binary_value_len(type_id: TypeId, buf: &[u8]) -> crate::Result<usize> {
    if let Some(width) = type_id.is_fixed_width_binary() {
        return Ok(width);
    }

    Ok(match type_id {
        // length-prefixed temporal values: a single length byte followed
        // by 0, 4, 7 or 11 bytes (date/datetime/timestamp), or 0, 8 or 12
        // bytes (time, the extra byte being a sign flag for negative
        // durations).
        TypeId::DATE | TypeId::DATETIME | TypeId::TIMESTAMP | TypeId::TIME => {
            1 + buf[0] as usize
        }

        TypeId::TINY_BLOB
        | TypeId::MEDIUM_BLOB
        | TypeId::LONG_BLOB
        | TypeId::CHAR
        | TypeId::TEXT
        | TypeId::VAR_CHAR
        | TypeId::JSON
        | TypeId::NEWDECIMAL
        | TypeId::DECIMAL
        | TypeId::BIT
        | TypeId::ENUM
        | TypeId::GEOMETRY => lenenc_field_len(buf),

        id => {
            return Err(crate::error::protocol_err!(
                "encountered unsupported binary field type id: {:?}",
                id
            ))
        }
    })
}
