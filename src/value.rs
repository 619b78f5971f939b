//! [`MySqlValue`]: a typed, owned decode of a single column value, covering
//! both result-set formats — the text protocol's all-ASCII rows and the
//! binary protocol's per-type-id encoding used by prepared statements.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;
use crate::io::buf_ext::BufExt;
use crate::io::Buf;
use crate::protocol::TypeId;

#[derive(Debug, Clone, PartialEq)]
pub enum MySqlValue {
    Null,
    Signed(i64),
    Unsigned(u64),
    Double(f64),
    Bytes(Box<[u8]>),
    Date {
        year: u16,
        month: u8,
        day: u8,
    },
    Time {
        negative: bool,
        days: u32,
        hours: u8,
        minutes: u8,
        seconds: u8,
        microseconds: u32,
    },
    DateTime {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        microseconds: u32,
    },
}

impl MySqlValue {
    /// Decodes a non-NULL column value; callers check for NULL themselves
    /// ([`crate::protocol::Row::get`] already returns `None` for it) and
    /// return [`MySqlValue::Null`] without reaching this function.
    pub(crate) fn decode(binary: bool, type_id: TypeId, unsigned: bool, raw: &[u8]) -> crate::Result<Self> {
        if binary {
            decode_binary(type_id, unsigned, raw)
        } else {
            decode_text(type_id, unsigned, raw)
        }
    }
}

fn decode_text(type_id: TypeId, unsigned: bool, raw: &[u8]) -> crate::Result<MySqlValue> {
    let text = std::str::from_utf8(raw).map_err(|_| Error::decode("column value was not valid UTF-8"))?;

    Ok(match type_id {
        TypeId::TINY_INT | TypeId::SMALL_INT | TypeId::MEDIUM_INT | TypeId::INT | TypeId::BIG_INT
        | TypeId::YEAR => {
            if unsigned {
                MySqlValue::Unsigned(
                    text.parse().map_err(|_| Error::decode(format!("invalid integer: {text:?}")))?,
                )
            } else {
                MySqlValue::Signed(
                    text.parse().map_err(|_| Error::decode(format!("invalid integer: {text:?}")))?,
                )
            }
        }

        TypeId::FLOAT | TypeId::DOUBLE | TypeId::DECIMAL | TypeId::NEWDECIMAL => MySqlValue::Double(
            text.parse().map_err(|_| Error::decode(format!("invalid float: {text:?}")))?,
        ),

        TypeId::DATE => parse_text_date(text)?,
        TypeId::DATETIME | TypeId::TIMESTAMP => parse_text_datetime(text)?,
        TypeId::TIME => parse_text_time(text)?,

        _ => MySqlValue::Bytes(raw.into()),
    })
}

fn parse_text_date(text: &str) -> crate::Result<MySqlValue> {
    let mut parts = text.splitn(3, '-');
    let err = || Error::decode(format!("invalid date: {text:?}"));

    let year = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    let month = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    let day = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;

    Ok(MySqlValue::Date { year, month, day })
}

fn parse_text_datetime(text: &str) -> crate::Result<MySqlValue> {
    let err = || Error::decode(format!("invalid datetime: {text:?}"));

    let (date, time) = text.split_once(' ').unwrap_or((text, "00:00:00"));

    let date = match parse_text_date(date)? {
        MySqlValue::Date { year, month, day } => (year, month, day),
        _ => unreachable!(),
    };

    let (time, microseconds) = match time.split_once('.') {
        Some((time, frac)) => (time, parse_fraction(frac)),
        None => (time, 0),
    };

    let mut parts = time.splitn(3, ':');
    let hour = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    let minute = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    let second = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;

    Ok(MySqlValue::DateTime {
        year: date.0,
        month: date.1,
        day: date.2,
        hour,
        minute,
        second,
        microseconds,
    })
}

fn parse_text_time(text: &str) -> crate::Result<MySqlValue> {
    let err = || Error::decode(format!("invalid time: {text:?}"));

    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (text, microseconds) = match text.split_once('.') {
        Some((text, frac)) => (text, parse_fraction(frac)),
        None => (text, 0),
    };

    let mut parts = text.splitn(3, ':');
    let hours_total: u32 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    let minutes = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    let seconds = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;

    Ok(MySqlValue::Time {
        negative,
        days: hours_total / 24,
        hours: (hours_total % 24) as u8,
        minutes,
        seconds,
        microseconds,
    })
}

/// Right-pads (or truncates) a fractional-seconds string to 6 digits and
/// parses it as microseconds; MySQL always prints a `.ffffff` suffix but
/// older servers may send fewer digits.
fn parse_fraction(frac: &str) -> u32 {
    let mut digits = [b'0'; 6];
    let frac = frac.as_bytes();
    let len = frac.len().min(6);
    digits[..len].copy_from_slice(&frac[..len]);

    std::str::from_utf8(&digits).ok().and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn decode_binary(type_id: TypeId, unsigned: bool, raw: &[u8]) -> crate::Result<MySqlValue> {
    Ok(match type_id {
        TypeId::TINY_INT => {
            if unsigned {
                MySqlValue::Unsigned(raw[0] as u64)
            } else {
                MySqlValue::Signed(raw[0] as i8 as i64)
            }
        }

        TypeId::SMALL_INT | TypeId::YEAR => {
            let v = LittleEndian::read_u16(raw);
            if unsigned {
                MySqlValue::Unsigned(v as u64)
            } else {
                MySqlValue::Signed(v as i16 as i64)
            }
        }

        TypeId::INT | TypeId::MEDIUM_INT => {
            let v = LittleEndian::read_u32(raw);
            if unsigned {
                MySqlValue::Unsigned(v as u64)
            } else {
                MySqlValue::Signed(v as i32 as i64)
            }
        }

        TypeId::BIG_INT => {
            let v = LittleEndian::read_u64(raw);
            if unsigned {
                MySqlValue::Unsigned(v)
            } else {
                MySqlValue::Signed(v as i64)
            }
        }

        TypeId::FLOAT => MySqlValue::Double(LittleEndian::read_f32(raw) as f64),
        TypeId::DOUBLE => MySqlValue::Double(LittleEndian::read_f64(raw)),

        TypeId::DATE => decode_binary_date(raw),
        TypeId::DATETIME | TypeId::TIMESTAMP => decode_binary_datetime(raw),
        TypeId::TIME => decode_binary_time(raw),

        TypeId::DECIMAL | TypeId::NEWDECIMAL => {
            let bytes = lenenc_payload(raw)?;
            let text =
                std::str::from_utf8(bytes).map_err(|_| Error::decode("decimal value was not valid UTF-8"))?;

            MySqlValue::Double(text.parse().map_err(|_| Error::decode(format!("invalid decimal: {text:?}")))?)
        }

        _ => MySqlValue::Bytes(lenenc_payload(raw)?.into()),
    })
}

fn lenenc_payload(raw: &[u8]) -> crate::Result<&[u8]> {
    let mut cursor = raw;

    Ok(cursor.get_bytes_lenenc::<LittleEndian>()?.unwrap_or(&[]))
}

/// `raw[0]` is the MySQL binary-protocol length byte (0, 4, 7, or 11 for
/// date/datetime values); see the temporal decode rule this implements.
fn decode_binary_date(raw: &[u8]) -> MySqlValue {
    if raw[0] == 0 {
        return MySqlValue::Date { year: 0, month: 0, day: 0 };
    }

    MySqlValue::Date {
        year: LittleEndian::read_u16(&raw[1..]),
        month: raw[3],
        day: raw[4],
    }
}

fn decode_binary_datetime(raw: &[u8]) -> MySqlValue {
    let len = raw[0];

    if len == 0 {
        return MySqlValue::DateTime {
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
            second: 0,
            microseconds: 0,
        };
    }

    let year = LittleEndian::read_u16(&raw[1..]);
    let month = raw[3];
    let day = raw[4];

    let (hour, minute, second) = if len >= 7 { (raw[5], raw[6], raw[7]) } else { (0, 0, 0) };
    let microseconds = if len >= 11 { LittleEndian::read_u32(&raw[8..]) } else { 0 };

    MySqlValue::DateTime { year, month, day, hour, minute, second, microseconds }
}

/// `raw[0]` is the length byte (0, 8, or 12); the sign/day-count/H:M:S
/// fields follow it directly, per the temporal decode rule.
fn decode_binary_time(raw: &[u8]) -> MySqlValue {
    let len = raw[0];

    if len == 0 {
        return MySqlValue::Time {
            negative: false,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
            microseconds: 0,
        };
    }

    let negative = raw[1] != 0;
    let days = LittleEndian::read_u32(&raw[2..]);
    let hours = raw[6];
    let minutes = raw[7];
    let seconds = raw[8];
    let microseconds = if len >= 12 { LittleEndian::read_u32(&raw[9..]) } else { 0 };

    MySqlValue::Time { negative, days, hours, minutes, seconds, microseconds }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_decodes_text_integers() {
        assert_eq!(
            decode_text(TypeId::INT, false, b"-42").unwrap(),
            MySqlValue::Signed(-42)
        );
        assert_eq!(
            decode_text(TypeId::INT, true, b"42").unwrap(),
            MySqlValue::Unsigned(42)
        );
    }

    #[test]
    fn it_decodes_text_datetime_with_fraction() {
        let value = decode_text(TypeId::DATETIME, false, b"2024-01-02 03:04:05.5").unwrap();

        assert_eq!(
            value,
            MySqlValue::DateTime {
                year: 2024,
                month: 1,
                day: 2,
                hour: 3,
                minute: 4,
                second: 5,
                microseconds: 500_000,
            }
        );
    }

    #[test]
    fn it_decodes_binary_fixed_width_ints() {
        assert_eq!(
            decode_binary(TypeId::BIG_INT, false, &255u64.to_le_bytes()).unwrap(),
            MySqlValue::Signed(255)
        );
    }

    #[test]
    fn it_decodes_zero_date() {
        assert_eq!(decode_binary_date(&[0]), MySqlValue::Date { year: 0, month: 0, day: 0 });
    }
}
