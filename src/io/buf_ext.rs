use std::io;

use byteorder::ByteOrder;

use crate::io::Buf;

/// The MySQL length-encoded integer/string rule: a marker byte selects
/// between a 1/3/4/9-byte encoding (`0xFB` for NULL, `0xFC`/`0xFD`/`0xFE`
/// prefixing a 2/3/8-byte little-endian integer, or the byte itself for
/// values below `0xFB`).
pub trait BufExt<'a> {
    fn get_uint_lenenc<T: ByteOrder>(&mut self) -> io::Result<Option<u64>>;

    fn get_str_lenenc<T: ByteOrder>(&mut self) -> io::Result<Option<&'a str>>;

    fn get_bytes_lenenc<T: ByteOrder>(&mut self) -> io::Result<Option<&'a [u8]>>;
}

impl<'a> BufExt<'a> for &'a [u8] {
    fn get_uint_lenenc<T: ByteOrder>(&mut self) -> io::Result<Option<u64>> {
        Ok(match self.get_u8()? {
            0xFB => None,
            0xFC => Some(u64::from(self.get_u16::<T>()?)),
            0xFD => Some(u64::from(self.get_u24::<T>()?)),
            0xFE => Some(self.get_u64::<T>()?),

            value => Some(u64::from(value)),
        })
    }

    fn get_str_lenenc<T: ByteOrder>(&mut self) -> io::Result<Option<&'a str>> {
        self.get_uint_lenenc::<T>()?
            .map(move |len| self.get_str(len as usize))
            .transpose()
    }

    fn get_bytes_lenenc<T: ByteOrder>(&mut self) -> io::Result<Option<&'a [u8]>> {
        self.get_uint_lenenc::<T>()?
            .map(move |len| self.get_bytes(len as usize))
            .transpose()
    }
}
