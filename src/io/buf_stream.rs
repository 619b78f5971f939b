use async_std::io::{Read, ReadExt, Write, WriteExt};

/// A buffered duplex stream supporting the framer's peek-then-consume
/// read pattern: `peek(n)` blocks until at least `n` bytes are buffered
/// and returns them without removing them, `consume(n)` then advances
/// past them once the caller knows it has a complete packet.
///
/// Writes go through a plain `Vec<u8>` staging buffer (`buffer_mut`) so a
/// packet's 4-byte length header can be patched in after the payload is
/// encoded, then `flush` pushes the whole buffer to the wire in one
/// write.
pub struct BufStream<S>
where
    S: Read + Write + Unpin,
{
    pub(crate) stream: S,
    wbuf: Vec<u8>,
    rbuf: Vec<u8>,
    rpos: usize,
}

impl<S> BufStream<S>
where
    S: Read + Write + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            wbuf: Vec::with_capacity(512),
            rbuf: Vec::with_capacity(4096),
            rpos: 0,
        }
    }

    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.wbuf
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        if !self.wbuf.is_empty() {
            self.stream.write_all(&self.wbuf).await?;
            self.wbuf.clear();
        }

        self.stream.flush().await
    }

    /// Ensures at least `cnt` bytes are buffered and returns them without
    /// consuming. Reads directly from the socket until satisfied;
    /// returns `UnexpectedEof` if the peer closes first.
    pub async fn peek(&mut self, cnt: usize) -> std::io::Result<&[u8]> {
        if self.rpos > 0 && self.rbuf.len() - self.rpos < cnt {
            self.rbuf.drain(..self.rpos);
            self.rpos = 0;
        }

        while self.rbuf.len() - self.rpos < cnt {
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;

            if n == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }

            self.rbuf.extend_from_slice(&chunk[..n]);
        }

        Ok(&self.rbuf[self.rpos..self.rpos + cnt])
    }

    pub fn consume(&mut self, cnt: usize) {
        self.rpos += cnt;

        if self.rpos == self.rbuf.len() {
            self.rbuf.clear();
            self.rpos = 0;
        }
    }
}

impl<S> std::ops::Deref for BufStream<S>
where
    S: Read + Write + Unpin,
{
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl<S> std::ops::DerefMut for BufStream<S>
where
    S: Read + Write + Unpin,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}
