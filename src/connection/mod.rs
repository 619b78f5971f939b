//! The framer: turns a [`crate::io::MaybeTlsStream`] into a sequence of
//! length-prefixed packets, and holds the per-connection state (negotiated
//! capabilities, sequence id, prepared statement cache) that every command
//! needs.

mod command;
mod establish;

pub use command::{IsolationLevel, PreparedStatement, RowStream};

use std::sync::Arc;
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};

use crate::cache::StatementCache;
use crate::error::Error;
use crate::io::{Buf, BufStream, MaybeTlsStream};
use crate::pool::metrics::PoolMetricsCollector;
use crate::protocol::{Capabilities, Decode, Encode, EofPacket, ErrPacket, OkPacket};

/// The largest payload a single packet may carry before it must be split
/// across several packets with the same sequence id run.
pub(crate) const MAX_PACKET_SIZE: u32 = 0xFF_FFFF;

pub(crate) type MySqlStream = BufStream<MaybeTlsStream>;

/// A single connection to a MySQL server.
///
/// Holds the negotiated [`Capabilities`], the prepared statement cache, and
/// the framer's read/write state. All command-phase operations
/// (`query`/`prepare`/`execute`/`ping`/...) live in [`command`], and the
/// connect/authenticate flow lives in [`establish`].
pub struct Connection {
    pub(crate) stream: MySqlStream,
    pub(crate) capabilities: Capabilities,
    pub(crate) statement_cache: StatementCache,
    pub(crate) server_version: Box<str>,
    pub(crate) connection_id: u32,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) use_cursor_fetch: bool,
    pub(crate) use_server_prep_stmts: bool,
    pub(crate) metrics: Option<Arc<dyn PoolMetricsCollector>>,

    rbuf: Vec<u8>,
    next_seq_no: u8,
}

impl Connection {
    /// Attaches a metrics collector, so `query`/`execute` and row decoding
    /// report through it; only set for connections checked out of a
    /// [`crate::pool::Pool`] with one configured. A direct, non-pooled
    /// connection has no collector and these calls are no-ops.
    pub(crate) fn attach_metrics(&mut self, metrics: Arc<dyn PoolMetricsCollector>) {
        self.metrics = Some(metrics);
    }
    /// Resets the sequence id run at the start of a new command; the
    /// client-to-server sequence id for the first packet of any command
    /// phase exchange must be 0.
    pub(crate) fn begin_command_phase(&mut self) {
        self.next_seq_no = 0;
    }

    /// Encodes `packet` into the stream's write buffer, patching in the
    /// 4-byte length+sequence header once the payload length is known.
    pub(crate) fn write(&mut self, packet: impl Encode) {
        write_packet(&mut self.stream, &mut self.next_seq_no, &packet, self.capabilities);
    }

    pub(crate) async fn receive(&mut self) -> crate::Result<&[u8]> {
        self.try_receive()
            .await?
            .ok_or_else(|| Error::from(std::io::ErrorKind::UnexpectedEof))
    }

    /// Reads one packet, or `None` if the peer closed the connection
    /// cleanly between packets.
    pub(crate) async fn try_receive(&mut self) -> crate::Result<Option<&[u8]>> {
        self.rbuf.clear();

        let peek = peek_or_none(&mut self.stream, 4);

        let header = match self.read_timeout {
            Some(timeout) => async_std::future::timeout(timeout, peek)
                .await
                .map_err(|_| Error::Io(std::io::ErrorKind::TimedOut.into()))??,
            None => peek.await?,
        };

        let mut header = match header {
            Some(header) => header,
            None => return Ok(None),
        };

        let payload_len = header.get_uint::<LittleEndian>(3)? as usize;

        let seq_no = header.get_u8()?;
        if seq_no != self.next_seq_no {
            return Err(crate::error::protocol_err!(
                "bad sequence id: expected {}, got {}",
                self.next_seq_no,
                seq_no
            ));
        }
        self.next_seq_no = seq_no.wrapping_add(1);

        self.stream.consume(4);

        let payload = self.stream.peek(payload_len).await?;
        self.rbuf.extend_from_slice(payload);
        self.stream.consume(payload_len);

        Ok(Some(&self.rbuf[..payload_len]))
    }

    pub(crate) async fn receive_ok(&mut self) -> crate::Result<OkPacket> {
        let packet = self.receive().await?;

        match packet[0] {
            0x00 | 0xFE => Ok(OkPacket::decode(packet)?),
            0xFF => Err(sql_error(ErrPacket::decode(packet)?)),
            id => Err(crate::error::protocol_err!(
                "unexpected packet identifier 0x{:X} when expecting OK (0x00) or ERR (0xFF)",
                id
            )),
        }
    }

    /// Consumes the legacy EOF packet that terminates a fixed-count
    /// sequence (column definitions, the first half of a `COM_FIELD_LIST`
    /// response) on connections that have not negotiated `DEPRECATE_EOF`.
    pub(crate) async fn receive_eof(&mut self) -> crate::Result<()> {
        if !self.capabilities.contains(Capabilities::DEPRECATE_EOF) {
            EofPacket::decode(self.receive().await?)?;
        }

        Ok(())
    }
}

/// Shared by [`Connection::write`] and the TLS short-handshake (which must
/// send an `SslRequest` before `Connection` exists in its final form).
pub(crate) fn write_packet(
    stream: &mut MySqlStream,
    next_seq_no: &mut u8,
    packet: &impl Encode,
    capabilities: Capabilities,
) {
    let buf = stream.buffer_mut();

    let header_offset = buf.len();
    crate::io::BufMut::advance(buf, 4);

    packet.encode(buf, capabilities);

    let len = buf.len() - header_offset - 4;
    let header = &mut buf[header_offset..];
    LittleEndian::write_u32(header, len as u32);
    header[3] = *next_seq_no;

    *next_seq_no = next_seq_no.wrapping_add(1);
}

async fn peek_or_none(stream: &mut MySqlStream, cnt: usize) -> crate::Result<Option<&[u8]>> {
    match stream.peek(cnt).await {
        Ok(buf) => Ok(Some(buf)),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn sql_error(err: ErrPacket) -> Error {
    Error::Sql {
        code: err.error_code,
        sqlstate: err.sql_state,
        message: err.error_message,
    }
}
