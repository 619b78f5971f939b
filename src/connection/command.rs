//! The command phase: every operation a live [`Connection`] exposes after
//! authentication. Each one resets the sequence-id run, writes its request
//! packet, and reads the response to completion before returning — nothing
//! may suspend a command mid-exchange and let another command's bytes
//! interleave on the wire.
//!
//! Result sets are exposed through [`RowStream`], a pull-based cursor over
//! the rows still on the wire: callers drive it with `next()` rather than
//! receiving the whole set as a `Vec` up front.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use byteorder::LittleEndian;

use crate::auth::AuthPlugin;
use crate::cache::CachedStatement;
use crate::connection::{sql_error, Connection};
use crate::error::Error;
use crate::io::BufMut;
use crate::protocol::{
    AuthSwitch, BoundParameter, Capabilities, ChangeUser, ColumnCount, ColumnDefinition,
    ColumnMeta, Cursor, Decode, EofPacket, ErrPacket, FieldFlags, InitDb, OkPacket, Ping, Query,
    ResetConnection, SetOption, SetOptionCommand, Statistics, StmtClose, StmtExecute, StmtFetch,
    StmtPrepare, StmtPrepareOk, StmtReset, StmtSendLongData, TypeId,
};
use crate::value::MySqlValue;

/// The `LOCAL INFILE` request marker; this crate has no local filesystem to
/// serve a file from, so it always aborts the request with an empty packet.
const LOCAL_INFILE_REQUEST: u8 = 0xFB;

/// A server-side prepared statement. [`Connection::prepare`] transparently
/// caches these by SQL text; most callers never see one directly and
/// should call [`Connection::execute`] instead.
#[derive(Debug, Clone, Copy)]
pub struct PreparedStatement {
    pub statement_id: u32,
    pub params: u16,
    pub columns: u16,
}

impl From<CachedStatement> for PreparedStatement {
    fn from(cached: CachedStatement) -> Self {
        PreparedStatement {
            statement_id: cached.statement_id,
            params: cached.params,
            columns: cached.columns,
        }
    }
}

/// `SET SESSION TRANSACTION ISOLATION LEVEL`'s argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl Connection {
    /// `COM_QUERY`: runs `sql` as a single statement using the text
    /// protocol. Multi-statement strings are rejected by the server unless
    /// `CLIENT_MULTI_STATEMENTS` was negotiated, which this crate never
    /// requests.
    pub async fn query(&mut self, sql: &str) -> crate::Result<RowStream<'_>> {
        let metrics = self.metrics.clone();
        let start = Instant::now();

        self.begin_command_phase();
        self.write(Query { sql });
        self.stream.flush().await?;

        let stream = self.begin_result_set(false).await?;

        if let Some(metrics) = &metrics {
            metrics.record_operation_duration(start.elapsed());
        }

        Ok(stream)
    }

    /// `COM_STMT_PREPARE`, transparently served from the statement cache
    /// when `sql` was prepared before. Evicts and closes the
    /// least-recently-used cached statement if the cache is full.
    pub async fn prepare(&mut self, sql: &str) -> crate::Result<PreparedStatement> {
        if let Some(cached) = self.statement_cache.get(sql) {
            return Ok(cached.into());
        }

        self.begin_command_phase();
        self.write(StmtPrepare { sql });
        self.stream.flush().await?;

        let packet = self.receive().await?;
        if packet[0] == 0xFF {
            return Err(sql_error(ErrPacket::decode(packet)?));
        }
        let ok = StmtPrepareOk::decode(packet)?;

        for _ in 0..ok.params {
            self.receive().await?;
        }
        if ok.params > 0 {
            self.receive_eof().await?;
        }

        for _ in 0..ok.columns {
            self.receive().await?;
        }
        if ok.columns > 0 {
            self.receive_eof().await?;
        }

        let cached: CachedStatement = ok.into();

        if let Some(evicted_id) = self.statement_cache.insert(sql.to_string(), cached.clone()) {
            self.close_statement(evicted_id).await?;
        }

        Ok(cached.into())
    }

    /// Prepares `sql` (or reuses the cached preparation) and runs it with
    /// `params` bound in order via `COM_STMT_EXECUTE`, using the binary
    /// result-set protocol.
    pub async fn execute(&mut self, sql: &str, params: &[MySqlValue]) -> crate::Result<RowStream<'_>> {
        let statement = self.prepare(sql).await?;
        self.execute_prepared(statement, params).await
    }

    /// Opens a read-only cursor only when both `use_cursor_fetch` and
    /// `use_server_prep_stmts` are enabled and the statement returns a
    /// result set; otherwise runs the usual all-rows-at-once execute.
    /// `statement.columns` is the only signal this crate has for "is a
    /// SELECT"; there is no metadata path for a `CALL`'s OUT parameters,
    /// so a stored procedure with OUT parameters and a result set would
    /// be (mis)treated as cursor-eligible too.
    async fn execute_prepared(
        &mut self,
        statement: PreparedStatement,
        params: &[MySqlValue],
    ) -> crate::Result<RowStream<'_>> {
        let encoded: Vec<(u8, bool, Vec<u8>)> = params.iter().map(encode_param).collect();

        let null_bitmap_len = (params.len() + 7) / 8;
        let mut null_bitmap = vec![0u8; null_bitmap_len];
        for (i, param) in params.iter().enumerate() {
            if matches!(param, MySqlValue::Null) {
                null_bitmap[i / 8] |= 1 << (i % 8);
            }
        }

        let bound: Vec<BoundParameter<'_>> = encoded
            .iter()
            .map(|(type_id, is_unsigned, value)| BoundParameter {
                type_id: *type_id,
                is_unsigned: *is_unsigned,
                value,
            })
            .collect();

        let use_cursor =
            self.use_cursor_fetch && self.use_server_prep_stmts && statement.columns > 0;
        let cursor = if use_cursor { Cursor::READ_ONLY } else { Cursor::NO_CURSOR };

        let metrics = self.metrics.clone();
        let start = Instant::now();

        self.begin_command_phase();
        self.write(StmtExecute {
            statement_id: statement.statement_id,
            cursor,
            null_bitmap: &null_bitmap,
            params: &bound,
        });
        self.stream.flush().await?;

        let mut stream = self.begin_result_set(true).await?;

        if let Some(metrics) = &metrics {
            metrics.record_operation_duration(start.elapsed());
        }

        if use_cursor && !matches!(stream.state, RowStreamState::Done(_)) {
            stream.cursor_statement_id = Some(statement.statement_id);
        }

        Ok(stream)
    }

    /// `COM_STMT_CLOSE`: deallocates a server-side prepared statement. No
    /// reply is sent; used internally by the statement cache on eviction.
    async fn close_statement(&mut self, statement_id: u32) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(StmtClose { statement_id });
        self.stream.flush().await?;
        Ok(())
    }

    /// `COM_STMT_SEND_LONG_DATA`: appends `data` to a parameter's value
    /// out-of-band, ahead of the `COM_STMT_EXECUTE` that consumes it. No
    /// reply is sent, and a malformed call only surfaces as an `ERR` on
    /// the following `execute`.
    pub async fn send_long_data(&mut self, statement_id: u32, param_index: u16, data: &[u8]) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(StmtSendLongData { statement_id, param_index, data });
        self.stream.flush().await?;
        Ok(())
    }

    /// `COM_STMT_RESET`: clears a prepared statement's long-data buffers
    /// and any open cursor, without deallocating it.
    pub async fn reset_statement(&mut self, statement_id: u32) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(StmtReset { statement_id });
        self.stream.flush().await?;
        self.receive_ok().await?;
        Ok(())
    }

    /// `COM_STMT_FETCH`: pulls the next `max_rows` rows from a cursor
    /// opened by executing `statement_id` with `Cursor::READ_ONLY`. The
    /// column metadata from that execute must be passed back in, since
    /// `COM_STMT_FETCH` itself carries no column definitions.
    pub async fn fetch(
        &mut self,
        statement_id: u32,
        max_rows: u32,
        columns: &Arc<[ColumnMeta]>,
        column_defs: &Arc<[ColumnDefinition]>,
    ) -> crate::Result<RowStream<'_>> {
        self.begin_command_phase();
        self.write(StmtFetch { statement_id, rows: max_rows });
        self.stream.flush().await?;

        Ok(RowStream {
            conn: self,
            columns: Arc::clone(columns),
            column_defs: Arc::clone(column_defs),
            binary: true,
            state: RowStreamState::Rows,
            cursor_statement_id: None,
            buffered: std::collections::VecDeque::new(),
        })
    }

    /// `COM_PING`: round-trips an OK packet without touching any session
    /// state. The pool's health check before handing out an idle
    /// connection.
    pub async fn ping(&mut self) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(Ping);
        self.stream.flush().await?;
        self.receive_ok().await?;
        Ok(())
    }

    /// `COM_INIT_DB`: switches the connection's default schema.
    pub async fn use_database(&mut self, schema: &str) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(InitDb { schema });
        self.stream.flush().await?;
        self.receive_ok().await?;
        Ok(())
    }

    /// `COM_STATISTICS`: a human-readable one-line server status string.
    /// Not a structured response; kept for parity with the C client
    /// library's `mysql_stat()`.
    pub async fn statistics(&mut self) -> crate::Result<Box<str>> {
        self.begin_command_phase();
        self.write(Statistics);
        self.stream.flush().await?;

        let packet = self.receive().await?;
        let text = std::str::from_utf8(packet)
            .map_err(|_| Error::decode("COM_STATISTICS response was not valid UTF-8"))?;

        Ok(text.into())
    }

    /// `COM_CHANGE_USER`: re-authenticates the open socket as a different
    /// user, optionally switching the default schema, without paying for a
    /// new TCP/TLS handshake. Clears the statement cache, since the server
    /// deallocates all prepared statements on this connection as part of
    /// the exchange.
    pub async fn change_user(&mut self, username: &str, password: &str, database: Option<&str>) -> crate::Result<()> {
        let plugin = AuthPlugin::MySqlNativePassword;

        self.begin_command_phase();
        self.write(ChangeUser {
            username,
            auth_response: &[],
            database,
            auth_plugin_name: plugin.name(),
            client_collation: 224,
        });
        self.stream.flush().await?;

        let packet = self.receive().await?;

        match packet[0] {
            0x00 => {
                OkPacket::decode(packet)?;
            }

            0xFF => return Err(sql_error(ErrPacket::decode(packet)?)),

            0xFE => {
                let switch = AuthSwitch::decode(packet)?;
                let plugin = AuthPlugin::from_str(&switch.plugin_name)?;
                let response = plugin.scramble(password, &switch.plugin_data);

                self.write(response.as_slice());
                self.stream.flush().await?;
                self.receive_ok().await?;
            }

            id => {
                return Err(crate::error::protocol_err!(
                    "unexpected packet identifier 0x{:X} during COM_CHANGE_USER",
                    id
                ))
            }
        }

        self.statement_cache.clear();
        Ok(())
    }

    /// `COM_RESET_CONNECTION`: resets session state (transaction,
    /// temporary tables, user variables, prepared statements) while
    /// keeping the authenticated user and the socket. Cheaper than
    /// [`Connection::change_user`] for returning a connection to a clean
    /// state between pool checkouts.
    pub async fn reset(&mut self) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(ResetConnection);
        self.stream.flush().await?;
        self.receive_ok().await?;

        self.statement_cache.clear();
        Ok(())
    }

    /// `COM_SET_OPTION`: toggles `CLIENT_MULTI_STATEMENTS` for the
    /// remainder of the session. Unlike every other command here, the
    /// server replies with a bare `EOF_Packet` rather than `OK`.
    pub async fn set_option(&mut self, option: SetOption) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(SetOptionCommand { option });
        self.stream.flush().await?;

        EofPacket::decode(self.receive().await?)?;
        Ok(())
    }

    /// `COM_QUIT`: tells the server this connection is going away, then
    /// shuts down the socket. The server never replies; there is nothing
    /// to wait for.
    pub async fn close(mut self) -> crate::Result<()> {
        self.begin_command_phase();
        self.write(crate::protocol::Quit);
        self.stream.flush().await?;
        self.stream.shutdown(async_std::net::Shutdown::Both)?;
        Ok(())
    }

    pub async fn commit(&mut self) -> crate::Result<()> {
        self.run_statement("COMMIT").await
    }

    pub async fn rollback(&mut self) -> crate::Result<()> {
        self.run_statement("ROLLBACK").await
    }

    pub async fn set_autocommit(&mut self, enabled: bool) -> crate::Result<()> {
        self.run_statement(if enabled { "SET autocommit=1" } else { "SET autocommit=0" }).await
    }

    pub async fn set_read_only(&mut self, read_only: bool) -> crate::Result<()> {
        let sql = if read_only {
            "SET SESSION TRANSACTION READ ONLY"
        } else {
            "SET SESSION TRANSACTION READ WRITE"
        };
        self.run_statement(sql).await
    }

    pub async fn set_isolation_level(&mut self, level: IsolationLevel) -> crate::Result<()> {
        self.run_statement(&format!(
            "SET SESSION TRANSACTION ISOLATION LEVEL {}",
            level.as_sql()
        ))
        .await
    }

    pub async fn savepoint(&mut self, name: &str) -> crate::Result<()> {
        self.run_statement(&format!("SAVEPOINT {name}")).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> crate::Result<()> {
        self.run_statement(&format!("RELEASE SAVEPOINT {name}")).await
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> crate::Result<()> {
        self.run_statement(&format!("ROLLBACK TO SAVEPOINT {name}")).await
    }

    /// Runs `sql` and drains its result set; used for the fixed, OK-only
    /// statements above where the caller has no use for any rows.
    async fn run_statement(&mut self, sql: &str) -> crate::Result<()> {
        let mut rows = self.query(sql).await?;
        while rows.next().await?.is_some() {}
        Ok(())
    }

    /// Reads the response to a `COM_QUERY`/`COM_STMT_EXECUTE` request:
    /// either an immediate `OK` (no result set), an `ERR`, a `LOCAL
    /// INFILE` request (rejected, since this crate serves no local files),
    /// or a column count followed by `count` column definitions and the
    /// row stream itself.
    async fn begin_result_set(&mut self, binary: bool) -> crate::Result<RowStream<'_>> {
        let packet = self.receive().await?;

        match packet[0] {
            0x00 => {
                let ok = OkPacket::decode(packet)?;

                return Ok(RowStream {
                    conn: self,
                    columns: Arc::from(Vec::new()),
                    column_defs: Arc::from(Vec::new()),
                    binary,
                    state: RowStreamState::Done(ok),
                    cursor_statement_id: None,
                    buffered: std::collections::VecDeque::new(),
                });
            }

            0xFF => return Err(sql_error(ErrPacket::decode(packet)?)),

            LOCAL_INFILE_REQUEST => {
                self.begin_command_phase();
                self.write(&[][..]);
                self.stream.flush().await?;

                return Err(Error::protocol(
                    "server requested LOCAL INFILE, which this connection does not support",
                ));
            }

            _ => {}
        }

        let column_count = ColumnCount::decode(packet)?.columns as usize;
        let mut column_defs = Vec::with_capacity(column_count);

        for _ in 0..column_count {
            let packet = self.receive().await?;
            column_defs.push(ColumnDefinition::decode(packet)?);
        }

        self.receive_eof().await?;

        let columns: Arc<[ColumnMeta]> = column_defs
            .iter()
            .map(|c| ColumnMeta { type_id: c.type_id, unsigned: c.flags.contains(FieldFlags::UNSIGNED) })
            .collect::<Vec<_>>()
            .into();

        Ok(RowStream {
            conn: self,
            columns,
            column_defs: column_defs.into(),
            binary,
            state: RowStreamState::Rows,
            cursor_statement_id: None,
            buffered: std::collections::VecDeque::new(),
        })
    }
}

enum RowStreamState {
    Rows,
    Done(OkPacket),
}

/// How many rows a cursor-backed [`RowStream`] asks for per `COM_STMT_FETCH`
/// once the buffered batch runs dry.
const CURSOR_FETCH_BATCH: u32 = 32;

/// A result set still (partly) on the wire. Rows are pulled one at a time
/// with [`RowStream::next`]; the terminal `OK`/`EOF` packet's status and
/// affected-row count become available through [`RowStream::done`] once
/// the stream is exhausted.
///
/// When [`Connection::execute`] opened a read-only cursor, `next` fetches
/// batches transparently via [`Connection::fetch`] rather than reading
/// rows directly off the wire.
pub struct RowStream<'c> {
    conn: &'c mut Connection,
    columns: Arc<[ColumnMeta]>,
    column_defs: Arc<[ColumnDefinition]>,
    binary: bool,
    state: RowStreamState,
    cursor_statement_id: Option<u32>,
    buffered: std::collections::VecDeque<crate::protocol::Row>,
}

impl<'c> RowStream<'c> {
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.column_defs
    }

    /// The terminal packet, once the stream has been fully drained.
    /// `None` while rows remain.
    pub fn done(&self) -> Option<&OkPacket> {
        match &self.state {
            RowStreamState::Done(ok) => Some(ok),
            RowStreamState::Rows => None,
        }
    }

    pub async fn next(&mut self) -> crate::Result<Option<crate::protocol::Row>> {
        if let Some(row) = self.buffered.pop_front() {
            self.record_returned_row();
            return Ok(Some(row));
        }

        if matches!(self.state, RowStreamState::Done(_)) {
            return Ok(None);
        }

        if self.cursor_statement_id.is_some() {
            Box::pin(self.fetch_cursor_batch()).await?;
            let row = self.buffered.pop_front();
            if row.is_some() {
                self.record_returned_row();
            }
            return Ok(row);
        }

        let deprecate_eof = self.conn.capabilities.contains(Capabilities::DEPRECATE_EOF);

        let packet = self.conn.receive().await?;

        if packet[0] == 0xFF {
            return Err(sql_error(ErrPacket::decode(packet)?));
        }

        if let Some(ok) = decode_row_terminal(packet, deprecate_eof)? {
            self.state = RowStreamState::Done(ok);
            return Ok(None);
        }

        let row = if self.binary {
            crate::protocol::Row::decode_binary(packet, &self.columns)?
        } else {
            crate::protocol::Row::decode_text(packet, &self.columns)?
        };

        self.record_returned_row();
        Ok(Some(row))
    }

    fn record_returned_row(&self) {
        if let Some(metrics) = &self.conn.metrics {
            metrics.record_returned_rows(1);
        }
    }

    /// Pulls the next batch of rows through [`Connection::fetch`] and
    /// buffers them, closing the cursor once the server reports no more
    /// rows remain (`SERVER_STATUS_CURSOR_EXISTS` clear).
    async fn fetch_cursor_batch(&mut self) -> crate::Result<()> {
        let statement_id = self
            .cursor_statement_id
            .expect("fetch_cursor_batch called without an open cursor");

        let mut fetch = self
            .conn
            .fetch(statement_id, CURSOR_FETCH_BATCH, &self.columns, &self.column_defs)
            .await?;

        while let Some(row) = fetch.next().await? {
            self.buffered.push_back(row);
        }

        if let Some(ok) = fetch.done() {
            if !ok.status.contains(crate::protocol::Status::SERVER_STATUS_CURSOR_EXISTS) {
                self.cursor_statement_id = None;
                self.state = RowStreamState::Done(ok.clone());
            }
        }

        Ok(())
    }
}

/// Recognizes the fixed-length `0xFE` marker (`EOF`, or `OK` under
/// `DEPRECATE_EOF`) that terminates a row sequence, normalizing either one
/// to an [`OkPacket`]. Returns `None` for an ordinary row.
fn decode_row_terminal(packet: &[u8], deprecate_eof: bool) -> crate::Result<Option<OkPacket>> {
    let is_short_packet = packet.len() < 9;

    if packet[0] != 0xFE || !is_short_packet {
        return Ok(None);
    }

    if deprecate_eof {
        Ok(Some(OkPacket::decode(packet)?))
    } else {
        let eof = EofPacket::decode(packet)?;
        Ok(Some(OkPacket {
            affected_rows: 0,
            last_insert_id: 0,
            status: eof.status,
            warnings: eof.warnings,
            info: Box::default(),
        }))
    }
}

/// Encodes a bound parameter as `(binary-protocol type id, unsigned flag,
/// value bytes)` for `COM_STMT_EXECUTE`. Widens every integer to
/// `BIG_INT`/`DOUBLE` rather than picking the narrowest representation;
/// the server accepts any type id as long as the byte layout matches it.
fn encode_param(value: &MySqlValue) -> (u8, bool, Vec<u8>) {
    match value {
        MySqlValue::Null => (TypeId::NULL.0, false, Vec::new()),
        MySqlValue::Signed(v) => (TypeId::BIG_INT.0, false, v.to_le_bytes().to_vec()),
        MySqlValue::Unsigned(v) => (TypeId::BIG_INT.0, true, v.to_le_bytes().to_vec()),
        MySqlValue::Double(v) => (TypeId::DOUBLE.0, false, v.to_le_bytes().to_vec()),

        MySqlValue::Bytes(bytes) => {
            let mut buf = Vec::new();
            buf.put_bytes_lenenc::<LittleEndian>(bytes);
            (TypeId::VAR_CHAR.0, false, buf)
        }

        MySqlValue::Date { year, month, day } => {
            let mut buf = vec![4u8];
            buf.put_u16::<LittleEndian>(*year);
            buf.put_u8(*month);
            buf.put_u8(*day);
            (TypeId::DATE.0, false, buf)
        }

        MySqlValue::DateTime { year, month, day, hour, minute, second, microseconds } => {
            let mut buf = vec![11u8];
            buf.put_u16::<LittleEndian>(*year);
            buf.put_u8(*month);
            buf.put_u8(*day);
            buf.put_u8(*hour);
            buf.put_u8(*minute);
            buf.put_u8(*second);
            buf.put_u32::<LittleEndian>(*microseconds);
            (TypeId::DATETIME.0, false, buf)
        }

        MySqlValue::Time { negative, days, hours, minutes, seconds, microseconds } => {
            let mut buf = vec![12u8, *negative as u8];
            buf.put_u32::<LittleEndian>(*days);
            buf.put_u8(*hours);
            buf.put_u8(*minutes);
            buf.put_u8(*seconds);
            buf.put_u32::<LittleEndian>(*microseconds);
            (TypeId::TIME.0, false, buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_widens_integers_to_big_int() {
        let (type_id, unsigned, bytes) = encode_param(&MySqlValue::Signed(-7));
        assert_eq!(type_id, TypeId::BIG_INT.0);
        assert!(!unsigned);
        assert_eq!(bytes, (-7i64).to_le_bytes().to_vec());
    }

    #[test]
    fn it_encodes_null_with_an_empty_payload() {
        let (type_id, _, bytes) = encode_param(&MySqlValue::Null);
        assert_eq!(type_id, TypeId::NULL.0);
        assert!(bytes.is_empty());
    }

    #[test]
    fn it_prefixes_date_with_its_length_byte() {
        let (type_id, _, bytes) = encode_param(&MySqlValue::Date { year: 2024, month: 1, day: 2 });
        assert_eq!(type_id, TypeId::DATE.0);
        assert_eq!(bytes, vec![4, 0xE8, 0x07, 1, 2]);
    }

    #[test]
    fn isolation_level_renders_sql_keywords() {
        assert_eq!(IsolationLevel::RepeatableRead.as_sql(), "REPEATABLE READ");
    }
}
