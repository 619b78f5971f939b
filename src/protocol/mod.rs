//! Packet-level codec: one type per MySQL wire message, each either
//! `Encode` (client → server) or `Decode` (server → client). This module
//! has no knowledge of sockets or sequencing; see [`crate::connection`]
//! for the framer that turns a byte stream into these types.

mod auth_switch;
mod capabilities;
mod column_count;
mod column_def;
mod eof;
mod err;
mod field;
mod handshake;
mod handshake_response;
mod ok;
mod row;
mod ssl_request;
mod statement;
mod status;
mod text;
mod type_id;

pub use auth_switch::{AuthMoreData, AuthSwitch};
pub use capabilities::Capabilities;
pub use column_count::ColumnCount;
pub use column_def::ColumnDefinition;
pub use eof::EofPacket;
pub use err::ErrPacket;
pub use field::FieldFlags;
pub use handshake::Handshake;
pub use handshake_response::HandshakeResponse;
pub use ok::OkPacket;
pub use row::{ColumnMeta, Row};
pub use ssl_request::SslRequest;
pub use statement::{
    BoundParameter, Cursor, StmtClose, StmtExecute, StmtFetch, StmtPrepare, StmtPrepareOk,
    StmtReset, StmtSendLongData,
};
pub use status::Status;
pub use text::{
    ChangeUser, InitDb, Ping, Query, ResetConnection, SetOption, SetOptionCommand, Statistics,
    Quit,
};
pub use type_id::TypeId;

use crate::io::BufMut;

/// Converts a value into the bytes of a single packet payload, given the
/// capability set negotiated for the connection (some fields are only
/// present, or are a different width, under certain capabilities).
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>, capabilities: Capabilities);
}

/// Parses a single packet payload (already stripped of its 4-byte
/// length+sequence header) into a value.
pub trait Decode: Sized {
    fn decode(buf: &[u8]) -> crate::Result<Self>;
}

impl Encode for &'_ [u8] {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_bytes(self);
    }
}
