use byteorder::LittleEndian;

use crate::io::BufMut;
use crate::protocol::{Capabilities, Encode};

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_query.html
#[derive(Debug)]
pub struct Query<'a> {
    pub sql: &'a str,
}

impl Encode for Query<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x03);
        buf.put_str(self.sql);
    }
}

// https://dev.mysql.com/doc/internals/en/com-ping.html
#[derive(Debug)]
pub struct Ping;

impl Encode for Ping {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x0e);
    }
}

// https://dev.mysql.com/doc/internals/en/com-quit.html
#[derive(Debug)]
pub struct Quit;

impl Encode for Quit {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x01);
    }
}

// https://dev.mysql.com/doc/internals/en/com-init-db.html
#[derive(Debug)]
pub struct InitDb<'a> {
    pub schema: &'a str,
}

impl Encode for InitDb<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x02);
        buf.put_str(self.schema);
    }
}

// https://dev.mysql.com/doc/internals/en/com-change-user.html
//
// Re-authenticates an open connection as a different user without
// reconnecting the socket; the pool uses this to recycle a connection
// for a different logical tenant without paying a new TCP + TLS cost.
#[derive(Debug)]
pub struct ChangeUser<'a> {
    pub username: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin_name: &'a str,
    pub client_collation: u8,
}

impl Encode for ChangeUser<'_> {
    fn encode(&self, buf: &mut Vec<u8>, capabilities: Capabilities) {
        buf.put_u8(0x11);
        buf.put_str_nul(self.username);

        if capabilities.contains(Capabilities::SECURE_CONNECTION) {
            buf.put_u8(self.auth_response.len() as u8);
            buf.put_bytes(self.auth_response);
        } else {
            buf.put_bytes(self.auth_response);
            buf.put_u8(0);
        }

        buf.put_str_nul(self.database.unwrap_or(""));
        buf.put_u16::<LittleEndian>(self.client_collation as u16);

        if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            buf.put_str_nul(self.auth_plugin_name);
        }
    }
}

// https://dev.mysql.com/doc/internals/en/com-statistics.html
#[derive(Debug)]
pub struct Statistics;

impl Encode for Statistics {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x09);
    }
}

// https://dev.mysql.com/doc/internals/en/com-reset-connection.html
//
// Resets session state (transaction, temp tables, user variables) while
// keeping the TCP/TLS connection and authenticated user; cheaper than
// `ChangeUser` when the pool only needs a clean session for the same
// user before handing a connection to the next acquirer.
#[derive(Debug)]
pub struct ResetConnection;

impl Encode for ResetConnection {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x1f);
    }
}

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/mysql__com_8h.html#a53f60000da139fc7d547db96635a2c02
#[derive(Debug, Copy, Clone)]
#[repr(u16)]
pub enum SetOption {
    MultiStatementsOn = 0x00,
    MultiStatementsOff = 0x01,
}

// https://dev.mysql.com/doc/internals/en/com-set-option.html
#[derive(Debug)]
pub struct SetOptionCommand {
    pub option: SetOption,
}

impl Encode for SetOptionCommand {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        buf.put_u8(0x1a);
        buf.put_u16::<LittleEndian>(self.option as u16);
    }
}
