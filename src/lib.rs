#![forbid(unsafe_code)]

#[macro_use]
pub mod error;

#[macro_use]
mod io;

mod auth;
mod cache;
mod protocol;
mod tls;

mod connection;
mod options;
mod value;

pub mod pool;

#[doc(inline)]
pub use error::{Error, Result};

pub use connection::Connection;
pub use options::{DatabaseTerm, MySqlConnectOptions, MySqlSslMode, SocketOptions};
pub use pool::{Pool, PoolConnection, PoolGaugeSnapshot, PoolOptions};
pub use protocol::{ColumnDefinition, Row};
pub use value::MySqlValue;

pub use connection::{IsolationLevel, PreparedStatement, RowStream};

// Named lifetimes used throughout the crate:
//  'c: the lifetime of a borrowed `Connection`
//  'a: the lifetime of borrowed packet/row bytes
