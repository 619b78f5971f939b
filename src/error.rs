//! Error and Result types.

use std::io;

use thiserror::Error as ThisError;

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a connection, authentication handshake, TLS upgrade, or pool
/// operation can fail.
///
/// `Sql` is the only non-fatal variant: it wraps a server `ERR_Packet` and
/// leaves the connection usable for the next command. Every other variant
/// poisons the connection it occurred on; see [`Error::is_fatal`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// Transport failure: the socket reset, closed mid-packet, or timed
    /// out below the framing layer.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Connection URL was malformed.
    #[error("invalid connection url: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A packet did not parse as the message it was expected to be, or an
    /// invariant of the wire protocol (sequence id, header byte, lenenc
    /// framing) was violated.
    #[error("protocol error: {0}")]
    Protocol(Box<str>),

    /// Authentication failed, or an auth-switch/auth-more-data exchange
    /// could not be completed (unsupported plugin, bad credentials,
    /// malformed RSA exchange).
    #[error("authentication error: {0}")]
    Auth(Box<str>),

    /// The server replied with an `ERR_Packet`.
    #[error("server error {code} ({sqlstate}): {message}")]
    Sql {
        code: u16,
        sqlstate: Box<str>,
        message: Box<str>,
    },

    /// TLS negotiation failed.
    #[error("tls error: {0}")]
    Tls(Box<str>),

    /// [`Pool::close`](crate::pool::Pool::close) was called while a task
    /// was waiting in [`Pool::acquire`](crate::pool::Pool::acquire), or a
    /// new acquire was attempted after close.
    #[error("pool is closed")]
    PoolClosed,

    /// `acquire()` did not obtain a permit or an idle connection within
    /// `acquire_timeout`.
    #[error("timed out while waiting for a connection")]
    AcquireTimeout,

    /// `try_acquire()` found the pool at `max_connections` with no idle
    /// connection available.
    #[error("pool exhausted")]
    PoolExhausted,

    /// The in-flight operation was cancelled before completion; the
    /// connection it ran on is discarded rather than returned to the
    /// pool, since its protocol state is now unknown.
    #[error("operation cancelled")]
    Cancelled,

    /// A column or row value could not be decoded into the requested
    /// shape.
    #[error("decode error: {0}")]
    Decode(Box<str>),

    /// The options builder or connection string was missing a required
    /// field or carried a value the protocol cannot express.
    #[error("invalid configuration: {0}")]
    Configuration(Box<str>),
}

impl Error {
    pub(crate) fn protocol(msg: impl Into<Box<str>>) -> Self {
        Error::Protocol(msg.into())
    }

    pub(crate) fn auth(msg: impl Into<Box<str>>) -> Self {
        Error::Auth(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<Box<str>>) -> Self {
        Error::Decode(msg.into())
    }

    pub(crate) fn configuration(msg: impl Into<Box<str>>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Whether this error poisons the connection it occurred on. Only a
    /// server `ERR_Packet` (`Sql`) leaves a connection fit for reuse.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Sql { .. })
    }
}

impl From<io::ErrorKind> for Error {
    #[inline]
    fn from(err: io::ErrorKind) -> Self {
        Error::Io(err.into())
    }
}

#[cfg(feature = "rsa-auth")]
impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::Auth(err.to_string().into_boxed_str())
    }
}

impl From<async_native_tls::Error> for Error {
    #[inline]
    fn from(err: async_native_tls::Error) -> Self {
        Error::Tls(err.to_string().into_boxed_str())
    }
}

/// Used by the `protocol_err!()` macro so call sites read like a
/// `format!()` call instead of an explicit `Error::protocol(format!(...))`.
macro_rules! protocol_err {
    ($($args:tt)*) => {
        $crate::error::Error::protocol(format!($($args)*))
    };
}

pub(crate) use protocol_err;
