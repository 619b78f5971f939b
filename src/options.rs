//! [`MySqlConnectOptions`]: the builder and connection-URL parser that
//! [`crate::connection::Connection::establish`] consumes.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::error::Error;

/// Controls whether, and how strictly, a connection is upgraded to TLS
/// during the connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MySqlSslMode {
    /// Never attempt a TLS upgrade.
    Disabled,

    /// Attempt a TLS upgrade; fall back to a plaintext connection if the
    /// server doesn't support it. The default.
    Preferred,

    /// Require TLS; fail the connection attempt if the server can't
    /// negotiate it. Does not validate the server's certificate.
    Required,

    /// Like `Required`, and additionally verify the server's certificate
    /// against `ssl_ca` (or the platform trust store if unset).
    VerifyCa,

    /// Like `VerifyCa`, and additionally verify the certificate's hostname
    /// against the host being connected to.
    VerifyIdentity,
}

impl Default for MySqlSslMode {
    fn default() -> Self {
        MySqlSslMode::Preferred
    }
}

impl FromStr for MySqlSslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "DISABLED" => MySqlSslMode::Disabled,
            "PREFERRED" => MySqlSslMode::Preferred,
            "REQUIRED" => MySqlSslMode::Required,
            "VERIFY_CA" => MySqlSslMode::VerifyCa,
            "VERIFY_IDENTITY" => MySqlSslMode::VerifyIdentity,

            _ => return Err(Error::configuration(format!("unknown SSL mode: {s:?}"))),
        })
    }
}

/// Whether the initial schema/catalog is selected during the handshake
/// (`Schema`, the common case) or via an explicit `COM_INIT_DB` issued
/// right after connecting (`Catalog`, for servers that distinguish the
/// two and don't accept a catalog name in `HandshakeResponse41`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseTerm {
    Catalog,
    Schema,
}

impl Default for DatabaseTerm {
    fn default() -> Self {
        DatabaseTerm::Schema
    }
}

impl FromStr for DatabaseTerm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "CATALOG" => DatabaseTerm::Catalog,
            "SCHEMA" => DatabaseTerm::Schema,
            _ => return Err(Error::configuration(format!("unknown database term: {s:?}"))),
        })
    }
}

/// TCP-level tuning applied to the socket right after it connects.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub(crate) tcp_nodelay: bool,
    pub(crate) tcp_keepalive: Option<Duration>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        SocketOptions {
            tcp_nodelay: true,
            tcp_keepalive: None,
        }
    }
}

impl SocketOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    pub fn tcp_keepalive(mut self, keepalive: impl Into<Option<Duration>>) -> Self {
        self.tcp_keepalive = keepalive.into();
        self
    }
}

const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 100;

/// Options and flags configuring a single MySQL connection: where to
/// connect, who to authenticate as, and how to negotiate TLS.
///
/// Can be built up with the setter methods below, or parsed from a
/// connection URL of the form:
///
/// ```text
/// mysql://[user[:password]@]host[:port][/database][?ssl-mode=...&ssl-ca=...]
/// ```
#[derive(Debug, Clone)]
pub struct MySqlConnectOptions {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) username: String,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) ssl_mode: MySqlSslMode,
    pub(crate) ssl_ca: Option<PathBuf>,
    pub(crate) statement_cache_capacity: usize,

    pub(crate) socket_options: SocketOptions,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) connect_timeout: Option<Duration>,

    /// Controls the `sha256_password`/`caching_sha2_password` plaintext
    /// fallback: whether the client may request the server's RSA public
    /// key over an unencrypted connection when no key is already cached.
    pub(crate) allow_public_key_retrieval: bool,

    pub(crate) database_term: DatabaseTerm,
    pub(crate) use_cursor_fetch: bool,
    pub(crate) use_server_prep_stmts: bool,

    /// The server's RSA public key, fetched the first time
    /// `caching_sha2_password`/`sha256_password` full-auth runs over a
    /// plaintext connection. Shared across clones of these options (e.g.
    /// repeated reconnects from the same pool) so later connections skip
    /// the extra request-key round trip.
    pub(crate) rsa_public_key_cache: Arc<OnceCell<Box<str>>>,
}

impl Default for MySqlConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MySqlConnectOptions {
    pub fn new() -> Self {
        Self {
            host: String::from("localhost"),
            port: 3306,
            username: String::from("root"),
            password: None,
            database: None,
            ssl_mode: MySqlSslMode::Preferred,
            ssl_ca: None,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
            socket_options: SocketOptions::default(),
            read_timeout: None,
            connect_timeout: None,
            allow_public_key_retrieval: true,
            database_term: DatabaseTerm::default(),
            use_cursor_fetch: false,
            use_server_prep_stmts: true,
            rsa_public_key_cache: Arc::new(OnceCell::new()),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn ssl_mode(mut self, mode: MySqlSslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn ssl_ca(mut self, file_name: impl Into<PathBuf>) -> Self {
        self.ssl_ca = Some(file_name.into());
        self
    }

    /// How many prepared statements [`crate::connection::Connection`]
    /// keeps cached by SQL text before evicting the least-recently-used
    /// one. Defaults to 100.
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// TCP-level tuning (`TCP_NODELAY`, keepalive) applied to the socket
    /// right after it connects. Defaults to `TCP_NODELAY` on, no keepalive.
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.socket_options = options;
        self
    }

    /// Caps how long a single socket read may take once connected. `None`
    /// (the default) never times out a read.
    pub fn read_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.read_timeout = timeout.into();
        self
    }

    /// Caps how long the initial TCP connect may take. `None` (the
    /// default) defers entirely to the OS connect timeout.
    pub fn connect_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.connect_timeout = timeout.into();
        self
    }

    /// If `false`, a `sha256_password`/`caching_sha2_password` full-auth
    /// exchange that would otherwise request the server's RSA public key
    /// over a plaintext connection instead fails with [`Error::Auth`]
    /// unless a key is already cached. Defaults to `true`.
    pub fn allow_public_key_retrieval(mut self, allow: bool) -> Self {
        self.allow_public_key_retrieval = allow;
        self
    }

    /// Whether the initial database is selected during the handshake
    /// (`Schema`, the default) or via an explicit `COM_INIT_DB` issued
    /// right after connecting (`Catalog`).
    pub fn database_term(mut self, term: DatabaseTerm) -> Self {
        self.database_term = term;
        self
    }

    /// Enables server-side cursors for prepared statement results; only
    /// takes effect when [`use_server_prep_stmts`](Self::use_server_prep_stmts)
    /// is also enabled. Defaults to `false`.
    pub fn use_cursor_fetch(mut self, enabled: bool) -> Self {
        self.use_cursor_fetch = enabled;
        self
    }

    /// Gates, together with [`use_cursor_fetch`](Self::use_cursor_fetch),
    /// whether `execute_prepared` opens a server-side cursor. Defaults to
    /// `true`.
    pub fn use_server_prep_stmts(mut self, enabled: bool) -> Self {
        self.use_server_prep_stmts = enabled;
        self
    }
}

impl FromStr for MySqlConnectOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let url = url::Url::parse(s)?;
        let mut options = Self::new();

        if let Some(host) = url.host_str() {
            options = options.host(host);
        }

        if let Some(port) = url.port() {
            options = options.port(port);
        }

        let username = url.username();
        if !username.is_empty() {
            options = options.username(username);
        }

        if let Some(password) = url.password() {
            options = options.password(password);
        }

        let path = url.path().trim_start_matches('/');
        if !path.is_empty() {
            options = options.database(path);
        }

        for (key, value) in url.query_pairs() {
            match &*key {
                "ssl-mode" => options = options.ssl_mode(value.parse()?),
                "ssl-ca" => options = options.ssl_ca(value.into_owned()),
                "statement-cache-capacity" => {
                    let capacity = value
                        .parse()
                        .map_err(|_| Error::configuration("statement-cache-capacity must be an integer"))?;
                    options = options.statement_cache_capacity(capacity);
                }
                "read-timeout-ms" => {
                    let millis = value
                        .parse()
                        .map_err(|_| Error::configuration("read-timeout-ms must be an integer"))?;
                    options = options.read_timeout(Duration::from_millis(millis));
                }
                "connect-timeout-ms" => {
                    let millis = value
                        .parse()
                        .map_err(|_| Error::configuration("connect-timeout-ms must be an integer"))?;
                    options = options.connect_timeout(Duration::from_millis(millis));
                }
                "allow-public-key-retrieval" => {
                    let allow = value
                        .parse()
                        .map_err(|_| Error::configuration("allow-public-key-retrieval must be a bool"))?;
                    options = options.allow_public_key_retrieval(allow);
                }
                "database-term" => options = options.database_term(value.parse()?),
                "use-cursor-fetch" => {
                    let enabled = value
                        .parse()
                        .map_err(|_| Error::configuration("use-cursor-fetch must be a bool"))?;
                    options = options.use_cursor_fetch(enabled);
                }
                "use-server-prep-stmts" => {
                    let enabled = value
                        .parse()
                        .map_err(|_| Error::configuration("use-server-prep-stmts must be a bool"))?;
                    options = options.use_server_prep_stmts(enabled);
                }
                _ => {}
            }
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_a_connection_url() {
        let options: MySqlConnectOptions =
            "mysql://user:pw@db.example.com:3307/my_db?ssl-mode=required"
                .parse()
                .unwrap();

        assert_eq!(options.host, "db.example.com");
        assert_eq!(options.port, 3307);
        assert_eq!(options.username, "user");
        assert_eq!(options.password.as_deref(), Some("pw"));
        assert_eq!(options.database.as_deref(), Some("my_db"));
        assert_eq!(options.ssl_mode, MySqlSslMode::Required);
    }

    #[test]
    fn it_defaults_to_localhost_root() {
        let options = MySqlConnectOptions::new();

        assert_eq!(options.host, "localhost");
        assert_eq!(options.port, 3306);
        assert_eq!(options.username, "root");
        assert!(options.password.is_none());
    }
}
