//! The connection phase: capability negotiation, the optional TLS short
//! handshake, authentication (including auth-switch and the
//! `caching_sha2_password`/`sha256_password` full-auth round trips), and
//! the handful of `SET` statements every new connection needs to behave
//! the way the rest of this crate assumes.

use std::str::FromStr;

use crate::auth::AuthPlugin;
use crate::cache::StatementCache;
use crate::connection::{sql_error, write_packet, Connection, MySqlStream};
use crate::error::Error;
use crate::io::{BufStream, MaybeTlsStream};
use crate::options::{DatabaseTerm, MySqlConnectOptions};
use crate::protocol::{
    AuthMoreData, AuthSwitch, Capabilities, Decode, Handshake, HandshakeResponse, OkPacket, Query,
};
use crate::{auth, tls};

/// `caching_sha2_password`'s `Auth-More-Data` marker bytes.
const FAST_AUTH_SUCCESS: u8 = 0x03;
const FULL_AUTH_REQUIRED: u8 = 0x04;
/// The client's request for the server's RSA public key, sent as a bare
/// single-byte packet when the full-auth exchange isn't happening over TLS.
const REQUEST_PUBLIC_KEY: u8 = 0x02;

const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;
/// `utf8mb4_unicode_ci`. `HandshakeResponse41`'s collation field is a
/// single byte, so collation ids above 255 (there are none below
/// `utf8mb4_0900_ai_ci`'s generation) can't be expressed here; `SET NAMES`
/// below is what actually pins the session to this collation.
const CLIENT_COLLATION: u8 = 224;

impl Connection {
    pub async fn establish(options: &MySqlConnectOptions) -> crate::Result<Self> {
        let tcp = MaybeTlsStream::connect(
            &options.host,
            options.port,
            options.connect_timeout,
            options.socket_options,
        )
        .await?;
        let mut stream = BufStream::new(tcp);

        let mut seq_no = 0u8;
        let mut rbuf = Vec::with_capacity(4096);

        let handshake_packet = read_packet(&mut stream, &mut seq_no, &mut rbuf).await?;
        let handshake = Handshake::decode(handshake_packet)?;

        let client_capabilities = Capabilities::PROTOCOL_41
            | Capabilities::IGNORE_SPACE
            | Capabilities::FOUND_ROWS
            | Capabilities::CONNECT_WITH_DB
            | Capabilities::SECURE_CONNECTION
            | Capabilities::PLUGIN_AUTH
            | Capabilities::PLUGIN_AUTH_LENENC_DATA
            | Capabilities::MULTI_RESULTS
            | Capabilities::TRANSACTIONS
            | Capabilities::SSL
            | Capabilities::DEPRECATE_EOF;

        let mut capabilities =
            (client_capabilities & handshake.server_capabilities) | Capabilities::PROTOCOL_41;

        let is_tls = tls::maybe_upgrade(
            &mut stream,
            &mut seq_no,
            handshake.server_capabilities,
            CLIENT_COLLATION,
            options,
        )
        .await?;

        if !is_tls {
            capabilities.remove(Capabilities::SSL);
        }

        let mut plugin = handshake
            .auth_plugin_name
            .as_deref()
            .map(AuthPlugin::from_str)
            .transpose()?
            .unwrap_or(AuthPlugin::MySqlNativePassword);

        let mut seed = handshake.auth_plugin_data.to_vec();
        let password = options.password.as_deref().unwrap_or("");

        let (initial_response, mut awaiting_rsa_key) =
            initial_auth_response(plugin, password, &seed, is_tls, options)?;

        // When the server treats `database` as a catalog rather than a schema,
        // selecting it up front in the handshake isn't meaningful; defer to an
        // explicit `COM_INIT_DB` once the connection is established instead.
        let handshake_database = match options.database_term {
            DatabaseTerm::Schema => options.database.as_deref(),
            DatabaseTerm::Catalog => None,
        };

        write_packet(
            &mut stream,
            &mut seq_no,
            &HandshakeResponse {
                client_collation: CLIENT_COLLATION,
                max_packet_size: DEFAULT_MAX_PACKET_SIZE,
                username: &options.username,
                database: handshake_database,
                auth_plugin_name: Some(plugin.name()),
                auth_response: Some(&initial_response),
            },
            capabilities,
        );
        stream.flush().await?;

        loop {
            let packet = read_packet(&mut stream, &mut seq_no, &mut rbuf).await?;

            match packet[0] {
                0x00 => {
                    OkPacket::decode(packet)?;
                    break;
                }

                0xFF => return Err(sql_error(crate::protocol::ErrPacket::decode(packet)?)),

                0xFE => {
                    let switch = AuthSwitch::decode(packet)?;
                    plugin = switch.plugin_name.parse()?;
                    seed = switch.plugin_data.to_vec();

                    let (response, awaiting_key) =
                        initial_auth_response(plugin, password, &seed, is_tls, options)?;
                    awaiting_rsa_key = awaiting_key;

                    write_packet(&mut stream, &mut seq_no, &response.as_slice(), capabilities);
                    stream.flush().await?;
                }

                0x01 => {
                    let more = AuthMoreData::decode(packet)?;

                    if awaiting_rsa_key {
                        let response = encrypt_with_server_key(password, &seed, &more.data)?;

                        if let Ok(pem) = std::str::from_utf8(&more.data) {
                            let _ = options.rsa_public_key_cache.set(pem.into());
                        }

                        write_packet(&mut stream, &mut seq_no, &response.as_slice(), capabilities);
                        stream.flush().await?;
                        awaiting_rsa_key = false;
                    } else {
                        match more.data.first() {
                            Some(&FAST_AUTH_SUCCESS) => {}

                            Some(&FULL_AUTH_REQUIRED) => {
                                let response: Vec<u8> = if is_tls {
                                    auth::clear_password_response(password)
                                } else if let Some(pem) = options.rsa_public_key_cache.get() {
                                    encrypt_with_server_key(password, &seed, pem.as_bytes())?
                                } else if options.allow_public_key_retrieval {
                                    awaiting_rsa_key = true;
                                    vec![REQUEST_PUBLIC_KEY]
                                } else {
                                    return Err(Error::auth(
                                        "server requested the RSA public key but \
                                         allow_public_key_retrieval is disabled and no key is \
                                         cached",
                                    ));
                                };

                                write_packet(&mut stream, &mut seq_no, &response.as_slice(), capabilities);
                                stream.flush().await?;
                            }

                            _ => {
                                return Err(crate::error::protocol_err!(
                                    "unexpected Auth-More-Data payload during authentication"
                                ))
                            }
                        }
                    }
                }

                id => {
                    return Err(crate::error::protocol_err!(
                        "unexpected packet identifier 0x{:X} during authentication",
                        id
                    ))
                }
            }
        }

        let mut conn = Connection {
            stream,
            capabilities,
            statement_cache: StatementCache::new(options.statement_cache_capacity),
            server_version: handshake.server_version,
            connection_id: handshake.connection_id,
            read_timeout: options.read_timeout,
            use_cursor_fetch: options.use_cursor_fetch,
            use_server_prep_stmts: options.use_server_prep_stmts,
            metrics: None,
            rbuf,
            next_seq_no: seq_no,
        };

        conn.begin_command_phase();
        conn.run_command(Query {
            sql: "SET sql_mode=(SELECT CONCAT(@@sql_mode, ',PIPES_AS_CONCAT,NO_ENGINE_SUBSTITUTION,NO_ZERO_DATE,NO_ZERO_IN_DATE'))",
        })
        .await?;

        conn.begin_command_phase();
        conn.run_command(Query { sql: "SET time_zone = '+00:00'" }).await?;

        conn.begin_command_phase();
        conn.run_command(Query {
            sql: "SET NAMES utf8mb4 COLLATE utf8mb4_unicode_ci",
        })
        .await?;

        if options.database_term == DatabaseTerm::Catalog {
            if let Some(database) = options.database.as_deref() {
                conn.use_database(database).await?;
            }
        }

        Ok(conn)
    }
}

impl Connection {
    /// Sends a single command packet and discards its OK response; used
    /// only for the post-connect session setup above, where no result set
    /// is expected.
    async fn run_command(&mut self, packet: impl crate::protocol::Encode) -> crate::Result<()> {
        self.write(packet);
        self.stream.flush().await?;
        self.receive_ok().await?;
        Ok(())
    }
}

/// Computes the bytes sent back as `auth_response` in `HandshakeResponse41`,
/// and whether the caller must now expect an immediate `Auth-More-Data`
/// carrying the server's RSA public key (true only for `sha256_password`
/// off TLS, which skips the `caching_sha2_password` fast-path negotiation
/// entirely and asks for the key up front).
fn initial_auth_response(
    plugin: AuthPlugin,
    password: &str,
    seed: &[u8],
    is_tls: bool,
    options: &MySqlConnectOptions,
) -> crate::Result<(Vec<u8>, bool)> {
    if password.is_empty() {
        return Ok((Vec::new(), false));
    }

    Ok(match plugin {
        AuthPlugin::Sha256Password if is_tls => (auth::clear_password_response(password), false),

        AuthPlugin::Sha256Password => match options.rsa_public_key_cache.get() {
            Some(pem) => (encrypt_with_server_key(password, seed, pem.as_bytes())?, false),
            None if options.allow_public_key_retrieval => (vec![REQUEST_PUBLIC_KEY], true),
            None => {
                return Err(Error::auth(
                    "server requested the RSA public key but allow_public_key_retrieval is \
                     disabled and no key is cached",
                ))
            }
        },

        _ => (plugin.scramble(password, seed), false),
    })
}

#[cfg(feature = "rsa-auth")]
fn encrypt_with_server_key(password: &str, seed: &[u8], pem: &[u8]) -> crate::Result<Vec<u8>> {
    let pem = std::str::from_utf8(pem)
        .map_err(|_| Error::auth("server RSA public key was not valid UTF-8"))?;

    auth::encrypt_rsa(password, seed, pem)
}

#[cfg(not(feature = "rsa-auth"))]
fn encrypt_with_server_key(_password: &str, _seed: &[u8], _pem: &[u8]) -> crate::Result<Vec<u8>> {
    Err(Error::auth(
        "server requested full RSA authentication but this build was compiled without the \
         `rsa-auth` feature",
    ))
}

/// Reads one packet during the connection phase, before `Connection::rbuf`
/// exists in its final home.
async fn read_packet<'a>(
    stream: &mut MySqlStream,
    seq_no: &mut u8,
    rbuf: &'a mut Vec<u8>,
) -> crate::Result<&'a [u8]> {
    use byteorder::LittleEndian;
    use crate::io::Buf;

    rbuf.clear();

    let mut header = stream.peek(4).await?;
    let payload_len = header.get_uint::<LittleEndian>(3)? as usize;

    let received_seq_no = header.get_u8()?;
    if received_seq_no != *seq_no {
        return Err(crate::error::protocol_err!(
            "bad sequence id: expected {}, got {}",
            *seq_no,
            received_seq_no
        ));
    }
    *seq_no = received_seq_no.wrapping_add(1);

    stream.consume(4);

    let payload = stream.peek(payload_len).await?;
    rbuf.extend_from_slice(payload);
    stream.consume(payload_len);

    Ok(&rbuf[..payload_len])
}
