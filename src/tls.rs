//! TLS "short handshake" upgrade: an `SslRequest` packet sent in place of
//! `HandshakeResponse41`, after which the socket is upgraded to TLS before
//! the real `HandshakeResponse41` (and everything after it) is sent. The
//! sequence id started in the plaintext exchange carries over unchanged.

use async_native_tls::TlsConnector;
use native_tls::Certificate;

use crate::connection::MySqlStream;
use crate::error::Error;
use crate::options::{MySqlConnectOptions, MySqlSslMode};
use crate::protocol::{Capabilities, SslRequest};

/// Upgrades `stream` to TLS if `options.ssl_mode` and the server's
/// advertised capabilities agree that it should. Returns whether the
/// connection is now encrypted.
pub(crate) async fn maybe_upgrade(
    stream: &mut MySqlStream,
    seq_no: &mut u8,
    server_capabilities: Capabilities,
    client_collation: u8,
    options: &MySqlConnectOptions,
) -> crate::Result<bool> {
    match options.ssl_mode {
        MySqlSslMode::Disabled => Ok(false),

        MySqlSslMode::Preferred => {
            upgrade(stream, seq_no, server_capabilities, client_collation, options).await
        }

        MySqlSslMode::Required | MySqlSslMode::VerifyCa | MySqlSslMode::VerifyIdentity => {
            if upgrade(stream, seq_no, server_capabilities, client_collation, options).await? {
                Ok(true)
            } else {
                Err(Error::Tls("server does not support TLS".into()))
            }
        }
    }
}

async fn upgrade(
    stream: &mut MySqlStream,
    seq_no: &mut u8,
    server_capabilities: Capabilities,
    client_collation: u8,
    options: &MySqlConnectOptions,
) -> crate::Result<bool> {
    if !server_capabilities.contains(Capabilities::SSL) {
        return Ok(false);
    }

    stream.buffer_mut().clear();
    crate::connection::write_packet(
        stream,
        seq_no,
        &SslRequest {
            max_packet_size: crate::connection::MAX_PACKET_SIZE,
            client_collation,
        },
        server_capabilities,
    );
    stream.flush().await?;

    let accept_invalid_certs =
        !matches!(options.ssl_mode, MySqlSslMode::VerifyCa | MySqlSslMode::VerifyIdentity);
    let accept_invalid_hostnames = !matches!(options.ssl_mode, MySqlSslMode::VerifyIdentity);

    let mut connector = TlsConnector::new()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .danger_accept_invalid_hostnames(accept_invalid_hostnames);

    if !accept_invalid_certs {
        if let Some(ca_path) = &options.ssl_ca {
            let pem = async_std::fs::read(ca_path).await?;
            let cert = Certificate::from_pem(&pem).map_err(|err| Error::Tls(err.to_string().into()))?;
            connector = connector.add_root_certificate(cert);
        }
    }

    stream.stream.upgrade(&options.host, connector).await?;

    Ok(true)
}
