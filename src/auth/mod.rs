//! Authentication plugins: `mysql_native_password`, `caching_sha2_password`,
//! `sha256_password`, and `mysql_clear_password`. Each plugin turns a
//! password and a server-supplied nonce into the bytes sent back as the
//! initial `auth_response` (or, for the two SHA-2 plugins, into the RSA
//! full-auth payload sent in reply to an `AuthMoreData` request).

mod caching_sha2;
mod clear_password;
mod native_password;
#[cfg(feature = "rsa-auth")]
mod sha256;

use std::str::FromStr;

use crate::error::Error;

pub(crate) use caching_sha2::scramble as scramble_caching_sha2;
pub(crate) use clear_password::response as clear_password_response;
pub(crate) use native_password::scramble as scramble_native;
#[cfg(feature = "rsa-auth")]
pub(crate) use sha256::encrypt_rsa;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthPlugin {
    MySqlNativePassword,
    CachingSha2Password,
    Sha256Password,
    MySqlClearPassword,
}

impl AuthPlugin {
    pub fn name(self) -> &'static str {
        match self {
            AuthPlugin::MySqlNativePassword => "mysql_native_password",
            AuthPlugin::CachingSha2Password => "caching_sha2_password",
            AuthPlugin::Sha256Password => "sha256_password",
            AuthPlugin::MySqlClearPassword => "mysql_clear_password",
        }
    }

    /// The initial auth response sent in `HandshakeResponse41`, computed
    /// against the nonce handed out in the `Handshake` (or `AuthSwitch`)
    /// packet. For the SHA-2 plugins this is a scrambled guess; the server
    /// may still demand a full RSA-encrypted exchange via `AuthMoreData`.
    ///
    /// An empty password always produces an empty response: there is
    /// nothing to scramble, and every plugin recognizes a zero-length
    /// response as "no password" rather than attempting to authenticate
    /// against it.
    pub fn scramble(self, password: &str, nonce: &[u8]) -> Vec<u8> {
        if password.is_empty() {
            return Vec::new();
        }

        match self {
            AuthPlugin::MySqlNativePassword => native_password::scramble(password, nonce).to_vec(),
            AuthPlugin::CachingSha2Password | AuthPlugin::Sha256Password => {
                caching_sha2::scramble(password, nonce).to_vec()
            }
            AuthPlugin::MySqlClearPassword => clear_password::response(password),
        }
    }
}

impl FromStr for AuthPlugin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql_native_password" => Ok(AuthPlugin::MySqlNativePassword),
            "caching_sha2_password" => Ok(AuthPlugin::CachingSha2Password),
            "sha256_password" => Ok(AuthPlugin::Sha256Password),
            "mysql_clear_password" => Ok(AuthPlugin::MySqlClearPassword),

            _ => Err(crate::error::protocol_err!(
                "unsupported authentication plugin: {}",
                s
            )),
        }
    }
}

/// `a ^= b`, truncated to the shorter of the two slices. Used to combine a
/// password hash with a seed-derived hash in the native/SHA-2 scramble
/// algorithms.
pub(crate) fn xor_eq(a: &mut [u8], b: &[u8]) {
    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x ^= y;
    }
}
