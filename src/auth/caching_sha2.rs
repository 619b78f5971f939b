use sha2::{Digest, Sha256};

use crate::auth::xor_eq;

/// `SHA256(password) XOR SHA256(seed + SHA256(SHA256(password)))`, shared
/// by `caching_sha2_password` and `sha256_password` as the fast-path
/// scramble the client offers before the server can demand full auth.
/// https://mariadb.com/kb/en/caching_sha2_password-authentication-plugin/#sha-2-encrypted-password
pub(crate) fn scramble(password: &str, seed: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();

    hasher.update(password);
    let pw_hash = hasher.finalize_reset();

    hasher.update(pw_hash);
    let pw_hash_hash = hasher.finalize_reset();

    hasher.update(seed);
    hasher.update(pw_hash_hash);
    let seed_hash_hash = hasher.finalize();

    let mut out = [0u8; 32];
    out.copy_from_slice(&pw_hash);
    xor_eq(&mut out, &seed_hash_hash);
    out
}

/// Markers sent in `AuthMoreData` during the caching_sha2_password
/// fast-auth check.
pub(crate) const FAST_AUTH_SUCCESS: u8 = 0x03;
pub(crate) const FULL_AUTH_REQUIRED: u8 = 0x04;

/// Client's request for the server's RSA public key, sent as the entire
/// body of a plain (non-AuthMoreData-wrapped) packet during full auth over
/// an unencrypted connection.
pub(crate) const REQUEST_PUBLIC_KEY: u8 = 0x02;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_scrambles_deterministically() {
        let a = scramble("hunter2", b"0123456789012345678901234567890");
        let b = scramble("hunter2", b"0123456789012345678901234567890");
        assert_eq!(a, b);
    }
}
