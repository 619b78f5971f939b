use memchr::memchr;
use sha1::{Digest, Sha1};

use crate::auth::xor_eq;

/// `SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))`
/// https://mariadb.com/kb/en/connection/#mysql_native_password-plugin
pub(crate) fn scramble(password: &str, seed: &[u8]) -> [u8; 20] {
    // the seed handed out in the handshake is nul-terminated
    let seed = &seed[..memchr(b'\0', seed).unwrap_or(seed.len())];

    let mut hasher = Sha1::new();

    hasher.update(password);
    let pw_hash = hasher.finalize_reset();

    hasher.update(pw_hash);
    let pw_hash_hash = hasher.finalize_reset();

    hasher.update(seed);
    hasher.update(pw_hash_hash);
    let seed_hash_hash = hasher.finalize();

    let mut out = [0u8; 20];
    out.copy_from_slice(&pw_hash);
    xor_eq(&mut out, &seed_hash_hash);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_scrambles_deterministically() {
        let a = scramble("hunter2", b"01234567890123456789\0");
        let b = scramble("hunter2", b"01234567890123456789\0");
        assert_eq!(a, b);

        let c = scramble("hunter3", b"01234567890123456789\0");
        assert_ne!(a, c);
    }
}
