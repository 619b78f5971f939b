use rand::rngs::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;

use crate::error::Error;

/// Encrypts `password` for the RSA full-auth exchange used by
/// `caching_sha2_password` and `sha256_password` when the connection is not
/// already protected by TLS: the nul-terminated password is XORed byte-wise
/// against a repeating copy of `nonce`, then RSA/OAEP(SHA-1)-encrypted with
/// the server's public key (delivered PEM-encoded in `AuthMoreData`).
pub(crate) fn encrypt_rsa(password: &str, nonce: &[u8], public_key_pem: &str) -> crate::Result<Vec<u8>> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|err| Error::auth(format!("invalid RSA public key from server: {err}")))?;

    let mut payload: Vec<u8> = password.bytes().chain(std::iter::once(0)).collect();
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= nonce[i % nonce.len()];
    }

    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &payload)
        .map_err(|err| Error::auth(format!("RSA encryption of password failed: {err}")))
}

#[cfg(all(test, feature = "rsa-auth"))]
mod tests {
    use super::*;

    const TEST_PUBLIC_KEY: &str = "-----BEGIN PUBLIC KEY-----\nMIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAwnXi3nr9TmN+NF49A3Y7\nUBnAVhApNJy2cmuf/y6vFM9eHFu5T80Ij1qYc6c79oAGA8nNNCFQL+0j5De88cln\nKrlzq/Ab3U+j5SqgNwk//F6Y3iyjV4L7feSDqjpcheFzkjEslbm/yoRwQ78AAU6s\nqA0hcFuh66mcvnotDrvZAGQ8U2EbbZa6oiR3wrgbzifSKq767g65zIrCpoyxzKMH\nAETSDIaMKpFio4dRATKT5ASQtPoIyxSBmjRtc22sqlhEeiejEMsJzd6Bliuait+A\nkTXL6G1Tbam26Dok/L88CnTAWAkLwTA3bjPcS8Zl9gTsJvoiMuwW1UPEVV/aJ11Z\n/wIDAQAB\n-----END PUBLIC KEY-----\n";

    #[test]
    fn it_encrypts_to_the_modulus_length() {
        let out = encrypt_rsa("hunter2", b"0123456789012345678901234567890", TEST_PUBLIC_KEY).unwrap();
        // a 2048-bit RSA modulus produces a 256-byte ciphertext
        assert_eq!(out.len(), 256);
    }
}
