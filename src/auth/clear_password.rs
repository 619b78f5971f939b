/// `mysql_clear_password` sends the password as-is, nul-terminated. Only
/// safe over a TLS-protected connection; `MySqlSslMode` enforcement of that
/// lives in [`crate::tls`], not here.
pub(crate) fn response(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() + 1);
    out.extend_from_slice(password.as_bytes());
    out.push(0);
    out
}
