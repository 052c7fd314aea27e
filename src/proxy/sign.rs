//! CouchDB proxy-authentication token.
//!
//! CouchDB verifies `X-Auth-CouchDB-Token` as the HMAC-SHA1 of the user
//! name keyed by the shared `[chttpd_auth] secret`. The token carries no
//! nonce or timestamp, so the same pair always yields the same value.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Compute the lowercase hex HMAC-SHA1 of `user` keyed by `secret`.
#[must_use]
pub fn sign(user: &str, secret: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(user.as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}
