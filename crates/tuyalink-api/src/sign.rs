// Request signing
//
// Every call to the open API carries an HMAC-SHA256 signature over the
// client id, the current access token, a millisecond timestamp and a
// canonical rendering of the request. The functions here are pure so the
// contract can be checked without a server.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Value of the `sign_method` header.
pub const SIGN_METHOD: &str = "HMAC-SHA256";

/// Build the canonical string for a request.
///
/// `METHOD\n` + lowercase sha256 hex of `body` + `\n` + `\n` + path, with
/// `?k1=v1&k2=v2` appended in key order when the query is non-empty.
/// Pass `""` as `body` for requests without one.
pub fn canonical_string(method: &str, path: &str, query: &BTreeMap<String, String>, body: &str) -> String {
    let content_hash = hex::encode(Sha256::digest(body.as_bytes()));

    let mut canonical = format!("{method}\n{content_hash}\n\n{path}");
    if !query.is_empty() {
        let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        canonical.push('?');
        canonical.push_str(&pairs.join("&"));
    }
    canonical
}

/// Compute the uppercase hex signature for a canonical string.
///
/// The signed message is `client_id + access_token + timestamp_ms + canonical`;
/// `access_token` is empty before login.
pub fn sign(
    secret: &str,
    client_id: &str,
    access_token: &str,
    timestamp_ms: i64,
    canonical: &str,
) -> Result<String, Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(client_id.as_bytes());
    mac.update(access_token.as_bytes());
    mac.update(timestamp_ms.to_string().as_bytes());
    mac.update(canonical.as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn canonical_without_body_or_query() {
        let canonical = canonical_string("GET", "/v1.0/token", &BTreeMap::new(), "");
        assert_eq!(canonical, format!("GET\n{EMPTY_SHA256}\n\n/v1.0/token"));
    }

    #[test]
    fn canonical_sorts_query_keys() {
        let q = query(&[("page_size", "100"), ("last_row_key", ""), ("device_ids", "a,b")]);
        let canonical = canonical_string("GET", "/v1.0/devices", &q, "");
        assert!(canonical.ends_with("/v1.0/devices?device_ids=a,b&last_row_key=&page_size=100"));
    }

    #[test]
    fn canonical_hashes_body() {
        let canonical = canonical_string("POST", "/p", &BTreeMap::new(), r#"{"a":1}"#);
        let lines: Vec<&str> = canonical.split('\n').collect();
        assert_eq!(lines[0], "POST");
        assert_ne!(lines[1], EMPTY_SHA256);
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[1], lines[1].to_lowercase());
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "/p");
    }

    #[test]
    fn signature_is_deterministic_and_uppercase() {
        let canonical = canonical_string("GET", "/v1.0/devices/d1", &BTreeMap::new(), "");
        let a = sign("secret", "client", "token", 1_588_925_778_000, &canonical).unwrap();
        let b = sign("secret", "client", "token", 1_588_925_778_000, &canonical).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, a.to_uppercase());
    }

    #[test]
    fn signature_changes_with_any_input() {
        let base_q = query(&[("a", "1")]);
        let base = sign("s", "c", "t", 1, &canonical_string("GET", "/x", &base_q, "")).unwrap();

        let variants = [
            canonical_string("POST", "/x", &base_q, ""),
            canonical_string("GET", "/y", &base_q, ""),
            canonical_string("GET", "/x", &query(&[("a", "2")]), ""),
            canonical_string("GET", "/x", &base_q, "{}"),
        ];
        for canonical in &variants {
            assert_ne!(sign("s", "c", "t", 1, canonical).unwrap(), base, "{canonical}");
        }

        let canonical = canonical_string("GET", "/x", &base_q, "");
        assert_ne!(sign("s", "c", "", 1, &canonical).unwrap(), base);
        assert_ne!(sign("s", "c", "t", 2, &canonical).unwrap(), base);
        assert_ne!(sign("other", "c", "t", 1, &canonical).unwrap(), base);
    }

    #[test]
    fn empty_secret_still_signs() {
        let canonical = canonical_string("GET", "/x", &BTreeMap::new(), "");
        let signature = sign("", "c", "", 1, &canonical).unwrap();
        assert_eq!(signature.len(), 64);
    }
}
