//! ACS3-HMAC-SHA256 request signing.
//!
//! ```text
//! CanonicalRequest = Method \n CanonicalURI \n CanonicalQuery \n
//!                    CanonicalHeaders \n SignedHeaders \n HexSha256(Payload)
//! StringToSign     = "ACS3-HMAC-SHA256" \n HexSha256(CanonicalRequest)
//! Signature        = Hex(HmacSha256(AccessKeySecret, StringToSign))
//! ```

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::Credentials;

pub const ALGORITHM: &str = "ACS3-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// RFC 3986 encoding: everything but `A-Z a-z 0-9 - _ . ~` is escaped.
#[must_use]
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[must_use]
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(percent_encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Encoded `key=value` pairs sorted by key, joined with `&`.
#[must_use]
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the `Authorization` header value.
///
/// `headers` must use lowercase names; every entry is signed.
#[must_use]
pub fn authorization(
    credentials: &Credentials,
    method: &str,
    path: &str,
    query: &[(String, String)],
    headers: &BTreeMap<String, String>,
    payload_hash: &str,
) -> String {
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "{method}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        canonical_uri(path),
        canonical_query(query),
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let mut mac = HmacSha256::new_from_slice(credentials.access_key_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(string_to_sign.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!(
        "{ALGORITHM} Credential={},SignedHeaders={signed_headers},Signature={signature}",
        credentials.access_key_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode_is_rfc3986() {
        assert_eq!(percent_encode("a b*c~d"), "a%20b%2Ac~d");
        assert_eq!(percent_encode("x+y/z="), "x%2By%2Fz%3D");
    }

    #[test]
    fn test_canonical_query_sorts_encoded_keys() {
        let query = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "x y".to_string()),
        ];
        assert_eq!(canonical_query(&query), "a=x%20y&b=2");
        assert_eq!(canonical_query(&[]), "");
    }

    #[test]
    fn test_canonical_uri() {
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(canonical_uri("/"), "/");
        assert_eq!(
            canonical_uri("/2023-03-30/custom-domains/www.example.com"),
            "/2023-03-30/custom-domains/www.example.com"
        );
    }

    #[test]
    fn test_authorization_matches_reference_vector() {
        let credentials = Credentials {
            access_key_id: "testid".to_string(),
            access_key_secret: "testsecret".to_string(),
        };
        let body = b"DomainName=example.com&PageNumber=1";
        let payload_hash = sha256_hex(body);
        assert_eq!(
            payload_hash,
            "5f95266d1c3cc422cba54196853be7b196954af8e2e159b084f6d1e4c4769d11"
        );

        let headers: BTreeMap<String, String> = [
            ("host", "alidns.cn-hangzhou.aliyuncs.com"),
            ("x-acs-action", "DescribeDomainRecords"),
            ("x-acs-version", "2015-01-09"),
            ("x-acs-date", "2026-01-01T00:00:00Z"),
            ("x-acs-signature-nonce", "abc123"),
            ("x-acs-content-sha256", payload_hash.as_str()),
            ("content-type", "application/x-www-form-urlencoded"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let query = vec![
            ("Page Size".to_string(), "500".to_string()),
            ("Lang".to_string(), "en".to_string()),
        ];

        let header = authorization(&credentials, "POST", "/", &query, &headers, &payload_hash);

        assert_eq!(
            header,
            "ACS3-HMAC-SHA256 Credential=testid,\
             SignedHeaders=content-type;host;x-acs-action;x-acs-content-sha256;x-acs-date;x-acs-signature-nonce;x-acs-version,\
             Signature=1bd84ce5052cc13a6d6ff517a9c42e714fb30a61d8c2926f1036a76a8937f907"
        );
    }
}
