//! Alibaba Cloud API clients.
//!
//! All three services share one signed HTTP client. RPC-style APIs (Alidns,
//! SSL certificate service) take form-encoded parameters in a POST body;
//! Function Compute 3.0 is ROA-style with a REST path and JSON body.

use std::collections::BTreeMap;

use chrono::Utc;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::{Credentials, RenewalConfig};
use crate::constants::{API_TIMEOUT, USER_AGENT};

pub mod cas;
pub mod dns;
pub mod fc;
pub mod signer;

pub use cas::AliyunCas;
pub use dns::AliyunDns;
pub use fc::AliyunFc;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum AliyunError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid endpoint '{endpoint}': {message}")]
    Endpoint { endpoint: String, message: String },
    #[error("{action} request failed: {source}")]
    Http {
        action: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{action} failed with HTTP {status}: {code}: {message} (RequestId: {request_id})")]
    Api {
        action: String,
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },
    #[error("unexpected {action} response: {message}")]
    Decode { action: String, message: String },
}

impl AliyunError {
    /// Whether the API reported that the addressed resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                *status == 404 || code.contains("NotFound") || code.contains("NotExist")
            }
            _ => false,
        }
    }
}

/// Error body shape shared by RPC (`Code`) and ROA (`code`) APIs.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Code")]
    code: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
    #[serde(alias = "RequestId", alias = "requestId")]
    request_id: Option<String>,
}

fn api_error(action: &str, status: u16, body: &str) -> AliyunError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    AliyunError::Api {
        action: action.to_string(),
        status,
        code: parsed.code.unwrap_or_else(|| "Unknown".to_string()),
        message: parsed.message.unwrap_or_else(|| truncate(body, 500)),
        request_id: parsed.request_id.unwrap_or_default(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Ids come back as numbers from some APIs and strings from others.
pub(crate) fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

/// Base URL of one service.
///
/// A bare host such as `alidns.cn-hangzhou.aliyuncs.com` is used over HTTPS;
/// a value with an explicit scheme is used as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    host: String,
}

impl Endpoint {
    /// # Errors
    ///
    /// Returns an error if the value is not a valid URL or host.
    pub fn parse(raw: &str) -> Result<Self, AliyunError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let invalid = |message: String| AliyunError::Endpoint {
            endpoint: raw.to_string(),
            message,
        };
        if trimmed.is_empty() {
            return Err(invalid("empty".to_string()));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        let base = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
        let host = base
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let host = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self { base, host })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str, query: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query((!query.is_empty()).then_some(query));
        url
    }
}

/// One API call, before signing.
#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    method: Method,
    action: &'a str,
    version: &'a str,
    path: String,
    query: Vec<(String, String)>,
    body: Option<(&'static str, Vec<u8>)>,
    unsigned_headers: Vec<(&'static str, String)>,
}

impl<'a> ApiRequest<'a> {
    /// RPC-style call: parameters are sent form-encoded in a POST body.
    #[must_use]
    pub fn rpc(action: &'a str, version: &'a str, params: &[(&str, &str)]) -> Self {
        let body = params
            .iter()
            .map(|(k, v)| format!("{}={}", signer::percent_encode(k), signer::percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        Self {
            method: Method::POST,
            action,
            version,
            path: "/".to_string(),
            query: Vec::new(),
            body: Some((FORM_CONTENT_TYPE, body.into_bytes())),
            unsigned_headers: Vec::new(),
        }
    }

    /// ROA-style call against a REST path.
    #[must_use]
    pub fn roa(method: Method, action: &'a str, version: &'a str, path: impl Into<String>) -> Self {
        Self {
            method,
            action,
            version,
            path: path.into(),
            query: Vec::new(),
            body: None,
            unsigned_headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Result<Self, AliyunError> {
        let bytes = serde_json::to_vec(body).map_err(|e| AliyunError::Decode {
            action: self.action.to_string(),
            message: format!("cannot encode request body: {e}"),
        })?;
        self.body = Some((JSON_CONTENT_TYPE, bytes));
        Ok(self)
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.unsigned_headers.push((name, value.into()));
        self
    }
}

/// Decoded successful response.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: T,
}

/// Signed HTTP client shared by every service wrapper.
#[derive(Clone)]
pub struct AliyunClient {
    http: reqwest::Client,
    credentials: Credentials,
}

impl AliyunClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self, AliyunError> {
        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(AliyunError::Client)?;
        Ok(Self { http, credentials })
    }

    /// Sign and send a request, decoding a successful JSON response as `T`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, or an
    /// undecodable body.
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        request: ApiRequest<'_>,
    ) -> Result<ApiResponse<T>, AliyunError> {
        let action = request.action;
        let payload = request.body.as_ref().map_or(&[][..], |(_, b)| b.as_slice());
        let payload_hash = signer::sha256_hex(payload);

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), endpoint.host().to_string());
        headers.insert("x-acs-action".to_string(), action.to_string());
        headers.insert("x-acs-version".to_string(), request.version.to_string());
        headers.insert(
            "x-acs-date".to_string(),
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        headers.insert(
            "x-acs-signature-nonce".to_string(),
            format!("{:032x}", rand::random::<u128>()),
        );
        headers.insert("x-acs-content-sha256".to_string(), payload_hash.clone());
        if let Some((content_type, _)) = &request.body {
            headers.insert("content-type".to_string(), (*content_type).to_string());
        }

        let authorization = signer::authorization(
            &self.credentials,
            request.method.as_str(),
            &request.path,
            &request.query,
            &headers,
            &payload_hash,
        );
        let url = endpoint.url(&request.path, &signer::canonical_query(&request.query));

        debug!(action = %action, host = %endpoint.host(), method = %request.method, "Calling Aliyun API");

        let mut builder = self
            .http
            .request(request.method, url)
            .header("authorization", authorization);
        for (name, value) in headers.iter().filter(|(name, _)| *name != "host") {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in request.unsigned_headers {
            builder = builder.header(name, value);
        }
        if let Some((_, body)) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|source| AliyunError::Http {
            action: action.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(action, status, &text));
        }

        let text = response.text().await.map_err(|source| AliyunError::Http {
            action: action.to_string(),
            source,
        })?;
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        let body = serde_json::from_str::<T>(text).map_err(|e| AliyunError::Decode {
            action: action.to_string(),
            message: e.to_string(),
        })?;

        Ok(ApiResponse { status, body })
    }
}

impl std::fmt::Debug for AliyunClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunClient")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Build the three service clients described by `config`.
///
/// # Errors
///
/// Returns an error if an endpoint is invalid or the HTTP client cannot be built.
pub fn connect(config: &RenewalConfig) -> Result<(AliyunDns, AliyunCas, AliyunFc), AliyunError> {
    let client = AliyunClient::new(config.dns.credentials.clone())?;
    Ok((
        AliyunDns::new(client.clone(), &config.dns.endpoint)?,
        AliyunCas::new(client.clone(), &config.ssl_endpoint)?,
        AliyunFc::new(client, &config.fc_endpoint)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse_defaults_to_https() {
        let endpoint = Endpoint::parse("alidns.cn-hangzhou.aliyuncs.com").unwrap();
        assert_eq!(endpoint.host(), "alidns.cn-hangzhou.aliyuncs.com");
        assert_eq!(
            endpoint.url("/", "").as_str(),
            "https://alidns.cn-hangzhou.aliyuncs.com/"
        );
    }

    #[test]
    fn test_endpoint_parse_keeps_explicit_scheme_and_port() {
        let endpoint = Endpoint::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1:8080");
        assert_eq!(
            endpoint.url("/2023-03-30/custom-domains", "limit=100").as_str(),
            "http://127.0.0.1:8080/2023-03-30/custom-domains?limit=100"
        );
    }

    #[test]
    fn test_endpoint_parse_rejects_empty() {
        assert!(Endpoint::parse("  ").is_err());
    }

    #[test]
    fn test_api_error_parses_rpc_and_roa_bodies() {
        let rpc = api_error(
            "GetUserCertificateDetail",
            400,
            r#"{"Code":"NotFound","Message":"cert not found","RequestId":"R1"}"#,
        );
        assert!(rpc.is_not_found());
        assert!(rpc.to_string().contains("RequestId: R1"));

        let roa = api_error(
            "UpdateCustomDomain",
            403,
            r#"{"code":"AccessDenied","message":"nope","requestId":"R2"}"#,
        );
        assert!(!roa.is_not_found());
        assert!(matches!(roa, AliyunError::Api { ref code, .. } if code == "AccessDenied"));

        let plain = api_error("DescribeDomainRecords", 502, "Bad Gateway");
        assert!(matches!(plain, AliyunError::Api { ref message, .. } if message == "Bad Gateway"));
    }

    #[test]
    fn test_deserialize_id_accepts_numbers_and_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_id")]
            id: String,
        }
        let n: Wrapper = serde_json::from_str(r#"{"id": 14523}"#).unwrap();
        let s: Wrapper = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(n.id, "14523");
        assert_eq!(s.id, "abc");
    }
}
