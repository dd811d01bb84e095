//! Function Compute 3.0 custom domains.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AliyunClient, AliyunError, ApiRequest, Endpoint};
use crate::services::{FunctionPlatform, ManagedEndpoint};

const VERSION: &str = "2023-03-30";
const CUSTOM_DOMAINS_PATH: &str = "/2023-03-30/custom-domains";
const PAGE_LIMIT: &str = "100";
const ACCOUNT_HEADER: &str = "x-fc-account-id";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCustomDomainsResponse {
    #[serde(default)]
    custom_domains: Vec<CustomDomain>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomDomain {
    domain_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCustomDomainRequest<'a> {
    cert_config: CertConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CertConfig<'a> {
    cert_name: &'a str,
    certificate: &'a str,
    private_key: &'a str,
}

/// Function Compute client for one account endpoint.
#[derive(Debug, Clone)]
pub struct AliyunFc {
    client: AliyunClient,
    endpoint: Endpoint,
}

impl AliyunFc {
    /// # Errors
    ///
    /// Returns an error if `endpoint` is invalid.
    pub fn new(client: AliyunClient, endpoint: &str) -> Result<Self, AliyunError> {
        Ok(Self {
            client,
            endpoint: Endpoint::parse(endpoint)?,
        })
    }
}

#[async_trait]
impl FunctionPlatform for AliyunFc {
    async fn list_domains(&self, account_id: &str) -> Result<Vec<ManagedEndpoint>> {
        let mut domains = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = ApiRequest::roa(
                Method::GET,
                "ListCustomDomains",
                VERSION,
                CUSTOM_DOMAINS_PATH,
            )
            .query("limit", PAGE_LIMIT)
            .header(ACCOUNT_HEADER, account_id);
            if let Some(token) = &next_token {
                request = request.query("nextToken", token.clone());
            }

            let page = self
                .client
                .call::<ListCustomDomainsResponse>(&self.endpoint, request)
                .await?
                .body;
            domains.extend(page.custom_domains.into_iter().map(|d| ManagedEndpoint {
                domain_name: d.domain_name,
            }));

            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(count = domains.len(), "Listed custom domains");
        Ok(domains)
    }

    async fn update_domain_cert(
        &self,
        account_id: &str,
        domain_name: &str,
        cert_name: &str,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<u16> {
        let body = UpdateCustomDomainRequest {
            cert_config: CertConfig {
                cert_name,
                certificate: cert_pem,
                private_key: key_pem,
            },
        };
        let request = ApiRequest::roa(
            Method::PUT,
            "UpdateCustomDomain",
            VERSION,
            format!("{CUSTOM_DOMAINS_PATH}/{domain_name}"),
        )
        .json(&body)?
        .header(ACCOUNT_HEADER, account_id);

        let response = self
            .client
            .call::<serde_json::Value>(&self.endpoint, request)
            .await?;
        Ok(response.status)
    }
}
