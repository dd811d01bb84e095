//! SSL certificate service (CAS, API version 2020-04-07).

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{deserialize_id, AliyunClient, AliyunError, ApiRequest, Endpoint};
use crate::services::{CertificateStore, RemoteCertificateEntry};

const VERSION: &str = "2020-04-07";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CertificateDetail {
    #[serde(default)]
    name: String,
    #[serde(default)]
    cert: String,
    #[serde(default)]
    key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "CertId", deserialize_with = "deserialize_id")]
    cert_id: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

/// CAS user certificate client.
#[derive(Debug, Clone)]
pub struct AliyunCas {
    client: AliyunClient,
    endpoint: Endpoint,
}

impl AliyunCas {
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
impl CertificateStore for AliyunCas {
    async fn get(&self, cert_id: &str) -> Result<Option<RemoteCertificateEntry>> {
        let request = ApiRequest::rpc(
            "GetUserCertificateDetail",
            VERSION,
            &[("CertId", cert_id), ("CertFilter", "false")],
        );
        match self
            .client
            .call::<CertificateDetail>(&self.endpoint, request)
            .await
        {
            Ok(response) => Ok(Some(RemoteCertificateEntry {
                cert_id: cert_id.to_string(),
                name: response.body.name,
                cert_pem: response.body.cert,
                key_pem: response.body.key,
            })),
            Err(e) if e.is_not_found() => {
                debug!(cert_id = %cert_id, error = %e, "Certificate not found in store");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(
        &self,
        cert_pem: &str,
        key_pem: &str,
        name: &str,
        prior_id: Option<&str>,
    ) -> Result<String> {
        // Entries cannot be replaced in place; the prior id is only reported.
        let request = ApiRequest::rpc(
            "UploadUserCertificate",
            VERSION,
            &[("Name", name), ("Cert", cert_pem), ("Key", key_pem)],
        );
        let response = self
            .client
            .call::<UploadResponse>(&self.endpoint, request)
            .await?;
        info!(
            cert_id = %response.body.cert_id,
            name = %name,
            replaces = prior_id.unwrap_or("-"),
            "Uploaded certificate"
        );
        Ok(response.body.cert_id)
    }

    async fn delete(&self, cert_id: &str) -> Result<()> {
        let request = ApiRequest::rpc("DeleteUserCertificate", VERSION, &[("CertId", cert_id)]);
        self.client.call::<Empty>(&self.endpoint, request).await?;
        info!(cert_id = %cert_id, "Deleted certificate");
        Ok(())
    }
}
