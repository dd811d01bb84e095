use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Record type used for DNS-01 proofs.
pub const TXT: &str = "TXT";

/// A DNS record as reported by the provider. Not owned by this tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    /// Host part relative to the zone, e.g. `_acme-challenge`.
    pub name: String,
    pub record_type: String,
    pub value: String,
    pub status: String,
}

impl DnsRecord {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status.eq_ignore_ascii_case("ENABLE")
    }

    #[must_use]
    pub fn is_txt_named(&self, name: &str) -> bool {
        self.name == name && self.record_type.eq_ignore_ascii_case(TXT)
    }
}

/// A certificate held in the remote certificate store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCertificateEntry {
    pub cert_id: String,
    pub name: String,
    pub cert_pem: String,
    pub key_pem: String,
}

impl fmt::Debug for RemoteCertificateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCertificateEntry")
            .field("cert_id", &self.cert_id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A custom domain on the function platform that terminates TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEndpoint {
    pub domain_name: String,
}

/// DNS zone operations needed for the DNS-01 challenge.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// All records of the zone.
    async fn get_records(&self, domain: &str) -> Result<Vec<DnsRecord>>;

    /// Create a TXT record and return its id.
    async fn create_record(&self, domain: &str, name: &str, value: &str) -> Result<String>;

    /// Overwrite the value of an existing TXT record.
    async fn update_record(&self, record_id: &str, name: &str, value: &str) -> Result<()>;

    /// Switch a paused record back on.
    async fn enable_record(&self, record_id: &str) -> Result<()>;
}

/// Remote SSL certificate store.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Fetch an entry by id. `Ok(None)` when the store reports it does not exist.
    async fn get(&self, cert_id: &str) -> Result<Option<RemoteCertificateEntry>>;

    /// Upload a certificate and return the new entry's id.
    async fn upload(
        &self,
        cert_pem: &str,
        key_pem: &str,
        name: &str,
        prior_id: Option<&str>,
    ) -> Result<String>;

    async fn delete(&self, cert_id: &str) -> Result<()>;
}

/// Serverless function platform hosting custom domains.
#[async_trait]
pub trait FunctionPlatform: Send + Sync {
    async fn list_domains(&self, account_id: &str) -> Result<Vec<ManagedEndpoint>>;

    /// Install a certificate on one custom domain and return the HTTP status.
    async fn update_domain_cert(
        &self,
        account_id: &str,
        domain_name: &str,
        cert_name: &str,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<u16>;
}
