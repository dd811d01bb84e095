//! Alidns (API version 2015-01-09).

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{deserialize_id, AliyunClient, AliyunError, ApiRequest, Endpoint};
use crate::services::{DnsProvider, DnsRecord, TXT};

const VERSION: &str = "2015-01-09";
const PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainRecordsResponse {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    domain_records: RecordList,
}

#[derive(Debug, Default, Deserialize)]
struct RecordList {
    #[serde(rename = "Record", default)]
    record: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "RecordId", deserialize_with = "deserialize_id")]
    record_id: String,
    #[serde(rename = "RR")]
    rr: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "Value", default)]
    value: String,
    #[serde(rename = "Status", default)]
    status: String,
}

impl From<RawRecord> for DnsRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.record_id,
            name: raw.rr,
            record_type: raw.record_type,
            value: raw.value,
            status: raw.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordIdResponse {
    #[serde(rename = "RecordId", deserialize_with = "deserialize_id")]
    record_id: String,
}

/// Alidns zone client.
#[derive(Debug, Clone)]
pub struct AliyunDns {
    client: AliyunClient,
    endpoint: Endpoint,
}

impl AliyunDns {
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
impl DnsProvider for AliyunDns {
    async fn get_records(&self, domain: &str) -> Result<Vec<DnsRecord>> {
        let page_size = PAGE_SIZE.to_string();
        let mut records = Vec::new();
        let mut page = 1usize;

        loop {
            let page_number = page.to_string();
            let request = ApiRequest::rpc(
                "DescribeDomainRecords",
                VERSION,
                &[
                    ("DomainName", domain),
                    ("PageNumber", &page_number),
                    ("PageSize", &page_size),
                ],
            );
            let response = self
                .client
                .call::<DescribeDomainRecordsResponse>(&self.endpoint, request)
                .await?
                .body;

            let fetched = response.domain_records.record.len();
            records.extend(response.domain_records.record.into_iter().map(DnsRecord::from));

            if fetched < PAGE_SIZE || records.len() >= response.total_count {
                break;
            }
            page += 1;
        }

        debug!(domain = %domain, count = records.len(), "Fetched DNS records");
        Ok(records)
    }

    async fn create_record(&self, domain: &str, name: &str, value: &str) -> Result<String> {
        let request = ApiRequest::rpc(
            "AddDomainRecord",
            VERSION,
            &[
                ("DomainName", domain),
                ("RR", name),
                ("Type", TXT),
                ("Value", value),
            ],
        );
        let response = self
            .client
            .call::<RecordIdResponse>(&self.endpoint, request)
            .await?;
        Ok(response.body.record_id)
    }

    async fn update_record(&self, record_id: &str, name: &str, value: &str) -> Result<()> {
        let request = ApiRequest::rpc(
            "UpdateDomainRecord",
            VERSION,
            &[
                ("RecordId", record_id),
                ("RR", name),
                ("Type", TXT),
                ("Value", value),
            ],
        );
        self.client
            .call::<RecordIdResponse>(&self.endpoint, request)
            .await?;
        Ok(())
    }

    async fn enable_record(&self, record_id: &str) -> Result<()> {
        let request = ApiRequest::rpc(
            "SetDomainRecordStatus",
            VERSION,
            &[("RecordId", record_id), ("Status", "Enable")],
        );
        self.client
            .call::<RecordIdResponse>(&self.endpoint, request)
            .await?;
        debug!(record_id = %record_id, "Enabled DNS record");
        Ok(())
    }
}
