//! In-memory stand-ins for the cloud services and the ACME client.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use aliyun_cert_renewer::challenge::AcmeIssuer;
use aliyun_cert_renewer::renew::Services;
use aliyun_cert_renewer::services::{
    CertificateStore, DnsProvider, DnsRecord, FunctionPlatform, ManagedEndpoint,
    RemoteCertificateEntry,
};
use anyhow::Result;
use async_trait::async_trait;

/// Formatted log output collected by [`capture_logs`].
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Lines at `level` whose text contains `message`.
    pub fn matching(&self, level: &str, message: &str) -> Vec<String> {
        let buffer = self.0.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| line.contains(level) && line.contains(message))
            .map(String::from)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's logs into a buffer until the guard is dropped.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

/// Config file contents for `example.com` with the given key dir and cert id.
pub fn config_text(key_path: &Path, cert_id: Option<&str>, fc_update: bool) -> String {
    format!(
        "# renewer settings\n\
         AccessKey_ID=LTAItest\n\
         AccessKey_Secret=secret\n\
         User_ID=1234567890\n\
         \n\
         Endpoint=alidns.cn-hangzhou.aliyuncs.com\n\
         Domain=example.com\n\
         Record=_acme-challenge\n\
         Record_Value=\n\
         \n\
         Key_Path={}\n\
         Cert_Id={}\n\
         \n\
         FC-Update={}\n",
        key_path.display(),
        cert_id.unwrap_or_default(),
        u8::from(fc_update)
    )
}

#[derive(Clone, Default)]
pub struct MemoryDns {
    pub records: Arc<Mutex<Vec<DnsRecord>>>,
}

#[async_trait]
impl DnsProvider for MemoryDns {
    async fn get_records(&self, _domain: &str) -> Result<Vec<DnsRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn create_record(&self, _domain: &str, name: &str, value: &str) -> Result<String> {
        let mut records = self.records.lock().unwrap();
        let id = format!("rec-{}", records.len() + 1);
        records.push(DnsRecord {
            id: id.clone(),
            name: name.to_string(),
            record_type: "TXT".to_string(),
            value: value.to_string(),
            status: "ENABLE".to_string(),
        });
        Ok(id)
    }

    async fn update_record(&self, record_id: &str, _name: &str, value: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| anyhow::anyhow!("record {record_id} does not exist"))?;
        record.value = value.to_string();
        Ok(())
    }

    async fn enable_record(&self, record_id: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| anyhow::anyhow!("record {record_id} does not exist"))?;
        record.status = "ENABLE".to_string();
        Ok(())
    }
}

#[derive(Default)]
pub struct StoreState {
    pub entries: BTreeMap<String, RemoteCertificateEntry>,
    pub next_id: u64,
    pub deleted: Vec<String>,
    pub uploads: Vec<(String, Option<String>)>,
    pub fail_delete: bool,
    pub fail_get: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn with_entry(id: &str, cert_pem: &str, key_pem: &str) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            state.entries.insert(
                id.to_string(),
                RemoteCertificateEntry {
                    cert_id: id.to_string(),
                    name: "example-com".to_string(),
                    cert_pem: cert_pem.to_string(),
                    key_pem: key_pem.to_string(),
                },
            );
            state.next_id = 1000;
        }
        store
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(id)
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn get(&self, cert_id: &str) -> Result<Option<RemoteCertificateEntry>> {
        let state = self.state.lock().unwrap();
        if state.fail_get {
            anyhow::bail!("store unavailable");
        }
        Ok(state.entries.get(cert_id).cloned())
    }

    async fn upload(
        &self,
        cert_pem: &str,
        key_pem: &str,
        name: &str,
        prior_id: Option<&str>,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.entries.insert(
            id.clone(),
            RemoteCertificateEntry {
                cert_id: id.clone(),
                name: name.to_string(),
                cert_pem: cert_pem.to_string(),
                key_pem: key_pem.to_string(),
            },
        );
        state.uploads.push((id.clone(), prior_id.map(String::from)));
        Ok(id)
    }

    async fn delete(&self, cert_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete {
            anyhow::bail!("delete rejected");
        }
        state
            .entries
            .remove(cert_id)
            .ok_or_else(|| anyhow::anyhow!("certificate {cert_id} does not exist"))?;
        state.deleted.push(cert_id.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryFunctions {
    pub domains: Vec<String>,
    pub failing: Vec<String>,
    pub list_fails: bool,
    pub updated: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemoryFunctions {
    pub fn new(domains: &[&str], failing: &[&str]) -> Self {
        Self {
            domains: domains.iter().map(ToString::to_string).collect(),
            failing: failing.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl FunctionPlatform for MemoryFunctions {
    async fn list_domains(&self, _account_id: &str) -> Result<Vec<ManagedEndpoint>> {
        if self.list_fails {
            anyhow::bail!("listing failed");
        }
        Ok(self
            .domains
            .iter()
            .map(|d| ManagedEndpoint {
                domain_name: d.clone(),
            })
            .collect())
    }

    async fn update_domain_cert(
        &self,
        _account_id: &str,
        domain_name: &str,
        cert_name: &str,
        _cert_pem: &str,
        key_pem: &str,
    ) -> Result<u16> {
        if self.failing.iter().any(|d| d == domain_name) {
            anyhow::bail!("update of {domain_name} rejected");
        }
        assert!(key_pem.contains("BEGIN RSA PRIVATE KEY"));
        self.updated
            .lock()
            .unwrap()
            .push((domain_name.to_string(), cert_name.to_string()));
        Ok(200)
    }
}

/// Issuer that "obtains" the fixture certificate by copying it into `dir`.
#[derive(Clone)]
pub struct FixtureIssuer {
    pub dir: PathBuf,
    pub failures: u32,
    pub calls: Arc<AtomicU32>,
}

impl FixtureIssuer {
    pub fn new(dir: &Path, failures: u32) -> Self {
        Self {
            dir: dir.to_path_buf(),
            failures,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl AcmeIssuer for FixtureIssuer {
    async fn issue(&self, _domain: &str) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            anyhow::bail!("challenge {call} failed");
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join("fullchain.pem"), fixture("fullchain.pem"))?;
        std::fs::write(self.dir.join("privkey.pem"), fixture("privkey.pem"))?;
        Ok(())
    }
}

pub fn services(
    dns: &MemoryDns,
    store: &MemoryStore,
    functions: &MemoryFunctions,
    issuer: &FixtureIssuer,
) -> Services {
    Services {
        dns: Box::new(dns.clone()),
        store: Box::new(store.clone()),
        functions: Box::new(functions.clone()),
        issuer: Box::new(issuer.clone()),
    }
}
