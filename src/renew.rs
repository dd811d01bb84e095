//! One renewal run, from config loading to the status write.
//!
//! Steps run strictly in order and each is awaited before the next starts:
//! config, expiry gate, issuance, publish, propagation, status.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cert::CertificateBundle;
use crate::challenge::{drive_challenge, AcmeIssuer, RetryPolicy};
use crate::config::{ensure_config_file, ConfigFile, ConfigPresence, RenewalConfig};
use crate::constants::{CERT_FILE, LETSENCRYPT_LIVE_DIR};
use crate::propagate::{propagate, summarize, CertificatePush, PropagationSummary};
use crate::publish::{publish, PreviousEntry};
use crate::services::{CertificateStore, DnsProvider, FunctionPlatform};
use crate::status::{self, DueReason, ExpiryRecord, GateDecision, RenewalGate};

/// Files a run reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config: PathBuf,
    pub status: PathBuf,
}

/// External collaborators of a run, built once the gate says renewal is due.
pub struct Services {
    pub dns: Box<dyn DnsProvider>,
    pub store: Box<dyn CertificateStore>,
    pub functions: Box<dyn FunctionPlatform>,
    pub issuer: Box<dyn AcmeIssuer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalSummary {
    /// Issuance attempts used.
    pub attempts: u32,
    pub previous: Option<PreviousEntry>,
    pub new_cert_id: String,
    pub expires_at: DateTime<Utc>,
    /// `None` when propagation is disabled or the domain list was unavailable.
    pub propagation: Option<PropagationSummary>,
    pub status_saved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// No config existed; a template was written for the operator to fill in.
    TemplateCreated,
    NotDue { expires_at: DateTime<Utc> },
    Renewed(RenewalSummary),
}

/// Create the config template on first run.
///
/// # Errors
///
/// Returns an error if the template cannot be written.
pub fn prepare(paths: &Paths) -> Result<ConfigPresence> {
    let presence = ensure_config_file(&paths.config)?;
    if presence == ConfigPresence::TemplateCreated {
        warn!(
            path = %paths.config.display(),
            "Config file created, fill it in and run again"
        );
    }
    Ok(presence)
}

/// Run the renewal flow once.
///
/// `connect` is only called when renewal is due, so a not-due run never
/// touches the network.
///
/// # Errors
///
/// Returns an error on invalid configuration, exhausted issuance attempts,
/// unreadable certificate files, or a failed publish.
pub async fn run_once<F>(
    paths: &Paths,
    now: DateTime<Utc>,
    policy: RetryPolicy,
    connect: F,
) -> Result<RunReport>
where
    F: FnOnce(&RenewalConfig) -> Result<Services>,
{
    if prepare(paths)? == ConfigPresence::TemplateCreated {
        return Ok(RunReport::TemplateCreated);
    }

    let config = RenewalConfig::load(&paths.config)
        .with_context(|| format!("Invalid configuration in {}", paths.config.display()))?;
    info!(
        domain = %config.dns.domain,
        record = %config.dns.record,
        key_path = %config.key_path.display(),
        cert_id = config.cert_id.as_deref().unwrap_or("-"),
        fc_update = config.fc_update,
        "Loaded configuration"
    );

    let gate = RenewalGate::new(config.renew_before);
    match gate.evaluate(now, &status::load(&paths.status)) {
        GateDecision::NotDue { expires_at } => {
            info!(expires_at = %expires_at, "Certificate not due for renewal");
            return Ok(RunReport::NotDue { expires_at });
        }
        GateDecision::Due(DueReason::Expired { expires_at }) => {
            info!(expires_at = %expires_at, "Certificate due for renewal");
        }
        GateDecision::Due(DueReason::NoRecord) => {
            info!(path = %paths.status.display(), "No status record, renewing");
        }
        GateDecision::Due(DueReason::Corrupt(reason)) => {
            warn!(path = %paths.status.display(), reason = %reason, "Status record unusable, renewing");
        }
    }

    let services = connect(&config).context("Failed to set up cloud clients")?;

    preflight_dns(services.dns.as_ref(), &config).await;

    let attempts = drive_challenge(services.issuer.as_ref(), &config.dns.domain, policy).await?;

    let key_dir = resolve_key_dir(&config.key_path, &config.dns.domain, Path::new(LETSENCRYPT_LIVE_DIR));
    let bundle = CertificateBundle::load(&key_dir)
        .await
        .context("Failed to load issued certificate")?;
    let expires_at = bundle
        .not_after()
        .context("Failed to read expiry of issued certificate")?;
    info!(expires_at = %expires_at, dir = %key_dir.display(), "Loaded issued certificate");

    let mut config_file = ConfigFile::open(&paths.config)?;
    let outcome = publish(
        services.store.as_ref(),
        &mut config_file,
        &config.dns.domain,
        config.cert_id.as_deref(),
        &bundle,
    )
    .await?;

    let propagation = if config.fc_update {
        let key_pem = bundle.upload_key_pem()?;
        let push = CertificatePush {
            account_id: &config.account_id,
            domain: &config.dns.domain,
            cert_name: &outcome.name,
            cert_pem: &bundle.certificate_pem,
            key_pem: &key_pem,
        };
        match propagate(services.functions.as_ref(), push).await {
            Ok(outcomes) => {
                let summary = summarize(&outcomes);
                info!(
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Custom domain propagation finished"
                );
                Some(summary)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Skipping custom domain propagation");
                None
            }
        }
    } else {
        debug!("Custom domain propagation disabled");
        None
    };

    let record = ExpiryRecord {
        expired_date: expires_at,
    };
    let status_saved = match status::save(&paths.status, &record) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to save status record, next run will renew again");
            false
        }
    };

    info!(cert_id = %outcome.new_cert_id, expires_at = %expires_at, "Renewal complete");
    Ok(RunReport::Renewed(RenewalSummary {
        attempts,
        previous: outcome.previous,
        new_cert_id: outcome.new_cert_id,
        expires_at,
        propagation,
        status_saved,
    }))
}

/// Directory holding the issued certificate.
///
/// Falls back to certbot's live directory for the domain when `key_path`
/// has no certificate but the live directory does.
#[must_use]
pub fn resolve_key_dir(key_path: &Path, domain: &str, live_root: &Path) -> PathBuf {
    if key_path.join(CERT_FILE).exists() {
        return key_path.to_path_buf();
    }
    let standard = live_root.join(domain);
    if standard.join(CERT_FILE).exists() {
        warn!(
            configured = %key_path.display(),
            using = %standard.display(),
            "No certificate at Key_Path, using certbot live directory"
        );
        return standard;
    }
    key_path.to_path_buf()
}

/// Log the state of the challenge TXT record. Never fails the run.
async fn preflight_dns(dns: &dyn DnsProvider, config: &RenewalConfig) {
    match dns.get_records(&config.dns.domain).await {
        Ok(records) => match records.iter().find(|r| r.is_txt_named(&config.dns.record)) {
            Some(record) => info!(
                record_id = %record.id,
                enabled = record.is_enabled(),
                "Challenge TXT record exists"
            ),
            None => info!(record = %config.dns.record, "Challenge TXT record will be created"),
        },
        Err(e) => warn!(error = %format!("{e:#}"), "Could not list DNS records before issuance"),
    }
}
