//! DNS-01 challenge: the ACME issuance driver and the TXT record callback.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DnsSettings;
use crate::constants::{CHALLENGE_ATTEMPTS, CHALLENGE_BACKOFF};
use crate::services::DnsProvider;

pub mod certbot;

pub use certbot::CertbotIssuer;

/// External ACME client obtaining a wildcard certificate for a domain.
#[async_trait]
pub trait AcmeIssuer: Send + Sync {
    /// Run one full challenge-and-issuance attempt for `*.<domain>`.
    async fn issue(&self, domain: &str) -> Result<()>;
}

/// How often issuance is attempted and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: CHALLENGE_ATTEMPTS,
            backoff: CHALLENGE_BACKOFF,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("certificate issuance failed after {attempts} attempts: {last:#}")]
    Exhausted { attempts: u32, last: anyhow::Error },
}

/// Drive issuance with bounded retries. Returns the number of attempts used.
///
/// # Errors
///
/// Returns [`ChallengeError::Exhausted`] when every attempt failed.
pub async fn drive_challenge(
    issuer: &dyn AcmeIssuer,
    domain: &str,
    policy: RetryPolicy,
) -> Result<u32, ChallengeError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match issuer.issue(domain).await {
            Ok(()) => {
                info!(domain = %domain, attempt, "Certificate issued");
                return Ok(attempt);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    domain = %domain,
                    attempt,
                    max_attempts = attempts,
                    error = %format!("{e:#}"),
                    "Issuance attempt failed, retrying in {}s",
                    policy.backoff.as_secs()
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(domain = %domain, attempt, error = %format!("{e:#}"), "Final issuance attempt failed");
                return Err(ChallengeError::Exhausted { attempts, last: e });
            }
        }
    }
}

/// What the callback did to the TXT record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Created { record_id: String },
    Updated { record_id: String },
    Unchanged { record_id: String },
}

/// Publish `validation` as the challenge TXT record, then wait `delay` for propagation.
///
/// An existing record with the configured name is overwritten and enabled if
/// it was paused; otherwise one is created.
///
/// # Errors
///
/// Returns an error if the provider rejects the lookup or the write.
pub async fn apply_challenge(
    dns: &dyn DnsProvider,
    settings: &DnsSettings,
    validation: &str,
    delay: Duration,
) -> Result<RecordChange> {
    let records = dns
        .get_records(&settings.domain)
        .await
        .with_context(|| format!("Failed to list DNS records of {}", settings.domain))?;

    let existing = records.iter().find(|r| r.is_txt_named(&settings.record));
    let change = match existing {
        Some(record) if record.value == validation && record.is_enabled() => {
            debug!(record_id = %record.id, "TXT record already holds the token");
            RecordChange::Unchanged {
                record_id: record.id.clone(),
            }
        }
        Some(record) => {
            if record.value != validation {
                dns.update_record(&record.id, &settings.record, validation)
                    .await
                    .with_context(|| format!("Failed to update TXT record {}", record.id))?;
                info!(record_id = %record.id, record = %settings.record, "Updated challenge TXT record");
            }
            // Resolvers never see a paused record.
            if !record.is_enabled() {
                warn!(record_id = %record.id, status = %record.status, "Challenge TXT record is disabled, enabling it");
                dns.enable_record(&record.id)
                    .await
                    .with_context(|| format!("Failed to enable TXT record {}", record.id))?;
            }
            RecordChange::Updated {
                record_id: record.id.clone(),
            }
        }
        None => {
            let record_id = dns
                .create_record(&settings.domain, &settings.record, validation)
                .await
                .with_context(|| format!("Failed to create TXT record {}", settings.record))?;
            info!(record_id = %record_id, record = %settings.record, "Created challenge TXT record");
            RecordChange::Created { record_id }
        }
    };

    if !delay.is_zero() {
        debug!(seconds = delay.as_secs(), "Waiting for DNS propagation");
        tokio::time::sleep(delay).await;
    }

    Ok(change)
}

/// Entry point of the ACME callback with the inputs certbot hands over.
///
/// # Errors
///
/// Returns an error if either input is empty or the record cannot be written.
pub async fn run_auth_hook(
    dns: &dyn DnsProvider,
    settings: &DnsSettings,
    certbot_domain: &str,
    validation: &str,
    delay: Duration,
) -> Result<RecordChange> {
    if certbot_domain.trim().is_empty() {
        anyhow::bail!("CERTBOT_DOMAIN is not set");
    }
    if validation.trim().is_empty() {
        anyhow::bail!("CERTBOT_VALIDATION is not set");
    }

    let validated = certbot_domain.trim_start_matches("*.");
    if validated != settings.domain {
        warn!(
            certbot_domain = %certbot_domain,
            configured = %settings.domain,
            "Challenge domain differs from configured domain"
        );
    }

    info!(
        domain = %certbot_domain,
        token_prefix = %validation.chars().take(20).collect::<String>(),
        "Handling DNS-01 challenge"
    );
    apply_challenge(dns, settings, validation, delay).await
}
