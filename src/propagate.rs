//! Push a renewed certificate to Function Compute custom domains.
//!
//! Best-effort fan-out: each domain gets its own result and a failure on one
//! never stops the others. Nothing is rolled back.

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::services::{FunctionPlatform, ManagedEndpoint};

/// Whether `name` is `domain` or one of its subdomains.
#[must_use]
pub fn matches_domain(name: &str, domain: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    name == domain || name.ends_with(&format!(".{domain}"))
}

/// Endpoints covered by the certificate for `domain`.
#[must_use]
pub fn select_endpoints(endpoints: Vec<ManagedEndpoint>, domain: &str) -> Vec<ManagedEndpoint> {
    endpoints
        .into_iter()
        .filter(|e| matches_domain(&e.domain_name, domain))
        .collect()
}

/// Result of updating one custom domain.
#[derive(Debug)]
pub struct EndpointOutcome {
    pub domain_name: String,
    pub result: Result<()>,
}

/// What to install on every matching endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CertificatePush<'a> {
    pub account_id: &'a str,
    pub domain: &'a str,
    pub cert_name: &'a str,
    pub cert_pem: &'a str,
    pub key_pem: &'a str,
}

/// Install the certificate on every custom domain under `push.domain`.
///
/// # Errors
///
/// Returns an error only if the custom domains cannot be listed. Failures of
/// individual updates are reported in the returned outcomes.
pub async fn propagate(
    platform: &dyn FunctionPlatform,
    push: CertificatePush<'_>,
) -> Result<Vec<EndpointOutcome>> {
    let all = platform
        .list_domains(push.account_id)
        .await
        .context("Failed to list custom domains")?;
    let targets = select_endpoints(all, push.domain);
    info!(
        count = targets.len(),
        domains = ?targets.iter().map(|t| t.domain_name.as_str()).collect::<Vec<_>>(),
        "Custom domains to update"
    );

    let mut outcomes = Vec::with_capacity(targets.len());
    for target in targets {
        let result = platform
            .update_domain_cert(
                push.account_id,
                &target.domain_name,
                push.cert_name,
                push.cert_pem,
                push.key_pem,
            )
            .await
            .and_then(|status| match status {
                200 => Ok(()),
                other => Err(anyhow::anyhow!("unexpected HTTP status {other}")),
            });
        outcomes.push(EndpointOutcome {
            domain_name: target.domain_name,
            result,
        });
    }

    Ok(outcomes)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Log each outcome and count them.
#[must_use]
pub fn summarize(outcomes: &[EndpointOutcome]) -> PropagationSummary {
    let mut summary = PropagationSummary::default();
    for outcome in outcomes {
        match &outcome.result {
            Ok(()) => {
                info!(domain = %outcome.domain_name, "Custom domain certificate updated");
                summary.succeeded += 1;
            }
            Err(e) => {
                error!(domain = %outcome.domain_name, error = %format!("{e:#}"), "Custom domain update failed");
                summary.failed += 1;
            }
        }
    }
    summary
}
