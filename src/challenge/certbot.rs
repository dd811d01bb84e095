//! Certbot wrapper for DNS-01 issuance.
//!
//! Certbot runs in manual mode and calls back into this binary
//! (`auth-hook` subcommand) to publish each validation token.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::AcmeIssuer;
use crate::config::AcmeSettings;

/// Max chars kept per output stream in error messages.
const MAX_OUTPUT_LEN: usize = 2000;

/// Issues certificates by running certbot.
#[derive(Debug, Clone)]
pub struct CertbotIssuer {
    path: String,
    server: String,
    email: String,
    timeout: Duration,
    hook_command: String,
}

impl CertbotIssuer {
    #[must_use]
    pub fn new(settings: &AcmeSettings, hook_command: impl Into<String>) -> Self {
        Self {
            path: settings.certbot_path.clone(),
            server: settings.server.clone(),
            email: settings.email.clone(),
            timeout: settings.timeout,
            hook_command: hook_command.into(),
        }
    }

    /// Arguments for a forced wildcard issuance for `domain`.
    #[must_use]
    pub fn arguments(&self, domain: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "certonly",
            "--force-renewal",
            "--manual",
            "--manual-auth-hook",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        args.push(self.hook_command.clone());
        args.extend(
            [
                "--preferred-challenges".to_string(),
                "dns".to_string(),
                "-d".to_string(),
                format!("*.{domain}"),
                "--server".to_string(),
                self.server.clone(),
                "--key-type".to_string(),
                "rsa".to_string(),
                "--non-interactive".to_string(),
                "--agree-tos".to_string(),
                "--email".to_string(),
                self.email.clone(),
            ],
        );
        args
    }
}

#[async_trait]
impl AcmeIssuer for CertbotIssuer {
    async fn issue(&self, domain: &str) -> Result<()> {
        debug!(domain = %domain, certbot = %self.path, "Running certbot");

        let mut cmd = Command::new(&self.path);
        cmd.args(self.arguments(domain));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .with_context(|| format!("certbot timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("Failed to execute {}", self.path))?;

        if !output.status.success() {
            anyhow::bail!(
                "certbot failed with exit code {:?}.\nStderr:\n{}\nStdout:\n{}",
                output.status.code(),
                truncate_output(&String::from_utf8_lossy(&output.stderr)),
                truncate_output(&String::from_utf8_lossy(&output.stdout)),
            );
        }

        debug!(
            domain = %domain,
            stdout = %truncate_output(&String::from_utf8_lossy(&output.stdout)),
            "certbot finished"
        );
        Ok(())
    }
}

/// Command line certbot runs for each challenge: this executable's `auth-hook`.
#[must_use]
pub fn hook_command(exe: &Path, config: &Path) -> String {
    format!(
        "{} --config {} auth-hook",
        shell_quote(&exe.to_string_lossy()),
        shell_quote(&config.to_string_lossy())
    )
}

/// Single-quote `value` for `/bin/sh`, leaving plain words untouched.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn truncate_output(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_OUTPUT_LEN) {
        Some((idx, _)) => format!(
            "{}...[truncated {} more chars]",
            &text[..idx],
            text[idx..].chars().count()
        ),
        None => text.to_string(),
    }
}
