//! Replace the certificate held in the remote store with the local one.
//!
//! The store has no in-place update, so the old entry is deleted before the
//! new one is uploaded. `Cert_Id` in the config file tracks each step: it is
//! removed right after the delete and rewritten once the upload returns, so it
//! never names a deleted entry.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cert::{certificates_equal, keys_equal, store_name_for, CertificateBundle};
use crate::config::{keys, ConfigFile};
use crate::services::CertificateStore;

/// The entry that was replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousEntry {
    pub cert_id: String,
    pub name: String,
    pub certificate_matched: bool,
    pub key_matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub previous: Option<PreviousEntry>,
    pub new_cert_id: String,
    /// Store name the certificate was uploaded under.
    pub name: String,
}

/// Publish `bundle` for `domain`, replacing the entry `current_id` refers to.
///
/// A lookup failure for `current_id` is treated as "no entry" and the run
/// continues with a fresh upload.
///
/// # Errors
///
/// Returns an error if the old entry cannot be deleted, the upload fails, or
/// the config file cannot be rewritten.
pub async fn publish(
    store: &dyn CertificateStore,
    config: &mut ConfigFile,
    domain: &str,
    current_id: Option<&str>,
    bundle: &CertificateBundle,
) -> Result<PublishOutcome> {
    let key_pem = bundle
        .upload_key_pem()
        .context("Failed to prepare private key for upload")?;

    let remote = match current_id {
        Some(id) => match store.get(id).await {
            Ok(Some(entry)) => Some(entry),
            Ok(None) => {
                warn!(cert_id = %id, "Configured certificate no longer exists in the store");
                forget_cert_id(config)?;
                None
            }
            Err(e) => {
                warn!(cert_id = %id, error = %format!("{e:#}"), "Certificate lookup failed, treating as absent");
                None
            }
        },
        None => None,
    };

    let previous = match remote {
        Some(entry) => {
            let certificate_matched = certificates_equal(&bundle.certificate_pem, &entry.cert_pem);
            let key_matched = keys_equal(&bundle.private_key_pem, &entry.key_pem);
            info!(
                cert_id = %entry.cert_id,
                name = %entry.name,
                certificate_matched,
                key_matched,
                "Compared local certificate with store copy"
            );

            store
                .delete(&entry.cert_id)
                .await
                .with_context(|| format!("Failed to delete certificate {}", entry.cert_id))?;
            forget_cert_id(config)?;

            Some(PreviousEntry {
                cert_id: entry.cert_id,
                name: entry.name,
                certificate_matched,
                key_matched,
            })
        }
        None => None,
    };

    let name = store_name_for(domain);
    let new_cert_id = store
        .upload(
            &bundle.certificate_pem,
            &key_pem,
            &name,
            previous.as_ref().map(|p| p.cert_id.as_str()),
        )
        .await
        .context("Failed to upload certificate")?;

    config.set(keys::CERT_ID, &new_cert_id);
    config
        .save()
        .context("Certificate uploaded but Cert_Id could not be saved")?;
    info!(cert_id = %new_cert_id, name = %name, "Published certificate");

    Ok(PublishOutcome {
        previous,
        new_cert_id,
        name,
    })
}

fn forget_cert_id(config: &mut ConfigFile) -> Result<()> {
    config.remove(keys::CERT_ID);
    config.save().context("Failed to clear Cert_Id")?;
    Ok(())
}
