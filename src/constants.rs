//! Shared constants used across the application.

use std::time::Duration;

/// User agent sent with every cloud API request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Timeout applied to every cloud API request.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Time to wait after writing the TXT record before handing control back to certbot.
///
/// DNS propagation is not synchronously observable, so this is a fixed delay.
pub const DNS_PROPAGATION_DELAY: Duration = Duration::from_secs(15);

/// Number of full challenge-and-issuance attempts before giving up.
pub const CHALLENGE_ATTEMPTS: u32 = 3;

/// Pause between failed issuance attempts.
pub const CHALLENGE_BACKOFF: Duration = Duration::from_secs(10);

/// Certificate chain file written by certbot.
pub const CERT_FILE: &str = "fullchain.pem";

/// Private key file written by certbot.
pub const KEY_FILE: &str = "privkey.pem";

/// Where certbot keeps the live lineage for a domain.
pub const LETSENCRYPT_LIVE_DIR: &str = "/etc/letsencrypt/live";
