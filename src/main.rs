use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aliyun_cert_renewer::aliyun::{self, AliyunClient, AliyunDns};
use aliyun_cert_renewer::challenge::{certbot, run_auth_hook, CertbotIssuer, RetryPolicy};
use aliyun_cert_renewer::config::{DnsSettings, RenewalConfig};
use aliyun_cert_renewer::constants::DNS_PROPAGATION_DELAY;
use aliyun_cert_renewer::renew::{self, Paths, RunReport, Services};

/// Renew a wildcard certificate over ACME DNS-01 and deploy it to Alibaba Cloud.
#[derive(Parser)]
#[command(name = "aliyun-cert-renewer", version, about, long_about = None)]
struct Cli {
    /// Configuration file (`KEY=value` lines)
    #[arg(long, global = true, env = "RENEWER_CONFIG", default_value = ".env")]
    config: PathBuf,

    /// Status file recording the deployed certificate's expiry
    #[arg(long, global = true, env = "RENEWER_STATUS", default_value = "db.json")]
    status: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Renew and deploy the certificate if it is due (default)
    Renew,

    /// DNS-01 callback invoked by certbot
    AuthHook {
        /// Domain under validation
        #[arg(long, env = "CERTBOT_DOMAIN")]
        domain: Option<String>,

        /// Validation token to publish
        #[arg(long, env = "CERTBOT_VALIDATION")]
        validation: Option<String>,
    },

    /// Validate the configuration and print it with secrets redacted
    ShowConfig,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let paths = Paths {
        config: cli.config,
        status: cli.status,
    };

    match cli.command.unwrap_or(Command::Renew) {
        Command::Renew => renew(&paths).await,
        Command::AuthHook { domain, validation } => {
            auth_hook(
                &paths.config,
                domain.as_deref().unwrap_or_default(),
                validation.as_deref().unwrap_or_default(),
            )
            .await
        }
        Command::ShowConfig => show_config(&paths.config),
    }
}

async fn renew(paths: &Paths) -> Result<()> {
    info!(
        config = %paths.config.display(),
        status = %paths.status.display(),
        "Starting aliyun-cert-renewer"
    );

    let hook = hook_command(&paths.config)?;
    let report = renew::run_once(paths, chrono::Utc::now(), RetryPolicy::default(), |config| {
        let (dns, store, functions) = aliyun::connect(config)?;
        Ok(Services {
            dns: Box::new(dns),
            store: Box::new(store),
            functions: Box::new(functions),
            issuer: Box::new(CertbotIssuer::new(&config.acme, hook)),
        })
    })
    .await?;

    match report {
        RunReport::TemplateCreated => info!("Template config written, nothing else to do"),
        RunReport::NotDue { expires_at } => info!(expires_at = %expires_at, "Nothing to do"),
        RunReport::Renewed(summary) => info!(
            cert_id = %summary.new_cert_id,
            expires_at = %summary.expires_at,
            attempts = summary.attempts,
            status_saved = summary.status_saved,
            "Done"
        ),
    }
    Ok(())
}

/// Command certbot runs for each challenge, pointing back at this binary.
fn hook_command(config: &Path) -> Result<String> {
    let exe = std::env::current_exe().context("Failed to locate own executable")?;
    let config = std::path::absolute(config)
        .with_context(|| format!("Failed to resolve {}", config.display()))?;
    Ok(certbot::hook_command(&exe, &config))
}

async fn auth_hook(config: &Path, domain: &str, validation: &str) -> Result<()> {
    let settings = DnsSettings::load(config).context("Failed to load DNS settings")?;
    let client = AliyunClient::new(settings.credentials.clone())?;
    let dns = AliyunDns::new(client, &settings.endpoint)?;

    let change = run_auth_hook(&dns, &settings, domain, validation, DNS_PROPAGATION_DELAY).await?;
    info!(?change, "Challenge record ready");
    Ok(())
}

fn show_config(config: &Path) -> Result<()> {
    let config = RenewalConfig::load(config)
        .with_context(|| format!("Invalid configuration in {}", config.display()))?;
    println!("{config:#?}");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aliyun_cert_renewer=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
