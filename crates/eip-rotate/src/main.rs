// # eip-rotate
//
// One-shot tool that swaps the public address on one private slot of one
// interface drawn from a fixed pool.
//
// This binary is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and loading the interface pool
// 4. Running one rotation (or one dry-run plan) and reporting the result
//
// All rotation logic lives in eip-core.
//
// ## Configuration
//
// ### Pool
// - `EIP_POOL_FILE`: JSON file `{"dynamic": ["eni-..", ..]}` (default `enis.json`)
//
// ### Provider
// - `EIP_PROVIDER_TYPE`: Provider type (default `ec2`)
// - `AWS_REGION` / `AWS_DEFAULT_REGION`: Region
// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`: Credentials
// - `AWS_SESSION_TOKEN`: Session token for temporary credentials (optional)
// - `EIP_EC2_ENDPOINT`: Endpoint override (optional)
//
// ### Rotation
// - `EIP_TIMEOUT_SECS`: Deadline for the whole run, 1..=600 (default 60)
// - `EIP_SEED`: Seed for interface and slot selection (optional)
// - `EIP_MODE`: `live` (default) or `dry-run`
// - `EIP_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export AWS_REGION=us-east-1
// export AWS_ACCESS_KEY_ID=...
// export AWS_SECRET_ACCESS_KEY=...
// export EIP_POOL_FILE=/etc/eip-rotate/enis.json
//
// eip-rotate
// ```
//
// ## Exit codes
//
// - 0: Rotation (or plan) succeeded
// - 1: Configuration or startup error
// - 2: A rotation step failed or the deadline passed
// - 3: The selected interface has no associated public address

use anyhow::{Context, Result};
use eip_core::config::{Credentials, ProviderConfig, RotationConfig, RotatorConfig};
use eip_core::{InterfacePool, ProviderRegistry, RandomSelector, Rotator};
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RotateExitCode {
    /// Rotation or plan completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// A provider call failed or the deadline passed
    RotationFailed = 2,
    /// The chosen interface cannot be rotated
    PreconditionFailed = 3,
}

impl From<RotateExitCode> for ExitCode {
    fn from(code: RotateExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl RotateExitCode {
    /// Classify a failed run
    fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<eip_core::Error>() {
            Some(eip_core::Error::Precondition(_)) => Self::PreconditionFailed,
            Some(eip_core::Error::Step { .. }) | Some(eip_core::Error::Timeout(_)) => {
                Self::RotationFailed
            }
            Some(_) | None => Self::ConfigError,
        }
    }
}

/// Run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Rotate for real
    Live,
    /// Describe and select only; print what would be rotated
    DryRun,
}

/// Application configuration
struct Config {
    pool_file: String,
    provider_type: String,
    region: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<String>,
    seed: Option<String>,
    mode: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            pool_file: non_empty("EIP_POOL_FILE").unwrap_or_else(|| "enis.json".to_string()),
            provider_type: non_empty("EIP_PROVIDER_TYPE").unwrap_or_else(|| "ec2".to_string()),
            region: non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION")),
            access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
            session_token: non_empty("AWS_SESSION_TOKEN"),
            endpoint: non_empty("EIP_EC2_ENDPOINT"),
            timeout_secs: non_empty("EIP_TIMEOUT_SECS"),
            seed: non_empty("EIP_SEED"),
            mode: non_empty("EIP_MODE").unwrap_or_else(|| "live".to_string()),
            log_level: non_empty("EIP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate the configuration
    ///
    /// Every value is checked before the runtime starts, so a bad
    /// environment never reaches the provider.
    fn validate(&self) -> Result<()> {
        match self.provider_type.as_str() {
            "ec2" => {}
            _ => anyhow::bail!(
                "EIP_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: ec2",
                self.provider_type
            ),
        }

        if self.region.is_none() {
            anyhow::bail!(
                "AWS_REGION is required. \
                Set it via: export AWS_REGION=us-east-1"
            );
        }

        if self.access_key_id.is_none() || self.secret_access_key.is_none() {
            anyhow::bail!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required"
            );
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
                anyhow::bail!(
                    "EIP_EC2_ENDPOINT must use HTTP or HTTPS scheme. Got: {}",
                    endpoint
                );
            }

            if endpoint.starts_with("http://") {
                eprintln!(
                    "WARNING: EIP_EC2_ENDPOINT uses HTTP (not HTTPS). \
                    Signed requests will travel unencrypted."
                );
            }
        }

        self.timeout()?;
        self.seed()?;
        self.mode()?;
        self.log_level()?;

        Ok(())
    }

    fn timeout(&self) -> Result<u64> {
        let Some(ref raw) = self.timeout_secs else {
            return Ok(RotationConfig::default().timeout_secs);
        };

        let secs: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("EIP_TIMEOUT_SECS must be a number. Got: {}", raw))?;

        if !(1..=600).contains(&secs) {
            anyhow::bail!(
                "EIP_TIMEOUT_SECS must be between 1 and 600 seconds. Got: {}",
                secs
            );
        }

        Ok(secs)
    }

    fn seed(&self) -> Result<Option<u64>> {
        self.seed
            .as_deref()
            .map(|raw| {
                raw.trim()
                    .parse()
                    .with_context(|| format!("EIP_SEED must be an unsigned integer. Got: {}", raw))
            })
            .transpose()
    }

    fn mode(&self) -> Result<Mode> {
        match self.mode.to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "dry-run" => Ok(Mode::DryRun),
            _ => anyhow::bail!(
                "EIP_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "EIP_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Provider configuration for the registry
    fn provider_config(&self) -> ProviderConfig {
        let mut credentials = Credentials::new(
            self.access_key_id.clone().unwrap_or_default(),
            self.secret_access_key.clone().unwrap_or_default(),
        );
        if let Some(ref token) = self.session_token {
            credentials = credentials.with_session_token(token.clone());
        }

        ProviderConfig::Ec2 {
            region: self.region.clone().unwrap_or_default(),
            credentials,
            endpoint: self.endpoint.clone(),
        }
    }
}

fn main() -> ExitCode {
    let config = Config::from_env();

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return RotateExitCode::ConfigError.into();
    }

    // Initialize tracing; stdout carries only the result lines
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RotateExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RotateExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(run(config));

    match result {
        Ok(()) => RotateExitCode::Success.into(),
        Err(e) => {
            error!("{:#}", e);
            RotateExitCode::for_error(&e).into()
        }
    }
}

/// Wire the rotator and run it once
async fn run(config: Config) -> Result<()> {
    let mode = config.mode()?;
    let seed = config.seed()?;

    let pool = InterfacePool::load(&config.pool_file)
        .await
        .with_context(|| format!("Failed to load interface pool from {}", config.pool_file))?;
    info!(
        "Loaded {} interface(s) from {}",
        pool.len(),
        config.pool_file
    );

    let registry = ProviderRegistry::new();

    #[cfg(feature = "ec2")]
    eip_provider_ec2::register(&registry);

    debug!("Registered providers: {:?}", registry.list_providers());

    let provider_config = config.provider_config();
    let provider = registry
        .create_provider(&provider_config)
        .context("Failed to create address provider")?;

    let selector = match seed {
        Some(seed) => {
            info!("Using seeded selection ({})", seed);
            RandomSelector::seeded(seed)
        }
        None => RandomSelector::new(),
    };

    let mut rotator_config = RotatorConfig::new(pool, provider_config);
    rotator_config.rotation.timeout_secs = config.timeout()?;

    let (rotator, mut events) = Rotator::new(provider, Box::new(selector), rotator_config)?;

    let monitor = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Rotation event");
        }
    });

    let outcome = match mode {
        Mode::Live => rotator.rotate().await.map(|report| {
            println!("Interface {} has been updated.", report.interface_id);
            println!("Old IP: {}", report.old_public_ip);
            println!("New IP: {}", report.new_public_ip);
        }),
        Mode::DryRun => {
            warn!("Running in DRY-RUN mode - no changes will be made");
            rotator.plan().await.map(|plan| {
                println!("Interface {} would be updated.", plan.interface_id);
                println!("Private IP: {}", plan.private_ip);
                println!("Old IP: {}", plan.old_public_ip);
            })
        }
    };

    // Closing the channel ends the monitor
    drop(rotator);
    let _ = monitor.await;

    Ok(outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn valid_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AWS_REGION", "us-east-1"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI/K7MDENG"),
        ]
    }

    fn with(extra: &[(&'static str, &'static str)]) -> Config {
        let mut vars = valid_vars();
        vars.extend_from_slice(extra);
        config_from(&vars)
    }

    #[test]
    fn test_defaults() {
        let config = with(&[]);
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_file, "enis.json");
        assert_eq!(config.provider_type, "ec2");
        assert_eq!(config.timeout().unwrap(), 60);
        assert_eq!(config.seed().unwrap(), None);
        assert_eq!(config.mode().unwrap(), Mode::Live);
        assert_eq!(config.log_level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_region_falls_back_to_default_region() {
        let config = config_from(&[
            ("AWS_DEFAULT_REGION", "eu-central-1"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.region.as_deref(), Some("eu-central-1"));
    }

    #[test]
    fn test_missing_region_rejected() {
        let config = config_from(&[
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = config_from(&[("AWS_REGION", "us-east-1")]);
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("AWS_REGION", "us-east-1"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "   "),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(with(&[("EIP_PROVIDER_TYPE", "gcp")]).validate().is_err());
    }

    #[test]
    fn test_timeout_range() {
        assert_eq!(with(&[("EIP_TIMEOUT_SECS", "1")]).timeout().unwrap(), 1);
        assert_eq!(with(&[("EIP_TIMEOUT_SECS", "600")]).timeout().unwrap(), 600);
        assert!(with(&[("EIP_TIMEOUT_SECS", "0")]).validate().is_err());
        assert!(with(&[("EIP_TIMEOUT_SECS", "601")]).validate().is_err());
        assert!(with(&[("EIP_TIMEOUT_SECS", "soon")]).validate().is_err());
    }

    #[test]
    fn test_seed_parsing() {
        assert_eq!(with(&[("EIP_SEED", "42")]).seed().unwrap(), Some(42));
        assert!(with(&[("EIP_SEED", "-1")]).validate().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(with(&[("EIP_MODE", "dry-run")]).mode().unwrap(), Mode::DryRun);
        assert_eq!(with(&[("EIP_MODE", "LIVE")]).mode().unwrap(), Mode::Live);
        assert!(with(&[("EIP_MODE", "maybe")]).validate().is_err());
    }

    #[test]
    fn test_log_level_validated() {
        assert_eq!(
            with(&[("EIP_LOG_LEVEL", "debug")]).log_level().unwrap(),
            Level::DEBUG
        );
        assert!(with(&[("EIP_LOG_LEVEL", "verbose")]).validate().is_err());
    }

    #[test]
    fn test_endpoint_scheme_validated() {
        assert!(with(&[("EIP_EC2_ENDPOINT", "ftp://localhost")]).validate().is_err());
        assert!(with(&[("EIP_EC2_ENDPOINT", "http://localhost:4566")]).validate().is_ok());
    }

    #[test]
    fn test_provider_config_carries_session_token() {
        let config = with(&[("AWS_SESSION_TOKEN", "token-1")]);
        match config.provider_config() {
            ProviderConfig::Ec2 {
                region,
                credentials,
                endpoint,
            } => {
                assert_eq!(region, "us-east-1");
                assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
                assert_eq!(credentials.session_token.as_deref(), Some("token-1"));
                assert_eq!(endpoint, None);
            }
            other => panic!("unexpected provider config: {:?}", other),
        }
    }

    #[test]
    fn test_exit_code_classification() {
        let precondition = anyhow::Error::new(eip_core::Error::precondition("eni-1 has no association"));
        assert_eq!(
            RotateExitCode::for_error(&precondition),
            RotateExitCode::PreconditionFailed
        );

        let step = anyhow::Error::new(eip_core::Error::step(
            eip_core::Operation::DisassociateAddress,
            eip_core::Error::not_found("eipassoc-1"),
        ));
        assert_eq!(RotateExitCode::for_error(&step), RotateExitCode::RotationFailed);

        let timeout = anyhow::Error::new(eip_core::Error::Timeout(Duration::from_secs(60)));
        assert_eq!(RotateExitCode::for_error(&timeout), RotateExitCode::RotationFailed);

        let pool = anyhow::Error::new(eip_core::Error::config("pool is empty"))
            .context("Failed to load interface pool from enis.json");
        assert_eq!(RotateExitCode::for_error(&pool), RotateExitCode::ConfigError);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(RotateExitCode::for_error(&plain), RotateExitCode::ConfigError);
    }
}
