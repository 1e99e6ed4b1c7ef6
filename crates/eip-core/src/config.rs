//! Configuration types for address rotation
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::pool::InterfacePool;

/// Main rotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatorConfig {
    /// Interfaces eligible for rotation
    pub pool: InterfacePool,

    /// Address provider configuration
    pub provider: ProviderConfig,

    /// Optional rotation settings
    #[serde(default)]
    pub rotation: RotationConfig,
}

impl RotatorConfig {
    /// Create a configuration for a pool and provider with default settings
    pub fn new(pool: InterfacePool, provider: ProviderConfig) -> Self {
        Self {
            pool,
            provider,
            rotation: RotationConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.pool.validate()?;
        self.provider.validate()?;
        self.rotation.validate()?;

        Ok(())
    }
}

/// Provider credentials
///
/// The Debug implementation never prints the secret or session token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access key identifier
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token for temporary credentials
    #[serde(default)]
    pub session_token: Option<String>,
}

impl Credentials {
    /// Create long-term credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<REDACTED>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Address provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// EC2 Query API
    Ec2 {
        /// Region, e.g. "us-east-1"
        region: String,
        /// Signing credentials
        credentials: Credentials,
        /// Endpoint override (defaults to the regional endpoint)
        #[serde(default)]
        endpoint: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Ec2 {
                region,
                credentials,
                endpoint,
            } => {
                if region.is_empty() {
                    return Err(crate::Error::config("EC2 region cannot be empty"));
                }
                if credentials.access_key_id.is_empty() {
                    return Err(crate::Error::config("EC2 access key id cannot be empty"));
                }
                if credentials.secret_access_key.is_empty() {
                    return Err(crate::Error::config(
                        "EC2 secret access key cannot be empty",
                    ));
                }
                if let Some(endpoint) = endpoint
                    && !endpoint.starts_with("https://")
                    && !endpoint.starts_with("http://")
                {
                    return Err(crate::Error::config(format!(
                        "EC2 endpoint must be an http(s) URL. Got: {}",
                        endpoint
                    )));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Ec2 { .. } => "ec2",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Rotation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Deadline for the whole rotation, in seconds
    ///
    /// Every step is a network round trip that can hang; when the deadline
    /// passes the remaining steps are abandoned.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Capacity of the rotation event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl RotationConfig {
    /// The rotation deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the rotation settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Rotation timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    64
}
