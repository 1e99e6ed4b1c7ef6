// # EC2 Address Provider
//
// This crate provides the EC2 implementation of `AddressProvider`, talking to
// the EC2 Query API over HTTPS.
//
// ## Behaviour
//
// - One HTTP request per trait call, nothing cached between calls
// - Errors are returned to the `Rotator` as-is; no retries, no backoff
// - HTTP timeout configured (30 seconds); the rotation deadline still applies
// - Requests are signed with AWS Signature Version 4
//
// ## Security Requirements
//
// - The secret access key and session token NEVER appear in logs
// - Credentials are provided via environment variables by the binary
// - The provider fails fast if credentials are empty
//
// ## API Reference
//
// All calls are `POST /` with a form-encoded body, API version 2016-11-15:
//
// | Trait call             | EC2 action                  | Parameters                                                              |
// |------------------------|-----------------------------|-------------------------------------------------------------------------|
// | `allocate_address`     | `AllocateAddress`           | `Domain=vpc`                                                            |
// | `describe_interface`   | `DescribeNetworkInterfaces` | `NetworkInterfaceId.1`                                                  |
// | `disassociate_address` | `DisassociateAddress`       | `AssociationId`                                                         |
// | `associate_address`    | `AssociateAddress`          | `AllocationId`, `NetworkInterfaceId`, `PrivateIpAddress`, `AllowReassociation` |
// | `release_address`      | `ReleaseAddress`            | `AllocationId`                                                          |

mod response;
pub mod signing;

use async_trait::async_trait;
use chrono::Utc;
use eip_core::config::{Credentials, ProviderConfig};
use eip_core::traits::{
    AddressProvider, AddressProviderFactory, AllocatedAddress, AssociateRequest, InterfaceId,
    PrivateAddressSlot,
};
use eip_core::{Error, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;

use response::{
    AllocateAddressResponse, AssociateAddressResponse, DescribeNetworkInterfacesResponse,
    ReturnResponse,
};
use signing::RequestSigner;

/// EC2 Query API version
const API_VERSION: &str = "2016-11-15";

/// Signing name of the EC2 service
const SERVICE: &str = "ec2";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// EC2 elastic address provider
///
/// # Security
///
/// The Debug implementation does NOT expose the secret key or session token.
pub struct Ec2Provider {
    /// Region the endpoint and signatures are scoped to
    region: String,

    /// Query API endpoint
    endpoint: Url,

    /// Host header value that is signed
    host: String,

    /// Request signer holding the credentials
    /// ⚠️ NEVER log the secret it carries
    signer: RequestSigner,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for Ec2Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ec2Provider")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint.as_str())
            .field("signer", &self.signer)
            .finish()
    }
}

impl Ec2Provider {
    /// Create a new EC2 provider
    ///
    /// # Parameters
    ///
    /// - `region`: AWS region, e.g. `us-east-1`
    /// - `credentials`: access key pair, optionally with a session token
    /// - `endpoint`: endpoint override; defaults to `https://ec2.<region>.amazonaws.com/`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the region or credentials are empty or the
    /// endpoint is not a URL with a host.
    pub fn new(
        region: impl Into<String>,
        credentials: Credentials,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let region = region.into();

        if region.is_empty() {
            return Err(Error::config("EC2 region cannot be empty"));
        }
        if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
            return Err(Error::config("EC2 credentials cannot be empty"));
        }

        let endpoint = match endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => format!("https://ec2.{}.amazonaws.com/", region),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| Error::config(format!("Invalid EC2 endpoint {}: {}", endpoint, e)))?;

        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::config(format!(
                    "EC2 endpoint has no host: {}",
                    endpoint
                )));
            }
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            signer: RequestSigner::new(credentials, region.clone(), SERVICE),
            region,
            endpoint,
            host,
            client,
        })
    }

    /// The endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Perform one Query API action and decode its response
    ///
    /// ```http
    /// POST /
    /// Content-Type: application/x-www-form-urlencoded; charset=utf-8
    /// Authorization: AWS4-HMAC-SHA256 Credential=...
    ///
    /// Action=<action>&Version=2016-11-15&<params>
    /// ```
    async fn call<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<T> {
        let body = form_body(action, params);

        let headers = self
            .signer
            .sign_post(&self.host, self.endpoint.path(), &body, Utc::now());

        tracing::debug!("EC2 {} request: {}", action, body);

        let mut request = self.client.post(self.endpoint.clone()).body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read {} response: {}", action, e)))?;

        if !status.is_success() {
            tracing::debug!("EC2 {} failed with {}: {}", action, status, text);
            return Err(response::api_error(action, status.as_u16(), &text));
        }

        response::parse(action, &text)
    }

    async fn call_expecting_return(&self, action: &str, params: &[(&str, &str)]) -> Result<()> {
        let response: ReturnResponse = self.call(action, params).await?;
        if response.ok {
            Ok(())
        } else {
            Err(Error::provider("ec2", format!("{} returned false", action)))
        }
    }
}

/// Encode the form body of a Query API request
fn form_body(action: &str, params: &[(&str, &str)]) -> String {
    let mut body = format!("Action={}&Version={}", action, API_VERSION);
    for (name, value) in params {
        body.push('&');
        body.push_str(&urlencoding::encode(name));
        body.push('=');
        body.push_str(&urlencoding::encode(value));
    }
    body
}

#[async_trait]
impl AddressProvider for Ec2Provider {
    async fn allocate_address(&self) -> Result<AllocatedAddress> {
        let response: AllocateAddressResponse =
            self.call("AllocateAddress", &[("Domain", "vpc")]).await?;

        let allocated = AllocatedAddress {
            public_ip: response::parse_ip(&response.public_ip)?,
            allocation_id: response.allocation_id,
        };

        tracing::info!(
            "Allocated {} ({})",
            allocated.public_ip,
            allocated.allocation_id
        );
        Ok(allocated)
    }

    async fn describe_interface(&self, interface_id: &InterfaceId) -> Result<Vec<PrivateAddressSlot>> {
        let response: DescribeNetworkInterfacesResponse = self
            .call(
                "DescribeNetworkInterfaces",
                &[("NetworkInterfaceId.1", interface_id.as_str())],
            )
            .await?;

        let interface = response
            .network_interface_set
            .items
            .into_iter()
            .find(|item| item.network_interface_id == interface_id.as_str())
            .ok_or_else(|| Error::not_found(format!("Network interface not found: {}", interface_id)))?;

        let slots = interface.into_slots()?;
        tracing::debug!("{} has {} private address(es)", interface_id, slots.len());
        Ok(slots)
    }

    async fn disassociate_address(&self, association_id: &str) -> Result<()> {
        self.call_expecting_return("DisassociateAddress", &[("AssociationId", association_id)])
            .await?;
        tracing::info!("Disassociated {}", association_id);
        Ok(())
    }

    async fn associate_address(&self, request: &AssociateRequest) -> Result<String> {
        let private_ip = request.private_ip.to_string();
        let allow_reassociation = if request.allow_reassociation { "true" } else { "false" };

        let response: AssociateAddressResponse = self
            .call(
                "AssociateAddress",
                &[
                    ("AllocationId", request.allocation_id.as_str()),
                    ("NetworkInterfaceId", request.interface_id.as_str()),
                    ("PrivateIpAddress", private_ip.as_str()),
                    ("AllowReassociation", allow_reassociation),
                ],
            )
            .await?;

        tracing::info!(
            "Associated {} with {} on {} ({})",
            request.allocation_id,
            request.private_ip,
            request.interface_id,
            response.association_id
        );
        Ok(response.association_id)
    }

    async fn release_address(&self, allocation_id: &str) -> Result<()> {
        self.call_expecting_return("ReleaseAddress", &[("AllocationId", allocation_id)])
            .await?;
        tracing::info!("Released {}", allocation_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "ec2"
    }
}

/// Factory for creating EC2 providers
pub struct Ec2Factory;

impl AddressProviderFactory for Ec2Factory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
        match config {
            ProviderConfig::Ec2 {
                region,
                credentials,
                endpoint,
            } => {
                config.validate()?;

                if let Some(endpoint) = endpoint {
                    tracing::warn!("EC2 provider using endpoint override {}", endpoint);
                }

                Ok(Box::new(Ec2Provider::new(
                    region.clone(),
                    credentials.clone(),
                    endpoint.as_deref(),
                )?))
            }
            _ => Err(Error::config("Invalid config for EC2 provider")),
        }
    }
}

/// Register the EC2 provider with a registry
///
/// # Example
///
/// ```rust
/// use eip_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// eip_provider_ec2::register(&registry);
/// assert!(registry.has_provider("ec2"));
/// ```
pub fn register(registry: &eip_core::ProviderRegistry) {
    registry.register_provider("ec2", Box::new(Ec2Factory));
}
