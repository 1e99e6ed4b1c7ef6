//! EC2 Query API response bodies
//!
//! Responses are XML. Only the elements a rotation reads are modelled;
//! everything else is skipped by the deserializer.

use eip_core::traits::{Association, PrivateAddressSlot};
use eip_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::IpAddr;

/// `<AllocateAddressResponse>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateAddressResponse {
    pub public_ip: String,
    pub allocation_id: String,
}

/// `<DescribeNetworkInterfacesResponse>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeNetworkInterfacesResponse {
    #[serde(default)]
    pub network_interface_set: ItemSet<NetworkInterface>,
}

/// `<AssociateAddressResponse>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateAddressResponse {
    pub association_id: String,
}

/// Responses that only carry `<return>true</return>`
#[derive(Debug, Deserialize)]
pub struct ReturnResponse {
    #[serde(rename = "return", default)]
    pub ok: bool,
}

/// An EC2 list: `<xxxSet><item>..</item>..</xxxSet>`
#[derive(Debug, Deserialize)]
pub struct ItemSet<T> {
    #[serde(rename = "item", default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for ItemSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub network_interface_id: String,
    #[serde(default)]
    pub private_ip_addresses_set: ItemSet<PrivateIpAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateIpAddress {
    pub private_ip_address: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub association: Option<InterfaceAssociation>,
}

/// Association element nested in a private address entry
///
/// Public addresses auto-assigned at launch have neither an allocation nor
/// an association id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceAssociation {
    pub public_ip: String,
    #[serde(default)]
    pub allocation_id: Option<String>,
    #[serde(default)]
    pub association_id: Option<String>,
}

/// `<Response><Errors><Error>..</Error></Errors></Response>`
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Errors")]
    pub errors: ApiErrors,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrors {
    #[serde(rename = "Error", default = "Vec::new")]
    pub error: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// Decode a successful response body
pub fn parse<T: DeserializeOwned>(action: &str, body: &str) -> Result<T> {
    quick_xml::de::from_str(body).map_err(|e| {
        Error::provider("ec2", format!("Failed to parse {} response: {}", action, e))
    })
}

pub fn parse_ip(value: &str) -> Result<IpAddr> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::provider("ec2", format!("Invalid IP address in response: {}", value)))
}

impl NetworkInterface {
    /// Convert to private address slots in response order
    pub fn into_slots(self) -> Result<Vec<PrivateAddressSlot>> {
        let interface_id = self.network_interface_id;

        self.private_ip_addresses_set
            .items
            .into_iter()
            .map(|entry| {
                let private_ip = parse_ip(&entry.private_ip_address)?;

                let association = match entry.association {
                    Some(InterfaceAssociation {
                        public_ip,
                        allocation_id: Some(allocation_id),
                        association_id: Some(association_id),
                    }) => Some(Association {
                        association_id,
                        allocation_id,
                        public_ip: parse_ip(&public_ip)?,
                    }),
                    Some(other) => {
                        tracing::debug!(
                            "{} on {} has non-elastic public address {}; treating as unassociated",
                            private_ip,
                            interface_id,
                            other.public_ip
                        );
                        None
                    }
                    None => None,
                };

                Ok(PrivateAddressSlot {
                    private_ip,
                    primary: entry.primary,
                    association,
                })
            })
            .collect()
    }
}

/// Map a failed HTTP response to an error
///
/// The EC2 error code decides the kind; the HTTP status is the fallback
/// when the body is not an error envelope.
pub fn api_error(action: &str, status: u16, body: &str) -> Error {
    let parsed = quick_xml::de::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|response| response.errors.error.into_iter().next());

    let Some(ApiError { code, message }) = parsed else {
        return match status {
            401 | 403 => Error::auth(format!("{} rejected with status {}", action, status)),
            404 => Error::not_found(format!("{} returned status 404", action)),
            503 => Error::rate_limited(format!("{} throttled with status 503", action)),
            _ => Error::provider("ec2", format!("{} failed with status {}: {}", action, status, body.trim())),
        };
    };

    let detail = format!("{}: {}", code, message);

    if matches!(status, 401 | 403)
        || code == "AuthFailure"
        || code == "UnauthorizedOperation"
        || code.starts_with("InvalidClientTokenId")
        || code == "SignatureDoesNotMatch"
    {
        Error::auth(detail)
    } else if status == 404 || code.ends_with(".NotFound") {
        Error::not_found(detail)
    } else if code == "RequestLimitExceeded" || code == "Throttling" || status == 503 {
        Error::rate_limited(detail)
    } else {
        Error::provider("ec2", detail)
    }
}
