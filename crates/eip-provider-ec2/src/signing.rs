//! AWS Signature Version 4 request signing
//!
//! Only what the EC2 Query API needs: form-encoded POST bodies to `/`,
//! signing `content-type`, `host`, `x-amz-date` and, for temporary
//! credentials, `x-amz-security-token`.

use chrono::{DateTime, Utc};
use eip_core::Credentials;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Content type of Query API request bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Signs requests for one service in one region
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
    service: &'static str,
}

impl RequestSigner {
    pub fn new(credentials: Credentials, region: impl Into<String>, service: &'static str) -> Self {
        Self {
            credentials,
            region: region.into(),
            service,
        }
    }

    /// Compute the headers to send with a POST of `body` to `host` + `path`
    ///
    /// The returned list includes `content-type`; callers must send every
    /// header exactly as returned.
    pub fn sign_post(
        &self,
        host: &str,
        path: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Vec<(&'static str, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        // Sorted by header name
        let mut headers: Vec<(&'static str, String)> = vec![
            ("content-type", FORM_CONTENT_TYPE.to_string()),
            ("host", host.to_string()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "POST\n{}\n\n{}\n{}\n{}",
            path,
            canonical_headers,
            signed_headers,
            sha256_hex(body.as_bytes())
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            sha256_hex(canonical_request.as_bytes())
        );

        let key = signing_key(
            &self.credentials.secret_access_key,
            &date,
            &self.region,
            self.service,
        );
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        );

        // reqwest derives Host from the URL; it is signed but not sent twice
        headers.retain(|(name, _)| *name != "host");
        headers.push(("authorization", authorization));
        headers
    }
}

/// Derive the SigV4 signing key for a date, region and service
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hmac_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_empty_payload_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_signing_key_derivation() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    fn signer(credentials: Credentials) -> RequestSigner {
        RequestSigner::new(credentials, "us-east-1", "ec2")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_authorization_header_shape() {
        let headers = signer(Credentials::new("AKIDEXAMPLE", "secret")).sign_post(
            "ec2.us-east-1.amazonaws.com",
            "/",
            "Action=AllocateAddress&Version=2016-11-15&Domain=vpc",
            now(),
        );

        assert_eq!(header(&headers, "x-amz-date"), Some("20150830T123600Z"));
        assert_eq!(header(&headers, "content-type"), Some(FORM_CONTENT_TYPE));
        assert_eq!(header(&headers, "host"), None);

        let authorization = header(&headers, "authorization").unwrap();
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/ec2/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, Signature="
        ));
        let signature = authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_token_is_signed_and_sent() {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret").with_session_token("token-1");
        let headers = signer(credentials).sign_post("ec2.us-east-1.amazonaws.com", "/", "", now());

        assert_eq!(header(&headers, "x-amz-security-token"), Some("token-1"));
        assert!(
            header(&headers, "authorization")
                .unwrap()
                .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token")
        );
    }

    #[test]
    fn test_signature_depends_on_body() {
        let signer = signer(Credentials::new("AKIDEXAMPLE", "secret"));
        let a = signer.sign_post("ec2.us-east-1.amazonaws.com", "/", "Action=A", now());
        let b = signer.sign_post("ec2.us-east-1.amazonaws.com", "/", "Action=B", now());

        assert_ne!(header(&a, "authorization"), header(&b, "authorization"));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = signer(Credentials::new("AKIDEXAMPLE", "secret"));
        let a = signer.sign_post("ec2.us-east-1.amazonaws.com", "/", "Action=A", now());
        let b = signer.sign_post("ec2.us-east-1.amazonaws.com", "/", "Action=A", now());

        assert_eq!(a, b);
    }
}
