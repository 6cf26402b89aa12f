//! AWS Signature Version 4 for JSON requests.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::AdapterError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Credentials and scope for one service in one region
#[derive(Debug, Clone)]
pub struct Signer {
    pub access_key: String,
    pub secret: String,
    pub region: String,
    pub service: &'static str,
}

/// A request to be signed. Header names must be lowercase.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: Vec<(&'a str, String)>,
    pub payload: &'a [u8],
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AdapterError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| AdapterError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[must_use]
pub fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

impl Signer {
    fn scope(&self, date: &str) -> String {
        format!("{date}/{}/{}/aws4_request", self.region, self.service)
    }

    /// Derive the key used to sign requests on `date` (`YYYYMMDD`)
    pub fn signing_key(&self, date: &str) -> Result<Vec<u8>, AdapterError> {
        let key = hmac(format!("AWS4{}", self.secret).as_bytes(), date.as_bytes())?;
        let key = hmac(&key, self.region.as_bytes())?;
        let key = hmac(&key, self.service.as_bytes())?;
        hmac(&key, b"aws4_request")
    }

    /// Canonical request and the `;` separated list of signed headers
    fn canonical(request: &Request<'_>) -> (String, String) {
        let mut headers = request
            .headers
            .iter()
            .map(|(name, value)| (*name, value.trim()))
            .collect::<Vec<_>>();
        headers.sort_unstable();

        let canonical_headers = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect::<String>();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");

        let canonical = format!(
            "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
            request.method,
            request.path,
            request.query,
            sha256_hex(request.payload)
        );

        (canonical, signed_headers)
    }

    /// The `Authorization` header value for `request`
    ///
    /// `request` must carry an `x-amz-date` header matching `now`.
    pub fn authorization(
        &self,
        request: &Request<'_>,
        now: DateTime<Utc>,
    ) -> Result<String, AdapterError> {
        let date = now.format("%Y%m%d").to_string();
        let scope = self.scope(&date);
        let (canonical, signed_headers) = Self::canonical(request);

        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{scope}\n{}",
            amz_date(now),
            sha256_hex(canonical.as_bytes())
        );

        let signature = hex::encode(hmac(
            &self.signing_key(&date)?,
            string_to_sign.as_bytes(),
        )?);

        Ok(format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        ))
    }
}
