//! Request signing for the Tuya OpenAPI.
//!
//! Every call carries `sign = HMAC-SHA256(secret, client_id + access_token
//! + t + nonce + string_to_sign)` as upper-case hex, where
//!
//! ```text
//! string_to_sign = METHOD \n sha256_hex(body) \n \n path[?sorted_query]
//! ```
//!
//! The token request itself is signed with an empty access token.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::Credentials;
use crate::error::TuyaError;

pub const SIGN_METHOD: &str = "HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// Encode query pairs sorted by key, then value, skipping nothing.
///
/// The result is used both on the wire and in the string to sign, so the
/// two can never disagree.
#[must_use]
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = query.iter().collect();
    pairs.sort();
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// `path` followed by `?query` when the query is not empty.
#[must_use]
pub fn path_and_query(path: &str, query: &[(String, String)]) -> String {
    let encoded = canonical_query(query);
    if encoded.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{encoded}")
    }
}

/// Lower-case hex SHA-256 of the request body.
#[must_use]
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[must_use]
pub fn string_to_sign(method: &str, body: &[u8], path_and_query: &str) -> String {
    format!(
        "{}\n{}\n\n{path_and_query}",
        method.to_ascii_uppercase(),
        content_hash(body)
    )
}

/// Keyed signer for one set of project credentials.
#[derive(Clone)]
pub struct Signer {
    client_id: String,
    mac: HmacSha256,
}

impl Signer {
    /// # Errors
    ///
    /// Returns [`TuyaError::Config`] if the secret cannot key an HMAC.
    pub fn new(credentials: &Credentials) -> Result<Self, TuyaError> {
        let mac = HmacSha256::new_from_slice(credentials.client_secret.expose().as_bytes())
            .map_err(|err| TuyaError::Config(format!("unusable client_secret: {err}")))?;
        Ok(Self {
            client_id: credentials.client_id.clone(),
            mac,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Upper-case hex signature of one request.
    #[must_use]
    pub fn sign(
        &self,
        access_token: Option<&str>,
        timestamp: &str,
        nonce: &str,
        string_to_sign: &str,
    ) -> String {
        let mut mac = self.mac.clone();
        mac.update(self.client_id.as_bytes());
        mac.update(access_token.unwrap_or_default().as_bytes());
        mac.update(timestamp.as_bytes());
        mac.update(nonce.as_bytes());
        mac.update(string_to_sign.as_bytes());
        hex::encode_upper(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
