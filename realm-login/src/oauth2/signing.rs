//! Signed start URLs
//!
//! The start endpoint accepts caller-supplied target and failure paths, so it
//! only accepts URLs this application produced. A URL is signed with
//! HMAC-SHA256 over its path and its query pairs sorted by key; the
//! signature travels in the `_hash` query parameter, base64url without padding.
//! Host and scheme are not signed so the URL survives reverse proxies.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::oauth2::target::encode_target;
use crate::oauth2::types::Realm;

type HmacSha256 = Hmac<Sha256>;

/// Query parameter carrying the signature
pub const HASH_PARAM: &str = "_hash";

/// Signing errors
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The key was rejected by the MAC
    #[error("Invalid signing key")]
    InvalidKey,
}

/// Options of a start URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginUrlParams {
    /// Post-login target (plain, encoded by the signer)
    pub target_path: Option<String>,
    /// Prefer the target over the one chosen by the security layer
    pub always_use_target_path: bool,
    /// Failure redirect for frontend members (plain, encoded by the signer)
    pub failure_path: Option<String>,
}

/// HMAC signer and verifier for start URLs
#[derive(Clone)]
pub struct UriSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for UriSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UriSigner").finish_non_exhaustive()
    }
}

impl UriSigner {
    /// Create a signer from the configured secret
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// Return `uri` with a `_hash` parameter appended
    ///
    /// Relative URIs (starting with `/`) stay relative.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI cannot be parsed
    pub fn sign(&self, uri: &str) -> Result<String, SigningError> {
        let (mut url, relative) = parse(uri)?;
        let pairs = unsigned_pairs(&url);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(url.path(), &pairs)?.finalize().into_bytes());

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
            query.append_pair(HASH_PARAM, &signature);
        }

        Ok(render(&url, relative))
    }

    /// Verify the `_hash` parameter of `uri` in constant time
    #[must_use]
    pub fn check(&self, uri: &str) -> bool {
        self.check_excluding(uri, &[])
    }

    /// Like [`Self::check`], ignoring parameters added after signing
    /// (e.g. a request token appended by a form)
    #[must_use]
    pub fn check_excluding(&self, uri: &str, excluded: &[&str]) -> bool {
        let Ok((url, _)) = parse(uri) else {
            return false;
        };

        let Some(signature) = url
            .query_pairs()
            .find(|(key, _)| key == HASH_PARAM)
            .and_then(|(_, value)| URL_SAFE_NO_PAD.decode(value.as_bytes()).ok())
        else {
            return false;
        };

        let pairs: Vec<(String, String)> = unsigned_pairs(&url)
            .into_iter()
            .filter(|(key, _)| !excluded.contains(&key.as_str()))
            .collect();

        self.mac(url.path(), &pairs)
            .is_ok_and(|mac| mac.verify_slice(&signature).is_ok())
    }

    /// Build a signed start URL for a client
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` cannot be parsed
    pub fn login_url(
        &self,
        base_url: &str,
        client_name: &str,
        realm: Realm,
        params: &LoginUrlParams,
    ) -> Result<String, SigningError> {
        let mut url = Url::parse(base_url.trim_end_matches('/'))?;
        url.set_path(&format!("/_start_oauth2_login/{client_name}/{realm}"));

        {
            let mut query = url.query_pairs_mut();
            if let Some(target) = &params.target_path {
                query.append_pair("_target_path", &encode_target(target));
            }
            if params.always_use_target_path {
                query.append_pair("_always_use_target_path", "1");
            }
            if let Some(failure_path) = &params.failure_path {
                query.append_pair("_failure_path", &encode_failure_path(failure_path));
            }
        }

        // An empty query leaves a trailing `?`; drop it so the signed form is stable.
        if url.query() == Some("") {
            url.set_query(None);
        }

        self.sign(url.as_str())
    }

    fn mac(&self, path: &str, pairs: &[(String, String)]) -> Result<HmacSha256, SigningError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| SigningError::InvalidKey)?;

        let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
        sorted.sort();

        let canonical = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(sorted.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();

        mac.update(path.as_bytes());
        mac.update(b"?");
        mac.update(canonical.as_bytes());
        Ok(mac)
    }
}

/// Encode a failure path the way the start endpoint expects it
#[must_use]
pub fn encode_failure_path(path: &str) -> String {
    encode_target(path)
}

fn parse(uri: &str) -> Result<(Url, bool), SigningError> {
    if uri.starts_with('/') && !uri.starts_with("//") {
        let base = Url::parse("http://localhost")?;
        return Ok((base.join(uri)?, true));
    }
    Ok((Url::parse(uri)?, false))
}

fn unsigned_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .filter(|(key, _)| key != HASH_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn render(url: &Url, relative: bool) -> String {
    if !relative {
        return url.to_string();
    }
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
