//! Redirect target resolution
//!
//! Targets and failure paths travel base64-encoded through the start URL and
//! the flow state.
//! A decoded target is only used when it stays on this site: a relative path,
//! or an absolute URL on the public host or an explicitly allowed host.
//! Anything else falls back to the realm's default landing page.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use url::Url;

use crate::config::LoginSettings;
use crate::oauth2::flow_state::FlowState;
use crate::oauth2::types::Realm;

/// Encode a target path for transport in URLs and flow state
#[must_use]
pub fn encode_target(path: &str) -> String {
    STANDARD.encode(path)
}

/// Decides where a browser goes after a login attempt
#[derive(Debug, Clone)]
pub struct TargetResolver {
    public_host: Option<String>,
    allowed_hosts: Vec<String>,
    backend_home: String,
    frontend_home: String,
}

impl TargetResolver {
    /// Build a resolver from the login settings
    #[must_use]
    pub fn new(settings: &LoginSettings) -> Self {
        let public_host = Url::parse(&settings.public_base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));

        Self {
            public_host,
            allowed_hosts: settings
                .allowed_redirect_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            backend_home: settings.backend_home.clone(),
            frontend_home: settings.frontend_home.clone(),
        }
    }

    /// Default landing page of a realm
    #[must_use]
    pub fn default_for(&self, realm: Realm) -> &str {
        match realm {
            Realm::Backend => &self.backend_home,
            Realm::Frontend => &self.frontend_home,
        }
    }

    /// Default landing page of a realm, encoded
    #[must_use]
    pub fn default_encoded(&self, realm: Realm) -> String {
        encode_target(self.default_for(realm))
    }

    /// Whether a target stays on this site
    #[must_use]
    pub fn is_safe(&self, target: &str) -> bool {
        if target.is_empty() || target.contains('\\') || target.chars().any(char::is_control) {
            return false;
        }

        if target.starts_with('/') {
            return !target.starts_with("//");
        }

        let Ok(url) = Url::parse(target) else {
            return false;
        };

        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        url.host_str().is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            self.public_host.as_deref() == Some(host.as_str())
                || self.allowed_hosts.iter().any(|allowed| *allowed == host)
        })
    }

    /// Decode a base64 target; `None` if it is malformed or leaves the site
    #[must_use]
    pub fn decode(&self, encoded: &str) -> Option<String> {
        let encoded = encoded.trim();
        let bytes = STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')))
            .ok()?;
        let target = String::from_utf8(bytes).ok()?;

        self.is_safe(&target).then_some(target)
    }

    /// Target after a failed login
    ///
    /// Order: the frontend failure path, then the stored target, then the
    /// realm default.
    #[must_use]
    pub fn failure_target(&self, state: &FlowState, realm: Realm) -> String {
        if realm == Realm::Frontend {
            if let Some(failure_path) = state
                .failure_path
                .as_deref()
                .and_then(|encoded| self.decode(encoded))
            {
                return failure_path;
            }
        }

        self.stored_target(state)
            .unwrap_or_else(|| self.default_for(realm).to_string())
    }

    /// Target after a successful login
    ///
    /// The stored target wins over the security layer's own target only when
    /// `always_use_target_path` is set.
    #[must_use]
    pub fn success_target(
        &self,
        state: &FlowState,
        realm: Realm,
        security_target: Option<&str>,
    ) -> String {
        let stored = self.stored_target(state);
        let security = security_target
            .filter(|target| self.is_safe(target))
            .map(str::to_string);

        let chosen = if state.always_use_target_path {
            stored.or(security)
        } else {
            security.or(stored)
        };

        chosen.unwrap_or_else(|| self.default_for(realm).to_string())
    }

    fn stored_target(&self, state: &FlowState) -> Option<String> {
        state
            .target_path
            .as_deref()
            .and_then(|encoded| self.decode(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver() -> TargetResolver {
        TargetResolver::new(&LoginSettings {
            public_base_url: "https://cms.example.org".to_string(),
            allowed_redirect_hosts: vec!["shop.example.org".to_string()],
            backend_home: "/contao".to_string(),
            frontend_home: "/".to_string(),
            ..LoginSettings::default()
        })
    }

    #[test]
    fn test_decode_relative_path() {
        let resolver = resolver();
        assert_eq!(
            resolver.decode(&encode_target("/contao/main")).as_deref(),
            Some("/contao/main")
        );
    }

    #[test]
    fn test_decode_rejects_foreign_hosts() {
        let resolver = resolver();
        assert_eq!(resolver.decode(&encode_target("https://evil.example.com/")), None);
        assert_eq!(resolver.decode(&encode_target("//evil.example.com/")), None);
        assert_eq!(resolver.decode(&encode_target("javascript:alert(1)")), None);
        assert_eq!(resolver.decode("%%%not-base64"), None);
    }

    #[test]
    fn test_decode_accepts_own_and_allowed_hosts() {
        let resolver = resolver();
        assert!(resolver.decode(&encode_target("https://cms.example.org/members")).is_some());
        assert!(resolver.decode(&encode_target("https://SHOP.example.org/cart")).is_some());
    }

    #[test]
    fn test_failure_target_prefers_frontend_failure_path() {
        let resolver = resolver();
        let state = FlowState {
            target_path: Some(encode_target("/members")),
            failure_path: Some(encode_target("/login-failed")),
            ..FlowState::default()
        };

        assert_eq!(resolver.failure_target(&state, Realm::Frontend), "/login-failed");
        // The failure path is a frontend feature only.
        assert_eq!(resolver.failure_target(&state, Realm::Backend), "/members");
    }

    #[test]
    fn test_failure_target_defaults() {
        let resolver = resolver();
        assert_eq!(resolver.failure_target(&FlowState::default(), Realm::Backend), "/contao");
        assert_eq!(resolver.failure_target(&FlowState::default(), Realm::Frontend), "/");
    }

    #[test]
    fn test_success_target_reconciliation() {
        let resolver = resolver();
        let mut state = FlowState {
            target_path: Some(encode_target("/contao/main")),
            always_use_target_path: true,
            ..FlowState::default()
        };

        assert_eq!(
            resolver.success_target(&state, Realm::Backend, Some("/contao/preview")),
            "/contao/main"
        );

        state.always_use_target_path = false;
        assert_eq!(
            resolver.success_target(&state, Realm::Backend, Some("/contao/preview")),
            "/contao/preview"
        );
        assert_eq!(resolver.success_target(&state, Realm::Backend, None), "/contao/main");
        assert_eq!(
            resolver.success_target(&FlowState::default(), Realm::Backend, None),
            "/contao"
        );
    }

    proptest! {
        #[test]
        fn prop_decoded_targets_never_leave_the_site(target in "\\PC{0,40}") {
            let resolver = resolver();
            if let Some(decoded) = resolver.decode(&encode_target(&target)) {
                prop_assert!(resolver.is_safe(&decoded));
                prop_assert!(!decoded.starts_with("//"));
            }
        }
    }
}
