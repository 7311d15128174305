//! Session middleware
//!
//! Loads the session named by the cookie (or starts a new one) and puts
//! [`SessionId`] and [`SessionData`] into the request extensions. Handlers
//! that change the session return the new [`SessionData`] as a response
//! extension; only those responses are saved, so a visitor who never
//! changes anything gets neither a stored session nor a cookie.
//!
//! A session expires a fixed time after it was created; requests do not
//! extend it. Returning [`RenewSession`] next to the data moves the session
//! to a fresh id with a fresh lifetime and deletes the old id.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::Request,
    http::header::{COOKIE, SET_COOKIE},
    response::Response,
};
use tower::{Layer, Service};

use super::{SessionData, SessionId, SessionStore};
use crate::config::SessionSettings;

/// Cookie settings of the middleware
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Cookie name for the session id
    pub cookie_name: String,
    /// Cookie path
    pub cookie_path: String,
    /// `HttpOnly` attribute
    pub http_only: bool,
    /// `Secure` attribute
    pub secure: bool,
    /// `SameSite` policy
    pub same_site: SameSite,
    /// Session lifetime in seconds
    pub max_age_secs: u64,
    /// Seconds between sweeps of expired sessions
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default())
    }
}

impl SessionConfig {
    /// Build from the `[session]` settings
    #[must_use]
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            cookie_name: settings.cookie_name.clone(),
            cookie_path: "/".to_string(),
            http_only: true,
            secure: settings.secure_cookies,
            // The provider redirects back cross-site; Strict would drop the cookie.
            same_site: SameSite::Lax,
            max_age_secs: settings.max_age_secs,
            purge_interval_secs: settings.purge_interval_secs,
        }
    }

    /// Interval of the expired-session sweep, at least one second
    #[must_use]
    pub fn purge_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.purge_interval_secs.max(1))
    }

    fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.max_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::days(365))
    }
}

/// Response extension asking the middleware to move the session to a new id
///
/// Returned together with the session data after a successful login.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenewSession;

/// `SameSite` cookie policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    /// Strict
    Strict,
    /// Lax
    #[default]
    Lax,
    /// None (requires Secure)
    None,
}

impl SameSite {
    /// Cookie attribute value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Layer installing [`SessionMiddleware`]
#[derive(Clone)]
pub struct SessionLayer {
    config: Arc<SessionConfig>,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for SessionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLayer")
            .field("config", &self.config)
            .field("store", &"SessionStore")
            .finish()
    }
}

impl SessionLayer {
    /// Create a layer over a session store
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }
}

/// Cookie-based session middleware
#[derive(Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
    config: Arc<SessionConfig>,
    store: Arc<dyn SessionStore>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for SessionMiddleware<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMiddleware")
            .field("inner", &self.inner)
            .field("config", &self.config)
            .field("store", &"SessionStore")
            .finish()
    }
}

impl<S> Service<Request> for SessionMiddleware<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let config = self.config.clone();
        let store = self.store.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let existing = match extract_session_id(&req, &config.cookie_name) {
                Some(id) => match store.load(&id).await {
                    Ok(Some(data)) => Some((id, data)),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to load session, starting a new one");
                        None
                    }
                },
                None => None,
            };

            let (session_id, session_data, is_new) = match existing {
                Some((id, data)) => (id, data, false),
                None => (SessionId::generate(), SessionData::new(config.ttl()), true),
            };

            req.extensions_mut().insert(session_id.clone());
            req.extensions_mut().insert(session_data);

            let mut response = inner.call(req).await?;

            let renew = response.extensions_mut().remove::<RenewSession>().is_some();
            let Some(mut data) = response.extensions_mut().remove::<SessionData>() else {
                return Ok(response);
            };

            let session_id = if renew {
                if !is_new {
                    if let Err(e) = store.remove(&session_id).await {
                        tracing::error!(error = %e, "Failed to remove renewed session");
                    }
                }
                data.renew(config.ttl());
                SessionId::generate()
            } else {
                session_id
            };

            if let Err(e) = store.save(&session_id, data).await {
                tracing::error!(error = %e, "Failed to save session");
            }

            if is_new || renew {
                set_session_cookie(&mut response, &session_id, &config);
            }

            Ok(response)
        })
    }
}

fn extract_session_id(req: &Request, cookie_name: &str) -> Option<SessionId> {
    let cookie_str = req.headers().get(COOKIE)?.to_str().ok()?;

    cookie_str.split(';').find_map(|cookie| {
        let (name, value) = cookie.trim().split_once('=')?;
        (name.trim() == cookie_name)
            .then(|| value.trim().parse().ok())
            .flatten()
    })
}

fn set_session_cookie(response: &mut Response<Body>, session_id: &SessionId, config: &SessionConfig) {
    let mut cookie_value = format!(
        "{}={}; Path={}; Max-Age={}; SameSite={}",
        config.cookie_name,
        session_id.as_str(),
        config.cookie_path,
        config.max_age_secs,
        config.same_site.as_str()
    );

    if config.http_only {
        cookie_value.push_str("; HttpOnly");
    }

    if config.secure {
        cookie_value.push_str("; Secure");
    }

    if let Ok(header_value) = cookie_value.parse() {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
}
