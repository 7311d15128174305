//! Session extractor
//!
//! The session is placed in request extensions by
//! [`SessionMiddleware`](super::SessionMiddleware).

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use super::{SessionData, SessionId};

/// Current session
///
/// Changes are only persisted if the handler returns the modified
/// [`SessionData`] as a response extension:
///
/// ```rust,ignore
/// async fn handler(Session(_, mut data): Session) -> impl IntoResponse {
///     data.flash_messages.clear();
///     (Extension(data), "ok")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Session(pub SessionId, pub SessionData);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session_id = parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session not initialized"))?;

        let session_data = parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session data not found"))?;

        Ok(Self(session_id, session_data))
    }
}
