use super::{ApiError, AppState};
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use doc_hub_core::access::Viewer;
use doc_hub_core::auth::TokenVerifier;
use doc_hub_core::identity::{viewer_for, TeamDirectory};
use doc_hub_core::AccessError;
use tracing::warn;

/// The requesting party. Requests without credentials are anonymous.
#[derive(Clone, Debug)]
pub struct AuthContext(pub Viewer);

/// Resolve the viewer from request headers.
///
/// An `Authorization` header must carry a valid bearer token. `X-User-Id` is
/// read only when `header_identity` is set.
pub async fn extract_viewer(
    headers: &HeaderMap,
    verifier: &dyn TokenVerifier,
    teams: &dyn TeamDirectory,
    header_identity: bool,
) -> Result<Viewer, AccessError> {
    if let Some(auth) = headers.get("Authorization") {
        let token = auth
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AccessError::Unauthenticated)?;
        return match verifier.verify(token).await {
            Some(claims) => Ok(viewer_for(claims.sub, claims.teams, teams).await),
            None => {
                warn!("rejected bearer token");
                Err(AccessError::Unauthenticated)
            }
        };
    }

    if header_identity {
        if let Some(user_id) = headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return Ok(viewer_for(user_id.to_string(), Vec::new(), teams).await);
        }
    }

    Ok(Viewer::Anonymous)
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let viewer = extract_viewer(
            &parts.headers,
            state.verifier.as_ref(),
            state.teams.as_ref(),
            state.header_identity,
        )
        .await?;
        Ok(Self(viewer))
    }
}
