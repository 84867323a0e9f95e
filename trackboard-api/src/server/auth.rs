use crate::{pages::Identity, server::ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::warn;
use trackboard_common::session::{PermissionCheck, SessionAuthenticator};
use trackboard_db::repository::Repository;

/// Cookie holding the signed session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Anonymous without a session cookie. A cookie that fails verification is an
/// error; a verified session whose user cannot be loaded still counts as
/// authenticated.
impl<S> FromRequestParts<S> for Identity
where
    Arc<SessionAuthenticator>: FromRef<S>,
    Arc<dyn Repository>: FromRef<S>,
    Arc<dyn PermissionCheck>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Identity::anonymous());
        };

        let claim = Arc::<SessionAuthenticator>::from_ref(state).authenticate(cookie.value())?;
        let user_id = claim.user_id;

        let user = match Arc::<dyn Repository>::from_ref(state).fetch_user(user_id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                warn!(%user_id, "Session user does not exist");
                None
            }
            Err(err) => {
                warn!(%user_id, error = %err, "Could not load session user");
                None
            }
        };

        Ok(Identity {
            user_id: Some(user_id),
            user,
            is_admin: Arc::<dyn PermissionCheck>::from_ref(state).is_admin(user_id),
        })
    }
}
