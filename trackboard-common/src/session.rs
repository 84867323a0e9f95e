//! Stateless signed sessions.
//!
//! A session token is an HS256 JWT carrying the user id, issue time and expiry.
//! Nothing is stored server side: every request re-verifies the signature and
//! then the expiry against an injected [`Clock`].

use crate::{
    clock::Clock,
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Debug, Formatter},
    sync::Arc,
};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionError {
    #[error("Session token is malformed: {0}")]
    Malformed(String),
    #[error("Session token signature does not match")]
    BadSignature,
    #[error("Session token expired at {0}")]
    Expired(UtcDateTime),
    #[error("Session token could not be signed: {0}")]
    Encode(String),
}

/// Identity proven by a valid session token.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SessionClaim {
    pub user_id: Id<UserMarker>,
    pub issued_at: UtcDateTime,
    pub expires_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Id<UserMarker>,
    iat: i64,
    exp: i64,
}

pub struct SessionAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("keys", &"[redacted]")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SessionAuthenticator {
    #[must_use]
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock instead.
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    pub fn issue(
        &self,
        user_id: Id<UserMarker>,
        ttl: PositiveDuration,
    ) -> Result<String, SessionError> {
        let issued_at = self.clock.now();
        let claims = TokenClaims {
            sub: user_id,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + ttl.get()).unix_timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| SessionError::Encode(err.to_string()))
    }

    /// Verifies the signature first, then the expiry.
    pub fn authenticate(&self, raw_token: &str) -> Result<SessionClaim, SessionError> {
        let token = decode::<TokenClaims>(raw_token, &self.decoding_key, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => SessionError::BadSignature,
                _ => SessionError::Malformed(err.to_string()),
            })?;
        let claims = token.claims;

        let issued_at = UtcDateTime::from_unix_timestamp(claims.iat)
            .map_err(|err| SessionError::Malformed(err.to_string()))?;
        let expires_at = UtcDateTime::from_unix_timestamp(claims.exp)
            .map_err(|err| SessionError::Malformed(err.to_string()))?;

        if expires_at <= self.clock.now() {
            return Err(SessionError::Expired(expires_at));
        }

        Ok(SessionClaim {
            user_id: claims.sub,
            issued_at,
            expires_at,
        })
    }
}

/// Decides who gets elevated privileges.
pub trait PermissionCheck: Debug + Send + Sync {
    fn is_admin(&self, user_id: Id<UserMarker>) -> bool;
}

/// Grants admin rights to a fixed set of configured users.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct AdminList {
    admins: HashSet<Id<UserMarker>>,
}

impl AdminList {
    pub fn new(admins: impl IntoIterator<Item = Id<UserMarker>>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

impl PermissionCheck for AdminList {
    fn is_admin(&self, user_id: Id<UserMarker>) -> bool {
        self.admins.contains(&user_id)
    }
}
