use crate::{model::Id, util::unix_timestamp};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const USER_SLUG_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub slug: UserSlug,
    pub firstname: String,
    pub lastname: String,
    #[serde(with = "unix_timestamp")]
    pub created_at: UtcDateTime,
}

impl User {
    #[must_use]
    pub fn canonical_url(&self) -> String {
        format!("/u/{}", self.slug.get())
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.firstname.is_empty(), self.lastname.is_empty()) {
            (true, true) => self.slug.get().to_owned(),
            (false, true) => self.firstname.clone(),
            (true, false) => self.lastname.clone(),
            (false, false) => format!("{} {}", self.firstname, self.lastname),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateUser {
    pub slug: UserSlug,
    pub firstname: String,
    pub lastname: String,
}

/// The only user fields a user may change about themselves.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct UserNames {
    pub firstname: String,
    pub lastname: String,
}

/// Unique, URL-safe user handle used in profile paths.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct UserSlug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user slug is invalid: {0}")]
pub struct InvalidUserSlugError(String);

impl UserSlug {
    pub fn new(slug: String) -> Result<Self, InvalidUserSlugError> {
        let url_safe = slug
            .chars()
            .all(|char| char.is_ascii_alphanumeric() || matches!(char, '-' | '_' | '.'));

        if !slug.is_empty() && slug.len() <= USER_SLUG_MAX_LEN && url_safe {
            Ok(UserSlug(slug))
        } else {
            Err(InvalidUserSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UserSlug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserSlug::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserSlug"))
    }
}
