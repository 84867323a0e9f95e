use crate::{
    model::{
        Id,
        user::{User, UserMarker},
    },
    util::unix_timestamp,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TrackMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Draft,
    Public,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown visibility: {0}")]
pub struct InvalidVisibilityError(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("A public track cannot go back to draft.")]
pub struct VisibilityTransitionError;

impl Visibility {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Draft => "draft",
            Visibility::Public => "public",
        }
    }

    /// Draft may become public; public is final.
    pub fn transition_to(self, target: Visibility) -> Result<Visibility, VisibilityTransitionError> {
        match (self, target) {
            (Visibility::Public, Visibility::Draft) => Err(VisibilityTransitionError),
            (_, target) => Ok(target),
        }
    }
}

impl FromStr for Visibility {
    type Err = InvalidVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Visibility::Draft),
            "public" => Ok(Visibility::Public),
            other => Err(InvalidVisibilityError(other.to_owned())),
        }
    }
}

/// External service a track was imported from.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    SoundCloud,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown provider: {0}")]
pub struct InvalidProviderError(String);

impl Provider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::SoundCloud => "soundcloud",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::SoundCloud => "SoundCloud",
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = InvalidProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soundcloud" => Ok(Provider::SoundCloud),
            other => Err(InvalidProviderError(other.to_owned())),
        }
    }
}

/// Public path of a track: `/p/{slug}` when a slug exists, `/p/{id}` otherwise.
#[must_use]
pub fn canonical_track_url(slug: Option<&str>, id: Id<TrackMarker>) -> String {
    match slug {
        Some(slug) if !slug.is_empty() => format!("/p/{slug}"),
        _ => format!("/p/{id}"),
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: Id<TrackMarker>,
    pub slug: Option<String>,
    pub author_id: Id<UserMarker>,
    pub visibility: Visibility,
    pub provider: Provider,
    pub provider_id: u64,
    #[serde(skip_serializing)]
    pub secret_token: Option<String>,
    #[serde(skip_serializing)]
    pub provider_metadata: serde_json::Value,
    #[serde(with = "unix_timestamp")]
    pub provider_created_at: UtcDateTime,
    #[serde(with = "unix_timestamp")]
    pub sort_date: UtcDateTime,
    pub title: String,
    pub body: String,
    pub provider_description: String,
    pub genre: String,
    pub duration_ms: u64,
    pub artwork_url: Option<String>,
    pub download_url: Option<String>,
    pub isrc: String,
    pub bpm: Option<f64>,
    pub key_signature: String,
    pub url: String,
    #[serde(with = "unix_timestamp")]
    pub created_at: UtcDateTime,
}

impl Track {
    #[must_use]
    pub fn canonical_url(&self) -> String {
        canonical_track_url(self.slug.as_deref(), self.id)
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// A track joined with its author, as shown in listings and on the post page.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FullTrack {
    #[serde(flatten)]
    pub track: Track,
    pub author: User,
    pub canonical_url: String,
}

impl FullTrack {
    #[must_use]
    pub fn new(track: Track, author: User) -> Self {
        let canonical_url = track.canonical_url();
        Self {
            track,
            author,
            canonical_url,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidTrackError {
    #[error("A track needs a provider id")]
    MissingProviderId,
    #[error("A track needs a title")]
    MissingTitle,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CreateTrack {
    pub author_id: Id<UserMarker>,
    pub visibility: Visibility,
    pub provider: Provider,
    pub provider_id: u64,
    pub secret_token: Option<String>,
    pub provider_metadata: serde_json::Value,
    #[serde(with = "unix_timestamp")]
    pub provider_created_at: UtcDateTime,
    #[serde(with = "unix_timestamp")]
    pub sort_date: UtcDateTime,
    pub title: String,
    pub body: String,
    pub provider_description: String,
    pub genre: String,
    pub duration_ms: u64,
    pub artwork_url: Option<String>,
    pub download_url: Option<String>,
    pub isrc: String,
    pub bpm: Option<f64>,
    pub key_signature: String,
    pub url: String,
}

impl CreateTrack {
    pub fn validate(&self) -> Result<(), InvalidTrackError> {
        if self.provider_id == 0 {
            return Err(InvalidTrackError::MissingProviderId);
        }
        if self.title.trim().is_empty() {
            return Err(InvalidTrackError::MissingTitle);
        }

        Ok(())
    }
}

/// Fields an owner or admin may change after import.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct TrackEdit {
    pub title: String,
    pub body: String,
    pub visibility: Visibility,
}
