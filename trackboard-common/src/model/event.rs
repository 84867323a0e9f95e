use crate::{
    model::{
        Id,
        track::{FullTrack, TrackMarker},
        user::{User, UserMarker},
    },
    util::unix_timestamp,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct EventMarker;

/// Discriminates real content from the tracking events recorded around it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Track,
    ViewHome,
    ViewOpen,
    ViewProfile,
    ViewPost,
    Login,
    Register,
    LinkDiscordAccount,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown post kind: {0}")]
pub struct InvalidPostKindError(String);

impl PostKind {
    pub const VIEWS: [PostKind; 4] = [
        PostKind::ViewHome,
        PostKind::ViewOpen,
        PostKind::ViewProfile,
        PostKind::ViewPost,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostKind::Track => "track",
            PostKind::ViewHome => "view_home",
            PostKind::ViewOpen => "view_open",
            PostKind::ViewProfile => "view_profile",
            PostKind::ViewPost => "view_post",
            PostKind::Login => "login",
            PostKind::Register => "register",
            PostKind::LinkDiscordAccount => "link_discord_account",
        }
    }

    #[must_use]
    pub fn is_view(self) -> bool {
        Self::VIEWS.contains(&self)
    }

    #[must_use]
    pub fn is_event(self) -> bool {
        self != PostKind::Track
    }
}

impl FromStr for PostKind {
    type Err = InvalidPostKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "track" => PostKind::Track,
            "view_home" => PostKind::ViewHome,
            "view_open" => PostKind::ViewOpen,
            "view_profile" => PostKind::ViewProfile,
            "view_post" => PostKind::ViewPost,
            "login" => PostKind::Login,
            "register" => PostKind::Register,
            "link_discord_account" => PostKind::LinkDiscordAccount,
            other => return Err(InvalidPostKindError(other.to_owned())),
        })
    }
}

/// Write-once record of something a user (or an anonymous visitor) did.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Id<EventMarker>,
    pub kind: PostKind,
    /// `None` for anonymous visitors.
    pub actor_id: Option<Id<UserMarker>>,
    pub target_user_id: Option<Id<UserMarker>>,
    pub target_post_id: Option<Id<TrackMarker>>,
    #[serde(with = "unix_timestamp")]
    pub created_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct CreateEvent {
    pub kind: PostKind,
    pub actor_id: Option<Id<UserMarker>>,
    pub target_user_id: Option<Id<UserMarker>>,
    pub target_post_id: Option<Id<TrackMarker>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("{0:?} is content, not an event")]
pub struct NotAnEventError(pub PostKind);

impl CreateEvent {
    pub fn validate(&self) -> Result<(), NotAnEventError> {
        if self.kind.is_event() {
            Ok(())
        } else {
            Err(NotAnEventError(self.kind))
        }
    }
}

/// An event joined with the records it refers to. References that cannot be
/// resolved, and target tracks that are not public, stay `None`.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct FullActivityEvent {
    #[serde(flatten)]
    pub event: ActivityEvent,
    pub actor: Option<User>,
    pub target_user: Option<User>,
    pub target_post: Option<FullTrack>,
}

/// One entry of the public activity feed.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activity {
    Track(Box<FullTrack>),
    Event(Box<FullActivityEvent>),
}

impl Activity {
    #[must_use]
    pub fn kind(&self) -> PostKind {
        match self {
            Activity::Track(_) => PostKind::Track,
            Activity::Event(event) => event.event.kind,
        }
    }

    #[must_use]
    pub fn created_at(&self) -> UtcDateTime {
        match self {
            Activity::Track(track) => track.track.created_at,
            Activity::Event(event) => event.event.created_at,
        }
    }
}
