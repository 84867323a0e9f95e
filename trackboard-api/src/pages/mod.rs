//! Page read-models.
//!
//! Each page issues its own set of independent repository queries. A failing
//! query does not fail the page: its message is collected into the page's
//! `error` field and the rest of the model is still returned.

use crate::{activity::EventRecorder, config::SiteSettings};
use serde::Serialize;
use std::{fmt::Display, sync::Arc, time::Instant};
use thiserror::Error;
use trackboard_common::model::{
    Id,
    track::{FullTrack, TrackMarker},
    user::{User, UserMarker},
};
use trackboard_db::{DbError, repository::Repository};

mod home;
mod open;
mod post;
mod profile;

pub use home::HomePage;
pub use open::OpenPage;
pub use post::{EditOutcome, NewPage, PostEditForm, PostEditPage, PostPage};
pub use profile::{ProfilePage, SettingsPage};

/// Who is looking at a page.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Identity {
    /// Known whenever a valid session was presented.
    pub user_id: Option<Id<UserMarker>>,
    /// Absent for anonymous visitors and when loading the user failed.
    pub user: Option<User>,
    pub is_admin: bool,
}

impl Identity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Owners and admins may edit a track or see it while it is a draft.
    #[must_use]
    pub fn can_manage(&self, author_id: Id<UserMarker>) -> bool {
        self.is_admin || self.user_id == Some(author_id)
    }
}

/// Failures of individual queries, joined into one message.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PageErrors(Vec<String>);

impl PageErrors {
    pub fn push(&mut self, context: &str, error: impl Display) {
        self.0.push(format!("{context}: {error}"));
    }

    pub fn check<T, E: Display>(&mut self, context: &str, result: Result<T, E>) -> Option<T> {
        result.map_err(|err| self.push(context, err)).ok()
    }

    pub fn or_default<T: Default, E: Display>(&mut self, context: &str, result: Result<T, E>) -> T {
        self.check(context, result).unwrap_or_default()
    }

    #[must_use]
    pub fn message(&self) -> Option<String> {
        (!self.0.is_empty()).then(|| self.0.join("; "))
    }
}

/// What every page carries besides its own data.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct PageModel<T> {
    pub title: String,
    pub user: Option<User>,
    pub user_id: Option<Id<UserMarker>>,
    pub is_admin: bool,
    pub error: Option<String>,
    pub duration_micros: u64,
    pub page: T,
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("User {0} was not found.")]
    UserNotFound(String),
    #[error("Post {0} was not found.")]
    PostNotFound(String),
    #[error(transparent)]
    Database(#[from] DbError),
}

pub(crate) struct PageContext<'a> {
    started: Instant,
    title: String,
    identity: &'a Identity,
    pub errors: PageErrors,
}

impl PageContext<'_> {
    pub fn finish<T>(self, page: T) -> PageModel<T> {
        PageModel {
            title: self.title,
            user: self.identity.user.clone(),
            user_id: self.identity.user_id,
            is_admin: self.identity.is_admin,
            error: self.errors.message(),
            duration_micros: u64::try_from(self.started.elapsed().as_micros())
                .unwrap_or(u64::MAX),
            page,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ViewAggregator {
    repository: Arc<dyn Repository>,
    recorder: EventRecorder,
    settings: SiteSettings,
}

impl ViewAggregator {
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>, settings: SiteSettings) -> Self {
        Self {
            recorder: EventRecorder::new(Arc::clone(&repository)),
            repository,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub(crate) fn begin<'a>(&self, identity: &'a Identity) -> PageContext<'a> {
        PageContext {
            started: Instant::now(),
            title: self.settings.page_title(),
            identity,
            errors: PageErrors::default(),
        }
    }

    /// A page that only needs the common header.
    #[must_use]
    pub fn plain_page<T>(&self, identity: &Identity, page: T) -> PageModel<T> {
        self.begin(identity).finish(page)
    }

    /// Looks a post up by slug first, then by numeric id.
    pub async fn find_post(&self, slug_or_id: &str) -> Result<Option<FullTrack>, DbError> {
        if !slug_or_id.is_empty()
            && let Some(track) = self.repository.fetch_track_by_slug(slug_or_id).await?
        {
            return Ok(Some(track));
        }

        match slug_or_id.parse::<Id<TrackMarker>>() {
            Ok(track_id) => self.repository.fetch_track(track_id).await,
            Err(_) => Ok(None),
        }
    }

    /// A post the identity may edit. Everyone else gets the same answer as for a missing post.
    pub async fn manageable_post(
        &self,
        identity: &Identity,
        slug_or_id: &str,
    ) -> Result<FullTrack, PageError> {
        self.find_post(slug_or_id)
            .await?
            .filter(|post| identity.can_manage(post.track.author_id))
            .ok_or_else(|| PageError::PostNotFound(slug_or_id.to_owned()))
    }
}
