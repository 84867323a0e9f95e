use crate::pages::{Identity, PageError, PageModel, ViewAggregator};
use serde::{Deserialize, Serialize};
use tracing::debug;
use trackboard_common::model::{
    event::PostKind,
    track::{FullTrack, InvalidTrackError, TrackEdit, Visibility},
};

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct PostPage {
    pub post: FullTrack,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct PostEditPage {
    pub post: FullTrack,
    pub message: Option<String>,
}

/// The submission form, possibly re-rendered with the reason the last try failed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct NewPage {
    pub url_value: String,
    pub url_invalid_msg: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct PostEditForm {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Unchanged when absent.
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum EditOutcome {
    /// Saved; carries the canonical url to go back to.
    Saved(String),
    Rejected(PageModel<PostEditPage>),
}

impl ViewAggregator {
    /// Drafts are only shown to those who may manage them.
    pub async fn post_page(
        &self,
        identity: &Identity,
        slug_or_id: &str,
    ) -> Result<PageModel<PostPage>, PageError> {
        let mut context = self.begin(identity);
        let post = self
            .find_post(slug_or_id)
            .await?
            .filter(|post| post.track.is_public() || identity.can_manage(post.track.author_id))
            .ok_or_else(|| PageError::PostNotFound(slug_or_id.to_owned()))?;

        let event = self
            .recorder
            .record_event(PostKind::ViewPost, identity.user_id, None, Some(post.track.id))
            .await;
        context.errors.check("Cannot write activity", event);

        Ok(context.finish(PostPage { post }))
    }

    pub async fn post_edit_page(
        &self,
        identity: &Identity,
        slug_or_id: &str,
    ) -> Result<PageModel<PostEditPage>, PageError> {
        let context = self.begin(identity);
        let post = self.manageable_post(identity, slug_or_id).await?;

        Ok(context.finish(PostEditPage {
            post,
            message: None,
        }))
    }

    pub async fn apply_post_edit(
        &self,
        identity: &Identity,
        slug_or_id: &str,
        form: PostEditForm,
    ) -> Result<EditOutcome, PageError> {
        let context = self.begin(identity);
        let post = self.manageable_post(identity, slug_or_id).await?;

        let current = post.track.visibility;
        let visibility = current.transition_to(form.visibility.unwrap_or(current));
        let title = form.title.trim();

        let message = match visibility {
            Err(err) => Some(err.to_string()),
            Ok(_) if title.is_empty() => Some(InvalidTrackError::MissingTitle.to_string()),
            Ok(_) => None,
        };
        if let Some(message) = message {
            return Ok(EditOutcome::Rejected(context.finish(PostEditPage {
                post,
                message: Some(message),
            })));
        }

        let edit = TrackEdit {
            title: title.to_owned(),
            body: form.body,
            visibility: visibility.unwrap_or(current),
        };
        self.repository.update_track(post.track.id, &edit).await?;
        debug!(
            track_id = %post.track.id,
            visibility = edit.visibility.as_str(),
            "Updated track"
        );

        Ok(EditOutcome::Saved(post.canonical_url))
    }
}
