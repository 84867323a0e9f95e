use std::sync::Arc;
use tracing::debug;
use trackboard_common::model::{
    Id,
    event::{Activity, ActivityEvent, CreateEvent, FullActivityEvent, PostKind},
    track::{FullTrack, TrackMarker},
    user::UserMarker,
};
use trackboard_db::{DbError, repository::Repository};

/// Appends write-once activity events, one per tracked page render.
#[derive(Clone, Debug)]
pub struct EventRecorder {
    repository: Arc<dyn Repository>,
}

impl EventRecorder {
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn record_event(
        &self,
        kind: PostKind,
        actor_id: Option<Id<UserMarker>>,
        target_user_id: Option<Id<UserMarker>>,
        target_post_id: Option<Id<TrackMarker>>,
    ) -> Result<ActivityEvent, DbError> {
        let event = self
            .repository
            .create_event(&CreateEvent {
                kind,
                actor_id,
                target_user_id,
                target_post_id,
            })
            .await?;

        debug!(
            event_id = %event.id,
            kind = kind.as_str(),
            actor_id = ?event.actor_id,
            "Recorded activity"
        );
        Ok(event)
    }
}

/// Interleaves tracks and events, newest first, keeping at most `limit` entries.
#[must_use]
pub fn merge_activities(
    tracks: Vec<FullTrack>,
    events: Vec<FullActivityEvent>,
    limit: usize,
) -> Vec<Activity> {
    let mut activities: Vec<Activity> = tracks
        .into_iter()
        .map(|track| Activity::Track(Box::new(track)))
        .chain(
            events
                .into_iter()
                .map(|event| Activity::Event(Box::new(event))),
        )
        .collect();

    activities.sort_by_key(|activity| std::cmp::Reverse(activity.created_at()));
    activities.truncate(limit);
    activities
}

#[cfg(test)]
mod tests {
    use crate::activity::{EventRecorder, merge_activities};
    use std::sync::Arc;
    use time::{Duration, macros::utc_datetime};
    use trackboard_common::{
        clock::FixedClock,
        model::{
            Id,
            event::{Activity, ActivityEvent, FullActivityEvent, PostKind},
            track::{FullTrack, Provider, Track, Visibility},
            user::{User, UserSlug},
        },
        snowflake::GeneratorOrigin,
    };
    use trackboard_db::memory::MemoryStore;

    fn event(id: u64, minutes: i64) -> FullActivityEvent {
        FullActivityEvent {
            event: ActivityEvent {
                id: Id::from(id),
                kind: PostKind::Login,
                actor_id: Some(Id::from(1)),
                target_user_id: None,
                target_post_id: None,
                created_at: utc_datetime!(2025-06-01 12:00) + Duration::minutes(minutes),
            },
            actor: None,
            target_user: None,
            target_post: None,
        }
    }

    fn track(id: u64, minutes: i64) -> FullTrack {
        let author = User {
            id: Id::from(1),
            slug: UserSlug::new("artist".to_owned()).unwrap(),
            firstname: String::new(),
            lastname: String::new(),
            created_at: utc_datetime!(2025-01-01 00:00),
        };
        let created_at = utc_datetime!(2025-06-01 12:00) + Duration::minutes(minutes);
        let track = Track {
            id: Id::from(id),
            slug: None,
            author_id: author.id,
            visibility: Visibility::Public,
            provider: Provider::SoundCloud,
            provider_id: id,
            secret_token: None,
            provider_metadata: serde_json::Value::Null,
            provider_created_at: created_at,
            sort_date: created_at,
            title: format!("Track {id}"),
            body: String::new(),
            provider_description: String::new(),
            genre: String::new(),
            duration_ms: 1,
            artwork_url: None,
            download_url: None,
            isrc: String::new(),
            bpm: None,
            key_signature: String::new(),
            url: String::new(),
            created_at,
        };
        FullTrack::new(track, author)
    }

    #[test]
    fn activities_are_merged_newest_first() {
        let merged = merge_activities(
            vec![track(10, 5), track(11, 1)],
            vec![event(20, 3), event(21, 7)],
            3,
        );

        let order: Vec<_> = merged
            .iter()
            .map(|activity| match activity {
                Activity::Track(track) => track.track.id.get(),
                Activity::Event(event) => event.event.id.get(),
            })
            .collect();
        assert_eq!(order, [21, 10, 20]);
        assert_eq!(merged[1].kind(), PostKind::Track);
    }

    #[tokio::test]
    async fn records_anonymous_views() {
        let store = Arc::new(MemoryStore::new(
            GeneratorOrigin::default(),
            Arc::new(FixedClock(utc_datetime!(2025-06-01 12:00))),
        ));
        let recorder = EventRecorder::new(store.clone());

        let event = recorder
            .record_event(PostKind::ViewPost, None, None, Some(Id::from(5)))
            .await
            .unwrap();

        assert_eq!(event.actor_id, None);
        assert_eq!(event.target_post_id, Some(Id::from(5)));
        assert_eq!(store.events().await, [event]);
    }

    #[tokio::test]
    async fn content_kinds_are_not_events() {
        let store = Arc::new(MemoryStore::new(
            GeneratorOrigin::default(),
            Arc::new(FixedClock(utc_datetime!(2025-06-01 12:00))),
        ));
        let recorder = EventRecorder::new(store.clone());

        assert!(
            recorder
                .record_event(PostKind::Track, None, None, None)
                .await
                .is_err()
        );
        assert!(store.events().await.is_empty());
    }
}
