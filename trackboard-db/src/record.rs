use sqlx::FromRow;
use time::{PrimitiveDateTime, UtcDateTime};
use trackboard_common::model::{
    ModelValidationError,
    event::{ActivityEvent, FullActivityEvent},
    track::{FullTrack, Track},
    user::{User, UserSlug},
};

/// Timestamps are stored as `TIMESTAMP` columns holding UTC.
pub(crate) fn to_primitive(value: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(value.date(), value.time())
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub slug: String,
    pub firstname: String,
    pub lastname: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Clone, PartialEq, Debug, FromRow)]
pub(crate) struct TrackRecord {
    pub track_snowflake: i64,
    pub slug: Option<String>,
    pub user_snowflake: i64,
    pub visibility: String,
    pub provider: String,
    pub provider_id: i64,
    pub secret_token: Option<String>,
    pub provider_metadata: serde_json::Value,
    pub provider_created_at: PrimitiveDateTime,
    pub sort_date: PrimitiveDateTime,
    pub title: String,
    pub body: String,
    pub provider_description: String,
    pub genre: String,
    pub duration_ms: i64,
    pub artwork_url: Option<String>,
    pub download_url: Option<String>,
    pub isrc: String,
    pub bpm: Option<f64>,
    pub key_signature: String,
    pub url: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Clone, PartialEq, Debug, FromRow)]
pub(crate) struct FullTrackRecord {
    #[sqlx(flatten)]
    pub track: TrackRecord,
    pub author_slug: String,
    pub author_firstname: String,
    pub author_lastname: String,
    pub author_created_at: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct EventRecord {
    pub event_snowflake: i64,
    pub kind: String,
    pub actor_snowflake: Option<i64>,
    pub target_user_snowflake: Option<i64>,
    pub target_track_snowflake: Option<i64>,
    pub created_at: PrimitiveDateTime,
}

/// An event row with its actor and target user left-joined in.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullEventRecord {
    #[sqlx(flatten)]
    pub event: EventRecord,
    pub actor_slug: Option<String>,
    pub actor_firstname: Option<String>,
    pub actor_lastname: Option<String>,
    pub actor_created_at: Option<PrimitiveDateTime>,
    pub target_user_slug: Option<String>,
    pub target_user_firstname: Option<String>,
    pub target_user_lastname: Option<String>,
    pub target_user_created_at: Option<PrimitiveDateTime>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct WeekdayRecord {
    pub weekday: i64,
    pub count: i64,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            slug: UserSlug::new(value.slug)?,
            firstname: value.firstname,
            lastname: value.lastname,
            created_at: value.created_at.as_utc(),
        })
    }
}

impl TryFrom<TrackRecord> for Track {
    type Error = ModelValidationError;

    fn try_from(value: TrackRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.track_snowflake.cast_unsigned().into(),
            slug: value.slug,
            author_id: value.user_snowflake.cast_unsigned().into(),
            visibility: value.visibility.parse()?,
            provider: value.provider.parse()?,
            provider_id: u64::try_from(value.provider_id)
                .map_err(|_| ModelValidationError::OutOfRange("provider_id"))?,
            secret_token: value.secret_token,
            provider_metadata: value.provider_metadata,
            provider_created_at: value.provider_created_at.as_utc(),
            sort_date: value.sort_date.as_utc(),
            title: value.title,
            body: value.body,
            provider_description: value.provider_description,
            genre: value.genre,
            duration_ms: u64::try_from(value.duration_ms)
                .map_err(|_| ModelValidationError::OutOfRange("duration_ms"))?,
            artwork_url: value.artwork_url,
            download_url: value.download_url,
            isrc: value.isrc,
            bpm: value.bpm,
            key_signature: value.key_signature,
            url: value.url,
            created_at: value.created_at.as_utc(),
        })
    }
}

impl TryFrom<FullTrackRecord> for FullTrack {
    type Error = ModelValidationError;

    fn try_from(value: FullTrackRecord) -> Result<Self, Self::Error> {
        let author = User {
            id: value.track.user_snowflake.cast_unsigned().into(),
            slug: UserSlug::new(value.author_slug)?,
            firstname: value.author_firstname,
            lastname: value.author_lastname,
            created_at: value.author_created_at.as_utc(),
        };

        Ok(FullTrack::new(value.track.try_into()?, author))
    }
}

impl TryFrom<EventRecord> for ActivityEvent {
    type Error = ModelValidationError;

    fn try_from(value: EventRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.event_snowflake.cast_unsigned().into(),
            kind: value.kind.parse()?,
            actor_id: value.actor_snowflake.map(|id| id.cast_unsigned().into()),
            target_user_id: value.target_user_snowflake.map(|id| id.cast_unsigned().into()),
            target_post_id: value
                .target_track_snowflake
                .map(|id| id.cast_unsigned().into()),
            created_at: value.created_at.as_utc(),
        })
    }
}

/// A user from the nullable columns of a `LEFT JOIN`. `None` when the join found no row.
fn joined_user(
    user_snowflake: Option<i64>,
    slug: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    created_at: Option<PrimitiveDateTime>,
) -> Result<Option<User>, ModelValidationError> {
    let (Some(user_snowflake), Some(slug), Some(created_at)) = (user_snowflake, slug, created_at)
    else {
        return Ok(None);
    };

    User::try_from(UserRecord {
        user_snowflake,
        slug,
        firstname: firstname.unwrap_or_default(),
        lastname: lastname.unwrap_or_default(),
        created_at,
    })
    .map(Some)
}

/// Target posts are loaded separately, so they start out unresolved.
impl TryFrom<FullEventRecord> for FullActivityEvent {
    type Error = ModelValidationError;

    fn try_from(value: FullEventRecord) -> Result<Self, Self::Error> {
        let actor = joined_user(
            value.event.actor_snowflake,
            value.actor_slug,
            value.actor_firstname,
            value.actor_lastname,
            value.actor_created_at,
        )?;
        let target_user = joined_user(
            value.event.target_user_snowflake,
            value.target_user_slug,
            value.target_user_firstname,
            value.target_user_lastname,
            value.target_user_created_at,
        )?;

        Ok(Self {
            event: value.event.try_into()?,
            actor,
            target_user,
            target_post: None,
        })
    }
}
