use crate::{
    DbError, Result,
    record::{
        EventRecord, FullEventRecord, FullTrackRecord, TrackRecord, UserRecord, WeekdayRecord,
        to_primitive,
    },
    repository::{
        ActivityFilter, Repository, TrackFilter, TrackOrder, TrackQuery, WeekdayCount,
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, query, query_as};
use std::{collections::HashMap, sync::Arc};
use time::{PrimitiveDateTime, UtcDateTime};
use tokio::sync::Mutex;
use trackboard_common::{
    clock::Clock,
    model::{
        Id, ModelValidationError, TrackboardSnowflake, TrackboardSnowflakeGenerator,
        event::{ActivityEvent, CreateEvent, FullActivityEvent},
        track::{CreateTrack, FullTrack, Track, TrackEdit, TrackMarker},
        user::{CreateUser, User, UserMarker, UserNames},
    },
    snowflake::GeneratorOrigin,
};

macro_rules! user_columns {
    () => {
        "users.user_snowflake, users.slug, users.firstname, users.lastname, users.created_at"
    };
}

macro_rules! track_columns {
    () => {
        "
        tracks.track_snowflake,
        tracks.slug,
        tracks.user_snowflake,
        tracks.visibility,
        tracks.provider,
        tracks.provider_id,
        tracks.secret_token,
        tracks.provider_metadata,
        tracks.provider_created_at,
        tracks.sort_date,
        tracks.title,
        tracks.body,
        tracks.provider_description,
        tracks.genre,
        tracks.duration_ms,
        tracks.artwork_url,
        tracks.download_url,
        tracks.isrc,
        tracks.bpm,
        tracks.key_signature,
        tracks.url,
        tracks.created_at
        "
    };
}

macro_rules! full_track_select {
    () => {
        concat!(
            "SELECT ",
            track_columns!(),
            ",
            users.slug AS author_slug,
            users.firstname AS author_firstname,
            users.lastname AS author_lastname,
            users.created_at AS author_created_at
            FROM
                posts.tracks AS tracks
                JOIN users.users AS users ON users.user_snowflake = tracks.user_snowflake
            "
        )
    };
}

macro_rules! event_columns {
    () => {
        "
        events.event_snowflake,
        events.kind,
        events.actor_snowflake,
        events.target_user_snowflake,
        events.target_track_snowflake,
        events.created_at
        "
    };
}

fn push_track_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TrackFilter) {
    builder.push(" WHERE TRUE");
    if let Some(author_id) = filter.author_id {
        builder
            .push(" AND tracks.user_snowflake = ")
            .push_bind(author_id.get().cast_signed());
    }
    if let Some(visibility) = filter.visibility {
        builder
            .push(" AND tracks.visibility = ")
            .push_bind(visibility.as_str());
    }
}

fn to_column_i64(value: u64, column: &'static str) -> Result<i64, ModelValidationError> {
    i64::try_from(value).map_err(|_| ModelValidationError::OutOfRange(column))
}

/// PostgreSQL-backed [`Repository`].
#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<TrackboardSnowflakeGenerator>,
    clock: Arc<dyn Clock>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, origin: GeneratorOrigin, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            snowflake_generator: Mutex::new(TrackboardSnowflakeGenerator::new(origin)),
            clock,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn next_snowflake(&self, now: UtcDateTime) -> Result<TrackboardSnowflake> {
        Ok(self.snowflake_generator.lock().await.generate_at(now)?)
    }
}

#[async_trait]
impl Repository for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users.users AS users WHERE users.user_snowflake = $1"
        ))
        .bind(user_id.get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_slug(&self, slug: &str) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users.users AS users WHERE users.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let now = self.clock.now();
        let user_snowflake = self.next_snowflake(now).await?;

        let record = query_as::<_, UserRecord>(concat!(
            "
            INSERT INTO users.users AS users (user_snowflake, slug, firstname, lastname, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING ",
            user_columns!()
        ))
        .bind(user_snowflake.get().cast_signed())
        .bind(user.slug.get())
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(to_primitive(now))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(format!("user slug {}", user.slug.get()))
            }
            other => other.into(),
        })?;

        Ok(record.try_into()?)
    }

    async fn update_user_names(&self, user_id: Id<UserMarker>, names: &UserNames) -> Result<()> {
        let result = query(
            "
            UPDATE users.users
            SET firstname = $2, lastname = $3
            WHERE user_snowflake = $1
            ",
        )
        .bind(user_id.get().cast_signed())
        .bind(&names.firstname)
        .bind(&names.lastname)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("user", user_id.get()));
        }
        Ok(())
    }

    async fn fetch_recent_users(&self, limit: u32) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(concat!(
            "SELECT ",
            user_columns!(),
            "
            FROM users.users AS users
            ORDER BY users.created_at DESC, users.user_snowflake DESC
            LIMIT $1
            "
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    async fn count_users(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users.users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn create_track(&self, track: &CreateTrack) -> Result<Track> {
        track.validate().map_err(ModelValidationError::from)?;

        let now = self.clock.now();
        let track_snowflake = self.next_snowflake(now).await?;

        let record = query_as::<_, TrackRecord>(concat!(
            "
            INSERT INTO posts.tracks AS tracks (
                track_snowflake, slug, user_snowflake, visibility, provider, provider_id,
                secret_token, provider_metadata, provider_created_at, sort_date, title, body,
                provider_description, genre, duration_ms, artwork_url, download_url, isrc, bpm,
                key_signature, url, created_at
            )
            VALUES (
                $1, NULL, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            RETURNING ",
            track_columns!()
        ))
        .bind(track_snowflake.get().cast_signed())
        .bind(track.author_id.get().cast_signed())
        .bind(track.visibility.as_str())
        .bind(track.provider.as_str())
        .bind(to_column_i64(track.provider_id, "provider_id")?)
        .bind(&track.secret_token)
        .bind(&track.provider_metadata)
        .bind(to_primitive(track.provider_created_at))
        .bind(to_primitive(track.sort_date))
        .bind(&track.title)
        .bind(&track.body)
        .bind(&track.provider_description)
        .bind(&track.genre)
        .bind(to_column_i64(track.duration_ms, "duration_ms")?)
        .bind(&track.artwork_url)
        .bind(&track.download_url)
        .bind(&track.isrc)
        .bind(track.bpm)
        .bind(&track.key_signature)
        .bind(&track.url)
        .bind(to_primitive(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_track(&self, track_id: Id<TrackMarker>) -> Result<Option<FullTrack>> {
        let record = query_as::<_, FullTrackRecord>(concat!(
            full_track_select!(),
            " WHERE tracks.track_snowflake = $1"
        ))
        .bind(track_id.get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let track = record.map(FullTrack::try_from).transpose()?;
        Ok(track)
    }

    async fn fetch_track_by_slug(&self, slug: &str) -> Result<Option<FullTrack>> {
        let record = query_as::<_, FullTrackRecord>(concat!(
            full_track_select!(),
            " WHERE tracks.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        let track = record.map(FullTrack::try_from).transpose()?;
        Ok(track)
    }

    async fn update_track(&self, track_id: Id<TrackMarker>, edit: &TrackEdit) -> Result<()> {
        let result = query(
            "
            UPDATE posts.tracks
            SET title = $2, body = $3, visibility = $4
            WHERE track_snowflake = $1
            ",
        )
        .bind(track_id.get().cast_signed())
        .bind(&edit.title)
        .bind(&edit.body)
        .bind(edit.visibility.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("track", track_id.get()));
        }
        Ok(())
    }

    async fn fetch_tracks(&self, track_query: &TrackQuery) -> Result<Vec<FullTrack>> {
        let mut builder = QueryBuilder::<Postgres>::new(full_track_select!());
        push_track_filter(&mut builder, &track_query.filter);
        builder.push(match track_query.order {
            TrackOrder::SortDateDesc => " ORDER BY tracks.sort_date DESC, tracks.track_snowflake DESC",
            TrackOrder::CreatedAtDesc => {
                " ORDER BY tracks.created_at DESC, tracks.track_snowflake DESC"
            }
        });
        builder.push(" LIMIT ").push_bind(i64::from(track_query.limit));

        let records = builder
            .build_query_as::<FullTrackRecord>()
            .fetch_all(&self.pool)
            .await?;

        let tracks = records
            .into_iter()
            .map(FullTrack::try_from)
            .collect::<Result<_, _>>()?;
        Ok(tracks)
    }

    async fn count_tracks(&self, filter: &TrackFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts.tracks AS tracks");
        push_track_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn sum_track_duration(&self, filter: &TrackFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COALESCE(SUM(tracks.duration_ms), 0)::BIGINT FROM posts.tracks AS tracks",
        );
        push_track_filter(&mut builder, filter);

        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn count_tracks_by_weekday(&self, filter: &TrackFilter) -> Result<Vec<WeekdayCount>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "
            SELECT
                EXTRACT(DOW FROM tracks.sort_date)::BIGINT AS weekday,
                COUNT(*) AS count
            FROM
                posts.tracks AS tracks
            ",
        );
        push_track_filter(&mut builder, filter);
        builder.push(" GROUP BY weekday");

        let records = builder
            .build_query_as::<WeekdayRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records
            .into_iter()
            .map(|record| WeekdayCount {
                weekday: record.weekday,
                count: record.count,
            })
            .collect())
    }

    async fn fetch_track_sort_dates(&self, filter: &TrackFilter) -> Result<Vec<UtcDateTime>> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT tracks.sort_date FROM posts.tracks AS tracks");
        push_track_filter(&mut builder, filter);

        let dates = builder
            .build_query_scalar::<PrimitiveDateTime>()
            .fetch_all(&self.pool)
            .await?;

        Ok(dates.into_iter().map(PrimitiveDateTime::as_utc).collect())
    }

    async fn create_event(&self, event: &CreateEvent) -> Result<ActivityEvent> {
        event.validate().map_err(ModelValidationError::from)?;

        let now = self.clock.now();
        let event_snowflake = self.next_snowflake(now).await?;

        let record = query_as::<_, EventRecord>(concat!(
            "
            INSERT INTO posts.events AS events (
                event_snowflake, kind, actor_snowflake, target_user_snowflake,
                target_track_snowflake, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING ",
            event_columns!()
        ))
        .bind(event_snowflake.get().cast_signed())
        .bind(event.kind.as_str())
        .bind(event.actor_id.map(|id| id.get().cast_signed()))
        .bind(event.target_user_id.map(|id| id.get().cast_signed()))
        .bind(event.target_post_id.map(|id| id.get().cast_signed()))
        .bind(to_primitive(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_events(
        &self,
        filter: &ActivityFilter,
        limit: u32,
    ) -> Result<Vec<FullActivityEvent>> {
        let mut builder = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            event_columns!(),
            ",
            actors.slug AS actor_slug,
            actors.firstname AS actor_firstname,
            actors.lastname AS actor_lastname,
            actors.created_at AS actor_created_at,
            target_users.slug AS target_user_slug,
            target_users.firstname AS target_user_firstname,
            target_users.lastname AS target_user_lastname,
            target_users.created_at AS target_user_created_at
            FROM
                posts.events AS events
                LEFT JOIN users.users AS actors
                    ON actors.user_snowflake = events.actor_snowflake
                LEFT JOIN users.users AS target_users
                    ON target_users.user_snowflake = events.target_user_snowflake
            WHERE TRUE"
        ));
        if !filter.excluded_kinds.is_empty() {
            let kinds: Vec<String> = filter
                .excluded_kinds
                .iter()
                .map(|kind| kind.as_str().to_owned())
                .collect();
            builder
                .push(" AND NOT (events.kind = ANY(")
                .push_bind(kinds)
                .push("))");
        }
        if filter.exclude_anonymous {
            builder.push(" AND events.actor_snowflake IS NOT NULL");
        }
        if let Some(actor) = filter.excluded_actor {
            builder
                .push(" AND events.actor_snowflake IS DISTINCT FROM ")
                .push_bind(actor.get().cast_signed());
        }
        builder
            .push(" ORDER BY events.created_at DESC, events.event_snowflake DESC LIMIT ")
            .push_bind(i64::from(limit));

        let records = builder
            .build_query_as::<FullEventRecord>()
            .fetch_all(&self.pool)
            .await?;

        let mut events = records
            .into_iter()
            .map(FullActivityEvent::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let target_snowflakes: Vec<i64> = events
            .iter()
            .filter_map(|event| event.event.target_post_id)
            .map(|id| id.get().cast_signed())
            .collect();
        if target_snowflakes.is_empty() {
            return Ok(events);
        }

        // Only public tracks show up in the feed.
        let targets = query_as::<_, FullTrackRecord>(concat!(
            full_track_select!(),
            " WHERE tracks.track_snowflake = ANY($1) AND tracks.visibility = 'public'"
        ))
        .bind(target_snowflakes)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|record| FullTrack::try_from(record).map(|track| (track.track.id, track)))
        .collect::<Result<HashMap<_, _>, _>>()?;

        for event in &mut events {
            event.target_post = event
                .event
                .target_post_id
                .and_then(|id| targets.get(&id).cloned());
        }
        Ok(events)
    }
}
