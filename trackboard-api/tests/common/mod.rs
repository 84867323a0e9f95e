#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use reqwest::Url;
use std::{sync::Arc, time::Instant};
use time::{Duration, UtcDateTime, macros::utc_datetime};
use tower::ServiceExt;
use trackboard_api::{
    config::SiteSettings,
    import::{
        ProviderError, ProviderRegistry, ResolvedTrack, TrackImporter, TrackMetadata,
        TrackProvider, soundcloud,
    },
    pages::ViewAggregator,
    server::{self, SESSION_COOKIE, ServerState, StartedAt},
};
use trackboard_common::{
    clock::FixedClock,
    model::{
        Id,
        track::Provider,
        user::{CreateUser, User, UserMarker, UserSlug},
    },
    session::{AdminList, SessionAuthenticator},
    snowflake::GeneratorOrigin,
    util::PositiveDuration,
};
use trackboard_db::{memory::MemoryStore, repository::Repository};

pub const NOW: UtcDateTime = utc_datetime!(2025-06-01 12:00);
const SECRET: &[u8] = b"integration-test-secret";

/// Resolves every link to track 42 and answers with fixed metadata.
#[derive(Debug)]
pub struct StubProvider;

#[async_trait::async_trait]
impl TrackProvider for StubProvider {
    fn provider(&self) -> Provider {
        Provider::SoundCloud
    }

    fn hosts(&self) -> &[&'static str] {
        &soundcloud::SOUNDCLOUD_HOSTS
    }

    async fn resolve(&self, _url: &Url) -> Result<ResolvedTrack, ProviderError> {
        Ok(ResolvedTrack {
            path: "/tracks/42.json".to_owned(),
            secret_token: None,
        })
    }

    async fn fetch(
        &self,
        track_id: u64,
        _secret_token: Option<&str>,
    ) -> Result<TrackMetadata, ProviderError> {
        Ok(TrackMetadata {
            title: "Foo".to_owned(),
            duration_ms: 180_000,
            download_url: Some("https://api.soundcloud.com/tracks/42/download".to_owned()),
            downloadable: true,
            permalink_url: "https://soundcloud.com/artist/foo".to_owned(),
            created_at: "2025/05/29 10:00:00 +0000".to_owned(),
            raw: serde_json::json!({ "id": track_id, "title": "Foo" }),
            ..TrackMetadata::default()
        })
    }

    fn parse_created_at(&self, raw: &str) -> Option<UtcDateTime> {
        soundcloud::parse_created_at(raw)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    authenticator: Arc<SessionAuthenticator>,
    pub owner: User,
    pub stranger: User,
    pub admin: User,
}

async fn create_user(store: &MemoryStore, slug: &str) -> User {
    store
        .create_user(&CreateUser {
            slug: UserSlug::new(slug.to_owned()).unwrap(),
            firstname: String::new(),
            lastname: String::new(),
        })
        .await
        .unwrap()
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_repository(|store| store).await
    }

    /// Serves the app from whatever `wrap` builds around the shared store.
    pub async fn with_repository(
        wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn Repository>,
    ) -> Self {
        let clock = Arc::new(FixedClock(NOW));
        let store = Arc::new(MemoryStore::new(GeneratorOrigin::default(), clock.clone()));
        let owner = create_user(&store, "owner").await;
        let stranger = create_user(&store, "stranger").await;
        let admin = create_user(&store, "admin").await;

        let repository = wrap(store.clone());
        let authenticator = Arc::new(SessionAuthenticator::new(SECRET, clock.clone()));
        let importer = TrackImporter::new(
            ProviderRegistry::new().with(Arc::new(StubProvider)),
            repository.clone(),
            clock,
        );
        let state = ServerState {
            repository: repository.clone(),
            authenticator: authenticator.clone(),
            permissions: Arc::new(AdminList::new([admin.id])),
            importer: Arc::new(importer),
            pages: ViewAggregator::new(repository, SiteSettings::default()),
            started_at: StartedAt(Instant::now()),
        };

        Self {
            router: server::app(state),
            store,
            authenticator,
            owner,
            stranger,
            admin,
        }
    }

    pub fn cookie(&self, user_id: Id<UserMarker>) -> String {
        let token = self
            .authenticator
            .issue(user_id, PositiveDuration::new(Duration::days(1)).unwrap())
            .unwrap();
        format!("{SESSION_COOKIE}={token}")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, form: &str) -> Response<Body> {
        let mut request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::from(form.to_owned())).unwrap())
            .await
            .unwrap()
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

pub const TRACK_FORM: &str = "url=https%3A%2F%2Fsoundcloud.com%2Fartist%2Ffoo";
