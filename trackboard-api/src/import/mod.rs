//! Turns a submitted track link into a stored [`Track`].
//!
//! The pipeline parses the link, picks the provider registered for its host,
//! asks the provider to resolve the link into its canonical API path, fetches
//! the full metadata and normalizes it. Every failure before the final write
//! is reported back to the submitter; nothing is stored in that case.

use reqwest::Url;
use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    num::{NonZeroU64, ParseIntError},
    sync::Arc,
};
use thiserror::Error;
use time::UtcDateTime;
use tracing::debug;
use trackboard_common::{
    clock::Clock,
    model::{
        Id,
        track::{CreateTrack, Provider, Track, Visibility},
        user::UserMarker,
    },
    util::escape_markup,
};
use trackboard_db::{DbError, repository::Repository};

pub mod soundcloud;

/// Error text reported by a provider, shown to the submitter as is.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("{0}")]
pub struct ProviderError(String);

impl ProviderError {
    pub fn new(message: impl Display) -> Self {
        Self(message.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        // The request url carries the API credentials.
        Self(value.without_url().to_string())
    }
}

/// Canonical API location of a submitted link.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ResolvedTrack {
    pub path: String,
    pub secret_token: Option<String>,
}

/// Provider metadata, reduced to the fields a track keeps.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub description: String,
    pub genre: String,
    pub duration_ms: u64,
    pub artwork_url: Option<String>,
    pub download_url: Option<String>,
    pub downloadable: bool,
    pub isrc: String,
    pub bpm: Option<f64>,
    pub key_signature: String,
    pub permalink_url: String,
    /// Creation time in the provider's own format.
    pub created_at: String,
    /// Everything the provider returned.
    pub raw: serde_json::Value,
}

#[async_trait::async_trait]
pub trait TrackProvider: Debug + Send + Sync {
    fn provider(&self) -> Provider;

    /// Link hosts this provider handles.
    fn hosts(&self) -> &[&'static str];

    async fn resolve(&self, url: &Url) -> Result<ResolvedTrack, ProviderError>;

    async fn fetch(
        &self,
        track_id: u64,
        secret_token: Option<&str>,
    ) -> Result<TrackMetadata, ProviderError>;

    fn parse_created_at(&self, raw: &str) -> Option<UtcDateTime>;
}

#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    by_host: HashMap<&'static str, Arc<dyn TrackProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn TrackProvider>) {
        for &host in provider.hosts() {
            self.by_host.insert(host, Arc::clone(&provider));
        }
    }

    #[must_use]
    pub fn with(mut self, provider: Arc<dyn TrackProvider>) -> Self {
        self.register(provider);
        self
    }

    #[must_use]
    pub fn get(&self, host: &str) -> Option<&Arc<dyn TrackProvider>> {
        self.by_host.get(host.to_ascii_lowercase().as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum MalformedProviderId {
    #[error("Invalid {0} track link.")]
    MissingTrackSegment(Provider),
    #[error("Parse track ID: {0}.")]
    NotANumber(#[from] ParseIntError),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Please specify a track link.")]
    MissingUrl,
    #[error("Parse URL: {0}")]
    InvalidUrl(String),
    /// Carries the host already escaped for display.
    #[error("Unsupported provider: {0}.")]
    UnsupportedProvider(String),
    #[error("This URL does not exist on {provider}.")]
    ProviderResolutionFailed {
        provider: Provider,
        source: ProviderError,
    },
    #[error(transparent)]
    MalformedProviderId(#[from] MalformedProviderId),
    #[error("Fetch track info from {provider}: {source}.")]
    ProviderFetchFailed {
        provider: Provider,
        source: ProviderError,
    },
    #[error("{0} returned a track without a title.")]
    MissingTitle(Provider),
    #[error("Cannot save track: {0}")]
    Database(#[from] DbError),
}

impl ImportError {
    /// Whether the submitter should see this in the form rather than an error page.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ImportError::Database(_))
    }
}

/// Finds the `tracks/{id}` pair in a resolved API path, e.g. `/tracks/123.json`.
pub fn parse_track_id(provider: Provider, path: &str) -> Result<u64, MalformedProviderId> {
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    let raw_id = segments
        .windows(2)
        .find(|pair| pair[0] == "tracks")
        .map(|pair| pair[1].strip_suffix(".json").unwrap_or(pair[1]))
        .ok_or(MalformedProviderId::MissingTrackSegment(provider))?;

    Ok(raw_id.parse::<NonZeroU64>()?.get())
}

#[derive(Debug)]
pub struct TrackImporter {
    registry: ProviderRegistry,
    repository: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl TrackImporter {
    #[must_use]
    pub fn new(
        registry: ProviderRegistry,
        repository: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            repository,
            clock,
        }
    }

    /// Imports one track. Submitting the same link twice stores two tracks.
    pub async fn import_track(
        &self,
        raw_url: &str,
        author_id: Id<UserMarker>,
        save_as_draft: bool,
    ) -> Result<Track, ImportError> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(ImportError::MissingUrl);
        }

        let url = Url::parse(raw_url).map_err(|err| ImportError::InvalidUrl(err.to_string()))?;
        let host = url.host_str().unwrap_or_default();
        let provider = self
            .registry
            .get(host)
            .ok_or_else(|| ImportError::UnsupportedProvider(escape_markup(host).into_owned()))?;
        let provider_kind = provider.provider();

        let resolved = provider.resolve(&url).await.map_err(|source| {
            ImportError::ProviderResolutionFailed {
                provider: provider_kind,
                source,
            }
        })?;
        let provider_id = parse_track_id(provider_kind, &resolved.path)?;

        let metadata = provider
            .fetch(provider_id, resolved.secret_token.as_deref())
            .await
            .map_err(|source| ImportError::ProviderFetchFailed {
                provider: provider_kind,
                source,
            })?;
        if metadata.title.trim().is_empty() {
            return Err(ImportError::MissingTitle(provider_kind));
        }

        // Both dates always come from the same source.
        let created_at = provider
            .parse_created_at(&metadata.created_at)
            .unwrap_or_else(|| self.clock.now());

        let visibility = if save_as_draft {
            Visibility::Draft
        } else {
            Visibility::Public
        };

        let create_track = CreateTrack {
            author_id,
            visibility,
            provider: provider_kind,
            provider_id,
            secret_token: resolved.secret_token,
            provider_metadata: metadata.raw,
            provider_created_at: created_at,
            sort_date: created_at,
            title: metadata.title,
            body: metadata.description.clone(),
            provider_description: metadata.description,
            genre: metadata.genre,
            duration_ms: metadata.duration_ms,
            artwork_url: metadata.artwork_url,
            download_url: metadata
                .download_url
                .filter(|_| metadata.downloadable),
            isrc: metadata.isrc,
            bpm: metadata.bpm,
            key_signature: metadata.key_signature,
            url: metadata.permalink_url,
        };

        let track = self.repository.create_track(&create_track).await?;
        debug!(
            track_id = %track.id,
            %author_id,
            provider = provider_kind.as_str(),
            provider_id,
            "Imported track"
        );

        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use crate::import::{
        ImportError, MalformedProviderId, ProviderError, ProviderRegistry, ResolvedTrack,
        TrackImporter, TrackMetadata, TrackProvider, parse_track_id,
    };
    use reqwest::Url;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use time::{UtcDateTime, macros::utc_datetime};
    use trackboard_common::{
        clock::FixedClock,
        model::{
            Id,
            track::{Provider, Track, Visibility},
            user::{CreateUser, UserMarker, UserSlug},
        },
        snowflake::GeneratorOrigin,
    };
    use trackboard_db::{memory::MemoryStore, repository::Repository};

    const NOW: UtcDateTime = utc_datetime!(2025-06-01 12:00);

    #[derive(Debug, Default)]
    struct StubProvider {
        resolve_error: Option<String>,
        fetch_error: Option<String>,
        resolved_path: Option<String>,
        created_at: String,
        downloadable: bool,
        untitled: bool,
        fetches: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TrackProvider for StubProvider {
        fn provider(&self) -> Provider {
            Provider::SoundCloud
        }

        fn hosts(&self) -> &[&'static str] {
            &["soundcloud.com"]
        }

        async fn resolve(&self, url: &Url) -> Result<ResolvedTrack, ProviderError> {
            if let Some(error) = &self.resolve_error {
                return Err(ProviderError::new(error));
            }
            Ok(ResolvedTrack {
                path: self
                    .resolved_path
                    .clone()
                    .unwrap_or_else(|| "/tracks/42.json".to_owned()),
                secret_token: url
                    .query_pairs()
                    .find(|(key, _)| key == "secret_token")
                    .map(|(_, value)| value.into_owned()),
            })
        }

        async fn fetch(
            &self,
            track_id: u64,
            _secret_token: Option<&str>,
        ) -> Result<TrackMetadata, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.fetch_error {
                return Err(ProviderError::new(error));
            }
            Ok(TrackMetadata {
                title: if self.untitled { " " } else { "Foo" }.to_owned(),
                description: "About foo".to_owned(),
                duration_ms: 180_000,
                download_url: Some("https://example.com/foo.wav".to_owned()),
                downloadable: self.downloadable,
                permalink_url: "https://soundcloud.com/artist/foo".to_owned(),
                created_at: self.created_at.clone(),
                raw: serde_json::json!({ "id": track_id }),
                ..TrackMetadata::default()
            })
        }

        fn parse_created_at(&self, raw: &str) -> Option<UtcDateTime> {
            (raw == "valid").then_some(utc_datetime!(2024-03-04 05:06:07))
        }
    }

    struct Harness {
        importer: TrackImporter,
        store: Arc<MemoryStore>,
        provider: Arc<StubProvider>,
        author: Id<UserMarker>,
    }

    async fn setup(provider: StubProvider) -> Harness {
        let store = Arc::new(MemoryStore::new(
            GeneratorOrigin::default(),
            Arc::new(FixedClock(NOW)),
        ));
        let author = store
            .create_user(&CreateUser {
                slug: UserSlug::new("artist".to_owned()).unwrap(),
                firstname: String::new(),
                lastname: String::new(),
            })
            .await
            .unwrap()
            .id;
        let provider = Arc::new(provider);
        let importer = TrackImporter::new(
            ProviderRegistry::new().with(provider.clone()),
            store.clone(),
            Arc::new(FixedClock(NOW)),
        );

        Harness {
            importer,
            store,
            provider,
            author,
        }
    }

    #[test]
    fn track_ids_come_from_the_tracks_segment() {
        assert_eq!(parse_track_id(Provider::SoundCloud, "/tracks/42.json"), Ok(42));
        assert_eq!(parse_track_id(Provider::SoundCloud, "/tracks/42"), Ok(42));
        assert_eq!(
            parse_track_id(Provider::SoundCloud, "/users/7/tracks/42"),
            Ok(42)
        );
        assert_eq!(
            parse_track_id(Provider::SoundCloud, "/playlists/42"),
            Err(MalformedProviderId::MissingTrackSegment(Provider::SoundCloud))
        );
        assert!(matches!(
            parse_track_id(Provider::SoundCloud, "/tracks/abc.json"),
            Err(MalformedProviderId::NotANumber(_))
        ));
        assert!(matches!(
            parse_track_id(Provider::SoundCloud, "/tracks/0"),
            Err(MalformedProviderId::NotANumber(_))
        ));
    }

    #[test]
    fn registry_dispatches_on_host() {
        let registry = ProviderRegistry::new().with(Arc::new(StubProvider::default()));

        assert!(registry.get("soundcloud.com").is_some());
        assert!(registry.get("SoundCloud.com").is_some());
        assert!(registry.get("bandcamp.com").is_none());
        assert!(ProviderRegistry::new().is_empty());
    }

    #[tokio::test]
    async fn imports_a_public_downloadable_track() {
        let harness = setup(StubProvider {
            downloadable: true,
            created_at: "valid".to_owned(),
            ..StubProvider::default()
        })
        .await;

        let track = harness
            .importer
            .import_track("https://soundcloud.com/artist/foo", harness.author, false)
            .await
            .unwrap();

        assert_eq!(track.visibility, Visibility::Public);
        assert_eq!(track.provider_id, 42);
        assert_eq!(track.title, "Foo");
        assert_eq!(track.body, "About foo");
        assert_eq!(track.provider_description, "About foo");
        assert_eq!(track.duration_ms, 180_000);
        assert_eq!(
            track.download_url.as_deref(),
            Some("https://example.com/foo.wav")
        );
        assert_eq!(track.provider_created_at, utc_datetime!(2024-03-04 05:06:07));
        assert_eq!(track.sort_date, track.provider_created_at);
        assert_eq!(track.provider_metadata, serde_json::json!({ "id": 42 }));
        assert_eq!(harness.store.tracks().await.len(), 1);
    }

    #[tokio::test]
    async fn drafts_unparseable_dates_and_downloads() {
        let harness = setup(StubProvider {
            created_at: "yesterday-ish".to_owned(),
            ..StubProvider::default()
        })
        .await;

        let track = harness
            .importer
            .import_track(
                "https://soundcloud.com/artist/foo?secret_token=s-123",
                harness.author,
                true,
            )
            .await
            .unwrap();

        assert_eq!(track.visibility, Visibility::Draft);
        assert_eq!(track.download_url, None);
        assert_eq!(track.secret_token.as_deref(), Some("s-123"));
        assert_eq!(track.provider_created_at, NOW);
        assert_eq!(track.sort_date, NOW);
    }

    #[tokio::test]
    async fn resubmitting_creates_a_second_track() {
        let harness = setup(StubProvider::default()).await;

        let first = harness
            .importer
            .import_track("https://soundcloud.com/artist/foo", harness.author, false)
            .await
            .unwrap();
        let second = harness
            .importer
            .import_track("https://soundcloud.com/artist/foo", harness.author, false)
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.provider_id, second.provider_id);
        assert_eq!(harness.store.tracks().await.len(), 2);
    }

    async fn import(harness: &Harness, url: &str) -> Result<Track, ImportError> {
        harness.importer.import_track(url, harness.author, false).await
    }

    #[tokio::test]
    async fn rejected_links_store_nothing() {
        let harness = setup(StubProvider::default()).await;

        assert!(matches!(
            import(&harness, "  ").await,
            Err(ImportError::MissingUrl)
        ));

        let invalid = import(&harness, "not a url").await.unwrap_err();
        assert!(matches!(invalid, ImportError::InvalidUrl(_)));
        assert!(invalid.to_string().starts_with("Parse URL: "));

        let unsupported = import(&harness, "https://bandcamp.com/track/foo")
            .await
            .unwrap_err();
        assert!(unsupported.is_user_facing());
        assert_eq!(
            unsupported.to_string(),
            "Unsupported provider: bandcamp.com."
        );

        assert!(harness.store.tracks().await.is_empty());
        assert_eq!(harness.provider.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failures_are_user_facing() {
        let harness = setup(StubProvider {
            resolve_error: Some("404 Not Found".to_owned()),
            ..StubProvider::default()
        })
        .await;
        let error = harness
            .importer
            .import_track("https://soundcloud.com/nobody", harness.author, false)
            .await
            .unwrap_err();
        assert!(error.is_user_facing());
        assert_eq!(error.to_string(), "This URL does not exist on SoundCloud.");
        assert_eq!(harness.provider.fetches.load(Ordering::SeqCst), 0);

        let harness = setup(StubProvider {
            resolved_path: Some("/playlists/1".to_owned()),
            ..StubProvider::default()
        })
        .await;
        let error = harness
            .importer
            .import_track("https://soundcloud.com/a/sets/b", harness.author, false)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Invalid SoundCloud track link.");

        let harness = setup(StubProvider {
            resolved_path: Some("/tracks/abc".to_owned()),
            ..StubProvider::default()
        })
        .await;
        let error = harness
            .importer
            .import_track("https://soundcloud.com/a/b", harness.author, false)
            .await
            .unwrap_err();
        assert!(error.to_string().starts_with("Parse track ID: "));

        let harness = setup(StubProvider {
            fetch_error: Some("rate limited".to_owned()),
            ..StubProvider::default()
        })
        .await;
        let error = harness
            .importer
            .import_track("https://soundcloud.com/a/b", harness.author, false)
            .await
            .unwrap_err();
        assert!(error.is_user_facing());
        assert_eq!(
            error.to_string(),
            "Fetch track info from SoundCloud: rate limited."
        );
        assert!(harness.store.tracks().await.is_empty());
    }

    #[tokio::test]
    async fn untitled_tracks_are_rejected_before_saving() {
        let harness = setup(StubProvider {
            untitled: true,
            ..StubProvider::default()
        })
        .await;

        let error = import(&harness, "https://soundcloud.com/a/b")
            .await
            .unwrap_err();

        assert!(matches!(error, ImportError::MissingTitle(Provider::SoundCloud)));
        assert!(error.is_user_facing());
        assert_eq!(
            error.to_string(),
            "SoundCloud returned a track without a title."
        );
        assert_eq!(harness.provider.fetches.load(Ordering::SeqCst), 1);
        assert!(harness.store.tracks().await.is_empty());
    }
}
