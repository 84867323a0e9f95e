use crate::import::{ProviderError, ResolvedTrack, TrackMetadata, TrackProvider};
use reqwest::{Client, StatusCode, Url, header::LOCATION, redirect::Policy};
use serde::Deserialize;
use std::time::Duration;
use time::{
    OffsetDateTime, UtcDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};
use trackboard_common::model::track::Provider;

pub const SOUNDCLOUD_HOSTS: [&str; 3] = ["soundcloud.com", "www.soundcloud.com", "m.soundcloud.com"];

/// e.g. `2024/03/04 05:06:07 +0000`
const CREATED_AT_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]/[month]/[day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
);

#[must_use]
pub fn parse_created_at(raw: &str) -> Option<UtcDateTime> {
    OffsetDateTime::parse(raw, CREATED_AT_FORMAT)
        .ok()
        .map(OffsetDateTime::to_utc)
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct SoundCloudTrack {
    title: String,
    description: Option<String>,
    genre: Option<String>,
    duration: u64,
    artwork_url: Option<String>,
    download_url: Option<String>,
    downloadable: bool,
    isrc: Option<String>,
    bpm: Option<f64>,
    key_signature: Option<String>,
    permalink_url: String,
    created_at: String,
}

impl SoundCloudTrack {
    fn into_metadata(self, raw: serde_json::Value) -> TrackMetadata {
        TrackMetadata {
            title: self.title,
            description: self.description.unwrap_or_default(),
            genre: self.genre.unwrap_or_default(),
            duration_ms: self.duration,
            artwork_url: self.artwork_url.filter(|url| !url.is_empty()),
            download_url: self.download_url.filter(|url| !url.is_empty()),
            downloadable: self.downloadable,
            isrc: self.isrc.unwrap_or_default(),
            bpm: self.bpm,
            key_signature: self.key_signature.unwrap_or_default(),
            permalink_url: self.permalink_url,
            created_at: self.created_at,
            raw,
        }
    }
}

/// Body of a `200` resolve answer, which describes the resource directly.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ResolvedResource {
    uri: String,
}

fn resolved_from_location(location: &Url) -> ResolvedTrack {
    ResolvedTrack {
        path: location.path().to_owned(),
        secret_token: location
            .query_pairs()
            .find(|(key, _)| key == "secret_token")
            .map(|(_, value)| value.into_owned())
            .filter(|token| !token.is_empty()),
    }
}

/// Imports from the SoundCloud HTTP API.
#[derive(Clone, Debug)]
pub struct SoundCloudProvider {
    client: Client,
    api_url: String,
    client_id: String,
}

impl SoundCloudProvider {
    pub fn new(
        api_url: &str,
        client_id: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        // Resolve answers with a redirect whose target we need to read.
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_owned(),
            client_id,
        })
    }
}

#[async_trait::async_trait]
impl TrackProvider for SoundCloudProvider {
    fn provider(&self) -> Provider {
        Provider::SoundCloud
    }

    fn hosts(&self) -> &[&'static str] {
        &SOUNDCLOUD_HOSTS
    }

    async fn resolve(&self, url: &Url) -> Result<ResolvedTrack, ProviderError> {
        let response = self
            .client
            .get(format!("{}/resolve", self.api_url))
            .query(&[("url", url.as_str()), ("client_id", self.client_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| ProviderError::new("redirect without location"))?;
            let location = response.url().join(location).map_err(ProviderError::new)?;

            return Ok(resolved_from_location(&location));
        }
        if status == StatusCode::OK {
            let resource: ResolvedResource = response.json().await?;
            let location = Url::parse(&resource.uri).map_err(ProviderError::new)?;

            return Ok(resolved_from_location(&location));
        }

        Err(ProviderError::new(status))
    }

    async fn fetch(
        &self,
        track_id: u64,
        secret_token: Option<&str>,
    ) -> Result<TrackMetadata, ProviderError> {
        let mut query = vec![("client_id", self.client_id.as_str())];
        if let Some(secret_token) = secret_token {
            query.push(("secret_token", secret_token));
        }

        let raw: serde_json::Value = self
            .client
            .get(format!("{}/tracks/{track_id}.json", self.api_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let track = SoundCloudTrack::deserialize(&raw).map_err(ProviderError::new)?;

        Ok(track.into_metadata(raw))
    }

    fn parse_created_at(&self, raw: &str) -> Option<UtcDateTime> {
        parse_created_at(raw)
    }
}
