pub mod event;
pub mod track;
pub mod user;

use crate::{
    model::{
        event::{InvalidPostKindError, NotAnEventError},
        track::{InvalidProviderError, InvalidTrackError, InvalidVisibilityError},
        user::InvalidUserSlugError,
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, num::ParseIntError, str::FromStr};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserSlug(#[from] InvalidUserSlugError),
    #[error(transparent)]
    PostKind(#[from] InvalidPostKindError),
    #[error(transparent)]
    Visibility(#[from] InvalidVisibilityError),
    #[error(transparent)]
    Provider(#[from] InvalidProviderError),
    #[error(transparent)]
    Track(#[from] InvalidTrackError),
    #[error(transparent)]
    Event(#[from] NotAnEventError),
    #[error("Stored value is out of range: {0}")]
    OutOfRange(&'static str),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TrackboardEpoch;
impl Epoch for TrackboardEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type TrackboardSnowflake = Snowflake<TrackboardEpoch>;
pub type TrackboardSnowflakeGenerator = SnowflakeGenerator<TrackboardEpoch>;

#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(
    TrackboardSnowflake,
    #[serde(skip)] PhantomData<Marker>,
);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: TrackboardSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> TrackboardSnowflake {
        self.0
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s).map(Self::from)
    }
}

impl<Marker> From<TrackboardSnowflake> for Id<Marker> {
    fn from(value: TrackboardSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(TrackboardSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}
