//! Module for working with snowflake IDs.
//!
//! Layout, from the most significant bit:
//! 42 bits of milliseconds since the epoch, 5 bits worker id, 5 bits process id
//! and a 12 bit per-generator increment.
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_LENGTH: u32 = 5;
pub const PROCESS_ID_LENGTH: u32 = 5;
pub const INCREMENT_LENGTH: u32 = 12;

pub const INCREMENT_OFFSET: u32 = 0;
pub const PROCESS_ID_OFFSET: u32 = INCREMENT_OFFSET + INCREMENT_LENGTH;
pub const WORKER_ID_OFFSET: u32 = PROCESS_ID_OFFSET + PROCESS_ID_LENGTH;
pub const TIMESTAMP_OFFSET: u32 = WORKER_ID_OFFSET + WORKER_ID_LENGTH;

const fn mask(length: u32) -> u64 {
    (1 << length) - 1
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
    #[error("Worker id {0} does not fit in {WORKER_ID_LENGTH} bits.")]
    WorkerIdOutOfRange(u8),
    #[error("Process id {0} does not fit in {PROCESS_ID_LENGTH} bits.")]
    ProcessIdOutOfRange(u8),
    #[error("All increments of millisecond {0} are used up.")]
    IncrementExhausted(u64),
}

/// Identifies the machine and process generating snowflakes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GeneratorOrigin {
    worker_id: u8,
    process_id: u8,
}

impl GeneratorOrigin {
    pub fn new(worker_id: u8, process_id: u8) -> Result<Self, SnowflakeError> {
        if u64::from(worker_id) > mask(WORKER_ID_LENGTH) {
            return Err(SnowflakeError::WorkerIdOutOfRange(worker_id));
        }
        if u64::from(process_id) > mask(PROCESS_ID_LENGTH) {
            return Err(SnowflakeError::ProcessIdOutOfRange(process_id));
        }

        Ok(Self {
            worker_id,
            process_id,
        })
    }

    #[must_use]
    pub fn worker_id(self) -> u8 {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(self) -> u8 {
        self.process_id
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp_millis(self) -> u64 {
        (self.0 >> TIMESTAMP_OFFSET) & mask(TIMESTAMP_LENGTH)
    }

    #[must_use]
    pub fn origin(self) -> GeneratorOrigin {
        #[allow(clippy::cast_possible_truncation)]
        GeneratorOrigin {
            worker_id: ((self.0 >> WORKER_ID_OFFSET) & mask(WORKER_ID_LENGTH)) as u8,
            process_id: ((self.0 >> PROCESS_ID_OFFSET) & mask(PROCESS_ID_LENGTH)) as u8,
        }
    }

    #[must_use]
    pub fn increment(self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let increment = ((self.0 >> INCREMENT_OFFSET) & mask(INCREMENT_LENGTH)) as u16;
        increment
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(self.timestamp_millis().cast_signed())
    }

    fn from_parts(timestamp_millis: u64, origin: GeneratorOrigin, increment: u16) -> Self {
        Self::new(
            timestamp_millis << TIMESTAMP_OFFSET
                | u64::from(origin.worker_id) << WORKER_ID_OFFSET
                | u64::from(origin.process_id) << PROCESS_ID_OFFSET
                | u64::from(increment) << INCREMENT_OFFSET,
        )
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

fn millis_since_epoch<SnowflakeEpoch: Epoch>(time: UtcDateTime) -> Result<u64, SnowflakeError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeError::TimeBeforeEpoch);
    }
    let millis = u64::try_from(millis).map_err(|_| SnowflakeError::TimestampTooLarge)?;
    if millis > mask(TIMESTAMP_LENGTH) {
        return Err(SnowflakeError::TimestampTooLarge);
    }

    Ok(millis)
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    origin: GeneratorOrigin,
    last_millis: Option<u64>,
    next_increment: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(origin: GeneratorOrigin) -> Self {
        Self {
            origin,
            last_millis: None,
            next_increment: 0,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn origin(&self) -> GeneratorOrigin {
        self.origin
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let mut millis = millis_since_epoch::<SnowflakeEpoch>(time)?;

        // Ids stay unique and increasing even if the clock steps back.
        match self.last_millis {
            Some(last) if millis <= last => millis = last,
            _ => {
                self.last_millis = Some(millis);
                self.next_increment = 0;
            }
        }

        let increment = self.next_increment;
        if u64::from(increment) > mask(INCREMENT_LENGTH) {
            return Err(SnowflakeError::IncrementExhausted(millis));
        }
        self.next_increment = increment + 1;

        Ok(Snowflake::from_parts(millis, self.origin, increment))
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{Epoch, GeneratorOrigin, Snowflake, SnowflakeError, SnowflakeGenerator};
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-1-1 00:00);
    }

    #[test]
    fn origin_range() {
        assert!(GeneratorOrigin::new(0x1F, 0x1F).is_ok());
        assert_eq!(
            GeneratorOrigin::new(0x20, 0),
            Err(SnowflakeError::WorkerIdOutOfRange(0x20))
        );
        assert_eq!(
            GeneratorOrigin::new(0, u8::MAX),
            Err(SnowflakeError::ProcessIdOutOfRange(u8::MAX))
        );
    }

    #[test]
    fn parts_survive_generation() {
        let origin = GeneratorOrigin::new(0b10101, 0b10001).unwrap();
        let time = utc_datetime!(2025-10-24 10:30);
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(origin);

        let snowflake = generator.generate_at(time).unwrap();

        assert_eq!(snowflake.created_at(), time);
        assert_eq!(snowflake.origin(), origin);
        assert_eq!(snowflake.increment(), 0);
    }

    #[test]
    fn increments_within_a_millisecond() {
        let time = utc_datetime!(2025-10-24 10:55);
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(GeneratorOrigin::default());

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();
        assert_eq!(first.increment(), 0);
        assert_eq!(second.increment(), 1);
        assert!(first < second);

        let mut last = second;
        for _ in 2..0x1000 {
            let next = generator.generate_at(time).unwrap();
            assert!(last < next);
            last = next;
        }
        assert_eq!(last.increment(), 0xFFF);
        assert_eq!(
            generator.generate_at(time),
            Err(SnowflakeError::IncrementExhausted(last.timestamp_millis()))
        );

        let later = generator
            .generate_at(time + Duration::milliseconds(1))
            .unwrap();
        assert_eq!(later.increment(), 0);
        assert!(last < later);
    }

    #[test]
    fn clock_going_back_keeps_ids_increasing() {
        let time = utc_datetime!(2025-10-24 10:55);
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(GeneratorOrigin::default());

        let first = generator.generate_at(time).unwrap();
        let second = generator
            .generate_at(time - Duration::seconds(5))
            .unwrap();

        assert!(first < second);
        assert_eq!(second.created_at(), time);
        assert_eq!(second.increment(), 1);
    }

    #[test]
    fn rejects_out_of_range_times() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(GeneratorOrigin::default());

        assert_eq!(
            generator.generate_at(MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)),
            Err(SnowflakeError::TimeBeforeEpoch)
        );
        assert_eq!(
            generator.generate_at(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000)
            ),
            Err(SnowflakeError::TimestampTooLarge)
        );
        assert!(
            generator
                .generate_at(MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x03FF_FFFF_FFFF))
                .is_ok()
        );
    }

    #[test]
    fn display_is_decimal() {
        assert_eq!(Snowflake::<MillennialEpoch>::new(42).to_string(), "42");
    }

    #[test]
    fn serializes_as_a_bare_number() {
        let snowflake = Snowflake::<MillennialEpoch>::new(42);

        assert_eq!(serde_json::to_string(&snowflake).unwrap(), "42");
        assert_eq!(
            serde_json::from_str::<Snowflake<MillennialEpoch>>("42").unwrap(),
            snowflake
        );
    }
}
