//! Time-ordered identifiers
//!
//! Every room and participant is keyed by a 64-bit snowflake:
//!
//! ```text
//! | 1 bit unused | 41 bits ms since epoch | 10 bits generator | 12 bits sequence |
//! ```
//!
//! The timestamp bits let the reaper tell how old a room is without storing
//! a separate creation time.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 2015-01-01T00:00:00Z in milliseconds since the Unix epoch
pub const SNOWFLAKE_EPOCH_MS: i64 = 1_420_070_400_000;

const TIMESTAMP_BITS: u32 = 41;
const GENERATOR_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

const MAX_GENERATOR: u16 = (1 << GENERATOR_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const MAX_TIMESTAMP: i64 = (1 << TIMESTAMP_BITS) - 1;

/// A time-ordered, globally unique identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(u64);

impl Snowflake {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Milliseconds since [`SNOWFLAKE_EPOCH_MS`] encoded in this id
    fn offset_ms(self) -> i64 {
        (self.0 >> (GENERATOR_BITS + SEQUENCE_BITS)) as i64
    }

    /// Creation instant recovered from the timestamp bits
    pub fn timestamp(self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(SNOWFLAKE_EPOCH_MS + self.offset_ms())
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Parse a client-supplied id, returning `None` for anything malformed
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Snowflake)
    }
}

// Serialized as a decimal string: JSON clients lose precision above 2^53.
impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

struct GeneratorState {
    last_offset: i64,
    sequence: u64,
}

/// Monotonic snowflake generator, safe to share between tasks
pub struct SnowflakeGenerator {
    generator_id: u16,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator {
    pub fn new(generator_id: u16) -> Self {
        Self {
            generator_id: generator_id & MAX_GENERATOR,
            state: Mutex::new(GeneratorState {
                last_offset: -1,
                sequence: 0,
            }),
        }
    }

    /// Generate the next identifier for the current instant
    pub fn generate(&self) -> Snowflake {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut offset = Self::offset_of(Utc::now()).max(state.last_offset);

        if offset == state.last_offset {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond
                while offset <= state.last_offset {
                    std::thread::yield_now();
                    offset = Self::offset_of(Utc::now());
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_offset = offset;
        self.compose(offset, state.sequence)
    }

    /// Generate an identifier stamped with an arbitrary instant.
    ///
    /// Does not advance the monotonic state; only meant for fabricating
    /// records with a known age.
    pub fn generate_at(&self, at: DateTime<Utc>) -> Snowflake {
        let sequence = rand::random::<u64>() & MAX_SEQUENCE;
        self.compose(Self::offset_of(at), sequence)
    }

    fn offset_of(at: DateTime<Utc>) -> i64 {
        (at.timestamp_millis() - SNOWFLAKE_EPOCH_MS).clamp(0, MAX_TIMESTAMP)
    }

    fn compose(&self, offset: i64, sequence: u64) -> Snowflake {
        Snowflake(
            ((offset as u64) << (GENERATOR_BITS + SEQUENCE_BITS))
                | ((self.generator_id as u64) << SEQUENCE_BITS)
                | sequence,
        )
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}
