//! UDP relay configuration
//!
//! Selects the datagram interceptor and carries the decoy settings used
//! by the prefix obfuscators.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Registry name of the default interceptor
pub const DEFAULT_INTERCEPTOR: &str = "passthrough";

const COUNT_LIMITS: RangeInclusive<u32> = 0..=100;
const DELAY_MS_LIMITS: RangeInclusive<u64> = 0..=10_000;
const BYTES_LIMITS: RangeInclusive<usize> = 0..=65_536;

fn default_interceptor() -> String {
    DEFAULT_INTERCEPTOR.to_string()
}

/// UDP relay configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Interceptor registry name
    #[serde(default = "default_interceptor")]
    pub interceptor: String,

    /// Decoy prefix settings
    #[serde(default)]
    pub decoy: DecoySettings,
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            interceptor: default_interceptor(),
            decoy: DecoySettings::default(),
        }
    }
}

/// Decoy packet ranges, all bounds inclusive
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DecoySettings {
    /// Fewest decoys per prefix
    pub count_min: u32,
    /// Most decoys per prefix
    pub count_max: u32,
    /// Shortest delay before each decoy, in milliseconds
    pub delay_ms_min: u64,
    /// Longest delay before each decoy, in milliseconds
    pub delay_ms_max: u64,
    /// Smallest decoy size in bytes
    pub bytes_min: usize,
    /// Largest decoy size in bytes
    pub bytes_max: usize,
}

impl Default for DecoySettings {
    fn default() -> Self {
        DecoySettings {
            count_min: 17,
            count_max: 23,
            delay_ms_min: 50,
            delay_ms_max: 250,
            bytes_min: 481,
            bytes_max: 1017,
        }
    }
}

impl DecoySettings {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        check_range("count", self.count_min, self.count_max, &COUNT_LIMITS)?;
        check_range("delay_ms", self.delay_ms_min, self.delay_ms_max, &DELAY_MS_LIMITS)?;
        check_range("bytes", self.bytes_min, self.bytes_max, &BYTES_LIMITS)?;
        Ok(())
    }

    /// Decoy count range
    pub fn count(&self) -> RangeInclusive<u32> {
        self.count_min..=self.count_max
    }

    /// Decoy delay range in milliseconds
    pub fn delay_ms(&self) -> RangeInclusive<u64> {
        self.delay_ms_min..=self.delay_ms_max
    }

    /// Decoy size range in bytes
    pub fn bytes(&self) -> RangeInclusive<usize> {
        self.bytes_min..=self.bytes_max
    }
}

fn check_range<T>(name: &str, min: T, max: T, limits: &RangeInclusive<T>) -> Result<(), String>
where
    T: PartialOrd + std::fmt::Display,
{
    if !limits.contains(&min) || !limits.contains(&max) {
        return Err(format!(
            "{} range {}..={} outside {}..={}",
            name,
            min,
            max,
            limits.start(),
            limits.end()
        ));
    }
    if min > max {
        return Err(format!("{}_min ({}) exceeds {}_max ({})", name, min, name, max));
    }
    Ok(())
}
