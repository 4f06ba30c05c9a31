//! Windows FILETIME conversions.
//!
//! FILETIME counts 100-nanosecond ticks since 1601-01-01 UTC. Every
//! time-valued wire field goes through [`to_filetime`] / [`from_filetime`]
//! so the rounding behaves identically everywhere.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between 1601-01-01 and the Unix epoch.
const EPOCH_DELTA_SECS: u64 = 11_644_473_600;

/// Ticks per second.
const TICKS_PER_SEC: u64 = 10_000_000;

/// Unix timestamp with nanosecond precision, as the metadata store
/// reports it.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UnixTime {
    pub seconds: i64,
    pub nanos: u32,
}

impl UnixTime {
    pub fn now() -> Self {
        let since = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        UnixTime { seconds: since.as_secs() as i64, nanos: since.subsec_nanos() }
    }

    pub fn from_system(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => UnixTime { seconds: since.as_secs() as i64, nanos: since.subsec_nanos() },
            Err(err) => {
                let before = err.duration();
                UnixTime { seconds: -(before.as_secs() as i64), nanos: before.subsec_nanos() }
            }
        }
    }

    pub fn to_system(self) -> SystemTime {
        if self.seconds >= 0 {
            UNIX_EPOCH + Duration::new(self.seconds as u64, self.nanos)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.seconds.unsigned_abs())
                + Duration::from_nanos(self.nanos as u64)
        }
    }
}

/// Converts a Unix timestamp into FILETIME ticks. Times before 1601
/// clamp to zero, the wire convention for "unset".
pub fn to_filetime(time: UnixTime) -> u64 {
    let shifted = time.seconds + EPOCH_DELTA_SECS as i64;
    if shifted < 0 {
        return 0;
    }
    shifted as u64 * TICKS_PER_SEC + time.nanos as u64 / 100
}

/// Converts FILETIME ticks back into a Unix timestamp. Zero decodes as
/// the Unix epoch rather than 1601, mirroring the "unset" convention.
pub fn from_filetime(ticks: u64) -> UnixTime {
    if ticks == 0 {
        return UnixTime::default();
    }
    let seconds = (ticks / TICKS_PER_SEC) as i64 - EPOCH_DELTA_SECS as i64;
    let nanos = (ticks % TICKS_PER_SEC) as u32 * 100;
    UnixTime { seconds, nanos }
}
