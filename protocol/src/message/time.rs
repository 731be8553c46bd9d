//! Conversions between wall-clock time and network time (whole seconds
//! since the network epoch).

use crate::config::FARCASTER_EPOCH_MS;
use crate::error::{BadRequestKind, HubError, HubResult};

/// Current network time.
pub fn farcaster_time() -> HubResult<u32> {
    to_farcaster_time(chrono::Utc::now().timestamp_millis())
}

/// Convert unix milliseconds to network seconds.
pub fn to_farcaster_time(unix_ms: i64) -> HubResult<u32> {
    if unix_ms < FARCASTER_EPOCH_MS {
        return Err(HubError::bad_request(
            BadRequestKind::Validation,
            format!("time {} precedes the network epoch", unix_ms),
        ));
    }
    let secs = (unix_ms - FARCASTER_EPOCH_MS) / 1000;
    u32::try_from(secs).map_err(|_| {
        HubError::bad_request(
            BadRequestKind::Validation,
            format!("time {} overflows network time", unix_ms),
        )
    })
}

/// Convert network seconds back to unix milliseconds.
pub fn from_farcaster_time(timestamp: u32) -> i64 {
    FARCASTER_EPOCH_MS + i64::from(timestamp) * 1000
}
