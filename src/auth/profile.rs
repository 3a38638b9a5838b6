//! Waiting for the trigger-created profile row after sign-up.
//!
//! The store creates the profile asynchronously, so right after sign-up the
//! row may not be visible yet. The poll retries a bounded number of times with
//! exponential backoff capped at `max_delay`.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::data::{DataError, DataStore, Profile};

/// Bounded retry schedule for the profile lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilePoll {
    /// Total lookups, including the first. Zero disables the poll.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ProfilePoll {
    /// Delay after failed lookup number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Poll for the profile of `user_id`.
///
/// Returns `Ok(None)` if the row never appeared within the schedule. A lookup
/// error is retried like a miss; only the final attempt's error is returned.
pub async fn wait_for_profile(
    data: &dyn DataStore,
    access_token: &str,
    user_id: Uuid,
    poll: ProfilePoll,
) -> Result<Option<Profile>, DataError> {
    for attempt in 1..=poll.attempts {
        let last = attempt == poll.attempts;
        match data.fetch_profile(access_token, user_id).await {
            Ok(Some(profile)) => {
                debug!(%user_id, attempt, "profile available");
                return Ok(Some(profile));
            }
            Ok(None) if last => {
                warn!(%user_id, attempts = poll.attempts, "profile not created within poll window");
                return Ok(None);
            }
            Err(e) if last => return Err(e),
            Ok(None) => debug!(%user_id, attempt, "profile not yet visible; retrying"),
            Err(e) => warn!(error = %e, %user_id, attempt, "profile lookup failed; retrying"),
        }
        tokio::time::sleep(poll.delay_after(attempt)).await;
    }
    Ok(None)
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
