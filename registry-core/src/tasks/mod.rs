//! The lifecycle tasks that drive the proxy/node state machine: discovery
//! ingestion, active/inactive rechecking with exponential backoff, and
//! peer sync. Each is a [`crate::scheduler::Task`] or
//! [`crate::scheduler::PeriodicTask`] registered with the [`Scheduler`].

mod active_recheck;
mod inactive_recheck;
mod search;
mod sync_nodes;

pub use active_recheck::UpdateActiveProxyTask;
pub use inactive_recheck::UpdateInactiveProxyTask;
pub use search::ProxySearchTask;
pub use sync_nodes::SyncNodesTask;

use chrono::{DateTime, Utc};

/// The exponential-backoff predicate shared by inactive-proxy and
/// inactive-node rechecks: due again once as much time has passed since
/// the last check as had passed between going inactive and that check.
///
/// `last_check_at < inactive_since` shouldn't occur (the invariant ties
/// them together) but isn't enforced by the type system, so the
/// right-hand side is clamped to zero rather than going negative and
/// making every proxy perpetually "due" — see spec's Open Questions.
pub fn inactive_backoff_due(now: DateTime<Utc>, last_check_at: DateTime<Utc>, inactive_since: DateTime<Utc>) -> bool {
    let since_last_check = now.signed_duration_since(last_check_at);
    let backoff_window = last_check_at.signed_duration_since(inactive_since).max(chrono::Duration::zero());
    since_last_check > backoff_window
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn due_once_elapsed_time_exceeds_the_backoff_window() {
        let inactive_since = Utc::now() - Duration::hours(3);
        let last_check_at = inactive_since + Duration::hours(1); // 1h backoff window
        let now = last_check_at + Duration::hours(2); // 2h since last check > 1h window
        assert!(inactive_backoff_due(now, last_check_at, inactive_since));
    }

    #[test]
    fn not_due_before_the_backoff_window_elapses() {
        let inactive_since = Utc::now() - Duration::hours(3);
        let last_check_at = inactive_since + Duration::hours(1);
        let now = last_check_at + Duration::minutes(30);
        assert!(!inactive_backoff_due(now, last_check_at, inactive_since));
    }

    #[test]
    fn clamps_an_out_of_order_inactive_since_to_zero_window() {
        let last_check_at = Utc::now();
        let inactive_since = last_check_at + Duration::hours(1); // shouldn't happen, but guarded
        let now = last_check_at + Duration::seconds(1);
        assert!(inactive_backoff_due(now, last_check_at, inactive_since));
    }
}
