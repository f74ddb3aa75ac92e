//! Free-diagnosis allowance for guests.
//!
//! Authenticated callers are never gated and never hit the quota endpoint.
//! A guest is only allowed to submit after a successful check in the
//! current review visit reported at least one remaining diagnosis; a failed
//! check resolves the loading state but keeps the gate closed until a retry
//! succeeds.

use crate::service::{GuestQuota, QuotaEndpoint, ServiceError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuotaCheck {
    NotChecked,
    Checking,
    Checked { remaining: i64 },
    /// The last check failed; nothing is known about the allowance.
    Indeterminate { reason: String },
}

/// Read model exposed to the review step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuestQuotaState {
    /// `None` for authenticated callers.
    pub remaining: Option<i64>,
    pub can_submit: bool,
}

#[derive(Clone, Debug)]
pub struct GuestQuotaTracker {
    is_guest: bool,
    visit: u64,
    check: QuotaCheck,
}

impl GuestQuotaTracker {
    pub fn new(is_guest: bool) -> Self {
        Self {
            is_guest,
            visit: 0,
            check: QuotaCheck::NotChecked,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.is_guest
    }

    /// Start a check for a new review visit (or a retry).
    /// Returns the visit id the result must be reported against, or `None`
    /// when no request is needed because the caller is authenticated.
    pub fn begin_check(&mut self) -> Option<u64> {
        if !self.is_guest {
            return None;
        }
        self.visit += 1;
        self.check = QuotaCheck::Checking;
        tracing::debug!("guest quota check #{} started", self.visit);
        Some(self.visit)
    }

    /// Record the endpoint's answer. Answers for an older visit are ignored.
    pub fn finish_check(&mut self, visit: u64, outcome: Result<GuestQuota, ServiceError>) -> bool {
        if visit != self.visit || self.check != QuotaCheck::Checking {
            tracing::debug!("stale quota result for visit {visit} ignored");
            return false;
        }
        self.check = match outcome {
            Ok(q) => {
                tracing::info!("guest quota: {} remaining", q.remaining);
                QuotaCheck::Checked {
                    remaining: q.remaining,
                }
            }
            Err(e) => {
                tracing::warn!("guest quota check failed: {e}");
                QuotaCheck::Indeterminate {
                    reason: e.to_string(),
                }
            }
        };
        true
    }

    /// One full check against `endpoint`; a no-op for authenticated callers.
    pub async fn check(&mut self, endpoint: &dyn QuotaEndpoint) {
        if let Some(visit) = self.begin_check() {
            let outcome = endpoint.guest_quota().await;
            self.finish_check(visit, outcome);
        }
    }

    pub fn status(&self) -> &QuotaCheck {
        &self.check
    }

    pub fn is_loading(&self) -> bool {
        self.check == QuotaCheck::Checking
    }

    pub fn can_diagnose(&self) -> bool {
        if !self.is_guest {
            return true;
        }
        matches!(self.check, QuotaCheck::Checked { remaining } if remaining > 0)
    }

    pub fn state(&self) -> GuestQuotaState {
        let remaining = match (&self.check, self.is_guest) {
            (QuotaCheck::Checked { remaining }, true) => Some((*remaining).max(0)),
            _ => None,
        };
        GuestQuotaState {
            remaining,
            can_submit: self.can_diagnose(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::test_support::FakeQuota;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_authenticated_never_calls_endpoint() {
        let endpoint = FakeQuota::remaining(0);
        let mut tracker = GuestQuotaTracker::new(false);
        tracker.check(&endpoint).await;
        assert!(tracker.can_diagnose());
        assert_eq!(endpoint.calls(), 0);
        assert_eq!(
            tracker.state(),
            GuestQuotaState {
                remaining: None,
                can_submit: true
            }
        );
    }

    #[tokio::test]
    async fn test_guest_gate_follows_remaining() {
        for (remaining, allowed) in [(3, true), (1, true), (0, false), (-2, false)] {
            let endpoint = FakeQuota::remaining(remaining);
            let mut tracker = GuestQuotaTracker::new(true);
            tracker.check(&endpoint).await;
            assert_eq!(tracker.can_diagnose(), allowed, "remaining = {remaining}");
            assert_eq!(endpoint.calls(), 1);
            assert!(!tracker.is_loading());
        }
    }

    #[test]
    fn test_guest_blocked_before_first_check() {
        let tracker = GuestQuotaTracker::new(true);
        assert!(!tracker.can_diagnose());
        assert_eq!(tracker.state().remaining, None);
    }

    #[tokio::test]
    async fn test_failed_check_resolves_but_keeps_gate_closed() {
        let endpoint = FakeQuota::failing("connection refused");
        let mut tracker = GuestQuotaTracker::new(true);
        tracker.check(&endpoint).await;
        assert!(!tracker.is_loading());
        assert!(!tracker.can_diagnose());
        assert!(matches!(tracker.status(), QuotaCheck::Indeterminate { .. }));

        // A successful retry opens it.
        let endpoint = FakeQuota::remaining(2);
        tracker.check(&endpoint).await;
        assert!(tracker.can_diagnose());
        assert_eq!(tracker.state().remaining, Some(2));
    }

    #[test]
    fn test_every_visit_rechecks_and_stale_answers_are_dropped() {
        let mut tracker = GuestQuotaTracker::new(true);
        let first = tracker.begin_check().unwrap();
        let second = tracker.begin_check().unwrap();
        assert_ne!(first, second);
        assert!(tracker.is_loading());

        assert!(!tracker.finish_check(first, Ok(GuestQuota { remaining: 5 })));
        assert!(tracker.is_loading());
        assert!(tracker.finish_check(second, Ok(GuestQuota { remaining: 0 })));
        assert!(!tracker.can_diagnose());

        // Re-entering review drops the previous answer until the new one lands.
        tracker.begin_check();
        assert!(!tracker.can_diagnose());
    }
}
