//! webrag-gate
//!
//! Per-client sliding-window admission control. Each client keeps a ledger of
//! the instants at which it was admitted; a request is allowed while fewer
//! than `max_requests` of those instants fall inside the trailing window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use webrag_core::config::GateSettings;

pub struct AccessGate {
    ledgers: Mutex<HashMap<String, VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl AccessGate {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self { ledgers: Mutex::new(HashMap::new()), max_requests, window }
    }

    pub fn from_settings(settings: &GateSettings) -> Self {
        Self::new(settings.max_requests, Duration::from_secs(settings.window_secs))
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether `client` may proceed at `now`.
    ///
    /// Expired instants are pruned first. A denied request is not recorded,
    /// so retrying while blocked does not extend the block.
    pub fn admit(&self, client: &str, now: Instant) -> bool {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        let ledger = ledgers.entry(client.to_string()).or_default();
        while ledger.front().is_some_and(|ts| self.expired(*ts, now)) {
            ledger.pop_front();
        }
        if ledger.len() >= self.max_requests {
            warn!(client, in_window = ledger.len(), limit = self.max_requests, "rate limit exceeded");
            return false;
        }
        ledger.push_back(now);
        true
    }

    pub fn admit_now(&self, client: &str) -> bool {
        self.admit(client, Instant::now())
    }

    /// Drop clients with no admission inside the window at `now`.
    /// Returns how many were removed.
    pub fn purge_idle(&self, now: Instant) -> usize {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = ledgers.len();
        ledgers.retain(|_, ledger| ledger.iter().any(|ts| !self.expired(*ts, now)));
        let removed = before - ledgers.len();
        if removed > 0 {
            debug!(removed, remaining = ledgers.len(), "purged idle clients");
        }
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.ledgers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn expired(&self, ts: Instant, now: Instant) -> bool {
        now.saturating_duration_since(ts) >= self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(t0: Instant, secs: u64) -> Instant {
        t0 + Duration::from_secs(secs)
    }

    #[test]
    fn sliding_window_ceiling() {
        let gate = AccessGate::new(3, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(gate.admit("10.0.0.1", at(t0, 0)));
        assert!(gate.admit("10.0.0.1", at(t0, 1)));
        assert!(gate.admit("10.0.0.1", at(t0, 2)));
        assert!(!gate.admit("10.0.0.1", at(t0, 3)));
        assert!(gate.admit("10.0.0.1", at(t0, 61)));
    }

    #[test]
    fn entry_expires_exactly_at_window_edge() {
        let gate = AccessGate::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(gate.admit("a", t0));
        assert!(!gate.admit("a", at(t0, 59)));
        assert!(gate.admit("a", at(t0, 60)));
    }

    #[test]
    fn denials_are_not_recorded() {
        let gate = AccessGate::new(2, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(gate.admit("a", at(t0, 0)));
        assert!(gate.admit("a", at(t0, 5)));
        for s in 6..10 {
            assert!(!gate.admit("a", at(t0, s)));
        }
        // Only the t=0 admission has aged out; the t=5 one still counts.
        assert!(gate.admit("a", at(t0, 10)));
        assert!(!gate.admit("a", at(t0, 11)));
    }

    #[test]
    fn clients_are_isolated() {
        let gate = AccessGate::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(gate.admit("a", t0));
        assert!(!gate.admit("a", t0));
        assert!(gate.admit("b", t0));
    }

    #[test]
    fn purge_drops_only_idle_clients() {
        let gate = AccessGate::new(5, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(gate.admit("old", at(t0, 0)));
        assert!(gate.admit("fresh", at(t0, 50)));
        assert_eq!(gate.tracked_clients(), 2);
        assert_eq!(gate.purge_idle(at(t0, 70)), 1);
        assert_eq!(gate.tracked_clients(), 1);
        assert_eq!(gate.purge_idle(at(t0, 200)), 1);
        assert_eq!(gate.tracked_clients(), 0);
    }

    #[test]
    fn zero_ceiling_denies_everything() {
        let gate = AccessGate::new(0, Duration::from_secs(60));
        assert!(!gate.admit_now("a"));
    }
}
