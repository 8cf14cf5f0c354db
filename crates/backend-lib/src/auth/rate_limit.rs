// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Per-client throttling of failed login attempts.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics;

/// Default number of failed attempts before lockout
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Upper bound on clients tracked at once.
const DEFAULT_MAX_TRACKED: usize = 10_000;

#[derive(Debug, Clone)]
struct AttemptEntry {
    failed_attempts: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

/// Locks a client IP out of `/auth/login` after repeated failures.
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    attempts: Arc<DashMap<IpAddr, AttemptEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
    max_tracked: usize,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts: max_attempts.max(1),
            lockout_duration,
            max_tracked: DEFAULT_MAX_TRACKED,
        }
    }

    /// Cap the number of tracked clients.
    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    /// Record a failed login from `ip`, locking it out once the limit is hit.
    ///
    /// Failures older than the lockout duration no longer count.
    pub fn record_failed_attempt(&self, ip: IpAddr) {
        let now = Instant::now();

        if !self.attempts.contains_key(&ip) && self.attempts.len() >= self.max_tracked {
            self.make_room(now);
        }

        let mut entry = self.attempts.entry(ip).or_insert_with(|| AttemptEntry {
            failed_attempts: 0,
            last_failure: now,
            locked_until: None,
        });

        // an expired lockout or stale history starts a fresh count
        let stale = match entry.locked_until {
            Some(until) => now >= until,
            None => now.duration_since(entry.last_failure) >= self.lockout_duration,
        };
        if stale {
            entry.failed_attempts = 0;
            entry.locked_until = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.locked_until.is_none() {
            entry.locked_until = Some(now + self.lockout_duration);
            ::metrics::counter!(metrics::LOGIN_LOCKOUTS).increment(1);
            tracing::warn!(
                target: "authgate::security",
                %ip,
                attempts = entry.failed_attempts,
                lockout_secs = self.lockout_duration.as_secs(),
                "client locked out of login"
            );
        }
    }

    /// A successful login clears the client's history.
    pub fn record_success(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// `true` if `ip` may attempt a login right now.
    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        self.lockout_remaining(ip).is_none()
    }

    /// Time left on the lockout for `ip`, if any.
    pub fn lockout_remaining(&self, ip: IpAddr) -> Option<Duration> {
        let entry = self.attempts.get(&ip)?;
        let until = entry.locked_until?;
        until
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    /// Drop expired lockouts and stale failure history.
    pub fn cleanup(&self) {
        self.prune(Instant::now());
    }

    fn prune(&self, now: Instant) {
        self.attempts.retain(|_, entry| match entry.locked_until {
            Some(until) => now < until,
            None => now.duration_since(entry.last_failure) < self.lockout_duration,
        });
    }

    /// Prune, then evict the least recently failing unlocked client if
    /// the map is still full.
    fn make_room(&self, now: Instant) {
        self.prune(now);
        if self.attempts.len() < self.max_tracked {
            return;
        }

        let oldest = self
            .attempts
            .iter()
            .filter(|entry| entry.locked_until.is_none())
            .min_by_key(|entry| entry.last_failure)
            .map(|entry| *entry.key());
        if let Some(ip) = oldest {
            self.attempts.remove(&ip);
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.attempts.len()
    }
}
