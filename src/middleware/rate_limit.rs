//! Per-actor fixed-window request limiter.
//!
//! State is process-local: it does not survive a restart and is not shared
//! between instances. Each actor's counter lives in one shard of a concurrent
//! map, so a check locks only that shard while it reads and updates the entry.

use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::actor::{Actor, ActorType};
use crate::config::RateLimitConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    /// Window start, milliseconds since the Unix epoch
    pub window_start: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Seconds until the window resets; 0 when allowed
    pub retry_after: u64,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self { allowed: true, retry_after: 0 }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    entries: DashMap<String, RateLimitEntry>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    pub fn limit_for(&self, actor_type: ActorType) -> u32 {
        match actor_type {
            ActorType::Human => self.config.human_limit,
            ActorType::Agent => self.config.agent_limit,
        }
    }

    /// Count one request for `actor_id` against the current window
    pub fn check(&self, actor_id: &str, actor_type: ActorType) -> RateLimitDecision {
        self.check_at(actor_id, actor_type, chrono::Utc::now().timestamp_millis())
    }

    pub fn check_at(&self, actor_id: &str, actor_type: ActorType, now_ms: i64) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::allow();
        }

        let window = self.window_ms();
        let limit = self.limit_for(actor_type);

        // The shard guard is released at the end of this block, before any sweep
        let decision = match self.entries.entry(actor_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(RateLimitEntry { count: 1, window_start: now_ms });
                RateLimitDecision::allow()
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if now_ms - entry.window_start >= window {
                    *entry = RateLimitEntry { count: 1, window_start: now_ms };
                    RateLimitDecision::allow()
                } else if entry.count >= limit {
                    let remaining_ms = (entry.window_start + window - now_ms).max(1);
                    RateLimitDecision {
                        allowed: false,
                        retry_after: ((remaining_ms + 999) / 1000) as u64,
                    }
                } else {
                    entry.count += 1;
                    RateLimitDecision::allow()
                }
            }
        };

        let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.sweep_interval > 0 && checks % self.config.sweep_interval == 0 {
            self.prune(now_ms);
        }

        decision
    }

    /// Rate-limit an already-resolved actor, mapping a denial to 429
    pub fn enforce(&self, actor: &Actor) -> Result<(), ApiError> {
        self.enforce_for(&actor.actor_id, actor.actor_type)
    }

    pub fn enforce_for(&self, actor_id: &str, actor_type: ActorType) -> Result<(), ApiError> {
        let decision = self.check(actor_id, actor_type);
        if decision.allowed {
            Ok(())
        } else {
            debug!("Rate limited {} {} for {}s", actor_type, actor_id, decision.retry_after);
            Err(ApiError::too_many_requests(decision.retry_after))
        }
    }

    /// Drop entries whose window ended more than `retention_windows` windows ago.
    /// Returns how many were removed.
    pub fn prune(&self, now_ms: i64) -> usize {
        let window = self.window_ms();
        let keep_for = window.saturating_mul(self.config.retention_windows as i64 + 1);
        let before = self.entries.len();
        self.entries.retain(|_, entry| now_ms - entry.window_start <= keep_for);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Pruned {} idle rate limit entries", removed);
        }
        removed
    }

    pub fn entry(&self, actor_id: &str) -> Option<RateLimitEntry> {
        self.entries.get(actor_id).map(|e| *e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn window_ms(&self) -> i64 {
        self.config.window_ms.max(1) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            sweep_interval: 0,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn human_window_scenario() {
        let limiter = limiter();
        for i in 0..60 {
            assert_eq!(limiter.check_at("u1", ActorType::Human, 0), RateLimitDecision::allow(), "call {}", i + 1);
        }
        assert_eq!(
            limiter.check_at("u1", ActorType::Human, 0),
            RateLimitDecision { allowed: false, retry_after: 60 }
        );

        assert_eq!(limiter.check_at("u1", ActorType::Human, 61_000), RateLimitDecision::allow());
        assert_eq!(limiter.entry("u1"), Some(RateLimitEntry { count: 1, window_start: 61_000 }));
    }

    #[test]
    fn window_resets_exactly_at_boundary() {
        let limiter = limiter();
        for _ in 0..60 {
            limiter.check_at("u1", ActorType::Human, 0);
        }
        assert!(!limiter.check_at("u1", ActorType::Human, 59_999).allowed);
        assert!(limiter.check_at("u1", ActorType::Human, 60_000).allowed);
    }

    #[test]
    fn retry_after_rounds_up() {
        let limiter = limiter();
        for _ in 0..60 {
            limiter.check_at("u1", ActorType::Human, 0);
        }
        assert_eq!(limiter.check_at("u1", ActorType::Human, 58_500).retry_after, 2);
        assert_eq!(limiter.check_at("u1", ActorType::Human, 59_999).retry_after, 1);
    }

    #[test]
    fn agents_get_a_higher_ceiling() {
        let limiter = limiter();
        for _ in 0..300 {
            assert!(limiter.check_at("agent-1", ActorType::Agent, 1_000).allowed);
        }
        assert!(!limiter.check_at("agent-1", ActorType::Agent, 1_000).allowed);
    }

    #[test]
    fn actors_are_counted_separately() {
        let limiter = limiter();
        for _ in 0..60 {
            limiter.check_at("u1", ActorType::Human, 0);
        }
        assert!(!limiter.check_at("u1", ActorType::Human, 0).allowed);
        assert!(limiter.check_at("u2", ActorType::Human, 0).allowed);
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig { enabled: false, ..RateLimitConfig::default() });
        for _ in 0..100 {
            assert!(limiter.check_at("u1", ActorType::Human, 0).allowed);
        }
        assert!(limiter.is_empty());
    }

    #[test]
    fn prune_evicts_idle_entries_only() {
        let limiter = limiter();
        limiter.check_at("old", ActorType::Human, 0);
        limiter.check_at("recent", ActorType::Human, 300_000);

        // Retention is 5 windows past the window end: "old" expires just after 360s
        assert_eq!(limiter.prune(360_001), 1);
        assert!(limiter.entry("old").is_none());
        assert!(limiter.entry("recent").is_some());
    }

    #[test]
    fn lazy_sweep_runs_every_interval() {
        let limiter = RateLimiter::new(RateLimitConfig { sweep_interval: 4, ..RateLimitConfig::default() });
        limiter.check_at("a", ActorType::Human, 0);
        limiter.check_at("b", ActorType::Human, 0);
        limiter.check_at("c", ActorType::Human, 0);
        assert_eq!(limiter.len(), 3);

        // Fourth check triggers the sweep far in the future
        limiter.check_at("d", ActorType::Human, 10_000_000);
        assert_eq!(limiter.len(), 1);
        assert!(limiter.entry("d").is_some());
    }

    #[test]
    fn concurrent_checks_do_not_lose_updates() {
        let limiter = Arc::new(limiter());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20).filter(|_| limiter.check_at("shared", ActorType::Human, 0).allowed).count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 60);
        assert_eq!(limiter.entry("shared").map(|e| e.count), Some(60));
    }
}
