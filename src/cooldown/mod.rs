// Per-player skin-change cooldown
//
// Maps player name to expiry instant. Entries are never evicted by a
// background task; a stale entry is the same as no entry and is dropped
// lazily by the next grant or by purge_expired.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Rejected grant, with the seconds left until the cooldown ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRejected {
    pub remaining_seconds: u64,
}

/// Per-identity rate limiter for property-change requests.
pub struct CooldownGate {
    expiries: DashMap<String, Instant>,
    duration: Duration,
}

impl CooldownGate {
    pub fn new(duration: Duration) -> Self {
        Self {
            expiries: DashMap::new(),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn has_cooldown(&self, name: &str) -> bool {
        self.has_cooldown_at(name, Instant::now())
    }

    pub fn has_cooldown_at(&self, name: &str, now: Instant) -> bool {
        self.expiries
            .get(name)
            .map_or(false, |expiry| now < *expiry)
    }

    /// Whole seconds until the cooldown ends, rounded up. Zero when none is active.
    pub fn remaining_seconds(&self, name: &str) -> u64 {
        self.remaining_seconds_at(name, Instant::now())
    }

    pub fn remaining_seconds_at(&self, name: &str, now: Instant) -> u64 {
        self.expiries
            .get(name)
            .map_or(0, |expiry| ceil_seconds(expiry.saturating_duration_since(now)))
    }

    /// Start (or restart) the cooldown for `name` unconditionally.
    pub fn set_cooldown(&self, name: &str) {
        self.set_cooldown_at(name, Instant::now());
    }

    pub fn set_cooldown_at(&self, name: &str, now: Instant) {
        self.expiries.insert(name.to_string(), now + self.duration);
    }

    /// Check and grant in one step.
    ///
    /// The entry stays locked between the check and the write, so two
    /// concurrent requests for the same name cannot both be granted.
    pub fn try_acquire(&self, name: &str) -> Result<(), CooldownRejected> {
        self.try_acquire_at(name, Instant::now())
    }

    pub fn try_acquire_at(&self, name: &str, now: Instant) -> Result<(), CooldownRejected> {
        let mut expiry = self
            .expiries
            .entry(name.to_string())
            .or_insert(now);

        if now < *expiry {
            return Err(CooldownRejected {
                remaining_seconds: ceil_seconds(expiry.saturating_duration_since(now)),
            });
        }

        *expiry = now + self.duration;
        Ok(())
    }

    /// Clear the cooldown for `name`.
    pub fn reset(&self, name: &str) {
        self.expiries.remove(name);
    }

    /// Drop entries whose cooldown has ended.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.expiries.retain(|_, expiry| now < *expiry);
    }

    /// Number of tracked names, stale ones included.
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    const D: Duration = Duration::from_secs(30);

    #[test]
    fn test_no_cooldown_initially() {
        let gate = CooldownGate::new(D);
        assert!(!gate.has_cooldown("Alice"));
        assert_eq!(gate.remaining_seconds("Alice"), 0);
    }

    #[test]
    fn test_cooldown_window() {
        let gate = CooldownGate::new(D);
        let t = Instant::now();
        assert!(gate.try_acquire_at("Alice", t).is_ok());

        assert!(gate.has_cooldown_at("Alice", t));
        assert!(gate.has_cooldown_at("Alice", t + Duration::from_secs(15)));
        assert!(gate.has_cooldown_at("Alice", t + D - Duration::from_millis(1)));
        assert!(!gate.has_cooldown_at("Alice", t + D));
        assert!(!gate.has_cooldown_at("Alice", t + D + Duration::from_secs(1)));
    }

    #[test]
    fn test_remaining_seconds_rounds_up() {
        let gate = CooldownGate::new(D);
        let t = Instant::now();
        gate.set_cooldown_at("Alice", t);

        assert_eq!(gate.remaining_seconds_at("Alice", t), 30);
        assert_eq!(gate.remaining_seconds_at("Alice", t + Duration::from_millis(500)), 30);
        assert_eq!(gate.remaining_seconds_at("Alice", t + Duration::from_millis(29_001)), 1);
        assert_eq!(gate.remaining_seconds_at("Alice", t + D), 0);
    }

    #[test]
    fn test_rejected_while_active_and_regranted_after() {
        let gate = CooldownGate::new(D);
        let t = Instant::now();
        assert!(gate.try_acquire_at("Alice", t).is_ok());

        let rejected = gate.try_acquire_at("Alice", t + Duration::from_secs(10)).unwrap_err();
        assert_eq!(rejected.remaining_seconds, 20);

        // Rejection does not extend the cooldown
        assert!(!gate.has_cooldown_at("Alice", t + D));

        assert!(gate.try_acquire_at("Alice", t + D).is_ok());
        assert!(gate.has_cooldown_at("Alice", t + D + Duration::from_secs(29)));
    }

    #[test]
    fn test_separate_names() {
        let gate = CooldownGate::new(D);
        let t = Instant::now();
        assert!(gate.try_acquire_at("Alice", t).is_ok());
        assert!(gate.try_acquire_at("Bob", t).is_ok());
        assert!(gate.try_acquire_at("Alice", t).is_err());
    }

    #[test]
    fn test_reset_and_purge() {
        let gate = CooldownGate::new(Duration::from_millis(1));
        gate.set_cooldown("Alice");
        gate.set_cooldown("Bob");
        gate.reset("Alice");
        assert_eq!(gate.len(), 1);

        thread::sleep(Duration::from_millis(5));
        gate.purge_expired();
        assert!(gate.is_empty());
    }

    #[test]
    fn test_concurrent_acquire_grants_once() {
        let gate = Arc::new(CooldownGate::new(D));
        let granted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let granted = Arc::clone(&granted);
                thread::spawn(move || {
                    if gate.try_acquire("Alice").is_ok() {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), 1);
    }
}
