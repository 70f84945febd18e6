//! Request identity rotation
//!
//! A `RotationPool` hands out a user agent and an optional proxy for each
//! outgoing request. It is constructed once from configuration and shared by
//! reference; it never performs network calls and never fails.

mod user_agents;

pub use user_agents::BROWSER_USER_AGENTS;

use crate::config::{IdentityConfig, UserAgentModeKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Mutex, PoisonError};

/// The (user agent, proxy) pair attached to one outgoing request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    pub user_agent: String,
    pub proxy: Option<String>,
}

/// How user agents are chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgentMode {
    /// Pick from the built-in browser pool on every call
    Random,
    /// Always use the given string
    Fixed(String),
}

/// Thread-safe supplier of request identities
pub struct RotationPool {
    mode: UserAgentMode,
    proxies: Vec<String>,
    rng: Mutex<StdRng>,
}

impl RotationPool {
    /// Creates a pool seeded from OS entropy
    pub fn new(mode: UserAgentMode, proxy_pool: &str) -> Self {
        Self::with_rng(mode, proxy_pool, StdRng::from_entropy())
    }

    /// Creates a pool with a fixed seed, yielding a reproducible identity sequence
    pub fn with_seed(mode: UserAgentMode, proxy_pool: &str, seed: u64) -> Self {
        Self::with_rng(mode, proxy_pool, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mode: UserAgentMode, proxy_pool: &str, rng: StdRng) -> Self {
        let proxies = parse_proxy_pool(proxy_pool);
        if !proxies.is_empty() {
            tracing::debug!("Proxy rotation enabled with {} proxies", proxies.len());
        }

        Self {
            mode,
            proxies,
            rng: Mutex::new(rng),
        }
    }

    /// Builds the pool described by the `[identity]` configuration section
    pub fn from_config(config: &IdentityConfig) -> Self {
        let mode = match (&config.user_agent_mode, &config.fixed_user_agent) {
            (UserAgentModeKind::Fixed, Some(fixed)) if !fixed.trim().is_empty() => {
                UserAgentMode::Fixed(fixed.clone())
            }
            _ => UserAgentMode::Random,
        };
        Self::new(mode, config.proxy_pool.as_deref().unwrap_or(""))
    }

    /// Returns the identity for the next outgoing request
    pub fn next_identity(&self) -> RequestIdentity {
        // A poisoned lock only means another caller panicked mid-draw; the RNG
        // state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let user_agent = match &self.mode {
            UserAgentMode::Fixed(value) => value.clone(),
            UserAgentMode::Random => BROWSER_USER_AGENTS
                .choose(&mut *rng)
                .copied()
                .unwrap_or(BROWSER_USER_AGENTS[0])
                .to_string(),
        };

        let proxy = self.proxies.choose(&mut *rng).cloned();

        RequestIdentity { user_agent, proxy }
    }

    pub fn mode(&self) -> &UserAgentMode {
        &self.mode
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }
}

/// Splits a comma-separated proxy list, dropping blank entries
pub fn parse_proxy_pool(pool: &str) -> Vec<String> {
    pool.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fixed_mode_always_returns_configured_value() {
        let pool = RotationPool::new(UserAgentMode::Fixed("WeedeaterBot/1.0".to_string()), "");
        for _ in 0..20 {
            assert_eq!(pool.next_identity().user_agent, "WeedeaterBot/1.0");
        }
    }

    #[test]
    fn test_random_mode_draws_from_pool() {
        let pool = RotationPool::new(UserAgentMode::Random, "");
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let identity = pool.next_identity();
            assert!(BROWSER_USER_AGENTS.contains(&identity.user_agent.as_str()));
            seen.insert(identity.user_agent);
        }
        assert!(seen.len() > 1, "Expected rotation across calls");
    }

    #[test]
    fn test_no_proxy_when_unconfigured() {
        let pool = RotationPool::new(UserAgentMode::Random, "");
        assert_eq!(pool.proxy_count(), 0);
        assert_eq!(pool.next_identity().proxy, None);

        let pool = RotationPool::new(UserAgentMode::Random, " , ,");
        assert_eq!(pool.next_identity().proxy, None);
    }

    #[test]
    fn test_proxy_chosen_from_pool() {
        let pool = RotationPool::new(
            UserAgentMode::Random,
            "http://p1.example.net:8080, http://p2.example.net:8080",
        );
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let proxy = pool.next_identity().proxy.unwrap();
            seen.insert(proxy);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen.contains("http://p1.example.net:8080"));
    }

    #[test]
    fn test_seeded_pools_are_reproducible() {
        let a = RotationPool::with_seed(UserAgentMode::Random, "http://a:1,http://b:2", 7);
        let b = RotationPool::with_seed(UserAgentMode::Random, "http://a:1,http://b:2", 7);
        for _ in 0..10 {
            assert_eq!(a.next_identity(), b.next_identity());
        }
    }

    #[test]
    fn test_from_config_falls_back_to_random_without_value() {
        let config = IdentityConfig {
            user_agent_mode: UserAgentModeKind::Fixed,
            fixed_user_agent: None,
            proxy_pool: None,
        };
        let pool = RotationPool::from_config(&config);
        assert_eq!(pool.mode(), &UserAgentMode::Random);
    }

    #[test]
    fn test_concurrent_draws() {
        let pool = std::sync::Arc::new(RotationPool::new(UserAgentMode::Random, "http://a:1"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        assert_eq!(pool.next_identity().proxy.as_deref(), Some("http://a:1"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
