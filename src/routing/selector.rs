//! Backend selection from a classification and a registry snapshot.
//!
//! Leader-classified requests go to the leader or nowhere: a write must never
//! land on a replica. Everything else prefers `follower_1` and falls back to
//! the leader.

use serde::Serialize;

use crate::registry::{Registry, LEADER_KEY};

/// Key of the follower that serves reads.
pub const READ_FOLLOWER_KEY: &str = "follower_1";

/// How a backend was (or was not) chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    Leader,
    FollowerWithFallback,
    Unavailable,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteReason::Leader => "leader",
            RouteReason::FollowerWithFallback => "follower_with_fallback",
            RouteReason::Unavailable => "unavailable",
        }
    }
}

/// Outcome of backend selection for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub backend: Option<String>,
    pub reason: RouteReason,
}

/// Resolve a backend address, or `None` if the request cannot be served.
pub fn select(use_leader: bool, registry: &Registry) -> Option<String> {
    let address = if use_leader {
        registry.get(LEADER_KEY)
    } else {
        registry.get(READ_FOLLOWER_KEY).or_else(|| registry.get(LEADER_KEY))
    };
    address.map(str::to_owned)
}

/// [`select`] plus the reason, for logging and metrics.
pub fn route(use_leader: bool, registry: &Registry) -> RouteDecision {
    let backend = select(use_leader, registry);
    let reason = match (&backend, use_leader) {
        (None, _) => RouteReason::Unavailable,
        (Some(_), true) => RouteReason::Leader,
        (Some(_), false) => RouteReason::FollowerWithFallback,
    };
    RouteDecision { backend, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEADER: &str = "10.0.1.10:12346";
    const FOLLOWER: &str = "10.0.1.11:12346";

    fn registry(pairs: &[(&str, &str)]) -> Registry {
        Registry::from_map(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())), 1).unwrap()
    }

    #[test]
    fn leader_requests_never_use_follower() {
        // Every combination of absent / empty / present for both keys.
        let states = [None, Some(""), Some("x")];
        for leader in states {
            for follower in states {
                let mut pairs = Vec::new();
                if let Some(v) = leader {
                    pairs.push(("leader", if v == "x" { LEADER } else { v }));
                }
                if let Some(v) = follower {
                    pairs.push(("follower_1", if v == "x" { FOLLOWER } else { v }));
                }
                let r = registry(&pairs);

                let expected_leader = r.leader().map(str::to_owned);
                assert_eq!(select(true, &r), expected_leader);

                let expected_read = r.follower(1).or(r.leader()).map(str::to_owned);
                assert_eq!(select(false, &r), expected_read);
            }
        }
    }

    #[test]
    fn empty_registry_is_unavailable() {
        let r = Registry::empty();
        assert_eq!(route(true, &r), RouteDecision { backend: None, reason: RouteReason::Unavailable });
        assert_eq!(route(false, &r), RouteDecision { backend: None, reason: RouteReason::Unavailable });
    }

    #[test]
    fn write_with_leader() {
        let r = registry(&[("leader", LEADER), ("follower_1", FOLLOWER)]);
        let decision = route(true, &r);
        assert_eq!(decision.backend.as_deref(), Some(LEADER));
        assert_eq!(decision.reason, RouteReason::Leader);
    }

    #[test]
    fn write_without_leader_is_unavailable() {
        let r = registry(&[("follower_1", FOLLOWER)]);
        assert_eq!(route(true, &r).reason, RouteReason::Unavailable);
    }

    #[test]
    fn read_prefers_follower() {
        let r = registry(&[("leader", LEADER), ("follower_1", FOLLOWER)]);
        let decision = route(false, &r);
        assert_eq!(decision.backend.as_deref(), Some(FOLLOWER));
        assert_eq!(decision.reason, RouteReason::FollowerWithFallback);
    }

    #[test]
    fn read_falls_back_to_leader_on_empty_follower() {
        let r = registry(&[("leader", LEADER), ("follower_1", "")]);
        assert_eq!(select(false, &r).as_deref(), Some(LEADER));
    }

    #[test]
    fn only_first_follower_serves_reads() {
        let r = registry(&[("leader", LEADER), ("follower_2", FOLLOWER)]);
        assert_eq!(select(false, &r).as_deref(), Some(LEADER));
    }
}
