//! Actor identity and trust model.

use serde::{Deserialize, Serialize};

/// Whether a person or an automation drives the release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Human,
    Ci,
}

/// Privilege tier of an actor. Ordered `Limited < Trusted < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Limited,
    Trusted,
    Full,
}

impl TrustLevel {
    /// Numeric ordinal exposed to policy guards.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Limited => 0,
            Self::Trusted => 1,
            Self::Full => 2,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "limited" => Some(Self::Limited),
            "trusted" => Some(Self::Trusted),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limited => write!(f, "limited"),
            Self::Trusted => write!(f, "trusted"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Environment variables that signal a CI runner.
const CI_MARKERS: &[&str] = &["CI", "GITHUB_ACTIONS", "GITLAB_CI", "BUILDKITE", "JENKINS_URL"];

/// Whoever is driving a release action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub kind: ActorKind,
    pub name: String,
    pub trust_level: TrustLevel,
}

impl Actor {
    pub fn new(
        id: impl Into<String>,
        kind: ActorKind,
        name: impl Into<String>,
        trust_level: TrustLevel,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            trust_level,
        }
    }

    pub fn human(id: impl Into<String>, trust_level: TrustLevel) -> Self {
        let id = id.into();
        Self::new(id.clone(), ActorKind::Human, id, trust_level)
    }

    pub fn ci(id: impl Into<String>, trust_level: TrustLevel) -> Self {
        let id = id.into();
        Self::new(id.clone(), ActorKind::Ci, id, trust_level)
    }

    /// Resolve the actor from environment signals supplied by `lookup`.
    ///
    /// CI runners resolve to `Ci` with `Trusted`; anything else is a
    /// `Trusted` human named after `USER`/`USERNAME`. `HELMSMAN_ACTOR_TRUST`
    /// overrides the trust level when it names a known level.
    pub fn from_env_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let is_ci = CI_MARKERS
            .iter()
            .any(|key| non_empty(key).is_some_and(|v| v != "false" && v != "0"));

        let mut actor = if is_ci {
            let id = non_empty("GITHUB_ACTOR")
                .or_else(|| non_empty("GITLAB_USER_LOGIN"))
                .or_else(|| non_empty("CI_RUNNER"))
                .unwrap_or_else(|| "ci".to_string());
            Actor::ci(id, TrustLevel::Trusted)
        } else {
            let id = non_empty("USER")
                .or_else(|| non_empty("USERNAME"))
                .unwrap_or_else(|| "unknown".to_string());
            Actor::human(id, TrustLevel::Trusted)
        };

        if let Some(level) = non_empty("HELMSMAN_ACTOR_TRUST").and_then(|v| TrustLevel::parse(&v)) {
            actor.trust_level = level;
        }
        actor
    }

    /// Resolve the actor from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_vars(|key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_trust_ordering() {
        assert!(TrustLevel::Limited < TrustLevel::Trusted);
        assert!(TrustLevel::Trusted < TrustLevel::Full);
        assert_eq!(TrustLevel::Full.ordinal(), 2);
    }

    #[test]
    fn test_ci_detection() {
        let actor = Actor::from_env_vars(env(&[("GITHUB_ACTIONS", "true"), ("GITHUB_ACTOR", "octo")]));
        assert_eq!(actor.kind, ActorKind::Ci);
        assert_eq!(actor.id, "octo");
        assert_eq!(actor.trust_level, TrustLevel::Trusted);
    }

    #[test]
    fn test_ci_false_is_human() {
        let actor = Actor::from_env_vars(env(&[("CI", "false"), ("USER", "dana")]));
        assert_eq!(actor.kind, ActorKind::Human);
        assert_eq!(actor.id, "dana");
    }

    #[test]
    fn test_trust_override() {
        let actor = Actor::from_env_vars(env(&[("USER", "dana"), ("HELMSMAN_ACTOR_TRUST", "limited")]));
        assert_eq!(actor.trust_level, TrustLevel::Limited);

        let actor = Actor::from_env_vars(env(&[("USER", "dana"), ("HELMSMAN_ACTOR_TRUST", "root")]));
        assert_eq!(actor.trust_level, TrustLevel::Trusted);
    }

    #[test]
    fn test_unknown_user() {
        let actor = Actor::from_env_vars(env(&[]));
        assert_eq!(actor.id, "unknown");
        assert_eq!(actor.kind, ActorKind::Human);
    }
}
