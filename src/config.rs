//! Binder and bridge options.
//!
//! Defaults reproduce the lenient behavior: ties between equally specific
//! candidates go to the first declared one, and cross-thread invocations wait
//! without a deadline. Both can be overridden from the environment:
//!
//! - `CROSSBIND_AMBIGUITY` = `first` | `reject`
//! - `CROSSBIND_INVOKE_TIMEOUT_MS` = milliseconds (`0` or `none` disables)

use std::env;
use std::fmt;
use std::time::Duration;

pub const AMBIGUITY_ENV: &str = "CROSSBIND_AMBIGUITY";
pub const INVOKE_TIMEOUT_ENV: &str = "CROSSBIND_INVOKE_TIMEOUT_MS";

/// What to do when two best candidates remain mutually undominated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Pick the candidate that appears first in the member list.
    #[default]
    FirstDeclared,
    /// Fail with `BindError::AmbiguousMatch`.
    Reject,
}

impl AmbiguityPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" | "first-declared" | "lenient" => Some(Self::FirstDeclared),
            "reject" | "strict" | "error" => Some(Self::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AmbiguityPolicy::FirstDeclared => "first",
            AmbiguityPolicy::Reject => "reject",
        })
    }
}

/// Options for cross-thread callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Give up on a cross-thread invocation after this long.
    pub invoke_timeout: Option<Duration>,
    /// While an owning thread blocks on another thread's bridge, keep
    /// dispatching invocations queued for its own callbacks.
    pub service_own_queue_while_blocked: bool,
}

impl BridgeOptions {
    pub const DEFAULT: Self = Self {
        invoke_timeout: None,
        service_own_queue_while_blocked: true,
    };

    #[must_use]
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn from_env() -> Self {
        let timeout = env::var(INVOKE_TIMEOUT_ENV).ok();
        apply_bridge_overrides(Self::DEFAULT, timeout.as_deref())
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Options for the binder surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinderOptions {
    pub ambiguity: AmbiguityPolicy,
    pub bridge: BridgeOptions,
}

impl BinderOptions {
    #[must_use]
    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    #[must_use]
    pub fn from_env() -> Self {
        let ambiguity = env::var(AMBIGUITY_ENV).ok();
        Self {
            ambiguity: ambiguity
                .as_deref()
                .and_then(AmbiguityPolicy::parse)
                .unwrap_or_default(),
            bridge: BridgeOptions::from_env(),
        }
    }
}

fn parse_timeout(value: &str) -> Option<Option<Duration>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    match value.parse::<u64>().ok()? {
        0 => Some(None),
        ms => Some(Some(Duration::from_millis(ms))),
    }
}

fn apply_bridge_overrides(mut options: BridgeOptions, timeout: Option<&str>) -> BridgeOptions {
    if let Some(parsed) = timeout.and_then(parse_timeout) {
        options.invoke_timeout = parsed;
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguity_policy_parses_expected_values() {
        assert_eq!(
            AmbiguityPolicy::parse("first"),
            Some(AmbiguityPolicy::FirstDeclared)
        );
        assert_eq!(
            AmbiguityPolicy::parse("REJECT"),
            Some(AmbiguityPolicy::Reject)
        );
        assert_eq!(
            AmbiguityPolicy::parse(" strict "),
            Some(AmbiguityPolicy::Reject)
        );
        assert_eq!(AmbiguityPolicy::parse("maybe"), None);
        assert_eq!(AmbiguityPolicy::Reject.to_string(), "reject");
    }

    #[test]
    fn defaults_are_lenient() {
        let options = BinderOptions::default();
        assert_eq!(options.ambiguity, AmbiguityPolicy::FirstDeclared);
        assert_eq!(options.bridge.invoke_timeout, None);
        assert!(options.bridge.service_own_queue_while_blocked);
    }

    #[test]
    fn timeout_override() {
        let opts = apply_bridge_overrides(BridgeOptions::DEFAULT, Some("250"));
        assert_eq!(opts.invoke_timeout, Some(Duration::from_millis(250)));

        let opts = apply_bridge_overrides(opts, Some("none"));
        assert_eq!(opts.invoke_timeout, None);

        let base = BridgeOptions::DEFAULT.with_invoke_timeout(Duration::from_secs(1));
        assert_eq!(apply_bridge_overrides(base, Some("0")).invoke_timeout, None);
        assert_eq!(apply_bridge_overrides(base, Some("soon")), base);
        assert_eq!(apply_bridge_overrides(base, None), base);
    }
}
