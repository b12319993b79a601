//! Counter token: the persisted state of one convergence cycle.
//!
//! Grammar:
//! ```text
//! (enabled|disabled)_increment_<n>[_success]
//! ```
//! `n` is a non-negative integer without leading zeros, so parsing and
//! re-formatting an untouched token always reproduces the stored string.

use crate::error::SignalerError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"^(enabled|disabled)_increment_(0|[1-9][0-9]*)(_success)?$").unwrap()
    })
}

// ---------------------------------------------------------------------------
// CounterFlag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterFlag {
    Enabled,
    Disabled,
}

impl CounterFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            CounterFlag::Enabled => "enabled",
            CounterFlag::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CounterFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CounterToken
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterToken {
    pub flag: CounterFlag,
    pub attempts: u32,
    pub success: bool,
}

impl CounterToken {
    /// `enabled_increment_0`: the value written by every bootstrap and reset.
    pub const INITIAL: CounterToken = CounterToken {
        flag: CounterFlag::Enabled,
        attempts: 0,
        success: false,
    };

    pub fn is_enabled(&self) -> bool {
        self.flag == CounterFlag::Enabled
    }

    /// One more failed observation. The success marker is never carried over.
    pub fn incremented(self) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            success: false,
            ..self
        }
    }

    /// Record a healthy observation without consuming an attempt.
    pub fn with_success(self) -> Self {
        Self {
            success: true,
            ..self
        }
    }

    pub fn reached(&self, threshold: u32) -> bool {
        self.attempts >= threshold
    }
}

impl Default for CounterToken {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for CounterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_increment_{}", self.flag, self.attempts)?;
        if self.success {
            f.write_str("_success")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for CounterToken {
    type Err = SignalerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = token_re()
            .captures(s)
            .ok_or_else(|| SignalerError::InvalidToken(s.to_string()))?;
        let flag = match &caps[1] {
            "enabled" => CounterFlag::Enabled,
            _ => CounterFlag::Disabled,
        };
        let attempts = caps[2]
            .parse::<u32>()
            .map_err(|_| SignalerError::InvalidToken(s.to_string()))?;
        Ok(CounterToken {
            flag,
            attempts,
            success: caps.get(3).is_some(),
        })
    }
}

impl Serialize for CounterToken {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CounterToken {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> CounterToken {
        s.parse().unwrap()
    }

    #[test]
    fn initial_token_string() {
        assert_eq!(CounterToken::INITIAL.to_string(), "enabled_increment_0");
        assert_eq!(CounterToken::default(), CounterToken::INITIAL);
    }

    #[test]
    fn parses_all_fields() {
        let t = parse("disabled_increment_12_success");
        assert_eq!(t.flag, CounterFlag::Disabled);
        assert_eq!(t.attempts, 12);
        assert!(t.success);

        let t = parse("enabled_increment_3");
        assert!(t.is_enabled());
        assert_eq!(t.attempts, 3);
        assert!(!t.success);
    }

    #[test]
    fn untouched_tokens_reformat_identically() {
        for raw in [
            "enabled_increment_0",
            "enabled_increment_0_success",
            "enabled_increment_41",
            "disabled_increment_7",
            "disabled_increment_2_success",
        ] {
            assert_eq!(parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn rejects_malformed_tokens() {
        for raw in [
            "",
            "enabled",
            "enabled_increment_",
            "enabled_increment_-1",
            "enabled_increment_01",
            "paused_increment_1",
            "enabled_increment_1_success_success",
            "enabled_increment_1_done",
            " enabled_increment_1",
            "enabled_increment_99999999999",
        ] {
            let err = raw.parse::<CounterToken>().unwrap_err();
            assert!(
                matches!(err, SignalerError::InvalidToken(ref t) if t == raw),
                "expected InvalidToken for {raw:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn increment_keeps_flag_and_drops_success() {
        let t = parse("enabled_increment_4_success").incremented();
        assert_eq!(t.to_string(), "enabled_increment_5");
    }

    #[test]
    fn success_marker_keeps_count() {
        let t = parse("enabled_increment_4").with_success();
        assert_eq!(t.to_string(), "enabled_increment_4_success");
    }

    #[test]
    fn threshold_counts_attempts_already_made() {
        let t = parse("enabled_increment_2");
        assert!(t.reached(2));
        assert!(!t.reached(3));
        assert!(CounterToken::INITIAL.reached(0));
    }

    #[test]
    fn serde_uses_string_form() {
        let t = parse("enabled_increment_1_success");
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"enabled_increment_1_success\"");
        let back: CounterToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<CounterToken>("\"nope\"").is_err());
    }
}
