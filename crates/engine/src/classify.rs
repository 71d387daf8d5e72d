// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Substring classification of failed attempts
//!
//! Non-auth classes feed the lane gate's backpressure counter; auth
//! failures are actionable by the operator, not by waiting.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    RateLimit,
    Auth,
    Interactive,
    Transient,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::RateLimit => "rate_limit",
            FailureClass::Auth => "auth",
            FailureClass::Interactive => "interactive",
            FailureClass::Transient => "transient",
        }
    }

    /// Auth failures are never treated as backpressure.
    pub fn is_backpressure(&self) -> bool {
        !matches!(self, FailureClass::Auth)
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "too many requests",
    "429",
    "quota exceeded",
    "overloaded",
];

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "401",
    "403",
    "invalid api key",
    "authentication",
    "not logged in",
    "login required",
    "subscription_unverified",
];

const INTERACTIVE_MARKERS: &[&str] = &[
    "waiting for input",
    "interactive prompt",
    "requires a tty",
    "stdin is not a terminal",
    "confirmation required",
];

/// Classify stderr/error text from a failed attempt.
pub fn classify_failure(text: &str) -> FailureClass {
    let lower = text.to_lowercase();
    let hit = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
    if hit(RATE_LIMIT_MARKERS) {
        FailureClass::RateLimit
    } else if hit(AUTH_MARKERS) {
        FailureClass::Auth
    } else if hit(INTERACTIVE_MARKERS) {
        FailureClass::Interactive
    } else {
        FailureClass::Transient
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
