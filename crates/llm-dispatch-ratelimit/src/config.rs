//! Limiter configuration.
//!
//! A model's rate constraints are described as an ordered list of
//! [`LimiterSpec`]s. Specs are plain serde-friendly data so applications can
//! keep their per-model limit tables in configuration files.

use llm_dispatch_core::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(86_400);

/// The dimension of a provider limit that one limiter guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LimiterKind {
    /// Requests per minute.
    Rpm,
    /// Requests per day.
    Rpd,
    /// Total tokens (input + output) per minute.
    Tpm,
    /// Total tokens (input + output) per day.
    Tpd,
    /// Input tokens per minute.
    Itpm,
    /// Output tokens per minute.
    Otpm,
    /// Maximum in-flight requests. Not windowed.
    Concurrent,
}

impl LimiterKind {
    /// Returns the default window for this kind, or `None` for kinds that
    /// have no window.
    pub fn default_window(&self) -> Option<Duration> {
        match self {
            LimiterKind::Rpm | LimiterKind::Tpm | LimiterKind::Itpm | LimiterKind::Otpm => {
                Some(MINUTE)
            }
            LimiterKind::Rpd | LimiterKind::Tpd => Some(DAY),
            LimiterKind::Concurrent => None,
        }
    }

    /// Returns true for kinds whose cost is counted in tokens.
    pub fn is_token(&self) -> bool {
        matches!(
            self,
            LimiterKind::Tpm | LimiterKind::Tpd | LimiterKind::Itpm | LimiterKind::Otpm
        )
    }

    /// Returns true for kinds that count admissions in a rolling window.
    pub fn is_windowed(&self) -> bool {
        !matches!(self, LimiterKind::Concurrent)
    }

    /// Short lowercase name used in errors and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterKind::Rpm => "rpm",
            LimiterKind::Rpd => "rpd",
            LimiterKind::Tpm => "tpm",
            LimiterKind::Tpd => "tpd",
            LimiterKind::Itpm => "itpm",
            LimiterKind::Otpm => "otpm",
            LimiterKind::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a single limiter in a model's chain.
///
/// Duplicate kinds within one chain are legal and additive: a request must
/// satisfy every spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterSpec {
    /// Which dimension this limiter guards.
    pub kind: LimiterKind,
    /// Maximum cost admitted per window (or maximum in-flight requests for
    /// [`LimiterKind::Concurrent`]).
    pub limit: u64,
    /// Window override. `None` means the kind's default window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Duration>,
}

impl LimiterSpec {
    /// Creates a spec with the kind's default window.
    pub fn new(kind: LimiterKind, limit: u64) -> Self {
        Self {
            kind,
            limit,
            window: None,
        }
    }

    /// Requests per minute.
    pub fn rpm(limit: u64) -> Self {
        Self::new(LimiterKind::Rpm, limit)
    }

    /// Requests per day.
    pub fn rpd(limit: u64) -> Self {
        Self::new(LimiterKind::Rpd, limit)
    }

    /// Total tokens per minute.
    pub fn tpm(limit: u64) -> Self {
        Self::new(LimiterKind::Tpm, limit)
    }

    /// Total tokens per day.
    pub fn tpd(limit: u64) -> Self {
        Self::new(LimiterKind::Tpd, limit)
    }

    /// Input tokens per minute.
    pub fn itpm(limit: u64) -> Self {
        Self::new(LimiterKind::Itpm, limit)
    }

    /// Output tokens per minute.
    pub fn otpm(limit: u64) -> Self {
        Self::new(LimiterKind::Otpm, limit)
    }

    /// Maximum in-flight requests.
    pub fn concurrent(limit: u64) -> Self {
        Self::new(LimiterKind::Concurrent, limit)
    }

    /// Overrides the window. Ignored by [`LimiterKind::Concurrent`].
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    /// The window this spec resolves to, or `None` for unwindowed kinds.
    pub fn effective_window(&self) -> Option<Duration> {
        if self.kind.is_windowed() {
            self.window.or_else(|| self.kind.default_window())
        } else {
            None
        }
    }

    /// Validates the spec: `limit >= 1`, and a nonzero window for windowed
    /// kinds.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(DispatchError::InvalidConfig {
                reason: format!("{} limiter requires limit >= 1", self.kind),
            });
        }
        if self.kind.is_windowed() {
            // effective_window is Some for every windowed kind
            let window = self.effective_window().unwrap_or(MINUTE);
            if window.is_zero() {
                return Err(DispatchError::InvalidConfig {
                    reason: format!("{} limiter requires a nonzero window", self.kind),
                });
            }
        }
        Ok(())
    }
}
