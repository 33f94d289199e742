//! Verification classifier: turns divergence metrics into a verdict.

use serde::{Deserialize, Serialize};

use crate::config::ReconConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Verdict {
    #[serde(rename = "verified")]
    Verified,
    /// Residual divergence from few discontinuities, e.g. rows missing on the vendor side.
    #[serde(rename = "needs-additional-verification")]
    NeedsAdditionalVerification,
    /// Pervasive mismatch; more likely deliberate tampering.
    #[serde(rename = "failed-verification")]
    FailedVerification,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Verified => "Verified",
            Verdict::NeedsAdditionalVerification => "Needs Additional Verification",
            Verdict::FailedVerification => "Failed Verification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictThresholds {
    pub verified_divergence: f64,
    pub benign_change_ratio: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            verified_divergence: 0.01,
            benign_change_ratio: 0.02,
        }
    }
}

impl From<&ReconConfig> for VerdictThresholds {
    fn from(cfg: &ReconConfig) -> Self {
        Self {
            verified_divergence: cfg.verified_divergence,
            benign_change_ratio: cfg.benign_change_ratio,
        }
    }
}

/// Fraction of rows at which the divergence changed.
pub fn divergence_change_ratio(change_count: usize, row_count: usize) -> f64 {
    if row_count == 0 {
        return 0.0;
    }
    change_count as f64 / row_count as f64
}

/// Both comparisons are strict: a value exactly at a threshold is not below it.
pub fn classify(final_divergence: f64, change_ratio: f64, t: VerdictThresholds) -> Verdict {
    if final_divergence.abs() < t.verified_divergence {
        Verdict::Verified
    } else if change_ratio < t.benign_change_ratio {
        Verdict::NeedsAdditionalVerification
    } else {
        Verdict::FailedVerification
    }
}
