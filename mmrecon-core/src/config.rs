//! Engine configuration and the compiled business-rule pattern tables.
//!
//! Defaults are tuned for East African mobile-money statements. Every knob can
//! be overridden from TOML; the variant set the patterns feed stays fixed.

use anyhow::{Context, Result as AnyResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{ReconError, Result};

/// Accepted timestamp formats, tried in order. First match wins.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
    "%d/%m/%y %I:%M %p",
    "%Y-%m-%d",
    "%d/%m/%Y",
];

/// Upper bound on the exhaustive order search (8! = 40320 permutations).
pub const MAX_PERMUTATION_CAP: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// A predicted balance matches the disclosed one when closer than this
    pub match_tolerance: f64,
    /// Largest same-timestamp batch searched exhaustively
    pub max_permutation_batch: usize,
    /// Fee values above this, followed by a balance starting with '.', are column bleed.
    /// Tied to the magnitudes of the currencies seen so far; revisit for new vendors.
    pub fee_bleed_threshold: f64,
    /// Final divergence strictly below this is Verified
    pub verified_divergence: f64,
    /// Divergence-change ratio strictly below this is a benign gap
    pub benign_change_ratio: f64,
    pub date_formats: Vec<String>,
    pub patterns: PatternConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            match_tolerance: 0.01,
            max_permutation_batch: 6,
            fee_bleed_threshold: 1_000_000.0,
            verified_divergence: 0.01,
            benign_change_ratio: 0.02,
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            patterns: PatternConfig::default(),
        }
    }
}

/// Description patterns driving the business-rule filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub commission: String,
    pub commission_disbursement: String,
    pub deallocation: String,
    pub rollback: String,
    pub reversal: String,
    pub failed: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            commission: r"(?i)commission".to_string(),
            commission_disbursement:
                r"(?i)(commission\s+(disbursement|payout|payment)|business\s+commission)"
                    .to_string(),
            deallocation: r"(?i)de-?allocat".to_string(),
            rollback: r"(?i)roll\s*-?\s*back".to_string(),
            reversal: r"(?i)revers(al|ed)".to_string(),
            failed: r"(?i)(\bfailed\b|insufficient\s+funds)".to_string(),
        }
    }
}

/// Compiled form of [`PatternConfig`].
#[derive(Debug, Clone)]
pub struct RulePatterns {
    pub commission: Regex,
    pub commission_disbursement: Regex,
    pub deallocation: Regex,
    pub rollback: Regex,
    pub reversal: Regex,
    pub failed: Regex,
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ReconError::InvalidPattern { name, source })
}

impl RulePatterns {
    pub fn compile(cfg: &PatternConfig) -> Result<Self> {
        Ok(Self {
            commission: compile("commission", &cfg.commission)?,
            commission_disbursement: compile(
                "commission_disbursement",
                &cfg.commission_disbursement,
            )?,
            deallocation: compile("deallocation", &cfg.deallocation)?,
            rollback: compile("rollback", &cfg.rollback)?,
            reversal: compile("reversal", &cfg.reversal)?,
            failed: compile("failed", &cfg.failed)?,
        })
    }

    /// Process-wide default tables, compiled once and shared read-only.
    pub fn defaults() -> &'static RulePatterns {
        static DEFAULTS: OnceLock<RulePatterns> = OnceLock::new();
        DEFAULTS.get_or_init(|| {
            RulePatterns::compile(&PatternConfig::default()).expect("default rule patterns")
        })
    }
}

impl ReconConfig {
    pub fn from_toml_str(s: &str) -> AnyResult<Self> {
        let cfg: Self = toml::from_str(s).context("parse recon config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a TOML file, or the defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> AnyResult<Self> {
        let p = path.as_ref();
        if !p.exists() {
            return Ok(Self::default());
        }
        let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("load {}", p.display()))
    }

    pub fn to_toml_string(&self) -> AnyResult<String> {
        toml::to_string_pretty(self).context("serialize recon config")
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.match_tolerance > 0.0) {
            return Err(ReconError::Config("match_tolerance must be positive".into()));
        }
        if self.max_permutation_batch == 0 || self.max_permutation_batch > MAX_PERMUTATION_CAP {
            return Err(ReconError::Config(format!(
                "max_permutation_batch must be within 1..={MAX_PERMUTATION_CAP}"
            )));
        }
        if !(self.fee_bleed_threshold > 0.0) {
            return Err(ReconError::Config("fee_bleed_threshold must be positive".into()));
        }
        if !(self.verified_divergence > 0.0) || !(self.benign_change_ratio > 0.0) {
            return Err(ReconError::Config("verdict thresholds must be positive".into()));
        }
        if self.date_formats.is_empty() {
            return Err(ReconError::Config("date_formats must not be empty".into()));
        }
        Ok(())
    }

    /// Compiled patterns; the shared static tables when the defaults are in use.
    pub fn rule_patterns(&self) -> Result<Cow<'static, RulePatterns>> {
        if self.patterns == PatternConfig::default() {
            Ok(Cow::Borrowed(RulePatterns::defaults()))
        } else {
            RulePatterns::compile(&self.patterns).map(Cow::Owned)
        }
    }
}
