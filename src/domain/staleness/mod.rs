//! Staleness domain - how far a rebuilt quote drifted from what the user saw

use rust_decimal::Decimal;

use crate::domain::quote::{BuildData, ChangeSeverity, OutputChange, TradeEstimate};
use crate::shared::errors::ConfigError;
use crate::shared::utils::calculate_percentage_change;

/// Output-drop thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessPolicy {
    /// Drops below this are LOW.
    pub low_below_pct: Decimal,
    /// Drops below this (and at least `low_below_pct`) are MEDIUM; the rest HIGH.
    pub medium_below_pct: Decimal,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            low_below_pct: Decimal::new(1, 1),
            medium_below_pct: Decimal::ONE,
        }
    }
}

impl StalenessPolicy {
    pub fn new(low_below_pct: Decimal, medium_below_pct: Decimal) -> Result<Self, ConfigError> {
        if low_below_pct <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "staleness.low_below_pct",
                reason: "must be positive".to_string(),
            });
        }
        if medium_below_pct < low_below_pct {
            return Err(ConfigError::Invalid {
                field: "staleness.medium_below_pct",
                reason: format!("must be at least low_below_pct ({})", low_below_pct),
            });
        }
        Ok(Self { low_below_pct, medium_below_pct })
    }

    /// Severity of a drop of `drop_pct` percent (positive magnitude).
    pub fn severity_for_drop(&self, drop_pct: Decimal) -> ChangeSeverity {
        if drop_pct <= Decimal::ZERO {
            ChangeSeverity::None
        } else if drop_pct < self.low_below_pct {
            ChangeSeverity::Low
        } else if drop_pct < self.medium_below_pct {
            ChangeSeverity::Medium
        } else {
            ChangeSeverity::High
        }
    }
}

/// Compares rebuilt outputs against the displayed estimate.
#[derive(Debug, Clone, Default)]
pub struct StalenessGuard {
    policy: StalenessPolicy,
}

impl StalenessGuard {
    pub fn new(policy: StalenessPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    /// `None` unless the output got worse. Depends only on the two amounts.
    pub fn classify(&self, previous: &TradeEstimate, next: &BuildData) -> Option<OutputChange> {
        if next.amount_out >= previous.amount_out {
            return None;
        }

        let percent = calculate_percentage_change(previous.amount_out, next.amount_out);
        let amount = -((previous.amount_out - next.amount_out).min(i128::MAX as u128) as i128);
        // A real drop is never graded NONE, however small its percentage.
        let level = self.policy.severity_for_drop(-percent).max(ChangeSeverity::Low);
        Some(OutputChange { amount, percent, level })
    }

    /// Embeds the local classification into `build`. Without a baseline the
    /// service's own `output_change` is kept.
    pub fn reconcile(&self, previous: Option<&TradeEstimate>, mut build: BuildData) -> BuildData {
        if let Some(previous) = previous {
            build.output_change = self.classify(previous, &build);
        }
        build
    }
}
