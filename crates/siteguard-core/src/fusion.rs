//! Best-fix arbitration between position providers.
//!
//! Devices report fixes from several providers (GPS, network) that arrive
//! out of order and with very different accuracy. [`evaluate_fix`] decides
//! whether a candidate should replace the held fix; it is a pure function of
//! `(current, candidate, policy)` so the rule set can be tested in isolation.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::PositionFix;
use crate::rules::TrackingRules;

/// Outcome of comparing a candidate fix against the held one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixDecision {
    /// Nothing held yet
    AcceptFirst,
    /// Held fix is older than the staleness window
    AcceptStaleCurrent,
    /// Candidate has a smaller error radius
    AcceptMoreAccurate,
    /// Candidate is newer and at least as accurate
    AcceptNewer,
    /// Candidate is newer, same provider, and within the accuracy margin
    AcceptNewerSameProvider,
    /// Candidate predates the held fix by more than the staleness window
    RejectTooOld,
    /// Candidate is neither newer nor better
    Reject,
}

impl FixDecision {
    pub fn accepted(self) -> bool {
        matches!(
            self,
            FixDecision::AcceptFirst
                | FixDecision::AcceptStaleCurrent
                | FixDecision::AcceptMoreAccurate
                | FixDecision::AcceptNewer
                | FixDecision::AcceptNewerSameProvider
        )
    }
}

/// Parameters of the arbitration rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionPolicy {
    pub staleness_window: Duration,
    pub accuracy_margin_m: f64,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self::from_rules(&TrackingRules::default())
    }
}

impl FusionPolicy {
    pub fn from_rules(rules: &TrackingRules) -> Self {
        Self {
            staleness_window: Duration::milliseconds(rules.staleness_window_ms as i64),
            accuracy_margin_m: rules.accuracy_margin_m,
        }
    }
}

/// Decide whether `candidate` should replace `current`.
pub fn evaluate_fix(
    current: Option<&PositionFix>,
    candidate: &PositionFix,
    policy: &FusionPolicy,
) -> FixDecision {
    let Some(current) = current else {
        return FixDecision::AcceptFirst;
    };

    let time_delta = candidate.timestamp - current.timestamp;
    if time_delta > policy.staleness_window {
        return FixDecision::AcceptStaleCurrent;
    }
    if time_delta < -policy.staleness_window {
        return FixDecision::RejectTooOld;
    }
    let is_newer = time_delta > Duration::zero();

    let accuracy_delta = candidate.accuracy_m - current.accuracy_m;
    let is_less_accurate = accuracy_delta > 0.0;
    let is_more_accurate = accuracy_delta < 0.0;
    let is_significantly_less_accurate = accuracy_delta > policy.accuracy_margin_m;
    let same_provider = candidate.provider == current.provider;

    if is_more_accurate {
        FixDecision::AcceptMoreAccurate
    } else if is_newer && !is_less_accurate {
        FixDecision::AcceptNewer
    } else if is_newer && !is_significantly_less_accurate && same_provider {
        FixDecision::AcceptNewerSameProvider
    } else {
        FixDecision::Reject
    }
}

/// Holds the current best fix for one device.
#[derive(Debug, Clone, Default)]
pub struct LocationFusion {
    policy: FusionPolicy,
    current: Option<PositionFix>,
}

impl LocationFusion {
    pub fn new(policy: FusionPolicy) -> Self {
        Self {
            policy,
            current: None,
        }
    }

    /// Seed with a previously known fix (e.g. loaded from the record store).
    pub fn with_fix(policy: FusionPolicy, fix: Option<PositionFix>) -> Self {
        Self {
            policy,
            current: fix,
        }
    }

    /// Offer a new fix; it replaces the held one only if arbitration accepts it.
    pub fn submit(&mut self, fix: PositionFix) -> FixDecision {
        let decision = evaluate_fix(self.current.as_ref(), &fix, &self.policy);
        if decision.accepted() {
            self.current = Some(fix);
        }
        decision
    }

    pub fn current_best(&self) -> Option<&PositionFix> {
        self.current.as_ref()
    }

    pub fn policy(&self) -> &FusionPolicy {
        &self.policy
    }
}
