//! Escalation state and the result → color mapping.

use std::collections::HashMap;

use tracing::warn;

use ledwatch_core::{CheckResult, Color, MethodFamily, ServiceSpec};

/// Tracks consecutive probe failures for a single service.
#[derive(Debug, Default, Clone)]
pub struct EscalationTracker {
    consecutive_failures: u32,
}

impl EscalationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a result into the tracker.
    ///
    /// Only the probe family escalates: `Ok` resets the count, `Fail`
    /// bumps it. Everything else leaves it untouched.
    pub fn apply(&mut self, family: MethodFamily, result: CheckResult) {
        if family != MethodFamily::Probe {
            return;
        }
        match result {
            CheckResult::Ok => self.consecutive_failures = 0,
            CheckResult::Fail => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
            CheckResult::Pending | CheckResult::Maintenance | CheckResult::Placeholder => {}
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Color for a result, given the tracker state after [`EscalationTracker::apply`].
pub fn color_for(family: MethodFamily, result: CheckResult, tracker: &EscalationTracker) -> Color {
    match (family, result) {
        (MethodFamily::Placeholder, _) | (_, CheckResult::Placeholder) => Color::OFF,
        (MethodFamily::Probe, CheckResult::Ok) => Color::CYAN,
        (MethodFamily::Probe, CheckResult::Fail) => {
            if tracker.consecutive_failures() <= 1 {
                Color::YELLOW
            } else {
                Color::RED
            }
        }
        (_, result) => remote_color(result),
    }
}

/// Direct mapping of the remote monitor's vocabulary.
fn remote_color(result: CheckResult) -> Color {
    match result {
        CheckResult::Ok => Color::CYAN,
        CheckResult::Pending => Color::YELLOW,
        CheckResult::Maintenance => Color::BLUE,
        CheckResult::Fail => Color::RED,
        CheckResult::Placeholder => Color::OFF,
    }
}

/// Escalation state for every configured service, keyed by name.
#[derive(Debug, Default)]
pub struct StatusBoard {
    trackers: HashMap<String, EscalationTracker>,
}

impl StatusBoard {
    /// Start every service at zero failures.
    pub fn new(services: &[ServiceSpec]) -> Self {
        let trackers = services
            .iter()
            .map(|s| (s.name.clone(), EscalationTracker::new()))
            .collect();
        Self { trackers }
    }

    /// Apply a result for `service` and return the color to render.
    pub fn record(&mut self, service: &ServiceSpec, result: CheckResult) -> Color {
        let family = service.family();
        let tracker = self.trackers.entry(service.name.clone()).or_default();
        tracker.apply(family, result);
        if family == MethodFamily::Probe
            && result == CheckResult::Fail
            && tracker.consecutive_failures() == 2
        {
            warn!(service = %service.name, "repeated failure, escalating to red");
        }
        color_for(family, result, tracker)
    }

    pub fn consecutive_failures(&self, name: &str) -> Option<u32> {
        self.trackers.get(name).map(EscalationTracker::consecutive_failures)
    }
}
