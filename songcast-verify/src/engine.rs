//! Evaluation of assertions against change notifications

use std::time::{Duration, Instant};

use songcast_lpec::{ChangeNotification, Variable};

use crate::assertion::{Assertion, AssertionStatus};

/// Holds every assertion of a run
///
/// Not shared: exactly one thread owns the engine and feeds it notifications
/// from all monitors in arrival order.
#[derive(Debug, Default)]
pub struct AssertionEngine {
    assertions: Vec<Assertion>,
}

impl AssertionEngine {
    pub fn new(assertions: Vec<Assertion>) -> Self {
        Self { assertions }
    }

    pub fn add(&mut self, assertion: Assertion) {
        self.assertions.push(assertion);
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Check a notification against pending assertions for the same device
    /// and variable; returns the newly met ones
    pub fn on_notification(&mut self, change: &ChangeNotification, now: Instant) -> Vec<&Assertion> {
        self.observe(&change.device_id, change.variable, &change.new_value, now)
    }

    pub fn observe(&mut self, device_id: &str, variable: Variable, value: &str, now: Instant) -> Vec<&Assertion> {
        let mut met = Vec::new();
        for (index, assertion) in self.assertions.iter_mut().enumerate() {
            if assertion.observe(device_id, variable, value, now) {
                met.push(index);
            }
        }
        met.into_iter().map(|index| &self.assertions[index]).collect()
    }

    /// Expire every pending assertion whose deadline is before `now`
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<&Assertion> {
        let mut expired = Vec::new();
        for (index, assertion) in self.assertions.iter_mut().enumerate() {
            if assertion.expire_if_overdue(now) {
                expired.push(index);
            }
        }
        expired.into_iter().map(|index| &self.assertions[index]).collect()
    }

    pub fn pending(&self) -> usize {
        self.count(AssertionStatus::Pending)
    }

    /// True once nothing is pending (vacuously true when empty)
    pub fn all_settled(&self) -> bool {
        self.pending() == 0
    }

    /// The earliest deadline still pending
    pub fn next_deadline(&self) -> Option<Instant> {
        self.assertions
            .iter()
            .filter(|a| a.status() == AssertionStatus::Pending)
            .filter_map(Assertion::deadline)
            .min()
    }

    fn count(&self, status: AssertionStatus) -> usize {
        self.assertions.iter().filter(|a| a.status() == status).count()
    }

    pub fn report(&self) -> VerificationReport {
        VerificationReport {
            outcomes: self
                .assertions
                .iter()
                .map(|a| AssertionOutcome {
                    description: a.to_string(),
                    device_id: a.device_id().to_string(),
                    variable: a.variable(),
                    expected_value: a.expected_value().to_string(),
                    window: a.window(),
                    status: a.status(),
                    elapsed: a.elapsed(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    pub description: String,
    pub device_id: String,
    pub variable: Variable,
    pub expected_value: String,
    pub window: Duration,
    pub status: AssertionStatus,
    pub elapsed: Option<Duration>,
}

/// Final state of every assertion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub outcomes: Vec<AssertionOutcome>,
}

impl VerificationReport {
    pub fn passed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == AssertionStatus::Met)
            .count()
    }

    /// Expired and still-pending assertions both count as failures
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn all_met(&self) -> bool {
        self.failed() == 0
    }
}
