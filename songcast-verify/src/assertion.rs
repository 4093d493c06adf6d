//! Expected (device, variable, value) observations with a deadline

use std::fmt;
use std::time::{Duration, Instant};

use songcast_lpec::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionStatus {
    Pending,
    Met,
    Expired,
}

impl AssertionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AssertionStatus::Pending)
    }
}

impl fmt::Display for AssertionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionStatus::Pending => f.write_str("PENDING"),
            AssertionStatus::Met => f.write_str("PASS"),
            AssertionStatus::Expired => f.write_str("FAIL"),
        }
    }
}

/// One expectation
///
/// The target triple never changes after construction and the status moves
/// at most once, from pending to met or expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    device_id: String,
    variable: Variable,
    expected_value: String,
    started: Instant,
    window: Duration,
    status: AssertionStatus,
    met_at: Option<Instant>,
}

impl Assertion {
    /// Start an assertion at `started`; it expires once `window` has passed
    pub fn new(
        device_id: impl Into<String>,
        variable: Variable,
        expected_value: impl Into<String>,
        window: Duration,
        started: Instant,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            variable,
            expected_value: expected_value.into(),
            started,
            window,
            status: AssertionStatus::Pending,
            met_at: None,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn expected_value(&self) -> &str {
        &self.expected_value
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `None` when the window reaches past what `Instant` can represent
    pub fn deadline(&self) -> Option<Instant> {
        self.started.checked_add(self.window)
    }

    fn overdue_at(&self, at: Instant) -> bool {
        self.deadline().is_some_and(|deadline| at > deadline)
    }

    pub fn status(&self) -> AssertionStatus {
        self.status
    }

    /// Time from start to the matching observation
    pub fn elapsed(&self) -> Option<Duration> {
        self.met_at.map(|at| at.saturating_duration_since(self.started))
    }

    pub fn targets(&self, device_id: &str, variable: Variable) -> bool {
        self.device_id == device_id && self.variable == variable
    }

    /// Offer an observed value; returns true if this moved the assertion to met
    ///
    /// A match that arrives after the deadline expires the assertion instead.
    pub fn observe(&mut self, device_id: &str, variable: Variable, value: &str, at: Instant) -> bool {
        if self.status.is_terminal() || !self.targets(device_id, variable) || value != self.expected_value {
            return false;
        }
        if self.overdue_at(at) {
            self.status = AssertionStatus::Expired;
            return false;
        }
        self.status = AssertionStatus::Met;
        self.met_at = Some(at);
        true
    }

    /// Expire if still pending past the deadline; returns true if it changed
    pub fn expire_if_overdue(&mut self, now: Instant) -> bool {
        if self.status == AssertionStatus::Pending && self.overdue_at(now) {
            self.status = AssertionStatus::Expired;
            return true;
        }
        false
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = '{}' within {:.1}s",
            self.device_id,
            self.variable,
            self.expected_value,
            self.window.as_secs_f64()
        )
    }
}
