//! Time-bounded assertions over device state changes
//!
//! A [`TestPlan`] is loaded from JSON and started into [`Assertion`]s just
//! before monitoring begins. The [`Verifier`] owns the [`AssertionEngine`] and
//! drains the single channel every event monitor publishes into.
//!
//! ```no_run
//! use std::sync::{atomic::AtomicBool, mpsc, Arc};
//! use std::time::Instant;
//! use songcast_verify::{AssertionEngine, TestPlan, Verifier, VerifierConfig};
//!
//! let plan = TestPlan::load("join.json".as_ref())?;
//! let engine = AssertionEngine::new(plan.start(Instant::now()));
//! let (tx, rx) = mpsc::channel();
//! let verifier = Verifier::new(engine, VerifierConfig::default(), Arc::new(AtomicBool::new(false)));
//! let handle = verifier.spawn(rx)?;
//! // hand `tx` clones to each EventMonitor...
//! drop(tx);
//! let outcome = handle.join().expect("verifier panicked");
//! println!("{} passed, {} failed", outcome.report.passed(), outcome.report.failed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assertion;
pub mod engine;
pub mod error;
pub mod plan;
pub mod verifier;

pub use assertion::{Assertion, AssertionStatus};
pub use engine::{AssertionEngine, AssertionOutcome, VerificationReport};
pub use error::{PlanError, Result};
pub use plan::{AssertionDef, TestPlan, DEFAULT_WITHIN_SECONDS, MAX_WITHIN_SECONDS};
pub use verifier::{FinishReason, Verifier, VerifierConfig, VerifierOutcome};
