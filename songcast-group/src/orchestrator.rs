//! Sequencing joins across one sender and its receivers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::NameCache;
use crate::control::DeviceControl;
use crate::device::{ReceiverState, SourceInfo};
use crate::error::JoinError;
use crate::join::{read_receiver_state, JoinResult, JoinStateMachine};
use crate::policy::JoinConfig;

#[derive(Debug, Clone, Default)]
pub struct GroupConfig {
    pub join: JoinConfig,
    /// Switch the sender to its Songcast sender source before joining
    pub prepare_sender_source: bool,
}

/// One receiver's line in the final summary
#[derive(Debug, Clone)]
pub struct ReceiverReport {
    pub result: JoinResult,
    pub display_name: String,
    /// Source selected after the join, if it could be read
    pub source: Option<SourceInfo>,
    /// Independent re-read of the receiver after the join
    pub verified: Option<ReceiverState>,
}

impl ReceiverReport {
    pub fn verified_grouped(&self) -> bool {
        self.verified.as_ref().is_some_and(|state| state.grouped)
    }
}

#[derive(Debug, Clone)]
pub struct GroupReport {
    pub sender_id: String,
    pub sender_name: String,
    pub sender_awake: bool,
    /// The sender source selected when preparation was requested and succeeded
    pub sender_source: Option<SourceInfo>,
    pub receivers: Vec<ReceiverReport>,
}

impl GroupReport {
    pub fn all_joined(&self) -> bool {
        self.receivers.iter().all(|r| r.result.joined)
    }

    pub fn joined_count(&self) -> usize {
        self.receivers.iter().filter(|r| r.result.joined).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReceiverReport> {
        self.receivers.iter().filter(|r| !r.result.joined)
    }
}

/// Runs the join state machine for each receiver, one at a time
///
/// Failures are per receiver: one receiver failing never stops the others.
pub struct GroupOrchestrator {
    config: GroupConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl GroupOrchestrator {
    pub fn new(config: GroupConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Receivers not yet started when `flag` is set are reported as cancelled
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn run(&self, sender: &dyn DeviceControl, receivers: &[&dyn DeviceControl]) -> GroupReport {
        let mut names = NameCache::new();
        let sender_name = names.display_name(sender);
        tracing::info!(sender = %sender.device().token, "sender: {} ({})", sender_name, sender.device().host());

        let sender_awake = match sender.set_standby(false) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(sender = %sender.device().token, "could not wake sender: {}", e);
                false
            }
        };
        self.config.join.settle();

        let sender_source = if self.config.prepare_sender_source {
            let source = prepare_sender_source(sender);
            self.config.join.settle();
            source
        } else {
            None
        };

        let mut reports = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            let display_name = names.display_name(*receiver);

            if self.cancelled() {
                tracing::warn!(receiver = %receiver.device().token, "cancelled before join");
                reports.push(ReceiverReport {
                    result: JoinResult {
                        receiver_id: receiver.device().token.clone(),
                        joined: false,
                        final_candidate: None,
                        attempts: 0,
                        skipped: false,
                        final_sender: None,
                        error: Some(JoinError::Cancelled),
                    },
                    display_name,
                    source: None,
                    verified: None,
                });
                continue;
            }

            tracing::info!(receiver = %receiver.device().token, "configuring {} ({})", display_name, receiver.device().host());
            let result = JoinStateMachine::new(&self.config.join).run(*receiver, sender, &mut names);
            reports.push(verify(*receiver, result, display_name));
        }

        let report = GroupReport {
            sender_id: sender.device().token.clone(),
            sender_name,
            sender_awake,
            sender_source,
            receivers: reports,
        };
        tracing::info!(
            "{}/{} receiver(s) joined {}",
            report.joined_count(),
            report.receivers.len(),
            report.sender_id
        );
        report
    }
}

/// Select the first visible Songcast sender source on `sender`
pub fn prepare_sender_source(sender: &dyn DeviceControl) -> Option<SourceInfo> {
    let token = &sender.device().token;
    match sender.find_source(&SourceInfo::is_songcast_sender) {
        Ok(Some(source)) => match sender.set_source_index(source.index) {
            Ok(()) => {
                tracing::info!(sender = %token, "switched to {}", source);
                Some(source)
            }
            Err(e) => {
                tracing::warn!(sender = %token, "could not select {}: {}", source, e);
                None
            }
        },
        Ok(None) => {
            tracing::warn!(sender = %token, "no Songcast sender source found, leaving source unchanged");
            None
        }
        Err(e) => {
            tracing::warn!(sender = %token, "could not list sources: {}", e);
            None
        }
    }
}

fn verify(receiver: &dyn DeviceControl, result: JoinResult, display_name: String) -> ReceiverReport {
    let token = &receiver.device().token;
    let source = match receiver.current_source() {
        Ok(source) => {
            tracing::info!(receiver = %token, "current source: {}", source);
            Some(source)
        }
        Err(e) => {
            tracing::debug!(receiver = %token, "current source unknown: {}", e);
            None
        }
    };

    let verified = match read_receiver_state(receiver, source.as_ref()) {
        Ok(state) => {
            if state.grouped {
                tracing::info!(receiver = %token, "verified grouped (transport {})", state.transport);
            } else {
                tracing::warn!(receiver = %token, "not grouped (transport {}, no direct-multicast sender)", state.transport);
            }
            Some(state)
        }
        Err(e) => {
            tracing::warn!(receiver = %token, "verification read failed: {}", e);
            None
        }
    };

    ReceiverReport {
        result,
        display_name,
        source,
        verified,
    }
}
