//! Per-receiver join state machine
//!
//! ```text
//! Idle -> Woken -> SourceSelected -> Joining -> Grouped | NotGrouped
//!            \______________________/
//!          (no Songcast source found)
//! ```
//!
//! Every run ends in exactly one terminal phase. The work is bounded by the
//! number of candidates times the poll policy's attempts.

use crate::cache::NameCache;
use crate::control::DeviceControl;
use crate::device::{ReceiverState, SenderCandidate, SenderScheme, SourceInfo};
use crate::error::{DeviceError, JoinError, Result};
use crate::policy::JoinConfig;
use crate::resolver::CandidateResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPhase {
    Idle,
    Woken,
    SourceSelected,
    Joining,
    Grouped,
    NotGrouped,
}

impl JoinPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JoinPhase::Grouped | JoinPhase::NotGrouped)
    }
}

/// Outcome of one receiver's join, produced once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResult {
    /// Config token of the receiver
    pub receiver_id: String,
    pub joined: bool,
    /// The accepted candidate, if any
    pub final_candidate: Option<SenderCandidate>,
    /// Candidates applied; the already-joined check counts as one
    pub attempts: u32,
    /// The receiver was already grouped with this sender, nothing was changed
    pub skipped: bool,
    /// Sender reference read back from the receiver at the end
    pub final_sender: Option<String>,
    pub error: Option<JoinError>,
}

/// Read transport state and sender reference and derive `grouped`
///
/// A failed transport read is an error. A failed sender read counts as "no
/// reference", which leaves the decision to the transport state.
pub fn read_receiver_state(receiver: &dyn DeviceControl, source: Option<&SourceInfo>) -> Result<ReceiverState> {
    let transport = receiver.transport_state()?;
    let sender_uri = match receiver.receiver_sender() {
        Ok(sender) => sender.uri,
        Err(e) => {
            tracing::debug!(receiver = %receiver.device().token, "sender read failed: {}", e);
            String::new()
        }
    };
    Ok(ReceiverState::new(source, transport, sender_uri))
}

/// Whether a poll result means `candidate` has taken
///
/// A direct-multicast candidate with an active transport is accepted even if
/// the derived flag has not caught up yet.
fn converged(candidate: &SenderCandidate, state: &ReceiverState) -> bool {
    state.grouped || (candidate.scheme == SenderScheme::DirectMulticast && state.transport.is_active())
}

pub struct JoinStateMachine<'a> {
    config: &'a JoinConfig,
    phase: JoinPhase,
    history: Vec<JoinPhase>,
}

impl<'a> JoinStateMachine<'a> {
    pub fn new(config: &'a JoinConfig) -> Self {
        Self {
            config,
            phase: JoinPhase::Idle,
            history: vec![JoinPhase::Idle],
        }
    }

    pub fn phase(&self) -> JoinPhase {
        self.phase
    }

    /// Every phase entered so far, in order
    pub fn history(&self) -> &[JoinPhase] {
        &self.history
    }

    fn enter(&mut self, next: JoinPhase) {
        tracing::debug!("join phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        self.history.push(next);
    }

    /// Drive `receiver` onto `sender` and report the outcome
    pub fn run(
        &mut self,
        receiver: &dyn DeviceControl,
        sender: &dyn DeviceControl,
        names: &mut NameCache,
    ) -> JoinResult {
        let token = receiver.device().token.clone();

        self.wake(receiver);
        let source = self.select_source(receiver);

        self.enter(JoinPhase::Joining);
        let candidates = CandidateResolver::new(&self.config.resolver).resolve(sender, receiver, names);
        tracing::info!(
            receiver = %token,
            "{} candidate(s): {}",
            candidates.len(),
            candidates.iter().map(|c| c.uri.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut attempts = 0;
        let mut skipped = false;
        let mut last_error: Option<DeviceError> = None;
        let mut accepted: Option<SenderCandidate> = None;

        if let Some(current) = already_joined(receiver, source.as_ref(), &candidates) {
            tracing::info!(receiver = %token, "already grouped via {}", current.uri);
            attempts = 1;
            skipped = true;
            accepted = Some(current);
        } else {
            for candidate in &candidates {
                attempts += 1;
                match self.try_candidate(receiver, source.as_ref(), candidate) {
                    Ok(true) => {
                        accepted = Some(candidate.clone());
                        break;
                    }
                    Ok(false) => {
                        tracing::warn!(receiver = %token, "candidate {} did not converge", candidate.uri)
                    }
                    Err(e) => {
                        tracing::warn!(receiver = %token, "candidate {} failed: {}", candidate.uri, e);
                        last_error = Some(e);
                    }
                }
            }
        }

        let error = match &accepted {
            Some(candidate) => {
                self.enter(JoinPhase::Grouped);
                tracing::info!(receiver = %token, "grouped via {} ({})", candidate.uri, candidate.scheme);
                None
            }
            None => {
                self.enter(JoinPhase::NotGrouped);
                tracing::warn!(receiver = %token, "no candidate converged after {} attempt(s)", attempts);
                if self.config.last_resort {
                    self.force_default(receiver, sender);
                }
                Some(JoinError::ConvergenceTimeout { attempts, last_error })
            }
        };

        let final_sender = match receiver.receiver_sender() {
            Ok(sender) => {
                tracing::info!(receiver = %token, "final sender: {}", sender.uri);
                Some(sender.uri)
            }
            Err(e) => {
                tracing::debug!(receiver = %token, "final sender unavailable: {}", e);
                None
            }
        };

        JoinResult {
            receiver_id: token,
            joined: accepted.is_some(),
            final_candidate: accepted,
            attempts,
            skipped,
            final_sender,
            error,
        }
    }

    fn wake(&mut self, receiver: &dyn DeviceControl) {
        // a device that is already awake may still reject this
        match receiver.set_standby(false) {
            Ok(()) => tracing::info!(receiver = %receiver.device().token, "woken"),
            Err(e) => tracing::warn!(receiver = %receiver.device().token, "wake failed, continuing: {}", e),
        }
        self.enter(JoinPhase::Woken);
        self.config.settle();
    }

    fn select_source(&mut self, receiver: &dyn DeviceControl) -> Option<SourceInfo> {
        let token = &receiver.device().token;

        match receiver.current_source() {
            Ok(current) if current.is_songcast_receiver() => {
                tracing::info!(receiver = %token, "already on {}", current);
                self.enter(JoinPhase::SourceSelected);
                return Some(current);
            }
            Ok(current) => tracing::debug!(receiver = %token, "current source is {}", current),
            Err(e) => tracing::debug!(receiver = %token, "current source unknown: {}", e),
        }

        match receiver.find_source(&SourceInfo::is_songcast_receiver) {
            Ok(Some(source)) => match receiver.set_source_index(source.index) {
                Ok(()) => {
                    tracing::info!(receiver = %token, "switched to {}", source);
                    self.enter(JoinPhase::SourceSelected);
                    self.config.settle();
                    Some(source)
                }
                Err(e) => {
                    tracing::warn!(receiver = %token, "could not select {}: {}", source, e);
                    None
                }
            },
            Ok(None) => {
                tracing::warn!(receiver = %token, "no Songcast receiver source found, leaving source unchanged");
                None
            }
            Err(e) => {
                tracing::warn!(receiver = %token, "could not list sources: {}", e);
                None
            }
        }
    }

    /// Apply one candidate and poll for convergence
    ///
    /// `Err` means the candidate could not even be applied.
    fn try_candidate(
        &self,
        receiver: &dyn DeviceControl,
        source: Option<&SourceInfo>,
        candidate: &SenderCandidate,
    ) -> Result<bool> {
        let token = &receiver.device().token;
        tracing::info!(receiver = %token, "trying {} ({})", candidate.uri, candidate.scheme);

        if let Err(e) = receiver.stop() {
            tracing::debug!(receiver = %token, "stop failed: {}", e);
        }

        let metadata = match candidate.scheme {
            SenderScheme::DirectMulticast => "",
            _ => candidate.metadata.as_str(),
        };
        if let Err(e) = receiver.set_receiver_sender(&candidate.uri, metadata) {
            if metadata.is_empty() {
                return Err(e);
            }
            tracing::debug!(receiver = %token, "retrying without metadata: {}", e);
            receiver.set_receiver_sender(&candidate.uri, "")?;
        }
        if let Err(e) = receiver.play() {
            tracing::warn!(receiver = %token, "play failed: {}", e);
        }

        let poll = &self.config.poll;
        for attempt in 1..=poll.max_attempts {
            poll.wait();
            match read_receiver_state(receiver, source) {
                Ok(state) => {
                    tracing::debug!(
                        receiver = %token,
                        "poll {}/{}: transport={} scheme={} grouped={}",
                        attempt,
                        poll.max_attempts,
                        state.transport,
                        state.scheme(),
                        state.grouped
                    );
                    if converged(candidate, &state) {
                        return Ok(true);
                    }
                }
                Err(e) => {
                    tracing::debug!(receiver = %token, "poll failed, giving up on candidate: {}", e);
                    break;
                }
            }
        }
        Ok(false)
    }

    /// Send the synthesized reference directly; the outcome is only logged
    fn force_default(&self, receiver: &dyn DeviceControl, sender: &dyn DeviceControl) {
        let fallback = SenderCandidate::synthesized(&self.config.resolver.multicast_group, sender.device().identifier());
        match receiver.force_sender_raw(&fallback.uri) {
            Ok(()) => tracing::info!(receiver = %receiver.device().token, "forced {} as last resort", fallback.uri),
            Err(e) => tracing::warn!(receiver = %receiver.device().token, "last-resort SetSender failed: {}", e),
        }
    }
}

/// The candidate the receiver is already grouped on, if any
fn already_joined(
    receiver: &dyn DeviceControl,
    source: Option<&SourceInfo>,
    candidates: &[SenderCandidate],
) -> Option<SenderCandidate> {
    let state = read_receiver_state(receiver, source).ok()?;
    if !state.grouped {
        return None;
    }
    candidates.iter().find(|c| c.uri == state.sender_uri).cloned()
}
