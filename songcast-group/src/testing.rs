//! Scripted in-memory device for state machine and orchestrator tests

use std::cell::RefCell;
use std::collections::HashMap;

use openhome_api::SenderListing;

use crate::control::{DeviceControl, SenderDescriptor, SenderReference};
use crate::device::{Device, DeviceNames, SourceInfo, TransportState};
use crate::error::{DeviceError, Result};

/// Mutable state behind a [`ScriptedDevice`]
#[derive(Debug, Clone)]
pub struct FakeState {
    pub reachable: bool,
    pub standby: bool,
    pub sources: Vec<SourceInfo>,
    pub source_index: u32,
    pub sender: SenderReference,
    pub transport: TransportState,
    pub visible_senders: Vec<SenderListing>,
    pub descriptor: Option<SenderDescriptor>,
    pub names: DeviceNames,
    /// SetSender with one of these URIs is rejected
    pub rejected_uris: Vec<String>,
    /// Transport state after Play, per sender URI
    pub play_outcomes: HashMap<String, TransportState>,
    /// Transport state after Play for URIs not in `play_outcomes`
    pub default_play_outcome: TransportState,
    pub fail_transport_reads: bool,
    pub calls: Vec<String>,
}

/// A device whose answers come from a [`FakeState`]
#[derive(Debug)]
pub struct ScriptedDevice {
    device: Device,
    state: RefCell<FakeState>,
}

fn source(index: u32, source_type: &str, name: &str) -> SourceInfo {
    SourceInfo {
        index,
        system_name: source_type.to_string(),
        source_type: source_type.to_string(),
        name: name.to_string(),
        visible: true,
    }
}

impl ScriptedDevice {
    pub fn new(device: Device, state: FakeState) -> Self {
        Self {
            device,
            state: RefCell::new(state),
        }
    }

    /// In standby on its playlist source, no sender set
    pub fn receiver(token: &str, identifier: &str) -> Self {
        Self::new(
            Device::new(token, format!("{}.local", token.to_lowercase()), identifier),
            FakeState {
                reachable: true,
                standby: true,
                sources: vec![
                    source(0, "Playlist", "Playlist"),
                    source(1, "Radio", "Radio"),
                    source(2, "Receiver", "Songcast"),
                ],
                source_index: 0,
                sender: SenderReference::default(),
                transport: TransportState::Stopped,
                visible_senders: Vec::new(),
                descriptor: None,
                names: DeviceNames::default(),
                rejected_uris: Vec::new(),
                play_outcomes: HashMap::new(),
                default_play_outcome: TransportState::Buffering,
                fail_transport_reads: false,
                calls: Vec::new(),
            },
        )
    }

    /// Like a receiver, but with a sender source instead of a receiver source
    pub fn sender(token: &str, identifier: &str) -> Self {
        let device = Self::receiver(token, identifier);
        device.state.borrow_mut().sources = vec![
            source(0, "Playlist", "Playlist"),
            source(1, "Sender", "Songcast Sender"),
        ];
        device
    }

    pub fn unreachable(self) -> Self {
        self.state.borrow_mut().reachable = false;
        self
    }

    pub fn with_names(self, room: Option<&str>, name: Option<&str>) -> Self {
        self.state.borrow_mut().names = DeviceNames {
            room: room.map(str::to_string),
            name: name.map(str::to_string),
        };
        self
    }

    pub fn with_descriptor(self, uri: &str, metadata: &str) -> Self {
        self.state.borrow_mut().descriptor = Some(SenderDescriptor {
            uri: Some(uri.to_string()),
            metadata: metadata.to_string(),
        });
        self
    }

    pub fn with_visible_senders(self, senders: Vec<SenderListing>) -> Self {
        self.state.borrow_mut().visible_senders = senders;
        self
    }

    /// Already receiving from `uri` in `transport`, on the Songcast source
    pub fn already_joined(self, uri: &str, transport: TransportState) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.standby = false;
            state.source_index = 2;
            state.sender = SenderReference {
                uri: uri.to_string(),
                metadata: String::new(),
            };
            state.transport = transport;
        }
        self
    }

    pub fn with_state(self, edit: impl FnOnce(&mut FakeState)) -> Self {
        edit(&mut self.state.borrow_mut());
        self
    }

    pub fn state(&self) -> FakeState {
        self.state.borrow().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded calls to `action`
    pub fn count_calls(&self, action: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(action))
            .count()
    }

    fn record(&self, action: &'static str, detail: Option<&str>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(match detail {
            Some(detail) => format!("{} {}", action, detail),
            None => action.to_string(),
        });
        if state.reachable {
            Ok(())
        } else {
            Err(DeviceError::Connection {
                device: self.device.token.clone(),
                action,
                reason: "connection refused".to_string(),
            })
        }
    }

    fn operation_error(&self, action: &'static str, reason: &str) -> DeviceError {
        DeviceError::Operation {
            device: self.device.token.clone(),
            action,
            reason: reason.to_string(),
        }
    }
}

impl DeviceControl for ScriptedDevice {
    fn device(&self) -> &Device {
        &self.device
    }

    fn set_standby(&self, standby: bool) -> Result<()> {
        self.record("SetStandby", Some(if standby { "1" } else { "0" }))?;
        self.state.borrow_mut().standby = standby;
        Ok(())
    }

    fn source_index(&self) -> Result<u32> {
        self.record("SourceIndex", None)?;
        Ok(self.state.borrow().source_index)
    }

    fn source_count(&self) -> Result<u32> {
        self.record("SourceCount", None)?;
        Ok(self.state.borrow().sources.len() as u32)
    }

    fn source(&self, index: u32) -> Result<SourceInfo> {
        self.record("Source", Some(&index.to_string()))?;
        self.state
            .borrow()
            .sources
            .get(index as usize)
            .cloned()
            .ok_or_else(|| self.operation_error("Source", "index out of range"))
    }

    fn set_source_index(&self, index: u32) -> Result<()> {
        self.record("SetSourceIndex", Some(&index.to_string()))?;
        let mut state = self.state.borrow_mut();
        if index as usize >= state.sources.len() {
            return Err(self.operation_error("SetSourceIndex", "index out of range"));
        }
        state.source_index = index;
        Ok(())
    }

    fn receiver_sender(&self) -> Result<SenderReference> {
        self.record("Sender", None)?;
        Ok(self.state.borrow().sender.clone())
    }

    fn set_receiver_sender(&self, uri: &str, metadata: &str) -> Result<()> {
        self.record("SetSender", Some(uri))?;
        let mut state = self.state.borrow_mut();
        if state.rejected_uris.iter().any(|u| u == uri) {
            return Err(self.operation_error("SetSender", "sender rejected"));
        }
        state.sender = SenderReference {
            uri: uri.to_string(),
            metadata: metadata.to_string(),
        };
        Ok(())
    }

    fn play(&self) -> Result<()> {
        self.record("Play", None)?;
        let mut state = self.state.borrow_mut();
        let outcome = state
            .play_outcomes
            .get(&state.sender.uri)
            .cloned()
            .unwrap_or_else(|| state.default_play_outcome.clone());
        state.transport = outcome;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.record("Stop", None)?;
        self.state.borrow_mut().transport = TransportState::Stopped;
        Ok(())
    }

    fn transport_state(&self) -> Result<TransportState> {
        self.record("TransportState", None)?;
        let state = self.state.borrow();
        if state.fail_transport_reads {
            return Err(DeviceError::ProtocolParse {
                device: self.device.token.clone(),
                action: "TransportState",
                reason: "missing Value".to_string(),
            });
        }
        Ok(state.transport.clone())
    }

    fn visible_senders(&self) -> Result<Vec<SenderListing>> {
        self.record("Senders", None)?;
        Ok(self.state.borrow().visible_senders.clone())
    }

    fn sender_descriptor(&self) -> Result<SenderDescriptor> {
        self.record("Metadata", None)?;
        self.state
            .borrow()
            .descriptor
            .clone()
            .ok_or_else(|| self.operation_error("Metadata", "no Sender service"))
    }

    fn product_identity(&self) -> Result<DeviceNames> {
        self.record("Product", None)?;
        Ok(self.state.borrow().names.clone())
    }

    fn force_sender_raw(&self, uri: &str) -> Result<()> {
        self.record("ForceSender", Some(uri))?;
        let mut state = self.state.borrow_mut();
        state.sender = SenderReference {
            uri: uri.to_string(),
            metadata: String::new(),
        };
        state.transport = state.default_play_outcome.clone();
        Ok(())
    }
}
