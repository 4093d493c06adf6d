//! Songcast group formation
//!
//! Puts one sender and a set of receivers into a Songcast group over the
//! OpenHome control protocol:
//!
//! - [`CandidateResolver`] works out which sender references to try
//! - [`JoinStateMachine`] drives one receiver from standby to grouped
//! - [`GroupOrchestrator`] runs the joins one receiver at a time and collects
//!   a [`GroupReport`]
//!
//! Devices are reached through the [`DeviceControl`] trait; [`OpenHomeDevice`]
//! is the network implementation.
//!
//! ```rust,no_run
//! use openhome_api::OpenHomeClient;
//! use songcast_group::{Device, DeviceControl, GroupConfig, GroupOrchestrator, OpenHomeDevice};
//!
//! let client = OpenHomeClient::new();
//! let sender = OpenHomeDevice::new(Device::new("DEVICE_1", "192.168.1.20", "udn-1"), client.clone());
//! let kitchen = OpenHomeDevice::new(Device::new("DEVICE_2", "192.168.1.21", "udn-2"), client);
//!
//! let report = GroupOrchestrator::new(GroupConfig::default()).run(&sender, &[&kitchen]);
//! assert!(report.all_joined());
//! ```

pub mod cache;
pub mod control;
pub mod device;
pub mod error;
pub mod join;
pub mod openhome;
pub mod orchestrator;
pub mod policy;
pub mod resolver;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cache::NameCache;
pub use control::{DeviceControl, SenderDescriptor, SenderReference};
pub use device::{
    is_grouped, CandidateOrigin, Device, DeviceNames, ReceiverState, SenderCandidate, SenderScheme, SourceInfo,
    TransportState, DEFAULT_MULTICAST_GROUP,
};
pub use error::{DeviceError, JoinError};
pub use join::{read_receiver_state, JoinPhase, JoinResult, JoinStateMachine};
pub use openhome::OpenHomeDevice;
pub use orchestrator::{prepare_sender_source, GroupConfig, GroupOrchestrator, GroupReport, ReceiverReport};
pub use policy::{JoinConfig, PollPolicy, ResolverConfig};
pub use resolver::CandidateResolver;
