//! Typed OpenHome control API
//!
//! This crate provides a type-safe, trait-based API for the subset of the OpenHome
//! control protocol needed to build Songcast groups: the `Product` service (standby,
//! sources, identity), the `Receiver` service (sender reference, playback, transport
//! state) and the `Sender` service (a sender's own descriptor).
//! It uses the private `soap-client` crate for low-level SOAP communication.
//!
//! ```rust,no_run
//! use openhome_api::{DeviceAddress, OpenHomeClient};
//! use openhome_api::operations::receiver::{TransportStateOperation, TransportStateRequest};
//!
//! let client = OpenHomeClient::new();
//! let device = DeviceAddress::new("192.168.1.21", "4c494e4e-0026-0f22-646e-01560511013f");
//! let state = client.execute::<TransportStateOperation>(&device, &TransportStateRequest)?;
//! println!("receiver is {}", state.value);
//! # Ok::<(), openhome_api::ApiError>(())
//! ```

pub mod client;
pub mod didl;
pub mod error;
pub mod operation;
pub mod operations;
pub mod service;

pub use client::{DeviceAddress, OpenHomeClient, DEFAULT_CONTROL_PORT};
pub use didl::SenderListing;
pub use error::{ApiError, Result};
pub use operation::OpenHomeOperation;
pub use service::{Service, ServiceInfo};
