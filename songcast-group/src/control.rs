//! The device-handle seam between the state machine and the network

use openhome_api::SenderListing;

use crate::device::{Device, DeviceNames, SourceInfo, TransportState};
use crate::error::Result;

/// A receiver's current sender reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderReference {
    pub uri: String,
    pub metadata: String,
}

/// What a sender says about itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderDescriptor {
    pub uri: Option<String>,
    pub metadata: String,
}

/// Typed operations on one device
///
/// Each method is a single control call. Implementations do not retry; the
/// join state machine decides what a failure means.
pub trait DeviceControl {
    fn device(&self) -> &Device;

    fn set_standby(&self, standby: bool) -> Result<()>;

    fn source_index(&self) -> Result<u32>;
    fn source_count(&self) -> Result<u32>;
    fn source(&self, index: u32) -> Result<SourceInfo>;
    fn set_source_index(&self, index: u32) -> Result<()>;

    /// Receiver service: current sender reference
    fn receiver_sender(&self) -> Result<SenderReference>;
    fn set_receiver_sender(&self, uri: &str, metadata: &str) -> Result<()>;
    fn play(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn transport_state(&self) -> Result<TransportState>;

    /// Senders this receiver can currently see
    fn visible_senders(&self) -> Result<Vec<SenderListing>>;

    /// Sender service: this device's own descriptor
    fn sender_descriptor(&self) -> Result<SenderDescriptor>;

    fn product_identity(&self) -> Result<DeviceNames>;

    /// SetSender (empty metadata) then Play, sent as hand-built requests
    /// rather than through the typed operations
    fn force_sender_raw(&self, uri: &str) -> Result<()>;

    /// The source currently selected
    fn current_source(&self) -> Result<SourceInfo> {
        let index = self.source_index()?;
        self.source(index)
    }

    /// First source, in index order, accepted by `predicate`
    ///
    /// Sources that fail to load are skipped.
    fn find_source(&self, predicate: &dyn Fn(&SourceInfo) -> bool) -> Result<Option<SourceInfo>> {
        let count = self.source_count()?;
        for index in 0..count {
            match self.source(index) {
                Ok(source) if predicate(&source) => return Ok(Some(source)),
                Ok(_) => {}
                Err(e) => tracing::debug!(device = %self.device().token, "skipping source {}: {}", index, e),
            }
        }
        Ok(None)
    }
}
