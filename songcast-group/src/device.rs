//! Device identity and the receiver-side state model

use std::fmt;

use openhome_api::DeviceAddress;
use url::Url;

/// Well-known Songcast multicast group
pub const DEFAULT_MULTICAST_GROUP: &str = "239.255.255.250:51972";

/// One physical device taking part in a run
///
/// Identity is the device identifier (UDN); the token is the name the run
/// configuration uses for it (e.g. `DEVICE_2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    pub token: String,
    pub address: DeviceAddress,
}

impl Device {
    pub fn new(token: impl Into<String>, host: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            address: DeviceAddress::new(host, identifier),
        }
    }

    pub fn with_control_port(mut self, port: u16) -> Self {
        self.address = self.address.with_port(port);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.address.udn
    }

    pub fn host(&self) -> &str {
        &self.address.host
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.token, self.address.host)
    }
}

/// Friendly names reported by the Product service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceNames {
    pub room: Option<String>,
    pub name: Option<String>,
}

/// How a sender reference addresses its sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderScheme {
    /// `ohz://` points the receiver straight at a multicast stream
    DirectMulticast,
    /// `ohSongcast://` names a sender the receiver must resolve itself
    Descriptor,
    Unknown,
}

impl SenderScheme {
    pub fn of(uri: &str) -> Self {
        match Url::parse(uri.trim()) {
            // schemes come back lowercased
            Ok(url) => match url.scheme() {
                "ohz" => SenderScheme::DirectMulticast,
                "ohsongcast" => SenderScheme::Descriptor,
                _ => SenderScheme::Unknown,
            },
            Err(_) => SenderScheme::Unknown,
        }
    }
}

impl fmt::Display for SenderScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SenderScheme::DirectMulticast => "direct-multicast",
            SenderScheme::Descriptor => "descriptor",
            SenderScheme::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    /// Found in the receiver's visible-senders list
    Discovered,
    /// The sender's self-reported descriptor
    SenderDescriptor,
    /// Built from the multicast group and the sender identifier
    Synthesized,
}

/// One sender reference to try on a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderCandidate {
    pub uri: String,
    pub scheme: SenderScheme,
    pub metadata: String,
    pub origin: CandidateOrigin,
}

impl SenderCandidate {
    pub fn new(uri: impl Into<String>, metadata: impl Into<String>, origin: CandidateOrigin) -> Self {
        let uri = uri.into();
        Self {
            scheme: SenderScheme::of(&uri),
            uri,
            metadata: metadata.into(),
            origin,
        }
    }

    /// The `ohz://<group>/<identifier>` reference for a sender
    pub fn synthesized(multicast_group: &str, sender_identifier: &str) -> Self {
        Self::new(
            format!("ohz://{}/{}", multicast_group, sender_identifier),
            "",
            CandidateOrigin::Synthesized,
        )
    }
}

/// One entry of a device's source list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub index: u32,
    pub system_name: String,
    pub source_type: String,
    pub name: String,
    pub visible: bool,
}

impl SourceInfo {
    /// Whether this source receives a Songcast stream
    pub fn is_songcast_receiver(&self) -> bool {
        let source_type = self.source_type.to_lowercase();
        let name = self.name.to_lowercase();
        self.visible
            && (source_type.contains("receiver") || source_type.contains("songcast") || name.contains("songcast"))
    }

    /// Whether this source sends a Songcast stream
    pub fn is_songcast_sender(&self) -> bool {
        let source_type = self.source_type.to_lowercase();
        let name = self.name.to_lowercase();
        self.visible && (source_type.contains("sender") || (name.contains("songcast") && name.contains("sender")))
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at index {}", self.name, self.source_type, self.index)
    }
}

/// Receiver transport state as reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Playing,
    Buffering,
    Connecting,
    Waiting,
    Stopped,
    Other(String),
}

impl TransportState {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "playing" => TransportState::Playing,
            "buffering" => TransportState::Buffering,
            "connecting" => TransportState::Connecting,
            "waiting" => TransportState::Waiting,
            "stopped" => TransportState::Stopped,
            _ => TransportState::Other(value.trim().to_string()),
        }
    }

    /// Playing, buffering or connecting
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransportState::Playing | TransportState::Buffering | TransportState::Connecting
        )
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Playing => f.write_str("Playing"),
            TransportState::Buffering => f.write_str("Buffering"),
            TransportState::Connecting => f.write_str("Connecting"),
            TransportState::Waiting => f.write_str("Waiting"),
            TransportState::Stopped => f.write_str("Stopped"),
            TransportState::Other(s) => f.write_str(s),
        }
    }
}

/// Best-effort "is this receiver part of a group" test
///
/// The device has no explicit flag for this. A direct-multicast sender
/// reference, or an active transport with any reference, is taken as grouped.
pub fn is_grouped(scheme: SenderScheme, transport: &TransportState) -> bool {
    scheme == SenderScheme::DirectMulticast || transport.is_active()
}

/// Most recent poll of a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverState {
    pub source_index: Option<u32>,
    pub source_type: Option<String>,
    pub transport: TransportState,
    pub sender_uri: String,
    pub grouped: bool,
}

impl ReceiverState {
    pub fn new(source: Option<&SourceInfo>, transport: TransportState, sender_uri: String) -> Self {
        let grouped = is_grouped(SenderScheme::of(&sender_uri), &transport);
        Self {
            source_index: source.map(|s| s.index),
            source_type: source.map(|s| s.source_type.clone()),
            transport,
            sender_uri,
            grouped,
        }
    }

    pub fn scheme(&self) -> SenderScheme {
        SenderScheme::of(&self.sender_uri)
    }
}
