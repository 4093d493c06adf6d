/// OpenHome services used for Songcast grouping
///
/// Each service exposes a specific set of actions on the device's control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Product service - standby, source selection, room and product name
    Product,

    /// Receiver service - Songcast receiver: sender reference, play/stop, transport state
    Receiver,

    /// Sender service - Songcast sender: the device's own sender descriptor
    Sender,
}

/// Endpoint and service URI information for an OpenHome service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Path segment of the service below the device UDN (e.g. "av.openhome.org-Receiver-1")
    pub path_segment: &'static str,

    /// The service URI used in SOAPACTION headers and the action element namespace
    pub service_uri: &'static str,
}

impl Service {
    /// Get the name of this service as a string
    pub fn name(&self) -> &'static str {
        match self {
            Service::Product => "Product",
            Service::Receiver => "Receiver",
            Service::Sender => "Sender",
        }
    }

    /// Get the service information for this service
    pub fn info(&self) -> ServiceInfo {
        match self {
            Service::Product => ServiceInfo {
                path_segment: "av.openhome.org-Product-4",
                service_uri: "urn:av-openhome-org:service:Product:4",
            },
            Service::Receiver => ServiceInfo {
                path_segment: "av.openhome.org-Receiver-1",
                service_uri: "urn:av-openhome-org:service:Receiver:1",
            },
            Service::Sender => ServiceInfo {
                path_segment: "av.openhome.org-Sender-2",
                service_uri: "urn:av-openhome-org:service:Sender:2",
            },
        }
    }
}
