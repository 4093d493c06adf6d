use thiserror::Error;

/// Failure of one control call
#[derive(Debug, Error)]
pub enum SoapError {
    /// Connection refused, timed out or dropped mid-response
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The device answered with a status other than 200 or 500
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("XML parsing error: {0}")]
    Parse(String),

    /// UPnP fault from the device (HTTP 500 with a `Fault` body)
    #[error("SOAP fault: error code {0}")]
    Fault(u16),
}

impl SoapError {
    /// Whether the device could not be reached at all
    pub fn is_network(&self) -> bool {
        matches!(self, SoapError::Network(_))
    }
}
