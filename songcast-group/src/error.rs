use openhome_api::ApiError;
use thiserror::Error;

/// A control call against one device failed
///
/// Callers decide whether to retry, fall back or carry on with less
/// information; none of these abort an orchestration run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Refused, timed out or otherwise unreachable
    #[error("{device}: cannot reach device during {action}: {reason}")]
    Connection {
        device: String,
        action: &'static str,
        reason: String,
    },

    /// The device answered with something we could not read
    #[error("{device}: unreadable {action} response: {reason}")]
    ProtocolParse {
        device: String,
        action: &'static str,
        reason: String,
    },

    /// The device rejected the call
    #[error("{device}: {action} failed: {reason}")]
    Operation {
        device: String,
        action: &'static str,
        reason: String,
    },
}

impl DeviceError {
    pub fn from_api(device: &str, action: &'static str, error: ApiError) -> Self {
        let device = device.to_string();
        match error {
            ApiError::NetworkError(reason) => DeviceError::Connection { device, action, reason },
            ApiError::ParseError(reason) => DeviceError::ProtocolParse { device, action, reason },
            ApiError::SoapFault(code) => DeviceError::Operation {
                device,
                action,
                reason: format!("SOAP fault {}", code),
            },
            ApiError::InvalidParameter(reason) => DeviceError::Operation { device, action, reason },
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, DeviceError::Connection { .. })
    }
}

/// Why a receiver ended up not grouped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("no candidate converged after {attempts} attempt(s)")]
    ConvergenceTimeout {
        attempts: u32,
        /// Last control-call failure seen while trying candidates, if any
        last_error: Option<DeviceError>,
    },

    /// The run was interrupted before this receiver was attempted
    #[error("cancelled before the join started")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DeviceError>;
