use soap_client::SoapError;
use thiserror::Error;

/// Failure of a typed OpenHome call
///
/// The variants line up with what a caller can do about them: retry later
/// (network), give up on the response (parse) or accept the device's refusal
/// (fault, invalid parameter).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Device unreachable, timed out or answered with an unexpected HTTP status
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The response arrived but does not carry the expected arguments
    #[error("Parse error: {0}")]
    ParseError(String),

    /// UPnP error code returned by the device
    #[error("SOAP fault: error code {0}")]
    SoapFault(u16),

    /// Rejected before anything was sent
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<SoapError> for ApiError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Network(msg) => ApiError::NetworkError(msg),
            SoapError::Http { status, url } => ApiError::NetworkError(format!("HTTP {} from {}", status, url)),
            SoapError::Parse(msg) => ApiError::ParseError(msg),
            SoapError::Fault(code) => ApiError::SoapFault(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soap_error_conversion() {
        let api_error: ApiError = SoapError::Network("connection refused".to_string()).into();
        assert!(matches!(api_error, ApiError::NetworkError(_)));

        let api_error: ApiError = SoapError::Parse("invalid XML".to_string()).into();
        assert!(matches!(api_error, ApiError::ParseError(_)));

        let api_error: ApiError = SoapError::Http {
            status: 404,
            url: "http://10.0.0.2:55178/x/control".to_string(),
        }
        .into();
        assert!(matches!(api_error, ApiError::NetworkError(msg) if msg.starts_with("HTTP 404")));

        let api_error: ApiError = SoapError::Fault(801).into();
        assert!(matches!(api_error, ApiError::SoapFault(801)));
    }

    #[test]
    fn test_fault_display_carries_upnp_code() {
        assert_eq!(ApiError::SoapFault(801).to_string(), "SOAP fault: error code 801");
        assert_eq!(
            ApiError::InvalidParameter("source index 9 of 4".into()).to_string(),
            "Invalid parameter: source index 9 of 4"
        );
    }
}
