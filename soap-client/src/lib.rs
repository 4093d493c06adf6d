//! Private SOAP client for OpenHome device communication
//!
//! This crate provides a minimal SOAP client for the control protocol spoken by
//! OpenHome devices (Linn DS/DSM and friends). Control URLs have the form
//! `http://<host>:<port>/<udn>/<service-path>/control`; callers supply the pieces
//! and receive the parsed `<ActionResponse>` element back.

mod error;

pub use error::SoapError;

use std::time::Duration;
use xmltree::Element;

/// Location of one service control endpoint on a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlUrl {
    /// Device host (IP address or hostname)
    pub host: String,
    /// HTTP port of the device's UPnP stack
    pub port: u16,
    /// Path below the host, without leading slash (e.g. "<udn>/av.openhome.org-Receiver-1/control")
    pub path: String,
}

impl ControlUrl {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// Full URL of the endpoint
    pub fn url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.path.trim_start_matches('/'))
    }
}

/// A minimal SOAP client for OpenHome device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    /// Create a new SOAP client with default timeouts (5s connect, 5s read)
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(5))
    }

    /// Create a SOAP client with explicit connect and read timeouts
    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
        }
    }

    /// Send a SOAP request and return the parsed response element
    pub fn call(
        &self,
        endpoint: &ControlUrl,
        service_uri: &str,
        action: &str,
        payload: &str,
    ) -> Result<Element, SoapError> {
        let body = envelope(service_uri, action, payload);
        let soap_action = format!("\"{}#{}\"", service_uri, action);

        let response = match self
            .agent
            .post(&endpoint.url())
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .send_string(&body)
        {
            Ok(response) => response,
            // UPnP devices report faults with HTTP 500 and a Fault body
            Err(ureq::Error::Status(500, response)) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(SoapError::Http {
                    status,
                    url: endpoint.url(),
                })
            }
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml_text = response
            .into_string()
            .map_err(|e| SoapError::Network(e.to_string()))?;

        let xml = Element::parse(xml_text.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;

        self.extract_response(&xml, action)
    }

    fn extract_response(&self, xml: &Element, action: &str) -> Result<Element, SoapError> {
        let body = xml
            .get_child("Body")
            .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

        if let Some(fault) = body.get_child("Fault") {
            let error_code = fault
                .get_child("detail")
                .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")))
                .and_then(|e| e.get_child("errorCode"))
                .and_then(|c| c.get_text())
                .and_then(|t| t.trim().parse::<u16>().ok())
                .unwrap_or(500);
            return Err(SoapError::Fault(error_code));
        }

        let response_name = format!("{}Response", action);
        body.get_child(response_name.as_str())
            .cloned()
            .ok_or_else(|| SoapError::Parse(format!("Missing {} element", response_name)))
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

fn envelope(service_uri: &str, action: &str, payload: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:{action} xmlns:u="{service_uri}">{payload}</u:{action}>
    </s:Body>
</s:Envelope>"#,
        action = action,
        service_uri = service_uri,
        payload = payload
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_url_formatting() {
        let url = ControlUrl::new("192.168.1.20", 55178, "/uuid-1/av.openhome.org-Receiver-1/control");
        assert_eq!(url.url(), "http://192.168.1.20:55178/uuid-1/av.openhome.org-Receiver-1/control");
    }

    #[test]
    fn test_envelope_contains_action_and_payload() {
        let body = envelope("urn:av-openhome-org:service:Receiver:1", "Play", "");
        assert!(body.contains(r#"<u:Play xmlns:u="urn:av-openhome-org:service:Receiver:1"></u:Play>"#));

        let body = envelope("urn:av-openhome-org:service:Product:4", "SetSourceIndex", "<Value>3</Value>");
        assert!(body.contains("<Value>3</Value>"));
    }

    #[test]
    fn test_extract_response_with_valid_response() {
        let client = SoapClient::new();

        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <u:SourceIndexResponse xmlns:u="urn:av-openhome-org:service:Product:4">
                        <Value>2</Value>
                    </u:SourceIndexResponse>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        let response = client.extract_response(&xml, "SourceIndex").unwrap();
        assert_eq!(response.name, "SourceIndexResponse");
        assert_eq!(
            response.get_child("Value").and_then(|v| v.get_text()).as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_extract_response_with_soap_fault() {
        let client = SoapClient::new();

        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <s:Fault>
                        <faultcode>s:Client</faultcode>
                        <faultstring>UPnPError</faultstring>
                        <detail>
                            <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                                <errorCode>801</errorCode>
                                <errorDescription>Source index out of range</errorDescription>
                            </UPnPError>
                        </detail>
                    </s:Fault>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match client.extract_response(&xml, "SetSourceIndex") {
            Err(SoapError::Fault(code)) => assert_eq!(code, 801),
            other => panic!("Expected SoapError::Fault, got {:?}", other),
        }
    }

    #[test]
    fn test_soap_fault_with_default_error_code() {
        let client = SoapClient::new();

        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <s:Fault>
                        <faultcode>s:Server</faultcode>
                        <faultstring>Internal Error</faultstring>
                    </s:Fault>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match client.extract_response(&xml, "Play") {
            Err(SoapError::Fault(code)) => assert_eq!(code, 500),
            other => panic!("Expected SoapError::Fault, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_response_missing_body() {
        let client = SoapClient::new();
        let xml = Element::parse(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"></s:Envelope>"#.as_bytes(),
        )
        .unwrap();

        match client.extract_response(&xml, "Play") {
            Err(SoapError::Parse(msg)) => assert!(msg.contains("Missing SOAP Body")),
            other => panic!("Expected SoapError::Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_response_missing_action_response() {
        let client = SoapClient::new();
        let xml = Element::parse(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body></s:Body></s:Envelope>"#
                .as_bytes(),
        )
        .unwrap();

        match client.extract_response(&xml, "Play") {
            Err(SoapError::Parse(msg)) => assert!(msg.contains("Missing PlayResponse element")),
            other => panic!("Expected SoapError::Parse, got {:?}", other),
        }
    }
}
