//! Receiver service operations
//!
//! The Songcast receiver side: which sender a device listens to, starting and
//! stopping reception, and the transport state used to judge convergence.

use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::didl::{self, SenderListing};
use crate::operation::{child_text, escape_arg, required_text};
use crate::{ApiError, OpenHomeOperation, Service};

/// Play operation
pub struct PlayOperation;

#[derive(Serialize)]
pub struct PlayRequest;

#[derive(Deserialize)]
pub struct PlayResponse;

impl OpenHomeOperation for PlayOperation {
    type Request = PlayRequest;
    type Response = PlayResponse;

    const SERVICE: Service = Service::Receiver;
    const ACTION: &'static str = "Play";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(_xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(PlayResponse)
    }
}

/// Stop operation
pub struct StopOperation;

#[derive(Serialize)]
pub struct StopRequest;

#[derive(Deserialize)]
pub struct StopResponse;

impl OpenHomeOperation for StopOperation {
    type Request = StopRequest;
    type Response = StopResponse;

    const SERVICE: Service = Service::Receiver;
    const ACTION: &'static str = "Stop";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(_xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(StopResponse)
    }
}

/// SetSender operation
pub struct SetSenderOperation;

#[derive(Serialize)]
pub struct SetSenderRequest {
    pub uri: String,
    pub metadata: String,
}

#[derive(Deserialize)]
pub struct SetSenderResponse;

impl OpenHomeOperation for SetSenderOperation {
    type Request = SetSenderRequest;
    type Response = SetSenderResponse;

    const SERVICE: Service = Service::Receiver;
    const ACTION: &'static str = "SetSender";

    fn build_payload(request: &Self::Request) -> String {
        format!(
            "<Uri>{}</Uri><Metadata>{}</Metadata>",
            escape_arg(&request.uri),
            escape_arg(&request.metadata)
        )
    }

    fn parse_response(_xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(SetSenderResponse)
    }
}

/// Sender operation: the sender reference the receiver currently points at
pub struct SenderOperation;

#[derive(Serialize)]
pub struct SenderRequest;

/// Current sender reference; canonical fields `Uri` and `Metadata`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SenderResponse {
    pub uri: String,
    pub metadata: String,
}

impl OpenHomeOperation for SenderOperation {
    type Request = SenderRequest;
    type Response = SenderResponse;

    const SERVICE: Service = Service::Receiver;
    const ACTION: &'static str = "Sender";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(SenderResponse {
            uri: required_text(xml, "Uri")?.trim().to_string(),
            metadata: child_text(xml, "Metadata").unwrap_or_default(),
        })
    }
}

/// TransportState operation
pub struct TransportStateOperation;

#[derive(Serialize)]
pub struct TransportStateRequest;

/// Receiver transport state ("Playing", "Buffering", "Stopped", ...); canonical field `Value`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransportStateResponse {
    pub value: String,
}

impl OpenHomeOperation for TransportStateOperation {
    type Request = TransportStateRequest;
    type Response = TransportStateResponse;

    const SERVICE: Service = Service::Receiver;
    const ACTION: &'static str = "TransportState";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(TransportStateResponse {
            value: required_text(xml, "Value")?.trim().to_string(),
        })
    }
}

/// Senders operation: senders currently visible to this receiver
pub struct SendersOperation;

#[derive(Serialize)]
pub struct SendersRequest;

/// Visible senders; canonical field `SenderList` (an escaped DIDL-Lite document)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendersResponse {
    pub senders: Vec<SenderListing>,
}

impl OpenHomeOperation for SendersOperation {
    type Request = SendersRequest;
    type Response = SendersResponse;

    const SERVICE: Service = Service::Receiver;
    const ACTION: &'static str = "Senders";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        let list = child_text(xml, "SenderList").unwrap_or_default();
        Ok(SendersResponse {
            senders: didl::parse_items(&list)?,
        })
    }
}
