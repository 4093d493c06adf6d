use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::error::ApiError;
use crate::service::Service;

/// Base trait for all OpenHome control operations
///
/// Each operation is a zero-sized marker type that ties a typed request and a
/// typed response to one SOAP action of one service. Responses are read from the
/// action's canonical output argument exactly once, here at the client boundary.
pub trait OpenHomeOperation {
    /// The request type for this operation
    type Request: Serialize;

    /// The response type for this operation
    type Response: for<'de> Deserialize<'de>;

    /// The service this operation belongs to
    const SERVICE: Service;

    /// The SOAP action name for this operation
    const ACTION: &'static str;

    /// Build the XML arguments that go inside the action element
    fn build_payload(request: &Self::Request) -> String;

    /// Parse the `<ActionResponse>` element into the typed response
    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError>;
}

/// Text content of a direct child, if present
pub(crate) fn child_text(xml: &Element, name: &str) -> Option<String> {
    xml.get_child(name)
        .and_then(|e| e.get_text())
        .map(|t| t.into_owned())
}

/// Text content of a required child; an empty element yields an empty string
pub(crate) fn required_text(xml: &Element, name: &str) -> Result<String, ApiError> {
    let child = xml
        .get_child(name)
        .ok_or_else(|| ApiError::ParseError(format!("Missing {} element", name)))?;
    Ok(child.get_text().map(|t| t.into_owned()).unwrap_or_default())
}

/// Parse a required unsigned integer child
pub(crate) fn required_u32(xml: &Element, name: &str) -> Result<u32, ApiError> {
    let text = required_text(xml, name)?;
    text.trim()
        .parse::<u32>()
        .map_err(|_| ApiError::ParseError(format!("Invalid {} value: {}", name, text)))
}

/// Escape a string argument for inclusion in a SOAP payload
pub(crate) fn escape_arg(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}
