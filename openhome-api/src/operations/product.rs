//! Product service operations
//!
//! Standby control, source enumeration and selection, and the product identity
//! (room and name) used for logging and sender matching.

use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::operation::{child_text, required_text, required_u32};
use crate::{ApiError, OpenHomeOperation, Service};

/// SetStandby operation
pub struct SetStandbyOperation;

#[derive(Serialize)]
pub struct SetStandbyRequest {
    pub value: bool,
}

#[derive(Deserialize)]
pub struct SetStandbyResponse;

impl OpenHomeOperation for SetStandbyOperation {
    type Request = SetStandbyRequest;
    type Response = SetStandbyResponse;

    const SERVICE: Service = Service::Product;
    const ACTION: &'static str = "SetStandby";

    fn build_payload(request: &Self::Request) -> String {
        format!("<Value>{}</Value>", if request.value { 1 } else { 0 })
    }

    fn parse_response(_xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(SetStandbyResponse)
    }
}

/// SourceCount operation
pub struct SourceCountOperation;

#[derive(Serialize)]
pub struct SourceCountRequest;

/// Number of sources; canonical field `Value`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceCountResponse {
    pub value: u32,
}

impl OpenHomeOperation for SourceCountOperation {
    type Request = SourceCountRequest;
    type Response = SourceCountResponse;

    const SERVICE: Service = Service::Product;
    const ACTION: &'static str = "SourceCount";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(SourceCountResponse {
            value: required_u32(xml, "Value")?,
        })
    }
}

/// SourceIndex operation
pub struct SourceIndexOperation;

#[derive(Serialize)]
pub struct SourceIndexRequest;

/// Currently selected source; canonical field `Value`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceIndexResponse {
    pub value: u32,
}

impl OpenHomeOperation for SourceIndexOperation {
    type Request = SourceIndexRequest;
    type Response = SourceIndexResponse;

    const SERVICE: Service = Service::Product;
    const ACTION: &'static str = "SourceIndex";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(SourceIndexResponse {
            value: required_u32(xml, "Value")?,
        })
    }
}

/// SetSourceIndex operation
pub struct SetSourceIndexOperation;

#[derive(Serialize)]
pub struct SetSourceIndexRequest {
    pub value: u32,
}

#[derive(Deserialize)]
pub struct SetSourceIndexResponse;

impl OpenHomeOperation for SetSourceIndexOperation {
    type Request = SetSourceIndexRequest;
    type Response = SetSourceIndexResponse;

    const SERVICE: Service = Service::Product;
    const ACTION: &'static str = "SetSourceIndex";

    fn build_payload(request: &Self::Request) -> String {
        format!("<Value>{}</Value>", request.value)
    }

    fn parse_response(_xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(SetSourceIndexResponse)
    }
}

/// Source operation: details of one source by index
pub struct SourceOperation;

#[derive(Serialize)]
pub struct SourceRequest {
    pub index: u32,
}

/// Details of one source
///
/// `name` is the user-facing `Name`, falling back to `SystemName` when the device
/// leaves it empty. A missing `Visible` argument counts as visible.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceResponse {
    pub system_name: String,
    pub source_type: String,
    pub name: String,
    pub visible: bool,
}

impl OpenHomeOperation for SourceOperation {
    type Request = SourceRequest;
    type Response = SourceResponse;

    const SERVICE: Service = Service::Product;
    const ACTION: &'static str = "Source";

    fn build_payload(request: &Self::Request) -> String {
        format!("<Index>{}</Index>", request.index)
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        let system_name = child_text(xml, "SystemName").unwrap_or_default();
        let name = child_text(xml, "Name")
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| system_name.clone());

        Ok(SourceResponse {
            source_type: required_text(xml, "Type")?,
            visible: child_text(xml, "Visible")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            system_name,
            name,
        })
    }
}

/// Product operation: room, name and product information
pub struct ProductOperation;

#[derive(Serialize)]
pub struct ProductRequest;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductResponse {
    pub room: String,
    pub name: String,
    pub info: String,
    pub url: String,
    pub image_uri: String,
}

impl OpenHomeOperation for ProductOperation {
    type Request = ProductRequest;
    type Response = ProductResponse;

    const SERVICE: Service = Service::Product;
    const ACTION: &'static str = "Product";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(ProductResponse {
            room: required_text(xml, "Room")?,
            name: required_text(xml, "Name")?,
            info: child_text(xml, "Info").unwrap_or_default(),
            url: child_text(xml, "Url").unwrap_or_default(),
            image_uri: child_text(xml, "ImageUri").unwrap_or_default(),
        })
    }
}

/// Boolean flags come back as "true"/"false", "1"/"0" or "yes"/"no"
pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
