//! Sender service operations

use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::didl;
use crate::operation::child_text;
use crate::{ApiError, OpenHomeOperation, Service};

/// Metadata operation: the sender's own descriptor
pub struct MetadataOperation;

#[derive(Serialize)]
pub struct MetadataRequest;

/// The sender's self-reported descriptor; canonical field `Value`
///
/// `uri` is the first `res` of the DIDL-Lite document, if any.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetadataResponse {
    pub metadata: String,
    pub uri: Option<String>,
}

impl OpenHomeOperation for MetadataOperation {
    type Request = MetadataRequest;
    type Response = MetadataResponse;

    const SERVICE: Service = Service::Sender;
    const ACTION: &'static str = "Metadata";

    fn build_payload(_request: &Self::Request) -> String {
        String::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        let metadata = child_text(xml, "Value").unwrap_or_default();
        let uri = didl::first_resource(&metadata)?;
        Ok(MetadataResponse { metadata, uri })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_parsing_extracts_uri() {
        let xml = Element::parse(
            r#"<MetadataResponse><Value>&lt;DIDL-Lite&gt;&lt;item&gt;&lt;res&gt;ohz://239.255.255.250:51972/udn-s&lt;/res&gt;&lt;/item&gt;&lt;/DIDL-Lite&gt;</Value></MetadataResponse>"#
                .as_bytes(),
        )
        .unwrap();
        let response = MetadataOperation::parse_response(&xml).unwrap();
        assert_eq!(response.uri.as_deref(), Some("ohz://239.255.255.250:51972/udn-s"));
        assert!(response.metadata.starts_with("<DIDL-Lite>"));
    }

    #[test]
    fn test_metadata_parsing_without_value() {
        let xml = Element::parse("<MetadataResponse/>".as_bytes()).unwrap();
        let response = MetadataOperation::parse_response(&xml).unwrap();
        assert_eq!(response.uri, None);
    }
}
