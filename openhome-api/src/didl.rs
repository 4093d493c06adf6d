//! DIDL-Lite fragments exchanged by the Receiver and Sender services
//!
//! Sender lists and sender metadata arrive as escaped DIDL-Lite documents inside a
//! SOAP string argument:
//!
//! ```xml
//! <DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" ...>
//!   <item id="ohSongcast" parentID="0" restricted="true">
//!     <dc:title>Living Room</dc:title>
//!     <res protocolInfo="ohz:*:*:*">ohz://239.255.255.250:51972/4c494e4e-...</res>
//!   </item>
//! </DIDL-Lite>
//! ```

use serde::Deserialize;
use xmltree::{Element, XMLNode};

use crate::error::{ApiError, Result};

/// One sender visible to a receiver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SenderListing {
    /// `dc:title` of the item, usually the sender's room or product name
    pub title: Option<String>,
    /// All `res` URIs of the item, in document order
    pub uris: Vec<String>,
}

impl SenderListing {
    /// URIs using the given scheme prefix (e.g. "ohz://")
    pub fn uris_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.uris
            .iter()
            .filter(move |uri| uri.to_ascii_lowercase().starts_with(prefix))
    }
}

/// Parse a DIDL-Lite document into its items
///
/// An empty or whitespace-only document is an empty list, not an error.
pub fn parse_items(xml: &str) -> Result<Vec<SenderListing>> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let root = Element::parse(xml.as_bytes())
        .map_err(|e| ApiError::ParseError(format!("Failed to parse DIDL-Lite: {}", e)))?;

    let mut items = Vec::new();
    collect_items(&root, &mut items);

    Ok(items
        .into_iter()
        .map(|item| {
            let mut title = None;
            let mut uris = Vec::new();
            for child in item.children.iter().filter_map(XMLNode::as_element) {
                let text = child.get_text().map(|t| t.trim().to_string()).unwrap_or_default();
                match child.name.as_str() {
                    "title" => title = Some(text),
                    "res" if !text.is_empty() => uris.push(text),
                    _ => {}
                }
            }
            SenderListing { title, uris }
        })
        .collect())
}

/// First `res` URI found in a DIDL-Lite document
pub fn first_resource(xml: &str) -> Result<Option<String>> {
    Ok(parse_items(xml)?.into_iter().flat_map(|item| item.uris).next())
}

fn collect_items<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    for child in element.children.iter().filter_map(XMLNode::as_element) {
        if child.name == "item" {
            out.push(child);
        } else {
            collect_items(child, out);
        }
    }
}
