//! [`DeviceControl`] over the OpenHome control protocol

use openhome_api::operations::product::{
    ProductOperation, ProductRequest, SetSourceIndexOperation, SetSourceIndexRequest, SetStandbyOperation,
    SetStandbyRequest, SourceCountOperation, SourceCountRequest, SourceIndexOperation, SourceIndexRequest,
    SourceOperation, SourceRequest,
};
use openhome_api::operations::receiver::{
    PlayOperation, PlayRequest, SenderOperation, SenderRequest, SendersOperation, SendersRequest,
    SetSenderOperation, SetSenderRequest, StopOperation, StopRequest, TransportStateOperation,
    TransportStateRequest,
};
use openhome_api::operations::sender::{MetadataOperation, MetadataRequest};
use openhome_api::{OpenHomeClient, OpenHomeOperation, SenderListing, Service};

use crate::control::{DeviceControl, SenderDescriptor, SenderReference};
use crate::device::{Device, DeviceNames, SourceInfo, TransportState};
use crate::error::{DeviceError, Result};

/// A device reached through its OpenHome SOAP endpoints
#[derive(Debug, Clone)]
pub struct OpenHomeDevice {
    device: Device,
    client: OpenHomeClient,
}

impl OpenHomeDevice {
    pub fn new(device: Device, client: OpenHomeClient) -> Self {
        Self { device, client }
    }

    fn execute<Op: OpenHomeOperation>(&self, request: &Op::Request) -> Result<Op::Response> {
        tracing::trace!(device = %self.device.token, "{}::{}", Op::SERVICE.name(), Op::ACTION);
        self.client
            .execute::<Op>(&self.device.address, request)
            .map_err(|e| DeviceError::from_api(&self.device.token, Op::ACTION, e))
    }

    fn raw(&self, action: &'static str, args: &[(&str, &str)]) -> Result<()> {
        self.client
            .call_action(&self.device.address, Service::Receiver, action, args)
            .map(|_| ())
            .map_err(|e| DeviceError::from_api(&self.device.token, action, e))
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl DeviceControl for OpenHomeDevice {
    fn device(&self) -> &Device {
        &self.device
    }

    fn set_standby(&self, standby: bool) -> Result<()> {
        self.execute::<SetStandbyOperation>(&SetStandbyRequest { value: standby })
            .map(|_| ())
    }

    fn source_index(&self) -> Result<u32> {
        Ok(self.execute::<SourceIndexOperation>(&SourceIndexRequest)?.value)
    }

    fn source_count(&self) -> Result<u32> {
        Ok(self.execute::<SourceCountOperation>(&SourceCountRequest)?.value)
    }

    fn source(&self, index: u32) -> Result<SourceInfo> {
        let source = self.execute::<SourceOperation>(&SourceRequest { index })?;
        Ok(SourceInfo {
            index,
            system_name: source.system_name,
            source_type: source.source_type,
            name: source.name,
            visible: source.visible,
        })
    }

    fn set_source_index(&self, index: u32) -> Result<()> {
        self.execute::<SetSourceIndexOperation>(&SetSourceIndexRequest { value: index })
            .map(|_| ())
    }

    fn receiver_sender(&self) -> Result<SenderReference> {
        let sender = self.execute::<SenderOperation>(&SenderRequest)?;
        Ok(SenderReference {
            uri: sender.uri,
            metadata: sender.metadata,
        })
    }

    fn set_receiver_sender(&self, uri: &str, metadata: &str) -> Result<()> {
        self.execute::<SetSenderOperation>(&SetSenderRequest {
            uri: uri.to_string(),
            metadata: metadata.to_string(),
        })
        .map(|_| ())
    }

    fn play(&self) -> Result<()> {
        self.execute::<PlayOperation>(&PlayRequest).map(|_| ())
    }

    fn stop(&self) -> Result<()> {
        self.execute::<StopOperation>(&StopRequest).map(|_| ())
    }

    fn transport_state(&self) -> Result<TransportState> {
        let state = self.execute::<TransportStateOperation>(&TransportStateRequest)?;
        Ok(TransportState::parse(&state.value))
    }

    fn visible_senders(&self) -> Result<Vec<SenderListing>> {
        Ok(self.execute::<SendersOperation>(&SendersRequest)?.senders)
    }

    fn sender_descriptor(&self) -> Result<SenderDescriptor> {
        let descriptor = self.execute::<MetadataOperation>(&MetadataRequest)?;
        Ok(SenderDescriptor {
            uri: descriptor.uri.and_then(non_empty),
            metadata: descriptor.metadata,
        })
    }

    fn product_identity(&self) -> Result<DeviceNames> {
        let product = self.execute::<ProductOperation>(&ProductRequest)?;
        Ok(DeviceNames {
            room: non_empty(product.room),
            name: non_empty(product.name),
        })
    }

    fn force_sender_raw(&self, uri: &str) -> Result<()> {
        self.raw("SetSender", &[("Uri", uri), ("Metadata", "")])?;
        self.raw("Play", &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty("  Kitchen ".to_string()), Some("Kitchen".to_string()));
        assert_eq!(non_empty("   ".to_string()), None);
    }

    #[test]
    fn test_unreachable_device_maps_to_connection_error() {
        // port 9 on localhost: nothing listens there in the test environment
        let device = Device::new("D9", "127.0.0.1", "udn-9").with_control_port(9);
        let handle = OpenHomeDevice::new(device, OpenHomeClient::new());
        let err = handle.transport_state().unwrap_err();
        assert!(err.is_connection(), "unexpected {:?}", err);
    }

    #[test]
    fn test_force_sender_raw_sets_sender_then_plays() {
        let mut server = mockito::Server::new();
        let path = "/udn-9/av.openhome.org-Receiver-1/control";
        let envelope = |inner: &str| {
            format!(
                r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>{}</s:Body></s:Envelope>"#,
                inner
            )
        };
        let set_sender = server
            .mock("POST", path)
            .match_header("SOAPACTION", "\"urn:av-openhome-org:service:Receiver:1#SetSender\"")
            .match_body(mockito::Matcher::Regex(
                "<Uri>ohz://239.255.255.250:51972/udn-1</Uri><Metadata></Metadata>".to_string(),
            ))
            .with_status(200)
            .with_body(envelope(r#"<u:SetSenderResponse xmlns:u="urn:av-openhome-org:service:Receiver:1"/>"#))
            .create();
        let play = server
            .mock("POST", path)
            .match_header("SOAPACTION", "\"urn:av-openhome-org:service:Receiver:1#Play\"")
            .with_status(200)
            .with_body(envelope(r#"<u:PlayResponse xmlns:u="urn:av-openhome-org:service:Receiver:1"/>"#))
            .create();

        let host_port = server.host_with_port();
        let (host, port) = host_port.rsplit_once(':').unwrap();
        let device = Device::new("D9", host, "udn-9").with_control_port(port.parse().unwrap());
        let handle = OpenHomeDevice::new(device, OpenHomeClient::new());

        handle.force_sender_raw("ohz://239.255.255.250:51972/udn-1").unwrap();
        set_sender.assert();
        play.assert();
    }
}
