use soap_client::{ControlUrl, SoapClient};
use xmltree::Element;

use crate::operation::escape_arg;
use crate::{OpenHomeOperation, Result, Service};

/// HTTP port of the OpenHome control stack on Linn devices
pub const DEFAULT_CONTROL_PORT: u16 = 55178;

/// Where a device's control endpoints live
///
/// Control URLs have the form `http://<host>:<port>/<udn>/<service-path>/control`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
    pub udn: String,
}

impl DeviceAddress {
    /// Address on the default control port
    pub fn new(host: impl Into<String>, udn: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_CONTROL_PORT,
            udn: udn.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Control endpoint of one service on this device
    pub fn control_url(&self, service: Service) -> ControlUrl {
        ControlUrl::new(
            self.host.clone(),
            self.port,
            format!("{}/{}/control", self.udn, service.info().path_segment),
        )
    }
}

/// A client for executing OpenHome operations against devices
///
/// Bridges the stateless operation definitions and the actual SOAP requests.
#[derive(Debug, Clone, Default)]
pub struct OpenHomeClient {
    soap_client: SoapClient,
}

impl OpenHomeClient {
    pub fn new() -> Self {
        Self {
            soap_client: SoapClient::new(),
        }
    }

    /// Create a client with a custom SOAP client (e.g. different timeouts)
    pub fn with_soap_client(soap_client: SoapClient) -> Self {
        Self { soap_client }
    }

    /// Execute an operation against a device
    ///
    /// # Example
    /// ```rust,no_run
    /// use openhome_api::{DeviceAddress, OpenHomeClient};
    /// use openhome_api::operations::product::{SourceCountOperation, SourceCountRequest};
    ///
    /// let client = OpenHomeClient::new();
    /// let device = DeviceAddress::new("192.168.1.20", "4c494e4e-0026-0f22-5661-01531488013f");
    /// let count = client.execute::<SourceCountOperation>(&device, &SourceCountRequest)?;
    /// # Ok::<(), openhome_api::ApiError>(())
    /// ```
    pub fn execute<Op: OpenHomeOperation>(
        &self,
        device: &DeviceAddress,
        request: &Op::Request,
    ) -> Result<Op::Response> {
        let payload = Op::build_payload(request);
        let xml = self.call_raw(device, Op::SERVICE, Op::ACTION, &payload)?;
        Op::parse_response(&xml)
    }

    /// Send a hand-built action payload, bypassing the typed operations
    pub fn call_raw(
        &self,
        device: &DeviceAddress,
        service: Service,
        action: &str,
        payload: &str,
    ) -> Result<Element> {
        let xml = self.soap_client.call(
            &device.control_url(service),
            service.info().service_uri,
            action,
            payload,
        )?;
        Ok(xml)
    }

    /// Send an action built from `(name, value)` argument pairs
    ///
    /// Values are XML-escaped; argument order is kept as given.
    pub fn call_action(
        &self,
        device: &DeviceAddress,
        service: Service,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<Element> {
        self.call_raw(device, service, action, &action_payload(args))
    }
}

fn action_payload(args: &[(&str, &str)]) -> String {
    args.iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape_arg(value)))
        .collect()
}
