use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::server::{Call, Handler};
use crate::Request;

const SERVICE_INTERFACE: &str = "org.varlink.service";

const SERVICE_DESCRIPTION: &str = r#"# The Varlink Service Interface is provided by every varlink service. It
# describes the service and the interfaces it implements.
interface org.varlink.service

# Get a list of all the interfaces a service provides and information
# about the implementation.
method GetInfo() -> (
  vendor: string,
  product: string,
  version: string,
  url: string,
  interfaces: []string
)

# Get the description of an interface that is implemented by this service.
method GetInterfaceDescription(interface: string) -> (description: string)

# The requested interface was not found.
error InterfaceNotFound (interface: string)

# The requested method was not found
error MethodNotFound (method: string)

# The interface defines the requested method, but the service does not
# implement it.
error MethodNotImplemented (method: string)

# One of the passed parameters is invalid.
error InvalidParameter (parameter: string)
"#;

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorInterfaceNotFound {
    pub interface: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorInvalidParameter {
    pub parameter: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorMethodNotImplemented {
    pub method: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorMethodNotFound {
    pub method: Option<String>,
}

/// Reply of `org.varlink.service.GetInfo`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ServiceInfo {
    pub vendor: Cow<'static, str>,
    pub product: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub url: Cow<'static, str>,
    pub interfaces: Vec<Cow<'static, str>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct GetInterfaceDescriptionArgs {
    pub interface: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct GetInterfaceDescriptionReply {
    pub description: String,
}

struct Registered {
    description: Cow<'static, str>,
    handler: Arc<dyn Handler>,
}

/// Routes requests to interface handlers by the interface part of the method
/// name and answers `org.varlink.service` itself.
pub struct VarlinkService {
    vendor: Cow<'static, str>,
    product: Cow<'static, str>,
    version: Cow<'static, str>,
    url: Cow<'static, str>,
    interfaces: BTreeMap<String, Registered>,
}

impl VarlinkService {
    pub fn new<S: Into<Cow<'static, str>>>(vendor: S, product: S, version: S, url: S) -> Self {
        VarlinkService {
            vendor: vendor.into(),
            product: product.into(),
            version: version.into(),
            url: url.into(),
            interfaces: BTreeMap::new(),
        }
    }

    /// Register `handler` for the interface `description` defines.
    ///
    /// The description is parsed to learn the interface name and is served
    /// verbatim by `GetInterfaceDescription`.
    pub fn add_interface<D>(&mut self, description: D, handler: Arc<dyn Handler>) -> Result<()>
    where
        D: Into<Cow<'static, str>>,
    {
        let description = description.into();
        let name = varlink_parser::Interface::from_string(&*description)?.name;
        if name == SERVICE_INTERFACE || self.interfaces.contains_key(&name) {
            return Err(Error::DuplicateInterface(name));
        }
        debug!(interface = %name, "registered interface");
        self.interfaces.insert(
            name,
            Registered {
                description,
                handler,
            },
        );
        Ok(())
    }

    /// `org.varlink.service` first, then the registered interfaces by name.
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            vendor: self.vendor.clone(),
            product: self.product.clone(),
            version: self.version.clone(),
            url: self.url.clone(),
            interfaces: std::iter::once(SERVICE_INTERFACE.into())
                .chain(self.interfaces.keys().map(|k| k.clone().into()))
                .collect(),
        }
    }

    pub fn interface_description(&self, interface: &str) -> Option<&str> {
        if interface == SERVICE_INTERFACE {
            return Some(SERVICE_DESCRIPTION);
        }
        self.interfaces.get(interface).map(|r| r.description.as_ref())
    }

    async fn handle_service(&self, call: &mut Call<'_>, request: &Request) -> Result<()> {
        match &*request.method {
            "org.varlink.service.GetInfo" => call.close_with_reply(self.info()).await,
            "org.varlink.service.GetInterfaceDescription" => {
                let args = request
                    .parameters
                    .clone()
                    .map(serde_json::from_value::<GetInterfaceDescriptionArgs>);
                let interface = match args {
                    Some(Ok(args)) => args.interface,
                    _ => return call.reply_invalid_parameter("interface").await,
                };
                match self.interface_description(&interface) {
                    Some(description) => {
                        call.close_with_reply(GetInterfaceDescriptionReply {
                            description: description.into(),
                        })
                        .await
                    }
                    None => call.reply_interface_not_found(interface).await,
                }
            }
            method => call.reply_method_not_found(method).await,
        }
    }
}

#[async_trait]
impl Handler for VarlinkService {
    async fn handle_varlink(&self, call: &mut Call<'_>, request: &Request) -> Result<()> {
        let interface = match request.interface() {
            Some(interface) => interface,
            None => return call.reply_interface_not_found(&*request.method).await,
        };

        if interface == SERVICE_INTERFACE {
            return self.handle_service(call, request).await;
        }

        match self.interfaces.get(interface) {
            Some(registered) => registered.handler.handle_varlink(call, request).await,
            None => call.reply_interface_not_found(interface).await,
        }
    }
}
