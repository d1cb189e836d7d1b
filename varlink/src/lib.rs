//! Client and server support for the [varlink protocol](http://varlink.org).
//!
//! Varlink exchanges JSON objects over a stream socket, each object terminated
//! by a single NUL byte. A client sends [`Request`]s; a server answers every
//! request that is not `oneway` with one final [`Reply`], optionally preceded
//! by continuing replies if the request asked for `more`. Replies come back in
//! the order the requests were sent.
//!
//! A [`Connection`] multiplexes any number of concurrent calls over one socket:
//!
//! ```no_run
//! # async fn run() -> varlink::Result<()> {
//! use serde_json::{json, Value};
//!
//! let conn = varlink::Connection::connect("unix:/run/org.example.ping").await?;
//! let reply: Value = conn.call("org.example.ping.Ping", json!({"ping": "hello"})).await?;
//! assert_eq!(reply["pong"], "hello");
//! # Ok(())
//! # }
//! ```
//!
//! A server implements [`Handler`] and runs it with [`listen`], usually behind
//! a [`VarlinkService`] that answers the `org.varlink.service` introspection
//! methods and routes everything else by interface name:
//!
//! ```no_run
//! use std::sync::Arc;
//! use varlink::{async_trait, Call, Handler, Request, VarlinkService};
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Handler for Ping {
//!     async fn handle_varlink(&self, call: &mut Call<'_>, req: &Request) -> varlink::Result<()> {
//!         match &*req.method {
//!             "org.example.ping.Ping" => {
//!                 let ping = req.parameters.clone().unwrap_or_default();
//!                 call.close_with_reply(serde_json::json!({ "pong": ping["ping"] }))
//!                     .await
//!             }
//!             m => call.reply_method_not_found(m).await,
//!         }
//!     }
//! }
//!
//! # async fn run() -> varlink::Result<()> {
//! let mut service = VarlinkService::new("org.example", "Ping", "1", "http://example.org");
//! service.add_interface(
//!     "interface org.example.ping\nmethod Ping(ping: string) -> (pong: string)\n",
//!     Arc::new(Ping),
//! )?;
//! varlink::listen(Arc::new(service), "unix:/run/org.example.ping").await
//! # }
//! ```

#![doc(
    html_logo_url = "https://varlink.org/images/varlink.png",
    html_favicon_url = "https://varlink.org/images/varlink-small.png"
)]

use std::borrow::Cow;

use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

mod client;
pub mod codec;
mod error;
mod server;
mod service;
mod stream;


pub use async_trait::async_trait;

pub use crate::client::{ClientConfig, Connection, ReplyStream};
pub use crate::error::{CallError, Error, FramingError, ProtocolViolation, Result, RpcError};
pub use crate::server::{listen, serve_connection, Call, Handler, Server};
pub use crate::service::{
    ErrorInterfaceNotFound, ErrorInvalidParameter, ErrorMethodNotFound,
    ErrorMethodNotImplemented, GetInterfaceDescriptionArgs, GetInterfaceDescriptionReply,
    ServiceInfo, VarlinkService,
};
pub use crate::stream::{connect, Address, Listener, Stream};

/// A varlink request as it travels on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Request {
    pub method: Cow<'static, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneway: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<bool>,
}

impl Request {
    pub fn create<S: Into<Cow<'static, str>>>(method: S, parameters: Option<Value>) -> Self {
        Request {
            method: method.into(),
            parameters,
            ..Default::default()
        }
    }

    pub fn is_oneway(&self) -> bool {
        self.oneway.unwrap_or(false)
    }

    pub fn wants_more(&self) -> bool {
        self.more.unwrap_or(false)
    }

    pub fn wants_upgrade(&self) -> bool {
        self.upgrade.unwrap_or(false)
    }

    /// The interface part of `method`, i.e. everything before the last `.`.
    pub fn interface(&self) -> Option<&str> {
        self.method.rfind('.').map(|n| &self.method[..n])
    }
}

/// A varlink reply as it travels on the wire.
///
/// A reply with `error` set is a failed call; its payload is in `parameters`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Reply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continues: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Cow<'static, str>>,
}

impl Reply {
    pub fn parameters(parameters: Option<Value>) -> Self {
        Reply {
            parameters,
            continues: None,
            error: None,
        }
    }

    pub fn error<S: Into<Cow<'static, str>>>(name: S, parameters: Option<Value>) -> Self {
        Reply {
            parameters,
            continues: None,
            error: Some(name.into()),
        }
    }

    pub fn continues(&self) -> bool {
        self.continues.unwrap_or(false)
    }

    /// Split into the payload or the named error it carries. A missing
    /// payload reads as the empty object.
    pub fn into_result(self) -> std::result::Result<Value, RpcError> {
        let parameters = self
            .parameters
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        match self.error {
            Some(name) if !name.is_empty() => Err(RpcError { name, parameters }),
            _ => Ok(parameters),
        }
    }
}

impl From<RpcError> for Reply {
    fn from(e: RpcError) -> Self {
        Reply::error(e.name, Some(e.parameters))
    }
}
