use std::borrow::Cow;
use std::io;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Errors of the varlink protocol engine.
///
/// The type is cheap to clone: a client connection keeps its fatal error and
/// hands a copy to every call that observes the failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
    #[error("connection closed")]
    ConnectionClosed,
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("parameters do not match the expected type: {0}")]
    Parameters(#[source] Arc<serde_json::Error>),
    #[error("invalid varlink address `{0}`")]
    InvalidAddress(String),
    #[error("interface `{0}` is already registered")]
    DuplicateInterface(String),
    #[error("invalid interface definition: {0}")]
    Interface(#[from] varlink_parser::Error),
    #[error("handler failed: {0}")]
    Handler(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

/// The byte stream does not carry well-formed messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FramingError {
    #[error("stream ended inside a message ({buffered} bytes without terminator)")]
    Truncated { buffered: usize },
    #[error("undecodable message: {0}")]
    Decode(#[source] Arc<serde_json::Error>),
    #[error("cannot encode message: {0}")]
    Encode(#[source] Arc<serde_json::Error>),
}

/// The peer broke the request/reply contract. Always fatal for the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("reply to `{method}` continues, but the call did not ask for more")]
    UnexpectedContinues { method: String },
    #[error("reply received while no call is pending")]
    UnsolicitedReply,
    #[error("connection upgrades are not supported")]
    UpgradeNotSupported,
    #[error("`{method}` returned without sending a final reply")]
    MissingReply { method: String },
}

/// Misuse of a server-side [`Call`](crate::Call). Nothing is written to the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("`{method}`: continuing reply to a request without `more`")]
    ReplyWithoutMore { method: String },
    #[error("`{method}` has already sent its final reply")]
    AlreadyReplied { method: String },
}

/// A named error reply, e.g. `org.varlink.service.MethodNotFound`.
///
/// On the client it is returned for exactly the call it answers. A server
/// handler returns it to have it sent as the final reply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("call failed with {name}")]
pub struct RpcError {
    pub name: Cow<'static, str>,
    pub parameters: Value,
}

impl RpcError {
    pub fn new<N, T>(name: N, parameters: T) -> Result<Self>
    where
        N: Into<Cow<'static, str>>,
        T: serde::Serialize,
    {
        Ok(RpcError {
            name: name.into(),
            parameters: serde_json::to_value(parameters)?,
        })
    }

    /// Decode the error payload, e.g. into [`ErrorMethodNotFound`](crate::ErrorMethodNotFound).
    pub fn parameters_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.parameters.clone())?)
    }
}

impl Error {
    /// Wrap an arbitrary handler failure. The server drops the connection on it.
    pub fn handler<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Handler(Arc::new(e))
    }

    pub fn rpc(&self) -> Option<&RpcError> {
        match self {
            Error::Rpc(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(Arc::new(e)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parameters(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
