//! Server side: one sequential request loop per connection.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tracing::{debug, warn};

use crate::codec::{MessageReader, MessageWriter};
use crate::error::{CallError, Error, ProtocolViolation, Result};
use crate::service::{
    ErrorInterfaceNotFound, ErrorInvalidParameter, ErrorMethodNotFound,
    ErrorMethodNotImplemented,
};
use crate::stream::Listener;
use crate::{Reply, Request};

type BoxedWriter = MessageWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// Processes the requests of a connection, one at a time.
///
/// Unless the request is `oneway`, the handler must send exactly one final
/// reply, either through [`Call::close_with_reply`] (or one of the error
/// helpers) or by returning [`Error::Rpc`], which is then sent for it. Any
/// other error drops the connection.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle_varlink(&self, call: &mut Call<'_>, request: &Request) -> Result<()>;
}

/// The reply side of one request.
pub struct Call<'a> {
    writer: &'a mut BoxedWriter,
    request: &'a Request,
    done: bool,
}

impl<'a> Call<'a> {
    fn new(writer: &'a mut BoxedWriter, request: &'a Request) -> Self {
        Call {
            writer,
            request,
            done: false,
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn wants_more(&self) -> bool {
        self.request.wants_more()
    }

    pub fn is_oneway(&self) -> bool {
        self.request.is_oneway()
    }

    /// `true` once the final reply has been sent.
    pub fn is_done(&self) -> bool {
        self.done
    }

    async fn send(&mut self, reply: Reply) -> Result<()> {
        if self.done {
            return Err(CallError::AlreadyReplied {
                method: self.request.method.to_string(),
            }
            .into());
        }
        if reply.continues() {
            if !self.request.wants_more() {
                return Err(CallError::ReplyWithoutMore {
                    method: self.request.method.to_string(),
                }
                .into());
            }
        } else {
            self.done = true;
        }

        if self.request.is_oneway() {
            return Ok(());
        }
        self.writer.write_message(&reply).await
    }

    /// Send a continuing reply. Only valid if the request has `more` set.
    pub async fn reply<T: Serialize>(&mut self, parameters: T) -> Result<()> {
        let mut reply = Reply::parameters(Some(serde_json::to_value(parameters)?));
        reply.continues = Some(true);
        self.send(reply).await
    }

    /// Send the final reply.
    pub async fn close_with_reply<T: Serialize>(&mut self, parameters: T) -> Result<()> {
        self.send(Reply::parameters(Some(serde_json::to_value(parameters)?)))
            .await
    }

    /// Send a named error as the final reply.
    pub async fn reply_error<N, T>(&mut self, name: N, parameters: T) -> Result<()>
    where
        N: Into<Cow<'static, str>>,
        T: Serialize,
    {
        self.send(Reply::error(name, Some(serde_json::to_value(parameters)?)))
            .await
    }

    pub async fn reply_interface_not_found<S: Into<String>>(&mut self, interface: S) -> Result<()> {
        self.reply_error(
            "org.varlink.service.InterfaceNotFound",
            ErrorInterfaceNotFound {
                interface: Some(interface.into()),
            },
        )
        .await
    }

    pub async fn reply_method_not_found<S: Into<String>>(&mut self, method: S) -> Result<()> {
        self.reply_error(
            "org.varlink.service.MethodNotFound",
            ErrorMethodNotFound {
                method: Some(method.into()),
            },
        )
        .await
    }

    pub async fn reply_method_not_implemented<S: Into<String>>(&mut self, method: S) -> Result<()> {
        self.reply_error(
            "org.varlink.service.MethodNotImplemented",
            ErrorMethodNotImplemented {
                method: Some(method.into()),
            },
        )
        .await
    }

    pub async fn reply_invalid_parameter<S: Into<String>>(&mut self, parameter: S) -> Result<()> {
        self.reply_error(
            "org.varlink.service.InvalidParameter",
            ErrorInvalidParameter {
                parameter: Some(parameter.into()),
            },
        )
        .await
    }
}

/// Serve requests from `stream` until the peer closes it.
///
/// Returns `Ok(())` on a clean end of stream. Framing errors, upgrade
/// requests, handler failures and handlers that leave a call unanswered end
/// the connection with an error.
pub async fn serve_connection<S, H>(stream: S, handler: &H) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    H: Handler + ?Sized,
{
    let (read, write) = tokio::io::split(stream);
    let mut reader = MessageReader::new(BufReader::new(read));
    let write: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write);
    let mut writer = MessageWriter::new(write);

    while let Some(request) = reader.read_message::<Request>().await? {
        if request.wants_upgrade() {
            return Err(ProtocolViolation::UpgradeNotSupported.into());
        }

        debug!(
            method = %request.method,
            oneway = request.is_oneway(),
            more = request.wants_more(),
            "handling request"
        );

        let mut call = Call::new(&mut writer, &request);
        match handler.handle_varlink(&mut call, &request).await {
            Ok(()) => {}
            Err(Error::Rpc(e)) => {
                if request.is_oneway() {
                    continue;
                }
                call.send(Reply::from(e)).await?;
            }
            Err(e) => return Err(e),
        }

        if !request.is_oneway() && !call.is_done() {
            return Err(ProtocolViolation::MissingReply {
                method: request.method.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Accepts connections and serves each one on its own task.
pub struct Server<H: ?Sized> {
    handler: Arc<H>,
}

impl<H: Handler + ?Sized + 'static> Server<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Server { handler }
    }

    /// Run the accept loop. Returns only if accepting fails; failures of
    /// individual connections are logged.
    pub async fn serve(&self, listener: Listener) -> Result<()> {
        loop {
            let stream = listener.accept().await?;
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                match serve_connection(stream, &*handler).await {
                    Ok(()) => debug!("connection closed by peer"),
                    Err(Error::ConnectionClosed) => debug!("connection reset"),
                    Err(e) => warn!(error = %e, "serving connection"),
                }
            });
        }
    }
}

/// Bind `address` and serve `handler` on it.
pub async fn listen<H: Handler + ?Sized + 'static>(handler: Arc<H>, address: &str) -> Result<()> {
    let listener = Listener::bind(address).await?;
    Server::new(handler).serve(listener).await
}
