//! Client side: many concurrent calls over one connection.
//!
//! A single reader task owns the receiving half for the lifetime of the
//! connection. Every call that expects an answer is queued when its request is
//! written; since a varlink server answers in request order, each reply belongs
//! to the call at the head of the queue. The head is only removed once its
//! final reply (`continues` not set) has been routed.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, trace};

use crate::codec::{MessageReader, MessageWriter};
use crate::error::{Error, ProtocolViolation, Result};
use crate::{Reply, Request};

/// Tunables of a client [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// How many replies of a `more` call may be buffered before the reader
    /// task waits for the caller to consume them. While it waits, no reply is
    /// delivered to any other call on the connection either, so a caller that
    /// stops polling its [`ReplyStream`] without dropping it stalls the whole
    /// connection. Values below 1 are treated as 1.
    pub reply_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            reply_queue_capacity: 16,
        }
    }
}

struct PendingCall {
    method: Cow<'static, str>,
    more: bool,
    tx: mpsc::Sender<Reply>,
}

#[derive(Default)]
struct Shared {
    pending: VecDeque<PendingCall>,
    /// First fatal error; reported to every later call.
    error: Option<Error>,
    closed: bool,
}

type BoxedWriter = MessageWriter<Box<dyn AsyncWrite + Send + Unpin>>;

struct Inner {
    writer: Mutex<BoxedWriter>,
    shared: std::sync::Mutex<Shared>,
    /// Set once the connection is closed or has failed.
    shutdown: watch::Sender<bool>,
    config: ClientConfig,
}

async fn wait_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        let closed = *rx.borrow_and_update();
        if closed || rx.changed().await.is_err() {
            return;
        }
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn error(&self) -> Error {
        self.lock().error.clone().unwrap_or(Error::ConnectionClosed)
    }

    /// Resolves once the connection is closed. Any number of tasks may wait.
    fn closed(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        wait_shutdown(self.shutdown.subscribe())
    }

    /// Record `e` as the connection's error and stop the reader.
    fn fail(&self, e: Error) {
        {
            let mut shared = self.lock();
            if shared.error.is_none() {
                shared.error = Some(e);
            }
            shared.closed = true;
        }
        self.shutdown.send_replace(true);
    }

    fn close(&self) {
        self.lock().closed = true;
        self.shutdown.send_replace(true);
    }

    /// Queue `call` (if any) and write `request`, as one step with respect to
    /// other submitters. Closing the connection aborts a submit that is
    /// waiting for the writer or stuck in a write.
    async fn submit(&self, request: &Request, call: Option<PendingCall>) -> Result<()> {
        let mut writer = tokio::select! {
            _ = self.closed() => return Err(self.error()),
            writer = self.writer.lock() => writer,
        };
        {
            let mut shared = self.lock();
            if shared.closed {
                return Err(shared.error.clone().unwrap_or(Error::ConnectionClosed));
            }
            if let Some(call) = call {
                shared.pending.push_back(call);
            }
        }

        debug!(
            method = %request.method,
            oneway = request.is_oneway(),
            more = request.wants_more(),
            "sending request"
        );
        let written = tokio::select! {
            _ = self.closed() => {
                debug!(method = %request.method, "write aborted, connection closed");
                return Err(self.error());
            }
            r = writer.write_message(request) => r,
        };
        if let Err(e) = written {
            self.fail(e);
            return Err(self.error());
        }
        Ok(())
    }

    /// Pick the delivery queue for `reply`. The head entry is popped when the
    /// reply is final.
    fn route(&self, reply: &Reply) -> Result<mpsc::Sender<Reply>> {
        let mut shared = self.lock();
        let head = shared
            .pending
            .front()
            .ok_or(ProtocolViolation::UnsolicitedReply)?;

        trace!(method = %head.method, continues = reply.continues(), "routing reply");

        if !reply.continues() {
            return shared
                .pending
                .pop_front()
                .map(|call| call.tx)
                .ok_or_else(|| ProtocolViolation::UnsolicitedReply.into());
        }
        if !head.more {
            return Err(ProtocolViolation::UnexpectedContinues {
                method: head.method.to_string(),
            }
            .into());
        }
        Ok(head.tx.clone())
    }

    /// Drop every pending delivery queue. Waiting callers then pick up the
    /// stored error.
    fn finish(&self, result: Result<()>) {
        let pending = {
            let mut shared = self.lock();
            if let Err(e) = result {
                debug!(error = %e, "connection failed");
                if shared.error.is_none() {
                    shared.error = Some(e);
                }
            }
            shared.closed = true;
            std::mem::take(&mut shared.pending)
        };
        self.shutdown.send_replace(true);
        debug!(pending = pending.len(), "connection reader stopped");
    }
}

async fn read_loop<R>(inner: Arc<Inner>, mut reader: MessageReader<R>)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let result = loop {
        let reply = tokio::select! {
            _ = inner.closed() => break Ok(()),
            r = reader.read_message::<Reply>() => match r {
                Ok(Some(reply)) => reply,
                Ok(None) => break Err(Error::ConnectionClosed),
                Err(e) => break Err(e),
            },
        };

        let tx = match inner.route(&reply) {
            Ok(tx) => tx,
            Err(e) => break Err(e),
        };

        tokio::select! {
            _ = inner.closed() => break Ok(()),
            r = tx.send(reply) => {
                if r.is_err() {
                    trace!("caller went away, reply discarded");
                }
            }
        }
    };
    inner.finish(result);

    // An aborted submit releases the writer promptly.
    if let Err(e) = inner.writer.lock().await.shutdown().await {
        debug!(error = %e, "shutting down connection");
    }
}

/// A client connection to a varlink service.
///
/// All methods take `&self`; share the connection between tasks with an
/// `Arc`. Requests are written in the order the calls acquire the connection,
/// which is also the order their replies arrive in. Dropping the connection
/// closes it.
///
/// A call future that is dropped while its request is being written leaves a
/// partial message on the wire; the connection is unusable afterwards.
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Run the varlink client protocol over `stream`. Must be called within a
    /// Tokio runtime.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Connection::with_config(stream, ClientConfig::default())
    }

    pub fn with_config<S>(stream: S, config: ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write);
        let inner = Arc::new(Inner {
            writer: Mutex::new(MessageWriter::new(writer)),
            shared: std::sync::Mutex::new(Shared::default()),
            shutdown: watch::channel(false).0,
            config,
        });
        tokio::spawn(read_loop(
            Arc::clone(&inner),
            MessageReader::new(BufReader::new(read)),
        ));
        Connection { inner }
    }

    /// Connect to a varlink address such as `unix:/run/org.example.ftl`.
    pub async fn connect(address: &str) -> Result<Self> {
        Ok(Connection::new(crate::stream::connect(address).await?))
    }

    fn request<M, In>(method: M, parameters: In) -> Result<Request>
    where
        M: Into<Cow<'static, str>>,
        In: Serialize,
    {
        Ok(Request::create(
            method,
            Some(serde_json::to_value(parameters)?),
        ))
    }

    /// Call `method` and wait for its single reply.
    ///
    /// An error reply is returned as [`Error::Rpc`] and leaves the connection
    /// usable.
    pub async fn call<M, In, Out>(&self, method: M, parameters: In) -> Result<Out>
    where
        M: Into<Cow<'static, str>>,
        In: Serialize,
        Out: DeserializeOwned,
    {
        let request = Self::request(method, parameters)?;
        let (tx, mut rx) = mpsc::channel(1);
        self.inner
            .submit(
                &request,
                Some(PendingCall {
                    method: request.method.clone(),
                    more: false,
                    tx,
                }),
            )
            .await?;

        match rx.recv().await {
            Some(reply) => Ok(serde_json::from_value(reply.into_result()?)?),
            None => Err(self.inner.error()),
        }
    }

    /// Call `method` with `more` set. The returned stream yields every reply
    /// up to and including the final one.
    pub async fn call_more<M, In, Out>(&self, method: M, parameters: In) -> Result<ReplyStream<Out>>
    where
        M: Into<Cow<'static, str>>,
        In: Serialize,
        Out: DeserializeOwned,
    {
        let mut request = Self::request(method, parameters)?;
        request.more = Some(true);
        let (tx, rx) = mpsc::channel(self.inner.config.reply_queue_capacity.max(1));
        self.inner
            .submit(
                &request,
                Some(PendingCall {
                    method: request.method.clone(),
                    more: true,
                    tx,
                }),
            )
            .await?;

        Ok(ReplyStream {
            inner: Arc::clone(&self.inner),
            rx,
            has_more: true,
            failed: None,
            _out: PhantomData,
        })
    }

    /// Send `method` with `oneway` set. Nothing is queued and no reply is
    /// awaited; only a failure to write the request is reported.
    pub async fn oneway<M, In>(&self, method: M, parameters: In) -> Result<()>
    where
        M: Into<Cow<'static, str>>,
        In: Serialize,
    {
        let mut request = Self::request(method, parameters)?;
        request.oneway = Some(true);
        self.inner.submit(&request, None).await
    }

    /// Number of calls still waiting for their final reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// `true` once the connection has failed or was closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Close the connection. Every pending and later call fails with the stored
    /// error, or [`Error::ConnectionClosed`] if there is none, including a call
    /// whose request is still being written. The sending half is shut down by
    /// the reader task once that write has been abandoned.
    pub async fn close(&self) {
        self.inner.close();
        tokio::task::yield_now().await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// Replies of a call made with [`Connection::call_more`].
pub struct ReplyStream<Out> {
    inner: Arc<Inner>,
    rx: mpsc::Receiver<Reply>,
    has_more: bool,
    failed: Option<Error>,
    _out: PhantomData<fn() -> Out>,
}

impl<Out: DeserializeOwned> ReplyStream<Out> {
    /// The next reply, or `Ok(None)` once the final reply has been returned.
    ///
    /// An error reply ends the stream unless it is marked as continuing. If the
    /// connection fails first, its error is returned now and on every later
    /// call.
    pub async fn next(&mut self) -> Result<Option<Out>> {
        if let Some(ref e) = self.failed {
            return Err(e.clone());
        }
        if !self.has_more {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(reply) => {
                self.has_more = reply.continues();
                Ok(Some(serde_json::from_value(reply.into_result()?)?))
            }
            None => {
                let e = self.inner.error();
                self.failed = Some(e.clone());
                Err(e)
            }
        }
    }

    /// `false` once the final reply has been returned by [`next`](Self::next).
    pub fn has_more(&self) -> bool {
        self.has_more
    }
}
