use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use crate::error::{Error, Result};

/// A bidirectional byte stream a connection can run on.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

/// A parsed varlink address.
///
/// `tcp:host:port`, `unix:/path/to/socket` or `unix:@name` for a Linux
/// abstract socket. Anything after a `;` (e.g. `;mode=0666`) is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Tcp(String),
    Unix(String),
    UnixAbstract(String),
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(address: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(address.into());
        let (scheme, rest) = address.split_once(':').ok_or_else(invalid)?;
        let rest = rest.split(';').next().unwrap_or(rest);
        if rest.is_empty() {
            return Err(invalid());
        }
        match scheme {
            "tcp" => Ok(Address::Tcp(rest.into())),
            "unix" => match rest.strip_prefix('@') {
                Some("") => Err(invalid()),
                Some(name) => Ok(Address::UnixAbstract(name.into())),
                None => Ok(Address::Unix(rest.into())),
            },
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Tcp(a) => write!(f, "tcp:{}", a),
            Address::Unix(a) => write!(f, "unix:{}", a),
            Address::UnixAbstract(a) => write!(f, "unix:@{}", a),
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn abstract_path(name: &str) -> Result<String> {
    Ok(format!("\0{}", name))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn abstract_path(name: &str) -> Result<String> {
    Err(Error::InvalidAddress(format!("unix:@{}", name)))
}

/// Open a client stream to `address`.
pub async fn connect(address: &str) -> Result<Box<dyn Stream>> {
    let address: Address = address.parse()?;
    debug!(%address, "connecting");
    match address {
        Address::Tcp(addr) => Ok(Box::new(TcpStream::connect(addr).await?)),
        #[cfg(unix)]
        Address::Unix(path) => Ok(Box::new(UnixStream::connect(path).await?)),
        #[cfg(unix)]
        Address::UnixAbstract(name) => {
            Ok(Box::new(UnixStream::connect(abstract_path(&name)?).await?))
        }
        #[cfg(not(unix))]
        a => Err(Error::InvalidAddress(a.to_string())),
    }
}

/// A bound server socket.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Bind to `address`. A stale socket file at a `unix:` path is removed first.
    pub async fn bind(address: &str) -> Result<Self> {
        let address: Address = address.parse()?;
        debug!(%address, "listening");
        match address {
            Address::Tcp(addr) => Ok(Listener::Tcp(TcpListener::bind(addr).await?)),
            #[cfg(unix)]
            Address::Unix(path) => {
                let _ = std::fs::remove_file(&path);
                Ok(Listener::Unix(UnixListener::bind(path)?))
            }
            #[cfg(unix)]
            Address::UnixAbstract(name) => {
                Ok(Listener::Unix(UnixListener::bind(abstract_path(&name)?)?))
            }
            #[cfg(not(unix))]
            a => Err(Error::InvalidAddress(a.to_string())),
        }
    }

    pub async fn accept(&self) -> Result<Box<dyn Stream>> {
        match self {
            Listener::Tcp(l) => {
                let (stream, peer) = l.accept().await?;
                debug!(%peer, "accepted connection");
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            Listener::Unix(l) => {
                let (stream, _) = l.accept().await?;
                debug!("accepted connection");
                Ok(Box::new(stream))
            }
        }
    }
}
