// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Connection plumbing: transport descriptors, dialing, listening, and
//! framed connections.

use crate::frame::{decode, encode, read_message, write_message};
use crate::request::Request;
use crate::response::{ErrorKind, Response};
use crate::WireError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio_util::either::Either;

/// How long a dial may take before it is abandoned.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// How a settled executor is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum Transport {
    Unix { socket_path: PathBuf },
    Tcp { address: String },
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Unix { socket_path } => write!(f, "unix:{}", socket_path.display()),
            Transport::Tcp { address } => write!(f, "tcp://{address}"),
        }
    }
}

type Conn = Either<UnixStream, TcpStream>;

/// Dials `transport` and returns a framed connection.
pub async fn dial(transport: &Transport) -> Result<Connection, WireError> {
    let connect = async {
        match transport {
            Transport::Unix { socket_path } => {
                UnixStream::connect(socket_path).await.map(Either::Left)
            }
            Transport::Tcp { address } => {
                TcpStream::connect(address.as_str()).await.map(Either::Right)
            }
        }
    };
    let conn = tokio::time::timeout(DIAL_TIMEOUT, connect)
        .await
        .map_err(|_| WireError::DialTimeout(DIAL_TIMEOUT))??;
    Ok(Connection { conn })
}

/// One framed connection; carries exactly one RPC.
pub struct Connection {
    conn: Conn,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    /// Writes one frame.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> Result<(), WireError> {
        let payload = encode(msg)?;
        write_message(&mut self.conn, &payload).await
    }

    /// Reads one frame; `None` on clean EOF.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, WireError> {
        match read_message(&mut self.conn).await? {
            Some(payload) => Ok(Some(decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Reads one [`Response`], mapping error frames and EOF to errors.
    pub async fn recv_response(&mut self) -> Result<Response, WireError> {
        match self.recv::<Response>().await? {
            Some(Response::Error { kind, message }) => Err(WireError::Remote { kind, message }),
            Some(response) => Ok(response),
            None => Err(WireError::MissingReply),
        }
    }

    /// Writes an error frame; used by servers to fail a request.
    pub async fn send_error(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Result<(), WireError> {
        self.send(&Response::Error { kind, message: message.into() }).await
    }
}

enum ListenerKind {
    Unix(UnixListener),
    Tcp(TcpListener),
}

/// Bound accept socket for one service endpoint.
pub struct Listener {
    kind: ListenerKind,
    transport: Transport,
}

impl Listener {
    /// Binds `transport`. For TCP a `:0` port is resolved to the actual
    /// bound port in [`Listener::transport`].
    pub async fn bind(transport: &Transport) -> Result<Self, WireError> {
        match transport {
            Transport::Unix { socket_path } => {
                let listener = UnixListener::bind(socket_path)?;
                Ok(Self {
                    kind: ListenerKind::Unix(listener),
                    transport: transport.clone(),
                })
            }
            Transport::Tcp { address } => {
                let listener = TcpListener::bind(address.as_str()).await?;
                let address = listener.local_addr()?.to_string();
                Ok(Self {
                    kind: ListenerKind::Tcp(listener),
                    transport: Transport::Tcp { address },
                })
            }
        }
    }

    /// The dialable descriptor for this listener.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Accepts the next connection.
    pub async fn accept(&self) -> Result<Connection, WireError> {
        let conn = match &self.kind {
            ListenerKind::Unix(listener) => Either::Left(listener.accept().await?.0),
            ListenerKind::Tcp(listener) => Either::Right(listener.accept().await?.0),
        };
        Ok(Connection { conn })
    }
}

/// Client handle for a remote service endpoint.
///
/// Dials per call: unary calls get one request/response exchange,
/// streaming calls hand the open connection back to the caller.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
}

impl Client {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// One request, one reply.
    pub async fn unary(&self, request: &Request) -> Result<Response, WireError> {
        let mut conn = dial(&self.transport).await?;
        conn.send(request).await?;
        conn.recv_response().await
    }

    /// Sends `request` and returns the connection for streaming frames.
    pub async fn stream(&self, request: &Request) -> Result<Connection, WireError> {
        let mut conn = dial(&self.transport).await?;
        conn.send(request).await?;
        Ok(conn)
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
