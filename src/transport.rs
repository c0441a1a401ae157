//! Module that wraps the TCP primitives the ring is built on.

use crate::error::{Result, RingError};
use crate::wire::{Expect, Frame, WireCodec, WireError};
use futures::{SinkExt, StreamExt};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::codec::Framed;

/// Function that binds a listener on every interface, on `port` or on an OS-assigned port when `None`.
pub fn open_listener(port: Option<u16>, backlog: u32) -> Result<TcpListener> {
    let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port.unwrap_or(0));
    let what = format!("listen on port {}", port.unwrap_or(0));

    let socket = TcpSocket::new_v4().map_err(|e| RingError::setup(&what, e))?;
    socket
        .set_reuseaddr(true)
        .map_err(|e| RingError::setup(&what, e))?;
    socket.bind(address).map_err(|e| RingError::setup(&what, e))?;
    socket.listen(backlog).map_err(|e| RingError::setup(&what, e))
}

pub fn local_port_of(listener: &TcpListener) -> Result<u16> {
    listener
        .local_addr()
        .map(|address| address.port())
        .map_err(|e| RingError::setup("read the listener port", e))
}

/// Function that accepts one inbound connection, expecting `expect` as its first record.
pub async fn accept_one(listener: &TcpListener, expect: Expect) -> Result<(Link, SocketAddr)> {
    let (stream, peer) = listener
        .accept()
        .await
        .map_err(|e| RingError::setup("accept a connection", e))?;
    Ok((Link::new(stream, expect), peer))
}

pub async fn connect_to(host: &str, port: u16, expect: Expect) -> Result<Link> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| RingError::setup(format!("connect to {host}:{port}"), e))?;
    Ok(Link::new(stream, expect))
}

/// An established connection carrying fixed-size records.
pub struct Link {
    framed: Framed<TcpStream, WireCodec>,
    closed: bool,
}

impl Link {
    pub fn new(stream: TcpStream, expect: Expect) -> Self {
        Self {
            framed: Framed::new(stream, WireCodec::new(expect)),
            closed: false,
        }
    }

    /// Function that changes which record the next read produces.
    pub fn expect(&mut self, expect: Expect) {
        self.framed.codec_mut().expect(expect);
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.framed
            .get_ref()
            .peer_addr()
            .map_err(|e| RingError::setup("read the peer address", e))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.framed
            .get_ref()
            .local_addr()
            .map_err(|e| RingError::setup("read the local address", e))
    }

    /// Whether the remote end has already been seen closing.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Function that writes a whole record, flushing it before returning.
    pub async fn send_all(&mut self, frame: Frame, peer: impl ToString) -> Result<()> {
        self.framed.send(frame).await.map_err(|e| match e {
            WireError::Malformed(msg) => RingError::MalformedMessage(msg),
            _ => RingError::disconnected(peer),
        })
    }

    /// Function that blocks until one whole record has arrived.
    pub async fn recv_exact(&mut self, peer: impl ToString) -> Result<Frame> {
        let next = self.framed.next().await;
        self.settle(next, peer)
    }

    /// Function that maps the outcome of a read, remembering when the stream has ended.
    pub(crate) fn settle(
        &mut self,
        next: Option<std::result::Result<Frame, WireError>>,
        peer: impl ToString,
    ) -> Result<Frame> {
        match next {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(WireError::Malformed(msg))) => Err(RingError::MalformedMessage(format!(
                "{msg} (from {})",
                peer.to_string()
            ))),
            Some(Err(_)) | None => {
                self.closed = true;
                Err(RingError::disconnected(peer))
            }
        }
    }

    pub(crate) fn framed_mut(&mut self) -> &mut Framed<TcpStream, WireCodec> {
        &mut self.framed
    }
}
