use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result, anyhow};
use bytes::BytesMut;
use service::Interface;
use tokio::{
    io::AsyncReadExt,
    net::{TcpStream, tcp::OwnedReadHalf},
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::timeout,
};

use crate::node::Event;

/// Bound on an outgoing TCP connect; never an unbounded blocking dial.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Dial a peer's listening address.
pub async fn connect(addr: SocketAddr) -> Result<TcpStream> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| anyhow!("connect to {} timed out", addr))?
        .with_context(|| format!("connect to {} failed", addr))?;

    // Protocol messages are tiny and latency matters more than batching.
    if let Err(err) = stream.set_nodelay(true) {
        log::warn!("tcp socket set nodelay failed: addr={}, err={}", addr, err);
    }

    Ok(stream)
}

/// Read half of one peer connection.
///
/// Raw chunks are pushed into the event queue; line framing happens in the
/// event loop inside the neighbor's own buffer, so messages of one peer are
/// processed strictly in arrival order. A zero-length read or an error is
/// forwarded as a close event and ends the task.
pub fn spawn_reader(
    interface: Interface,
    mut reader: OwnedReadHalf,
    events: UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(1024);

        loop {
            match reader.read_buf(&mut buf).await {
                Ok(0) | Err(_) => {
                    let _ = events.send(Event::Closed(interface));
                    break;
                }
                Ok(_) => {
                    if events.send(Event::Data(interface, buf.split().freeze())).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
