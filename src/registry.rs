use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use codec::{Netid, RegistryRequest, RegistryResponse};
use tokio::{net::UdpSocket, time::timeout};

/// How long to wait for a registry reply. One attempt per user action, no
/// retries.
pub const UDP_TIMEOUT: Duration = Duration::from_secs(5);

/// Stateless UDP request/response client for the registration server.
///
/// Exchanges are synchronous from the caller's point of view: a join or
/// leave blocks until the reply arrives or the timeout fires, which is fine
/// because the user has no further action until it returns.
pub struct RegistryClient {
    socket: Arc<UdpSocket>,
    server: SocketAddr,
}

impl RegistryClient {
    pub async fn bind(server: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("failed to create registry socket")?;

        Ok(Self {
            socket: Arc::new(socket),
            server,
        })
    }

    /// The underlying socket, for the event loop's idle drain arm.
    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub async fn register(&self, net: Netid, addr: SocketAddr) -> Result<()> {
        match self
            .exchange(&RegistryRequest::Register { net, addr })
            .await?
        {
            RegistryResponse::RegisterOk => Ok(()),
            other => bail!("unexpected registry reply: {:?}", other),
        }
    }

    pub async fn unregister(&self, net: Netid, addr: SocketAddr) -> Result<()> {
        match self
            .exchange(&RegistryRequest::Unregister { net, addr })
            .await?
        {
            RegistryResponse::UnregisterOk => Ok(()),
            other => bail!("unexpected registry reply: {:?}", other),
        }
    }

    /// Ask for the members of a network. The reply's netid must match the
    /// request; anything else is a protocol error surfaced to the caller.
    pub async fn nodes(&self, net: Netid) -> Result<Vec<SocketAddr>> {
        match self.exchange(&RegistryRequest::Nodes { net }).await? {
            RegistryResponse::NodesList { net: reply, nodes } if reply == net => Ok(nodes),
            other => bail!("unexpected registry reply: {:?}", other),
        }
    }

    async fn exchange(&self, request: &RegistryRequest) -> Result<RegistryResponse> {
        // Anything already queued on the socket belongs to no request.
        let mut scratch = [0u8; 2048];
        while let Ok((size, addr)) = self.socket.try_recv_from(&mut scratch) {
            log::warn!("stale registry datagram dropped: size={}, addr={}", size, addr);
        }

        self.socket
            .send_to(request.encode().as_bytes(), self.server)
            .await
            .context("failed to reach the registry")?;

        let mut buf = [0u8; 65535];
        let (size, addr) = timeout(UDP_TIMEOUT, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| anyhow!("registry did not answer within {:?}", UDP_TIMEOUT))?
            .context("registry receive failed")?;

        log::trace!("registry reply: size={}, addr={}", size, addr);

        let text = String::from_utf8_lossy(&buf[..size]);
        RegistryResponse::parse(&text).map_err(|err| anyhow!("bad registry reply: {}", err))
    }
}
