use std::{net::SocketAddr, sync::Arc, time::Duration};

use ahash::{HashMap, HashMapExt};
use anyhow::{Context, Result};
use bytes::Bytes;
use codec::{Message, Netid};
use service::{Interface, InterestTable, Neighbor, NeighborTable, ObjectStore};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream, UdpSocket, tcp::OwnedWriteHalf},
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

use crate::{
    commands::{self, Outcome},
    config::Config,
    forwarding,
    registry::RegistryClient,
    server, topology,
};

/// Event-loop wakeup cadence; the PIT sweep runs at least this often.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// A wire event produced by a peer reader task.
#[derive(Debug)]
pub enum Event {
    /// A raw read chunk, not yet line framed.
    Data(Interface, Bytes),
    /// The peer closed the connection or the read failed.
    Closed(Interface),
}

struct PeerIo {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

/// The whole mutable state of a node.
///
/// Owned exclusively by the event loop and handed to handlers by mutable
/// reference; the single-threaded model makes that safe without locks.
pub struct NodeState {
    /// Own listening address, the one advertised in `ENTRY`.
    pub addr: SocketAddr,
    pub netid: Option<Netid>,
    /// Whether the registry currently holds a `REG` for this node.
    pub registered: bool,
    /// Interface of the unique peer through which the rest of the tree is
    /// reached.
    pub external: Option<Interface>,
    /// Listening address to reconnect to if the external link fails.
    pub safety: Option<SocketAddr>,
    pub neighbors: NeighborTable,
    pub store: ObjectStore,
    pub pit: InterestTable,
    pub registry: RegistryClient,
    peers: HashMap<Interface, PeerIo>,
    events: UnboundedSender<Event>,
}

impl NodeState {
    pub fn in_network(&self) -> bool {
        self.netid.is_some()
    }

    /// The external neighbor's listening address, if any.
    pub fn external_addr(&self) -> Option<SocketAddr> {
        self.external.and_then(|it| self.neighbors.addr_of(it))
    }

    /// Register a connection: allocate its interface, keep the write half
    /// and hand the read half to a reader task.
    pub fn attach(&mut self, stream: TcpStream, addr: SocketAddr) -> Result<Interface> {
        let interface = self
            .neighbors
            .insert(addr)
            .context("interface ids exhausted")?;

        let (reader, writer) = stream.into_split();
        let reader = server::spawn_reader(interface, reader, self.events.clone());
        self.peers.insert(interface, PeerIo { writer, reader });

        Ok(interface)
    }

    /// Drop a connection and its neighbor record. The reader task is
    /// stopped here; a close event it may already have queued is ignored
    /// once the interface is gone.
    pub fn detach(&mut self, interface: Interface) -> Option<Neighbor> {
        if let Some(peer) = self.peers.remove(&interface) {
            peer.reader.abort();
        }

        self.neighbors.remove(interface)
    }

    pub fn detach_all(&mut self) {
        for interface in self.neighbors.interfaces() {
            self.detach(interface);
        }
    }

    /// Write one message to one peer. Failures are logged and reported to
    /// the caller; the connection itself is torn down by the normal repair
    /// path once the read side observes the close.
    pub async fn send(&mut self, interface: Interface, message: &Message) -> bool {
        let Some(peer) = self.peers.get_mut(&interface) else {
            return false;
        };

        match peer.writer.write_all(message.encode().as_bytes()).await {
            Ok(()) => true,
            Err(err) => {
                log::warn!("write failed: interface={}, err={}", interface, err);
                false
            }
        }
    }
}

/// Command intake of a running node. Production feeds it from stdin,
/// integration tests drive it directly.
pub struct NodeHandle {
    commands: UnboundedSender<String>,
}

impl NodeHandle {
    pub fn command(&self, line: &str) -> bool {
        self.commands.send(line.to_string()).is_ok()
    }
}

pub struct Node {
    state: NodeState,
    listener: TcpListener,
    commands: UnboundedReceiver<String>,
    events: UnboundedReceiver<Event>,
}

impl Node {
    /// Bind the listener and the registry socket and assemble the initial
    /// state. Failure here is fatal for the process.
    pub async fn bind(config: &Config) -> Result<(Self, NodeHandle)> {
        let listener = TcpListener::bind(config.listen_addr())
            .await
            .with_context(|| format!("failed to bind listener on {}", config.listen_addr()))?;

        // Port 0 resolves to an ephemeral port at bind time; advertise the
        // resolved one.
        let addr = SocketAddr::from((config.ip, listener.local_addr()?.port()));
        let registry = RegistryClient::bind(config.registry_addr()).await?;

        let (commands_tx, commands_rx) = unbounded_channel();
        let (events_tx, events_rx) = unbounded_channel();

        log::info!(
            "node listening: addr={}, cache={}, registry={}",
            addr,
            config.cache,
            config.registry_addr(),
        );

        Ok((
            Self {
                state: NodeState {
                    addr,
                    netid: None,
                    registered: false,
                    external: None,
                    safety: None,
                    neighbors: NeighborTable::default(),
                    store: ObjectStore::new(config.cache),
                    pit: InterestTable::default(),
                    registry,
                    peers: HashMap::new(),
                    events: events_tx,
                },
                listener,
                commands: commands_rx,
                events: events_rx,
            },
            NodeHandle {
                commands: commands_tx,
            },
        ))
    }

    /// The resolved listening address.
    pub fn local_addr(&self) -> SocketAddr {
        self.state.addr
    }

    /// Drive the node until `exit`, stdin closing, or SIGINT.
    ///
    /// One wakeup handles one event; the arms are ordered so a queued CLI
    /// command wins over wire traffic, and every wakeup ends with the PIT
    /// timeout sweep.
    pub async fn run(mut self) -> Result<()> {
        let mut sweep = interval(TICK_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let udp = self.state.registry.socket();

            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    log::info!("interrupted, leaving the network");
                    topology::shutdown(&mut self.state).await;
                    return Ok(());
                }
                line = self.commands.recv() => match line {
                    Some(line) => {
                        if commands::dispatch(&mut self.state, &line).await == Outcome::Exit {
                            topology::shutdown(&mut self.state).await;
                            return Ok(());
                        }
                    }
                    // Command intake is gone, nothing can drive us anymore.
                    None => {
                        topology::shutdown(&mut self.state).await;
                        return Ok(());
                    }
                },
                result = self.listener.accept() => match result {
                    Ok((stream, addr)) => accept(&mut self.state, stream, addr),
                    Err(err) => log::warn!("tcp accept error: {}", err),
                },
                event = self.events.recv() => if let Some(event) = event {
                    handle_event(&mut self.state, event).await;
                },
                datagram = recv_datagram(udp) => if let Ok((size, addr)) = datagram {
                    log::warn!("unsolicited registry datagram dropped: size={}, addr={}", size, addr);
                },
                _ = sweep.tick() => {}
            }

            forwarding::sweep(&mut self.state).await;
        }
    }
}

fn accept(state: &mut NodeState, stream: TcpStream, addr: SocketAddr) {
    log::info!("tcp socket accept: addr={}", addr);

    if let Err(err) = stream.set_nodelay(true) {
        log::warn!("tcp socket set nodelay failed: addr={}, err={}", addr, err);
    }

    // The accepted port is ephemeral and not authoritative; the neighbor is
    // provisional until its first ENTRY rebinds it to the advertised
    // listening address.
    if let Err(err) = state.attach(stream, addr) {
        log::warn!("rejecting connection: addr={}, err={}", addr, err);
    }
}

async fn handle_event(state: &mut NodeState, event: Event) {
    match event {
        Event::Data(interface, bytes) => {
            let Some(neighbor) = state.neighbors.get_mut(interface) else {
                return;
            };

            let dropped = neighbor.buffer.extend(&bytes);
            if dropped > 0 {
                log::warn!(
                    "receive buffer overflow: interface={}, dropped={}",
                    interface,
                    dropped,
                );
            }

            let mut lines = Vec::new();
            while let Some(line) = neighbor.buffer.next_line() {
                lines.push(line);
            }

            for line in lines {
                dispatch_wire(state, interface, &line).await;
            }
        }
        Event::Closed(interface) => topology::peer_lost(state, interface).await,
    }
}

/// Route one framed line by its message tag. Malformed or unknown lines
/// are logged and dropped; they do not justify tearing the connection
/// down.
async fn dispatch_wire(state: &mut NodeState, interface: Interface, line: &str) {
    // The peer may have been detached by an earlier line of this batch.
    if !state.neighbors.contains(interface) {
        return;
    }

    match Message::parse(line) {
        Ok(Message::Entry(addr)) => topology::handle_entry(state, interface, addr).await,
        Ok(Message::Safe(addr)) => topology::handle_safe(state, interface, addr),
        Ok(Message::Interest(name)) => forwarding::handle_interest(state, interface, name).await,
        Ok(Message::Object(name)) => forwarding::handle_object(state, interface, name).await,
        Ok(Message::NoObject(name)) => forwarding::handle_noobject(state, interface, name).await,
        Err(err) => log::warn!(
            "dropping malformed line: interface={}, err={}, line={:?}",
            interface,
            err,
            line,
        ),
    }
}

async fn recv_datagram(socket: Arc<UdpSocket>) -> std::io::Result<(usize, SocketAddr)> {
    let mut buf = [0u8; 2048];
    socket.recv_from(&mut buf).await
}
