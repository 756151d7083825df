use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use ndn_node::{
    config::{Config, LogLevel},
    node::{Node, NodeHandle},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        TcpStream, UdpSocket,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(5);

/// Start a node on an ephemeral port, driven through its command handle
/// instead of stdin.
async fn start_node(cache: usize, registry: SocketAddr) -> Result<(SocketAddr, NodeHandle)> {
    let config = Config {
        cache,
        ip: Ipv4Addr::LOCALHOST,
        port: 0,
        reg_ip: Ipv4Addr::LOCALHOST,
        reg_port: registry.port(),
        log_level: LogLevel::Error,
    };

    let (node, handle) = Node::bind(&config).await?;
    let addr = node.local_addr();
    tokio::spawn(node.run());

    Ok((addr, handle))
}

fn unused_registry() -> SocketAddr {
    "127.0.0.1:9".parse().unwrap()
}

/// A scripted peer speaking the TCP protocol at the node under test.
struct Peer {
    writer: OwnedWriteHalf,
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Result<Self> {
        let (reader, writer) = TcpStream::connect(addr).await?.into_split();
        Ok(Self {
            writer,
            lines: BufReader::new(reader).lines(),
        })
    }

    async fn say(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn expect(&mut self, want: &str) -> Result<()> {
        let got = timeout(WAIT, self.lines.next_line())
            .await??
            .unwrap_or_default();
        anyhow::ensure!(got == want, "expected {:?}, got {:?}", want, got);
        Ok(())
    }
}

#[tokio::test]
async fn standalone_node_adopts_first_peer() -> Result<()> {
    let (addr, handle) = start_node(4, unused_registry()).await?;
    assert!(handle.command("djoin 0.0.0.0 0"));

    let mut peer = Peer::connect(addr).await?;
    peer.say("ENTRY 127.0.0.1 41001").await?;

    // The mutual pair: the node answers with its own ENTRY and names
    // itself as the newcomer's fallback.
    peer.expect(&format!("ENTRY 127.0.0.1 {}", addr.port()))
        .await?;
    peer.expect(&format!("SAFE 127.0.0.1 {}", addr.port()))
        .await?;

    Ok(())
}

#[tokio::test]
async fn second_peer_learns_the_external_as_safety() -> Result<()> {
    let (addr, handle) = start_node(4, unused_registry()).await?;
    handle.command("djoin 0.0.0.0 0");

    let mut first = Peer::connect(addr).await?;
    first.say("ENTRY 127.0.0.1 41001").await?;
    first
        .expect(&format!("ENTRY 127.0.0.1 {}", addr.port()))
        .await?;
    first
        .expect(&format!("SAFE 127.0.0.1 {}", addr.port()))
        .await?;

    // A later joiner is internal only; its fallback is the node's external
    // neighbor, its grandparent in the tree.
    let mut second = Peer::connect(addr).await?;
    second.say("ENTRY 127.0.0.1 41002").await?;
    second.expect("SAFE 127.0.0.1 41001").await?;

    Ok(())
}

#[tokio::test]
async fn interest_for_published_object_is_answered() -> Result<()> {
    let (addr, handle) = start_node(4, unused_registry()).await?;
    handle.command("djoin 0.0.0.0 0");
    handle.command("create alpha");

    let mut peer = Peer::connect(addr).await?;
    peer.say("ENTRY 127.0.0.1 41001").await?;
    peer.expect(&format!("ENTRY 127.0.0.1 {}", addr.port()))
        .await?;
    peer.expect(&format!("SAFE 127.0.0.1 {}", addr.port()))
        .await?;

    peer.say("INTEREST alpha").await?;
    peer.expect("OBJECT alpha").await?;

    Ok(())
}

#[tokio::test]
async fn interest_with_no_upstream_is_refused() -> Result<()> {
    let (addr, handle) = start_node(4, unused_registry()).await?;
    handle.command("djoin 0.0.0.0 0");

    let mut peer = Peer::connect(addr).await?;
    peer.say("ENTRY 127.0.0.1 41001").await?;
    peer.expect(&format!("ENTRY 127.0.0.1 {}", addr.port()))
        .await?;
    peer.expect(&format!("SAFE 127.0.0.1 {}", addr.port()))
        .await?;

    // No object, no other neighbor to forward to.
    peer.say("INTEREST nosuch").await?;
    peer.expect("NOOBJECT nosuch").await?;

    Ok(())
}

#[tokio::test]
async fn retrieval_floods_and_caches_the_answer() -> Result<()> {
    let (addr, handle) = start_node(4, unused_registry()).await?;
    handle.command("djoin 0.0.0.0 0");

    let mut peer = Peer::connect(addr).await?;
    peer.say("ENTRY 127.0.0.1 41001").await?;
    peer.expect(&format!("ENTRY 127.0.0.1 {}", addr.port()))
        .await?;
    peer.expect(&format!("SAFE 127.0.0.1 {}", addr.port()))
        .await?;

    // A local retrieval turns into an interest on the only upstream.
    handle.command("retrieve beta");
    peer.expect("INTEREST beta").await?;
    peer.say("OBJECT beta").await?;

    // The answer was cached on the way through, so the same interest now
    // resolves here.
    peer.say("INTEREST beta").await?;
    peer.expect("OBJECT beta").await?;

    Ok(())
}

#[tokio::test]
async fn losing_the_external_promotes_an_internal_neighbor() -> Result<()> {
    let (addr, handle) = start_node(4, unused_registry()).await?;
    handle.command("djoin 0.0.0.0 0");

    let mut first = Peer::connect(addr).await?;
    first.say("ENTRY 127.0.0.1 41001").await?;
    first
        .expect(&format!("ENTRY 127.0.0.1 {}", addr.port()))
        .await?;
    first
        .expect(&format!("SAFE 127.0.0.1 {}", addr.port()))
        .await?;

    let mut second = Peer::connect(addr).await?;
    second.say("ENTRY 127.0.0.1 41002").await?;
    second.expect("SAFE 127.0.0.1 41001").await?;

    // The external link breaks. The node promotes its remaining internal
    // neighbor and announces itself over the existing connection.
    drop(first);
    second
        .expect(&format!("ENTRY 127.0.0.1 {}", addr.port()))
        .await?;

    Ok(())
}

#[tokio::test]
async fn join_and_leave_round_trip_the_registry() -> Result<()> {
    let registry = UdpSocket::bind("127.0.0.1:0").await?;
    let registry_addr = registry.local_addr()?;
    let (addr, handle) = start_node(4, registry_addr).await?;

    handle.command("join 100");

    let mut buf = [0u8; 2048];

    // Empty network: the node asks for members, then registers itself.
    let (size, from) = timeout(WAIT, registry.recv_from(&mut buf)).await??;
    assert_eq!(&buf[..size], b"NODES 100");
    registry.send_to(b"NODESLIST 100\n", from).await?;

    let (size, from) = timeout(WAIT, registry.recv_from(&mut buf)).await??;
    assert_eq!(
        &buf[..size],
        format!("REG 100 127.0.0.1 {}", addr.port()).as_bytes()
    );
    registry.send_to(b"OKREG", from).await?;

    // Leaving undoes exactly that registration.
    handle.command("leave");
    let (size, from) = timeout(WAIT, registry.recv_from(&mut buf)).await??;
    assert_eq!(
        &buf[..size],
        format!("UNREG 100 127.0.0.1 {}", addr.port()).as_bytes()
    );
    registry.send_to(b"OKUNREG", from).await?;

    Ok(())
}
