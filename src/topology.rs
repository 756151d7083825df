use std::net::SocketAddr;

use codec::{Message, Netid};
use rand::Rng;
use service::Interface;

use crate::{forwarding, node::NodeState, server};

/// Directory-assisted join: ask the registry who is in the network, pick a
/// member at random, or create the network when there is none.
pub async fn join(state: &mut NodeState, net: Netid) {
    if let Some(current) = state.netid {
        println!("already in network {}", current);
        return;
    }

    let nodes = match state.registry.nodes(net).await {
        Ok(nodes) => nodes,
        Err(err) => {
            println!("join failed: {}", err);
            return;
        }
    };

    // Placeholder entries and our own registration are not candidates.
    let own = state.addr;
    let candidates: Vec<SocketAddr> = nodes
        .into_iter()
        .filter(|it| !it.ip().is_unspecified() && it.port() != 0 && *it != own)
        .collect();

    if candidates.is_empty() {
        match state.registry.register(net, own).await {
            Ok(()) => {
                state.netid = Some(net);
                state.registered = true;
                log::info!("registered network: net={}", net);
                println!("created network {}", net);
            }
            Err(err) => println!("join failed: {}", err),
        }

        return;
    }

    let peer = candidates[rand::rng().random_range(0..candidates.len())];
    join_via(state, peer, net, true).await;
}

/// Direct join: skip the registry entirely. The all-zeros address means
/// "create a new standalone network" under the fixed direct-join netid.
pub async fn direct_join(state: &mut NodeState, peer: SocketAddr) {
    if let Some(current) = state.netid {
        println!("already in network {}", current);
        return;
    }

    if peer.ip().is_unspecified() {
        state.netid = Some(Netid::DIRECT_JOIN);
        println!("created standalone network {}", Netid::DIRECT_JOIN);
        return;
    }

    join_via(state, peer, Netid::DIRECT_JOIN, false).await;
}

/// Connect to a member, adopt it as the external neighbor and announce
/// ourselves. Any failure rolls the node back to the outside state.
async fn join_via(state: &mut NodeState, peer: SocketAddr, net: Netid, register: bool) {
    let stream = match server::connect(peer).await {
        Ok(stream) => stream,
        Err(err) => {
            println!("join failed: {}", err);
            return;
        }
    };

    let interface = match state.attach(stream, peer) {
        Ok(interface) => interface,
        Err(err) => {
            println!("join failed: {}", err);
            return;
        }
    };

    if !state.send(interface, &Message::Entry(state.addr)).await {
        state.detach(interface);
        println!("join failed: could not announce to {}", peer);
        return;
    }

    if register {
        if let Err(err) = state.registry.register(net, state.addr).await {
            state.detach(interface);
            println!("join failed: {}", err);
            return;
        }

        state.registered = true;
    }

    state.external = Some(interface);
    state.netid = Some(net);

    log::info!("joined network: net={}, through={}", net, peer);
    println!("joined network {} through {}", net, peer);
}

/// Handle `ENTRY`: the sender's advertised listening address replaces
/// whatever the socket reported, and the sender takes its place in the
/// tree.
pub async fn handle_entry(state: &mut NodeState, interface: Interface, addr: SocketAddr) {
    if !state.in_network() {
        log::warn!("ENTRY while outside any network: addr={}", addr);
        return;
    }

    if !state.neighbors.update_info(interface, addr, true) {
        return;
    }

    match state.external {
        // Standalone: the newcomer becomes the external link and the two
        // nodes form the first mutual pair.
        None => {
            state.external = Some(interface);
            state.send(interface, &Message::Entry(state.addr)).await;
            state.send(interface, &Message::Safe(state.addr)).await;
            log::info!("adopted external neighbor: addr={}", addr);
        }
        // The answering ENTRY of the peer this node joined through. Each
        // side of the pair is the other's fallback.
        Some(external) if external == interface => {
            state.send(interface, &Message::Safe(state.addr)).await;
            log::debug!("external neighbor confirmed: addr={}", addr);
        }
        // An internal neighbor; its fallback is our external, its
        // grandparent in the tree.
        Some(_) => {
            let safety = state.external_addr().unwrap_or(state.addr);
            state.send(interface, &Message::Safe(safety)).await;
            log::info!("registered internal neighbor: addr={}", addr);
        }
    }
}

/// Handle `SAFE`: adopted verbatim, no rewriting.
pub fn handle_safe(state: &mut NodeState, interface: Interface, addr: SocketAddr) {
    if !state.neighbors.contains(interface) {
        return;
    }

    state.safety = Some(addr);
    log::debug!("safety neighbor updated: addr={}", addr);
}

/// A peer socket closed. Drop the neighbor, settle its pending interests,
/// and repair the tree if the external link is the one that broke.
pub async fn peer_lost(state: &mut NodeState, interface: Interface) {
    let Some(neighbor) = state.detach(interface) else {
        return;
    };

    log::info!(
        "tcp socket disconnect: addr={}, interface={}",
        neighbor.addr,
        interface,
    );

    forwarding::peer_lost(state, interface).await;

    if state.external == Some(interface) {
        state.external = None;
        repair(state, neighbor.addr).await;
    }
}

/// Rebuild the external link after losing it.
async fn repair(state: &mut NodeState, departed: SocketAddr) {
    // The safety neighbor is the designated fallback, unless it is this
    // node itself or the very peer that vanished.
    if let Some(target) = state.safety
        && target != state.addr
        && target != departed
    {
        match server::connect(target).await {
            Ok(stream) => match state.attach(stream, target) {
                Ok(interface) => {
                    state.external = Some(interface);
                    state.send(interface, &Message::Entry(state.addr)).await;
                    propagate_safe(state, Some(interface)).await;
                    log::info!("reconnected through safety neighbor: addr={}", target);
                    return;
                }
                Err(err) => log::warn!("safety reconnect failed: addr={}, err={}", target, err),
            },
            Err(err) => log::warn!("safety reconnect failed: addr={}, err={}", target, err),
        }
    }

    // Fall back to promoting the first internal neighbor.
    if let Some(first) = state.neighbors.internals().first().copied() {
        state.external = Some(first);
        state.safety = Some(state.addr);
        state.send(first, &Message::Entry(state.addr)).await;
        propagate_safe(state, Some(first)).await;

        log::info!(
            "promoted internal neighbor to external: addr={:?}",
            state.neighbors.addr_of(first),
        );

        return;
    }

    // Nobody left on either side: back to standalone.
    state.safety = None;
    log::info!("no peers left, node is standalone again");
}

/// Tell every internal neighbor whom to fall back to now, carrying this
/// node's current external-neighbor address.
async fn propagate_safe(state: &mut NodeState, exclude: Option<Interface>) {
    let Some(addr) = state.external_addr() else {
        return;
    };

    for interface in state.neighbors.internals() {
        if Some(interface) != exclude {
            state.send(interface, &Message::Safe(addr)).await;
        }
    }
}

/// Leave the network: undo the registration, drop every peer, forget the
/// tree. A failed UNREG aborts the leave with the node state unchanged.
pub async fn leave(state: &mut NodeState) {
    let Some(net) = state.netid else {
        println!("not in a network");
        return;
    };

    if state.registered {
        if let Err(err) = state.registry.unregister(net, state.addr).await {
            println!("leave failed: {}", err);
            return;
        }

        state.registered = false;
    }

    reset(state);
    log::info!("left network: net={}", net);
    println!("left network {}", net);
}

/// The SIGINT / exit path: best effort, never blocks the shutdown.
pub async fn shutdown(state: &mut NodeState) {
    if let Some(net) = state.netid
        && state.registered
        && let Err(err) = state.registry.unregister(net, state.addr).await
    {
        log::warn!("unregister on shutdown failed: {}", err);
    }

    state.detach_all();
}

fn reset(state: &mut NodeState) {
    state.detach_all();
    state.external = None;
    state.safety = None;
    state.netid = None;
    // Pending interests died with the peers.
    state.pit = Default::default();
}
