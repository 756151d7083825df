use codec::{Message, Name};
use service::{INTEREST_TIMEOUT, Interface, InterestState, LOCAL_INTERFACE};

use crate::node::NodeState;

/// Retrieval started at the command line: local store first, then the
/// cache, then the network through the pending interest table.
pub async fn retrieve(state: &mut NodeState, name: Name) {
    if state.store.has_local(&name) {
        println!("object {} is stored on this node", name);
        return;
    }

    if state.store.has_cached(&name) {
        println!("object {} is in the cache", name);
        return;
    }

    if !state.in_network() || state.neighbors.is_empty() {
        println!("object {} not found, no peers to ask", name);
        return;
    }

    let entry = state.pit.entry(&name);
    entry.set(LOCAL_INTERFACE, InterestState::Response);

    // Somebody else's interest for the same name is already in flight; the
    // answer will come back here too.
    if entry.waiting() > 0 {
        println!("retrieval of {} already in progress", name);
        return;
    }

    let sent = flood_interest(state, &name, None).await;
    if sent == 0 {
        state.pit.remove(&name);
        println!("object {} not found, no reachable peers", name);
    } else {
        println!("searching the network for {}", name);
    }
}

/// Handle `INTEREST` arriving from a peer.
pub async fn handle_interest(state: &mut NodeState, interface: Interface, name: Name) {
    // The outgoing side of a half-open connection carries no identity yet.
    if interface == 0 {
        return;
    }

    if state.store.contains(&name) {
        state.send(interface, &Message::Object(name)).await;
        return;
    }

    let entry = state.pit.entry(&name);
    entry.set(interface, InterestState::Response);
    entry.touch();

    // Already in flight; the reverse path will carry the answer back to
    // this interface as well.
    if entry.waiting() > 0 {
        return;
    }

    let sent = flood_interest(state, &name, Some(interface)).await;
    if sent == 0 {
        state.pit.remove(&name);
        state.send(interface, &Message::NoObject(name)).await;
    }
}

/// Forward an interest to every neighbor except the one it came from,
/// marking each successfully written interface as waiting. Returns how
/// many copies went out.
async fn flood_interest(state: &mut NodeState, name: &Name, from: Option<Interface>) -> usize {
    let mut sent = 0;

    for interface in state.neighbors.interfaces() {
        if Some(interface) == from {
            continue;
        }

        if state
            .send(interface, &Message::Interest(name.clone()))
            .await
        {
            if let Some(entry) = state.pit.get_mut(name) {
                entry.set(interface, InterestState::Waiting);
            }

            sent += 1;
        }
    }

    sent
}

/// Handle `OBJECT`: cache the name, answer everyone who asked, forget the
/// interest.
pub async fn handle_object(state: &mut NodeState, interface: Interface, name: Name) {
    log::trace!("object received: name={}, interface={}", name, interface);
    state.store.cache_insert(name.clone());

    let Some(entry) = state.pit.get_mut(&name) else {
        // Stale answer, the interest resolved or timed out already.
        log::debug!("object {} had no pending interest", name);
        return;
    };

    entry.mark_removing();
    let responses = entry.responses();

    for target in responses {
        if target == LOCAL_INTERFACE {
            println!("object {} retrieved", name);
        } else {
            state.send(target, &Message::Object(name.clone())).await;
        }
    }

    state.pit.remove(&name);
}

/// Handle `NOOBJECT`: close the answering interface and resolve the entry
/// once no upstream is left to wait for.
pub async fn handle_noobject(state: &mut NodeState, interface: Interface, name: Name) {
    let Some(entry) = state.pit.get_mut(&name) else {
        return;
    };

    entry.set(interface, InterestState::Closed);

    // Interfaces whose peer disappeared while we waited will never answer.
    for waiting in state
        .pit
        .get(&name)
        .map(|it| it.waiting_interfaces())
        .unwrap_or_default()
    {
        if !state.neighbors.contains(waiting)
            && let Some(entry) = state.pit.get_mut(&name)
        {
            entry.set(waiting, InterestState::Closed);
        }
    }

    // With upstreams still waiting, another one may yet succeed.
    if state.pit.get(&name).map(|it| it.waiting()) == Some(0) {
        resolve_noobject(state, &name).await;
    }
}

/// Fan `NOOBJECT` out to every interface still expecting an answer and
/// delete the entry.
async fn resolve_noobject(state: &mut NodeState, name: &Name) {
    let Some(entry) = state.pit.get_mut(name) else {
        return;
    };

    entry.mark_removing();
    let responses = entry.responses();

    for target in responses {
        if target == LOCAL_INTERFACE {
            println!("object {} not found", name);
        } else {
            state.send(target, &Message::NoObject(name.clone())).await;
        }
    }

    state.pit.remove(name);
}

/// The timeout sweep: entries past the interest deadline resolve as if
/// every upstream had answered `NOOBJECT`.
pub async fn sweep(state: &mut NodeState) {
    for name in state.pit.expired(INTEREST_TIMEOUT) {
        log::debug!("interest timed out: name={}", name);
        resolve_noobject(state, &name).await;
    }
}

/// A peer vanished: its pending answers are gone and its unanswered
/// interests count as `NOOBJECT`.
pub async fn peer_lost(state: &mut NodeState, interface: Interface) {
    for name in state.pit.names_with(interface, InterestState::Response) {
        if let Some(entry) = state.pit.get_mut(&name) {
            entry.set(interface, InterestState::Closed);
            if !entry.is_live() {
                state.pit.remove(&name);
            }
        }
    }

    for name in state.pit.names_with(interface, InterestState::Waiting) {
        let Some(entry) = state.pit.get_mut(&name) else {
            continue;
        };

        entry.set(interface, InterestState::Closed);
        if entry.waiting() == 0 {
            resolve_noobject(state, &name).await;
        }
    }
}
