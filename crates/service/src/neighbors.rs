use std::net::SocketAddr;

use ahash::{HashMap, HashMapExt};
use codec::LineBuffer;

/// Logical identifier of one peer link.
pub type Interface = u32;

/// Upper bound of the interface id space. Id 0 is reserved for a link that
/// has not identified itself yet, the highest index is the local-UI pseudo
/// interface, peers live in between.
pub const MAX_INTERFACE: Interface = 128;

/// Pseudo interface representing the local command line in the interest
/// table, so a retrieval started here can be told apart from one arriving
/// over the wire.
pub const LOCAL_INTERFACE: Interface = MAX_INTERFACE - 1;

/// Cap on a neighbor's inbound framing buffer. Protocol lines are around a
/// hundred bytes; this is a safety net, not an expected path.
pub const RECV_BUFFER_LIMIT: usize = 8192;

/// One connected peer.
///
/// `addr` starts as whatever the socket reports. For an accepted connection
/// that is an ephemeral port and not authoritative; the peer's real
/// listening address arrives inside its first `ENTRY` and overwrites it.
pub struct Neighbor {
    pub addr: SocketAddr,
    pub interface: Interface,
    pub internal: bool,
    pub buffer: LineBuffer,
}

/// All TCP peers of the node, keyed by interface id.
///
/// Ids are allocated monotonically and never reused for the lifetime of
/// the process, so a stale id in the interest table can never point at a
/// different peer than the one that created it.
pub struct NeighborTable {
    entries: HashMap<Interface, Neighbor>,
    next_interface: Interface,
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_interface: 1,
        }
    }
}

impl NeighborTable {
    /// Register a connection and allocate its interface id. Returns `None`
    /// once the id space is exhausted.
    pub fn insert(&mut self, addr: SocketAddr) -> Option<Interface> {
        if self.next_interface >= LOCAL_INTERFACE {
            return None;
        }

        let interface = self.next_interface;
        self.next_interface += 1;
        self.entries.insert(
            interface,
            Neighbor {
                addr,
                interface,
                internal: false,
                buffer: LineBuffer::new(RECV_BUFFER_LIMIT),
            },
        );

        Some(interface)
    }

    pub fn remove(&mut self, interface: Interface) -> Option<Neighbor> {
        self.entries.remove(&interface)
    }

    pub fn get(&self, interface: Interface) -> Option<&Neighbor> {
        self.entries.get(&interface)
    }

    pub fn get_mut(&mut self, interface: Interface) -> Option<&mut Neighbor> {
        self.entries.get_mut(&interface)
    }

    /// Rebind a neighbor to its advertised listening address and set its
    /// internal-set membership, both triggered by `ENTRY`. Returns false
    /// when the interface is gone.
    pub fn update_info(&mut self, interface: Interface, addr: SocketAddr, internal: bool) -> bool {
        match self.entries.get_mut(&interface) {
            Some(neighbor) => {
                neighbor.addr = addr;
                neighbor.internal = internal;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, interface: Interface) -> bool {
        self.entries.contains_key(&interface)
    }

    pub fn addr_of(&self, interface: Interface) -> Option<SocketAddr> {
        self.entries.get(&interface).map(|it| it.addr)
    }

    /// All live interface ids, ascending.
    pub fn interfaces(&self) -> Vec<Interface> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Interface ids of the internal set, ascending, so "the first internal
    /// neighbor" is well defined.
    pub fn internals(&self) -> Vec<Interface> {
        let mut ids: Vec<_> = self
            .entries
            .values()
            .filter(|it| it.internal)
            .map(|it| it.interface)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn ids_are_unique_and_monotonic() {
        let mut table = NeighborTable::default();

        let a = table.insert(addr(5000)).unwrap();
        let b = table.insert(addr(5001)).unwrap();
        assert_eq!((a, b), (1, 2));

        // Ids are not recycled after removal.
        table.remove(a);
        let c = table.insert(addr(5002)).unwrap();
        assert_eq!(c, 3);
        assert!(!table.contains(a));
    }

    #[test]
    fn id_space_is_bounded() {
        let mut table = NeighborTable::default();
        for port in 0..MAX_INTERFACE as u16 - 2 {
            assert!(table.insert(addr(5000 + port)).is_some());
        }

        assert!(table.insert(addr(4999)).is_none());
    }

    #[test]
    fn entry_rebinds_accepted_port() {
        let mut table = NeighborTable::default();

        // Accepted with an ephemeral port, not yet internal.
        let iface = table.insert(addr(49231)).unwrap();
        assert!(table.internals().is_empty());

        assert!(table.update_info(iface, addr(5001), true));
        let neighbor = table.get(iface).unwrap();
        assert_eq!(neighbor.addr, addr(5001));
        assert_eq!(table.internals(), vec![iface]);
    }
}
