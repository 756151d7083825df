//! State owned by a running overlay node.
//!
//! Everything in this crate is plain single-owner state: the object store
//! and its transit cache, the pending interest table, and the neighbor
//! table. No sockets and no locks live here; the event loop owns one value
//! of each and drives them from a single task.

pub mod neighbors;
pub mod pit;
pub mod store;

pub use self::{
    neighbors::{Interface, LOCAL_INTERFACE, MAX_INTERFACE, Neighbor, NeighborTable},
    pit::{INTEREST_TIMEOUT, InterestEntry, InterestState, InterestTable},
    store::ObjectStore,
};
