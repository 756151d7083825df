use std::time::{Duration, Instant};

use ahash::{HashMap, HashMapExt};
use codec::Name;

use crate::neighbors::Interface;

/// How long an unanswered interest may sit in the table before the sweep
/// resolves it as if every upstream had replied `NOOBJECT`.
pub const INTEREST_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-interface state of a pending interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestState {
    /// The interest was forwarded out of this interface, an answer is due.
    Waiting,
    /// The interest arrived on this interface, the answer goes back there.
    Response,
    /// This interface replied `NOOBJECT` or its peer is gone.
    Closed,
}

/// Routing memory for one in-flight name.
pub struct InterestEntry {
    states: HashMap<Interface, InterestState>,
    created: Instant,
    removing: bool,
}

impl InterestEntry {
    fn new() -> Self {
        Self {
            states: HashMap::new(),
            created: Instant::now(),
            removing: false,
        }
    }

    pub fn set(&mut self, interface: Interface, state: InterestState) {
        self.states.insert(interface, state);
    }

    pub fn get(&self, interface: Interface) -> Option<InterestState> {
        self.states.get(&interface).copied()
    }

    pub fn waiting(&self) -> usize {
        self.states
            .values()
            .filter(|it| **it == InterestState::Waiting)
            .count()
    }

    /// Interfaces a reply must be written to, ascending for deterministic
    /// fan-out.
    pub fn responses(&self) -> Vec<Interface> {
        self.collect(InterestState::Response)
    }

    pub fn waiting_interfaces(&self) -> Vec<Interface> {
        self.collect(InterestState::Waiting)
    }

    fn collect(&self, state: InterestState) -> Vec<Interface> {
        let mut ids: Vec<_> = self
            .states
            .iter()
            .filter(|(_, it)| **it == state)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Whether the entry still has a reason to exist.
    pub fn is_live(&self) -> bool {
        self.states.values().any(|it| {
            matches!(it, InterestState::Waiting | InterestState::Response)
        })
    }

    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    /// Refresh the creation timestamp, pushing the timeout out.
    pub fn touch(&mut self) {
        self.created = Instant::now();
    }

    /// Flag the entry as mid fan-out so nothing re-enters it while replies
    /// are being written.
    pub fn mark_removing(&mut self) {
        self.removing = true;
    }

    pub fn is_removing(&self) -> bool {
        self.removing
    }

    pub fn states(&self) -> impl Iterator<Item = (Interface, InterestState)> + '_ {
        self.states.iter().map(|(id, state)| (*id, *state))
    }
}

/// The pending interest table: one entry per in-flight name.
#[derive(Default)]
pub struct InterestTable {
    entries: HashMap<Name, InterestEntry>,
}

impl InterestTable {
    /// Get or create the entry for a name.
    pub fn entry(&mut self, name: &Name) -> &mut InterestEntry {
        self.entries
            .entry(name.clone())
            .or_insert_with(InterestEntry::new)
    }

    pub fn get(&self, name: &Name) -> Option<&InterestEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut InterestEntry> {
        self.entries.get_mut(name)
    }

    pub fn remove(&mut self, name: &Name) -> Option<InterestEntry> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    /// Names whose entry outlived the timeout and is not already being
    /// resolved.
    pub fn expired(&self, timeout: Duration) -> Vec<Name> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_removing() && entry.age() >= timeout)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names that have the given interface in the given state. Used when a
    /// peer disappears and its pending interests must be re-evaluated.
    pub fn names_with(&self, interface: Interface, state: InterestState) -> Vec<Name> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.get(interface) == Some(state))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &InterestEntry)> {
        self.entries.iter()
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

    fn name(value: &str) -> Name {
        Name::new(value).unwrap()
    }

    #[test]
    fn entry_tracks_states() {
        let mut table = InterestTable::default();
        let entry = table.entry(&name("alpha"));

        entry.set(9, InterestState::Response);
        entry.set(1, InterestState::Waiting);
        entry.set(2, InterestState::Waiting);
        assert_eq!(entry.waiting(), 2);
        assert_eq!(entry.responses(), vec![9]);
        assert!(entry.is_live());

        entry.set(1, InterestState::Closed);
        entry.set(2, InterestState::Closed);
        assert_eq!(entry.waiting(), 0);
        assert_eq!(entry.waiting_interfaces(), Vec::<Interface>::new());

        // A response interface alone keeps the entry live.
        assert!(entry.is_live());
    }

    #[test]
    fn expired_honors_touch() {
        let mut table = InterestTable::default();
        table.entry(&name("alpha")).set(1, InterestState::Waiting);

        assert!(table.expired(Duration::ZERO).contains(&name("alpha")));
        assert!(table.expired(Duration::from_secs(60)).is_empty());

        table.get_mut(&name("alpha")).unwrap().touch();
        assert!(table.expired(Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn removing_entries_are_not_reaped_twice() {
        let mut table = InterestTable::default();
        table.entry(&name("alpha")).set(1, InterestState::Waiting);
        table.get_mut(&name("alpha")).unwrap().mark_removing();

        assert!(table.expired(Duration::ZERO).is_empty());
    }

    #[test]
    fn names_with_selects_by_state() {
        let mut table = InterestTable::default();
        table.entry(&name("a")).set(3, InterestState::Waiting);
        table.entry(&name("b")).set(3, InterestState::Response);
        table.entry(&name("c")).set(4, InterestState::Waiting);

        assert_eq!(table.names_with(3, InterestState::Waiting), vec![name("a")]);
        assert_eq!(
            table.names_with(3, InterestState::Response),
            vec![name("b")]
        );
    }
}
