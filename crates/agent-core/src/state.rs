//! Shared Session State
//!
//! The small record tools read and write and the client mirrors.
//! Every mutation bumps a version counter so the turn loop can tell when a
//! tool call changed state and a snapshot must be pushed.

use serde::{Deserialize, Serialize};

/// Serializable snapshot exchanged with the client
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub proverbs: Vec<String>,
}

/// Session-scoped mutable state
#[derive(Clone, Debug, Default)]
pub struct SharedState {
    proverbs: Vec<String>,
    version: u64,
}

impl SharedState {
    pub fn new(seed: StateSnapshot) -> Self {
        Self {
            proverbs: seed.proverbs,
            version: 0,
        }
    }

    pub fn proverbs(&self) -> &[String] {
        &self.proverbs
    }

    /// Append in order, duplicates kept
    pub fn add_proverbs(&mut self, items: impl IntoIterator<Item = String>) {
        self.proverbs.extend(items);
        self.version += 1;
    }

    /// Replace the whole list
    pub fn set_proverbs(&mut self, items: Vec<String>) {
        self.proverbs = items;
        self.version += 1;
    }

    /// Adopt the client's mirror. Returns whether anything changed.
    pub fn apply_snapshot(&mut self, snapshot: StateSnapshot) -> bool {
        if snapshot.proverbs == self.proverbs {
            return false;
        }
        self.proverbs = snapshot.proverbs;
        self.version += 1;
        true
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            proverbs: self.proverbs.clone(),
        }
    }

    /// Monotonic mutation counter
    pub const fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_add_batches_concatenate_in_order() {
        let mut state = SharedState::default();
        let batches = [vec!["a", "b"], vec![], vec!["c", "a"], vec!["d"]];

        for batch in &batches {
            state.add_proverbs(strings(batch));
        }

        let expected: Vec<String> = batches.iter().flat_map(|b| strings(b)).collect();
        assert_eq!(state.proverbs(), expected.as_slice());
    }

    #[test]
    fn test_set_replaces_regardless_of_prior_state() {
        let mut state = SharedState::new(StateSnapshot { proverbs: strings(&["old", "older"]) });
        state.set_proverbs(strings(&["x"]));
        state.add_proverbs(strings(&["y", "z"]));
        assert_eq!(state.snapshot().proverbs, strings(&["x", "y", "z"]));
    }

    #[test]
    fn test_version_tracks_mutations() {
        let mut state = SharedState::default();
        assert_eq!(state.version(), 0);

        state.add_proverbs(strings(&["a"]));
        assert_eq!(state.version(), 1);

        assert!(!state.apply_snapshot(StateSnapshot { proverbs: strings(&["a"]) }));
        assert_eq!(state.version(), 1);

        assert!(state.apply_snapshot(StateSnapshot::default()));
        assert!(state.proverbs().is_empty());
        assert_eq!(state.version(), 2);
    }
}
