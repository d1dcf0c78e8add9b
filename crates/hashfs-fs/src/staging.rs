use std::collections::HashMap;
use std::sync::Mutex;

use hashfs_types::ObjectLocation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteState {
    Open,
    Closed,
}

/// Writers created under a temporary segment and whether they have closed.
///
/// A closed entry arms the commit trigger for its parent directory.
#[derive(Debug, Default)]
pub struct StagedWrites {
    writes: Mutex<HashMap<ObjectLocation, WriteState>>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, location: &ObjectLocation) {
        self.writes
            .lock()
            .expect("lock poisoned")
            .insert(location.clone(), WriteState::Open);
    }

    pub fn finish(&self, location: &ObjectLocation) {
        self.writes
            .lock()
            .expect("lock poisoned")
            .insert(location.clone(), WriteState::Closed);
    }

    pub fn state(&self, location: &ObjectLocation) -> Option<WriteState> {
        self.writes
            .lock()
            .expect("lock poisoned")
            .get(location)
            .copied()
    }

    /// Returns `true` if a closed staged write sits directly in `dir`.
    pub fn has_closed_in(&self, dir: &ObjectLocation) -> bool {
        self.writes
            .lock()
            .expect("lock poisoned")
            .iter()
            .any(|(loc, state)| *state == WriteState::Closed && loc.parent().as_ref() == Some(dir))
    }

    pub fn forget(&self, location: &ObjectLocation) {
        self.writes.lock().expect("lock poisoned").remove(location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(path: &str) -> ObjectLocation {
        ObjectLocation::parse(path).unwrap()
    }

    #[test]
    fn closed_write_arms_parent_only() {
        let staged = StagedWrites::new();
        let file = loc("c/out/_temporary/0/part-0");
        staged.begin(&file);
        assert!(!staged.has_closed_in(&loc("c/out/_temporary/0")));

        staged.finish(&file);
        assert_eq!(staged.state(&file), Some(WriteState::Closed));
        assert!(staged.has_closed_in(&loc("c/out/_temporary/0")));
        assert!(!staged.has_closed_in(&loc("c/out/_temporary")));
        assert!(!staged.has_closed_in(&file));

        staged.forget(&file);
        assert!(!staged.has_closed_in(&loc("c/out/_temporary/0")));
    }
}
