//! Document-global id bookkeeping.

use hashbrown::HashSet;

use crate::error::{AssetError, Result};

/// Tracks every id in use across all of a document's dictionaries.
///
/// The id namespace is global: two objects of different kinds may not share
/// an id either. The registry is owned by the document and consulted by
/// every dictionary insertion; dictionaries never reach into each other.
#[derive(Debug, Default)]
pub(crate) struct IdRegistry {
    used: HashSet<String>,
}

impl IdRegistry {
    /// Record an id read from a manifest. Manifest ids are taken as-is.
    pub fn insert(&mut self, id: &str) {
        self.used.insert(id.to_owned());
    }

    /// Claim an id for a freshly created object.
    pub fn reserve(&mut self, id: &str) -> Result<()> {
        if !self.used.insert(id.to_owned()) {
            return Err(AssetError::DuplicateId(id.to_owned()));
        }
        Ok(())
    }

    /// Search for an unused id: `base` verbatim, then `base_suffix`, then
    /// `base_suffix_0`, `base_suffix_1`, ...
    pub fn find_unique(&self, base: &str, suffix: &str) -> String {
        let mut id = String::from(base);
        if !id.is_empty() {
            if !self.used.contains(&id) {
                return id;
            }
            id.push('_');
        }
        id.push_str(suffix);
        if !self.used.contains(&id) {
            return id;
        }
        for i in 0u32.. {
            let candidate = format!("{id}_{i}");
            if !self.used.contains(&candidate) {
                return candidate;
            }
        }
        unreachable!("id space exhausted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_rejects_duplicates() {
        let mut ids = IdRegistry::default();
        ids.reserve("mesh").unwrap();
        assert!(matches!(ids.reserve("mesh"), Err(AssetError::DuplicateId(_))));
    }

    #[test]
    fn test_find_unique_prefers_base() {
        let mut ids = IdRegistry::default();
        assert_eq!(ids.find_unique("torso", "mesh"), "torso");

        ids.insert("torso");
        assert_eq!(ids.find_unique("torso", "mesh"), "torso_mesh");

        ids.insert("torso_mesh");
        ids.insert("torso_mesh_0");
        assert_eq!(ids.find_unique("torso", "mesh"), "torso_mesh_1");
    }

    #[test]
    fn test_find_unique_empty_base() {
        let mut ids = IdRegistry::default();
        assert_eq!(ids.find_unique("", "buffer"), "buffer");
        ids.insert("buffer");
        assert_eq!(ids.find_unique("", "buffer"), "buffer_0");
    }
}
