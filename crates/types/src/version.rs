use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

/// Revision of a module's on-chain data layout and semantics.
pub type ConsensusVersion = u64;

/// Snapshot of every module's consensus version.
///
/// Backed by a sorted map so that iteration is deterministic across replicas.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionMap(BTreeMap<String, ConsensusVersion>);

impl VersionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, module: &str) -> Option<ConsensusVersion> {
        self.0.get(module).copied()
    }

    pub fn insert(
        &mut self,
        module: impl Into<String>,
        version: ConsensusVersion,
    ) -> Option<ConsensusVersion> {
        self.0.insert(module.into(), version)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.0.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ConsensusVersion> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<(S, ConsensusVersion)> for VersionMap {
    fn from_iter<I: IntoIterator<Item = (S, ConsensusVersion)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, v)| (name.into(), v)).collect())
    }
}

impl<'a> IntoIterator for &'a VersionMap {
    type Item = (&'a String, &'a ConsensusVersion);
    type IntoIter = btree_map::Iter<'a, String, ConsensusVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_is_sorted_by_name() {
        let map: VersionMap = [("staking", 3), ("auth", 1), ("bank", 2)].into_iter().collect();
        let names: Vec<_> = map.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["auth", "bank", "staking"]);
    }

    #[test]
    fn serializes_as_object() {
        let map: VersionMap = [("bank", 2)].into_iter().collect();
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"bank":2}"#);
    }
}
