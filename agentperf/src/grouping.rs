//! Group loaded artifacts by run dimension for pairwise comparison.

use crate::store::LoadedArtifact;
use agentperf_common::TestMode;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Which run dimension artifacts must share to be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDimension {
    TestMode,
    ProviderAndTestMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    /// Set only for [`GroupDimension::ProviderAndTestMode`].
    pub provider: Option<String>,
    pub test_mode: TestMode,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{provider}_{}", self.test_mode),
            None => write!(f, "{}", self.test_mode),
        }
    }
}

/// Artifacts sharing one key, indexed by language label.
#[derive(Debug, Clone)]
pub struct ArtifactGroup<'a> {
    pub key: GroupKey,
    by_language: BTreeMap<String, &'a LoadedArtifact>,
}

impl<'a> ArtifactGroup<'a> {
    /// Languages in ascending lexical order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.by_language.keys().map(String::as_str)
    }

    pub fn get(&self, language: &str) -> Option<&'a LoadedArtifact> {
        self.by_language.get(language).copied()
    }

    pub fn len(&self) -> usize {
        self.by_language.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_language.is_empty()
    }

    pub fn is_comparable(&self) -> bool {
        self.by_language.len() >= 2
    }

    /// The two lexically smallest languages, when the group is comparable.
    pub fn comparison_pair(&self) -> Option<(&'a LoadedArtifact, &'a LoadedArtifact)> {
        let mut iter = self.by_language.values();
        match (iter.next(), iter.next()) {
            (Some(first), Some(second)) => Some((*first, *second)),
            _ => None,
        }
    }
}

/// Group artifacts by `dimension`.
///
/// Groups come back in the order their key was first seen. A second
/// artifact with the same language and key replaces the first (last write
/// wins).
pub fn group(artifacts: &[LoadedArtifact], dimension: GroupDimension) -> Vec<ArtifactGroup<'_>> {
    let mut groups: Vec<ArtifactGroup<'_>> = Vec::new();

    for loaded in artifacts {
        let key = GroupKey {
            provider: match dimension {
                GroupDimension::TestMode => None,
                GroupDimension::ProviderAndTestMode => {
                    Some(loaded.artifact.provider_label().to_string())
                }
            },
            test_mode: loaded.artifact.test_mode(),
        };
        let language = loaded.artifact.language_label().to_string();

        let index = match groups.iter().position(|g| g.key == key) {
            Some(index) => index,
            None => {
                groups.push(ArtifactGroup {
                    key,
                    by_language: BTreeMap::new(),
                });
                groups.len() - 1
            }
        };

        if let Some(previous) = groups[index].by_language.insert(language, loaded) {
            debug!(
                group = %groups[index].key,
                replaced = %previous.file_name,
                by = %loaded.file_name,
                "duplicate language in group, keeping later artifact"
            );
        }
    }

    groups
}
