//! Ordered store of authored retrieval instructions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::model::RetrievalInstruction;

/// Problems with output keys that the store tolerates but callers may want to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyWarning {
    Empty { index: usize },
    Duplicate { key: String, indices: Vec<usize> },
}

/// Positions are shown 1-based.
impl fmt::Display for KeyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyWarning::Empty { index } => write!(f, "instruction {} has an empty key", index + 1),
            KeyWarning::Duplicate { key, indices } => {
                let positions: Vec<String> =
                    indices.iter().map(|index| (index + 1).to_string()).collect();
                write!(
                    f,
                    "key '{key}' is used by instructions {}",
                    positions.join(", ")
                )
            }
        }
    }
}

/// Tracks authored instructions in insertion order.
///
/// The store is the single writer of its collection. Entries are shared as [`Arc`]s and edits
/// go through [`Arc::make_mut`], so a value handed out by [`InstructionStore::get`] never
/// changes underneath its holder.
#[derive(Debug, Default, Clone)]
pub struct InstructionStore {
    items: Vec<Arc<RetrievalInstruction>>,
}

impl InstructionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tracked instructions.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether any instructions exist.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an instruction and return its index.
    pub fn append(&mut self, instruction: RetrievalInstruction) -> usize {
        self.items.push(Arc::new(instruction));
        let index = self.items.len() - 1;
        tracing::debug!(index, key = %self.items[index].output.key, "instruction appended");
        index
    }

    /// Shared handle to the instruction at `index`.
    pub fn get(&self, index: usize) -> Result<Arc<RetrievalInstruction>, DomainError> {
        self.check(index)?;
        Ok(Arc::clone(&self.items[index]))
    }

    /// Replace only the output key of the instruction at `index`.
    pub fn set_key(&mut self, index: usize, key: impl Into<String>) -> Result<(), DomainError> {
        self.check(index)?;
        let key = key.into();
        tracing::debug!(index, key = %key, "instruction key updated");
        Arc::make_mut(&mut self.items[index]).output.key = key;
        Ok(())
    }

    /// Remove the instruction at `index`; later entries shift down by one.
    pub fn delete(&mut self, index: usize) -> Result<RetrievalInstruction, DomainError> {
        self.check(index)?;
        let removed = self.items.remove(index);
        tracing::debug!(index, remaining = self.items.len(), "instruction deleted");
        Ok(Arc::unwrap_or_clone(removed))
    }

    /// Substitute the whole collection.
    pub fn replace_all(&mut self, instructions: impl IntoIterator<Item = RetrievalInstruction>) {
        self.items = instructions.into_iter().map(Arc::new).collect();
        tracing::debug!(count = self.items.len(), "instructions replaced");
    }

    /// Ordered copy of the current instructions.
    pub fn to_list(&self) -> Vec<RetrievalInstruction> {
        self.items.iter().map(|item| (**item).clone()).collect()
    }

    /// Remove all instructions.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Report empty keys, then duplicated keys ordered by first occurrence.
    pub fn key_warnings(&self) -> Vec<KeyWarning> {
        let mut warnings = Vec::new();
        let mut seen: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

        for (index, item) in self.items.iter().enumerate() {
            let key = item.output.key.as_str();
            if key.trim().is_empty() {
                warnings.push(KeyWarning::Empty { index });
            } else {
                seen.entry(key).or_default().push(index);
            }
        }

        let mut duplicates: Vec<_> = seen
            .into_iter()
            .filter(|(_, indices)| indices.len() > 1)
            .collect();
        duplicates.sort_by_key(|(_, indices)| indices[0]);
        warnings.extend(
            duplicates
                .into_iter()
                .map(|(key, indices)| KeyWarning::Duplicate {
                    key: key.to_owned(),
                    indices,
                }),
        );
        warnings
    }

    fn check(&self, index: usize) -> Result<(), DomainError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(DomainError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::app::encoder;
    use crate::domain::model::DomNode;

    fn instruction(id: u64, tag: &str) -> RetrievalInstruction {
        encoder::encode(&DomNode::element(id, tag).with_preview(format!("<{tag}>")), 1)
    }

    fn store_of(tags: &[&str]) -> InstructionStore {
        let mut store = InstructionStore::new();
        for (id, tag) in tags.iter().enumerate() {
            store.append(instruction(id as u64, tag));
        }
        store
    }

    #[test]
    fn append_preserves_call_order() {
        let mut store = InstructionStore::new();
        for (expected, tag) in ["h1", "p", "a", "p"].iter().enumerate() {
            assert_eq!(store.append(instruction(expected as u64, tag)), expected);
        }
        let keys: Vec<_> = store.to_list().into_iter().map(|i| i.output.key).collect();
        assert_eq!(keys, vec!["h1", "p", "a", "p"]);
    }

    #[test]
    fn delete_shifts_later_entries_down() {
        let mut store = store_of(&["h1", "h2", "h3", "h4"]);
        let before = store.to_list();

        let removed = store.delete(1).unwrap();
        assert_eq!(removed, before[1]);

        let after = store.to_list();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[2]);
        assert_eq!(after[2], before[3]);
    }

    #[test]
    fn set_key_changes_only_the_key() {
        let mut store = store_of(&["h1", "p"]);
        let before = store.to_list();

        store.set_key(1, "summary").unwrap();
        let after = store.to_list();

        assert_eq!(after[0], before[0]);
        assert_eq!(after[1].output.key, "summary");
        assert_eq!(after[1].output.location, before[1].output.location);
        assert_eq!(after[1].node_query, before[1].node_query);
        assert_eq!(after[1].flags, before[1].flags);
        assert_eq!(after[1].preview, before[1].preview);
    }

    #[test]
    fn set_key_does_not_disturb_shared_readers() {
        let mut store = store_of(&["h1"]);
        let held = store.get(0).unwrap();

        store.set_key(0, "title").unwrap();

        assert_eq!(held.output.key, "h1");
        assert_eq!(store.get(0).unwrap().output.key, "title");
    }

    #[test]
    fn out_of_range_indices_fail_and_leave_store_unchanged() {
        let mut store = store_of(&["h1", "p"]);
        let before = store.to_list();

        let expected = DomainError::IndexOutOfRange { index: 2, len: 2 };
        assert_eq!(store.set_key(2, "x").unwrap_err(), expected);
        assert_eq!(store.delete(2).unwrap_err(), expected);
        assert_eq!(store.get(2).unwrap_err(), expected);
        assert_eq!(
            store.delete(usize::MAX).unwrap_err(),
            DomainError::IndexOutOfRange {
                index: usize::MAX,
                len: 2
            }
        );

        assert_eq!(store.to_list(), before);
    }

    #[test]
    fn replace_all_substitutes_wholesale() {
        let mut store = store_of(&["h1", "p"]);
        store.replace_all(vec![instruction(9, "table")]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().output.key, "table");

        store.replace_all(Vec::new());
        assert!(store.is_empty());
    }

    #[test]
    fn to_list_is_a_snapshot() {
        let mut store = store_of(&["h1"]);
        let snapshot = store.to_list();
        store.set_key(0, "changed").unwrap();
        store.append(instruction(5, "p"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].output.key, "h1");
    }

    #[test]
    fn key_warnings_report_empty_and_duplicate_keys() {
        let mut store = store_of(&["p", "h1", "p", "a"]);
        store.set_key(3, "  ").unwrap();

        assert_eq!(
            store.key_warnings(),
            vec![
                KeyWarning::Empty { index: 3 },
                KeyWarning::Duplicate {
                    key: "p".into(),
                    indices: vec![0, 2]
                },
            ]
        );
    }

    #[test]
    fn key_warnings_display_one_based_positions() {
        assert_eq!(
            KeyWarning::Empty { index: 3 }.to_string(),
            "instruction 4 has an empty key"
        );
        let duplicate = KeyWarning::Duplicate {
            key: "p".into(),
            indices: vec![0, 2],
        };
        assert_eq!(duplicate.to_string(), "key 'p' is used by instructions 1, 3");
    }
}
