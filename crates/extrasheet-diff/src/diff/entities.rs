use std::collections::BTreeMap;

use extrasheet_model::Entity;

use super::DiffError;

/// Additions, modifications and removals of one kind of identified entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityChanges<T> {
    /// Entities without a remote id yet.
    pub added: Vec<T>,
    /// `(pristine, current)` pairs with the same id and different content.
    pub updated: Vec<(T, T)>,
    pub removed: Vec<T>,
}

impl<T> Default for EntityChanges<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> EntityChanges<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Match `current` against `pristine` by remote id.
///
/// An id in `current` that `pristine` never had can only come from a fetch
/// the snapshot does not reflect, so it is rejected rather than guessed at.
pub(crate) fn diff_entities<T: Entity>(
    sheet: &str,
    pristine: &[T],
    current: &[T],
) -> Result<EntityChanges<T>, DiffError> {
    let before: BTreeMap<T::Id, &T> = pristine
        .iter()
        .filter_map(|e| e.id().map(|id| (id, e)))
        .collect();

    let mut changes = EntityChanges::default();
    let mut seen = Vec::new();
    for entity in current {
        let Some(id) = entity.id() else {
            changes.added.push(entity.clone());
            continue;
        };
        match before.get(&id) {
            Some(old) => {
                if *old != entity {
                    changes.updated.push(((*old).clone(), entity.clone()));
                }
                seen.push(id);
            }
            None => {
                return Err(DiffError::UnresolvedEntity {
                    sheet: sheet.to_string(),
                    kind: T::KIND,
                    id: id.to_string(),
                })
            }
        }
    }

    for (id, old) in &before {
        if !seen.contains(id) {
            changes.removed.push((*old).clone());
        }
    }
    Ok(changes)
}
