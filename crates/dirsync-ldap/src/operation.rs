//! Modify operations and the attribute diff planner.

use dirsync_core::{AttributeMap, AttributeValue};

/// Protocol-level modification of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyOperation {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<String>,
    },
    /// Delete attribute values.
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete (empty removes the attribute).
        values: Vec<String>,
    },
    /// Replace attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

impl ModifyOperation {
    /// Operation removing every value of `attribute`.
    #[must_use]
    pub fn remove_all(attribute: impl Into<String>) -> Self {
        Self::Delete {
            attribute: attribute.into(),
            values: Vec::new(),
        }
    }

    /// Name of the attribute the operation targets.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add { attribute, .. }
            | Self::Delete { attribute, .. }
            | Self::Replace { attribute, .. } => attribute,
        }
    }

    /// Values carried by the operation.
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Self::Add { values, .. }
            | Self::Delete { values, .. }
            | Self::Replace { values, .. } => values,
        }
    }
}

/// Ordered list of operations submitted as one atomic request.
pub type ModifyBatch = Vec<ModifyOperation>;

/// Classification of an attribute that needs to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Single-valued attribute whose value differs.
    ReplaceValue,
    /// Multi-valued attribute whose value sequence differs (remove-all, then add).
    ReplaceMultiValue,
    /// Attribute present in the desired set only.
    AddAttribute,
    /// Attribute present in the snapshot only.
    RemoveAttribute,
}

/// One classified attribute change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    /// Attribute name.
    pub attribute: String,
    /// How the attribute changes.
    pub kind: OperationKind,
    /// Target value; `None` for [`OperationKind::RemoveAttribute`].
    pub value: Option<AttributeValue>,
}

impl AttributeChange {
    fn operations(&self) -> Vec<ModifyOperation> {
        let values = self.value.as_ref().map(AttributeValue::to_vec).unwrap_or_default();
        let attribute = self.attribute.clone();
        match self.kind {
            OperationKind::ReplaceValue => vec![ModifyOperation::Replace { attribute, values }],
            OperationKind::ReplaceMultiValue => vec![
                ModifyOperation::remove_all(attribute.clone()),
                ModifyOperation::Add { attribute, values },
            ],
            OperationKind::AddAttribute => vec![ModifyOperation::Add { attribute, values }],
            OperationKind::RemoveAttribute => vec![ModifyOperation::remove_all(attribute)],
        }
    }
}

/// Result of diffing an entry snapshot against a desired attribute set.
///
/// Every attribute name of the union of both maps lands in exactly one of
/// the changed, added, removed or unchanged partitions. Changes are kept in
/// batch order: changed attributes, then added, then removed, each group in
/// ascending name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyPlan {
    changes: Vec<AttributeChange>,
    unchanged: Vec<String>,
}

impl ModifyPlan {
    /// Diffs `current` against `desired`.
    ///
    /// Presence is decided on attribute names (map keys), compared exactly.
    /// A single desired value differing from the stored one is a
    /// [`OperationKind::ReplaceValue`]; a multi desired value that is not
    /// structurally identical (same values, same order) to the stored one is
    /// a [`OperationKind::ReplaceMultiValue`].
    ///
    /// A desired multi-value with no values means the attribute must not
    /// exist: it is removed when stored and unchanged otherwise. Repeated
    /// values in a desired multi-value are dropped before comparing, keeping
    /// first occurrences.
    ///
    /// Value order only matters locally. The server keeps attribute values
    /// as a set, so a reordered multi-value is resent but the directory's own
    /// order is not guaranteed to follow it.
    #[must_use]
    pub fn compute(current: &AttributeMap, desired: &AttributeMap) -> Self {
        let mut changed = Vec::new();
        let mut added = Vec::new();
        let mut unchanged = Vec::new();

        for (name, value) in desired {
            let stored = current.get(name).filter(|stored| !stored.is_empty());
            if value.is_empty() {
                if stored.is_none() {
                    unchanged.push(name.clone());
                }
                continue;
            }

            let value = &value.without_duplicates();
            let Some(stored) = stored else {
                added.push(AttributeChange {
                    attribute: name.clone(),
                    kind: OperationKind::AddAttribute,
                    value: Some(value.clone()),
                });
                continue;
            };

            if stored == value {
                unchanged.push(name.clone());
                continue;
            }

            let kind = if value.is_multi() {
                OperationKind::ReplaceMultiValue
            } else {
                OperationKind::ReplaceValue
            };
            changed.push(AttributeChange {
                attribute: name.clone(),
                kind,
                value: Some(value.clone()),
            });
        }

        let removed = current
            .iter()
            .filter(|(name, stored)| {
                !stored.is_empty() && !desired.get(*name).is_some_and(|value| !value.is_empty())
            })
            .map(|(name, _)| AttributeChange {
                attribute: name.clone(),
                kind: OperationKind::RemoveAttribute,
                value: None,
            });

        let mut changes = changed;
        changes.extend(added);
        changes.extend(removed);

        unchanged.extend(
            current
                .iter()
                .filter(|(name, stored)| stored.is_empty() && !desired.contains_key(*name))
                .map(|(name, _)| name.clone()),
        );
        unchanged.sort();

        Self { changes, unchanged }
    }

    /// Returns true when there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// All classified changes in batch order.
    #[must_use]
    pub fn changes(&self) -> &[AttributeChange] {
        &self.changes
    }

    /// Attributes present in both maps with identical values.
    #[must_use]
    pub fn unchanged(&self) -> &[String] {
        &self.unchanged
    }

    /// Changes of the given kind, in batch order.
    pub fn changes_of(&self, kind: OperationKind) -> impl Iterator<Item = &AttributeChange> + '_ {
        self.changes.iter().filter(move |change| change.kind == kind)
    }

    /// Names of attributes that exist on both sides but differ.
    #[must_use]
    pub fn changed(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|change| {
                matches!(
                    change.kind,
                    OperationKind::ReplaceValue | OperationKind::ReplaceMultiValue
                )
            })
            .map(|change| change.attribute.as_str())
            .collect()
    }

    /// Names of attributes that only exist in the desired set.
    #[must_use]
    pub fn added(&self) -> Vec<&str> {
        self.changes_of(OperationKind::AddAttribute)
            .map(|change| change.attribute.as_str())
            .collect()
    }

    /// Names of attributes that only exist in the snapshot.
    #[must_use]
    pub fn removed(&self) -> Vec<&str> {
        self.changes_of(OperationKind::RemoveAttribute)
            .map(|change| change.attribute.as_str())
            .collect()
    }

    /// Expands the plan into the ordered protocol batch.
    ///
    /// A [`OperationKind::ReplaceMultiValue`] produces a remove-all followed
    /// by an add.
    #[must_use]
    pub fn batch(&self) -> ModifyBatch {
        self.changes
            .iter()
            .flat_map(AttributeChange::operations)
            .collect()
    }

    /// Folds the plan into `snapshot`: removals, then additions, then
    /// replacements. Stored multi-values with no values are dropped.
    pub fn apply_to(&self, snapshot: &mut AttributeMap) {
        snapshot.retain(|_, value| !value.is_empty());
        for change in self.changes_of(OperationKind::RemoveAttribute) {
            snapshot.remove(&change.attribute);
        }

        let upserts = self
            .changes_of(OperationKind::AddAttribute)
            .chain(self.changes_of(OperationKind::ReplaceValue))
            .chain(self.changes_of(OperationKind::ReplaceMultiValue));
        for change in upserts {
            if let Some(value) = &change.value {
                snapshot.insert(change.attribute.clone(), value.clone());
            }
        }
    }
}
