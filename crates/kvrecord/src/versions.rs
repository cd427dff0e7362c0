//! # Version History
//!
//! Model types built with [`ModelBuilder::versioned`](crate::model::ModelBuilder::versioned)
//! keep an append-only ledger of attribute snapshots, one per successful save.
//! Numbers start at 1 and grow by exactly one per versioned save. Entries are
//! never edited or removed; destroying the record drops the whole ledger.
//!
//! Versioning can be paused per instance, either explicitly with
//! `disable_versioning`/`enable_versioning` or for the span of a closure with
//! [`Record::without_versioning`], which restores the prior setting even if
//! the closure panics.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};

use crate::attributes::{map_to_json, AttrMap, AttributeSchema, AttributeSet};
use crate::error::{RecordError, Result};
use crate::record::Record;
use crate::store::StoredVersion;

/// Immutable snapshot of a record's attributes as of one save.
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub number: u64,
    pub attributes: AttrMap,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct VersionLedger {
    enabled: bool,
    latest: Option<u64>,
    entries: BTreeMap<u64, Version>,
}

impl VersionLedger {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Change the toggle, returning the previous setting.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.enabled, enabled)
    }

    /// Latest version number, or None while versioning is off or before the
    /// first versioned save.
    pub fn current_version(&self) -> Option<u64> {
        if self.enabled {
            self.latest
        } else {
            None
        }
    }

    /// Latest version number regardless of the toggle.
    pub(crate) fn latest(&self) -> Option<u64> {
        self.latest
    }

    pub fn version(&self, number: u64) -> Result<&Version> {
        self.entries
            .get(&number)
            .ok_or(RecordError::VersionNotFound(number))
    }

    /// All versions, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a new snapshot and return its number.
    pub fn append(&mut self, attributes: AttrMap, updated_at: DateTime<Utc>) -> u64 {
        let number = self.latest.map_or(1, |n| n + 1);
        self.entries.insert(
            number,
            Version {
                number,
                attributes,
                updated_at,
            },
        );
        self.latest = Some(number);
        number
    }

    /// Adopt history written by another instance of the same record.
    ///
    /// Entries already held are kept as they are; the latest number only
    /// moves forward.
    pub(crate) fn absorb(&mut self, other: VersionLedger) {
        for (number, version) in other.entries {
            self.entries.entry(number).or_insert(version);
        }
        self.latest = self.latest.max(other.latest);
    }

    pub(crate) fn clear(&mut self) {
        self.latest = None;
        self.entries.clear();
    }

    pub fn from_stored(
        schema: &AttributeSchema,
        current_version: Option<u64>,
        stored: Option<&BTreeMap<u64, StoredVersion>>,
    ) -> Self {
        let entries = stored
            .into_iter()
            .flatten()
            .map(|(number, version)| {
                (
                    *number,
                    Version {
                        number: *number,
                        attributes: AttributeSet::decode(schema, &version.attributes),
                        updated_at: version.updated_at,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        let latest = current_version.or_else(|| entries.keys().next_back().copied());
        Self {
            enabled: false,
            latest,
            entries,
        }
    }

    /// Encode for the stored document; `None` when there is no history.
    pub fn to_stored(&self) -> Option<BTreeMap<u64, StoredVersion>> {
        if self.entries.is_empty() && !self.enabled {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(|(number, version)| {
                    (
                        *number,
                        StoredVersion {
                            attributes: map_to_json(&version.attributes),
                            updated_at: version.updated_at,
                        },
                    )
                })
                .collect(),
        )
    }
}

/// Restores a record's versioning toggle when dropped.
pub struct VersioningPaused<'a> {
    record: &'a mut Record,
    prior: bool,
}

impl<'a> VersioningPaused<'a> {
    pub(crate) fn new(record: &'a mut Record) -> Self {
        let prior = record.ledger_mut().set_enabled(false);
        Self { record, prior }
    }
}

impl Deref for VersioningPaused<'_> {
    type Target = Record;

    fn deref(&self) -> &Record {
        &*self.record
    }
}

impl DerefMut for VersioningPaused<'_> {
    fn deref_mut(&mut self) -> &mut Record {
        &mut *self.record
    }
}

impl Drop for VersioningPaused<'_> {
    fn drop(&mut self) {
        self.record.ledger_mut().set_enabled(self.prior);
    }
}
