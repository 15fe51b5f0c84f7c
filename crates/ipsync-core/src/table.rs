//! The in-memory IP table.
//!
//! Conceptually a mapping from ip to [`IpRecord`]. Materialized views come
//! out in ascending ip order; callers must not attach meaning to the order.

use std::collections::BTreeMap;

use crate::record::{IpDelta, IpRecord};

/// What applying a delta did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// The IP was unknown and a new record was inserted.
    Inserted,
    /// An existing record was merged field by field.
    Merged,
}

/// Mapping from ip to record. `ip` is unique by construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpTable {
    records: BTreeMap<String, IpRecord>,
}

impl IpTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a snapshot's record list.
    ///
    /// If the list names the same ip twice, the later record wins.
    pub fn from_records(records: impl IntoIterator<Item = IpRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.ip.clone(), record))
            .collect();
        Self { records }
    }

    /// Replace the whole table.
    pub fn replace(&mut self, records: impl IntoIterator<Item = IpRecord>) {
        *self = Self::from_records(records);
    }

    /// Merge a delta into the matching record, or insert a new one.
    pub fn apply_delta(&mut self, delta: &IpDelta) -> DeltaOutcome {
        match self.records.get_mut(&delta.ip) {
            Some(existing) => {
                existing.merge(delta);
                DeltaOutcome::Merged
            }
            None => {
                self.records
                    .insert(delta.ip.clone(), IpRecord::from_delta(delta));
                DeltaOutcome::Inserted
            }
        }
    }

    pub fn get(&self, ip: &str) -> Option<&IpRecord> {
        self.records.get(ip)
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.records.contains_key(ip)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpRecord> {
        self.records.values()
    }

    /// Materialize the table as a sequence for transport or persistence.
    pub fn to_vec(&self) -> Vec<IpRecord> {
        self.records.values().cloned().collect()
    }
}
