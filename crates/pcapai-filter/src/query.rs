//! Conjunctive queries and the single-predicate constructors.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use pcapai_core::PacketRecord;
use serde::{Deserialize, Serialize};

use crate::predicate::{HostDirection, Predicate};

/// An ordered list of predicates combined with logical AND.
///
/// An empty query matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    predicates: Vec<Predicate>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style conjunction.
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether any predicate constrains the protocol explicitly.
    pub fn names_protocol(&self) -> bool {
        self.predicates.iter().any(Predicate::names_protocol)
    }

    /// Prepend an implicit protocol predicate unless one is already present.
    pub fn with_focus(mut self, focus: Option<&str>) -> Self {
        if let Some(name) = focus {
            if !self.names_protocol() {
                self.predicates.insert(
                    0,
                    Predicate::Protocol {
                        name: name.to_string(),
                    },
                );
            }
        }
        self
    }

    /// Run the query against a record sequence.
    ///
    /// Records must be in capture order (strictly increasing index,
    /// non-decreasing timestamp). Range predicates narrow the slice by binary
    /// search before the remaining predicates are evaluated per record.
    pub fn apply<'a>(&self, records: &'a [PacketRecord]) -> Vec<&'a PacketRecord> {
        let window = self.narrow(records);
        window
            .iter()
            .filter(|r| self.predicates.iter().all(|p| p.matches(r)))
            .collect()
    }

    /// Number of matching records, without collecting them.
    pub fn count(&self, records: &[PacketRecord]) -> usize {
        self.narrow(records)
            .iter()
            .filter(|r| self.predicates.iter().all(|p| p.matches(r)))
            .count()
    }

    fn narrow<'a>(&self, records: &'a [PacketRecord]) -> &'a [PacketRecord] {
        let mut window = records;
        for predicate in &self.predicates {
            window = match predicate {
                Predicate::IndexRange { lo, hi } => {
                    if lo > hi {
                        return &[];
                    }
                    let start = window.partition_point(|r| r.index() < *lo);
                    let end = window.partition_point(|r| r.index() <= *hi);
                    &window[start..end.max(start)]
                }
                Predicate::TimeRange { start, end } => {
                    if start > end {
                        return &[];
                    }
                    let from = window.partition_point(|r| r.timestamp() < *start);
                    let to = window.partition_point(|r| r.timestamp() <= *end);
                    &window[from..to.max(from)]
                }
                _ => window,
            };
        }
        window
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.predicates.is_empty() {
            return write!(f, "all");
        }
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", predicate)?;
        }
        Ok(())
    }
}

impl From<Predicate> for Query {
    fn from(predicate: Predicate) -> Self {
        Query::new().and(predicate)
    }
}

impl FromIterator<Predicate> for Query {
    fn from_iter<T: IntoIterator<Item = Predicate>>(iter: T) -> Self {
        Self {
            predicates: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Single-predicate constructors
// =============================================================================

/// Records captured within `[start, end]`. `start > end` yields nothing.
pub fn by_time_range(
    records: &[PacketRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<&PacketRecord> {
    Query::from(Predicate::TimeRange { start, end }).apply(records)
}

/// Records with index in `[lo, hi]`, clamped to the indices present.
pub fn by_index_range(records: &[PacketRecord], lo: u64, hi: u64) -> Vec<&PacketRecord> {
    Query::from(Predicate::IndexRange { lo, hi }).apply(records)
}

/// The record with index `n`, if present.
pub fn by_index(records: &[PacketRecord], n: u64) -> Vec<&PacketRecord> {
    by_index_range(records, n, n)
}

pub fn by_protocol<'a>(records: &'a [PacketRecord], name: &str) -> Vec<&'a PacketRecord> {
    Query::from(Predicate::Protocol {
        name: name.to_string(),
    })
    .apply(records)
}

/// Records whose `protocol`'s operation field equals `operation`.
pub fn by_operation<'a>(
    records: &'a [PacketRecord],
    protocol: &str,
    operation: &str,
) -> Vec<&'a PacketRecord> {
    Query::from(Predicate::Operation {
        protocol: Some(protocol.to_string()),
        operation: operation.to_string(),
    })
    .apply(records)
}

pub fn by_field_equals<'a>(
    records: &'a [PacketRecord],
    protocol: &str,
    field: &str,
    value: &str,
) -> Vec<&'a PacketRecord> {
    Query::from(Predicate::FieldEquals {
        protocol: protocol.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    })
    .apply(records)
}

pub fn by_field_contains<'a>(
    records: &'a [PacketRecord],
    protocol: &str,
    field: &str,
    value: &str,
) -> Vec<&'a PacketRecord> {
    Query::from(Predicate::FieldContains {
        protocol: protocol.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    })
    .apply(records)
}

pub fn by_host(
    records: &[PacketRecord],
    address: IpAddr,
    direction: HostDirection,
) -> Vec<&PacketRecord> {
    Query::from(Predicate::Host { address, direction }).apply(records)
}
