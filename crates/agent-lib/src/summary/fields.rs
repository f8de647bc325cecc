//! Field tables and name normalization
//!
//! Each table lists the source keys a walker reads, in emission order,
//! together with the accessor for the typed field.

use crate::models::{FsStats, InterfaceStats, MemoryStats, Reading, RlimitStats};

/// Accessor pairing for one known field of a sub-document
pub(crate) type Field<T> = (&'static str, fn(&T) -> Option<Reading>);

pub(crate) const MEMORY_FIELDS: &[Field<MemoryStats>] = &[
    ("availableBytes", |m| m.available_bytes.clone()),
    ("usageBytes", |m| m.usage_bytes.clone()),
    ("workingSetBytes", |m| m.working_set_bytes.clone()),
    ("rssBytes", |m| m.rss_bytes.clone()),
    ("pageFaults", |m| m.page_faults.clone()),
    ("majorPageFaults", |m| m.major_page_faults.clone()),
];

pub(crate) const INTERFACE_FIELDS: &[Field<InterfaceStats>] = &[
    ("rxBytes", |i| i.rx_bytes.clone()),
    ("rxErrors", |i| i.rx_errors.clone()),
    ("txBytes", |i| i.tx_bytes.clone()),
    ("txErrors", |i| i.tx_errors.clone()),
];

pub(crate) const FS_FIELDS: &[Field<FsStats>] = &[
    ("availableBytes", |f| f.available_bytes.clone()),
    ("capacityBytes", |f| f.capacity_bytes.clone()),
    ("usedBytes", |f| f.used_bytes.clone()),
    ("inodesFree", |f| f.inodes_free.clone()),
    ("inodes", |f| f.inodes.clone()),
    ("inodesUsed", |f| f.inodes_used.clone()),
];

pub(crate) const RLIMIT_FIELDS: &[Field<RlimitStats>] = &[
    ("maxpid", |r| r.maxpid.clone()),
    ("curproc", |r| r.curproc.clone()),
];

/// Convert a camelCase key into a lowercase, underscore separated suffix.
///
/// An underscore is inserted before every ASCII uppercase letter, so
/// `majorPageFaults` becomes `major_page_faults`. Input without ASCII
/// uppercase letters is returned unchanged.
pub fn normalize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
