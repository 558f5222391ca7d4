//! Grouping engine
//!
//! Pure functions that order signature records and partition them into named
//! groups for one of three grouping modes. Output depends only on the input
//! records and the mode.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SigPacketError;
use crate::types::SignatureRecord;

/// Group label for records whose signatory has not been identified
pub const UNKNOWN_SIGNATORY: &str = "Unknown Signatory";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    /// One group per document
    #[default]
    Agreement,
    /// One group per party name
    Counterparty,
    /// One group per signatory name
    Signatory,
}

impl GroupingMode {
    pub const ALL: [GroupingMode; 3] = [
        GroupingMode::Agreement,
        GroupingMode::Counterparty,
        GroupingMode::Signatory,
    ];

    /// Label of the group a record belongs to
    pub fn group_label<'a>(&self, record: &'a SignatureRecord) -> &'a str {
        match self {
            GroupingMode::Agreement => &record.document_name,
            GroupingMode::Counterparty => &record.party_name,
            GroupingMode::Signatory => {
                if signatory_known(record) {
                    &record.signatory_name
                } else {
                    UNKNOWN_SIGNATORY
                }
            }
        }
    }

    /// Total order used for review screens and group order
    pub fn compare(&self, a: &SignatureRecord, b: &SignatureRecord) -> Ordering {
        match self {
            GroupingMode::Agreement => a
                .document_name
                .cmp(&b.document_name)
                .then(a.page_index.cmp(&b.page_index)),
            GroupingMode::Counterparty => a
                .party_name
                .cmp(&b.party_name)
                .then_with(|| a.document_name.cmp(&b.document_name))
                .then(a.page_index.cmp(&b.page_index)),
            GroupingMode::Signatory => {
                // Unknown signatories collate after every named one
                signatory_known(b)
                    .cmp(&signatory_known(a))
                    .then_with(|| signatory_key(a).cmp(signatory_key(b)))
                    .then_with(|| a.party_name.cmp(&b.party_name))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingMode::Agreement => "agreement",
            GroupingMode::Counterparty => "counterparty",
            GroupingMode::Signatory => "signatory",
        }
    }
}

fn signatory_known(record: &SignatureRecord) -> bool {
    !record.signatory_name.trim().is_empty()
}

fn signatory_key(record: &SignatureRecord) -> &str {
    if signatory_known(record) {
        &record.signatory_name
    } else {
        ""
    }
}

impl fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupingMode {
    type Err = SigPacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let name = normalized.strip_prefix("by-").unwrap_or(&normalized);
        match name {
            "agreement" | "document" => Ok(GroupingMode::Agreement),
            "counterparty" | "party" => Ok(GroupingMode::Counterparty),
            "signatory" => Ok(GroupingMode::Signatory),
            other => Err(SigPacketError::OperationError(format!(
                "Unknown grouping mode '{}'. Must be 'agreement', 'counterparty', or 'signatory'",
                other
            ))),
        }
    }
}

/// Records in display order for `mode`; ties keep their input order
pub fn sort_records(records: &[SignatureRecord], mode: GroupingMode) -> Vec<&SignatureRecord> {
    let mut sorted: Vec<&SignatureRecord> = records.iter().collect();
    sorted.sort_by(|a, b| mode.compare(a, b));
    sorted
}

/// Distinct group labels in order of first appearance in `sorted`
pub fn group_labels(sorted: &[&SignatureRecord], mode: GroupingMode) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for record in sorted {
        let label = mode.group_label(record);
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

/// Full ordering plus group labels, as consumed by navigation views
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping<'a> {
    pub records: Vec<&'a SignatureRecord>,
    pub labels: Vec<String>,
}

impl<'a> Grouping<'a> {
    pub fn compute(records: &'a [SignatureRecord], mode: GroupingMode) -> Self {
        let records = sort_records(records, mode);
        let labels = group_labels(&records, mode);
        Self { records, labels }
    }
}

/// A named bucket of records
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub label: String,
    pub records: Vec<&'a SignatureRecord>,
}

/// Split records into groups, in group-label order, each in display order
pub fn partition(records: &[SignatureRecord], mode: GroupingMode) -> Vec<Group<'_>> {
    let grouping = Grouping::compute(records, mode);
    let mut groups: Vec<Group<'_>> = grouping
        .labels
        .into_iter()
        .map(|label| Group {
            label,
            records: Vec::new(),
        })
        .collect();

    for record in grouping.records {
        let label = mode.group_label(record);
        if let Some(group) = groups.iter_mut().find(|g| g.label == label) {
            group.records.push(record);
        }
    }
    groups
}
