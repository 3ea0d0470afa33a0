use crate::identity::IdentityKeyMode;
use crate::telemetry::{TelemetryRecord, KNOWN_COUNTERS};
use indexmap::IndexMap;

/// Identity key → accumulated telemetry.
pub type Aggregates = IndexMap<String, TelemetryAggregate>;

/// Sum of every counter and the latest non-empty value of every descriptor
/// over the records of one identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryAggregate {
    pub counters: IndexMap<String, i64>,
    pub descriptors: IndexMap<String, String>,
}

impl Default for TelemetryAggregate {
    fn default() -> Self {
        Self {
            counters: KNOWN_COUNTERS
                .iter()
                .map(|name| (name.to_string(), 0))
                .collect(),
            descriptors: IndexMap::new(),
        }
    }
}

impl TelemetryAggregate {
    pub fn absorb(&mut self, record: &TelemetryRecord) {
        for (name, value) in &record.counters {
            *self.counters.entry(name.clone()).or_default() += value;
        }
        for (name, value) in &record.descriptors {
            if !value.is_empty() {
                self.descriptors.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or_default()
    }

    /// Counter names first, then descriptor names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.counters.keys().chain(self.descriptors.keys())
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.counters
            .get(key)
            .map(|value| value.to_string())
            .or_else(|| self.descriptors.get(key).cloned())
    }
}

/// Folds records in input order into one aggregate per identity key. Records
/// without an email are skipped.
pub fn aggregate(records: &[TelemetryRecord], mode: IdentityKeyMode) -> Aggregates {
    records
        .iter()
        .filter_map(|record| Some((mode.key(record.email.as_deref()?), record)))
        .fold(Aggregates::new(), |mut aggregates, (key, record)| {
            aggregates.entry(key).or_default().absorb(record);
            aggregates
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{ACCEPTED_LINES_ADDED, TOTAL_LINES_ADDED};
    use pretty_assertions::assert_eq;

    fn record(email: Option<&str>, added: i64, model: &str) -> TelemetryRecord {
        let mut record = TelemetryRecord {
            email: email.map(String::from),
            ..Default::default()
        };
        record.counters.insert(TOTAL_LINES_ADDED.to_string(), added);
        record.counters.insert(ACCEPTED_LINES_ADDED.to_string(), added / 2);
        record
            .descriptors
            .insert("mostUsedModel".to_string(), model.to_string());
        record
    }

    #[test]
    fn groups_by_local_part_across_domains() {
        let aggregates = aggregate(
            &[record(Some("a@x.com"), 10, ""), record(Some("A@y.com"), 4, "")],
            IdentityKeyMode::LocalPart,
        );
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates["a"].counter(TOTAL_LINES_ADDED), 14);
        assert_eq!(aggregates["a"].counter(ACCEPTED_LINES_ADDED), 7);
    }

    #[test]
    fn email_mode_keeps_domains_apart() {
        let aggregates = aggregate(
            &[record(Some("a@x.com"), 10, ""), record(Some("A@y.com"), 4, "")],
            IdentityKeyMode::Email,
        );
        assert_eq!(aggregates.keys().collect::<Vec<_>>(), vec!["a@x.com", "a@y.com"]);
    }

    #[test]
    fn latest_non_empty_descriptor_wins() {
        let aggregates = aggregate(
            &[
                record(Some("a@x.com"), 1, "gpt"),
                record(Some("a@x.com"), 1, ""),
                record(Some("a@x.com"), 1, "claude"),
            ],
            IdentityKeyMode::LocalPart,
        );
        assert_eq!(aggregates["a"].value("mostUsedModel").as_deref(), Some("claude"));

        let aggregates = aggregate(
            &[record(Some("a@x.com"), 1, "gpt"), record(Some("a@x.com"), 1, "")],
            IdentityKeyMode::LocalPart,
        );
        assert_eq!(aggregates["a"].value("mostUsedModel").as_deref(), Some("gpt"));
    }

    #[test]
    fn records_without_email_are_dropped() {
        let aggregates = aggregate(&[record(None, 10, "gpt")], IdentityKeyMode::LocalPart);
        assert!(aggregates.is_empty());
    }

    #[test]
    fn known_counters_are_seeded_in_order() {
        let aggregates = aggregate(&[record(Some("a@x.com"), 1, "")], IdentityKeyMode::LocalPart);
        let keys: Vec<_> = aggregates["a"].keys().take(2).collect();
        assert_eq!(keys, vec!["totalLinesAdded", "totalLinesDeleted"]);
        assert_eq!(aggregates["a"].value("bugbotUsages").as_deref(), Some("0"));
    }
}
