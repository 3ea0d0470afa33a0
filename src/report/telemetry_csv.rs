use crate::report::CsvTable;
use crate::telemetry::{
    AnnotatedRecord, DATE_FIELD, DISPLAY_LOGIN_FIELD, EMAIL_FIELD, IS_ACTIVE_FIELD,
    KNOWN_COUNTERS, KNOWN_DESCRIPTORS,
};

/// One row per raw telemetry record, tagged with its display login. `None`
/// when there is nothing to export.
pub fn build_raw_csv(records: &[AnnotatedRecord]) -> Option<CsvTable> {
    if records.is_empty() {
        return None;
    }
    let text_fields: Vec<&str> = [DATE_FIELD, IS_ACTIVE_FIELD]
        .into_iter()
        .chain(KNOWN_DESCRIPTORS)
        .chain([EMAIL_FIELD])
        .collect();
    let headers = [DISPLAY_LOGIN_FIELD]
        .into_iter()
        .chain(text_fields.iter().copied())
        .chain(KNOWN_COUNTERS)
        .map(String::from)
        .collect();

    let mut table = CsvTable::new(headers);
    for annotated in records {
        let record = &annotated.record;
        let mut row = vec![
            annotated.display_login.clone(),
            record.date.to_string(),
            record.is_active.to_string(),
        ];
        row.extend(
            KNOWN_DESCRIPTORS
                .iter()
                .map(|name| record.descriptor(name).unwrap_or_default().to_string()),
        );
        row.push(record.email.clone().unwrap_or_default());
        row.extend(KNOWN_COUNTERS.iter().map(|name| record.counter(name).to_string()));
        table.push_row(row);
    }
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryRecord;

    #[test]
    fn empty_input_exports_nothing() {
        assert_eq!(build_raw_csv(&[]), None);
    }

    #[test]
    fn row_layout() {
        let mut record = TelemetryRecord {
            date: 1714521600000,
            is_active: true,
            email: Some("alice@corp.com".to_string()),
            ..Default::default()
        };
        record.counters.insert("chatRequests".to_string(), 3);
        record
            .descriptors
            .insert("clientVersion".to_string(), "1.2.0".to_string());
        let table = build_raw_csv(&[AnnotatedRecord {
            display_login: "alice".to_string(),
            record,
        }])
        .unwrap();

        assert_eq!(table.headers()[0], "githubUser");
        assert_eq!(table.headers()[1], "date");
        assert_eq!(table.headers()[7], "email");
        assert_eq!(table.headers()[8], "totalLinesAdded");
        assert_eq!(table.value("alice", "isActive"), Some("true"));
        assert_eq!(table.value("alice", "clientVersion"), Some("1.2.0"));
        assert_eq!(table.value("alice", "mostUsedModel"), Some(""));
        assert_eq!(table.value("alice", "chatRequests"), Some("3"));
        assert_eq!(table.value("alice", "bugbotUsages"), Some("0"));
    }
}
