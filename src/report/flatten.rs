use crate::identity::IdentityKeyMode;
use crate::model::{
    Collection, CollectionMap, Granularity, Roster, TIME_FROM_INITIAL_REQUEST_TO_RESPONSE,
    TIME_FROM_OPEN_TO_RESPONSE, TIME_FROM_REPEATED_REQUEST_TO_RESPONSE, TIME_IN_DRAFT,
    TIME_TO_APPROVE, TIME_TO_MERGE, TIME_TO_REVIEW, TIME_TO_REVIEW_REQUEST, TOTAL_KEY,
};
use crate::report::CsvTable;
use crate::telemetry::{Aggregates, TelemetryAggregate, HEADLINE_COUNTERS};
use indexmap::IndexMap;

const LEAD_HEADERS: [&str; 3] = ["user", "email", "Date(UTC)"];

pub const BASE_HEADERS: [&str; 28] = [
    "openedPRs",
    "mergedPRs",
    "revertedPRs",
    "unreviewedPRs",
    "unapprovedPRs",
    "additions",
    "deletions",
    "cursorLinesAdded",
    "cursorLinesDeleted",
    "cursorAcceptedLinesAdded",
    "cursorAcceptedLinesDeleted",
    "timeline_timeInDraft",
    "timeline_timeToReviewRequest",
    "timeline_timeToReview",
    "timeline_timeToApprove",
    "timeline_timeToMerge",
    "pr_totalDiscussionsReceived",
    "pr_commentsReceived",
    "pr_changesRequestedReceived",
    "review_reviewsConducted",
    "review_discussionsConducted",
    "review_commentsConducted",
    "review_changesRequested",
    "review_commented",
    "review_approved",
    "response_timeFromOpenToResponse",
    "response_timeFromInitialRequestToResponse",
    "response_timeFromRepeatedRequestToResponse",
];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ColumnKind {
    Counter,
    Descriptor,
}

impl ColumnKind {
    fn missing(&self) -> String {
        match self {
            Self::Counter => "0".to_string(),
            Self::Descriptor => String::new(),
        }
    }
}

pub struct FlattenOptions<'a> {
    pub granularity: Granularity,
    /// Report end date shown in the `Date(UTC)` column.
    pub report_day: Option<String>,
    pub roster: &'a Roster,
    /// Extra user keys that never get a row.
    pub excluded: &'a [String],
    pub key_mode: IdentityKeyMode,
}

/// Telemetry columns beyond the headline counters, in first-seen order over
/// the aggregates.
pub fn extra_columns(aggregates: &Aggregates) -> IndexMap<String, ColumnKind> {
    let mut columns = IndexMap::new();
    for aggregate in aggregates.values() {
        for name in aggregate.counters.keys() {
            if !HEADLINE_COUNTERS.contains(&name.as_str()) {
                columns.entry(name.clone()).or_insert(ColumnKind::Counter);
            }
        }
        for name in aggregate.descriptors.keys() {
            columns.entry(name.clone()).or_insert(ColumnKind::Descriptor);
        }
    }
    columns
}

/// Whether `user` gets a row of its own.
pub fn is_reported(user: &str, options: &FlattenOptions) -> bool {
    user != TOTAL_KEY
        && !options.excluded.iter().any(|excluded| excluded == user)
        && !options.roster.is_team(user)
        && !options.roster.is_bot(user)
}

pub fn build_csv(
    data: &CollectionMap,
    aggregates: &Aggregates,
    login_emails: &IndexMap<String, String>,
    options: &FlattenOptions,
) -> CsvTable {
    let extras = extra_columns(aggregates);
    let headers = LEAD_HEADERS
        .iter()
        .chain(BASE_HEADERS.iter())
        .map(|header| header.to_string())
        .chain(extras.keys().cloned())
        .collect();
    let mut table = CsvTable::new(headers);

    let snapshot_key = options.granularity.snapshot_key();
    let received = data.snapshot(TOTAL_KEY, &snapshot_key);
    let mut users: Vec<&String> = data
        .logins()
        .filter(|user| is_reported(user, options))
        .collect();
    users.sort();

    for user in users {
        let email = login_emails.get(user.as_str());
        let aggregate = find_aggregate(aggregates, user, email, options.key_mode);
        let mut row = vec![
            user.clone(),
            email.cloned().unwrap_or_default(),
            options.report_day.clone().unwrap_or_default(),
        ];
        row.extend(base_values(
            &data.snapshot(user, &snapshot_key),
            &data.snapshot(user, TOTAL_KEY),
            received.reviews_with(user).changes_requested,
        ));
        for (name, kind) in &extras {
            row.push(
                aggregate
                    .and_then(|aggregate| aggregate.value(name))
                    .unwrap_or_else(|| kind.missing()),
            );
        }
        table.push_row(row);
    }
    table
}

fn find_aggregate<'a>(
    aggregates: &'a Aggregates,
    user: &str,
    email: Option<&String>,
    key_mode: IdentityKeyMode,
) -> Option<&'a TelemetryAggregate> {
    email
        .and_then(|email| aggregates.get(&key_mode.key(email)))
        .or_else(|| aggregates.get(&user.to_lowercase()))
}

/// Values for [`BASE_HEADERS`]. Telemetry counters are only kept on the
/// `"total"` collection, so they come from `run_total`.
fn base_values(col: &Collection, run_total: &Collection, changes_requested_received: u64) -> Vec<String> {
    let reviews = col.total_reviews();
    let counts = [
        col.opened,
        col.merged,
        col.reverted,
        col.unreviewed,
        col.unapproved,
        col.additions,
        col.deletions,
    ];
    let cursor = [
        run_total.cursor_total_lines_added,
        run_total.cursor_total_lines_deleted,
        run_total.cursor_accepted_lines_added,
        run_total.cursor_accepted_lines_deleted,
    ];
    let timeline = [
        TIME_IN_DRAFT,
        TIME_TO_REVIEW_REQUEST,
        TIME_TO_REVIEW,
        TIME_TO_APPROVE,
        TIME_TO_MERGE,
    ];
    let engagement = [
        col.discussions.received.total,
        col.review_comments,
        changes_requested_received,
        reviews.total,
        col.discussions.conducted.total,
        col.comments_conducted,
        reviews.changes_requested,
        reviews.commented,
        reviews.approved,
    ];
    let response = [
        TIME_FROM_OPEN_TO_RESPONSE,
        TIME_FROM_INITIAL_REQUEST_TO_RESPONSE,
        TIME_FROM_REPEATED_REQUEST_TO_RESPONSE,
    ];

    counts
        .iter()
        .map(u64::to_string)
        .chain(cursor.iter().map(i64::to_string))
        .chain(timeline.iter().map(|metric| minutes(col.timing(metric))))
        .chain(engagement.iter().map(u64::to_string))
        .chain(response.iter().map(|metric| minutes(col.median_of(metric))))
        .collect()
}

fn minutes(value: f64) -> String {
    ((value * 100.0).round() / 100.0).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayKeyPolicy, IdentityKind, ReportPeriod, ReviewState, User};
    use crate::telemetry::{aggregate, TelemetryRecord, TOTAL_LINES_ADDED};
    use pretty_assertions::assert_eq;

    fn options<'a>(roster: &'a Roster, excluded: &'a [String]) -> FlattenOptions<'a> {
        FlattenOptions {
            granularity: Granularity::MultiPeriod,
            report_day: Some("2024-05-07".to_string()),
            roster,
            excluded,
            key_mode: IdentityKeyMode::LocalPart,
        }
    }

    fn telemetry(email: &str, model: Option<&str>) -> TelemetryRecord {
        let mut record = TelemetryRecord {
            email: Some(email.to_string()),
            ..Default::default()
        };
        record.counters.insert(TOTAL_LINES_ADDED.to_string(), 4);
        if let Some(model) = model {
            record.descriptors.insert("mostUsedModel".to_string(), model.to_string());
        }
        record
    }

    #[test]
    fn header_order_is_fixed_then_first_seen() {
        let aggregates = aggregate(
            &[telemetry("a@x.com", None), telemetry("b@x.com", Some("claude"))],
            IdentityKeyMode::LocalPart,
        );
        let table = build_csv(
            &CollectionMap::new(),
            &aggregates,
            &IndexMap::new(),
            &options(&Roster::default(), &[]),
        );
        let headers = table.headers();
        assert_eq!(&headers[..4], ["user", "email", "Date(UTC)", "openedPRs"]);
        assert_eq!(headers[3 + BASE_HEADERS.len()], "totalApplies");
        assert_eq!(headers.last().map(String::as_str), Some("mostUsedModel"));
        assert!(!headers.iter().any(|h| h == TOTAL_LINES_ADDED));
    }

    #[test]
    fn missing_metrics_default_to_zero_or_empty() {
        let mut data = CollectionMap::new();
        data.entry("alice", TOTAL_KEY).opened = 2;
        data.entry("bob", TOTAL_KEY);
        let aggregates = aggregate(
            &[telemetry("alice@x.com", Some("claude"))],
            IdentityKeyMode::LocalPart,
        );
        let mut emails = IndexMap::new();
        emails.insert("alice".to_string(), "alice@x.com".to_string());

        let table = build_csv(&data, &aggregates, &emails, &options(&Roster::default(), &[]));

        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.value("alice", "openedPRs"), Some("2"));
        assert_eq!(table.value("alice", "mostUsedModel"), Some("claude"));
        assert_eq!(table.value("bob", "email"), Some(""));
        assert_eq!(table.value("bob", "timeline_timeToMerge"), Some("0"));
        assert_eq!(table.value("bob", "chatRequests"), Some("0"));
        assert_eq!(table.value("bob", "mostUsedModel"), Some(""));
        for row in table.rows() {
            assert_eq!(row.len(), table.headers().len());
        }
    }

    #[test]
    fn bots_teams_and_excluded_keys_get_no_row() {
        let mut data = CollectionMap::new();
        for user in ["alice", "ci[bot]", "core", "ghost", "talbot", TOTAL_KEY] {
            data.entry(user, TOTAL_KEY).opened = 1;
        }
        let roster = Roster::new(&[User::new("talbot", IdentityKind::User, vec!["core"])]);
        let excluded = vec!["ghost".to_string()];

        let table = build_csv(&data, &Aggregates::new(), &IndexMap::new(), &options(&roster, &excluded));

        let users: Vec<_> = table.rows().iter().map(|row| row[0].as_str()).collect();
        assert_eq!(users, vec!["alice", "talbot"]);
    }

    #[test]
    fn single_day_reads_the_configured_key() {
        let period = ReportPeriod::parse("2024-05-03", "2024-05-03").unwrap();
        let mut data = CollectionMap::new();
        data.entry("alice", TOTAL_KEY).opened = 9;
        data.entry("alice", "2024-05-03").opened = 2;
        data.entry("alice", "invalid date").opened = 1;
        data.entry("alice", TOTAL_KEY).cursor_total_lines_added = 40;
        let roster = Roster::default();

        let mut opts = options(&roster, &[]);
        opts.granularity = period.granularity(DayKeyPolicy::Calendar);
        let table = build_csv(&data, &Aggregates::new(), &IndexMap::new(), &opts);
        assert_eq!(table.value("alice", "openedPRs"), Some("2"));
        assert_eq!(table.value("alice", "cursorLinesAdded"), Some("40"));

        opts.granularity = period.granularity(DayKeyPolicy::InvalidDate);
        let table = build_csv(&data, &Aggregates::new(), &IndexMap::new(), &opts);
        assert_eq!(table.value("alice", "openedPRs"), Some("1"));
    }

    #[test]
    fn changes_requested_received_comes_from_run_total() {
        let mut data = CollectionMap::new();
        data.entry("alice", TOTAL_KEY).opened = 1;
        data.entry(TOTAL_KEY, TOTAL_KEY)
            .reviews_conducted
            .entry("alice".to_string())
            .or_default()
            .record(ReviewState::ChangesRequested);
        data.entry(TOTAL_KEY, TOTAL_KEY)
            .median
            .insert(TIME_TO_MERGE.to_string(), 1.0);

        let table = build_csv(&data, &Aggregates::new(), &IndexMap::new(), &options(&Roster::default(), &[]));

        assert_eq!(table.value("alice", "pr_changesRequestedReceived"), Some("1"));
    }
}
