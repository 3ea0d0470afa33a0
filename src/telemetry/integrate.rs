use crate::identity::{CommitLookup, IdentityKeyMode, IdentityResolver, ResolvedIdentities};
use crate::model::{CollectionMap, TOTAL_KEY};
use crate::telemetry::{
    aggregate, Aggregates, AnnotatedRecord, TelemetryRecord, TelemetrySource,
    ACCEPTED_LINES_ADDED, ACCEPTED_LINES_DELETED, TOTAL_LINES_ADDED, TOTAL_LINES_DELETED,
};
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub key_mode: IdentityKeyMode,
}

/// What the enrichment leaves behind for the CSV writers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryOutcome {
    pub aggregates: Aggregates,
    pub identities: ResolvedIdentities,
    pub raw: Vec<AnnotatedRecord>,
}

/// Fetches usage telemetry, resolves the report's logins to emails and folds
/// the headline counters into `data`. Does nothing when telemetry is
/// disabled or the source has no rows.
pub async fn enrich<S, L>(
    data: &mut CollectionMap,
    settings: TelemetrySettings,
    source: &S,
    resolver: &IdentityResolver<'_, L>,
    progress: impl Fn(&str),
) -> Option<TelemetryOutcome>
where
    S: TelemetrySource,
    L: CommitLookup,
{
    if !settings.enabled {
        return None;
    }
    let records = source.fetch_usage().await;
    if records.is_empty() {
        info!("No telemetry rows, skipping enrichment");
        return None;
    }

    let logins: Vec<String> = data.logins().cloned().collect();
    let identities = resolver.resolve(&logins, progress).await;
    info!(
        "Resolved {} of {} logins to an email",
        identities.login_emails.len(),
        logins.len()
    );
    Some(integrate(data, &records, identities, settings.key_mode))
}

/// Merges telemetry into the `"total"` collections of resolved logins and
/// recomputes the run-wide total from those logins only.
pub fn integrate(
    data: &mut CollectionMap,
    records: &[TelemetryRecord],
    identities: ResolvedIdentities,
    key_mode: IdentityKeyMode,
) -> TelemetryOutcome {
    let aggregates = aggregate(records, key_mode);

    for (login, email) in &identities.login_emails {
        let Some(aggregate) = aggregates.get(&key_mode.key(email)) else {
            continue;
        };
        let collection = data.entry(login, TOTAL_KEY);
        collection.cursor_total_lines_added = aggregate.counter(TOTAL_LINES_ADDED);
        collection.cursor_total_lines_deleted = aggregate.counter(TOTAL_LINES_DELETED);
        collection.cursor_accepted_lines_added = aggregate.counter(ACCEPTED_LINES_ADDED);
        collection.cursor_accepted_lines_deleted = aggregate.counter(ACCEPTED_LINES_DELETED);
    }

    let totals = identities
        .login_emails
        .keys()
        .filter_map(|login| data.get(login, TOTAL_KEY))
        .fold([0_i64; 4], |mut totals, collection| {
            totals[0] += collection.cursor_total_lines_added;
            totals[1] += collection.cursor_total_lines_deleted;
            totals[2] += collection.cursor_accepted_lines_added;
            totals[3] += collection.cursor_accepted_lines_deleted;
            totals
        });
    let total = data.entry(TOTAL_KEY, TOTAL_KEY);
    total.cursor_total_lines_added = totals[0];
    total.cursor_total_lines_deleted = totals[1];
    total.cursor_accepted_lines_added = totals[2];
    total.cursor_accepted_lines_deleted = totals[3];

    let raw = records
        .iter()
        .map(|record| AnnotatedRecord {
            display_login: identities.display_login(record.email.as_deref()),
            record: record.clone(),
        })
        .collect();

    TelemetryOutcome {
        aggregates,
        identities,
        raw,
    }
}
