use crate::model::TOTAL_KEY;
use indexmap::IndexMap;
use serde::Deserialize;

pub const TIME_IN_DRAFT: &str = "timeInDraft";
pub const TIME_TO_REVIEW_REQUEST: &str = "timeToReviewRequest";
pub const TIME_TO_REVIEW: &str = "timeToReview";
pub const TIME_TO_APPROVE: &str = "timeToApprove";
pub const TIME_TO_MERGE: &str = "timeToMerge";
pub const TIME_FROM_OPEN_TO_RESPONSE: &str = "timeFromOpenToResponse";
pub const TIME_FROM_INITIAL_REQUEST_TO_RESPONSE: &str = "timeFromInitialRequestToResponse";
pub const TIME_FROM_REPEATED_REQUEST_TO_RESPONSE: &str = "timeFromRepeatedRequestToResponse";

/// Pull request size labels, smallest first.
pub const SIZE_LABELS: [&str; 5] = ["xs", "s", "m", "l", "xl"];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOutcomes {
    pub changes_requested: u64,
    pub commented: u64,
    pub approved: u64,
    pub total: u64,
}

impl ReviewOutcomes {
    pub fn record(&mut self, state: ReviewState) {
        match state {
            ReviewState::Approved => self.approved += 1,
            ReviewState::ChangesRequested => self.changes_requested += 1,
            ReviewState::Commented => self.commented += 1,
            ReviewState::Dismissed | ReviewState::Pending | ReviewState::Unknown => return,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscussionCounts {
    pub agreed: u64,
    pub disagreed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discussions {
    pub received: DiscussionCounts,
    pub conducted: DiscussionCounts,
}

/// Accumulated metrics of one user within one period key. Every field starts
/// at zero, so a metric that was never recorded reads as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub opened: u64,
    pub closed: u64,
    pub merged: u64,
    pub reverted: u64,
    pub unreviewed: u64,
    pub unapproved: u64,
    pub additions: u64,
    pub deletions: u64,
    pub comments: u64,
    pub review_comments: u64,
    pub comments_conducted: u64,
    pub merged_to_default: u64,
    pub additions_to_default: u64,
    pub deletions_to_default: u64,
    pub pr_sizes: Vec<String>,
    pub cursor_total_lines_added: i64,
    pub cursor_total_lines_deleted: i64,
    pub cursor_accepted_lines_added: i64,
    pub cursor_accepted_lines_deleted: i64,
    pub percentile: IndexMap<String, f64>,
    pub median: IndexMap<String, f64>,
    pub discussions: Discussions,
    /// Review outcomes keyed by the other party of the review, plus a
    /// `"total"` entry.
    pub reviews_conducted: IndexMap<String, ReviewOutcomes>,
}

impl Collection {
    pub fn median_of(&self, metric: &str) -> f64 {
        self.median.get(metric).copied().unwrap_or_default()
    }

    /// Percentile of a timing metric, falling back to its median.
    pub fn timing(&self, metric: &str) -> f64 {
        match self.percentile.get(metric) {
            Some(value) if *value != 0.0 => *value,
            _ => self.median_of(metric),
        }
    }

    pub fn reviews_with(&self, key: &str) -> ReviewOutcomes {
        self.reviews_conducted.get(key).cloned().unwrap_or_default()
    }

    pub fn total_reviews(&self) -> ReviewOutcomes {
        self.reviews_with(TOTAL_KEY)
    }

    /// Pull request count per size label, e.g. `xs:2 m:1`.
    pub fn size_summary(&self) -> String {
        SIZE_LABELS
            .iter()
            .filter_map(|label| {
                let count = self.pr_sizes.iter().filter(|size| size == label).count();
                (count > 0).then(|| format!("{label}:{count}"))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The two-level map user → period key → [`Collection`] every stage writes
/// into. `"total"` as a user is the run-wide pseudo-user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionMap {
    users: IndexMap<String, IndexMap<String, Collection>>,
}

impl CollectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, user: &str, period_key: &str) -> &mut Collection {
        self.users
            .entry(user.to_string())
            .or_default()
            .entry(period_key.to_string())
            .or_default()
    }

    pub fn get(&self, user: &str, period_key: &str) -> Option<&Collection> {
        self.users.get(user)?.get(period_key)
    }

    /// Snapshot of a user at a period key, zeroed when never recorded.
    pub fn snapshot(&self, user: &str, period_key: &str) -> Collection {
        self.get(user, period_key).cloned().unwrap_or_default()
    }

    /// Every user key except the run-wide pseudo-user.
    pub fn logins(&self) -> impl Iterator<Item = &String> {
        self.users.keys().filter(|user| user.as_str() != TOTAL_KEY)
    }
}
