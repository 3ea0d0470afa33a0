use crate::analyze::stats::{median, percentile, REPORT_PERCENTILE};
use crate::analyze::DataAnalysis;
use crate::github::pull_request::{parse, PullRequestDetail, Review};
use crate::github::PullRequest;
use crate::model::{
    period_key, Collection, CollectionMap, ReviewState, SIZE_LABELS, TIME_FROM_OPEN_TO_RESPONSE,
    TIME_TO_APPROVE, TIME_TO_MERGE, TIME_TO_REVIEW, TOTAL_KEY,
};
use indexmap::IndexMap;

pub trait Analyzer {
    fn collect(&self) -> CollectionMap;
}

impl Analyzer for DataAnalysis {
    /// Builds every user's collections for `"total"` and for the period key
    /// of each pull request's close date.
    fn collect(&self) -> CollectionMap {
        let mut data = CollectionMap::new();
        let mut timings = Timings::default();

        for pull_request in self.pull_requests.values().flatten() {
            let request = &pull_request.request;
            let Some(author) = request.author() else {
                continue;
            };
            let keys = [TOTAL_KEY.to_string(), period_key(request.closed_at.as_deref())];
            let reviews = reviews_by_others(pull_request, author);

            for key in &keys {
                for user in [author, TOTAL_KEY] {
                    let collection = data.entry(user, key);
                    collection.analyze_request(request);
                    collection.analyze_review_status(&reviews);
                    collection.analyze_received_discussions(pull_request, author);
                }
                for review in &reviews {
                    let Some(reviewer) = review.user.as_ref().map(|u| u.login.as_str()) else {
                        continue;
                    };
                    data.entry(reviewer, key).analyze_review(author, review.state);
                    // The pseudo-user tallies outcomes by the author reviewed.
                    data.entry(TOTAL_KEY, key).analyze_review(author, review.state);
                }
                for comment in &pull_request.comments {
                    let Some(commenter) = comment.user.as_ref().map(|u| u.login.as_str()) else {
                        continue;
                    };
                    if commenter == author {
                        continue;
                    }
                    let collection = data.entry(commenter, key);
                    collection.comments_conducted += 1;
                    if comment.in_reply_to_id.is_none() {
                        collection.discussions.conducted.total += 1;
                        collection.discussions.conducted.agreed +=
                            u64::from(comment.reactions.plus_one > 0);
                        collection.discussions.conducted.disagreed +=
                            u64::from(comment.reactions.minus_one > 0);
                    }
                }
            }
            timings.record(pull_request, author, &keys, &reviews);
        }

        timings.finalize(&mut data);
        data
    }
}

trait PullRequestAnalyzer {
    fn analyze_request(&mut self, request: &PullRequestDetail);
    fn analyze_review_status(&mut self, reviews: &[&Review]);
    fn analyze_received_discussions(&mut self, pull_request: &PullRequest, author: &str);
    fn analyze_review(&mut self, author: &str, state: ReviewState);
}

impl PullRequestAnalyzer for Collection {
    fn analyze_request(&mut self, request: &PullRequestDetail) {
        self.opened += 1;
        self.closed += u64::from(request.closed_at.is_some());
        self.merged += u64::from(request.merged);
        self.reverted += u64::from(request.is_revert());
        self.comments += request.comments;
        self.review_comments += request.review_comments;
        self.additions += request.additions;
        self.deletions += request.deletions;
        if request.is_merged_to_default() {
            self.merged_to_default += 1;
            self.additions_to_default += request.additions;
            self.deletions_to_default += request.deletions;
        }
        self.pr_sizes
            .push(pull_request_size(request.additions, request.deletions).to_string());
    }

    fn analyze_review_status(&mut self, reviews: &[&Review]) {
        self.unreviewed += u64::from(reviews.is_empty());
        self.unapproved += u64::from(!reviews.iter().any(|r| r.state == ReviewState::Approved));
    }

    fn analyze_received_discussions(&mut self, pull_request: &PullRequest, author: &str) {
        let discussions = pull_request.comments.iter().filter(|comment| {
            comment.in_reply_to_id.is_none()
                && comment.user.as_ref().is_some_and(|u| u.login != author)
        });
        for comment in discussions {
            self.discussions.received.total += 1;
            self.discussions.received.agreed += u64::from(comment.reactions.plus_one > 0);
            self.discussions.received.disagreed += u64::from(comment.reactions.minus_one > 0);
        }
    }

    fn analyze_review(&mut self, author: &str, state: ReviewState) {
        self.reviews_conducted
            .entry(author.to_string())
            .or_default()
            .record(state);
        self.reviews_conducted
            .entry(TOTAL_KEY.to_string())
            .or_default()
            .record(state);
    }
}

fn reviews_by_others<'a>(pull_request: &'a PullRequest, author: &str) -> Vec<&'a Review> {
    pull_request
        .reviews
        .iter()
        .filter(|review| review.state != ReviewState::Pending)
        .filter(|review| review.user.as_ref().is_some_and(|u| u.login != author))
        .collect()
}

/// Upper bounds of weighted change size for each label but the last.
const SIZE_LIMITS: [f64; 4] = [50.0, 200.0, 400.0, 700.0];

pub fn pull_request_size(additions: u64, deletions: u64) -> &'static str {
    let size = additions as f64 + deletions as f64 * 0.5;
    let index = SIZE_LIMITS
        .iter()
        .position(|limit| size <= *limit)
        .unwrap_or(SIZE_LIMITS.len());
    SIZE_LABELS[index]
}

/// Timing samples in minutes, keyed by (user, period key) then metric.
#[derive(Default)]
struct Timings {
    samples: IndexMap<(String, String), IndexMap<&'static str, Vec<f64>>>,
}

impl Timings {
    fn push(&mut self, user: &str, key: &str, metric: &'static str, minutes: f64) {
        self.samples
            .entry((user.to_string(), key.to_string()))
            .or_default()
            .entry(metric)
            .or_default()
            .push(minutes);
    }

    fn record(
        &mut self,
        pull_request: &PullRequest,
        author: &str,
        keys: &[String],
        reviews: &[&Review],
    ) {
        let request = &pull_request.request;
        let Some(created) = parse(&Some(request.created_at.clone())) else {
            return;
        };
        let minutes_since_open = |at: &Option<String>| {
            parse(at).map(|at| (at - created).num_seconds().max(0) as f64 / 60.0)
        };

        let first_review = reviews
            .iter()
            .filter_map(|review| minutes_since_open(&review.submitted_at))
            .reduce(f64::min);
        let first_approval = reviews
            .iter()
            .filter(|review| review.state == ReviewState::Approved)
            .filter_map(|review| minutes_since_open(&review.submitted_at))
            .reduce(f64::min);
        let merge = minutes_since_open(&request.merged_at);

        let mut responses: IndexMap<&str, f64> = IndexMap::new();
        for review in reviews {
            let (Some(user), Some(minutes)) =
                (review.user.as_ref(), minutes_since_open(&review.submitted_at))
            else {
                continue;
            };
            let first = responses.entry(user.login.as_str()).or_insert(minutes);
            *first = first.min(minutes);
        }

        for key in keys {
            for user in [author, TOTAL_KEY] {
                let measured = [
                    (TIME_TO_REVIEW, first_review),
                    (TIME_TO_APPROVE, first_approval),
                    (TIME_TO_MERGE, merge),
                ];
                for (metric, minutes) in measured {
                    if let Some(minutes) = minutes {
                        self.push(user, key, metric, minutes);
                    }
                }
            }
            for (reviewer, minutes) in &responses {
                self.push(reviewer, key, TIME_FROM_OPEN_TO_RESPONSE, *minutes);
                self.push(TOTAL_KEY, key, TIME_FROM_OPEN_TO_RESPONSE, *minutes);
            }
        }
    }

    fn finalize(self, data: &mut CollectionMap) {
        for ((user, key), metrics) in self.samples {
            let collection = data.entry(&user, &key);
            for (metric, samples) in metrics {
                collection.median.insert(metric.to_string(), median(&samples));
                collection
                    .percentile
                    .insert(metric.to_string(), percentile(&samples, REPORT_PERCENTILE));
            }
        }
    }
}
