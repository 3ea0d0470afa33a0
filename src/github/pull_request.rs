use crate::github::GitHubClient;
use crate::model::{ReportPeriod, Repository, Result, ReviewState};
use chrono::{DateTime, FixedOffset};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Deserialize;

const PAGE_SIZE: usize = 100;
const DETAIL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRepo {
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub name: String,
    pub repo: Option<BranchRepo>,
}

#[derive(Debug, Clone, Deserialize)]
struct PullRequestSummary {
    number: u64,
    updated_at: Option<String>,
    closed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetail {
    pub number: u64,
    pub user: Option<Account>,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub review_comments: u64,
    pub head: Branch,
    pub base: Branch,
}

impl PullRequestDetail {
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.login.as_str())
    }

    pub fn is_merged_to_default(&self) -> bool {
        let default_branch = self
            .base
            .repo
            .as_ref()
            .and_then(|repo| repo.default_branch.as_deref())
            .unwrap_or("main");
        self.merged && self.base.name == default_branch
    }

    pub fn is_revert(&self) -> bool {
        self.head.name.starts_with("revert-")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub user: Option<Account>,
    pub state: ReviewState,
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reactions {
    #[serde(rename = "+1", default)]
    pub plus_one: u64,
    #[serde(rename = "-1", default)]
    pub minus_one: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    pub user: Option<Account>,
    pub in_reply_to_id: Option<u64>,
    #[serde(default)]
    pub reactions: Reactions,
}

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub request: PullRequestDetail,
    pub reviews: Vec<Review>,
    pub comments: Vec<ReviewComment>,
}

pub type PageProgress<'a> = Box<dyn FnMut(usize) + Send + 'a>;

pub trait PullRequester {
    async fn fetch_pull_requests<'a>(
        &self,
        client: &GitHubClient,
        period: &ReportPeriod,
        cb: PageProgress<'a>,
    ) -> Result<Vec<PullRequest>>;
}

impl PullRequester for Repository {
    /// Walks closed pull requests newest-update first and keeps the ones
    /// closed inside `period`. Paging stops once a page holds nothing
    /// updated since the period started.
    async fn fetch_pull_requests<'a>(
        &self,
        client: &GitHubClient,
        period: &ReportPeriod,
        mut cb: PageProgress<'a>,
    ) -> Result<Vec<PullRequest>> {
        let mut page = 1;
        let mut pull_requests: Vec<PullRequest> = vec![];
        let path = format!("/repos/{}/{}/pulls", self.owner, self.name);

        loop {
            cb(page);
            let summaries: Vec<PullRequestSummary> = client
                .get(
                    &path,
                    &[
                        ("state", "closed".to_string()),
                        ("sort", "updated".to_string()),
                        ("direction", "desc".to_string()),
                        ("per_page", PAGE_SIZE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            if summaries.is_empty() {
                break;
            }
            let updated_since_start = summaries
                .iter()
                .any(|pr| parse(&pr.updated_at).is_some_and(|at| at >= period.since));
            let numbers: Vec<u64> = summaries
                .iter()
                .filter(|pr| parse(&pr.closed_at).is_some_and(|at| period.contains(&at)))
                .map(|pr| pr.number)
                .collect();

            let fetched: Vec<PullRequest> = stream::iter(numbers)
                .map(|number| self.fetch_pull_request(client, number))
                .buffered(DETAIL_CONCURRENCY)
                .try_collect()
                .await?;
            pull_requests.extend(fetched);

            if !updated_since_start {
                break;
            }
            page += 1;
        }
        Ok(pull_requests)
    }
}

impl Repository {
    async fn fetch_pull_request(&self, client: &GitHubClient, number: u64) -> Result<PullRequest> {
        let base = format!("/repos/{}/{}/pulls/{number}", self.owner, self.name);
        let reviews_path = format!("{base}/reviews");
        let comments_path = format!("{base}/comments");
        let per_page = [("per_page", PAGE_SIZE.to_string())];
        let (request, reviews, comments) = futures::try_join!(
            client.get::<PullRequestDetail>(&base, &[]),
            client.get::<Vec<Review>>(&reviews_path, &per_page),
            client.get::<Vec<ReviewComment>>(&comments_path, &per_page),
        )?;
        Ok(PullRequest {
            request,
            reviews,
            comments,
        })
    }
}

pub fn parse(datetime: &Option<String>) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(datetime.as_deref()?).ok()
}
