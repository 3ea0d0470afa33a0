pub mod client;
pub mod commit;
pub mod pull_request;

pub use client::GitHubClient;
pub use pull_request::{PageProgress, PullRequest, PullRequester};
