use crate::github::GitHubClient;
use crate::identity::CommitLookup;
use crate::model::{Repository, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CommitItem {
    pub commit: CommitBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitBody {
    pub author: Option<Signature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signature {
    pub email: Option<String>,
}

impl CommitLookup for GitHubClient {
    async fn latest_commit_email(
        &self,
        repo: &Repository,
        author: &str,
    ) -> Result<Option<String>> {
        let commits: Vec<CommitItem> = self
            .get(
                &format!("/repos/{}/{}/commits", repo.owner, repo.name),
                &[("author", author.to_string()), ("per_page", "1".to_string())],
            )
            .await?;
        Ok(first_author_email(commits))
    }
}

fn first_author_email(commits: Vec<CommitItem>) -> Option<String> {
    commits
        .into_iter()
        .next()?
        .commit
        .author?
        .email
        .filter(|email| !email.is_empty())
}
