use crate::github::PullRequest;
use crate::model::Repository;
use indexmap::IndexMap;

pub type RepoPullRequests = IndexMap<Repository, Vec<PullRequest>>;

#[derive(Debug, Clone, Default)]
pub struct DataAnalysis {
    pub pull_requests: RepoPullRequests,
}

impl DataAnalysis {
    pub fn new() -> Self {
        Self {
            pull_requests: IndexMap::new(),
        }
    }

    pub fn insert_pull_request(
        &mut self,
        repository: &Repository,
        pull_requests: Vec<PullRequest>,
    ) {
        self.pull_requests.insert(repository.clone(), pull_requests);
    }

    pub fn pull_request_count(&self) -> usize {
        self.pull_requests.values().map(Vec::len).sum()
    }
}
