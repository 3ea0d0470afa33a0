use crate::identity::local_part;
use crate::model::{Repository, Result};
use futures::{stream, StreamExt};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Source of commit authorship: the author email of the most recent commit
/// `author` made in `repo`, if any.
pub trait CommitLookup {
    async fn latest_commit_email(&self, repo: &Repository, author: &str)
        -> Result<Option<String>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedIdentities {
    /// login → discovered email
    pub login_emails: IndexMap<String, String>,
    /// email local part → logins sharing it, in resolution order
    pub local_to_logins: IndexMap<String, Vec<String>>,
}

impl ResolvedIdentities {
    pub fn insert(&mut self, login: &str, email: &str) {
        self.login_emails.insert(login.to_string(), email.to_string());
        self.local_to_logins
            .entry(local_part(email))
            .or_default()
            .push(login.to_string());
    }

    pub fn email(&self, login: &str) -> Option<&str> {
        self.login_emails.get(login).map(String::as_str)
    }

    /// Login a telemetry row is shown under: the first login sharing the
    /// email's local part, else the local part itself.
    pub fn display_login(&self, email: Option<&str>) -> String {
        let local = email.map(local_part).unwrap_or_default();
        self.local_to_logins
            .get(&local)
            .and_then(|logins| logins.first())
            .cloned()
            .unwrap_or(local)
    }
}

pub struct IdentityResolver<'a, L> {
    lookup: &'a L,
    repos: &'a [Repository],
    concurrency: usize,
}

impl<'a, L: CommitLookup> IdentityResolver<'a, L> {
    pub fn new(lookup: &'a L, repos: &'a [Repository]) -> Self {
        Self {
            lookup,
            repos,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Maps every login it can to an email. Logins whose lookups all fail or
    /// come back empty stay unmapped.
    pub async fn resolve(&self, logins: &[String], progress: impl Fn(&str)) -> ResolvedIdentities {
        let progress = &progress;
        let emails: Vec<(&String, Option<String>)> = stream::iter(logins)
            .map(|login| async move {
                let email = self.resolve_login(login).await;
                progress(login);
                (login, email)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut resolved = ResolvedIdentities::default();
        for (login, email) in emails {
            match email {
                Some(email) => resolved.insert(login, &email),
                None => debug!("No commit email found for `{login}`"),
            }
        }
        resolved
    }

    /// Tries the repositories in order and stops at the first commit that
    /// carries an author email.
    pub async fn resolve_login(&self, login: &str) -> Option<String> {
        for repo in self.repos {
            match self.lookup.latest_commit_email(repo, login).await {
                Ok(Some(email)) if !email.trim().is_empty() => return Some(email),
                Ok(_) => debug!("No authored commit by `{login}` in {}", repo.full_name()),
                Err(err) => warn!("Commit lookup for `{login}` in {} failed: {err}", repo.full_name()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Error;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Answer {
        Email(&'static str),
        Nothing,
        Fails,
    }

    #[derive(Default)]
    struct FakeCommits {
        answers: HashMap<(String, String), Answer>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeCommits {
        fn answer(mut self, repo: &str, login: &str, answer: Answer) -> Self {
            self.answers.insert((repo.to_string(), login.to_string()), answer);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommitLookup for FakeCommits {
        async fn latest_commit_email(
            &self,
            repo: &Repository,
            author: &str,
        ) -> Result<Option<String>> {
            self.calls.lock().unwrap().push(format!("{}:{author}", repo.name));
            match self.answers.get(&(repo.name.clone(), author.to_string())) {
                Some(Answer::Email(email)) => Ok(Some(email.to_string())),
                Some(Answer::Fails) => Err(Error::Status {
                    url: repo.full_name(),
                    status: 502,
                }),
                Some(Answer::Nothing) | None => Ok(None),
            }
        }
    }

    fn repos() -> Vec<Repository> {
        vec![Repository::new("web", "acme"), Repository::new("api", "acme")]
    }

    fn logins(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn first_repository_with_email_wins() {
        let fake = FakeCommits::default()
            .answer("web", "u", Answer::Nothing)
            .answer("api", "u", Answer::Email("u@corp.com"));
        let repos = repos();
        let resolver = IdentityResolver::new(&fake, &repos);

        assert_eq!(resolver.resolve_login("u").await.as_deref(), Some("u@corp.com"));
        assert_eq!(fake.calls(), vec!["web:u", "api:u"]);
    }

    #[tokio::test]
    async fn lookup_stops_after_first_hit() {
        let fake = FakeCommits::default()
            .answer("web", "u", Answer::Email("u@corp.com"))
            .answer("api", "u", Answer::Email("other@corp.com"));
        let repos = repos();
        let resolver = IdentityResolver::new(&fake, &repos);

        assert_eq!(resolver.resolve_login("u").await.as_deref(), Some("u@corp.com"));
        assert_eq!(fake.calls(), vec!["web:u"]);
    }

    #[tokio::test]
    async fn failures_fall_through_to_next_repository() {
        let fake = FakeCommits::default()
            .answer("web", "alice", Answer::Fails)
            .answer("api", "alice", Answer::Email("alice@corp.com"))
            .answer("web", "bob", Answer::Fails)
            .answer("api", "bob", Answer::Fails);
        let repos = repos();
        let resolved = IdentityResolver::new(&fake, &repos)
            .resolve(&logins(&["alice", "bob"]), |_| {})
            .await;

        assert_eq!(resolved.email("alice"), Some("alice@corp.com"));
        assert_eq!(resolved.email("bob"), None);
    }

    #[tokio::test]
    async fn inverse_index_keeps_login_order() {
        let fake = FakeCommits::default()
            .answer("web", "jsmith-a", Answer::Email("JSmith@a.com"))
            .answer("web", "jsmith-b", Answer::Email("jsmith@b.com"));
        let repos = repos();
        let resolved = IdentityResolver::new(&fake, &repos)
            .with_concurrency(4)
            .resolve(&logins(&["jsmith-a", "jsmith-b"]), |_| {})
            .await;

        assert_eq!(resolved.local_to_logins["jsmith"], vec!["jsmith-a", "jsmith-b"]);
        assert_eq!(resolved.display_login(Some("jsmith@c.com")), "jsmith-a");
        assert_eq!(resolved.display_login(Some("Carol@c.com")), "carol");
        assert_eq!(resolved.display_login(None), "");
    }
}
