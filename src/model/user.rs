use crate::model::{Error, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use serde_json::{from_str, Value};
use std::fs;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum IdentityKind {
    User,
    Bot,
}

impl IdentityKind {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "user" => Some(Self::User),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct User {
    pub login: String,
    pub kind: IdentityKind,
    pub teams: Vec<String>,
}

// Create
impl User {
    pub fn from_config(path: &str) -> Result<Vec<Self>> {
        let json_str = fs::read_to_string(path)?;
        Self::parse(&json_str)
    }

    pub fn new(login: impl ToString, kind: IdentityKind, teams: Vec<impl ToString>) -> Self {
        Self {
            login: login.to_string(),
            kind,
            teams: teams.iter().map(|t| t.to_string()).collect(),
        }
    }
}

// Parser
impl User {
    fn parse(json_str: &str) -> Result<Vec<Self>> {
        let elements: IndexMap<String, Value> = from_str(json_str)?;
        let mut result = Vec::new();
        for (login, details) in elements {
            let kind = match details["type"].as_str() {
                Some(kind) => IdentityKind::parse(kind).ok_or_else(|| {
                    Error::Config(format!("Unknown identity type `{kind}` for `{login}`"))
                })?,
                None => return Err(Error::missing_field(&login, "type")),
            };
            let teams: Vec<String> = match details["teams"].as_array() {
                Some(teams) => teams
                    .iter()
                    .filter_map(|team| team.as_str().map(String::from))
                    .collect(),
                None => Vec::new(),
            };
            result.push(Self::new(login, kind, teams));
        }
        Ok(result)
    }
}

/// Explicit identity-type overrides plus the known team names, both of which
/// keep an entry out of the per-user report rows.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    kinds: IndexMap<String, IdentityKind>,
    teams: Vec<String>,
}

impl Roster {
    pub fn new(users: &[User]) -> Self {
        Self {
            kinds: users.iter().map(|u| (u.login.clone(), u.kind)).collect(),
            teams: users
                .iter()
                .flat_map(|u| u.teams.iter().cloned())
                .unique()
                .collect(),
        }
    }

    pub fn is_team(&self, name: &str) -> bool {
        self.teams.iter().any(|team| team == name)
    }

    pub fn is_bot(&self, login: &str) -> bool {
        match self.kinds.get(login) {
            Some(kind) => *kind == IdentityKind::Bot,
            None => looks_like_bot(login),
        }
    }
}

/// Naming heuristic for automation accounts: `dependabot[bot]`, `ci-bot`,
/// `deploy_bot`, `renovatebot`.
pub fn looks_like_bot(login: &str) -> bool {
    let login = login.trim().to_lowercase();
    login.ends_with("[bot]") || login.ends_with("bot")
}
