mod resolver;

pub use resolver::{CommitLookup, IdentityResolver, ResolvedIdentities};

/// How an email is turned into the key telemetry is grouped by.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, clap::ValueEnum)]
pub enum IdentityKeyMode {
    /// Lower-cased part before `@`, so one person's addresses on several
    /// domains group together.
    #[default]
    LocalPart,
    /// The whole lower-cased address.
    Email,
}

impl IdentityKeyMode {
    pub fn key(&self, email: &str) -> String {
        match self {
            Self::LocalPart => local_part(email),
            Self::Email => normalize_email(email),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn local_part(email: &str) -> String {
    let email = normalize_email(email);
    match email.split_once('@') {
        Some((local, _)) => local.to_string(),
        None => email,
    }
}
