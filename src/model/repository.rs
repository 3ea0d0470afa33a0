use crate::model::{Error, Result};
use indexmap::IndexMap;
use serde_json::{from_str, Value};
use std::fs;

/// A source repository on the code host, in the order it was configured.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct Repository {
    pub name: String,
    pub owner: String,
}

// Create
impl Repository {
    pub fn from_config(path: &str) -> Result<Vec<Self>> {
        let json_str = fs::read_to_string(path)?;
        Self::parse(&json_str)
    }

    pub fn new(name: impl ToString, owner: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

// Parser
impl Repository {
    fn parse(json_str: &str) -> Result<Vec<Self>> {
        let elements: IndexMap<String, Value> = from_str(json_str)?;
        let mut result = Vec::new();
        for (name, details) in elements {
            let Some(owner) = details["owner"].as_str() else {
                return Err(Error::missing_field(&name, "owner"));
            };
            result.push(Self::new(name, owner));
        }
        Ok(result)
    }
}
