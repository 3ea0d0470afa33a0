use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub const DATE_FIELD: &str = "date";
pub const IS_ACTIVE_FIELD: &str = "isActive";
pub const EMAIL_FIELD: &str = "email";
/// Field carrying the login a raw row was attributed to.
pub const DISPLAY_LOGIN_FIELD: &str = "githubUser";

pub const TOTAL_LINES_ADDED: &str = "totalLinesAdded";
pub const TOTAL_LINES_DELETED: &str = "totalLinesDeleted";
pub const ACCEPTED_LINES_ADDED: &str = "acceptedLinesAdded";
pub const ACCEPTED_LINES_DELETED: &str = "acceptedLinesDeleted";

/// Counters surfaced as fixed report columns.
pub const HEADLINE_COUNTERS: [&str; 4] = [
    TOTAL_LINES_ADDED,
    TOTAL_LINES_DELETED,
    ACCEPTED_LINES_ADDED,
    ACCEPTED_LINES_DELETED,
];

/// Counters the usage API is known to report. Unknown numeric fields are
/// still collected, after these.
pub const KNOWN_COUNTERS: [&str; 17] = [
    TOTAL_LINES_ADDED,
    TOTAL_LINES_DELETED,
    ACCEPTED_LINES_ADDED,
    ACCEPTED_LINES_DELETED,
    "totalApplies",
    "totalAccepts",
    "totalRejects",
    "totalTabsShown",
    "totalTabsAccepted",
    "composerRequests",
    "chatRequests",
    "agentRequests",
    "cmdkUsages",
    "subscriptionIncludedReqs",
    "apiKeyReqs",
    "usageBasedReqs",
    "bugbotUsages",
];

pub const KNOWN_DESCRIPTORS: [&str; 4] = [
    "mostUsedModel",
    "applyMostUsedExtension",
    "tabMostUsedExtension",
    "clientVersion",
];

/// One usage row as returned by the telemetry API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    pub date: i64,
    pub is_active: bool,
    pub email: Option<String>,
    pub counters: IndexMap<String, i64>,
    pub descriptors: IndexMap<String, String>,
}

impl TelemetryRecord {
    /// Classifies raw fields: numbers are counters, strings are descriptors.
    pub fn from_fields(fields: IndexMap<String, Value>) -> Self {
        let mut record = Self::default();
        for (key, value) in fields {
            if key == DATE_FIELD {
                record.date = as_integer(&value).unwrap_or_default();
            } else if key == IS_ACTIVE_FIELD {
                record.is_active = value.as_bool().unwrap_or(false);
            } else if key == EMAIL_FIELD {
                record.email = value
                    .as_str()
                    .filter(|email| !email.trim().is_empty())
                    .map(String::from);
            } else {
                match value {
                    Value::Number(_) => {
                        record.counters.insert(key, as_integer(&value).unwrap_or_default());
                    }
                    Value::String(text) => {
                        record.descriptors.insert(key, text);
                    }
                    Value::Bool(flag) => {
                        record.descriptors.insert(key, flag.to_string());
                    }
                    _ => {}
                }
            }
        }
        record
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or_default()
    }

    pub fn descriptor(&self, name: &str) -> Option<&str> {
        self.descriptors.get(name).map(String::as_str)
    }

    pub fn to_fields(&self) -> IndexMap<String, Value> {
        let mut fields = IndexMap::new();
        fields.insert(DATE_FIELD.to_string(), Value::from(self.date));
        fields.insert(IS_ACTIVE_FIELD.to_string(), Value::from(self.is_active));
        for (key, value) in &self.counters {
            fields.insert(key.clone(), Value::from(*value));
        }
        for (key, value) in &self.descriptors {
            fields.insert(key.clone(), Value::from(value.as_str()));
        }
        if let Some(email) = &self.email {
            fields.insert(EMAIL_FIELD.to_string(), Value::from(email.as_str()));
        }
        fields
    }
}

impl<'de> Deserialize<'de> for TelemetryRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IndexMap::<String, Value>::deserialize(deserializer).map(Self::from_fields)
    }
}

/// A raw row tagged with the login it is shown under.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotatedRecord {
    pub display_login: String,
    pub record: TelemetryRecord,
}

impl AnnotatedRecord {
    /// Login this row belongs to: the annotation, else the email local part.
    pub fn owner(&self) -> Option<String> {
        if !self.display_login.is_empty() {
            return Some(self.display_login.clone());
        }
        self.record
            .email
            .as_deref()
            .map(crate::identity::local_part)
            .filter(|local| !local.is_empty())
    }

    /// Every field except the display login, rendered as text.
    pub fn text_fields(&self) -> Vec<(String, String)> {
        self.record
            .to_fields()
            .into_iter()
            .map(|(key, value)| (key, value_text(&value)))
            .collect()
    }
}

impl Serialize for AnnotatedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut fields = IndexMap::new();
        fields.insert(
            DISPLAY_LOGIN_FIELD.to_string(),
            Value::from(self.display_login.as_str()),
        );
        fields.extend(self.record.to_fields());
        fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnnotatedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = IndexMap::<String, Value>::deserialize(deserializer)?;
        let display_login = fields
            .shift_remove(DISPLAY_LOGIN_FIELD)
            .and_then(|value| value.as_str().map(String::from))
            .unwrap_or_default();
        Ok(Self {
            display_login,
            record: TelemetryRecord::from_fields(fields),
        })
    }
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn classifies_fields_by_type() {
        let record: TelemetryRecord = serde_json::from_value(json!({
            "date": 1714521600000_i64,
            "isActive": true,
            "totalLinesAdded": 12,
            "brandNewCounter": 3,
            "mostUsedModel": "claude",
            "email": "Alice@corp.com"
        }))
        .unwrap();
        assert_eq!(record.date, 1714521600000);
        assert!(record.is_active);
        assert_eq!(record.counter(TOTAL_LINES_ADDED), 12);
        assert_eq!(record.counter("brandNewCounter"), 3);
        assert_eq!(record.counter("chatRequests"), 0);
        assert_eq!(record.descriptor("mostUsedModel"), Some("claude"));
        assert_eq!(record.email.as_deref(), Some("Alice@corp.com"));
    }

    #[test]
    fn blank_email_is_absent() {
        let record: TelemetryRecord =
            serde_json::from_value(json!({ "email": "  ", "totalLinesAdded": 1 })).unwrap();
        assert_eq!(record.email, None);
    }

    #[test]
    fn annotated_record_json_keeps_display_login() {
        let annotated: AnnotatedRecord = serde_json::from_value(json!({
            "githubUser": "alice",
            "date": 5,
            "chatRequests": 2,
            "email": "alice@corp.com"
        }))
        .unwrap();
        assert_eq!(annotated.display_login, "alice");
        let value = serde_json::to_value(&annotated).unwrap();
        assert_eq!(value["githubUser"], json!("alice"));
        assert_eq!(value["chatRequests"], json!(2));
    }

    #[test]
    fn owner_falls_back_to_local_part() {
        let annotated = AnnotatedRecord {
            display_login: String::new(),
            record: TelemetryRecord {
                email: Some("Bob.Smith@corp.com".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(annotated.owner().as_deref(), Some("bob.smith"));
        assert_eq!(AnnotatedRecord::default().owner(), None);
    }
}
