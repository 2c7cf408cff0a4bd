//! Queue access policy documents built by AddPermission / RemovePermission.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::Result;

/// Actions a permission statement can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionAction {
    /// Every action.
    All,
    /// SendMessage (and SendMessageBatch).
    SendMessage,
    /// ReceiveMessage.
    ReceiveMessage,
    /// DeleteMessage (and DeleteMessageBatch).
    DeleteMessage,
    /// ChangeMessageVisibility (and its batch form).
    ChangeMessageVisibility,
    /// GetQueueAttributes.
    GetQueueAttributes,
    /// GetQueueUrl.
    GetQueueUrl,
}

impl PermissionAction {
    /// Name as written in a policy statement (`SQS:` prefix added by the caller).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::SendMessage => "SendMessage",
            Self::ReceiveMessage => "ReceiveMessage",
            Self::DeleteMessage => "DeleteMessage",
            Self::ChangeMessageVisibility => "ChangeMessageVisibility",
            Self::GetQueueAttributes => "GetQueueAttributes",
            Self::GetQueueUrl => "GetQueueUrl",
        }
    }

    /// Map an operation name to the grant that covers it; batch operations map
    /// to their singular action.
    pub fn covering(operation: &str) -> Option<Self> {
        match operation {
            "SendMessage" | "SendMessageBatch" => Some(Self::SendMessage),
            "ReceiveMessage" => Some(Self::ReceiveMessage),
            "DeleteMessage" | "DeleteMessageBatch" => Some(Self::DeleteMessage),
            "ChangeMessageVisibility" | "ChangeMessageVisibilityBatch" => {
                Some(Self::ChangeMessageVisibility)
            }
            "GetQueueAttributes" => Some(Self::GetQueueAttributes),
            "GetQueueUrl" => Some(Self::GetQueueUrl),
            _ => None,
        }
    }
}

impl FromStr for PermissionAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.strip_prefix("SQS:").unwrap_or(s) {
            "*" => Ok(Self::All),
            "SendMessage" => Ok(Self::SendMessage),
            "ReceiveMessage" => Ok(Self::ReceiveMessage),
            "DeleteMessage" => Ok(Self::DeleteMessage),
            "ChangeMessageVisibility" => Ok(Self::ChangeMessageVisibility),
            "GetQueueAttributes" => Ok(Self::GetQueueAttributes),
            "GetQueueUrl" => Ok(Self::GetQueueUrl),
            other => Err(ValidationError::InvalidParameterValue {
                name: "Actions".to_string(),
                reason: format!("Unsupported action '{}'", other),
            }
            .into()),
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SQS:{}", self.as_str())
    }
}

/// A policy field written either as a single string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// `"SQS:SendMessage"`
    One(String),
    /// `["SQS:SendMessage", "SQS:ReceiveMessage"]`
    Many(Vec<String>),
}

impl OneOrMany {
    /// Every value, in document order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }
}

/// Principals of a statement: `"*"` or a map keyed by principal type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    /// Anonymous wildcard.
    Wildcard(String),
    /// `{"AWS": ...}` and friends.
    Typed(PrincipalMap),
}

/// Principal map. Kinds other than `AWS` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalMap {
    /// Account ids or ARNs.
    #[serde(rename = "AWS", default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<OneOrMany>,
    /// Service, Federated and other principal kinds.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Principal {
    fn accounts(ids: &[String]) -> Self {
        Self::Typed(PrincipalMap {
            aws: Some(OneOrMany::Many(ids.to_vec())),
            extra: Map::new(),
        })
    }

    /// Whether `account` is covered.
    pub fn matches(&self, account: &str) -> bool {
        match self {
            Self::Wildcard(value) => value == "*" || value == account,
            Self::Typed(map) => map
                .aws
                .iter()
                .flat_map(|values| values.values())
                .any(|p| p == "*" || p == account || p.split(':').nth(4) == Some(account)),
        }
    }
}

/// One grant. Keys this engine does not interpret (`Condition`,
/// `NotPrincipal`, ...) are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Label given to AddPermission.
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// `Allow` or `Deny`.
    #[serde(rename = "Effect")]
    pub effect: String,
    /// Who is granted.
    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    /// Granted actions, `SQS:` prefixed.
    #[serde(rename = "Action", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<OneOrMany>,
    /// Queue ARN.
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany>,
    /// Uninterpreted keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PolicyStatement {
    fn grants(&self, account: &str, needed: PermissionAction) -> bool {
        self.effect == "Allow"
            && self
                .principal
                .as_ref()
                .is_some_and(|principal| principal.matches(account))
            && self
                .action
                .iter()
                .flat_map(|values| values.values())
                .any(|a| {
                    matches!(
                        a.parse::<PermissionAction>(),
                        Ok(granted) if granted == PermissionAction::All || granted == needed
                    )
                })
    }
}

/// Access policy document stored in the `Policy` queue attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePolicy {
    /// Policy language version.
    #[serde(rename = "Version")]
    pub version: String,
    /// Policy id.
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Statements, one per label.
    #[serde(rename = "Statement", default)]
    pub statements: Vec<PolicyStatement>,
    /// Uninterpreted top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueuePolicy {
    /// Empty policy for a queue.
    pub fn new(queue_arn: &str) -> Self {
        Self {
            version: "2012-10-17".to_string(),
            id: Some(format!("{}/SQSDefaultPolicy", queue_arn)),
            statements: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parse a policy document as given to SetQueueAttributes.
    pub fn parse(document: &str) -> Result<Self> {
        serde_json::from_str(document).map_err(|e| {
            ValidationError::InvalidAttributeValue {
                name: "Policy".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Serialize to the JSON document form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Insert or replace the statement with `label`.
    pub fn upsert(
        &mut self,
        label: &str,
        queue_arn: &str,
        account_ids: &[String],
        actions: &[PermissionAction],
    ) {
        let statement = PolicyStatement {
            sid: Some(label.to_string()),
            effect: "Allow".to_string(),
            principal: Some(Principal::accounts(account_ids)),
            action: Some(OneOrMany::Many(
                actions.iter().map(ToString::to_string).collect(),
            )),
            resource: Some(OneOrMany::One(queue_arn.to_string())),
            extra: Map::new(),
        };
        match self
            .statements
            .iter_mut()
            .find(|s| s.sid.as_deref() == Some(label))
        {
            Some(existing) => *existing = statement,
            None => self.statements.push(statement),
        }
    }

    /// Remove the statement with `label`; returns whether one existed.
    pub fn remove(&mut self, label: &str) -> bool {
        let before = self.statements.len();
        self.statements.retain(|s| s.sid.as_deref() != Some(label));
        self.statements.len() != before
    }

    /// Whether any `Allow` statement grants `operation` to `account`.
    pub fn allows(&self, account: &str, operation: &str) -> bool {
        let Some(needed) = PermissionAction::covering(operation) else {
            return false;
        };
        self.statements.iter().any(|s| s.grants(account, needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:sqs:us-east-1:000000000000:orders";

    #[test]
    fn test_upsert_overwrites_label() {
        let mut policy = QueuePolicy::new(ARN);
        policy.upsert("grant", ARN, &["111".to_string()], &[PermissionAction::SendMessage]);
        policy.upsert("grant", ARN, &["222".to_string()], &[PermissionAction::ReceiveMessage]);

        assert_eq!(policy.statements.len(), 1);
        assert!(policy.allows("222", "ReceiveMessage"));
        assert!(!policy.allows("111", "SendMessage"));
        let actions: Vec<&str> = policy.statements[0]
            .action
            .iter()
            .flat_map(|values| values.values())
            .collect();
        assert_eq!(actions, vec!["SQS:ReceiveMessage"]);
    }

    #[test]
    fn test_batch_actions_implied() {
        let mut policy = QueuePolicy::new(ARN);
        policy.upsert("send", ARN, &["111".to_string()], &[PermissionAction::SendMessage]);

        assert!(policy.allows("111", "SendMessage"));
        assert!(policy.allows("111", "SendMessageBatch"));
        assert!(!policy.allows("111", "DeleteMessage"));
        assert!(!policy.allows("222", "SendMessage"));
    }

    #[test]
    fn test_wildcard_action() {
        let mut policy = QueuePolicy::new(ARN);
        policy.upsert("all", ARN, &["111".to_string()], &[PermissionAction::All]);
        assert!(policy.allows("111", "ChangeMessageVisibilityBatch"));
        assert!(policy.allows("111", "GetQueueUrl"));
        assert!(!policy.allows("111", "DeleteQueue"));
    }

    #[test]
    fn test_json_roundtrip_shape() {
        let mut policy = QueuePolicy::new(ARN);
        policy.upsert("grant", ARN, &["111".to_string()], &[PermissionAction::DeleteMessage]);
        let json = policy.to_json();
        assert!(json.contains("\"Sid\":\"grant\""));
        assert!(json.contains("\"AWS\":[\"111\"]"));

        let parsed = QueuePolicy::parse(&json).unwrap();
        assert_eq!(parsed, policy);
        assert!(QueuePolicy::parse("{not json").is_err());
    }

    #[test]
    fn test_remove() {
        let mut policy = QueuePolicy::new(ARN);
        policy.upsert("grant", ARN, &["111".to_string()], &[PermissionAction::GetQueueUrl]);
        assert!(policy.remove("grant"));
        assert!(!policy.remove("grant"));
        assert!(policy.statements.is_empty());
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!("PurgeQueue".parse::<PermissionAction>().is_err());
        assert_eq!(
            "SQS:SendMessage".parse::<PermissionAction>().unwrap(),
            PermissionAction::SendMessage
        );
    }

    #[test]
    fn test_wildcard_principal_and_string_action() {
        let document = format!(
            r#"{{"Version":"2012-10-17","Statement":[{{"Effect":"Allow","Principal":"*","Action":"SQS:SendMessage","Resource":"{}"}}]}}"#,
            ARN
        );
        let policy = QueuePolicy::parse(&document).unwrap();

        assert!(policy.allows("999988887777", "SendMessageBatch"));
        assert!(!policy.allows("999988887777", "ReceiveMessage"));
        assert_eq!(
            serde_json::from_str::<Value>(&policy.to_json()).unwrap(),
            serde_json::from_str::<Value>(&document).unwrap()
        );
    }

    #[test]
    fn test_uninterpreted_keys_preserved() {
        let document = format!(
            r#"{{"Version":"2012-10-17","Id":"custom","Statement":[{{"Sid":"topic","Effect":"Allow","Principal":{{"AWS":"111","Service":"sns.amazonaws.com"}},"Action":["SQS:SendMessage"],"Resource":"{arn}","Condition":{{"ArnEquals":{{"aws:SourceArn":"arn:aws:sns:us-east-1:111:t"}}}}}},{{"Effect":"Deny","NotPrincipal":{{"AWS":"111"}},"NotAction":"SQS:DeleteMessage","Resource":"{arn}"}}]}}"#,
            arn = ARN
        );
        let policy = QueuePolicy::parse(&document).unwrap();

        assert!(policy.statements[0].extra.contains_key("Condition"));
        assert!(policy.statements[1].extra.contains_key("NotPrincipal"));
        assert!(policy.allows("111", "SendMessage"));
        assert_eq!(
            serde_json::from_str::<Value>(&policy.to_json()).unwrap(),
            serde_json::from_str::<Value>(&document).unwrap()
        );
    }
}
