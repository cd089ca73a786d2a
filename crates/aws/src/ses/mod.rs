//! Amazon SES (classic API): templates, templated sending, identities,
//! receipt filters and rules, sending quota, and sender authorization.

mod facade;
mod sdk;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AwsError;

pub use facade::SesFacade;
pub use sdk::SdkSesClient;

/// Template data sent when the caller supplies none.
pub const EMPTY_TEMPLATE_DATA: &str = "{}";

/// An email template with its subject and bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A templated email as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatedEmail {
    pub template: String,
    pub sender: String,
    pub recipients: Vec<String>,
    /// Reply-to addresses; the sender when absent.
    pub reply_to: Option<Vec<String>>,
    /// JSON object with the template's replacement values; `{}` when absent.
    pub template_data: Option<String>,
}

impl TemplatedEmail {
    /// Apply the reply-to and template-data defaults.
    pub fn into_request(self) -> TemplatedEmailRequest {
        let reply_to = match self.reply_to {
            Some(addresses) if !addresses.is_empty() => addresses,
            _ => vec![self.sender.clone()],
        };
        TemplatedEmailRequest {
            template: self.template,
            sender: self.sender,
            recipients: self.recipients,
            reply_to,
            template_data: self
                .template_data
                .unwrap_or_else(|| EMPTY_TEMPLATE_DATA.to_owned()),
        }
    }
}

/// A templated email with every default applied, as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplatedEmailRequest {
    pub template: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub reply_to: Vec<String>,
    pub template_data: String,
}

/// Which identities [`SesApi::list_identities`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    EmailAddress,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    Allow,
    Block,
}

/// An IP address filter applied to inbound mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptFilter {
    pub name: String,
    pub policy: FilterPolicy,
    /// Single address or range in CIDR notation, e.g. `10.0.0.0/24`.
    pub cidr: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    #[default]
    Optional,
    Require,
}

/// What a receipt rule does with a matching message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceiptAction {
    S3 {
        bucket: String,
        prefix: Option<String>,
        topic_arn: Option<String>,
    },
    Sns {
        topic_arn: String,
    },
    Lambda {
        function_arn: String,
        topic_arn: Option<String>,
    },
    Bounce {
        smtp_reply_code: String,
        message: String,
        sender: String,
        status_code: Option<String>,
        topic_arn: Option<String>,
    },
    AddHeader {
        name: String,
        value: String,
    },
    Stop {
        topic_arn: Option<String>,
    },
}

/// An inbound receipt rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRule {
    pub name: String,
    pub enabled: bool,
    pub scan_enabled: bool,
    #[serde(default)]
    pub tls_policy: TlsPolicy,
    /// Addresses or domains the rule applies to; all recipients when empty.
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ReceiptAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRuleSetMetadata {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A rule set with its rules in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRuleSet {
    pub metadata: ReceiptRuleSetMetadata,
    pub rules: Vec<ReceiptRule>,
}

/// Sending limits for the account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SendQuota {
    pub max_24_hour_send: f64,
    pub sent_last_24_hours: f64,
    pub max_send_rate: f64,
    /// `max_24_hour_send - sent_last_24_hours`.
    pub available: f64,
}

impl SendQuota {
    pub fn new(max_24_hour_send: f64, sent_last_24_hours: f64, max_send_rate: f64) -> Self {
        Self {
            max_24_hour_send,
            sent_last_24_hours,
            max_send_rate,
            available: max_24_hour_send - sent_last_24_hours,
        }
    }
}

/// One 15-minute bucket of sending activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendDataPoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub delivery_attempts: i64,
    pub bounces: i64,
    pub complaints: i64,
    pub rejects: i64,
}

/// Calls the SES facade makes against the provider.
#[async_trait]
pub trait SesApi: fmt::Debug + Send + Sync {
    async fn create_template(&self, template: &EmailTemplate) -> Result<(), AwsError>;

    async fn get_template(&self, name: &str) -> Result<EmailTemplate, AwsError>;

    async fn update_template(&self, template: &EmailTemplate) -> Result<(), AwsError>;

    async fn delete_template(&self, name: &str) -> Result<(), AwsError>;

    async fn list_templates(&self) -> Result<Vec<TemplateMetadata>, AwsError>;

    /// Returns the provider's message id.
    async fn send_templated_email(&self, email: &TemplatedEmailRequest) -> Result<String, AwsError>;

    async fn verify_email_identity(&self, email: &str) -> Result<(), AwsError>;

    /// Returns the TXT record value that proves domain ownership.
    async fn verify_domain_identity(&self, domain: &str) -> Result<String, AwsError>;

    async fn delete_identity(&self, identity: &str) -> Result<(), AwsError>;

    async fn list_identities(&self, kind: IdentityKind) -> Result<Vec<String>, AwsError>;

    async fn create_receipt_filter(&self, filter: &ReceiptFilter) -> Result<(), AwsError>;

    async fn list_receipt_filters(&self) -> Result<Vec<ReceiptFilter>, AwsError>;

    async fn delete_receipt_filter(&self, name: &str) -> Result<(), AwsError>;

    async fn create_receipt_rule_set(&self, name: &str) -> Result<(), AwsError>;

    async fn create_receipt_rule(
        &self,
        rule_set: &str,
        rule: &ReceiptRule,
        after: Option<&str>,
    ) -> Result<(), AwsError>;

    async fn describe_receipt_rule_set(&self, name: &str) -> Result<ReceiptRuleSet, AwsError>;

    async fn describe_receipt_rule(&self, rule_set: &str, rule: &str) -> Result<ReceiptRule, AwsError>;

    async fn list_receipt_rule_sets(&self) -> Result<Vec<ReceiptRuleSetMetadata>, AwsError>;

    async fn update_receipt_rule(&self, rule_set: &str, rule: &ReceiptRule) -> Result<(), AwsError>;

    async fn delete_receipt_rule_set(&self, name: &str) -> Result<(), AwsError>;

    async fn delete_receipt_rule(&self, rule_set: &str, rule: &str) -> Result<(), AwsError>;

    async fn get_send_quota(&self) -> Result<SendQuota, AwsError>;

    async fn get_send_statistics(&self) -> Result<Vec<SendDataPoint>, AwsError>;

    async fn put_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
        policy: &str,
    ) -> Result<(), AwsError>;

    async fn get_identity_policies(
        &self,
        identity: &str,
        policy_names: &[String],
    ) -> Result<BTreeMap<String, String>, AwsError>;

    async fn list_identity_policies(&self, identity: &str) -> Result<Vec<String>, AwsError>;

    async fn delete_identity_policy(&self, identity: &str, policy_name: &str) -> Result<(), AwsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(reply_to: Option<Vec<String>>, data: Option<&str>) -> TemplatedEmail {
        TemplatedEmail {
            template: "welcome".into(),
            sender: "a@x.com".into(),
            recipients: vec!["b@y.com".into()],
            reply_to,
            template_data: data.map(str::to_owned),
        }
    }

    #[test]
    fn reply_to_defaults_to_sender() {
        let request = email(None, None).into_request();
        assert_eq!(request.reply_to, ["a@x.com"]);
        assert_eq!(request.template_data, "{}");
    }

    #[test]
    fn empty_reply_to_also_defaults() {
        let request = email(Some(Vec::new()), None).into_request();
        assert_eq!(request.reply_to, ["a@x.com"]);
    }

    #[test]
    fn explicit_reply_to_is_kept() {
        let request =
            email(Some(vec!["support@x.com".into()]), Some(r#"{"name":"Ada"}"#)).into_request();
        assert_eq!(request.reply_to, ["support@x.com"]);
        assert_eq!(request.template_data, r#"{"name":"Ada"}"#);
    }

    #[test]
    fn quota_available_is_max_minus_sent() {
        let quota = SendQuota::new(200.0, 50.0, 1.0);
        assert!((quota.available - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn receipt_action_is_tagged() {
        let action: ReceiptAction = serde_json::from_value(serde_json::json!({
            "type": "sns",
            "topic_arn": "arn:aws:sns:eu-west-1:123456789012:inbound"
        }))
        .unwrap();
        assert!(matches!(action, ReceiptAction::Sns { .. }));
    }
}
