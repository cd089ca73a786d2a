//! Amazon SNS: topics, topic attributes, subscriptions, and publishing.

mod facade;
mod sdk;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AwsError;

pub use facade::SnsFacade;
pub use sdk::SdkSnsClient;

/// Subscription ARN reported by SNS until the endpoint confirms.
pub const PENDING_CONFIRMATION: &str = "pending confirmation";

/// E.164-style phone number, with or without the leading `+`.
static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("phone number regex is valid"));

/// Delivery protocol of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    Email,
    EmailJson,
    Http,
    Https,
    Sms,
    Sqs,
    Lambda,
    Application,
    Firehose,
}

impl Protocol {
    /// The protocol name SNS expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::EmailJson => "email-json",
            Self::Http => "http",
            Self::Https => "https",
            Self::Sms => "sms",
            Self::Sqs => "sqs",
            Self::Lambda => "lambda",
            Self::Application => "application",
            Self::Firehose => "firehose",
        }
    }

    /// Parse a protocol name as reported by SNS.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "email" => Self::Email,
            "email-json" => Self::EmailJson,
            "http" => Self::Http,
            "https" => Self::Https,
            "sms" => Self::Sms,
            "sqs" => Self::Sqs,
            "lambda" => Self::Lambda,
            "application" => Self::Application,
            "firehose" => Self::Firehose,
            _ => return None,
        })
    }

    /// Reject endpoints that cannot belong to this protocol.
    pub fn check_endpoint(self, endpoint: &str) -> Result<(), AwsError> {
        let ok = match self {
            Self::Email | Self::EmailJson => endpoint.contains('@'),
            Self::Http => endpoint.starts_with("http://"),
            Self::Https => endpoint.starts_with("https://"),
            Self::Sms => PHONE_NUMBER.is_match(endpoint),
            Self::Sqs | Self::Lambda | Self::Application | Self::Firehose => {
                endpoint.starts_with("arn:")
            }
        };
        if ok {
            Ok(())
        } else {
            Err(AwsError::Validation(format!(
                "'{endpoint}' is not a valid {self} endpoint"
            )))
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A topic subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ARN, or [`PENDING_CONFIRMATION`].
    pub arn: String,
    pub topic_arn: String,
    /// Protocol name as reported by SNS.
    pub protocol: String,
    pub endpoint: String,
    pub owner: Option<String>,
}

impl Subscription {
    pub fn is_pending(&self) -> bool {
        self.arn == PENDING_CONFIRMATION
    }
}

/// Topic attributes keyed by attribute name (`DisplayName`, `Policy`, ...).
pub type TopicAttributes = BTreeMap<String, String>;

/// Calls the SNS facade makes against the provider.
#[async_trait]
pub trait SnsApi: fmt::Debug + Send + Sync {
    /// Returns the topic ARN.
    async fn create_topic(&self, name: &str) -> Result<String, AwsError>;

    /// Returns topic ARNs.
    async fn list_topics(&self) -> Result<Vec<String>, AwsError>;

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), AwsError>;

    async fn get_topic_attributes(&self, topic_arn: &str) -> Result<TopicAttributes, AwsError>;

    async fn set_topic_attributes(
        &self,
        topic_arn: &str,
        name: &str,
        value: &str,
    ) -> Result<(), AwsError>;

    /// Returns the subscription ARN, or [`PENDING_CONFIRMATION`].
    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: Protocol,
        endpoint: &str,
    ) -> Result<String, AwsError>;

    /// Returns the confirmed subscription ARN.
    async fn confirm_subscription(&self, topic_arn: &str, token: &str) -> Result<String, AwsError>;

    async fn list_subscriptions_by_topic(&self, topic_arn: &str) -> Result<Vec<Subscription>, AwsError>;

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), AwsError>;

    /// Returns the message id.
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, AwsError>;
}
