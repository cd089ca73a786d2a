//! In-memory S3, SES, and SNS clients that record every call.
//!
//! The mocks keep just enough state to behave like the provider for the
//! happy path and its common failures (missing bucket, missing rule set,
//! unknown topic). Any operation can also be forced to fail with
//! [`MockS3::failing`] and friends.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::AwsError;
use crate::s3::{
    AclParams, AclPolicy, AclSource, BucketDescriptor, CorsRule, CorsRules, ObjectDescriptor,
    Owner, S3Api,
};
use crate::ses::{
    EmailTemplate, IdentityKind, ReceiptFilter, ReceiptRule, ReceiptRuleSet,
    ReceiptRuleSetMetadata, SendDataPoint, SendQuota, SesApi, TemplateMetadata,
    TemplatedEmailRequest,
};
use crate::sns::{PENDING_CONFIRMATION, Protocol, SnsApi, Subscription, TopicAttributes};

const MOCK_ACCOUNT: &str = "000000000000";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Call log plus injected failures, shared by all mocks.
#[derive(Debug, Default)]
struct Recorder {
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, AwsError>>,
}

impl Recorder {
    fn record(&self, operation: &'static str) -> Result<(), AwsError> {
        lock(&self.calls).push(operation);
        match lock(&self.failures).get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn fail(&self, operation: &'static str, err: AwsError) {
        lock(&self.failures).insert(operation, err);
    }

    fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    fn count(&self, operation: &str) -> usize {
        lock(&self.calls).iter().filter(|c| **c == operation).count()
    }
}

macro_rules! recorder_accessors {
    ($mock:ty) => {
        impl $mock {
            /// Make every call to `operation` fail with `err`.
            #[must_use]
            pub fn failing(self, operation: &'static str, err: AwsError) -> Self {
                self.recorder.fail(operation, err);
                self
            }

            /// Operation names in call order.
            pub fn calls(&self) -> Vec<&'static str> {
                self.recorder.calls()
            }

            /// How often `operation` was called.
            pub fn call_count(&self, operation: &str) -> usize {
                self.recorder.count(operation)
            }
        }
    };
}

// S3

/// Recording [`S3Api`].
#[derive(Debug, Default)]
pub struct MockS3 {
    recorder: Recorder,
    buckets: Mutex<Vec<BucketDescriptor>>,
    objects: Mutex<Vec<ObjectDescriptor>>,
    acls: Mutex<HashMap<String, AclPolicy>>,
    cors: Mutex<HashMap<String, CorsRules>>,
}

recorder_accessors!(MockS3);

impl MockS3 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing bucket.
    #[must_use]
    pub fn with_bucket(self, name: &str) -> Self {
        lock(&self.buckets).push(BucketDescriptor {
            name: name.to_owned(),
            created_at: Some(Utc::now()),
            location: None,
        });
        self
    }

    /// Objects uploaded so far.
    pub fn objects(&self) -> Vec<ObjectDescriptor> {
        lock(&self.objects).clone()
    }

    fn require_bucket(&self, bucket: &str) -> Result<(), AwsError> {
        if lock(&self.buckets).iter().any(|b| b.name == bucket) {
            Ok(())
        } else {
            Err(AwsError::provider(
                "NoSuchBucket: The specified bucket does not exist",
            ))
        }
    }
}

#[async_trait]
impl S3Api for MockS3 {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>, AwsError> {
        self.recorder.record("list_buckets")?;
        Ok(lock(&self.buckets).clone())
    }

    async fn create_bucket(&self, name: &str) -> Result<BucketDescriptor, AwsError> {
        self.recorder.record("create_bucket")?;
        let mut buckets = lock(&self.buckets);
        if buckets.iter().any(|b| b.name == name) {
            return Err(AwsError::provider(
                "BucketAlreadyOwnedByYou: Your previous request to create the named bucket succeeded and you already own it.",
            ));
        }
        let bucket = BucketDescriptor {
            name: name.to_owned(),
            created_at: Some(Utc::now()),
            location: Some(format!("/{name}")),
        };
        buckets.push(bucket.clone());
        Ok(bucket)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        _source: &Path,
    ) -> Result<ObjectDescriptor, AwsError> {
        self.recorder.record("put_object")?;
        self.require_bucket(bucket)?;
        let mut objects = lock(&self.objects);
        let object = ObjectDescriptor {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag: Some(format!("\"etag-{}\"", objects.len() + 1)),
            version_id: None,
        };
        objects.push(object.clone());
        Ok(object)
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<AclPolicy, AwsError> {
        self.recorder.record("get_bucket_acl")?;
        self.require_bucket(bucket)?;
        Ok(lock(&self.acls).get(bucket).cloned().unwrap_or_else(|| AclPolicy {
            owner: Some(Owner {
                id: Some(MOCK_ACCOUNT.to_owned()),
                display_name: Some("owner".to_owned()),
            }),
            grants: Vec::new(),
        }))
    }

    async fn put_bucket_acl(&self, params: &AclParams) -> Result<(), AwsError> {
        self.recorder.record("put_bucket_acl")?;
        self.require_bucket(&params.bucket)?;
        let policy = match &params.acl {
            AclSource::Canned(_) => AclPolicy::default(),
            AclSource::Policy(policy) => policy.clone(),
        };
        lock(&self.acls).insert(params.bucket.clone(), policy);
        Ok(())
    }

    async fn get_bucket_cors(&self, bucket: &str) -> Result<CorsRules, AwsError> {
        self.recorder.record("get_bucket_cors")?;
        self.require_bucket(bucket)?;
        lock(&self.cors).get(bucket).cloned().ok_or_else(|| {
            AwsError::provider("NoSuchCORSConfiguration: The CORS configuration does not exist")
        })
    }

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<(), AwsError> {
        self.recorder.record("put_bucket_cors")?;
        self.require_bucket(bucket)?;
        lock(&self.cors).insert(bucket.to_owned(), rules.to_vec());
        Ok(())
    }
}

// SES

/// Recording [`SesApi`].
#[derive(Debug)]
pub struct MockSes {
    recorder: Recorder,
    templates: Mutex<BTreeMap<String, EmailTemplate>>,
    identities: Mutex<Vec<(String, IdentityKind)>>,
    filters: Mutex<Vec<ReceiptFilter>>,
    rule_sets: Mutex<BTreeMap<String, Vec<ReceiptRule>>>,
    policies: Mutex<BTreeMap<(String, String), String>>,
    quota: Mutex<SendQuota>,
    statistics: Mutex<Vec<SendDataPoint>>,
    sent: Mutex<Vec<TemplatedEmailRequest>>,
}

impl Default for MockSes {
    fn default() -> Self {
        Self {
            recorder: Recorder::default(),
            templates: Mutex::default(),
            identities: Mutex::default(),
            filters: Mutex::default(),
            rule_sets: Mutex::default(),
            policies: Mutex::default(),
            quota: Mutex::new(SendQuota::new(200.0, 0.0, 1.0)),
            statistics: Mutex::default(),
            sent: Mutex::default(),
        }
    }
}

recorder_accessors!(MockSes);

impl MockSes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this quota from `get_send_quota`.
    #[must_use]
    pub fn with_quota(self, max_24_hour_send: f64, sent_last_24_hours: f64, max_send_rate: f64) -> Self {
        *lock(&self.quota) = SendQuota::new(max_24_hour_send, sent_last_24_hours, max_send_rate);
        self
    }

    /// Report these data points from `get_send_statistics`.
    #[must_use]
    pub fn with_statistics(self, points: Vec<SendDataPoint>) -> Self {
        *lock(&self.statistics) = points;
        self
    }

    /// Emails handed to `send_templated_email`, defaults applied.
    pub fn sent(&self) -> Vec<TemplatedEmailRequest> {
        lock(&self.sent).clone()
    }

    fn rule_set_missing(name: &str) -> AwsError {
        AwsError::provider(format!(
            "RuleSetDoesNotExist: Rule set does not exist: {name}"
        ))
    }

    fn rule_missing(name: &str) -> AwsError {
        AwsError::provider(format!("RuleDoesNotExist: Rule does not exist: {name}"))
    }

    fn template_missing(name: &str) -> AwsError {
        AwsError::provider(format!(
            "TemplateDoesNotExist: Template {name} does not exist."
        ))
    }
}

#[async_trait]
impl SesApi for MockSes {
    async fn create_template(&self, template: &EmailTemplate) -> Result<(), AwsError> {
        self.recorder.record("create_template")?;
        let mut templates = lock(&self.templates);
        if templates.contains_key(&template.name) {
            return Err(AwsError::provider(format!(
                "AlreadyExists: Template {} already exists.",
                template.name
            )));
        }
        templates.insert(template.name.clone(), template.clone());
        Ok(())
    }

    async fn get_template(&self, name: &str) -> Result<EmailTemplate, AwsError> {
        self.recorder.record("get_template")?;
        lock(&self.templates)
            .get(name)
            .cloned()
            .ok_or_else(|| Self::template_missing(name))
    }

    async fn update_template(&self, template: &EmailTemplate) -> Result<(), AwsError> {
        self.recorder.record("update_template")?;
        let mut templates = lock(&self.templates);
        let existing = templates
            .get_mut(&template.name)
            .ok_or_else(|| Self::template_missing(&template.name))?;
        *existing = template.clone();
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> Result<(), AwsError> {
        self.recorder.record("delete_template")?;
        lock(&self.templates).remove(name);
        Ok(())
    }

    async fn list_templates(&self) -> Result<Vec<TemplateMetadata>, AwsError> {
        self.recorder.record("list_templates")?;
        Ok(lock(&self.templates)
            .keys()
            .map(|name| TemplateMetadata {
                name: name.clone(),
                created_at: None,
            })
            .collect())
    }

    async fn send_templated_email(&self, email: &TemplatedEmailRequest) -> Result<String, AwsError> {
        self.recorder.record("send_templated_email")?;
        if !lock(&self.templates).contains_key(&email.template) {
            return Err(Self::template_missing(&email.template));
        }
        let mut sent = lock(&self.sent);
        sent.push(email.clone());
        Ok(format!("mock-message-{}", sent.len()))
    }

    async fn verify_email_identity(&self, email: &str) -> Result<(), AwsError> {
        self.recorder.record("verify_email_identity")?;
        lock(&self.identities).push((email.to_owned(), IdentityKind::EmailAddress));
        Ok(())
    }

    async fn verify_domain_identity(&self, domain: &str) -> Result<String, AwsError> {
        self.recorder.record("verify_domain_identity")?;
        lock(&self.identities).push((domain.to_owned(), IdentityKind::Domain));
        Ok(format!("mock-token-{domain}"))
    }

    async fn delete_identity(&self, identity: &str) -> Result<(), AwsError> {
        self.recorder.record("delete_identity")?;
        lock(&self.identities).retain(|(name, _)| name != identity);
        Ok(())
    }

    async fn list_identities(&self, kind: IdentityKind) -> Result<Vec<String>, AwsError> {
        self.recorder.record("list_identities")?;
        Ok(lock(&self.identities)
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn create_receipt_filter(&self, filter: &ReceiptFilter) -> Result<(), AwsError> {
        self.recorder.record("create_receipt_filter")?;
        lock(&self.filters).push(filter.clone());
        Ok(())
    }

    async fn list_receipt_filters(&self) -> Result<Vec<ReceiptFilter>, AwsError> {
        self.recorder.record("list_receipt_filters")?;
        Ok(lock(&self.filters).clone())
    }

    async fn delete_receipt_filter(&self, name: &str) -> Result<(), AwsError> {
        self.recorder.record("delete_receipt_filter")?;
        lock(&self.filters).retain(|f| f.name != name);
        Ok(())
    }

    async fn create_receipt_rule_set(&self, name: &str) -> Result<(), AwsError> {
        self.recorder.record("create_receipt_rule_set")?;
        let mut rule_sets = lock(&self.rule_sets);
        if rule_sets.contains_key(name) {
            return Err(AwsError::provider(format!(
                "AlreadyExists: Rule set already exists: {name}"
            )));
        }
        rule_sets.insert(name.to_owned(), Vec::new());
        Ok(())
    }

    async fn create_receipt_rule(
        &self,
        rule_set: &str,
        rule: &ReceiptRule,
        after: Option<&str>,
    ) -> Result<(), AwsError> {
        self.recorder.record("create_receipt_rule")?;
        let mut rule_sets = lock(&self.rule_sets);
        let rules = rule_sets
            .get_mut(rule_set)
            .ok_or_else(|| Self::rule_set_missing(rule_set))?;
        let position = match after {
            Some(after) => {
                rules
                    .iter()
                    .position(|r| r.name == after)
                    .ok_or_else(|| Self::rule_missing(after))?
                    + 1
            }
            None => 0,
        };
        rules.insert(position, rule.clone());
        Ok(())
    }

    async fn describe_receipt_rule_set(&self, name: &str) -> Result<ReceiptRuleSet, AwsError> {
        self.recorder.record("describe_receipt_rule_set")?;
        let rule_sets = lock(&self.rule_sets);
        let rules = rule_sets
            .get(name)
            .ok_or_else(|| Self::rule_set_missing(name))?;
        Ok(ReceiptRuleSet {
            metadata: ReceiptRuleSetMetadata {
                name: name.to_owned(),
                created_at: None,
            },
            rules: rules.clone(),
        })
    }

    async fn describe_receipt_rule(&self, rule_set: &str, rule: &str) -> Result<ReceiptRule, AwsError> {
        self.recorder.record("describe_receipt_rule")?;
        let rule_sets = lock(&self.rule_sets);
        rule_sets
            .get(rule_set)
            .ok_or_else(|| Self::rule_set_missing(rule_set))?
            .iter()
            .find(|r| r.name == rule)
            .cloned()
            .ok_or_else(|| Self::rule_missing(rule))
    }

    async fn list_receipt_rule_sets(&self) -> Result<Vec<ReceiptRuleSetMetadata>, AwsError> {
        self.recorder.record("list_receipt_rule_sets")?;
        Ok(lock(&self.rule_sets)
            .keys()
            .map(|name| ReceiptRuleSetMetadata {
                name: name.clone(),
                created_at: None,
            })
            .collect())
    }

    async fn update_receipt_rule(&self, rule_set: &str, rule: &ReceiptRule) -> Result<(), AwsError> {
        self.recorder.record("update_receipt_rule")?;
        let mut rule_sets = lock(&self.rule_sets);
        let existing = rule_sets
            .get_mut(rule_set)
            .ok_or_else(|| Self::rule_set_missing(rule_set))?
            .iter_mut()
            .find(|r| r.name == rule.name)
            .ok_or_else(|| Self::rule_missing(&rule.name))?;
        *existing = rule.clone();
        Ok(())
    }

    async fn delete_receipt_rule_set(&self, name: &str) -> Result<(), AwsError> {
        self.recorder.record("delete_receipt_rule_set")?;
        lock(&self.rule_sets).remove(name);
        Ok(())
    }

    async fn delete_receipt_rule(&self, rule_set: &str, rule: &str) -> Result<(), AwsError> {
        self.recorder.record("delete_receipt_rule")?;
        lock(&self.rule_sets)
            .get_mut(rule_set)
            .ok_or_else(|| Self::rule_set_missing(rule_set))?
            .retain(|r| r.name != rule);
        Ok(())
    }

    async fn get_send_quota(&self) -> Result<SendQuota, AwsError> {
        self.recorder.record("get_send_quota")?;
        Ok(*lock(&self.quota))
    }

    async fn get_send_statistics(&self) -> Result<Vec<SendDataPoint>, AwsError> {
        self.recorder.record("get_send_statistics")?;
        Ok(lock(&self.statistics).clone())
    }

    async fn put_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
        policy: &str,
    ) -> Result<(), AwsError> {
        self.recorder.record("put_identity_policy")?;
        lock(&self.policies).insert(
            (identity.to_owned(), policy_name.to_owned()),
            policy.to_owned(),
        );
        Ok(())
    }

    async fn get_identity_policies(
        &self,
        identity: &str,
        policy_names: &[String],
    ) -> Result<BTreeMap<String, String>, AwsError> {
        self.recorder.record("get_identity_policies")?;
        let policies = lock(&self.policies);
        Ok(policy_names
            .iter()
            .filter_map(|name| {
                policies
                    .get(&(identity.to_owned(), name.clone()))
                    .map(|body| (name.clone(), body.clone()))
            })
            .collect())
    }

    async fn list_identity_policies(&self, identity: &str) -> Result<Vec<String>, AwsError> {
        self.recorder.record("list_identity_policies")?;
        Ok(lock(&self.policies)
            .keys()
            .filter(|(id, _)| id == identity)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn delete_identity_policy(&self, identity: &str, policy_name: &str) -> Result<(), AwsError> {
        self.recorder.record("delete_identity_policy")?;
        lock(&self.policies).remove(&(identity.to_owned(), policy_name.to_owned()));
        Ok(())
    }
}

// SNS

/// A message handed to [`MockSns`]'s `publish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic_arn: String,
    pub message: String,
    pub subject: Option<String>,
}

/// Recording [`SnsApi`]. Topic ARNs look like
/// `arn:aws:sns:<region>:000000000000:<name>`.
#[derive(Debug)]
pub struct MockSns {
    recorder: Recorder,
    region: String,
    topics: Mutex<BTreeMap<String, TopicAttributes>>,
    subscriptions: Mutex<Vec<Subscription>>,
    published: Mutex<Vec<PublishedMessage>>,
}

impl Default for MockSns {
    fn default() -> Self {
        Self::new("eu-west-1")
    }
}

recorder_accessors!(MockSns);

impl MockSns {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            recorder: Recorder::default(),
            region: region.into(),
            topics: Mutex::default(),
            subscriptions: Mutex::default(),
            published: Mutex::default(),
        }
    }

    /// The ARN this mock assigns to topic `name`.
    pub fn topic_arn(&self, name: &str) -> String {
        format!("arn:aws:sns:{}:{MOCK_ACCOUNT}:{name}", self.region)
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.published).clone()
    }

    fn require_topic(&self, topic_arn: &str) -> Result<(), AwsError> {
        if lock(&self.topics).contains_key(topic_arn) {
            Ok(())
        } else {
            Err(AwsError::provider("NotFound: Topic does not exist"))
        }
    }
}

#[async_trait]
impl SnsApi for MockSns {
    async fn create_topic(&self, name: &str) -> Result<String, AwsError> {
        self.recorder.record("create_topic")?;
        let arn = self.topic_arn(name);
        lock(&self.topics).entry(arn.clone()).or_insert_with(|| {
            TopicAttributes::from([
                ("TopicArn".to_owned(), arn.clone()),
                ("DisplayName".to_owned(), String::new()),
                ("Owner".to_owned(), MOCK_ACCOUNT.to_owned()),
            ])
        });
        Ok(arn)
    }

    async fn list_topics(&self) -> Result<Vec<String>, AwsError> {
        self.recorder.record("list_topics")?;
        Ok(lock(&self.topics).keys().cloned().collect())
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), AwsError> {
        self.recorder.record("delete_topic")?;
        self.require_topic(topic_arn)?;
        lock(&self.topics).remove(topic_arn);
        lock(&self.subscriptions).retain(|s| s.topic_arn != topic_arn);
        Ok(())
    }

    async fn get_topic_attributes(&self, topic_arn: &str) -> Result<TopicAttributes, AwsError> {
        self.recorder.record("get_topic_attributes")?;
        lock(&self.topics)
            .get(topic_arn)
            .cloned()
            .ok_or_else(|| AwsError::provider("NotFound: Topic does not exist"))
    }

    async fn set_topic_attributes(
        &self,
        topic_arn: &str,
        name: &str,
        value: &str,
    ) -> Result<(), AwsError> {
        self.recorder.record("set_topic_attributes")?;
        lock(&self.topics)
            .get_mut(topic_arn)
            .ok_or_else(|| AwsError::provider("NotFound: Topic does not exist"))?
            .insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: Protocol,
        endpoint: &str,
    ) -> Result<String, AwsError> {
        self.recorder.record("subscribe")?;
        self.require_topic(topic_arn)?;
        let mut subscriptions = lock(&self.subscriptions);
        let arn = match protocol {
            Protocol::Email | Protocol::EmailJson | Protocol::Http | Protocol::Https => {
                PENDING_CONFIRMATION.to_owned()
            }
            _ => format!("{topic_arn}:sub-{}", subscriptions.len() + 1),
        };
        subscriptions.push(Subscription {
            arn: arn.clone(),
            topic_arn: topic_arn.to_owned(),
            protocol: protocol.as_str().to_owned(),
            endpoint: endpoint.to_owned(),
            owner: Some(MOCK_ACCOUNT.to_owned()),
        });
        Ok(arn)
    }

    /// Confirms the oldest pending subscription of the topic; any token is
    /// accepted while one is pending.
    async fn confirm_subscription(&self, topic_arn: &str, _token: &str) -> Result<String, AwsError> {
        self.recorder.record("confirm_subscription")?;
        self.require_topic(topic_arn)?;
        let mut subscriptions = lock(&self.subscriptions);
        let count = subscriptions.len();
        let pending = subscriptions
            .iter_mut()
            .find(|s| s.topic_arn == topic_arn && s.is_pending())
            .ok_or_else(|| AwsError::provider("InvalidParameter: Invalid token"))?;
        pending.arn = format!("{topic_arn}:sub-{count}");
        Ok(pending.arn.clone())
    }

    async fn list_subscriptions_by_topic(&self, topic_arn: &str) -> Result<Vec<Subscription>, AwsError> {
        self.recorder.record("list_subscriptions_by_topic")?;
        self.require_topic(topic_arn)?;
        Ok(lock(&self.subscriptions)
            .iter()
            .filter(|s| s.topic_arn == topic_arn)
            .cloned()
            .collect())
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), AwsError> {
        self.recorder.record("unsubscribe")?;
        let mut subscriptions = lock(&self.subscriptions);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.arn != subscription_arn);
        if subscriptions.len() == before {
            return Err(AwsError::provider("NotFound: Subscription does not exist"));
        }
        Ok(())
    }

    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, AwsError> {
        self.recorder.record("publish")?;
        self.require_topic(topic_arn)?;
        let mut published = lock(&self.published);
        published.push(PublishedMessage {
            topic_arn: topic_arn.to_owned(),
            message: message.to_owned(),
            subject: subject.map(ToOwned::to_owned),
        });
        Ok(format!("mock-message-{}", published.len()))
    }
}
