use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::instrument;

use super::{
    EmailTemplate, IdentityKind, ReceiptFilter, ReceiptRule, ReceiptRuleSet,
    ReceiptRuleSetMetadata, SendDataPoint, SendQuota, SesApi, TemplateMetadata, TemplatedEmail,
};
use crate::error::{AwsError, require};
use crate::outcome::{Ack, Outcome};
use crate::report::{Notice, OutcomeReporter, ReportSink};

/// SES operations returning [`Outcome`]s.
///
/// Every call maps one-to-one onto an SES API action. Ordering between
/// calls (a receipt rule set must exist before rules are added to it) is
/// left to the caller; provider errors surface unmodified.
#[derive(Debug, Clone)]
pub struct SesFacade {
    client: Arc<dyn SesApi>,
    sink: ReportSink,
}

fn require_list(field: &str, values: &[String]) -> Result<(), AwsError> {
    if values.is_empty() {
        return Err(AwsError::Validation(format!("{field} must not be empty")));
    }
    values.iter().try_for_each(|v| require(field, v))
}

fn require_json(field: &str, value: &str) -> Result<(), AwsError> {
    serde_json::from_str::<serde_json::Value>(value)
        .map(|_| ())
        .map_err(|e| AwsError::Validation(format!("{field} is not valid JSON: {e}")))
}

impl SesFacade {
    pub fn new(client: Arc<dyn SesApi>) -> Self {
        Self {
            client,
            sink: ReportSink::default(),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn OutcomeReporter>) -> Self {
        self.sink = ReportSink::new(reporter);
        self
    }

    /// The underlying client handle.
    pub fn client(&self) -> &Arc<dyn SesApi> {
        &self.client
    }

    // Templates

    #[instrument(skip_all, fields(service = "ses", template = %template.name))]
    pub async fn create_template(&self, template: &EmailTemplate) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("template name", &template.name)?;
            self.client.create_template(template).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "create_template",
            result,
            Some(Notice::new("SES Template {0} created correctly").param(&template.name)),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn get_template(&self, name: &str) -> Outcome<EmailTemplate> {
        let result: Result<_, AwsError> = async {
            require("template name", name)?;
            self.client.get_template(name).await
        }
        .await;
        self.sink.settle("get_template", result, None)
    }

    #[instrument(skip_all, fields(service = "ses", template = %template.name))]
    pub async fn update_template(&self, template: &EmailTemplate) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("template name", &template.name)?;
            self.client.update_template(template).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "update_template",
            result,
            Some(Notice::new("SES Template {0} updated correctly").param(&template.name)),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn delete_template(&self, name: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("template name", name)?;
            self.client.delete_template(name).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "delete_template",
            result,
            Some(Notice::new("SES Template {0} deleted correctly").param(name)),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn list_templates(&self) -> Outcome<Vec<TemplateMetadata>> {
        let result = self.client.list_templates().await;
        self.sink.settle("list_templates", result, None)
    }

    /// Send `email` using a stored template and return the message id.
    ///
    /// Replies go to the sender unless `reply_to` is set; `template_data`
    /// defaults to `{}`.
    #[instrument(skip_all, fields(service = "ses", template = %email.template))]
    pub async fn send_templated_email(&self, email: TemplatedEmail) -> Outcome<String> {
        let recipients = email.recipients.join(", ");
        let result: Result<_, AwsError> = async {
            require("template name", &email.template)?;
            require("sender", &email.sender)?;
            require_list("recipients", &email.recipients)?;
            let request = email.into_request();
            require_json("template data", &request.template_data)?;
            self.client.send_templated_email(&request).await
        }
        .await;
        self.sink.settle(
            "send_templated_email",
            result,
            Some(Notice::new("Email sent correctly to {0}").param(recipients)),
        )
    }

    // Identities

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn verify_email_identity(&self, email: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("email address", email)?;
            self.client.verify_email_identity(email).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle_info(
            "verify_email_identity",
            result,
            Notice::new("Verification email sent to {0}").param(email),
        )
    }

    /// Start domain verification; returns the TXT record value to publish.
    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn verify_domain_identity(&self, domain: &str) -> Outcome<String> {
        let result: Result<_, AwsError> = async {
            require("domain", domain)?;
            self.client.verify_domain_identity(domain).await
        }
        .await;
        self.sink.settle_info(
            "verify_domain_identity",
            result,
            Notice::new("Verification of domain {0} started").param(domain),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn delete_email(&self, email: &str) -> Outcome<Ack> {
        self.delete_identity("delete_email", "email address", email).await
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn delete_domain(&self, domain: &str) -> Outcome<Ack> {
        self.delete_identity("delete_domain", "domain", domain).await
    }

    async fn delete_identity(
        &self,
        operation: &'static str,
        field: &str,
        identity: &str,
    ) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require(field, identity)?;
            self.client.delete_identity(identity).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            operation,
            result,
            Some(Notice::new("SES Identity {0} deleted correctly").param(identity)),
        )
    }

    /// Email address identities.
    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn list_identities(&self) -> Outcome<Vec<String>> {
        let result = self.client.list_identities(IdentityKind::EmailAddress).await;
        self.sink.settle("list_identities", result, None)
    }

    /// Domain identities.
    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn list_domains(&self) -> Outcome<Vec<String>> {
        let result = self.client.list_identities(IdentityKind::Domain).await;
        self.sink.settle("list_domains", result, None)
    }

    // Receipt filters

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn create_email_filter(&self, filter: &ReceiptFilter) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("filter name", &filter.name)?;
            require("filter CIDR", &filter.cidr)?;
            self.client.create_receipt_filter(filter).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "create_email_filter",
            result,
            Some(Notice::new("SES Filter {0} created correctly").param(&filter.name)),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn list_email_filters(&self) -> Outcome<Vec<ReceiptFilter>> {
        let result = self.client.list_receipt_filters().await;
        self.sink.settle("list_email_filters", result, None)
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn delete_email_filter(&self, name: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("filter name", name)?;
            self.client.delete_receipt_filter(name).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "delete_email_filter",
            result,
            Some(Notice::new("SES Filter {0} deleted correctly").param(name)),
        )
    }

    // Receipt rules

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn create_receipt_rule_set(&self, name: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("rule set name", name)?;
            self.client.create_receipt_rule_set(name).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "create_receipt_rule_set",
            result,
            Some(Notice::new("SES Rule Set {0} created correctly").param(name)),
        )
    }

    /// Add `rule` to `rule_set`, after the rule named `after` when given.
    ///
    /// The rule set is not checked locally; creating a rule in a missing set
    /// fails with the provider's error.
    #[instrument(skip(self, rule), fields(service = "ses", rule = %rule.name))]
    pub async fn create_receipt_rule(
        &self,
        rule_set: &str,
        rule: &ReceiptRule,
        after: Option<&str>,
    ) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("rule set name", rule_set)?;
            require("rule name", &rule.name)?;
            self.client.create_receipt_rule(rule_set, rule, after).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "create_receipt_rule",
            result,
            Some(
                Notice::new("SES Rule {0} added correctly to {1}")
                    .param(&rule.name)
                    .param(rule_set),
            ),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn describe_receipt_rule_set(&self, name: &str) -> Outcome<ReceiptRuleSet> {
        let result: Result<_, AwsError> = async {
            require("rule set name", name)?;
            self.client.describe_receipt_rule_set(name).await
        }
        .await;
        self.sink.settle("describe_receipt_rule_set", result, None)
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn describe_receipt_rule(&self, rule_set: &str, rule: &str) -> Outcome<ReceiptRule> {
        let result: Result<_, AwsError> = async {
            require("rule set name", rule_set)?;
            require("rule name", rule)?;
            self.client.describe_receipt_rule(rule_set, rule).await
        }
        .await;
        self.sink.settle("describe_receipt_rule", result, None)
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn list_receipt_rule_sets(&self) -> Outcome<Vec<ReceiptRuleSetMetadata>> {
        let result = self.client.list_receipt_rule_sets().await;
        self.sink.settle("list_receipt_rule_sets", result, None)
    }

    #[instrument(skip(self, rule), fields(service = "ses", rule = %rule.name))]
    pub async fn update_receipt_rule(&self, rule_set: &str, rule: &ReceiptRule) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("rule set name", rule_set)?;
            require("rule name", &rule.name)?;
            self.client.update_receipt_rule(rule_set, rule).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "update_receipt_rule",
            result,
            Some(Notice::new("SES Rule {0} updated correctly").param(&rule.name)),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn delete_receipt_rule_set(&self, name: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("rule set name", name)?;
            self.client.delete_receipt_rule_set(name).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "delete_receipt_rule_set",
            result,
            Some(Notice::new("SES Rule Set {0} deleted correctly").param(name)),
        )
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn delete_receipt_rule(&self, rule_set: &str, rule: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("rule set name", rule_set)?;
            require("rule name", rule)?;
            self.client.delete_receipt_rule(rule_set, rule).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "delete_receipt_rule",
            result,
            Some(Notice::new("SES Rule {0} deleted correctly").param(rule)),
        )
    }

    // Sending limits

    /// Current quota, with `available = max_24_hour_send - sent_last_24_hours`.
    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn check_sending_quota(&self) -> Outcome<SendQuota> {
        let result = self.client.get_send_quota().await;
        self.sink.settle("check_sending_quota", result, None)
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn get_sending_statistics(&self) -> Outcome<Vec<SendDataPoint>> {
        let result = self.client.get_send_statistics().await;
        self.sink.settle("get_sending_statistics", result, None)
    }

    // Sender authorization

    /// Attach a sending authorization policy (a JSON policy document) to
    /// `identity`.
    #[instrument(skip(self, policy), fields(service = "ses"))]
    pub async fn create_authorized_sender(
        &self,
        identity: &str,
        policy_name: &str,
        policy: &str,
    ) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("identity", identity)?;
            require("policy name", policy_name)?;
            require("policy", policy)?;
            require_json("policy", policy)?;
            self.client
                .put_identity_policy(identity, policy_name, policy)
                .await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "create_authorized_sender",
            result,
            Some(
                Notice::new("Policy {0} added correctly to {1}")
                    .param(policy_name)
                    .param(identity),
            ),
        )
    }

    /// Policy documents of `identity`, keyed by policy name.
    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn retrieve_policies_for_authorized_sender(
        &self,
        identity: &str,
        policy_names: &[String],
    ) -> Outcome<BTreeMap<String, String>> {
        let result: Result<_, AwsError> = async {
            require("identity", identity)?;
            require_list("policy names", policy_names)?;
            self.client
                .get_identity_policies(identity, policy_names)
                .await
        }
        .await;
        self.sink
            .settle("retrieve_policies_for_authorized_sender", result, None)
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn list_authorized_senders(&self, identity: &str) -> Outcome<Vec<String>> {
        let result: Result<_, AwsError> = async {
            require("identity", identity)?;
            self.client.list_identity_policies(identity).await
        }
        .await;
        self.sink.settle("list_authorized_senders", result, None)
    }

    #[instrument(skip(self), fields(service = "ses"))]
    pub async fn revoke_permission_for_authorized_sender(
        &self,
        identity: &str,
        policy_name: &str,
    ) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("identity", identity)?;
            require("policy name", policy_name)?;
            self.client
                .delete_identity_policy(identity, policy_name)
                .await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "revoke_permission_for_authorized_sender",
            result,
            Some(
                Notice::new("Policy {0} removed correctly from {1}")
                    .param(policy_name)
                    .param(identity),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::MockSes;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl OutcomeReporter for Collect {
        fn success(&self, notice: &Notice) {
            self.0.lock().unwrap().push(format!("success:{notice}"));
        }

        fn info(&self, notice: &Notice) {
            self.0.lock().unwrap().push(format!("info:{notice}"));
        }

        fn error(&self, kind: ErrorKind, message: &str) {
            self.0.lock().unwrap().push(format!("error:{kind}:{message}"));
        }
    }

    fn welcome() -> EmailTemplate {
        EmailTemplate {
            name: "welcome".into(),
            subject: Some("Hello {{name}}".into()),
            html: Some("<p>Hello {{name}}</p>".into()),
            text: None,
        }
    }

    #[test]
    fn lists_must_be_present_and_non_blank() {
        assert!(require_list("recipients", &[]).is_err());
        assert!(require_list("recipients", &["a@x.com".into(), " ".into()]).is_err());
        assert!(require_list("recipients", &["a@x.com".into()]).is_ok());
    }

    #[test]
    fn json_check_rejects_garbage() {
        assert!(require_json("template data", "{}").is_ok());
        let err = require_json("template data", "{name:").unwrap_err();
        assert!(err.to_string().starts_with("validation error: template data is not valid JSON"));
    }

    #[tokio::test]
    async fn reply_to_defaults_to_sender() {
        let mock = Arc::new(MockSes::new());
        let ses = SesFacade::new(mock.clone());
        assert!(ses.create_template(&welcome()).await.is_success());

        let message_id = ses
            .send_templated_email(TemplatedEmail {
                template: "welcome".into(),
                sender: "noreply@example.com".into(),
                recipients: vec!["ada@example.com".into()],
                ..TemplatedEmail::default()
            })
            .await
            .success()
            .unwrap();

        assert_eq!(message_id, "mock-message-1");
        let sent = mock.sent();
        assert_eq!(sent[0].reply_to, ["noreply@example.com"]);
        assert_eq!(sent[0].template_data, "{}");
    }

    #[tokio::test]
    async fn send_rejects_bad_template_data_locally() {
        let mock = Arc::new(MockSes::new());
        let outcome = SesFacade::new(mock.clone())
            .send_templated_email(TemplatedEmail {
                template: "welcome".into(),
                sender: "noreply@example.com".into(),
                recipients: vec!["ada@example.com".into()],
                template_data: Some("not json".into()),
                ..TemplatedEmail::default()
            })
            .await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn quota_reports_available() {
        let mock = Arc::new(MockSes::new().with_quota(200.0, 50.0, 14.0));
        let quota = SesFacade::new(mock)
            .check_sending_quota()
            .await
            .success()
            .unwrap();
        assert!((quota.available - 150.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn rule_before_rule_set_surfaces_provider_message() {
        let mock = Arc::new(MockSes::new());
        let rule = ReceiptRule {
            name: "archive".into(),
            enabled: true,
            ..ReceiptRule::default()
        };

        let outcome = SesFacade::new(mock)
            .create_receipt_rule("inbound", &rule, None)
            .await;

        assert_eq!(
            outcome,
            Outcome::Failure {
                kind: ErrorKind::Provider,
                message: "RuleSetDoesNotExist: Rule set does not exist: inbound".into(),
            }
        );
    }

    #[tokio::test]
    async fn rules_are_ordered_after_named_rule() {
        let ses = SesFacade::new(Arc::new(MockSes::new()));
        let rule = |name: &str| ReceiptRule {
            name: name.into(),
            enabled: true,
            ..ReceiptRule::default()
        };

        assert!(ses.create_receipt_rule_set("inbound").await.is_success());
        assert!(ses.create_receipt_rule("inbound", &rule("first"), None).await.is_success());
        assert!(ses.create_receipt_rule("inbound", &rule("last"), Some("first")).await.is_success());
        assert!(ses.create_receipt_rule("inbound", &rule("middle"), Some("first")).await.is_success());

        let set = ses.describe_receipt_rule_set("inbound").await.success().unwrap();
        let names: Vec<_> = set.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["first", "middle", "last"]);
    }

    #[tokio::test]
    async fn verification_is_reported_as_info() {
        let collect = Arc::new(Collect::default());
        let ses = SesFacade::new(Arc::new(MockSes::new())).with_reporter(collect.clone());

        assert!(ses.verify_email_identity("ada@example.com").await.is_success());
        assert_eq!(ses.list_identities().await.success().unwrap(), ["ada@example.com"]);
        assert!(ses.list_domains().await.success().unwrap().is_empty());

        let messages = collect.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("info:"));
    }

    #[tokio::test]
    async fn sender_policy_must_be_json() {
        let mock = Arc::new(MockSes::new());
        let ses = SesFacade::new(mock.clone());

        let outcome = ses
            .create_authorized_sender("example.com", "allow-app", "{not json")
            .await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(mock.call_count("put_identity_policy"), 0);

        let policy = r#"{"Version":"2012-10-17","Statement":[]}"#;
        assert!(
            ses.create_authorized_sender("example.com", "allow-app", policy)
                .await
                .is_success()
        );
        assert_eq!(
            ses.list_authorized_senders("example.com").await.success().unwrap(),
            ["allow-app"]
        );
        let policies = ses
            .retrieve_policies_for_authorized_sender("example.com", &["allow-app".into()])
            .await
            .success()
            .unwrap();
        assert_eq!(policies["allow-app"], policy);
    }

    #[tokio::test]
    async fn failures_reach_the_reporter() {
        let collect = Arc::new(Collect::default());
        let mock = MockSes::new().failing(
            "list_templates",
            AwsError::provider("AccessDenied: User is not authorized to perform ses:ListTemplates"),
        );
        let ses = SesFacade::new(Arc::new(mock)).with_reporter(collect.clone());

        assert!(ses.list_templates().await.is_failure());
        assert_eq!(
            collect.0.lock().unwrap().as_slice(),
            ["error:provider:AccessDenied: User is not authorized to perform ses:ListTemplates"]
        );
    }
}
