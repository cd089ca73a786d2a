use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_ses::error::BuildError;
use aws_sdk_ses::types::{
    AddHeaderAction, BounceAction, Destination, IdentityType, LambdaAction, ReceiptFilterPolicy,
    ReceiptIpFilter, S3Action, SnsAction, StopAction, StopScope, Template,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{
    EmailTemplate, FilterPolicy, IdentityKind, ReceiptAction, ReceiptFilter, ReceiptRule,
    ReceiptRuleSet, ReceiptRuleSetMetadata, SendDataPoint, SendQuota, SesApi, TemplateMetadata,
    TemplatedEmailRequest, TlsPolicy,
};
use crate::error::{AwsError, classify_sdk_error};

/// [`SesApi`] backed by `aws-sdk-ses`.
pub struct SdkSesClient {
    client: aws_sdk_ses::Client,
}

impl std::fmt::Debug for SdkSesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkSesClient")
            .field("client", &"<SesClient>")
            .finish()
    }
}

impl SdkSesClient {
    /// Build a client from a loaded SDK configuration.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ses::Client::new(sdk_config),
        }
    }

    /// Wrap a pre-built client.
    pub fn with_client(client: aws_sdk_ses::Client) -> Self {
        Self { client }
    }
}

/// Accepts SDK members generated either bare or as `Option`.
fn present<T>(member: impl Into<Option<T>>) -> Option<T> {
    member.into()
}

fn to_utc(dt: &aws_sdk_ses::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn invalid(what: &'static str) -> impl Fn(BuildError) -> AwsError {
    move |e| AwsError::Validation(format!("invalid {what}: {e}"))
}

fn to_sdk_template(template: &EmailTemplate) -> Result<Template, AwsError> {
    Template::builder()
        .template_name(&template.name)
        .set_subject_part(template.subject.clone())
        .set_html_part(template.html.clone())
        .set_text_part(template.text.clone())
        .build()
        .map_err(invalid("template"))
}

fn to_sdk_action(action: &ReceiptAction) -> Result<aws_sdk_ses::types::ReceiptAction, AwsError> {
    let builder = aws_sdk_ses::types::ReceiptAction::builder();
    let builder = match action {
        ReceiptAction::S3 {
            bucket,
            prefix,
            topic_arn,
        } => builder.s3_action(
            S3Action::builder()
                .bucket_name(bucket)
                .set_object_key_prefix(prefix.clone())
                .set_topic_arn(topic_arn.clone())
                .build()
                .map_err(invalid("S3 action"))?,
        ),
        ReceiptAction::Sns { topic_arn } => builder.sns_action(
            SnsAction::builder()
                .topic_arn(topic_arn)
                .build()
                .map_err(invalid("SNS action"))?,
        ),
        ReceiptAction::Lambda {
            function_arn,
            topic_arn,
        } => builder.lambda_action(
            LambdaAction::builder()
                .function_arn(function_arn)
                .set_topic_arn(topic_arn.clone())
                .build()
                .map_err(invalid("Lambda action"))?,
        ),
        ReceiptAction::Bounce {
            smtp_reply_code,
            message,
            sender,
            status_code,
            topic_arn,
        } => builder.bounce_action(
            BounceAction::builder()
                .smtp_reply_code(smtp_reply_code)
                .message(message)
                .sender(sender)
                .set_status_code(status_code.clone())
                .set_topic_arn(topic_arn.clone())
                .build()
                .map_err(invalid("bounce action"))?,
        ),
        ReceiptAction::AddHeader { name, value } => builder.add_header_action(
            AddHeaderAction::builder()
                .header_name(name)
                .header_value(value)
                .build()
                .map_err(invalid("add-header action"))?,
        ),
        ReceiptAction::Stop { topic_arn } => builder.stop_action(
            StopAction::builder()
                .scope(StopScope::RuleSet)
                .set_topic_arn(topic_arn.clone())
                .build()
                .map_err(invalid("stop action"))?,
        ),
    };
    Ok(builder.build())
}

/// Actions this crate does not model (e.g. `WorkMail`) are skipped.
fn from_sdk_action(action: &aws_sdk_ses::types::ReceiptAction) -> Option<ReceiptAction> {
    if let Some(s3) = action.s3_action() {
        return Some(ReceiptAction::S3 {
            bucket: present::<&str>(s3.bucket_name())?.to_owned(),
            prefix: s3.object_key_prefix().map(ToOwned::to_owned),
            topic_arn: s3.topic_arn().map(ToOwned::to_owned),
        });
    }
    if let Some(sns) = action.sns_action() {
        return Some(ReceiptAction::Sns {
            topic_arn: present::<&str>(sns.topic_arn())?.to_owned(),
        });
    }
    if let Some(lambda) = action.lambda_action() {
        return Some(ReceiptAction::Lambda {
            function_arn: present::<&str>(lambda.function_arn())?.to_owned(),
            topic_arn: lambda.topic_arn().map(ToOwned::to_owned),
        });
    }
    if let Some(bounce) = action.bounce_action() {
        return Some(ReceiptAction::Bounce {
            smtp_reply_code: present::<&str>(bounce.smtp_reply_code())?.to_owned(),
            message: present::<&str>(bounce.message())?.to_owned(),
            sender: present::<&str>(bounce.sender())?.to_owned(),
            status_code: bounce.status_code().map(ToOwned::to_owned),
            topic_arn: bounce.topic_arn().map(ToOwned::to_owned),
        });
    }
    if let Some(header) = action.add_header_action() {
        return Some(ReceiptAction::AddHeader {
            name: present::<&str>(header.header_name())?.to_owned(),
            value: present::<&str>(header.header_value())?.to_owned(),
        });
    }
    action.stop_action().map(|stop| ReceiptAction::Stop {
        topic_arn: stop.topic_arn().map(ToOwned::to_owned),
    })
}

fn to_sdk_rule(rule: &ReceiptRule) -> Result<aws_sdk_ses::types::ReceiptRule, AwsError> {
    let actions = rule
        .actions
        .iter()
        .map(to_sdk_action)
        .collect::<Result<Vec<_>, _>>()?;
    let tls_policy = match rule.tls_policy {
        TlsPolicy::Optional => aws_sdk_ses::types::TlsPolicy::Optional,
        TlsPolicy::Require => aws_sdk_ses::types::TlsPolicy::Require,
    };
    aws_sdk_ses::types::ReceiptRule::builder()
        .name(&rule.name)
        .enabled(rule.enabled)
        .scan_enabled(rule.scan_enabled)
        .tls_policy(tls_policy)
        .set_recipients(Some(rule.recipients.clone()))
        .set_actions(Some(actions))
        .build()
        .map_err(invalid("receipt rule"))
}

fn from_sdk_rule(rule: &aws_sdk_ses::types::ReceiptRule) -> ReceiptRule {
    ReceiptRule {
        name: present::<&str>(rule.name()).unwrap_or_default().to_owned(),
        enabled: present::<bool>(rule.enabled()).unwrap_or_default(),
        scan_enabled: present::<bool>(rule.scan_enabled()).unwrap_or_default(),
        tls_policy: match rule.tls_policy() {
            Some(aws_sdk_ses::types::TlsPolicy::Require) => TlsPolicy::Require,
            _ => TlsPolicy::Optional,
        },
        recipients: rule.recipients().to_vec(),
        actions: rule.actions().iter().filter_map(from_sdk_action).collect(),
    }
}

fn from_sdk_filter(filter: &aws_sdk_ses::types::ReceiptFilter) -> Option<ReceiptFilter> {
    let ip_filter = present::<&ReceiptIpFilter>(filter.ip_filter())?;
    let policy = match present::<&ReceiptFilterPolicy>(ip_filter.policy())? {
        ReceiptFilterPolicy::Allow => FilterPolicy::Allow,
        _ => FilterPolicy::Block,
    };
    Some(ReceiptFilter {
        name: present::<&str>(filter.name())?.to_owned(),
        policy,
        cidr: present::<&str>(ip_filter.cidr())?.to_owned(),
    })
}

fn rule_set_metadata(meta: &aws_sdk_ses::types::ReceiptRuleSetMetadata) -> ReceiptRuleSetMetadata {
    ReceiptRuleSetMetadata {
        name: meta.name().unwrap_or_default().to_owned(),
        created_at: meta.created_timestamp().and_then(to_utc),
    }
}

#[async_trait]
impl SesApi for SdkSesClient {
    async fn create_template(&self, template: &EmailTemplate) -> Result<(), AwsError> {
        self.client
            .create_template()
            .template(to_sdk_template(template)?)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(template = %template.name, "SES template created");
        Ok(())
    }

    async fn get_template(&self, name: &str) -> Result<EmailTemplate, AwsError> {
        let output = self
            .client
            .get_template()
            .template_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let template = output
            .template()
            .ok_or_else(|| AwsError::provider(format!("TemplateDoesNotExist: {name}")))?;
        Ok(EmailTemplate {
            name: present::<&str>(template.template_name())
                .unwrap_or(name)
                .to_owned(),
            subject: template.subject_part().map(ToOwned::to_owned),
            html: template.html_part().map(ToOwned::to_owned),
            text: template.text_part().map(ToOwned::to_owned),
        })
    }

    async fn update_template(&self, template: &EmailTemplate) -> Result<(), AwsError> {
        self.client
            .update_template()
            .template(to_sdk_template(template)?)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(template = %template.name, "SES template updated");
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> Result<(), AwsError> {
        self.client
            .delete_template()
            .template_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(template = %name, "SES template deleted");
        Ok(())
    }

    async fn list_templates(&self) -> Result<Vec<TemplateMetadata>, AwsError> {
        let mut templates = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_templates()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;
            templates.extend(output.templates_metadata().iter().map(|meta| TemplateMetadata {
                name: meta.name().unwrap_or_default().to_owned(),
                created_at: meta.created_timestamp().and_then(to_utc),
            }));
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(templates)
    }

    async fn send_templated_email(&self, email: &TemplatedEmailRequest) -> Result<String, AwsError> {
        debug!(
            template = %email.template,
            recipients = email.recipients.len(),
            "sending templated email via SES"
        );
        let destination = Destination::builder()
            .set_to_addresses(Some(email.recipients.clone()))
            .build();
        let output = self
            .client
            .send_templated_email()
            .source(&email.sender)
            .destination(destination)
            .set_reply_to_addresses(Some(email.reply_to.clone()))
            .template(&email.template)
            .template_data(&email.template_data)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let message_id = present::<&str>(output.message_id())
            .unwrap_or_default()
            .to_owned();
        info!(message_id = %message_id, "SES templated email sent");
        Ok(message_id)
    }

    async fn verify_email_identity(&self, email: &str) -> Result<(), AwsError> {
        self.client
            .verify_email_identity()
            .email_address(email)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn verify_domain_identity(&self, domain: &str) -> Result<String, AwsError> {
        let output = self
            .client
            .verify_domain_identity()
            .domain(domain)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(present::<&str>(output.verification_token())
            .unwrap_or_default()
            .to_owned())
    }

    async fn delete_identity(&self, identity: &str) -> Result<(), AwsError> {
        self.client
            .delete_identity()
            .identity(identity)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(identity = %identity, "SES identity deleted");
        Ok(())
    }

    async fn list_identities(&self, kind: IdentityKind) -> Result<Vec<String>, AwsError> {
        let identity_type = match kind {
            IdentityKind::EmailAddress => IdentityType::EmailAddress,
            IdentityKind::Domain => IdentityType::Domain,
        };
        let mut identities = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_identities()
                .identity_type(identity_type.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;
            identities.extend_from_slice(output.identities());
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(identities)
    }

    async fn create_receipt_filter(&self, filter: &ReceiptFilter) -> Result<(), AwsError> {
        let policy = match filter.policy {
            FilterPolicy::Allow => ReceiptFilterPolicy::Allow,
            FilterPolicy::Block => ReceiptFilterPolicy::Block,
        };
        let ip_filter = ReceiptIpFilter::builder()
            .policy(policy)
            .cidr(&filter.cidr)
            .build()
            .map_err(invalid("IP filter"))?;
        let sdk_filter = aws_sdk_ses::types::ReceiptFilter::builder()
            .name(&filter.name)
            .ip_filter(ip_filter)
            .build()
            .map_err(invalid("receipt filter"))?;

        self.client
            .create_receipt_filter()
            .filter(sdk_filter)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(filter = %filter.name, cidr = %filter.cidr, "SES receipt filter created");
        Ok(())
    }

    async fn list_receipt_filters(&self) -> Result<Vec<ReceiptFilter>, AwsError> {
        let output = self
            .client
            .list_receipt_filters()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output.filters().iter().filter_map(from_sdk_filter).collect())
    }

    async fn delete_receipt_filter(&self, name: &str) -> Result<(), AwsError> {
        self.client
            .delete_receipt_filter()
            .filter_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn create_receipt_rule_set(&self, name: &str) -> Result<(), AwsError> {
        self.client
            .create_receipt_rule_set()
            .rule_set_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(rule_set = %name, "SES receipt rule set created");
        Ok(())
    }

    async fn create_receipt_rule(
        &self,
        rule_set: &str,
        rule: &ReceiptRule,
        after: Option<&str>,
    ) -> Result<(), AwsError> {
        self.client
            .create_receipt_rule()
            .rule_set_name(rule_set)
            .rule(to_sdk_rule(rule)?)
            .set_after(after.map(ToOwned::to_owned))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(rule_set = %rule_set, rule = %rule.name, "SES receipt rule created");
        Ok(())
    }

    async fn describe_receipt_rule_set(&self, name: &str) -> Result<ReceiptRuleSet, AwsError> {
        let output = self
            .client
            .describe_receipt_rule_set()
            .rule_set_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let metadata = output.metadata().map_or_else(
            || ReceiptRuleSetMetadata {
                name: name.to_owned(),
                created_at: None,
            },
            rule_set_metadata,
        );
        Ok(ReceiptRuleSet {
            metadata,
            rules: output.rules().iter().map(from_sdk_rule).collect(),
        })
    }

    async fn describe_receipt_rule(&self, rule_set: &str, rule: &str) -> Result<ReceiptRule, AwsError> {
        let output = self
            .client
            .describe_receipt_rule()
            .rule_set_name(rule_set)
            .rule_name(rule)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        output
            .rule()
            .map(from_sdk_rule)
            .ok_or_else(|| AwsError::provider(format!("RuleDoesNotExist: Rule does not exist: {rule}")))
    }

    async fn list_receipt_rule_sets(&self) -> Result<Vec<ReceiptRuleSetMetadata>, AwsError> {
        let mut rule_sets = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_receipt_rule_sets()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;
            rule_sets.extend(output.rule_sets().iter().map(rule_set_metadata));
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(rule_sets)
    }

    async fn update_receipt_rule(&self, rule_set: &str, rule: &ReceiptRule) -> Result<(), AwsError> {
        self.client
            .update_receipt_rule()
            .rule_set_name(rule_set)
            .rule(to_sdk_rule(rule)?)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(rule_set = %rule_set, rule = %rule.name, "SES receipt rule updated");
        Ok(())
    }

    async fn delete_receipt_rule_set(&self, name: &str) -> Result<(), AwsError> {
        self.client
            .delete_receipt_rule_set()
            .rule_set_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(rule_set = %name, "SES receipt rule set deleted");
        Ok(())
    }

    async fn delete_receipt_rule(&self, rule_set: &str, rule: &str) -> Result<(), AwsError> {
        self.client
            .delete_receipt_rule()
            .rule_set_name(rule_set)
            .rule_name(rule)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(rule_set = %rule_set, rule = %rule, "SES receipt rule deleted");
        Ok(())
    }

    async fn get_send_quota(&self) -> Result<SendQuota, AwsError> {
        let output = self
            .client
            .get_send_quota()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(SendQuota::new(
            present::<f64>(output.max24_hour_send()).unwrap_or_default(),
            present::<f64>(output.sent_last24_hours()).unwrap_or_default(),
            present::<f64>(output.max_send_rate()).unwrap_or_default(),
        ))
    }

    async fn get_send_statistics(&self) -> Result<Vec<SendDataPoint>, AwsError> {
        let output = self
            .client
            .get_send_statistics()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .send_data_points()
            .iter()
            .map(|point| SendDataPoint {
                timestamp: point.timestamp().and_then(to_utc),
                delivery_attempts: present::<i64>(point.delivery_attempts()).unwrap_or_default(),
                bounces: present::<i64>(point.bounces()).unwrap_or_default(),
                complaints: present::<i64>(point.complaints()).unwrap_or_default(),
                rejects: present::<i64>(point.rejects()).unwrap_or_default(),
            })
            .collect())
    }

    async fn put_identity_policy(
        &self,
        identity: &str,
        policy_name: &str,
        policy: &str,
    ) -> Result<(), AwsError> {
        self.client
            .put_identity_policy()
            .identity(identity)
            .policy_name(policy_name)
            .policy(policy)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(identity = %identity, policy = %policy_name, "SES sending authorization policy stored");
        Ok(())
    }

    async fn get_identity_policies(
        &self,
        identity: &str,
        policy_names: &[String],
    ) -> Result<BTreeMap<String, String>, AwsError> {
        let output = self
            .client
            .get_identity_policies()
            .identity(identity)
            .set_policy_names(Some(policy_names.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(present::<&HashMap<String, String>>(output.policies())
            .map(|policies| {
                policies
                    .iter()
                    .map(|(name, body)| (name.clone(), body.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_identity_policies(&self, identity: &str) -> Result<Vec<String>, AwsError> {
        let output = self
            .client
            .list_identity_policies()
            .identity(identity)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output.policy_names().to_vec())
    }

    async fn delete_identity_policy(&self, identity: &str, policy_name: &str) -> Result<(), AwsError> {
        self.client
            .delete_identity_policy()
            .identity(identity)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(identity = %identity, policy = %policy_name, "SES sending authorization policy revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> ReceiptRule {
        ReceiptRule {
            name: "store-inbound".into(),
            enabled: true,
            scan_enabled: true,
            tls_policy: TlsPolicy::Require,
            recipients: vec!["inbound.example.com".into()],
            actions: vec![
                ReceiptAction::S3 {
                    bucket: "mail-archive".into(),
                    prefix: Some("inbound/".into()),
                    topic_arn: None,
                },
                ReceiptAction::Stop { topic_arn: None },
            ],
        }
    }

    #[test]
    fn receipt_rule_survives_sdk_conversion() {
        let original = rule();
        let sdk = to_sdk_rule(&original).unwrap();
        assert_eq!(from_sdk_rule(&sdk), original);
    }

    #[test]
    fn template_parts_are_mapped() {
        let template = EmailTemplate {
            name: "welcome".into(),
            subject: Some("Hello {{name}}".into()),
            html: None,
            text: Some("Hi {{name}}".into()),
        };
        let sdk = to_sdk_template(&template).unwrap();
        assert_eq!(sdk.subject_part(), Some("Hello {{name}}"));
        assert_eq!(sdk.html_part(), None);
        assert_eq!(sdk.text_part(), Some("Hi {{name}}"));
    }

    #[test]
    fn bounce_action_converts() {
        let action = ReceiptAction::Bounce {
            smtp_reply_code: "550".into(),
            message: "Mailbox does not exist".into(),
            sender: "postmaster@example.com".into(),
            status_code: Some("5.1.1".into()),
            topic_arn: None,
        };
        let sdk = to_sdk_action(&action).unwrap();
        assert!(sdk.bounce_action().is_some());
        assert_eq!(from_sdk_action(&sdk), Some(action));
    }
}
