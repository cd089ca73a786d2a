use async_trait::async_trait;
use tracing::{debug, info};

use super::{PENDING_CONFIRMATION, Protocol, SnsApi, Subscription, TopicAttributes};
use crate::error::{AwsError, classify_sdk_error};

/// [`SnsApi`] backed by `aws-sdk-sns`.
pub struct SdkSnsClient {
    client: aws_sdk_sns::Client,
}

impl std::fmt::Debug for SdkSnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkSnsClient")
            .field("client", &"<SnsClient>")
            .finish()
    }
}

impl SdkSnsClient {
    /// Build a client from a loaded SDK configuration.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_sns::Client::new(sdk_config),
        }
    }

    /// Wrap a pre-built client.
    pub fn with_client(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnsApi for SdkSnsClient {
    async fn create_topic(&self, name: &str) -> Result<String, AwsError> {
        let output = self
            .client
            .create_topic()
            .name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        let topic_arn = output.topic_arn().unwrap_or_default().to_owned();
        info!(topic_arn = %topic_arn, "SNS topic created");
        Ok(topic_arn)
    }

    async fn list_topics(&self) -> Result<Vec<String>, AwsError> {
        let mut topics = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_topics()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;
            topics.extend(
                output
                    .topics()
                    .iter()
                    .filter_map(|t| t.topic_arn().map(ToOwned::to_owned)),
            );
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }
        debug!(count = topics.len(), "listed SNS topics");
        Ok(topics)
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), AwsError> {
        self.client
            .delete_topic()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(topic_arn = %topic_arn, "SNS topic deleted");
        Ok(())
    }

    async fn get_topic_attributes(&self, topic_arn: &str) -> Result<TopicAttributes, AwsError> {
        let output = self
            .client
            .get_topic_attributes()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_topic_attributes(
        &self,
        topic_arn: &str,
        name: &str,
        value: &str,
    ) -> Result<(), AwsError> {
        self.client
            .set_topic_attributes()
            .topic_arn(topic_arn)
            .attribute_name(name)
            .attribute_value(value)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(topic_arn = %topic_arn, attribute = %name, "SNS topic attribute set");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: Protocol,
        endpoint: &str,
    ) -> Result<String, AwsError> {
        debug!(topic_arn = %topic_arn, protocol = %protocol, "subscribing endpoint to SNS topic");
        let output = self
            .client
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(protocol.as_str())
            .endpoint(endpoint)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        let subscription_arn = output
            .subscription_arn()
            .unwrap_or(PENDING_CONFIRMATION)
            .to_owned();
        info!(subscription_arn = %subscription_arn, "SNS subscription requested");
        Ok(subscription_arn)
    }

    async fn confirm_subscription(&self, topic_arn: &str, token: &str) -> Result<String, AwsError> {
        let output = self
            .client
            .confirm_subscription()
            .topic_arn(topic_arn)
            .token(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        let subscription_arn = output.subscription_arn().unwrap_or_default().to_owned();
        info!(subscription_arn = %subscription_arn, "SNS subscription confirmed");
        Ok(subscription_arn)
    }

    async fn list_subscriptions_by_topic(&self, topic_arn: &str) -> Result<Vec<Subscription>, AwsError> {
        let mut subscriptions = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_subscriptions_by_topic()
                .topic_arn(topic_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;
            subscriptions.extend(output.subscriptions().iter().map(|s| Subscription {
                arn: s.subscription_arn().unwrap_or(PENDING_CONFIRMATION).to_owned(),
                topic_arn: s.topic_arn().unwrap_or(topic_arn).to_owned(),
                protocol: s.protocol().unwrap_or_default().to_owned(),
                endpoint: s.endpoint().unwrap_or_default().to_owned(),
                owner: s.owner().map(ToOwned::to_owned),
            }));
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(subscriptions)
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), AwsError> {
        self.client
            .unsubscribe()
            .subscription_arn(subscription_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(subscription_arn = %subscription_arn, "SNS subscription removed");
        Ok(())
    }

    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, AwsError> {
        debug!(topic_arn = %topic_arn, "publishing to SNS topic");
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .set_subject(subject.map(ToOwned::to_owned))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        let message_id = output.message_id().unwrap_or("unknown").to_owned();
        info!(message_id = %message_id, topic_arn = %topic_arn, "SNS message published");
        Ok(message_id)
    }
}
