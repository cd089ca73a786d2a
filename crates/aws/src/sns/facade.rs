use std::sync::Arc;

use tracing::instrument;

use super::{Protocol, SnsApi, Subscription, TopicAttributes};
use crate::error::{AwsError, require};
use crate::outcome::{Ack, Outcome};
use crate::report::{Notice, OutcomeReporter, ReportSink};

/// SNS topic, subscription, and publish operations returning [`Outcome`]s.
///
/// Topic and subscription ARNs are always explicit arguments.
#[derive(Debug, Clone)]
pub struct SnsFacade {
    client: Arc<dyn SnsApi>,
    sink: ReportSink,
}

impl SnsFacade {
    pub fn new(client: Arc<dyn SnsApi>) -> Self {
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
    pub fn client(&self) -> &Arc<dyn SnsApi> {
        &self.client
    }

    /// Create (or look up, if it already exists) a topic; returns its ARN.
    #[instrument(skip(self), fields(service = "sns"))]
    pub async fn create_topic(&self, name: &str) -> Outcome<String> {
        let result: Result<_, AwsError> = async {
            require("topic name", name)?;
            self.client.create_topic(name).await
        }
        .await;
        self.sink.settle(
            "create_topic",
            result,
            Some(Notice::new("SNS Topic {0} added correctly").param(name)),
        )
    }

    #[instrument(skip(self), fields(service = "sns"))]
    pub async fn list_topics(&self) -> Outcome<Vec<String>> {
        let result = self.client.list_topics().await;
        self.sink.settle("list_topics", result, None)
    }

    #[instrument(skip(self), fields(service = "sns"))]
    pub async fn delete_topic(&self, topic_arn: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("topic ARN", topic_arn)?;
            self.client.delete_topic(topic_arn).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "delete_topic",
            result,
            Some(Notice::new("SNS Topic {0} deleted correctly").param(topic_arn)),
        )
    }

    #[instrument(skip(self), fields(service = "sns"))]
    pub async fn get_topic_attributes(&self, topic_arn: &str) -> Outcome<TopicAttributes> {
        let result: Result<_, AwsError> = async {
            require("topic ARN", topic_arn)?;
            self.client.get_topic_attributes(topic_arn).await
        }
        .await;
        self.sink.settle("get_topic_attributes", result, None)
    }

    /// Set one attribute (`DisplayName`, `Policy`, `DeliveryPolicy`, ...).
    /// An empty `value` clears the attribute.
    #[instrument(skip(self, value), fields(service = "sns"))]
    pub async fn set_topic_attributes(&self, name: &str, value: &str, topic_arn: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("attribute name", name)?;
            require("topic ARN", topic_arn)?;
            self.client
                .set_topic_attributes(topic_arn, name, value)
                .await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "set_topic_attributes",
            result,
            Some(Notice::new("SNS Topic Attribute {0} set correctly").param(name)),
        )
    }

    /// Subscribe `endpoint` to a topic. Returns the subscription ARN, or
    /// `"pending confirmation"` until the endpoint confirms.
    #[instrument(skip(self), fields(service = "sns"))]
    pub async fn subscribe(&self, protocol: Protocol, endpoint: &str, topic_arn: &str) -> Outcome<String> {
        let result: Result<_, AwsError> = async {
            require("endpoint", endpoint)?;
            require("topic ARN", topic_arn)?;
            protocol.check_endpoint(endpoint)?;
            self.client.subscribe(topic_arn, protocol, endpoint).await
        }
        .await;
        self.sink.settle(
            "subscribe",
            result,
            Some(
                Notice::new("{0} subscribed correctly to {1}")
                    .param(endpoint)
                    .param(topic_arn),
            ),
        )
    }

    pub async fn subscribe_email(&self, address: &str, topic_arn: &str) -> Outcome<String> {
        self.subscribe(Protocol::Email, address, topic_arn).await
    }

    pub async fn subscribe_https(&self, url: &str, topic_arn: &str) -> Outcome<String> {
        self.subscribe(Protocol::Https, url, topic_arn).await
    }

    pub async fn subscribe_lambda(&self, function_arn: &str, topic_arn: &str) -> Outcome<String> {
        self.subscribe(Protocol::Lambda, function_arn, topic_arn).await
    }

    pub async fn subscribe_sms(&self, phone_number: &str, topic_arn: &str) -> Outcome<String> {
        self.subscribe(Protocol::Sms, phone_number, topic_arn).await
    }

    /// Confirm a pending subscription with the token SNS sent to the
    /// endpoint; returns the subscription ARN.
    #[instrument(skip(self, token), fields(service = "sns"))]
    pub async fn confirm_subscription(&self, token: &str, topic_arn: &str) -> Outcome<String> {
        let result: Result<_, AwsError> = async {
            require("confirmation token", token)?;
            require("topic ARN", topic_arn)?;
            self.client.confirm_subscription(topic_arn, token).await
        }
        .await;
        self.sink.settle(
            "confirm_subscription",
            result,
            Some(Notice::new("Subscription to {0} confirmed correctly").param(topic_arn)),
        )
    }

    #[instrument(skip(self), fields(service = "sns"))]
    pub async fn list_subscriptions_by_topic(&self, topic_arn: &str) -> Outcome<Vec<Subscription>> {
        let result: Result<_, AwsError> = async {
            require("topic ARN", topic_arn)?;
            self.client.list_subscriptions_by_topic(topic_arn).await
        }
        .await;
        self.sink.settle("list_subscriptions_by_topic", result, None)
    }

    #[instrument(skip(self), fields(service = "sns"))]
    pub async fn unsubscribe(&self, subscription_arn: &str) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("subscription ARN", subscription_arn)?;
            self.client.unsubscribe(subscription_arn).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "unsubscribe",
            result,
            Some(Notice::new("Subscription {0} removed correctly").param(subscription_arn)),
        )
    }

    /// Publish `message` to a topic; returns the message id.
    #[instrument(skip(self, message), fields(service = "sns"))]
    pub async fn publish(&self, topic_arn: &str, message: &str, subject: Option<&str>) -> Outcome<String> {
        let result: Result<_, AwsError> = async {
            require("topic ARN", topic_arn)?;
            require("message", message)?;
            self.client.publish(topic_arn, message, subject).await
        }
        .await;
        self.sink.settle(
            "publish",
            result,
            Some(Notice::new("Message published correctly to {0}").param(topic_arn)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::MockSns;
    use crate::sns::PENDING_CONFIRMATION;

    #[derive(Default)]
    struct Notices(Mutex<Vec<String>>);

    impl OutcomeReporter for Notices {
        fn success(&self, notice: &Notice) {
            self.0.lock().unwrap().push(notice.render());
        }

        fn info(&self, notice: &Notice) {
            self.0.lock().unwrap().push(notice.render());
        }

        fn error(&self, _kind: ErrorKind, message: &str) {
            self.0.lock().unwrap().push(message.to_owned());
        }
    }

    #[tokio::test]
    async fn create_topic_reports_notice() {
        let notices = Arc::new(Notices::default());
        let mock = Arc::new(MockSns::default());
        let sns = SnsFacade::new(mock.clone()).with_reporter(notices.clone());

        let arn = sns.create_topic("alerts").await.success().unwrap();

        assert_eq!(arn, mock.topic_arn("alerts"));
        assert_eq!(
            notices.0.lock().unwrap().as_slice(),
            ["SNS Topic alerts added correctly"]
        );
    }

    #[tokio::test]
    async fn email_subscription_is_pending_until_confirmed() {
        let mock = Arc::new(MockSns::default());
        let sns = SnsFacade::new(mock.clone());
        let topic = sns.create_topic("alerts").await.success().unwrap();

        let arn = sns
            .subscribe_email("ops@example.com", &topic)
            .await
            .success()
            .unwrap();
        assert_eq!(arn, PENDING_CONFIRMATION);

        let confirmed = sns
            .confirm_subscription("token-from-email", &topic)
            .await
            .success()
            .unwrap();
        assert!(confirmed.starts_with(&topic));

        let subs = sns.list_subscriptions_by_topic(&topic).await.success().unwrap();
        assert_eq!(subs.len(), 1);
        assert!(!subs[0].is_pending());

        assert!(sns.unsubscribe(&confirmed).await.is_success());
        assert!(
            sns.list_subscriptions_by_topic(&topic)
                .await
                .success()
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn bad_endpoint_is_rejected_locally() {
        let mock = Arc::new(MockSns::default());
        let sns = SnsFacade::new(mock.clone());

        let outcome = sns.subscribe_sms("not a number", "arn:aws:sns:eu-west-1:1:alerts").await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(mock.call_count("subscribe"), 0);
    }

    #[tokio::test]
    async fn publish_records_message() {
        let mock = Arc::new(MockSns::default());
        let sns = SnsFacade::new(mock.clone());
        let topic = sns.create_topic("deploys").await.success().unwrap();

        let id = sns
            .publish(&topic, "v1.2.0 is live", Some("Deploy"))
            .await
            .success()
            .unwrap();

        assert_eq!(id, "mock-message-1");
        let published = mock.published();
        assert_eq!(published[0].message, "v1.2.0 is live");
        assert_eq!(published[0].subject.as_deref(), Some("Deploy"));
    }

    #[tokio::test]
    async fn unknown_topic_fails_with_provider_message() {
        let sns = SnsFacade::new(Arc::new(MockSns::default()));
        let outcome = sns
            .publish("arn:aws:sns:eu-west-1:000000000000:missing", "hi", None)
            .await;
        assert_eq!(
            outcome,
            Outcome::Failure {
                kind: ErrorKind::Provider,
                message: "NotFound: Topic does not exist".into(),
            }
        );
    }

    #[tokio::test]
    async fn set_and_read_topic_attribute() {
        let sns = SnsFacade::new(Arc::new(MockSns::default()));
        let topic = sns.create_topic("alerts").await.success().unwrap();

        assert!(
            sns.set_topic_attributes("DisplayName", "Alerts", &topic)
                .await
                .is_success()
        );
        let attrs = sns.get_topic_attributes(&topic).await.success().unwrap();
        assert_eq!(attrs["DisplayName"], "Alerts");
    }

    #[tokio::test]
    async fn transient_failure_does_not_poison_facade() {
        let mock = MockSns::default().failing(
            "list_topics",
            AwsError::provider("Throttling: Rate exceeded"),
        );
        let sns = SnsFacade::new(Arc::new(mock));

        assert_eq!(sns.list_topics().await.error_kind(), Some(ErrorKind::Provider));
        assert!(sns.create_topic("alerts").await.is_success());
    }
}
