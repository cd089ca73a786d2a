//! Lazily constructed, shared service clients.
//!
//! A [`ClientFactory`] owns one [`tokio::sync::OnceCell`] per service.
//! Concurrent first callers all await the same initialization, so each
//! service client (and its connection pool) is built at most once; later
//! calls return the cached handle. A failed construction leaves the cell
//! empty and the next call tries again.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument};

use crate::auth::build_sdk_config;
use crate::config::Configuration;
use crate::error::AwsError;
use crate::outcome::Outcome;
use crate::s3::{S3Api, S3Facade, SdkS3Client};
use crate::ses::{SdkSesClient, SesApi, SesFacade};
use crate::sns::{SdkSnsClient, SnsApi, SnsFacade};

static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,}(-[a-z0-9]+)*-[0-9]+$").expect("region regex is valid")
});

/// An AWS service this crate wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    S3,
    Ses,
    Sns,
}

impl Service {
    pub const ALL: [Self; 3] = [Self::S3, Self::Ses, Self::Sns];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Ses => "ses",
            Self::Sns => "sns",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A constructed, shareable service client.
#[derive(Debug, Clone)]
pub enum ServiceClient {
    S3(Arc<dyn S3Api>),
    Ses(Arc<dyn SesApi>),
    Sns(Arc<dyn SnsApi>),
}

impl ServiceClient {
    pub fn service(&self) -> Service {
        match self {
            Self::S3(_) => Service::S3,
            Self::Ses(_) => Service::Ses,
            Self::Sns(_) => Service::Sns,
        }
    }

    /// Whether both handles point at the same client instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::S3(a), Self::S3(b)) => Arc::ptr_eq(a, b),
            (Self::Ses(a), Self::Ses(b)) => Arc::ptr_eq(a, b),
            (Self::Sns(a), Self::Sns(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn into_s3(self) -> Option<Arc<dyn S3Api>> {
        match self {
            Self::S3(client) => Some(client),
            _ => None,
        }
    }

    pub fn into_ses(self) -> Option<Arc<dyn SesApi>> {
        match self {
            Self::Ses(client) => Some(client),
            _ => None,
        }
    }

    pub fn into_sns(self) -> Option<Arc<dyn SnsApi>> {
        match self {
            Self::Sns(client) => Some(client),
            _ => None,
        }
    }
}

/// Builds the client for one service.
#[async_trait]
pub trait ClientConstructor: Send + Sync {
    async fn construct(
        &self,
        service: Service,
        config: &Configuration,
    ) -> Result<ServiceClient, AwsError>;
}

/// Default constructor: SDK-backed clients sharing one loaded `SdkConfig`.
#[derive(Debug, Default)]
pub struct SdkConstructor {
    sdk_config: OnceCell<aws_config::SdkConfig>,
}

impl SdkConstructor {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_region(region: &str) -> Result<(), AwsError> {
    if REGION_RE.is_match(region) {
        Ok(())
    } else {
        Err(AwsError::Client(format!("malformed region '{region}'")))
    }
}

#[async_trait]
impl ClientConstructor for SdkConstructor {
    async fn construct(
        &self,
        service: Service,
        config: &Configuration,
    ) -> Result<ServiceClient, AwsError> {
        check_region(config.region())?;
        let sdk_config = self
            .sdk_config
            .get_or_init(|| build_sdk_config(config))
            .await;
        Ok(match service {
            Service::S3 => ServiceClient::S3(Arc::new(SdkS3Client::new(sdk_config))),
            Service::Ses => ServiceClient::Ses(Arc::new(SdkSesClient::new(sdk_config))),
            Service::Sns => ServiceClient::Sns(Arc::new(SdkSnsClient::new(sdk_config))),
        })
    }
}

/// Constructor that hands out a pre-built client.
struct Instance(ServiceClient);

#[async_trait]
impl ClientConstructor for Instance {
    async fn construct(
        &self,
        _service: Service,
        _config: &Configuration,
    ) -> Result<ServiceClient, AwsError> {
        Ok(self.0.clone())
    }
}

/// Per-service constructor overrides.
///
/// Services without an entry use the factory's [`SdkConstructor`].
#[derive(Clone, Default)]
pub struct ModelMap {
    overrides: HashMap<Service, Arc<dyn ClientConstructor>>,
}

impl fmt::Debug for ModelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<_> = self.overrides.keys().map(|s| s.as_str()).collect();
        services.sort_unstable();
        f.debug_struct("ModelMap")
            .field("overrides", &services)
            .finish()
    }
}

impl ModelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `constructor` for `service`.
    #[must_use]
    pub fn with(mut self, service: Service, constructor: Arc<dyn ClientConstructor>) -> Self {
        self.overrides.insert(service, constructor);
        self
    }

    /// Always hand out `client` for its service.
    #[must_use]
    pub fn with_instance(self, client: ServiceClient) -> Self {
        let service = client.service();
        self.with(service, Arc::new(Instance(client)))
    }

    pub fn get(&self, service: Service) -> Option<&Arc<dyn ClientConstructor>> {
        self.overrides.get(&service)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Creates and caches one client per service for a [`Configuration`].
pub struct ClientFactory {
    config: Configuration,
    model_map: ModelMap,
    default_constructor: Arc<dyn ClientConstructor>,
    s3: OnceCell<ServiceClient>,
    ses: OnceCell<ServiceClient>,
    sns: OnceCell<ServiceClient>,
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("config", &self.config)
            .field("model_map", &self.model_map)
            .field("s3", &self.s3.initialized())
            .field("ses", &self.ses.initialized())
            .field("sns", &self.sns.initialized())
            .finish_non_exhaustive()
    }
}

impl ClientFactory {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            model_map: ModelMap::default(),
            default_constructor: Arc::new(SdkConstructor::new()),
            s3: OnceCell::new(),
            ses: OnceCell::new(),
            sns: OnceCell::new(),
        }
    }

    /// Substitute constructors per service.
    #[must_use]
    pub fn with_model_map(mut self, model_map: ModelMap) -> Self {
        self.model_map = model_map;
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    fn cell(&self, service: Service) -> &OnceCell<ServiceClient> {
        match service {
            Service::S3 => &self.s3,
            Service::Ses => &self.ses,
            Service::Sns => &self.sns,
        }
    }

    /// The cached client for `service`, constructing it on first use.
    #[instrument(skip(self), fields(service = %service))]
    pub async fn get_client(&self, service: Service) -> Outcome<ServiceClient> {
        let result = self
            .cell(service)
            .get_or_try_init(|| self.construct(service))
            .await;
        match result {
            Ok(client) => Outcome::Success(client.clone()),
            Err(err) => {
                error!(error = %err, "AWS client construction failed");
                Outcome::failure(&err)
            }
        }
    }

    async fn construct(&self, service: Service) -> Result<ServiceClient, AwsError> {
        let (constructor, overridden) = match self.model_map.get(service) {
            Some(constructor) => (constructor, true),
            None => (&self.default_constructor, false),
        };
        info!(overridden, region = %self.config.region(), "constructing AWS client");

        let client = constructor
            .construct(service, &self.config)
            .await
            .map_err(|err| match err {
                AwsError::Client(_) => err,
                other => AwsError::Client(other.to_string()),
            })?;

        if client.service() != service {
            return Err(AwsError::Client(format!(
                "constructor for {service} returned a {} client",
                client.service()
            )));
        }
        debug!("AWS client cached");
        Ok(client)
    }

    async fn typed<T>(&self, service: Service, pick: fn(ServiceClient) -> Option<T>) -> Outcome<T> {
        match self.get_client(service).await {
            Outcome::Success(client) => match pick(client) {
                Some(client) => Outcome::Success(client),
                None => Outcome::failure(&AwsError::Client(format!(
                    "cached {service} client has the wrong type"
                ))),
            },
            Outcome::Failure { kind, message } => Outcome::Failure { kind, message },
        }
    }

    /// S3 facade over the cached S3 client.
    pub async fn s3(&self) -> Outcome<S3Facade> {
        self.typed(Service::S3, ServiceClient::into_s3)
            .await
            .map(S3Facade::new)
    }

    /// SES facade over the cached SES client.
    pub async fn ses(&self) -> Outcome<SesFacade> {
        self.typed(Service::Ses, ServiceClient::into_ses)
            .await
            .map(SesFacade::new)
    }

    /// SNS facade over the cached SNS client.
    pub async fn sns(&self) -> Outcome<SnsFacade> {
        self.typed(Service::Sns, ServiceClient::into_sns)
            .await
            .map(SnsFacade::new)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::config::RawConfig;
    use crate::error::ErrorKind;
    use crate::mock::{MockS3, MockSes, MockSns};

    fn config(region: &str) -> Configuration {
        Configuration::resolve(RawConfig {
            access_key: Some("AKIATEST".into()),
            secret_key: Some(SecretString::new("secret".into())),
            region: Some(region.into()),
            ..RawConfig::default()
        })
        .unwrap()
    }

    /// Counts constructions and yields while building, so concurrent callers
    /// overlap.
    #[derive(Default)]
    struct Counting {
        built: AtomicUsize,
    }

    #[async_trait]
    impl ClientConstructor for Counting {
        async fn construct(
            &self,
            service: Service,
            _config: &Configuration,
        ) -> Result<ServiceClient, AwsError> {
            self.built.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(match service {
                Service::S3 => ServiceClient::S3(Arc::new(MockS3::new())),
                Service::Ses => ServiceClient::Ses(Arc::new(MockSes::new())),
                Service::Sns => ServiceClient::Sns(Arc::new(MockSns::default())),
            })
        }
    }

    /// Fails the first attempt, then succeeds.
    #[derive(Default)]
    struct Flaky {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ClientConstructor for Flaky {
        async fn construct(
            &self,
            _service: Service,
            _config: &Configuration,
        ) -> Result<ServiceClient, AwsError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AwsError::provider("dispatch failure: connection refused"));
            }
            Ok(ServiceClient::S3(Arc::new(MockS3::new())))
        }
    }

    fn counting_factory(counting: &Arc<Counting>) -> ClientFactory {
        let map = Service::ALL.iter().fold(ModelMap::new(), |map, service| {
            map.with(*service, counting.clone() as Arc<dyn ClientConstructor>)
        });
        ClientFactory::new(config("eu-west-1")).with_model_map(map)
    }

    #[tokio::test]
    async fn get_client_returns_same_instance() {
        let counting = Arc::new(Counting::default());
        let factory = counting_factory(&counting);

        let first = factory.get_client(Service::S3).await.success().unwrap();
        let second = factory.get_client(Service::S3).await.success().unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(counting.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_one_construction() {
        let counting = Arc::new(Counting::default());
        let factory = Arc::new(counting_factory(&counting));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let factory = Arc::clone(&factory);
                tokio::spawn(async move { factory.get_client(Service::Sns).await })
            })
            .collect();

        let mut clients = Vec::new();
        for handle in handles {
            clients.push(handle.await.unwrap().success().unwrap());
        }

        assert_eq!(counting.built.load(Ordering::SeqCst), 1);
        assert!(clients.iter().all(|c| c.ptr_eq(&clients[0])));
    }

    #[tokio::test]
    async fn services_are_cached_independently() {
        let counting = Arc::new(Counting::default());
        let factory = counting_factory(&counting);

        let s3 = factory.get_client(Service::S3).await.success().unwrap();
        let ses = factory.get_client(Service::Ses).await.success().unwrap();

        assert_eq!(s3.service(), Service::S3);
        assert_eq!(ses.service(), Service::Ses);
        assert!(!s3.ptr_eq(&ses));
        assert_eq!(counting.built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_region_is_client_error() {
        let factory = ClientFactory::new(config("Europe West"));
        let outcome = factory.get_client(Service::S3).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Client));
        assert!(outcome.error_message().unwrap().contains("Europe West"));
    }

    #[tokio::test]
    async fn wrong_variant_is_client_error() {
        let map = ModelMap::new().with(
            Service::Ses,
            Arc::new(Instance(ServiceClient::S3(Arc::new(MockS3::new())))),
        );
        let factory = ClientFactory::new(config("eu-west-1")).with_model_map(map);
        let outcome = factory.ses().await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Client));
    }

    #[tokio::test]
    async fn failed_construction_can_be_retried() {
        let map = ModelMap::new().with(Service::S3, Arc::new(Flaky::default()));
        let factory = ClientFactory::new(config("eu-west-1")).with_model_map(map);

        let first = factory.get_client(Service::S3).await;
        assert_eq!(first.error_kind(), Some(ErrorKind::Client));

        let second = factory.get_client(Service::S3).await;
        assert!(second.is_success());
    }

    #[tokio::test]
    async fn with_instance_hands_out_the_mock() {
        let mock = Arc::new(MockS3::new().with_bucket("assets"));
        let map = ModelMap::new().with_instance(ServiceClient::S3(mock.clone()));
        let factory = ClientFactory::new(config("eu-west-1")).with_model_map(map);

        let s3 = factory.s3().await.success().unwrap();
        let buckets = s3.list_buckets().await.success().unwrap();

        assert_eq!(buckets[0].name, "assets");
        assert_eq!(mock.call_count("list_buckets"), 1);
    }

    #[test]
    fn region_pattern() {
        for ok in [
            "eu-west-1",
            "us-east-1",
            "us-gov-west-1",
            "ap-southeast-3",
            "eusc-de-east-1",
        ] {
            assert!(check_region(ok).is_ok(), "{ok}");
        }
        for bad in ["", "EU-WEST-1", "eu-west", "eu_west_1", "Europe West", "eu-west-1 "] {
            assert!(check_region(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn model_map_debug_lists_services() {
        let map = ModelMap::new().with_instance(ServiceClient::Sns(Arc::new(MockSns::default())));
        assert_eq!(format!("{map:?}"), r#"ModelMap { overrides: ["sns"] }"#);
        assert!(!map.is_empty());
    }
}
