use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::config::{Configuration, CredentialSource};

const DEFAULT_SESSION_NAME: &str = "stratus-aws";

/// Build an AWS SDK configuration from a resolved [`Configuration`].
///
/// Applies, in order:
/// - explicit static credentials, or the named profile when one is set
/// - region and behaviour version
/// - the endpoint URL override for local development (e.g. `LocalStack`)
/// - connect/read/operation timeouts, handed to the SDK transport as-is
/// - an STS assume-role provider layered on top, when `role_arn` is set
///
/// # Examples
///
/// ```no_run
/// use stratus_aws::config::{Configuration, RawConfig};
/// use stratus_aws::auth::build_sdk_config;
///
/// # async fn example() {
/// let raw = RawConfig {
///     profile: Some("ops".into()),
///     region: Some("eu-west-1".into()),
///     ..RawConfig::default()
/// };
/// let config = Configuration::resolve(raw).unwrap();
/// let sdk_config = build_sdk_config(&config).await;
/// # }
/// ```
pub async fn build_sdk_config(config: &Configuration) -> aws_config::SdkConfig {
    if config.version() != crate::config::DEFAULT_VERSION {
        debug!(
            version = %config.version(),
            "explicit API version configured, SDK uses its latest behaviour version"
        );
    }

    let mut loader = base_loader(config);

    match config.credentials() {
        CredentialSource::Static {
            access_key,
            secret_key,
        } => {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.expose_secret().clone(),
                None,
                None,
                "stratus-static",
            ));
        }
        CredentialSource::Profile(profile) => {
            debug!(profile = %profile, "using named credential profile");
            loader = loader.profile_name(profile);
        }
    }

    let Some(role) = config.assume_role() else {
        return loader.load().await;
    };

    let session_name = role.session_name.as_deref().unwrap_or(DEFAULT_SESSION_NAME);
    info!(role_arn = %role.role_arn, session_name = %session_name, "assuming IAM role via STS (auto-refresh)");

    // The base config supplies the credentials STS is called with.
    let base_config = loader.load().await;

    let mut provider_builder = aws_config::sts::AssumeRoleProvider::builder(&role.role_arn)
        .session_name(session_name)
        .region(Region::new(config.region().to_owned()));

    if let Some(external_id) = &role.external_id {
        provider_builder = provider_builder.external_id(external_id);
    }

    let assume_role_provider = provider_builder.configure(&base_config).build().await;

    base_loader(config)
        .credentials_provider(assume_role_provider)
        .load()
        .await
}

/// Loader with region, endpoint and timeouts applied; credentials are left
/// to the caller.
fn base_loader(config: &Configuration) -> aws_config::ConfigLoader {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region().to_owned()));

    if let Some(endpoint) = config.endpoint_url() {
        debug!(endpoint = %endpoint, "using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    let timeouts = config.timeouts();
    if !timeouts.is_empty() {
        let mut builder = TimeoutConfig::builder();
        if let Some(connect) = timeouts.connect {
            builder = builder.connect_timeout(connect);
        }
        if let Some(read) = timeouts.read {
            builder = builder.read_timeout(read);
        }
        if let Some(operation) = timeouts.operation {
            builder = builder.operation_timeout(operation);
        }
        loader = loader.timeout_config(builder.build());
    }

    loader
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::RawConfig;

    // The SDK loads system root certificates on `load()`, so these only run
    // in integration mode.

    fn config(region: &str) -> Configuration {
        Configuration::resolve(RawConfig {
            access_key: Some("test".into()),
            secret_key: Some(SecretString::new("test".into())),
            region: Some(region.into()),
            endpoint_url: Some("http://localhost:4566".into()),
            ..RawConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn build_sdk_config_sets_region() {
        let sdk_config = build_sdk_config(&config("ap-northeast-1")).await;
        assert_eq!(
            sdk_config.region().map(|r| r.as_ref()),
            Some("ap-northeast-1")
        );
    }

    #[tokio::test]
    async fn build_sdk_config_sets_static_credentials() {
        let sdk_config = build_sdk_config(&config("eu-west-1")).await;
        assert!(sdk_config.credentials_provider().is_some());
    }
}
