use std::path::Path;
use std::sync::Arc;

use tracing::instrument;

use super::{
    AclParams, AclPolicy, AclSource, BucketDescriptor, CorsRule, CorsRules, ObjectDescriptor,
    S3Api,
};
use crate::error::{AwsError, require};
use crate::outcome::{Ack, Outcome};
use crate::report::{Notice, OutcomeReporter, ReportSink};

const CORS_METHODS: [&str; 5] = ["GET", "PUT", "POST", "DELETE", "HEAD"];

/// S3 operations returning [`Outcome`]s.
///
/// Identifiers are validated locally; an empty bucket name or key never
/// reaches the provider.
#[derive(Debug, Clone)]
pub struct S3Facade {
    client: Arc<dyn S3Api>,
    sink: ReportSink,
}

impl S3Facade {
    pub fn new(client: Arc<dyn S3Api>) -> Self {
        Self {
            client,
            sink: ReportSink::default(),
        }
    }

    /// Forward notices and failures to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn OutcomeReporter>) -> Self {
        self.sink = ReportSink::new(reporter);
        self
    }

    /// The underlying client handle.
    pub fn client(&self) -> &Arc<dyn S3Api> {
        &self.client
    }

    #[instrument(skip(self), fields(service = "s3"))]
    pub async fn list_buckets(&self) -> Outcome<Vec<BucketDescriptor>> {
        let result = self.client.list_buckets().await;
        self.sink.settle("list_buckets", result, None)
    }

    #[instrument(skip(self), fields(service = "s3"))]
    pub async fn create_bucket(&self, name: &str) -> Outcome<BucketDescriptor> {
        let result: Result<_, AwsError> = async {
            require("bucket name", name)?;
            self.client.create_bucket(name).await
        }
        .await;
        self.sink.settle(
            "create_bucket",
            result,
            Some(Notice::new("S3 Bucket {0} created correctly").param(name)),
        )
    }

    /// Upload the file at `source` as `bucket/key`.
    #[instrument(skip(self), fields(service = "s3"))]
    pub async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> Outcome<ObjectDescriptor> {
        let result: Result<_, AwsError> = async {
            require("bucket name", bucket)?;
            require("object key", key)?;
            check_source(source).await?;
            self.client.put_object(bucket, key, source).await
        }
        .await;
        self.sink.settle(
            "put_object",
            result,
            Some(Notice::new("S3 Object {0} uploaded correctly to {1}").param(key).param(bucket)),
        )
    }

    #[instrument(skip(self), fields(service = "s3"))]
    pub async fn get_access_control_list_policy(&self, bucket: &str) -> Outcome<AclPolicy> {
        let result: Result<_, AwsError> = async {
            require("bucket name", bucket)?;
            self.client.get_bucket_acl(bucket).await
        }
        .await;
        self.sink.settle("get_access_control_list_policy", result, None)
    }

    #[instrument(skip(self), fields(service = "s3", bucket = %params.bucket))]
    pub async fn set_access_control_list_policy(&self, params: &AclParams) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            validate_acl(params)?;
            self.client.put_bucket_acl(params).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "set_access_control_list_policy",
            result,
            Some(Notice::new("S3 Bucket {0} ACL updated correctly").param(&params.bucket)),
        )
    }

    #[instrument(skip(self), fields(service = "s3"))]
    pub async fn get_cors_configuration(&self, bucket: &str) -> Outcome<CorsRules> {
        let result: Result<_, AwsError> = async {
            require("bucket name", bucket)?;
            self.client.get_bucket_cors(bucket).await
        }
        .await;
        self.sink.settle("get_cors_configuration", result, None)
    }

    #[instrument(skip(self, rules), fields(service = "s3", rules = rules.len()))]
    pub async fn set_cors_configuration(&self, bucket: &str, rules: &[CorsRule]) -> Outcome<Ack> {
        let result: Result<_, AwsError> = async {
            require("bucket name", bucket)?;
            validate_cors(rules)?;
            self.client.put_bucket_cors(bucket, rules).await?;
            Ok(Ack)
        }
        .await;
        self.sink.settle(
            "set_cors_configuration",
            result,
            Some(Notice::new("S3 Bucket {0} CORS configuration updated correctly").param(bucket)),
        )
    }
}

async fn check_source(source: &Path) -> Result<(), AwsError> {
    match tokio::fs::metadata(source).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(AwsError::Validation(format!(
            "{} is not a regular file",
            source.display()
        ))),
        Err(e) => Err(AwsError::Validation(format!(
            "cannot read {}: {e}",
            source.display()
        ))),
    }
}

fn validate_acl(params: &AclParams) -> Result<(), AwsError> {
    require("bucket name", &params.bucket)?;
    match &params.acl {
        AclSource::Canned(acl) => require("canned ACL", acl),
        AclSource::Policy(policy) => {
            for grant in &policy.grants {
                require("grant permission", &grant.permission)?;
                if grant.grantee.identifier().is_none_or(|id| id.trim().is_empty()) {
                    return Err(AwsError::Validation(format!(
                        "grantee of kind {:?} has no identifier",
                        grant.grantee.kind
                    )));
                }
            }
            Ok(())
        }
    }
}

fn validate_cors(rules: &[CorsRule]) -> Result<(), AwsError> {
    if rules.is_empty() {
        return Err(AwsError::Validation(
            "CORS configuration needs at least one rule".to_owned(),
        ));
    }
    for (index, rule) in rules.iter().enumerate() {
        if rule.allowed_methods.is_empty() || rule.allowed_origins.is_empty() {
            return Err(AwsError::Validation(format!(
                "CORS rule {index} needs at least one allowed method and origin"
            )));
        }
        if let Some(method) = rule
            .allowed_methods
            .iter()
            .find(|m| !CORS_METHODS.contains(&m.as_str()))
        {
            return Err(AwsError::Validation(format!(
                "CORS rule {index} has unsupported method '{method}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::MockS3;
    use crate::s3::{Grant, Grantee, GranteeKind};

    fn facade(mock: &Arc<MockS3>) -> S3Facade {
        S3Facade::new(mock.clone())
    }

    fn rule(methods: &[&str], origins: &[&str]) -> CorsRule {
        CorsRule {
            allowed_methods: methods.iter().map(|m| (*m).to_owned()).collect(),
            allowed_origins: origins.iter().map(|o| (*o).to_owned()).collect(),
            ..CorsRule::default()
        }
    }

    #[test]
    fn cors_requires_rules() {
        assert!(validate_cors(&[]).is_err());
    }

    #[test]
    fn cors_requires_method_and_origin() {
        let err = validate_cors(&[rule(&["GET"], &[])]).unwrap_err();
        assert!(err.to_string().contains("rule 0"));
        assert!(validate_cors(&[rule(&["GET", "PUT"], &["*"])]).is_ok());
    }

    #[test]
    fn cors_rejects_unknown_method() {
        let err = validate_cors(&[rule(&["GET"], &["*"]), rule(&["PATCH"], &["*"])]).unwrap_err();
        assert!(err.to_string().contains("'PATCH'"));
    }

    #[test]
    fn acl_policy_needs_grantee_identifier() {
        let params = AclParams {
            bucket: "assets".into(),
            acl: AclSource::Policy(AclPolicy {
                owner: None,
                grants: vec![Grant {
                    grantee: Grantee {
                        kind: GranteeKind::AmazonCustomerByEmail,
                        id: Some("abc".into()),
                        display_name: None,
                        email: None,
                        uri: None,
                    },
                    permission: "READ".into(),
                }],
            }),
        };
        assert!(matches!(validate_acl(&params), Err(AwsError::Validation(_))));
    }

    #[test]
    fn acl_canned_must_not_be_blank() {
        let params = AclParams {
            bucket: "assets".into(),
            acl: AclSource::Canned(" ".into()),
        };
        assert!(validate_acl(&params).is_err());
    }

    #[tokio::test]
    async fn missing_source_is_validation_error() {
        let err = check_source(Path::new("/definitely/not/here.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, AwsError::Validation(_)));
    }

    #[tokio::test]
    async fn directory_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_source(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[tokio::test]
    async fn empty_bucket_name_never_reaches_provider() {
        let mock = Arc::new(MockS3::new());
        let outcome = facade(&mock).create_bucket("").await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn create_then_list_buckets() {
        let mock = Arc::new(MockS3::new());
        let s3 = facade(&mock);

        let created = s3.create_bucket("reports").await.success().unwrap();
        assert_eq!(created.name, "reports");

        let names: Vec<_> = s3
            .list_buckets()
            .await
            .success()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, ["reports"]);
    }

    #[tokio::test]
    async fn provider_failure_is_passed_through_and_later_calls_work() {
        let mock = Arc::new(
            MockS3::new()
                .with_bucket("assets")
                .failing("get_bucket_cors", AwsError::provider("AccessDenied: Access Denied")),
        );
        let s3 = facade(&mock);

        let outcome = s3.get_cors_configuration("assets").await;
        assert_eq!(
            outcome,
            Outcome::Failure {
                kind: ErrorKind::Provider,
                message: "AccessDenied: Access Denied".into(),
            }
        );
        assert!(s3.list_buckets().await.is_success());
    }

    #[tokio::test]
    async fn create_bucket_auth_failure_keeps_facade_serving() {
        let mock = Arc::new(
            MockS3::new()
                .with_bucket("assets")
                .failing("create_bucket", AwsError::provider("AccessDenied: Access Denied")),
        );
        let s3 = facade(&mock);

        let outcome = s3.create_bucket("valid-name").await;
        assert_eq!(
            outcome,
            Outcome::Failure {
                kind: ErrorKind::Provider,
                message: "AccessDenied: Access Denied".into(),
            }
        );
        assert_eq!(mock.call_count("create_bucket"), 1);

        let names: Vec<String> = s3
            .list_buckets()
            .await
            .success()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["assets".to_owned()]);
    }

    #[tokio::test]
    async fn put_object_uploads_existing_file() {
        let mock = Arc::new(MockS3::new().with_bucket("assets"));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();

        let object = facade(&mock)
            .put_object("assets", "greeting.txt", file.path())
            .await
            .success()
            .unwrap();

        assert_eq!(object.key, "greeting.txt");
        assert_eq!(mock.objects().len(), 1);
    }

    #[tokio::test]
    async fn put_object_into_missing_bucket_fails() {
        let mock = Arc::new(MockS3::new());
        let file = tempfile::NamedTempFile::new().unwrap();

        let outcome = facade(&mock).put_object("nope", "k", file.path()).await;
        assert!(outcome.error_message().unwrap().starts_with("NoSuchBucket"));
    }

    #[tokio::test]
    async fn cors_round_trips_through_provider() {
        let mock = Arc::new(MockS3::new().with_bucket("assets"));
        let s3 = facade(&mock);
        let rules = vec![rule(&["GET"], &["https://example.com"])];

        assert!(s3.set_cors_configuration("assets", &rules).await.is_success());
        assert_eq!(s3.get_cors_configuration("assets").await.success(), Some(rules));
    }

    #[tokio::test]
    async fn invalid_cors_is_not_sent() {
        let mock = Arc::new(MockS3::new().with_bucket("assets"));
        let outcome = facade(&mock)
            .set_cors_configuration("assets", &[rule(&["TRACE"], &["*"])])
            .await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(mock.call_count("put_bucket_cors"), 0);
    }

    #[tokio::test]
    async fn acl_policy_is_stored() {
        let mock = Arc::new(MockS3::new().with_bucket("assets"));
        let s3 = facade(&mock);
        let policy = AclPolicy {
            owner: None,
            grants: vec![Grant {
                grantee: Grantee::canonical_user("abc123"),
                permission: "FULL_CONTROL".into(),
            }],
        };
        let params = AclParams {
            bucket: "assets".into(),
            acl: AclSource::Policy(policy.clone()),
        };

        assert!(s3.set_access_control_list_policy(&params).await.is_success());
        assert_eq!(
            s3.get_access_control_list_policy("assets").await.success(),
            Some(policy)
        );
    }
}
