use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    AccessControlPolicy, BucketCannedAcl, BucketLocationConstraint, CorsConfiguration,
    CreateBucketConfiguration, Permission, Type,
};
use chrono::DateTime;
use tracing::{debug, info};

use super::{
    AclParams, AclPolicy, AclSource, BucketDescriptor, CorsRule, CorsRules, Grant, Grantee,
    GranteeKind, ObjectDescriptor, Owner, S3Api,
};
use crate::error::{AwsError, classify_sdk_error};

/// The only region in which `CreateBucket` must not carry a location
/// constraint.
const US_EAST_1: &str = "us-east-1";

/// [`S3Api`] backed by `aws-sdk-s3`.
pub struct SdkS3Client {
    client: aws_sdk_s3::Client,
    region: String,
}

impl std::fmt::Debug for SdkS3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkS3Client")
            .field("region", &self.region)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl SdkS3Client {
    /// Build a client from a loaded SDK configuration.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        let region = sdk_config
            .region()
            .map(|r| r.as_ref().to_owned())
            .unwrap_or_default();
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
            region,
        }
    }

    /// Wrap a pre-built client.
    pub fn with_client(client: aws_sdk_s3::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

fn grantee_kind(kind: &Type) -> Option<GranteeKind> {
    match kind {
        Type::CanonicalUser => Some(GranteeKind::CanonicalUser),
        Type::Group => Some(GranteeKind::Group),
        Type::AmazonCustomerByEmail => Some(GranteeKind::AmazonCustomerByEmail),
        _ => None,
    }
}

fn sdk_grantee_type(kind: GranteeKind) -> Type {
    match kind {
        GranteeKind::CanonicalUser => Type::CanonicalUser,
        GranteeKind::Group => Type::Group,
        GranteeKind::AmazonCustomerByEmail => Type::AmazonCustomerByEmail,
    }
}

fn to_sdk_grant(grant: &Grant) -> Result<aws_sdk_s3::types::Grant, AwsError> {
    let grantee = aws_sdk_s3::types::Grantee::builder()
        .r#type(sdk_grantee_type(grant.grantee.kind))
        .set_id(grant.grantee.id.clone())
        .set_display_name(grant.grantee.display_name.clone())
        .set_email_address(grant.grantee.email.clone())
        .set_uri(grant.grantee.uri.clone())
        .build()
        .map_err(|e| AwsError::Validation(format!("invalid grantee: {e}")))?;

    Ok(aws_sdk_s3::types::Grant::builder()
        .grantee(grantee)
        .permission(Permission::from(grant.permission.as_str()))
        .build())
}

fn to_sdk_cors_rule(rule: &CorsRule) -> Result<aws_sdk_s3::types::CorsRule, AwsError> {
    aws_sdk_s3::types::CorsRule::builder()
        .set_id(rule.id.clone())
        .set_allowed_methods(Some(rule.allowed_methods.clone()))
        .set_allowed_origins(Some(rule.allowed_origins.clone()))
        .set_allowed_headers(Some(rule.allowed_headers.clone()))
        .set_expose_headers(Some(rule.expose_headers.clone()))
        .set_max_age_seconds(rule.max_age_seconds)
        .build()
        .map_err(|e| AwsError::Validation(format!("invalid CORS rule: {e}")))
}

#[async_trait]
impl S3Api for SdkS3Client {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>, AwsError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(output
            .buckets()
            .iter()
            .map(|bucket| BucketDescriptor {
                name: bucket.name().unwrap_or_default().to_owned(),
                created_at: bucket
                    .creation_date()
                    .and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos())),
                location: None,
            })
            .collect())
    }

    async fn create_bucket(&self, name: &str) -> Result<BucketDescriptor, AwsError> {
        let mut request = self.client.create_bucket().bucket(name);
        if self.region != US_EAST_1 {
            debug!(bucket = %name, region = %self.region, "setting bucket location constraint");
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        let output = request.send().await.map_err(|e| classify_sdk_error(&e))?;
        info!(bucket = %name, "S3 bucket created");

        Ok(BucketDescriptor {
            name: name.to_owned(),
            created_at: None,
            location: output.location().map(ToOwned::to_owned),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
    ) -> Result<ObjectDescriptor, AwsError> {
        let body = ByteStream::from_path(source).await.map_err(|e| {
            AwsError::Validation(format!("cannot read {}: {e}", source.display()))
        })?;

        debug!(bucket = %bucket, key = %key, source = %source.display(), "uploading object to S3");
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(bucket = %bucket, key = %key, "S3 object uploaded");

        Ok(ObjectDescriptor {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag: output.e_tag().map(ToOwned::to_owned),
            version_id: output.version_id().map(ToOwned::to_owned),
        })
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<AclPolicy, AwsError> {
        let output = self
            .client
            .get_bucket_acl()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let owner = output.owner().map(|o| Owner {
            id: o.id().map(ToOwned::to_owned),
            display_name: o.display_name().map(ToOwned::to_owned),
        });

        let grants = output
            .grants()
            .iter()
            .filter_map(|grant| {
                let grantee = grant.grantee()?;
                Some(Grant {
                    grantee: Grantee {
                        kind: grantee_kind(grantee.r#type())?,
                        id: grantee.id().map(ToOwned::to_owned),
                        display_name: grantee.display_name().map(ToOwned::to_owned),
                        email: grantee.email_address().map(ToOwned::to_owned),
                        uri: grantee.uri().map(ToOwned::to_owned),
                    },
                    permission: grant
                        .permission()
                        .map(|p| p.as_str().to_owned())
                        .unwrap_or_default(),
                })
            })
            .collect();

        Ok(AclPolicy { owner, grants })
    }

    async fn put_bucket_acl(&self, params: &AclParams) -> Result<(), AwsError> {
        let mut request = self.client.put_bucket_acl().bucket(&params.bucket);

        match &params.acl {
            AclSource::Canned(acl) => {
                request = request.acl(BucketCannedAcl::from(acl.as_str()));
            }
            AclSource::Policy(policy) => {
                let grants = policy
                    .grants
                    .iter()
                    .map(to_sdk_grant)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut builder = AccessControlPolicy::builder().set_grants(Some(grants));
                if let Some(owner) = &policy.owner {
                    builder = builder.owner(
                        aws_sdk_s3::types::Owner::builder()
                            .set_id(owner.id.clone())
                            .set_display_name(owner.display_name.clone())
                            .build(),
                    );
                }
                request = request.access_control_policy(builder.build());
            }
        }

        request.send().await.map_err(|e| classify_sdk_error(&e))?;
        info!(bucket = %params.bucket, "S3 bucket ACL updated");
        Ok(())
    }

    async fn get_bucket_cors(&self, bucket: &str) -> Result<CorsRules, AwsError> {
        let output = self
            .client
            .get_bucket_cors()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(output
            .cors_rules()
            .iter()
            .map(|rule| CorsRule {
                id: rule.id().map(ToOwned::to_owned),
                allowed_methods: rule.allowed_methods().to_vec(),
                allowed_origins: rule.allowed_origins().to_vec(),
                allowed_headers: rule.allowed_headers().to_vec(),
                expose_headers: rule.expose_headers().to_vec(),
                max_age_seconds: rule.max_age_seconds(),
            })
            .collect())
    }

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<(), AwsError> {
        let rules = rules
            .iter()
            .map(to_sdk_cors_rule)
            .collect::<Result<Vec<_>, _>>()?;
        let configuration = CorsConfiguration::builder()
            .set_cors_rules(Some(rules))
            .build()
            .map_err(|e| AwsError::Validation(format!("invalid CORS configuration: {e}")))?;

        self.client
            .put_bucket_cors()
            .bucket(bucket)
            .cors_configuration(configuration)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        info!(bucket = %bucket, "S3 bucket CORS updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grantee_types_map_both_ways() {
        for kind in [
            GranteeKind::CanonicalUser,
            GranteeKind::Group,
            GranteeKind::AmazonCustomerByEmail,
        ] {
            assert_eq!(grantee_kind(&sdk_grantee_type(kind)), Some(kind));
        }
    }

    #[test]
    fn cors_rule_converts() {
        let rule = CorsRule {
            allowed_methods: vec!["GET".into()],
            allowed_origins: vec!["*".into()],
            max_age_seconds: Some(3000),
            ..CorsRule::default()
        };
        let sdk = to_sdk_cors_rule(&rule).unwrap();
        assert_eq!(sdk.allowed_methods(), ["GET"]);
        assert_eq!(sdk.max_age_seconds(), Some(3000));
    }

    #[test]
    fn grant_converts_with_permission() {
        let grant = Grant {
            grantee: Grantee::canonical_user("abc123"),
            permission: "READ".into(),
        };
        let sdk = to_sdk_grant(&grant).unwrap();
        assert_eq!(sdk.permission(), Some(&Permission::Read));
        assert_eq!(sdk.grantee().and_then(|g| g.id()), Some("abc123"));
    }
}
