//! Amazon S3: buckets, object upload, bucket ACLs and CORS.

mod facade;
mod sdk;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AwsError;

pub use facade::S3Facade;
pub use sdk::SdkS3Client;

/// A bucket as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDescriptor {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Location returned by `CreateBucket` (e.g. `"/my-bucket"` or a URL).
    pub location: Option<String>,
}

/// An uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// How a grantee is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GranteeKind {
    /// Identified by canonical user `id`.
    CanonicalUser,
    /// A predefined group, identified by `uri`.
    Group,
    /// Identified by `email`.
    AmazonCustomerByEmail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grantee {
    pub kind: GranteeKind,
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub uri: Option<String>,
}

impl Grantee {
    pub fn canonical_user(id: impl Into<String>) -> Self {
        Self {
            kind: GranteeKind::CanonicalUser,
            id: Some(id.into()),
            display_name: None,
            email: None,
            uri: None,
        }
    }

    pub fn group(uri: impl Into<String>) -> Self {
        Self {
            kind: GranteeKind::Group,
            id: None,
            display_name: None,
            email: None,
            uri: Some(uri.into()),
        }
    }

    /// The identifier the provider requires for this grantee's kind.
    pub fn identifier(&self) -> Option<&str> {
        match self.kind {
            GranteeKind::CanonicalUser => self.id.as_deref(),
            GranteeKind::Group => self.uri.as_deref(),
            GranteeKind::AmazonCustomerByEmail => self.email.as_deref(),
        }
    }
}

/// A single ACL grant. `permission` is one of `FULL_CONTROL`, `READ`,
/// `WRITE`, `READ_ACP`, `WRITE_ACP`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: String,
}

/// Bucket access control list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclPolicy {
    pub owner: Option<Owner>,
    pub grants: Vec<Grant>,
}

/// What to apply to a bucket ACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclSource {
    /// A canned ACL such as `"private"` or `"public-read"`.
    Canned(String),
    /// An explicit owner plus grants.
    Policy(AclPolicy),
}

/// Parameters for [`S3Facade::set_access_control_list_policy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclParams {
    pub bucket: String,
    pub acl: AclSource,
}

/// One CORS rule of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    pub id: Option<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
    pub max_age_seconds: Option<i32>,
}

/// The full CORS configuration of a bucket.
pub type CorsRules = Vec<CorsRule>;

/// Calls the S3 facade makes against the provider.
///
/// Implemented by [`SdkS3Client`] for the real service; tests and hosts can
/// substitute their own implementation through the client factory's model map.
#[async_trait]
pub trait S3Api: fmt::Debug + Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>, AwsError>;

    async fn create_bucket(&self, name: &str) -> Result<BucketDescriptor, AwsError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
    ) -> Result<ObjectDescriptor, AwsError>;

    async fn get_bucket_acl(&self, bucket: &str) -> Result<AclPolicy, AwsError>;

    async fn put_bucket_acl(&self, params: &AclParams) -> Result<(), AwsError>;

    async fn get_bucket_cors(&self, bucket: &str) -> Result<CorsRules, AwsError>;

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<(), AwsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grantee_identifier_follows_kind() {
        assert_eq!(Grantee::canonical_user("abc").identifier(), Some("abc"));
        assert_eq!(
            Grantee::group("http://acs.amazonaws.com/groups/global/AllUsers").identifier(),
            Some("http://acs.amazonaws.com/groups/global/AllUsers")
        );
        let mut by_email = Grantee::canonical_user("ignored");
        by_email.kind = GranteeKind::AmazonCustomerByEmail;
        assert_eq!(by_email.identifier(), None);
    }

    #[test]
    fn deserialize_cors_rule_defaults() {
        let rule: CorsRule = serde_json::from_value(serde_json::json!({
            "allowed_methods": ["GET"],
            "allowed_origins": ["https://example.com"]
        }))
        .unwrap();
        assert!(rule.allowed_headers.is_empty());
        assert!(rule.max_age_seconds.is_none());
    }

    #[test]
    fn deserialize_canned_acl_params() {
        let params: AclParams = serde_json::from_value(serde_json::json!({
            "bucket": "assets",
            "acl": { "canned": "public-read" }
        }))
        .unwrap();
        assert_eq!(params.acl, AclSource::Canned("public-read".into()));
    }
}
