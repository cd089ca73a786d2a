//! Typed AWS client facade for Stratus.
//!
//! Wraps three AWS services behind small, uniform facades:
//!
//! - **S3**: buckets, object upload, bucket ACL and CORS configuration
//! - **SES**: email templates, templated sending, identities, receipt
//!   filters and rules, quota and statistics, sending authorization
//! - **SNS**: topics, topic attributes, subscriptions, publishing
//!
//! Every facade operation returns an [`Outcome`]: either the unwrapped
//! payload or a failure carrying an [`ErrorKind`] and the provider's message.
//! Facades never panic and never retry on their own; the SDK's own retry
//! policy applies underneath.
//!
//! Clients are created lazily and shared through a [`ClientFactory`], one per
//! service. A [`ModelMap`] can substitute the constructor for any service,
//! which is how the in-memory clients in [`mock`] are wired into tests.
//!
//! ```no_run
//! use stratus_aws::config::{Configuration, RawConfig};
//! use stratus_aws::{ClientFactory, Outcome};
//!
//! # async fn example() {
//! let raw = RawConfig::default()
//!     .overlay_env(|name| std::env::var(name).ok())
//!     .or_default_region();
//! let factory = ClientFactory::new(Configuration::resolve(raw).unwrap());
//!
//! if let Outcome::Success(sns) = factory.sns().await {
//!     let topics = sns.list_topics().await;
//!     println!("{topics:?}");
//! }
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod factory;
pub mod mock;
pub mod outcome;
pub mod report;
pub mod s3;
pub mod ses;
pub mod sns;

// Re-exports for convenience.
pub use config::{ConfigError, Configuration, RawConfig};
pub use error::{AwsError, ErrorKind};
pub use factory::{ClientConstructor, ClientFactory, ModelMap, Service, ServiceClient};
pub use outcome::{Ack, Outcome};
pub use report::{Notice, OutcomeReporter, TracingReporter};
pub use s3::S3Facade;
pub use ses::SesFacade;
pub use sns::SnsFacade;
