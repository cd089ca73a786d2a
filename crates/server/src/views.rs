//! Dashboard templates rendered with minijinja.

use minijinja::Environment;
use serde::Serialize;
use stratus_aws::s3::BucketDescriptor;
use stratus_aws::{Configuration, Service};

use crate::error::ServerError;
use crate::flash::FlashMessage;

const TEMPLATES: [(&str, &str); 4] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("s3.html", include_str!("../templates/s3.html")),
    ("ses.html", include_str!("../templates/ses.html")),
    ("sns.html", include_str!("../templates/sns.html")),
];

/// What a dashboard shows about its service client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientHandle {
    pub service: Service,
    pub region: String,
    pub version: String,
    pub endpoint_url: Option<String>,
    /// Whether the client could be constructed.
    pub ready: bool,
}

impl ClientHandle {
    pub fn new(service: Service, config: &Configuration, ready: bool) -> Self {
        Self {
            service,
            region: config.region().to_owned(),
            version: config.version().to_owned(),
            endpoint_url: config.endpoint_url().map(ToOwned::to_owned),
            ready,
        }
    }
}

/// Everything a dashboard page renders.
#[derive(Debug, Serialize)]
pub struct DashboardPage {
    pub nav: Vec<Service>,
    pub client: ClientHandle,
    pub flashes: Vec<FlashMessage>,
    /// S3 only.
    pub buckets: Vec<BucketDescriptor>,
}

/// Compiled dashboard templates.
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, ServerError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render the dashboard of `service`.
    pub fn dashboard(&self, service: Service, page: &DashboardPage) -> Result<String, ServerError> {
        let template = self.env.get_template(&format!("{service}.html"))?;
        Ok(template.render(page)?)
    }
}
