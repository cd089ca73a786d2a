use serde::Deserialize;
use stratus_aws::Service;

/// Dashboard visibility.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontendConfig {
    /// Dashboards answering 404, e.g. `["ses"]`.
    #[serde(default)]
    pub hidden: Vec<Service>,
}

impl FrontendConfig {
    pub fn is_hidden(&self, service: Service) -> bool {
        self.hidden.contains(&service)
    }
}
