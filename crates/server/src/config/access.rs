use serde::Deserialize;

/// Who may open the AWS dashboards.
///
/// Roles are read from a request header set by the upstream host after it
/// authenticated the user; Stratus trusts that header as-is.
///
/// ```toml
/// [access]
/// aws_roles = ["admin", "ops"]
/// role_header = "x-user-roles"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// A caller needs at least one of these roles.
    #[serde(default = "default_aws_roles")]
    pub aws_roles: Vec<String>,
    /// Header carrying the caller's roles, comma separated.
    #[serde(default = "default_role_header")]
    pub role_header: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            aws_roles: default_aws_roles(),
            role_header: default_role_header(),
        }
    }
}

impl AccessConfig {
    /// Whether any role in the comma-separated `header_value` is allowed.
    pub fn allows(&self, header_value: &str) -> bool {
        header_value
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .any(|role| self.aws_roles.iter().any(|allowed| allowed == role))
    }
}

fn default_aws_roles() -> Vec<String> {
    vec!["admin".to_owned()]
}

fn default_role_header() -> String {
    "x-user-roles".to_owned()
}
