use super::*;
use stratus_aws::Service;

#[test]
fn empty_file_uses_defaults() {
    let config: StratusConfig = toml::from_str("").unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.access.aws_roles, ["admin"]);
    assert_eq!(config.access.role_header, "x-user-roles");
    assert!(config.frontend.hidden.is_empty());
    assert!(config.translations.is_empty());
    assert!(!config.telemetry.enabled);
}

#[test]
fn full_file() {
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [aws]
        access_key = "AKIAEXAMPLE"
        secret_key = "wJalrXUtnFEMI"
        region = "us-east-1"
        endpoint_url = "http://localhost:4566"

        [access]
        aws_roles = ["admin", "ops"]
        role_header = "x-roles"

        [frontend]
        hidden = ["ses"]

        [translations.aws]
        "SNS Topic {0} added correctly" = "Tema SNS {0} creado correctamente"
    "#;

    let config: StratusConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.access.aws_roles, ["admin", "ops"]);
    assert!(config.frontend.is_hidden(Service::Ses));
    assert!(!config.frontend.is_hidden(Service::S3));
    assert_eq!(
        config.translations["aws"]["SNS Topic {0} added correctly"],
        "Tema SNS {0} creado correctamente"
    );

    let aws = config.aws_configuration_with(|_| None).unwrap();
    assert_eq!(aws.region(), "us-east-1");
    assert_eq!(aws.endpoint_url(), Some("http://localhost:4566"));
}

#[test]
fn unknown_dashboard_is_rejected() {
    let result: Result<StratusConfig, _> = toml::from_str(
        r#"
        [frontend]
        hidden = ["ec2"]
    "#,
    );
    assert!(result.is_err());
}

#[test]
fn region_defaults_and_environment_fills_keys() {
    let config: StratusConfig = toml::from_str("").unwrap();
    let aws = config
        .aws_configuration_with(|name| match name {
            "AWS_ACCESS_KEY_ID" => Some("AKIAENV".to_owned()),
            "AWS_SECRET_ACCESS_KEY" => Some("secret".to_owned()),
            _ => None,
        })
        .unwrap();
    assert_eq!(aws.region(), "eu-west-1");
    assert_eq!(aws.version(), "latest");
}

#[test]
fn missing_keys_are_fatal() {
    let config: StratusConfig = toml::from_str("").unwrap();
    let err = config.aws_configuration_with(|_| None).unwrap_err();
    assert_eq!(err, ConfigError::MissingAccessKey);
}

#[test]
fn roles_header_is_comma_separated() {
    let access = AccessConfig {
        aws_roles: vec!["admin".into(), "ops".into()],
        ..AccessConfig::default()
    };
    assert!(access.allows("viewer, ops"));
    assert!(access.allows("admin"));
    assert!(!access.allows("viewer"));
    assert!(!access.allows(""));
    assert!(!access.allows("administrator"));
}

#[test]
fn telemetry_section() {
    let toml = r#"
        [telemetry]
        enabled = true
        endpoint = "http://collector:4318"
        protocol = "http"
        sample_ratio = 0.25
    "#;

    let config: StratusConfig = toml::from_str(toml).unwrap();
    assert!(config.telemetry.enabled);
    assert_eq!(config.telemetry.service_name, "stratus");
    assert_eq!(config.telemetry.protocol, OtlpProtocol::Http);
    assert_eq!(config.telemetry.endpoint(), "http://collector:4318");
    assert!((config.telemetry.sample_ratio - 0.25).abs() < f64::EPSILON);
}

#[test]
fn telemetry_endpoint_follows_protocol() {
    let config: StratusConfig = toml::from_str("").unwrap();
    assert_eq!(config.telemetry.protocol, OtlpProtocol::Grpc);
    assert_eq!(config.telemetry.endpoint(), "http://localhost:4317");
    assert_eq!(config.telemetry.timeout().as_secs(), 10);

    let config: StratusConfig = toml::from_str(
        r#"
        [telemetry]
        protocol = "http"
    "#,
    )
    .unwrap();
    assert_eq!(config.telemetry.endpoint(), "http://localhost:4318/v1/traces");
}

#[test]
fn unknown_telemetry_protocol_is_rejected() {
    let result: Result<StratusConfig, _> = toml::from_str(
        r#"
        [telemetry]
        protocol = "zipkin"
    "#,
    );
    assert!(result.is_err());
}

#[test]
fn file_keys_win_over_env_profile() {
    let config: StratusConfig = toml::from_str(
        r#"
        [aws]
        access_key = "AKIAFILE"
        secret_key = "filesecret"
    "#,
    )
    .unwrap();
    let aws = config
        .aws_configuration_with(|name| (name == "AWS_PROFILE").then(|| "dev".to_owned()))
        .unwrap();
    assert!(matches!(
        aws.credentials(),
        stratus_aws::config::CredentialSource::Static { access_key, .. } if access_key == "AKIAFILE"
    ));
}
