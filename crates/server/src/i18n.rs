//! Message translation for flash notices.

use stratus_aws::report::interpolate;

use crate::config::TranslationsConfig;

/// Looks up message overrides by domain and fills positional parameters.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    domains: TranslationsConfig,
}

impl Translator {
    pub fn new(domains: TranslationsConfig) -> Self {
        Self { domains }
    }

    /// Translate `message` in `domain`, then substitute `{0}`, `{1}`, ...
    ///
    /// Unknown domains and messages fall back to the source message.
    pub fn t(&self, domain: &str, message: &str, params: &[String]) -> String {
        let template = self
            .domains
            .get(domain)
            .and_then(|messages| messages.get(message))
            .map_or(message, String::as_str);
        interpolate(template, params)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn translator() -> Translator {
        let mut aws = HashMap::new();
        aws.insert(
            "SNS Topic {0} added correctly".to_owned(),
            "Tema SNS {0} creado correctamente".to_owned(),
        );
        Translator::new(HashMap::from([("aws".to_owned(), aws)]))
    }

    #[test]
    fn translates_known_message() {
        let out = translator().t(
            "aws",
            "SNS Topic {0} added correctly",
            &["alerts".to_owned()],
        );
        assert_eq!(out, "Tema SNS alerts creado correctamente");
    }

    #[test]
    fn falls_back_to_source_message() {
        let t = translator();
        assert_eq!(
            t.t("aws", "SNS Topic {0} deleted correctly", &["alerts".to_owned()]),
            "SNS Topic alerts deleted correctly"
        );
        assert_eq!(t.t("other", "Hello {0}", &["Ada".to_owned()]), "Hello Ada");
    }
}
