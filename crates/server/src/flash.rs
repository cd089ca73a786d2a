//! Per-request flash messages fed by facade outcomes.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use stratus_aws::{ErrorKind, Notice, OutcomeReporter};

use crate::i18n::Translator;

/// Translation domain of facade notices.
pub const AWS_DOMAIN: &str = "aws";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

/// Collects translated notices for one request.
///
/// Attached to a facade with `with_reporter`; the view drains it with
/// [`FlashBag::take`] when rendering.
#[derive(Debug)]
pub struct FlashBag {
    translator: Arc<Translator>,
    messages: Mutex<Vec<FlashMessage>>,
}

impl FlashBag {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self {
            translator,
            messages: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, level: FlashLevel, text: String) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FlashMessage { level, text });
    }

    fn translate(&self, notice: &Notice) -> String {
        self.translator
            .t(AWS_DOMAIN, notice.message, &notice.params)
    }

    /// Drain the collected messages in arrival order.
    pub fn take(&self) -> Vec<FlashMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl OutcomeReporter for FlashBag {
    fn success(&self, notice: &Notice) {
        self.push(FlashLevel::Success, self.translate(notice));
    }

    fn info(&self, notice: &Notice) {
        self.push(FlashLevel::Info, self.translate(notice));
    }

    /// Provider messages are shown verbatim.
    fn error(&self, _kind: ErrorKind, message: &str) {
        self.push(FlashLevel::Error, message.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn notices_are_translated_errors_are_not() {
        let overrides = HashMap::from([(
            "S3 Bucket {0} created correctly".to_owned(),
            "Bucket {0} listo".to_owned(),
        )]);
        let translator = Translator::new(HashMap::from([(AWS_DOMAIN.to_owned(), overrides)]));
        let bag = FlashBag::new(Arc::new(translator));

        bag.success(&Notice::new("S3 Bucket {0} created correctly").param("assets"));
        bag.error(ErrorKind::Provider, "AccessDenied: Access Denied");

        assert_eq!(
            bag.take(),
            [
                FlashMessage {
                    level: FlashLevel::Success,
                    text: "Bucket assets listo".into(),
                },
                FlashMessage {
                    level: FlashLevel::Error,
                    text: "AccessDenied: Access Denied".into(),
                },
            ]
        );
        assert!(bag.take().is_empty());
    }
}
