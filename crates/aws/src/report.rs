//! Reporting facade outcomes to the host.
//!
//! Facades never decide presentation. After each call they hand a [`Notice`]
//! (on success of a mutating call) or the failure message to an optional
//! [`OutcomeReporter`]; a web host typically turns those into flash messages.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{AwsError, ErrorKind};
use crate::outcome::Outcome;

/// A user-facing message with positional `{0}`, `{1}`, ... parameters.
///
/// `message` is the untranslated source text; hosts may look it up in a
/// translation catalog before interpolating the parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: &'static str,
    pub params: Vec<String>,
}

impl Notice {
    pub fn new(message: &'static str) -> Self {
        Self {
            message,
            params: Vec::new(),
        }
    }

    /// Append a positional parameter.
    #[must_use]
    pub fn param(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Interpolate the parameters into the source message.
    pub fn render(&self) -> String {
        interpolate(self.message, &self.params)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Replace `{0}`, `{1}`, ... in `template` with the matching parameter.
///
/// Placeholders without a matching parameter are left untouched.
pub fn interpolate(template: &str, params: &[String]) -> String {
    let mut out = template.to_owned();
    for (i, value) in params.iter().enumerate() {
        out = out.replace(&format!("{{{i}}}"), value);
    }
    out
}

/// Receives the result of facade calls for presentation.
pub trait OutcomeReporter: Send + Sync {
    /// A mutating call succeeded.
    fn success(&self, notice: &Notice);

    /// Informational message.
    fn info(&self, notice: &Notice);

    /// A call failed.
    fn error(&self, kind: ErrorKind, message: &str);
}

/// Reporter that only writes log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl OutcomeReporter for TracingReporter {
    fn success(&self, notice: &Notice) {
        info!(notice = %notice, "success");
    }

    fn info(&self, notice: &Notice) {
        info!(notice = %notice, "info");
    }

    fn error(&self, kind: ErrorKind, message: &str) {
        error!(kind = %kind, error = %message, "failure");
    }
}

/// Shared settle logic used by every facade.
#[derive(Clone, Default)]
pub(crate) struct ReportSink {
    reporter: Option<Arc<dyn OutcomeReporter>>,
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSink")
            .field("attached", &self.reporter.is_some())
            .finish()
    }
}

impl ReportSink {
    pub(crate) fn new(reporter: Arc<dyn OutcomeReporter>) -> Self {
        Self {
            reporter: Some(reporter),
        }
    }

    /// Log, report, and wrap a call result.
    ///
    /// `notice` is only reported on success; read operations pass `None` and
    /// succeed silently.
    pub(crate) fn settle<T>(
        &self,
        operation: &'static str,
        result: Result<T, AwsError>,
        notice: Option<Notice>,
    ) -> Outcome<T> {
        self.settle_as(operation, result, notice, |reporter, notice| {
            reporter.success(notice);
        })
    }

    /// Like [`settle`](Self::settle), but the notice is informational
    /// (e.g. "verification email sent").
    pub(crate) fn settle_info<T>(
        &self,
        operation: &'static str,
        result: Result<T, AwsError>,
        notice: Notice,
    ) -> Outcome<T> {
        self.settle_as(operation, result, Some(notice), |reporter, notice| {
            reporter.info(notice);
        })
    }

    fn settle_as<T>(
        &self,
        operation: &'static str,
        result: Result<T, AwsError>,
        notice: Option<Notice>,
        report: impl FnOnce(&dyn OutcomeReporter, &Notice),
    ) -> Outcome<T> {
        match result {
            Ok(value) => {
                debug!(operation, "AWS call succeeded");
                if let (Some(reporter), Some(notice)) = (&self.reporter, notice) {
                    report(reporter.as_ref(), &notice);
                }
                Outcome::Success(value)
            }
            Err(err) => {
                if matches!(err, AwsError::Validation(_)) {
                    warn!(operation, error = %err, "AWS call rejected before sending");
                } else {
                    error!(operation, kind = %err.kind(), error = %err, "AWS call failed");
                }
                if let Some(reporter) = &self.reporter {
                    reporter.error(err.kind(), &err.to_string());
                }
                Outcome::failure(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl OutcomeReporter for Collect {
        fn success(&self, notice: &Notice) {
            self.0.lock().unwrap().push(format!("success:{notice}"));
        }

        fn info(&self, notice: &Notice) {
            self.0.lock().unwrap().push(format!("info:{notice}"));
        }

        fn error(&self, kind: ErrorKind, message: &str) {
            self.0.lock().unwrap().push(format!("error:{kind}:{message}"));
        }
    }

    #[test]
    fn interpolate_positional() {
        let out = interpolate(
            "SNS Topic {0} added to {1}",
            &["alerts".to_owned(), "eu-west-1".to_owned()],
        );
        assert_eq!(out, "SNS Topic alerts added to eu-west-1");
    }

    #[test]
    fn interpolate_leaves_unknown_placeholders() {
        assert_eq!(interpolate("{0} and {1}", &["a".to_owned()]), "a and {1}");
    }

    #[test]
    fn settle_reports_success_notice() {
        let collect = Arc::new(Collect::default());
        let sink = ReportSink::new(collect.clone());
        let outcome = sink.settle(
            "create_topic",
            Ok::<_, AwsError>("arn"),
            Some(Notice::new("SNS Topic {0} added correctly").param("alerts")),
        );
        assert!(outcome.is_success());
        assert_eq!(
            collect.0.lock().unwrap().as_slice(),
            ["success:SNS Topic alerts added correctly"]
        );
    }

    #[test]
    fn settle_is_silent_for_reads() {
        let collect = Arc::new(Collect::default());
        let sink = ReportSink::new(collect.clone());
        let _ = sink.settle("list_topics", Ok::<_, AwsError>(Vec::<String>::new()), None);
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[test]
    fn settle_reports_errors() {
        let collect = Arc::new(Collect::default());
        let sink = ReportSink::new(collect.clone());
        let outcome = sink.settle::<()>(
            "delete_topic",
            Err(AwsError::provider("NotFound: Topic does not exist")),
            Some(Notice::new("unused")),
        );
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Provider));
        assert_eq!(
            collect.0.lock().unwrap().as_slice(),
            ["error:provider:NotFound: Topic does not exist"]
        );
    }

    #[test]
    fn settle_info_uses_info_channel() {
        let collect = Arc::new(Collect::default());
        let sink = ReportSink::new(collect.clone());
        let _ = sink.settle_info(
            "verify_email_identity",
            Ok::<_, AwsError>(()),
            Notice::new("Verification email sent to {0}").param("a@x.com"),
        );
        assert_eq!(
            collect.0.lock().unwrap().as_slice(),
            ["info:Verification email sent to a@x.com"]
        );
    }

    #[test]
    fn detached_sink_still_wraps() {
        let sink = ReportSink::default();
        let outcome = sink.settle::<()>("x", Err(AwsError::Validation("bad".into())), None);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
    }
}
