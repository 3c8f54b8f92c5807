use crate::mock::Times;
use log::debug;

/// A report detailing what the expectations of a mock were and how many matching requests
/// it actually saw while the transport was stubbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// The registration, e.g. `GET https://example.com/users`.
    pub key: String,
    /// What users specified.
    pub expected: Times,
    /// Requests the mock answered.
    pub invoked: u64,
    /// Matching requests passed through because the mock was already exhausted.
    pub exceeded: u64,
}

impl VerificationReport {
    /// Every matching request, answered or passed through.
    pub fn actual(&self) -> u64 {
        self.invoked + self.exceeded
    }

    pub fn is_satisfied(&self) -> bool {
        self.exceeded == 0 && self.expected.is_satisfied_by(self.invoked)
    }

    pub fn error_message(&self) -> String {
        format!(
            "Expected {} with {} times, but got {} times",
            self.key,
            self.expected,
            self.actual()
        )
    }
}

/// Receives the unmet expectations found when a transport is unstubbed.
///
/// It is only invoked when at least one expectation failed, with all of them at once.
/// Closures taking a `&[VerificationReport]` implement `Reporter` out of the box.
pub trait Reporter: Send + Sync {
    fn report(&self, failures: &[VerificationReport]);
}

impl<F> Reporter for F
where
    F: Fn(&[VerificationReport]),
    F: Send + Sync,
{
    fn report(&self, failures: &[VerificationReport]) {
        self(failures)
    }
}

/// Fails the current test by panicking with every unmet expectation.
///
/// If the thread is already panicking the report is logged instead, so the original
/// failure is not masked by an abort.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicReporter;

impl Reporter for PanicReporter {
    fn report(&self, failures: &[VerificationReport]) {
        let verifications_errors: String = failures
            .iter()
            .map(|report| format!("- {}\n", report.error_message()))
            .collect();
        let error_message = format!("Verifications failed:\n{}", verifications_errors);
        if std::thread::panicking() {
            debug!("{}", &error_message);
        } else {
            panic!("{}", &error_message);
        }
    }
}
