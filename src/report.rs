// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
Policy-gated failure delivery.

Everything fallible in this crate funnels through one [Reporter]. The host decides how
noisy that is: swallow failures, hear about the first one since startup, hear about all
of them, or treat any failure as fatal. Scripted hosts overwhelmingly want the default
[ErrorMode::ReportFirst] - a broken kernel tends to fail identically every frame, and
one message per root cause beats sixty per second.
*/

use std::fmt::Display;

/// How runtime failures reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Failures are swallowed.
    Ignore = 0,
    /// Only the first failure since startup (or since the support probe passed) is
    /// delivered. Later ones are dropped silently.
    #[default]
    ReportFirst = 1,
    /// Every failure is delivered.
    ReportAll = 2,
    /// Deliver the failure, then terminate the process. For fail-fast integration runs.
    Stop = 3,
}

impl ErrorMode {
    /// Maps the host's raw mode integer onto the enum. `None` for anything out of range.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ErrorMode::Ignore),
            1 => Some(ErrorMode::ReportFirst),
            2 => Some(ErrorMode::ReportAll),
            3 => Some(ErrorMode::Stop),
            _ => None,
        }
    }
}

/// Where delivered messages land. Hosts usually forward these to their script-visible
/// error channel.
///
/// Blanket-implemented for closures, so `|message: &str| ...` works anywhere a sink is
/// expected.
pub trait DiagnosticSink {
    fn deliver(&mut self, message: &str);
}

impl<F: FnMut(&str)> DiagnosticSink for F {
    fn deliver(&mut self, message: &str) {
        self(message)
    }
}

pub(crate) struct Reporter {
    mode: ErrorMode,
    /// Sticky since the last [Reporter::reset]; gates [ErrorMode::ReportFirst].
    reported: bool,
    sink: Box<dyn DiagnosticSink>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("mode", &self.mode)
            .field("reported", &self.reported)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    pub(crate) fn new(sink: impl DiagnosticSink + 'static) -> Self {
        Reporter {
            mode: ErrorMode::default(),
            reported: false,
            sink: Box::new(sink),
        }
    }

    pub(crate) fn set_mode(&mut self, mode: ErrorMode) {
        self.mode = mode;
    }

    /// Clears the already-reported flag. Called exactly once, when the support probe
    /// freshly passes.
    pub(crate) fn reset(&mut self) {
        self.reported = false;
    }

    /// Route one failure through the current policy.
    pub(crate) fn report(&mut self, failure: impl Display) {
        match self.mode {
            ErrorMode::Ignore => return,
            ErrorMode::ReportFirst if self.reported => return,
            _ => {}
        }
        self.reported = true;
        let message = failure.to_string();
        self.sink.deliver(&message);
        if self.mode == ErrorMode::Stop {
            stop_now();
        }
    }
}

/// The single termination point for [ErrorMode::Stop]. Nothing else in the crate exits.
fn stop_now() -> ! {
    std::process::exit(1)
}
