// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
The one-shot capability probe.

Compute needs API 4.4 and a set of entry points older drivers lack. We probe once per
engine: the verdict, good or bad, is held for the engine's whole life. A failed probe
is never retried since the driver behind a live context does not grow new entry points.
*/

use crate::driver::Driver;

/// Oldest API version with compute dispatch and storage buffers.
const MIN_VERSION: (i32, i32) = (4, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SupportState {
    Uninitialized,
    Ready,
    Unsupported,
}

/// What a check call learned. [Support::FreshlyReady] appears exactly once, on the
/// probe that decided; callers use it to re-arm the error reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Support {
    FreshlyReady,
    Ready,
    Unsupported,
}

#[derive(Debug)]
pub(crate) struct SupportGate {
    state: SupportState,
}

impl SupportGate {
    pub(crate) fn new() -> Self {
        SupportGate {
            state: SupportState::Uninitialized,
        }
    }

    pub(crate) fn check(&mut self, driver: &mut impl Driver) -> Support {
        match self.state {
            SupportState::Ready => Support::Ready,
            SupportState::Unsupported => Support::Unsupported,
            SupportState::Uninitialized => {
                if !driver.load_entry_points() {
                    logwise::warn_sync!("Compute entry points are missing from this driver");
                    self.state = SupportState::Unsupported;
                    return Support::Unsupported;
                }
                let (major, minor) = driver.version();
                // lexicographic, so 5.0 passes a 4.4 floor
                if (major, minor) < MIN_VERSION {
                    logwise::warn_sync!(
                        "Driver API {major}.{minor} is too old for compute",
                        major = major,
                        minor = minor
                    );
                    self.state = SupportState::Unsupported;
                    return Support::Unsupported;
                }
                logwise::info_sync!(
                    "Compute ready on API {major}.{minor}",
                    major = major,
                    minor = minor
                );
                self.state = SupportState::Ready;
                Support::FreshlyReady
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDriver;

    #[test]
    fn first_pass_is_fresh_and_later_passes_are_not() {
        let mut driver = MockDriver::new();
        let mut gate = SupportGate::new();
        assert_eq!(gate.check(&mut driver), Support::FreshlyReady);
        assert_eq!(gate.check(&mut driver), Support::Ready);
    }

    #[test]
    fn missing_entry_points_fail_the_probe() {
        let mut driver = MockDriver::new();
        driver.deny_entry_points();
        let mut gate = SupportGate::new();
        assert_eq!(gate.check(&mut driver), Support::Unsupported);
    }

    #[test]
    fn version_floor_is_lexicographic() {
        for (version, expect) in [
            ((4, 3), Support::Unsupported),
            ((3, 9), Support::Unsupported),
            ((4, 4), Support::FreshlyReady),
            ((4, 6), Support::FreshlyReady),
            ((5, 0), Support::FreshlyReady),
        ] {
            let mut driver = MockDriver::new();
            driver.set_version(version);
            assert_eq!(SupportGate::new().check(&mut driver), expect, "{version:?}");
        }
    }

    #[test]
    fn a_failed_probe_is_never_retried() {
        let mut driver = MockDriver::new();
        driver.set_version((4, 3));
        let mut gate = SupportGate::new();
        assert_eq!(gate.check(&mut driver), Support::Unsupported);

        driver.set_version((4, 6));
        assert_eq!(gate.check(&mut driver), Support::Unsupported);
    }
}
