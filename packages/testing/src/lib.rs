#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing the affinity packages.

use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs a test with a timeout to prevent infinite hangs.
///
/// This function wraps a test closure with a timeout mechanism. If the test
/// takes longer than the timeout to complete, the test fails instead of
/// hanging the CI/build system.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under
/// Miri, where thread synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog
/// is disabled and the test function is executed directly. This allows mutation
/// testing to properly detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     // Your test code here
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out.
        drop(tx.send(result));
    });

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("Test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("Test exceeded {timeout:?} timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("Test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// A live, idle child process that tests can inspect and reconfigure without affecting the
/// test process itself.
///
/// The child is killed and reaped when this value is dropped.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Starts a child process that sleeps until it is killed.
    ///
    /// # Panics
    ///
    /// Panics if the child process cannot be started.
    #[must_use]
    #[cfg(unix)]
    pub fn start_idle() -> Self {
        let child = Command::new("sleep")
            .arg("600")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to start idle child process");

        Self { child }
    }

    /// Starts a child process that waits until it is killed.
    ///
    /// # Panics
    ///
    /// Panics if the child process cannot be started.
    #[must_use]
    #[cfg(windows)]
    pub fn start_idle() -> Self {
        let child = Command::new("ping")
            .args(["-n", "600", "127.0.0.1"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to start idle child process");

        Self { child }
    }

    /// The process ID of the child.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Kills the child and waits for it to exit. Afterwards its process ID refers to no
    /// live process (until the operating system reuses it).
    ///
    /// # Panics
    ///
    /// Panics if the child cannot be killed.
    pub fn kill(mut self) -> u32 {
        let pid = self.pid();
        self.terminate();
        pid
    }

    fn terminate(&mut self) {
        // The child may already be gone, which is fine.
        drop(self.child.kill());
        self.child.wait().expect("failed to reap child process");
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.terminate();
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn watchdog_allows_fast_tests() {
        let result = with_watchdog(|| 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn watchdog_returns_correct_value() {
        let result = with_watchdog(|| "hello world");
        assert_eq!(result, "hello world");
    }

    #[cfg(any(unix, windows))]
    #[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
    #[test]
    fn child_process_lives_until_killed() {
        let child = ChildProcess::start_idle();
        let pid = child.pid();

        assert_ne!(pid, std::process::id());
        assert_eq!(child.kill(), pid);
    }
}
