//! RAII child-process cleanup, killing the wrapped child on drop.
//! Process-group teardown via `libc::killpg` is not needed here: a worker
//! process is always a single leaf process with no children of its own, so
//! `Child::start_kill` is enough and stays portable across Unix and
//! Windows without an `unsafe` `libc` call.

/// Kills the wrapped child on drop unless [`ChildGuard::disarm`] was called
/// first. Guards against a sandbox caller being cancelled (or panicking)
/// while a worker is still running.
pub struct ChildGuard {
    child: Option<tokio::process::Child>,
}

impl ChildGuard {
    #[must_use]
    pub fn new(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    pub fn child_mut(&mut self) -> &mut tokio::process::Child {
        self.child.as_mut().expect("child present")
    }

    /// Prevent the drop handler from killing the process. Call this once
    /// the worker has exited and its result has been collected.
    pub fn disarm(&mut self) {
        self.child = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}
