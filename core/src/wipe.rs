//! Destructive wipe followed by process termination.
//!
//! The wipe walks every target in a [`WipePlan`], removes what it finds, and
//! then hands control to the host [`Terminator`]. Individual failures are
//! logged and recorded but never stop the walk, and termination happens no
//! matter how the walk went.
//!
//! Preserved paths (at minimum the credential store's backing file) are never
//! removed. A directory that contains a preserved path is emptied around it
//! instead of being deleted.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;

/// Exit status after a clean wipe.
pub const EXIT_CLEAN: i32 = 0;
/// Exit status when at least one step failed.
pub const EXIT_FAULT: i32 = 1;

const SCRUB_CHUNK: usize = 32;
const DATABASE_SIDECARS: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Host-provided process termination.
///
/// Production hosts exit the process; tests record the status instead.
pub trait Terminator: Send + Sync {
    fn terminate(&self, status: i32);
}

/// Ends the current process with the given status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, status: i32) {
        tracing::debug!(status, "Terminating process");
        std::process::exit(status);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipeTargetKind {
    /// Database files. A file target also takes its journal sidecars with it.
    Databases,
    Preferences,
    Files,
    Cache,
}

impl WipeTargetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WipeTargetKind::Databases => "databases",
            WipeTargetKind::Preferences => "preferences",
            WipeTargetKind::Files => "files",
            WipeTargetKind::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WipeTarget {
    pub kind: WipeTargetKind,
    pub path: PathBuf,
}

impl WipeTarget {
    #[must_use]
    pub fn new(kind: WipeTargetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// What the wipe destroys and what it must leave alone.
#[derive(Debug, Clone, Default)]
pub struct WipePlan {
    targets: Vec<WipeTarget>,
    preserve: Vec<PathBuf>,
    scrub_files: bool,
}

impl WipePlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn target(mut self, kind: WipeTargetKind, path: impl Into<PathBuf>) -> Self {
        self.targets.push(WipeTarget::new(kind, path));
        self
    }

    #[must_use]
    pub fn targets(mut self, targets: impl IntoIterator<Item = WipeTarget>) -> Self {
        self.targets.extend(targets);
        self
    }

    #[must_use]
    pub fn preserve(mut self, path: impl Into<PathBuf>) -> Self {
        self.preserve.push(path.into());
        self
    }

    /// Overwrite file contents with random bytes before unlinking.
    #[must_use]
    pub fn scrub_files(mut self, scrub: bool) -> Self {
        self.scrub_files = scrub;
        self
    }

    #[must_use]
    pub fn target_list(&self) -> &[WipeTarget] {
        &self.targets
    }

    #[must_use]
    pub fn preserved(&self) -> &[PathBuf] {
        &self.preserve
    }
}

#[derive(Debug)]
pub struct WipeFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

#[derive(Debug, Default)]
pub struct WipeReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<WipeFailure>,
}

impl WipeReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn exit_status(&self) -> i32 {
        if self.is_clean() { EXIT_CLEAN } else { EXIT_FAULT }
    }

    fn fail(&mut self, path: &Path, error: io::Error) {
        tracing::warn!(path = %path.display(), "Wipe step failed: {error}");
        self.failures.push(WipeFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

pub struct WipeExecutor {
    plan: WipePlan,
    terminator: Arc<dyn Terminator>,
}

impl std::fmt::Debug for WipeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WipeExecutor")
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl WipeExecutor {
    #[must_use]
    pub fn new(plan: WipePlan, terminator: Arc<dyn Terminator>) -> Self {
        Self { plan, terminator }
    }

    /// Destroy every target, then terminate.
    ///
    /// Returns only when the terminator does (never with [`ProcessExit`]).
    pub fn execute(&self) -> WipeReport {
        let report = self.wipe();
        tracing::info!(
            removed = report.removed.len(),
            failed = report.failures.len(),
            "Wipe finished"
        );
        self.terminator.terminate(report.exit_status());
        report
    }

    /// Run [`execute`](Self::execute) on a dedicated thread after `delay`.
    ///
    /// The delay gives the cover interface time to render its feedback. The
    /// thread does not belong to any async runtime, so shutting the runtime
    /// down cannot cancel a pending wipe. A panic inside the wipe still ends
    /// in termination, with [`EXIT_FAULT`].
    pub fn schedule(self: &Arc<Self>, delay: Duration) -> WipeHandle {
        let (done, rx) = watch::channel(None);
        let executor = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("covergate-wipe".to_string())
            .spawn(move || {
                thread::sleep(delay);
                done.send_replace(Some(executor.run_to_termination()));
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn wipe thread, wiping inline: {e}");
            let (_, done) = watch::channel(Some(self.run_to_termination()));
            return WipeHandle { done };
        }
        WipeHandle { done: rx }
    }

    fn run_to_termination(&self) -> i32 {
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute())) {
            Ok(report) => report.exit_status(),
            Err(_) => {
                tracing::error!("Wipe panicked");
                self.terminator.terminate(EXIT_FAULT);
                EXIT_FAULT
            }
        }
    }

    fn wipe(&self) -> WipeReport {
        let mut report = WipeReport::default();
        let preserved: Vec<PathBuf> = self.plan.preserve.iter().map(|p| normalize(p)).collect();

        for target in &self.plan.targets {
            tracing::debug!(kind = target.kind.as_str(), path = %target.path.display(), "Wiping target");
            let root = normalize(&target.path);
            self.remove(&root, &preserved, &mut report);

            if target.kind == WipeTargetKind::Databases {
                for suffix in DATABASE_SIDECARS {
                    let mut sidecar = root.clone().into_os_string();
                    sidecar.push(suffix);
                    self.remove(Path::new(&sidecar), &preserved, &mut report);
                }
            }
        }
        report
    }

    fn remove(&self, path: &Path, preserved: &[PathBuf], report: &mut WipeReport) {
        if preserved.iter().any(|p| p == path) {
            tracing::debug!(path = %path.display(), "Preserving path");
            return;
        }

        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => return report.fail(path, e),
        };

        if !meta.is_dir() {
            if self.plan.scrub_files
                && meta.is_file()
                && let Err(e) = scrub(path, meta.len())
            {
                report.fail(path, e);
            }
            match fs::remove_file(path) {
                Ok(()) => report.removed.push(path.to_path_buf()),
                Err(e) => report.fail(path, e),
            }
            return;
        }

        let holds_preserved = preserved.iter().any(|p| p.starts_with(path));
        if !holds_preserved && !self.plan.scrub_files {
            match fs::remove_dir_all(path) {
                Ok(()) => report.removed.push(path.to_path_buf()),
                Err(e) => report.fail(path, e),
            }
            return;
        }

        match fs::read_dir(path) {
            Ok(entries) => {
                for entry in entries {
                    match entry {
                        Ok(entry) => self.remove(&entry.path(), preserved, report),
                        Err(e) => report.fail(path, e),
                    }
                }
            }
            Err(e) => return report.fail(path, e),
        }

        if !holds_preserved {
            match fs::remove_dir(path) {
                Ok(()) => report.removed.push(path.to_path_buf()),
                Err(e) => report.fail(path, e),
            }
        }
    }
}

/// Completion of a scheduled wipe.
///
/// Dropping the handle does not affect the wipe.
#[derive(Debug, Clone)]
pub struct WipeHandle {
    done: watch::Receiver<Option<i32>>,
}

impl WipeHandle {
    /// Exit status handed to the terminator, once it has returned.
    #[must_use]
    pub fn status(&self) -> Option<i32> {
        *self.done.borrow()
    }

    /// Wait until the terminator has returned and yield the exit status.
    ///
    /// Yields `None` if the wipe thread went away without finishing.
    pub async fn finished(&mut self) -> Option<i32> {
        match self.done.wait_for(Option::is_some).await {
            Ok(status) => *status,
            Err(_) => None,
        }
    }
}

/// Resolve symlinked parents so preserved paths compare equal to walked ones.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map_or_else(|_| path.to_path_buf(), |parent| parent.join(name)),
        _ => path.to_path_buf(),
    }
}

/// Single pass of random bytes over the file's current length.
fn scrub(path: &Path, len: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    let mut remaining = len;
    while remaining > 0 {
        let chunk: [u8; SCRUB_CHUNK] = rand::random();
        let take = usize::try_from(remaining).map_or(SCRUB_CHUNK, |r| r.min(SCRUB_CHUNK));
        file.write_all(&chunk[..take])?;
        remaining -= take as u64;
    }
    file.sync_all()
}
