//! Delayed removal of temporary export aliases.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

struct Pending {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct Tasks {
    next_generation: u64,
    pending: HashMap<PathBuf, Pending>,
}

fn lock(tasks: &Mutex<Tasks>) -> MutexGuard<'_, Tasks> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one timer task per path on a private single-worker runtime.
///
/// Scheduling a path again replaces its pending task, so a file is only
/// removed after the most recent request for it has timed out.
pub struct CleanupScheduler {
    runtime: Mutex<Option<Runtime>>,
    tasks: Arc<Mutex<Tasks>>,
}

impl CleanupScheduler {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("sampledrawer-cleanup")
            .enable_time()
            .build()?;
        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            tasks: Arc::new(Mutex::new(Tasks::default())),
        })
    }

    /// Remove `path` after `delay`, replacing any earlier request for it.
    pub fn schedule(&self, path: PathBuf, delay: Duration) {
        let runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(runtime) = runtime.as_ref() else {
            warn!(target: "library::cleanup", path = %path.display(), "Scheduler is shut down");
            return;
        };

        // The lock is held until the new entry is in place, so the task
        // cannot observe the map before it is registered.
        let mut tasks = lock(&self.tasks);
        tasks.next_generation += 1;
        let generation = tasks.next_generation;

        let shared = Arc::clone(&self.tasks);
        let target = path.clone();
        let handle = runtime
            .spawn(async move {
                tokio::time::sleep(delay).await;
                let mut tasks = lock(&shared);
                let current = tasks
                    .pending
                    .get(&target)
                    .is_some_and(|p| p.generation == generation);
                if current {
                    tasks.pending.remove(&target);
                    remove_alias(&target);
                }
            })
            .abort_handle();

        if let Some(previous) = tasks.pending.insert(path, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Number of paths waiting for removal.
    pub fn pending(&self) -> usize {
        lock(&self.tasks).pending.len()
    }

    /// Stop the runtime without waiting for pending tasks.
    pub fn shutdown(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            lock(&self.tasks).pending.clear();
            runtime.shutdown_background();
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Remove the file and its parent directory if that is now empty.
fn remove_alias(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(target: "library::cleanup", path = %path.display(), "Removed alias"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(target: "library::cleanup", path = %path.display(), error = %e, "Cannot remove alias");
            return;
        }
    }
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::remove_dir(parent) {
            debug!(target: "library::cleanup", dir = %parent.display(), error = %e, "Alias directory kept");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use tempfile::TempDir;

    fn alias(dir: &TempDir) -> PathBuf {
        let sub = dir.path().join("abc");
        fs::create_dir_all(&sub).unwrap();
        let path = sub.join("kick.wav");
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_removes_file_and_empty_parent() {
        let dir = TempDir::new().unwrap();
        let path = alias(&dir);
        let scheduler = CleanupScheduler::new().unwrap();

        scheduler.schedule(path.clone(), Duration::from_millis(20));
        sleep(Duration::from_millis(300));

        assert!(!path.exists());
        assert!(!dir.path().join("abc").exists());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_reschedule_extends_lifetime() {
        let dir = TempDir::new().unwrap();
        let path = alias(&dir);
        let scheduler = CleanupScheduler::new().unwrap();

        scheduler.schedule(path.clone(), Duration::from_millis(100));
        scheduler.schedule(path.clone(), Duration::from_secs(30));
        sleep(Duration::from_millis(300));

        assert!(path.exists());
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_shutdown_leaves_files() {
        let dir = TempDir::new().unwrap();
        let path = alias(&dir);
        let scheduler = CleanupScheduler::new().unwrap();

        scheduler.schedule(path.clone(), Duration::from_millis(50));
        scheduler.shutdown();
        sleep(Duration::from_millis(200));

        assert!(path.exists());
        scheduler.schedule(path.clone(), Duration::from_millis(1));
        assert_eq!(scheduler.pending(), 0);
    }
}
