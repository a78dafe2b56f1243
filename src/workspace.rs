//! Request-scoped scratch workspaces.
//!
//! Every request gets its own directory tree under the scratch root:
//!
//! ```text
//! {scratch_root}/{uuid}/input/    one uploaded demo
//! {scratch_root}/{uuid}/output/   files produced by the analyzer
//! {scratch_root}/{uuid}/analysis_{uuid}.zip
//! ```
//!
//! Trees are never shared between requests, so nothing here needs a lock.
//! A [`WorkspaceLease`] owns one tree and removes it when dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

const INPUT_SUBDIR: &str = "input";
const OUTPUT_SUBDIR: &str = "output";

/// Bounds the retry loop if the filesystem keeps reporting `AlreadyExists`.
const MAX_ALLOCATION_ATTEMPTS: usize = 4;

/// Errors allocating or resetting scratch space.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to create scratch directory: {0}")]
    Create(#[source] io::Error),

    #[error("Failed to reset scratch root: {0}")]
    Reset(#[source] io::Error),

    #[error("Refusing to use filesystem root as scratch root")]
    UnsafeRoot,

    #[error("Could not find an unused workspace identifier")]
    Exhausted,
}

/// One request's directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    id: Uuid,
    root: PathBuf,
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl Workspace {
    fn at(scratch_root: &Path, id: Uuid) -> Self {
        let root = scratch_root.join(id.to_string());
        Self {
            id,
            input_dir: root.join(INPUT_SUBDIR),
            output_dir: root.join(OUTPUT_SUBDIR),
            root,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the packaged archive goes. Lives at the root, outside `output/`,
    /// so packaging never archives itself.
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(format!("analysis_{}.zip", self.id))
    }
}

/// Allocates and destroys workspaces under a single scratch root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    scratch_root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Wipe the scratch root and recreate it empty.
    ///
    /// Removes workspaces left behind by a previous run. Call once at startup,
    /// before any request can allocate; this is the only operation that
    /// touches more than one workspace.
    pub fn reset(&self) -> Result<(), WorkspaceError> {
        if self.scratch_root.parent().is_none() {
            return Err(WorkspaceError::UnsafeRoot);
        }

        match fs::remove_dir_all(&self.scratch_root) {
            Ok(()) => tracing::info!(
                "Removed stale scratch root {}",
                self.scratch_root.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::Reset(e)),
        }

        fs::create_dir_all(&self.scratch_root).map_err(WorkspaceError::Reset)
    }

    /// Create a fresh workspace tree and hand back a lease that owns it.
    ///
    /// The workspace root is created with `create_dir` rather than
    /// `create_dir_all`, so an identifier that already exists on disk is
    /// never handed out twice.
    pub fn allocate(&self) -> Result<WorkspaceLease, WorkspaceError> {
        fs::create_dir_all(&self.scratch_root).map_err(WorkspaceError::Create)?;

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let workspace = Workspace::at(&self.scratch_root, Uuid::new_v4());

            match fs::create_dir(&workspace.root) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::warn!("Workspace id {} already on disk, regenerating", workspace.id);
                    continue;
                }
                Err(e) => return Err(WorkspaceError::Create(e)),
            }

            if let Err(e) = fs::create_dir_all(&workspace.input_dir)
                .and_then(|_| fs::create_dir_all(&workspace.output_dir))
            {
                self.destroy(&workspace);
                return Err(WorkspaceError::Create(e));
            }

            tracing::debug!("Allocated workspace {}", workspace.id);
            return Ok(WorkspaceLease {
                workspace,
                manager: self.clone(),
                released: false,
            });
        }

        Err(WorkspaceError::Exhausted)
    }

    /// Recursively remove a workspace.
    ///
    /// Never fails: there is nobody left to handle a teardown error, so it is
    /// logged and dropped. Removing an already-removed workspace is a no-op.
    pub fn destroy(&self, workspace: &Workspace) {
        match fs::remove_dir_all(&workspace.root) {
            Ok(()) => tracing::debug!("Cleaned up workspace {}", workspace.id),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Error cleaning up workspace {}: {}", workspace.id, e),
        }
    }
}

/// Exclusive ownership of one workspace. Dropping the lease destroys it.
///
/// Move the lease into whatever must outlive the handler (the response body)
/// to defer teardown; let it fall out of scope to tear down immediately.
#[derive(Debug)]
pub struct WorkspaceLease {
    workspace: Workspace,
    manager: WorkspaceManager,
    released: bool,
}

impl WorkspaceLease {
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Destroy the workspace now instead of at drop.
    pub fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.released {
            self.released = true;
            self.manager.destroy(&self.workspace);
        }
    }
}

impl std::ops::Deref for WorkspaceLease {
    type Target = Workspace;

    fn deref(&self) -> &Workspace {
        &self.workspace
    }
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
    }

    #[test]
    fn test_allocate_creates_input_and_output() {
        let dir = tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path().join("scratch"));

        let lease = manager.allocate().unwrap();

        assert!(lease.input_dir().is_dir());
        assert!(lease.output_dir().is_dir());
        assert_eq!(lease.root(), dir.path().join("scratch").join(lease.id().to_string()));
        assert!(lease.archive_path().starts_with(lease.root()));
        assert!(!lease.archive_path().starts_with(lease.output_dir()));
    }

    #[test]
    fn test_drop_removes_tree() {
        let dir = tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let lease = manager.allocate().unwrap();
        let root = lease.root().to_path_buf();
        fs::write(lease.input_dir().join("demo.dem"), b"bytes").unwrap();
        fs::write(lease.output_dir().join("kills.csv"), b"a,b\n").unwrap();

        drop(lease);

        assert!(!root.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_release_is_idempotent_with_drop() {
        let dir = tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let lease = manager.allocate().unwrap();
        let workspace = lease.workspace().clone();
        lease.release();

        // Second destroy of the same tree must be silent.
        manager.destroy(&workspace);
        assert!(!workspace.root().exists());
    }

    #[test]
    fn test_ids_are_unique() {
        let dir = tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let leases: Vec<_> = (0..32).map(|_| manager.allocate().unwrap()).collect();
        let ids: HashSet<_> = leases.iter().map(|l| l.id()).collect();

        assert_eq!(ids.len(), 32);
        assert_eq!(entries(dir.path()), 32);
        drop(leases);
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_concurrent_allocate_and_destroy() {
        let dir = tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    let lease = manager.allocate().unwrap();
                    fs::write(lease.output_dir().join(format!("{}.csv", i)), b"x").unwrap();
                    lease.id()
                })
            })
            .collect();

        let ids: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 16);
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_reset_wipes_stale_workspaces() {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("temp");
        let stale = scratch.join("stale-request").join("input");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("old.dem"), b"old").unwrap();

        let manager = WorkspaceManager::new(&scratch);
        manager.reset().unwrap();

        assert!(scratch.is_dir());
        assert_eq!(entries(&scratch), 0);

        // Resetting an empty or missing root is fine too.
        manager.reset().unwrap();
        fs::remove_dir(&scratch).unwrap();
        manager.reset().unwrap();
        assert!(scratch.is_dir());
    }

    #[test]
    fn test_reset_refuses_filesystem_root() {
        let manager = WorkspaceManager::new("/");
        assert!(matches!(manager.reset(), Err(WorkspaceError::UnsafeRoot)));
    }

    #[cfg(unix)]
    #[test]
    fn test_allocate_fails_on_unwritable_root() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let manager = WorkspaceManager::new(blocker.join("scratch"));
        assert!(matches!(manager.allocate(), Err(WorkspaceError::Create(_))));
    }
}
