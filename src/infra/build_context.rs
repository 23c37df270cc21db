//! Build context management
//!
//! Each build gets its own directory under the build root. The directory is
//! removed after the build attempt on every exit path: the explicit release
//! covers the normal path and the lease's `Drop` covers early returns,
//! panics and dropped futures.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::constants::{ARCHIVE_FILENAME, DOCKERFILE_NAME};
use crate::error::{HornetError, HornetResult};
use crate::infra::command::{CommandExecutor, CommandRequest};
use crate::infra::docker;

const PLACEHOLDER_DOCKERFILE: &str = "not initialized yet...";

/// An ephemeral staging directory for one image build
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BuildContext {
    id: Uuid,
    path: PathBuf,
}

impl BuildContext {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the upload collaborator stages the source archive
    pub fn archive_path(&self) -> PathBuf {
        self.path.join(ARCHIVE_FILENAME)
    }
}

/// Allocates build contexts and runs builds inside them
pub struct BuildContextManager {
    root: PathBuf,
    docker_bin: String,
    executor: Arc<dyn CommandExecutor>,
}

impl BuildContextManager {
    pub fn new(
        root: impl Into<PathBuf>,
        docker_bin: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            root: root.into(),
            docker_bin: docker_bin.into(),
            executor,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh context with a placeholder Dockerfile
    pub async fn create(&self) -> HornetResult<BuildContext> {
        let context = self.open(Uuid::new_v4());
        tokio::fs::create_dir_all(&context.path).await?;
        tokio::fs::write(context.path.join(DOCKERFILE_NAME), PLACEHOLDER_DOCKERFILE).await?;

        tracing::debug!(
            build_id = %context.id,
            path = %context.path.display(),
            "Created build context"
        );
        Ok(context)
    }

    /// Context handle for a known id. The path is always derived from the
    /// build root, never taken from the caller.
    pub fn open(&self, id: Uuid) -> BuildContext {
        BuildContext {
            id,
            path: self.root.join(id.to_string()),
        }
    }

    /// Build `tag` from `dockerfile` inside `context`, then remove the context
    pub async fn build(
        &self,
        context: BuildContext,
        tag: &str,
        dockerfile: &str,
        has_archive: bool,
        log_id: Option<&str>,
    ) -> HornetResult<()> {
        let lease = ContextLease::new(context.path.clone());

        tracing::info!(
            build_id = %context.id,
            image = %tag,
            has_archive,
            "Building image"
        );
        let result = self
            .run_build(&context, tag, dockerfile, has_archive, log_id)
            .await;

        lease.release().await;
        result
    }

    /// Remove a context that will not be built
    pub async fn discard(&self, context: BuildContext) {
        tracing::debug!(build_id = %context.id, "Discarding build context");
        ContextLease::new(context.path).release().await;
    }

    async fn run_build(
        &self,
        context: &BuildContext,
        tag: &str,
        dockerfile: &str,
        has_archive: bool,
        log_id: Option<&str>,
    ) -> HornetResult<()> {
        tokio::fs::create_dir_all(&context.path).await?;
        tokio::fs::write(context.path.join(DOCKERFILE_NAME), dockerfile).await?;

        if has_archive {
            let archive = context.archive_path();
            let request = CommandRequest::new(
                "unzip",
                vec![
                    "-o".to_string(),
                    archive.display().to_string(),
                    "-d".to_string(),
                    context.path.display().to_string(),
                ],
            );
            let output = self
                .executor
                .execute(request, CancellationToken::new())
                .await;
            if !output.success() {
                return Err(HornetError::external(
                    format!("Failed to extract build archive for image \"{}\"", tag),
                    &output.stderr,
                ));
            }
        }

        let request = CommandRequest::new(self.docker_bin.clone(), docker::build(tag))
            .in_dir(&context.path)
            .streaming(log_id);
        let output = self
            .executor
            .execute(request, CancellationToken::new())
            .await;
        if !output.success() {
            return Err(HornetError::external(
                format!("Failed to build image \"{}\"", tag),
                &output.stderr,
            ));
        }

        Ok(())
    }
}

/// Removes the context directory exactly once
struct ContextLease {
    path: Option<PathBuf>,
}

impl ContextLease {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    async fn release(mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove build context"
                    );
                }
            }
        }
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::command::CommandOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records requests and fails any whose program matches `fail_program`
    struct RecordingExecutor {
        fail_program: Option<&'static str>,
        seen: Mutex<Vec<CommandRequest>>,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(
            &self,
            request: CommandRequest,
            _cancel: CancellationToken,
        ) -> CommandOutput {
            let fail = self.fail_program == Some(request.program.as_str());
            self.seen.lock().unwrap().push(request);
            if fail {
                CommandOutput::exited(1, Vec::new(), vec!["boom".to_string()])
            } else {
                CommandOutput::exited(0, Vec::new(), Vec::new())
            }
        }
    }

    fn setup(
        root: &Path,
        fail_program: Option<&'static str>,
    ) -> (BuildContextManager, Arc<RecordingExecutor>) {
        let executor = Arc::new(RecordingExecutor {
            fail_program,
            seen: Mutex::new(Vec::new()),
        });
        (
            BuildContextManager::new(root, "docker", executor.clone()),
            executor,
        )
    }

    #[tokio::test]
    async fn test_create_seeds_placeholder() {
        let root = tempfile::tempdir().unwrap();
        let (manager, _) = setup(root.path(), None);

        let context = manager.create().await.unwrap();
        assert!(context.path().starts_with(root.path()));
        let content = std::fs::read_to_string(context.path().join(DOCKERFILE_NAME)).unwrap();
        assert_eq!(content, PLACEHOLDER_DOCKERFILE);
    }

    #[tokio::test]
    async fn test_build_runs_in_context_and_removes_it() {
        let root = tempfile::tempdir().unwrap();
        let (manager, executor) = setup(root.path(), None);

        let context = manager.create().await.unwrap();
        let path = context.path().to_path_buf();
        manager
            .build(context, "web", "FROM alpine", false, None)
            .await
            .unwrap();

        assert!(!path.exists());
        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].args, vec!["build", "-t", "web", "."]);
        assert_eq!(seen[0].work_dir.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_failed_extraction_still_removes_context() {
        let root = tempfile::tempdir().unwrap();
        let (manager, executor) = setup(root.path(), Some("unzip"));

        let context = manager.create().await.unwrap();
        let path = context.path().to_path_buf();
        let err = manager
            .build(context, "web", "FROM alpine", true, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "external_command");
        assert!(!path.exists());
        // build never started
        assert_eq!(executor.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_removes_context() {
        let root = tempfile::tempdir().unwrap();
        let (manager, _) = setup(root.path(), Some("docker"));

        let context = manager.create().await.unwrap();
        let path = context.path().to_path_buf();
        let err = manager
            .build(context, "web", "FROM alpine", false, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to build image \"web\""));
        assert!(!path.exists());
    }

    #[test]
    fn test_open_derives_path_from_root() {
        let (manager, _) = setup(Path::new("/tmp/builds"), None);
        let id = Uuid::new_v4();
        let context = manager.open(id);
        assert_eq!(context.path(), Path::new("/tmp/builds").join(id.to_string()));
        assert_eq!(context.archive_path(), context.path().join(ARCHIVE_FILENAME));
    }

    #[test]
    fn test_lease_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("ctx");
        std::fs::create_dir_all(path.join("nested")).unwrap();

        drop(ContextLease::new(path.clone()));
        assert!(!path.exists());
    }
}
