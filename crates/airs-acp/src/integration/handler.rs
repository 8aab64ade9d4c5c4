//! Application Handler Seams
//!
//! The runtime owns protocol plumbing; applications plug in behavior
//! through these traits: the agent's prompt loop, the client's filesystem
//! access, and the client's permission policy (see
//! [`crate::permission::PermissionHandler`]).

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use crate::integration::agent::AgentSession;
use crate::protocol::{
    AcpError, AcpResult, ContentBlock, ReadTextFileRequest, ReadTextFileResponse, StopReason,
    WriteTextFileRequest,
};

/// The agent application's prompt loop
///
/// Receives the live [`AgentSession`] handle and the prompt content; streams
/// updates and tool calls through the handle and returns why the turn
/// stopped. The handler is expected to poll the session's cancellation
/// token at cooperative check-points and return
/// [`StopReason::Cancelled`] promptly once it fires.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Serve one prompt turn
    async fn handle_prompt(
        &self,
        session: AgentSession,
        content: Vec<ContentBlock>,
    ) -> AcpResult<StopReason>;
}

/// The client's filesystem surface for `fs/read_text_file` and
/// `fs/write_text_file`
#[async_trait]
pub trait FsHandler: Send + Sync {
    /// Read a text file
    async fn read_text_file(&self, request: ReadTextFileRequest)
        -> AcpResult<ReadTextFileResponse>;

    /// Write a text file
    async fn write_text_file(&self, request: WriteTextFileRequest) -> AcpResult<()>;
}

/// Filesystem handler backed by the local filesystem
pub struct LocalFsHandler;

#[async_trait]
impl FsHandler for LocalFsHandler {
    async fn read_text_file(
        &self,
        request: ReadTextFileRequest,
    ) -> AcpResult<ReadTextFileResponse> {
        let content = tokio::fs::read_to_string(&request.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    AcpError::resource_not_found(request.path.display())
                }
                std::io::ErrorKind::PermissionDenied => AcpError::resource_access_denied(
                    format!("cannot read {}: {e}", request.path.display()),
                ),
                _ => AcpError::internal_error(format!(
                    "read {} failed: {e}",
                    request.path.display()
                )),
            })?;
        Ok(ReadTextFileResponse { content })
    }

    async fn write_text_file(&self, request: WriteTextFileRequest) -> AcpResult<()> {
        tokio::fs::write(&request.path, request.content.as_bytes())
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => AcpError::resource_access_denied(
                    format!("cannot write {}: {e}", request.path.display()),
                ),
                _ => AcpError::internal_error(format!(
                    "write {} failed: {e}",
                    request.path.display()
                )),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codes;

    #[tokio::test]
    async fn test_local_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        let fs = LocalFsHandler;

        fs.write_text_file(WriteTextFileRequest {
            session_id: None,
            path: path.clone(),
            content: "hello".to_string(),
        })
        .await
        .unwrap();

        let read = fs
            .read_text_file(ReadTextFileRequest {
                session_id: None,
                path,
            })
            .await
            .unwrap();
        assert_eq!(read.content, "hello");
    }

    #[tokio::test]
    async fn test_local_fs_missing_file() {
        let fs = LocalFsHandler;
        let err = fs
            .read_text_file(ReadTextFileRequest {
                session_id: None,
                path: "/definitely/not/here.txt".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::RESOURCE_NOT_FOUND);
    }
}
