//! Filesystem round-trip: the agent reads and writes files through the
//! client's `fs/*` handlers.

mod common;

use std::sync::Arc;

use async_trait::async_trait;

use airs_acp::integration::{
    AcpAgent, AcpClient, AgentConfig, AgentSession, ClientConfig, LocalFsHandler, PromptHandler,
};
use airs_acp::permission::AllowAllPermissions;
use airs_acp::protocol::{codes, AcpResult, ContentBlock, StopReason};
use common::DuplexTransport;

/// Agent that copies `<dir>/in.txt` to `<dir>/out.txt`, upper-cased
struct CopyAgent;

#[async_trait]
impl PromptHandler for CopyAgent {
    async fn handle_prompt(
        &self,
        session: AgentSession,
        content: Vec<ContentBlock>,
    ) -> AcpResult<StopReason> {
        let dir = content
            .iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let text = session.read_text_file(format!("{dir}/in.txt")).await?;
        session
            .write_text_file(format!("{dir}/out.txt"), text.to_uppercase())
            .await?;
        session.send_message_chunk("copied", true).await?;
        Ok(StopReason::EndTurn)
    }
}

async fn peers() -> (Arc<AcpAgent>, Arc<AcpClient>) {
    let agent = AcpAgent::new(AgentConfig::default(), Arc::new(CopyAgent));
    let client = AcpClient::new(
        ClientConfig::default(),
        Arc::new(LocalFsHandler),
        Arc::new(AllowAllPermissions),
    );

    let (client_end, agent_end) = DuplexTransport::pair(
        client.dispatcher().message_handler(),
        agent.dispatcher().message_handler(),
    );
    client.connect(Box::new(client_end)).await.unwrap();
    agent.connect(Box::new(agent_end)).await.unwrap();

    (agent, client)
}

#[tokio::test]
async fn fs_read_write_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("in.txt"), "hello acp")
        .await
        .unwrap();

    let (_agent, client) = peers().await;
    client.initialize().await.unwrap();
    let info = client.new_session(dir.path()).await.unwrap();

    let stop = client
        .prompt(
            &info.session_id,
            vec![ContentBlock::text(dir.path().display().to_string())],
        )
        .await
        .unwrap();
    assert_eq!(stop, StopReason::EndTurn);

    let copied = tokio::fs::read_to_string(dir.path().join("out.txt"))
        .await
        .unwrap();
    assert_eq!(copied, "HELLO ACP");
}

#[tokio::test]
async fn fs_missing_file_propagates_code() {
    let dir = tempfile::tempdir().unwrap();
    // No in.txt: the agent's read fails and the error code crosses the wire

    let (_agent, client) = peers().await;
    client.initialize().await.unwrap();
    let info = client.new_session(dir.path()).await.unwrap();

    let err = client
        .prompt(
            &info.session_id,
            vec![ContentBlock::text(dir.path().display().to_string())],
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, codes::RESOURCE_NOT_FOUND);
}
