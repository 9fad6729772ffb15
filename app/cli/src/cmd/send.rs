//! One-shot query command.

use crate::terminal::{print_notice, stream_turn};
use anyhow::{Context, Result};
use clap::Args;
use client::{ChatClient, ClientConfig};
use std::time::Duration;

/// Send a one-shot query and print the reply.
#[derive(Args, Debug)]
pub struct Send {
    /// Query text.
    pub content: String,
}

impl Send {
    /// Send the query, stream the reply and close the connection.
    pub async fn run(self, config: ClientConfig) -> Result<()> {
        let timeout = config.connect_timeout() + Duration::from_secs(1);
        let mut session = ChatClient::new(config).open();

        let connected = session.wait_connected(timeout).await;
        while let Some(notice) = session.try_notice() {
            if connected.is_err() {
                print_notice(&notice);
            }
        }
        connected.context("could not reach the assistant")?;

        let base = session.snapshot().messages.len();
        session.submit_query(self.content).await?;
        let turn = stream_turn(&mut session, base).await?;
        session.close();

        if turn.failed {
            anyhow::bail!("the assistant turn did not complete");
        }
        Ok(())
    }
}
