//! Interactive chat REPL command.

use crate::repl::ChatRepl;
use anyhow::Result;
use clap::Args;
use client::{ChatClient, ClientConfig};
use std::time::Duration;

/// Start an interactive chat REPL.
#[derive(Args, Debug)]
pub struct Chat;

impl Chat {
    /// Connect and enter the interactive REPL.
    pub async fn run(self, config: ClientConfig) -> Result<()> {
        let timeout = config.connect_timeout() + Duration::from_secs(1);
        let session = ChatClient::new(config).open();
        let mut repl = ChatRepl::new(session)?;
        repl.connect(timeout).await;
        repl.run().await
    }
}
