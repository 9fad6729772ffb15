//! Interactive chat REPL with streaming output and persistent history.

use crate::config::config_dir;
use crate::terminal::{print_notice, stream_turn};
use anyhow::Result;
use client::{ChatSession, SessionError};
use rustyline::error::ReadlineError;
use std::{path::PathBuf, time::Duration};

/// Interactive chat REPL bound to one session.
pub struct ChatRepl {
    session: ChatSession,
    editor: rustyline::DefaultEditor,
    history_path: PathBuf,
}

impl ChatRepl {
    /// Create a new REPL over an opened session.
    pub fn new(session: ChatSession) -> Result<Self> {
        let mut editor = rustyline::DefaultEditor::new()?;
        let history_path = config_dir().join("history");
        let _ = editor.load_history(&history_path);
        Ok(Self {
            session,
            editor,
            history_path,
        })
    }

    /// Wait for the connection attempt and report how it went.
    pub async fn connect(&mut self, timeout: Duration) {
        let result = self.session.wait_connected(timeout).await;
        self.flush_notices();
        if let Err(SessionError::Timeout) = result {
            eprintln!("! still connecting to the assistant");
        }
    }

    /// Run the interactive REPL loop.
    pub async fn run(&mut self) -> Result<()> {
        println!("Netops chat (Ctrl+D to exit, Ctrl+C to stop waiting)");
        println!("---");

        loop {
            self.flush_notices();
            match self.editor.readline("> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(&line);
                    self.ask(line).await?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        self.session.close();
        self.save_history();
        Ok(())
    }

    async fn ask(&mut self, query: String) -> Result<()> {
        let base = self.session.snapshot().messages.len();
        match self.session.submit_query(query).await {
            Ok(()) => {
                let turn = stream_turn(&mut self.session, base).await?;
                if turn.interrupted {
                    eprintln!("! stopped waiting, the reply continues in the background");
                }
            }
            Err(SessionError::Closed) => return Err(SessionError::Closed.into()),
            Err(e) => {
                self.flush_notices();
                if !matches!(e, SessionError::NotConnected) {
                    eprintln!("! {e}");
                }
            }
        }
        Ok(())
    }

    fn flush_notices(&mut self) {
        while let Some(notice) = self.session.try_notice() {
            print_notice(&notice);
        }
    }

    /// Save readline history to `~/.config/netops/history`.
    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = self.editor.save_history(&self.history_path);
    }
}
