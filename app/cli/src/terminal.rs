//! Terminal output for one assistant turn.
//!
//! The session publishes full snapshots. [`TurnPrinter`] diffs consecutive
//! snapshots and writes only what changed, so streamed replies appear
//! incrementally.

use anyhow::Result;
use client::{AutomationStatus, ChatSession, MessageId, Notice, NoticeLevel, SessionView};
use protocol::Sender;
use std::io::{self, Write};

/// How a turn ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Turn {
    /// The user stopped waiting with Ctrl+C.
    pub interrupted: bool,
    /// An error notice was raised during the turn.
    pub failed: bool,
}

/// Incremental renderer for the messages of one turn.
#[derive(Debug)]
pub struct TurnPrinter {
    base: usize,
    shown: Vec<(MessageId, String)>,
    status: AutomationStatus,
    midline: bool,
}

impl TurnPrinter {
    /// Render assistant messages at index `base` and after.
    pub fn new(base: usize) -> Self {
        Self {
            base,
            shown: Vec::new(),
            status: AutomationStatus::Idle,
            midline: false,
        }
    }

    /// Write what changed since the previous snapshot.
    pub fn render(&mut self, view: &SessionView, out: &mut impl Write) -> io::Result<()> {
        if view.automation != self.status {
            self.status = view.automation;
            if self.status.is_visible() {
                self.newline(out)?;
                match &view.step {
                    Some(step) => writeln!(out, "[{}] {step}", label(self.status))?,
                    None => writeln!(out, "[{}]", label(self.status))?,
                }
            }
        }

        let replies = view
            .messages
            .iter()
            .skip(self.base)
            .filter(|m| m.sender == Sender::Assistant);
        for message in replies {
            match self.shown.iter().position(|(id, _)| id == &message.id) {
                Some(i) if self.shown[i].1 == message.text => {}
                Some(i) => {
                    let rest = message
                        .text
                        .strip_prefix(self.shown[i].1.as_str())
                        .map(str::to_owned);
                    match rest {
                        Some(rest) => self.write(out, &rest)?,
                        // Replaced rather than extended; print the new text whole.
                        None => {
                            self.newline(out)?;
                            self.write(out, &message.text)?;
                        }
                    }
                    self.shown[i].1.clone_from(&message.text);
                }
                None => {
                    self.newline(out)?;
                    self.write(out, &message.text)?;
                    self.shown.push((message.id.clone(), message.text.clone()));
                }
            }
        }
        out.flush()
    }

    fn write(&mut self, out: &mut impl Write, text: &str) -> io::Result<()> {
        if !text.is_empty() {
            write!(out, "{text}")?;
            self.midline = !text.ends_with('\n');
        }
        Ok(())
    }

    fn newline(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.midline {
            writeln!(out)?;
            self.midline = false;
        }
        Ok(())
    }
}

fn label(status: AutomationStatus) -> &'static str {
    match status {
        AutomationStatus::Idle => "idle",
        AutomationStatus::Analyzing => "analyzing",
        AutomationStatus::Executing => "executing",
        AutomationStatus::Completed => "completed",
        AutomationStatus::Failed => "failed",
    }
}

/// Whether a snapshot still has a turn in progress.
pub fn turn_active(view: &SessionView) -> bool {
    view.sending || view.messages.iter().any(|m| m.is_open())
}

/// Print a notice on stderr.
pub fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Success => eprintln!("* {}", notice.text),
        NoticeLevel::Error => eprintln!("! {}", notice.text),
    }
}

/// Stream the current turn to stdout until it finishes.
///
/// `base` is the message count before the query was submitted. Handles
/// Ctrl+C via `tokio::signal::ctrl_c()`, which stops waiting but leaves the
/// turn running.
pub async fn stream_turn(session: &mut ChatSession, base: usize) -> Result<Turn> {
    let mut view = session.watch();
    let mut printer = TurnPrinter::new(base);
    let mut turn = Turn::default();
    let mut stdout = io::stdout();

    loop {
        let active = {
            let snapshot = view.borrow_and_update();
            printer.render(&snapshot, &mut stdout)?;
            turn_active(&snapshot)
        };
        if !active {
            break;
        }

        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(notice) = session.next_notice() => {
                turn.failed |= notice.level == NoticeLevel::Error;
                print_notice(&notice);
            }
            _ = tokio::signal::ctrl_c() => {
                turn.interrupted = true;
                break;
            }
        }
    }

    println!();
    while let Some(notice) = session.try_notice() {
        turn.failed |= notice.level == NoticeLevel::Error;
        print_notice(&notice);
    }
    Ok(turn)
}
