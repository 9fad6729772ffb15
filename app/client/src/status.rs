//! Automation status derived from the event stream.

use compact_str::CompactString;
use protocol::ServerEvent;

/// Keywords in `start` content that mark a turn as automation.
pub const DEFAULT_AUTOMATION_KEYWORDS: [&str; 2] = ["tool", "investigate"];

/// Whether the backend is merely chatting or also running tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutomationStatus {
    /// No automation in progress. The indicator is hidden.
    #[default]
    Idle,
    /// The backend is planning tool calls.
    Analyzing,
    /// The backend is running tools.
    Executing,
    /// The automation turn finished.
    Completed,
    /// The automation turn failed or was interrupted.
    Failed,
}

impl AutomationStatus {
    /// Analyzing or executing.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Analyzing | Self::Executing)
    }

    /// Everything but idle is shown to the operator.
    pub fn is_visible(self) -> bool {
        self != Self::Idle
    }
}

/// Tracks [`AutomationStatus`] plus the current step and tool.
#[derive(Debug, Clone)]
pub struct AutomationTracker {
    status: AutomationStatus,
    step: String,
    tool: Option<CompactString>,
    keywords: Vec<CompactString>,
}

impl Default for AutomationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOMATION_KEYWORDS.iter().map(|k| (*k).into()).collect())
    }
}

impl AutomationTracker {
    /// Create an idle tracker that treats `keywords` as tool-like.
    pub fn new(keywords: Vec<CompactString>) -> Self {
        Self {
            status: AutomationStatus::Idle,
            step: String::new(),
            tool: None,
            keywords,
        }
    }

    /// Whether `start` content suggests the backend will run tools.
    pub fn suggests_automation(&self, content: Option<&str>) -> bool {
        content.is_some_and(|c| self.keywords.iter().any(|k| c.contains(k.as_str())))
    }

    /// Advance on one decoded event.
    pub fn observe(&mut self, event: &ServerEvent, automation: bool) {
        match event {
            ServerEvent::Start { .. } if automation => {
                self.enter(AutomationStatus::Analyzing, "Analyzing your request...");
                self.tool = None;
            }
            ServerEvent::Start { .. } => self.reset(),
            ServerEvent::ToolResult(result) => {
                self.enter(
                    AutomationStatus::Executing,
                    format!("Executing {}...", result.tool),
                );
                self.tool = Some(result.tool.clone());
            }
            ServerEvent::FinalResponse { .. } => {
                self.enter(AutomationStatus::Completed, "Analysis complete")
            }
            ServerEvent::Error { .. } => self.fail(),
            ServerEvent::Chunk { .. } | ServerEvent::Legacy { .. } | ServerEvent::End => {}
        }
    }

    /// Move to failed if automation was in progress.
    pub fn fail(&mut self) {
        if self.status.is_active() {
            self.enter(AutomationStatus::Failed, "Automation failed");
        }
    }

    /// Return to idle.
    pub fn reset(&mut self) {
        self.status = AutomationStatus::Idle;
        self.step.clear();
        self.tool = None;
    }

    /// Current status.
    pub fn status(&self) -> AutomationStatus {
        self.status
    }

    /// Current step description, only while analyzing or executing.
    pub fn step(&self) -> Option<&str> {
        self.status.is_active().then_some(self.step.as_str())
    }

    /// Current tool name, only while analyzing or executing.
    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref().filter(|_| self.status.is_active())
    }

    fn enter(&mut self, status: AutomationStatus, step: impl Into<String>) {
        self.status = status;
        self.step = step.into();
    }
}
