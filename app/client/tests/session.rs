//! Session state machine tests, driven by synthetic transport signals.

use netops_client::{
    AutomationStatus, ClientConfig, ConnectionState, NoticeLevel, SessionCore, SessionError,
    Signal,
};
use protocol::{QueryFrame, Sender};

fn connected() -> SessionCore {
    let mut core = SessionCore::new(&ClientConfig::default());
    core.connecting();
    core.handle(Signal::Opened);
    core.drain_notices();
    core
}

fn submit(core: &mut SessionCore, text: &str) -> QueryFrame {
    serde_json::from_str(&core.submit_query(text).unwrap()).unwrap()
}

fn frame(core: &mut SessionCore, json: &str) {
    core.handle(Signal::Frame(json.to_owned()));
}

#[test]
fn opened_reports_connected() {
    let mut core = SessionCore::new(&ClientConfig::default());
    assert_eq!(core.connection(), ConnectionState::Disconnected);
    core.connecting();
    assert_eq!(core.connection(), ConnectionState::Connecting);
    core.handle(Signal::Opened);
    assert_eq!(core.connection(), ConnectionState::Connected);

    let notices = core.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices[0].text, "Connected to AI Assistant");
    assert!(core.drain_notices().is_empty());
}

#[test]
fn hello_turn_produces_one_reply() {
    let mut core = connected();
    let query = submit(&mut core, "Hi");
    assert_eq!(query.query, "Hi");
    assert!(query.conversation_history.is_empty());
    assert!(core.is_sending());

    frame(&mut core, r#"{"type":"start"}"#);
    frame(&mut core, r#"{"type":"chunk","content":"Hel"}"#);
    frame(&mut core, r#"{"type":"chunk","content":"lo"}"#);
    frame(&mut core, r#"{"type":"end"}"#);

    assert!(!core.is_sending());
    assert!(!core.in_flight());
    let messages = core.messages().as_slice();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[0].text, "Hi");
    assert_eq!(messages[1].sender, Sender::Assistant);
    assert_eq!(messages[1].text, "Hello");
    assert!(!messages[1].is_open());

    let next = submit(&mut core, "And?");
    let history: Vec<_> = next
        .conversation_history
        .iter()
        .map(|e| (e.sender, e.text.as_str()))
        .collect();
    assert_eq!(
        history,
        [(Sender::User, "Hi"), (Sender::Assistant, "Hello")]
    );
}

#[test]
fn history_excludes_current_query() {
    let mut core = connected();
    let query = submit(&mut core, "first");
    assert!(query.conversation_history.iter().all(|e| e.text != "first"));
}

#[test]
fn submit_while_disconnected_is_rejected() {
    let mut core = SessionCore::new(&ClientConfig::default());
    let err = core.submit_query("Hi").unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
    assert!(core.messages().is_empty());
    assert!(!core.is_sending());

    let notices = core.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].text, "Not connected to the AI Assistant.");
}

#[test]
fn blank_query_is_rejected() {
    let mut core = connected();
    assert!(matches!(
        core.submit_query("   "),
        Err(SessionError::EmptyQuery)
    ));
    assert!(core.messages().is_empty());
}

#[test]
fn second_query_while_sending_is_busy() {
    let mut core = connected();
    core.submit_query("one").unwrap();
    assert!(matches!(core.submit_query("two"), Err(SessionError::Busy)));
    assert_eq!(core.messages().len(), 1);
}

#[test]
fn error_frame_closes_turn_and_notifies() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    frame(&mut core, r#"{"type":"start","content":"investigate"}"#);
    frame(&mut core, r#"{"type":"chunk","content":"partial"}"#);
    frame(&mut core, r#"{"type":"error","error":"backend exploded"}"#);

    assert!(!core.is_sending());
    assert!(!core.in_flight());
    assert_eq!(core.automation().status(), AutomationStatus::Failed);
    let notices = core.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].text, "backend exploded");

    frame(&mut core, r#"{"type":"chunk","content":"fresh"}"#);
    let messages = core.messages().as_slice();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].text, "partial");
    assert_eq!(messages[2].text, "fresh");
}

#[test]
fn bare_error_uses_generic_notice() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    frame(&mut core, r#"{"type":"error"}"#);
    assert_eq!(core.drain_notices()[0].text, "An error occurred");
    assert!(!core.is_sending());
}

#[test]
fn closed_resets_turn() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    frame(&mut core, r#"{"type":"chunk","content":"Hel"}"#);
    core.handle(Signal::Closed);

    assert_eq!(core.connection(), ConnectionState::Disconnected);
    assert!(!core.is_sending());
    assert!(!core.messages().as_slice()[1].is_open());
    assert_eq!(
        core.drain_notices()[0].text,
        "Disconnected from AI Assistant"
    );
}

#[test]
fn failure_resets_turn() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    core.handle(Signal::Failed("reset by peer".into()));
    assert_eq!(core.connection(), ConnectionState::Disconnected);
    assert!(!core.is_sending());
    assert_eq!(
        core.drain_notices()[0].text,
        "An error occurred with the AI Assistant connection."
    );
}

#[test]
fn undecodable_frame_resets_turn() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    frame(&mut core, r#"{"type":"start"}"#);
    frame(&mut core, "not json");

    assert!(!core.is_sending());
    assert!(!core.in_flight());
    assert_eq!(core.connection(), ConnectionState::Connected);
    let notices = core.drain_notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].text, "Failed to parse message from AI Assistant.");
}

#[test]
fn unknown_event_is_ignored() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    frame(&mut core, r#"{"type":"heartbeat"}"#);
    assert!(core.is_sending());
    assert_eq!(core.messages().len(), 1);
    assert!(core.drain_notices().is_empty());
}

#[test]
fn final_response_replaces_streamed_text() {
    let mut core = connected();
    core.submit_query("status?").unwrap();
    frame(&mut core, r#"{"type":"start","content":"using a tool"}"#);
    assert_eq!(core.automation().status(), AutomationStatus::Analyzing);
    frame(&mut core, r#"{"type":"chunk","content":"A"}"#);
    frame(&mut core, r#"{"type":"chunk","content":"B"}"#);
    frame(
        &mut core,
        r#"{"type":"tool_result","tool":"ping","success":true,"output":"3/3 replies"}"#,
    );
    assert_eq!(core.automation().status(), AutomationStatus::Executing);
    frame(&mut core, r#"{"type":"final_response","content":"XYZ"}"#);

    assert!(!core.is_sending());
    assert_eq!(core.automation().status(), AutomationStatus::Completed);
    let messages = core.messages().as_slice();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].text, "XYZ");
    assert!(messages[1].is_automation);
    assert_eq!(messages[2].text, "🔧 **ping** executed\n\n3/3 replies");

    let view = core.view();
    assert_eq!(view.messages.len(), 3);
    assert_eq!(view.automation, AutomationStatus::Completed);
    assert!(view.step.is_none());
}

#[test]
fn legacy_reply_frees_input() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    frame(&mut core, r#"{"content":"hello "}"#);
    assert!(!core.is_sending());
    assert!(core.in_flight());
    frame(&mut core, r#"{"content":"hello "}"#);
    frame(&mut core, r#"{"content":"world"}"#);
    assert_eq!(core.messages().as_slice()[1].text, "hello world");

    core.stall();
    assert!(!core.in_flight());
    assert!(!core.messages().as_slice()[1].is_open());
    assert!(core.drain_notices().is_empty());
}

#[test]
fn stall_force_closes_turn() {
    let mut core = connected();
    core.submit_query("Hi").unwrap();
    frame(&mut core, r#"{"type":"start","content":"investigate"}"#);
    frame(&mut core, r#"{"type":"chunk","content":"half"}"#);
    core.stall();

    assert!(!core.is_sending());
    assert!(!core.in_flight());
    assert_eq!(core.automation().status(), AutomationStatus::Failed);
    assert!(!core.messages().as_slice()[1].is_open());
    assert_eq!(
        core.drain_notices()[0].text,
        "The AI Assistant stopped responding."
    );
}

#[test]
fn submit_resets_automation_status() {
    let mut core = connected();
    core.submit_query("one").unwrap();
    frame(&mut core, r#"{"type":"start","content":"tool"}"#);
    frame(&mut core, r#"{"type":"final_response","content":"done"}"#);
    assert_eq!(core.automation().status(), AutomationStatus::Completed);

    core.submit_query("two").unwrap();
    assert_eq!(core.automation().status(), AutomationStatus::Idle);
}

#[test]
fn untagged_reply_is_replayed_in_next_query() {
    let mut core = connected();
    submit(&mut core, "q1");
    frame(&mut core, r#"{"content":"answer one"}"#);
    assert!(core.messages().as_slice()[1].is_open());

    let next = submit(&mut core, "q2");
    let history: Vec<_> = next
        .conversation_history
        .iter()
        .map(|e| (e.sender, e.text.as_str()))
        .collect();
    assert_eq!(
        history,
        [(Sender::User, "q1"), (Sender::Assistant, "answer one")]
    );
    assert!(!core.messages().as_slice()[1].is_open());

    frame(&mut core, r#"{"content":"answer two"}"#);
    assert_eq!(core.messages().len(), 4);
    assert_eq!(core.messages().as_slice()[1].text, "answer one");
}
