//! Message assembly tests.

use netops_client::MessageList;
use netops_client::assembler::{Assembler, Op, transition};
use netops_client::message::MessageId;
use protocol::{FragmentKey, Sender, ServerEvent, ToolResult};

fn chunk(content: &str) -> ServerEvent {
    ServerEvent::Chunk {
        content: content.into(),
        seq: None,
    }
}

fn legacy(content: &str) -> ServerEvent {
    ServerEvent::Legacy {
        content: content.into(),
        key: FragmentKey::of_content(content),
    }
}

fn tool(name: &str) -> ServerEvent {
    ServerEvent::ToolResult(ToolResult {
        tool: name.into(),
        success: true,
        output: "ok".into(),
        data: None,
    })
}

fn feed(events: &[ServerEvent]) -> (Assembler, MessageList) {
    let mut assembler = Assembler::new();
    let mut messages = MessageList::new();
    for event in events {
        assembler.apply(event, false, &mut messages);
    }
    (assembler, messages)
}

#[test]
fn chunks_concatenate_in_order() {
    let (assembler, messages) = feed(&[
        ServerEvent::Start { content: None },
        chunk("show "),
        chunk("ip "),
        chunk("route"),
        ServerEvent::End,
    ]);
    assert_eq!(messages.len(), 1);
    let message = &messages.as_slice()[0];
    assert_eq!(message.text, "show ip route");
    assert_eq!(message.sender, Sender::Assistant);
    assert!(!message.is_open());
    assert!(assembler.pending().is_none());
}

#[test]
fn chunk_without_start_opens_message() {
    let (assembler, messages) = feed(&[chunk("Hel"), chunk("lo")]);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.as_slice()[0].text, "Hello");
    assert!(messages.as_slice()[0].is_open());
    assert_eq!(assembler.pending(), Some(&messages.as_slice()[0].id));
}

#[test]
fn final_response_replaces_text() {
    let (_, messages) = feed(&[
        ServerEvent::Start { content: None },
        chunk("A"),
        chunk("B"),
        ServerEvent::FinalResponse {
            content: "XYZ".into(),
        },
    ]);
    assert_eq!(messages.len(), 1);
    let message = &messages.as_slice()[0];
    assert_eq!(message.text, "XYZ");
    assert!(message.is_automation);
    assert!(!message.is_open());
}

#[test]
fn final_response_without_open_message_pushes_one() {
    let (assembler, messages) = feed(&[ServerEvent::FinalResponse {
        content: "done".into(),
    }]);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.as_slice()[0].text, "done");
    assert!(messages.as_slice()[0].is_automation);
    assert!(!messages.as_slice()[0].is_open());
    assert!(assembler.pending().is_none());
}

#[test]
fn tool_result_is_independent_and_closed() {
    let (assembler, messages) = feed(&[
        ServerEvent::Start { content: None },
        chunk("checking"),
        tool("traceroute"),
        chunk("..."),
    ]);
    assert_eq!(messages.len(), 2);

    let open = &messages.as_slice()[0];
    assert_eq!(open.text, "checking...");
    assert!(open.is_open());
    assert_eq!(assembler.pending(), Some(&open.id));

    let tool = &messages.as_slice()[1];
    assert_ne!(tool.id, open.id);
    assert!(!tool.is_open());
    assert!(tool.is_automation);
    assert_eq!(tool.text, "🔧 **traceroute** executed\n\nok");
    assert_eq!(tool.tool_result.as_ref().unwrap().tool, "traceroute");
}

#[test]
fn legacy_duplicates_apply_once() {
    let (_, messages) = feed(&[legacy("uplink flapping"), legacy("uplink flapping")]);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.as_slice()[0].text, "uplink flapping");
}

#[test]
fn legacy_distinct_fragments_append() {
    let (_, messages) = feed(&[legacy("uplink "), legacy("flapping")]);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.as_slice()[0].text, "uplink flapping");
}

#[test]
fn sequenced_chunks_deduplicate() {
    let seq = |content: &str, seq| ServerEvent::Chunk {
        content: content.into(),
        seq: Some(seq),
    };
    let (_, messages) = feed(&[seq("a", 1), seq("b", 2), seq("b", 2), seq("c", 3)]);
    assert_eq!(messages.as_slice()[0].text, "abc");
}

#[test]
fn fragment_set_clears_on_close() {
    let (_, messages) = feed(&[legacy("same"), ServerEvent::End, legacy("same")]);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.as_slice()[1].text, "same");
}

#[test]
fn error_clears_pointer_and_next_start_is_new() {
    let (assembler, messages) = feed(&[
        ServerEvent::Start { content: None },
        chunk("partial"),
        ServerEvent::Error {
            message: Some("backend down".into()),
        },
    ]);
    assert!(assembler.pending().is_none());
    assert!(!messages.as_slice()[0].is_open());

    let mut assembler = assembler;
    let mut messages = messages;
    assembler.apply(&ServerEvent::Start { content: None }, false, &mut messages);
    assembler.apply(&chunk("fresh"), false, &mut messages);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.as_slice()[0].text, "partial");
    assert_eq!(messages.as_slice()[1].text, "fresh");
}

#[test]
fn second_start_abandons_previous_message() {
    let (_, messages) = feed(&[
        ServerEvent::Start { content: None },
        chunk("one"),
        ServerEvent::Start { content: None },
        chunk("two"),
    ]);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.as_slice()[0].text, "one");
    assert!(!messages.as_slice()[0].is_open());
    assert_eq!(messages.as_slice()[1].text, "two");
}

#[test]
fn empty_chunk_is_noop() {
    let (assembler, messages) = feed(&[chunk("")]);
    assert!(messages.is_empty());
    assert!(assembler.pending().is_none());
}

#[test]
fn reset_closes_open_message() {
    let (mut assembler, mut messages) = feed(&[chunk("half")]);
    assembler.reset(&mut messages);
    assert!(assembler.pending().is_none());
    assert!(!messages.as_slice()[0].is_open());
    let id = messages.as_slice()[0].id.clone();
    assert!(!messages.append(&id, "more"));
}

#[test]
fn start_marks_automation_when_hinted() {
    let mut assembler = Assembler::new();
    let mut messages = MessageList::new();
    assembler.apply(
        &ServerEvent::Start {
            content: Some("investigate".into()),
        },
        true,
        &mut messages,
    );
    assert!(messages.as_slice()[0].is_automation);
}

mod pure {
    use super::*;

    fn ids() -> impl FnMut() -> MessageId {
        let mut n = 0;
        move || {
            n += 1;
            MessageId::from(format!("m{n}").as_str())
        }
    }

    #[test]
    fn start_opens_and_points() {
        let t = transition(None, &ServerEvent::Start { content: None }, false, ids());
        assert_eq!(t.pending, Some(MessageId::from("m1")));
        assert!(matches!(&t.ops[..], [Op::Open(m)] if m.id == MessageId::from("m1") && m.is_open()));
    }

    #[test]
    fn chunk_with_pointer_appends() {
        let pending = MessageId::from("open");
        let t = transition(Some(&pending), &chunk("x"), false, ids());
        assert_eq!(t.pending, Some(pending.clone()));
        assert_eq!(
            t.ops,
            vec![Op::Append {
                id: pending,
                text: "x".into()
            }]
        );
    }

    #[test]
    fn end_closes_and_clears() {
        let pending = MessageId::from("open");
        let t = transition(Some(&pending), &ServerEvent::End, false, ids());
        assert_eq!(t.pending, None);
        assert_eq!(t.ops, vec![Op::Close(pending)]);
    }

    #[test]
    fn end_without_pointer_is_noop() {
        let t = transition(None, &ServerEvent::End, false, ids());
        assert_eq!(t.pending, None);
        assert!(t.ops.is_empty());
    }

    #[test]
    fn final_response_replaces_then_closes() {
        let pending = MessageId::from("open");
        let t = transition(
            Some(&pending),
            &ServerEvent::FinalResponse {
                content: "XYZ".into(),
            },
            false,
            ids(),
        );
        assert_eq!(t.pending, None);
        assert_eq!(
            t.ops,
            vec![
                Op::Replace {
                    id: pending.clone(),
                    text: "XYZ".into(),
                    automation: true,
                },
                Op::Close(pending),
            ]
        );
    }

    #[test]
    fn tool_result_keeps_pointer() {
        let pending = MessageId::from("open");
        let t = transition(Some(&pending), &tool("ping"), false, ids());
        assert_eq!(t.pending, Some(pending));
        assert!(matches!(&t.ops[..], [Op::Push(m)] if !m.is_open() && m.tool_result.is_some()));
    }
}
