//! Crate-level integration and BDD tests.

use serde_json::json;

use crate::dispatch::{Dispatcher, HandlerContext, HandlerRegistry, LifecycleState, Session};
use crate::framing::{FrameBoundary, Framer};
use crate::protocol::{ReplyFrame, ResponseEnvelope};
use crate::test_support::{ScriptedReader, memory_channel};


pub(crate) fn echo_registry() -> HandlerRegistry<()> {
    HandlerRegistry::new()
        .with("echo", |_: &mut (), context: &mut HandlerContext<'_>| {
            Ok(ResponseEnvelope::success(context.required_str("text")?))
        })
        .expect("register echo")
}

#[test]
fn plugin_output_is_readable_by_a_sentinel_framer() {
    let reader = ScriptedReader::new()
        .command(&json!({"tool_calls": [{"func": "initialize"}]}))
        .command(&json!({"tool_calls": [{"func": "echo", "params": {"text": "hi"}}]}))
        .command(&json!({"tool_calls": [{"func": "shutdown"}]}));
    let mut session = Session::new((), echo_registry());
    let mut plugin = Framer::new(memory_channel(reader));

    Dispatcher::new()
        .run(&mut session, &mut plugin)
        .expect("plugin loop ends");
    assert_eq!(session.lifecycle(), LifecycleState::Stopped);

    let (_, writer) = plugin.into_inner().into_parts();
    let mut host = Framer::with_boundary(
        ScriptedReader::new().chunk(writer.bytes().to_vec()),
        FrameBoundary::Sentinel,
    );
    let replies: Vec<ReplyFrame> = (0..3)
        .map(|_| {
            let document = host.read_document().expect("reply frame");
            serde_json::from_value(document).expect("reply shape")
        })
        .collect();

    assert!(replies.iter().all(ReplyFrame::is_final));
    assert_eq!(
        replies.get(1),
        Some(&ReplyFrame::Final(ResponseEnvelope::success("hi")))
    );
}
