//! Shared fixtures for chat client tests.


use rise_plugin::SENTINEL;
use rise_plugin::test_support::{MemoryChannel, ScriptedReader, memory_channel};
use serde_json::Value;

use crate::connection::PluginConnection;
use crate::session::ChatSession;

/// Builds a session whose plugin answers with `replies`, in order.
pub(crate) fn scripted_session(replies: &[Value], func: &str) -> ChatSession<MemoryChannel> {
    let reader = replies.iter().fold(ScriptedReader::new(), |reader, reply| {
        let mut bytes = reply.to_string().into_bytes();
        bytes.extend_from_slice(SENTINEL);
        reader.chunk(bytes)
    });
    ChatSession::new(PluginConnection::new(memory_channel(reader)), func)
}

/// Frames the session has sent so far.
pub(crate) fn sent_frames(session: &ChatSession<MemoryChannel>) -> Vec<Value> {
    session
        .connection()
        .channel()
        .writer()
        .frames()
        .expect("sent frames are JSON")
}
