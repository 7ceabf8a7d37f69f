//! Tests for frame reading, writing, and sanitisation.

use std::io;

use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::test_support::{RecordingWriter, ScriptedReader, memory_channel};

fn document_of_len(len: usize) -> Vec<u8> {
    let skeleton = br#"{"pad":""}"#.len();
    let pad = "a".repeat(len - skeleton);
    let bytes = serde_json::to_vec(&json!({ "pad": pad })).expect("serialise");
    assert_eq!(bytes.len(), len);
    bytes
}

#[test]
fn written_frame_reads_back_through_sentinel_boundary() {
    let document = json!({"success": true, "message": "Plugin initialized"});
    let mut writer = Framer::new(RecordingWriter::new());
    writer.write_frame(&document).expect("write frame");

    let wire = writer.into_inner().bytes().to_vec();
    assert!(wire.ends_with(SENTINEL));

    let mut reader =
        Framer::with_boundary(ScriptedReader::new().chunk(wire), FrameBoundary::Sentinel);
    assert_eq!(reader.read_document().expect("read back"), document);
}

#[rstest]
#[case(100)]
#[case(READ_CHUNK_SIZE - 1)]
#[case(READ_CHUNK_SIZE)]
#[case(READ_CHUNK_SIZE + 1)]
#[case(READ_CHUNK_SIZE * 2)]
#[case(READ_CHUNK_SIZE * 3)]
fn short_read_boundary_handles_any_length(#[case] len: usize) {
    let payload = document_of_len(len);
    let mut framer = Framer::new(ScriptedReader::new().chunk(payload.clone()));

    let frame = framer.read_frame().expect("frame should arrive");
    assert_eq!(frame, payload);
    assert!(matches!(
        framer.read_frame(),
        Err(FrameError::StreamClosed)
    ));
}

#[test]
fn short_chunk_ends_frame_without_consuming_the_next_command() {
    let reader = ScriptedReader::new()
        .chunk(br#"{"tool_calls":[{"func":"initialize"}]}"#.to_vec())
        .chunk(br#"{"tool_calls":[{"func":"shutdown"}]}"#.to_vec());
    let mut framer = Framer::new(reader);

    let first = framer.read_document().expect("first command");
    assert_eq!(first["tool_calls"][0]["func"], "initialize");
    assert_eq!(framer.get_ref().reads(), 1);

    let second = framer.read_document().expect("second command");
    assert_eq!(second["tool_calls"][0]["func"], "shutdown");
}

#[test]
fn inbound_sentinel_is_stripped_in_short_read_mode() {
    let mut framer = Framer::new(ScriptedReader::new().chunk(b"{\"a\":1}<<END>>".to_vec()));
    assert_eq!(framer.read_document().expect("decode"), json!({"a": 1}));
}

#[rstest]
#[case(FrameBoundary::ShortRead)]
#[case(FrameBoundary::Sentinel)]
fn sentinel_inside_a_string_is_payload(#[case] boundary: FrameBoundary) {
    let command = br#"{"tool_calls":[{"func":"echo","params":{"text":"what is <<END>>?"}}]}"#;
    let mut wire = command.to_vec();
    wire.extend_from_slice(SENTINEL);
    let mut framer = Framer::with_boundary(ScriptedReader::new().chunk(wire), boundary);

    let document = framer.read_document().expect("one whole command");
    assert_eq!(
        document["tool_calls"][0]["params"]["text"],
        "what is <<END>>?"
    );
    assert!(matches!(
        framer.read_frame(),
        Err(FrameError::StreamClosed)
    ));
}

#[test]
fn unterminated_short_read_with_embedded_sentinel_is_one_frame() {
    let reader = ScriptedReader::new()
        .chunk(br#"{"text":"<<END>>"}"#.to_vec())
        .chunk(br#"{"text":"next"}"#.to_vec());
    let mut framer = Framer::new(reader);

    assert_eq!(
        framer.read_document().expect("first"),
        json!({"text": "<<END>>"})
    );
    assert_eq!(
        framer.read_document().expect("second is not corrupted"),
        json!({"text": "next"})
    );
}

#[test]
fn escaped_quotes_do_not_end_the_string() {
    let reader = ScriptedReader::new()
        .chunk(br#"{"message":"say \"<<END>>\" twice\\"}<<END>>{"success":true}<<END>>"#.to_vec());
    let mut framer = Framer::with_boundary(reader, FrameBoundary::Sentinel);

    assert_eq!(
        framer.read_document().expect("partial"),
        json!({"message": "say \"<<END>>\" twice\\"})
    );
    assert_eq!(
        framer.read_document().expect("final"),
        json!({"success": true})
    );
}

#[test]
fn packed_commands_still_split_in_short_read_mode() {
    let reader = ScriptedReader::new().chunk(
        br#"{"tool_calls":[{"func":"initialize"}]}<<END>>{"tool_calls":[{"func":"shutdown"}]}<<END>>"#
            .to_vec(),
    );
    let mut framer = Framer::new(reader);

    let first = framer.read_document().expect("first");
    let second = framer.read_document().expect("second");
    assert_eq!(first["tool_calls"][0]["func"], "initialize");
    assert_eq!(second["tool_calls"][0]["func"], "shutdown");
}

#[test]
fn sentinel_boundary_reassembles_split_reply() {
    let reader = ScriptedReader::new()
        .chunk(b"{\"succ".to_vec())
        .chunk(b"ess\":true}<<E".to_vec())
        .chunk(b"ND>>".to_vec());
    let mut framer = Framer::with_boundary(reader, FrameBoundary::Sentinel);

    assert_eq!(
        framer.read_document().expect("reassembled"),
        json!({"success": true})
    );
}

#[test]
fn sentinel_boundary_separates_packed_frames() {
    let reader = ScriptedReader::new()
        .chunk(b"{\"message\":\"one\"}<<END>>{\"message\":\"two\"}<<END>>{\"success\":".to_vec())
        .chunk(b"true}<<END>>".to_vec());
    let mut framer = Framer::with_boundary(reader, FrameBoundary::Sentinel);

    let frames: Vec<Value> = (0..3)
        .map(|_| framer.read_document().expect("frame"))
        .collect();
    assert_eq!(
        frames,
        vec![
            json!({"message": "one"}),
            json!({"message": "two"}),
            json!({"success": true}),
        ]
    );
    assert!(matches!(
        framer.read_frame(),
        Err(FrameError::StreamClosed)
    ));
}

#[test]
fn end_of_stream_terminates_unfinished_frame() {
    let mut framer = Framer::with_boundary(
        ScriptedReader::new().chunk(b"{\"success\":false}".to_vec()),
        FrameBoundary::Sentinel,
    );
    assert_eq!(
        framer.read_document().expect("frame"),
        json!({"success": false})
    );
}

#[test]
fn immediate_end_of_stream_is_a_read_failure() {
    let mut framer = Framer::new(ScriptedReader::new());
    let error = framer.read_frame().expect_err("nothing to read");
    assert!(matches!(error, FrameError::StreamClosed));
    assert!(error.is_read_failure());
}

#[test]
fn io_errors_become_read_failures() {
    let mut framer = Framer::new(ScriptedReader::new().error(io::ErrorKind::BrokenPipe));
    let error = framer.read_frame().expect_err("read should fail");
    assert!(matches!(error, FrameError::Read { .. }));
}

#[test]
fn interrupted_reads_are_retried() {
    let reader = ScriptedReader::new()
        .error(io::ErrorKind::Interrupted)
        .chunk(b"{}".to_vec());
    let mut framer = Framer::new(reader);
    assert_eq!(framer.read_document().expect("retried"), json!({}));
}

#[test]
fn invalid_json_is_a_decode_failure() {
    let mut framer = Framer::new(ScriptedReader::new().chunk(b"not json at all".to_vec()));
    let error = framer.read_document().expect_err("decode should fail");
    assert!(error.is_decode_failure());
}

#[rstest]
#[case("{\"a\":\u{0}1}", json!({"a": 1}))]
#[case("{\u{7}\"a\":\"b\u{1B}c\"}", json!({"a": "bc"}))]
#[case("{\"a\":\"zero\u{200B}width\"}", json!({"a": "zerowidth"}))]
#[case("\u{FEFF}{\"a\":\"rtl\u{202E}\"}", json!({"a": "rtl"}))]
#[case("{\"a\":\r\n\t\"kept\"}", json!({"a": "kept"}))]
fn sanitisation_strips_non_printable_code_points(#[case] raw: &str, #[case] expected: Value) {
    assert_eq!(decode_frame(raw.as_bytes()).expect("decode"), expected);
}

#[test]
fn invalid_utf8_is_dropped_before_parsing() {
    let mut raw = b"{\"a\":\"x".to_vec();
    raw.extend_from_slice(&[0xFF, 0xFE]);
    raw.extend_from_slice(b"y\"}");
    assert_eq!(decode_frame(&raw).expect("decode"), json!({"a": "xy"}));
}

#[test]
fn sanitize_keeps_whitespace_and_text() {
    assert_eq!(sanitize("line\none\tcafé\r".as_bytes()), "line\none\tcafé\r");
}

#[test]
fn empty_payload_still_receives_sentinel() {
    let mut framer = Framer::new(RecordingWriter::new());
    let written = framer.write_raw(b"").expect("write sentinel");
    assert_eq!(written, SENTINEL.len());
    assert_eq!(framer.get_ref().bytes(), SENTINEL);
}

#[test]
fn frame_is_written_compactly_in_one_call() {
    let mut framer = Framer::new(RecordingWriter::new());
    framer
        .write_frame(&json!({"success": true, "message": "ok"}))
        .expect("write");

    let writer = framer.into_inner();
    assert_eq!(writer.writes(), 1);
    assert_eq!(writer.bytes(), b"{\"message\":\"ok\",\"success\":true}<<END>>");
}

#[test]
fn short_write_is_reported() {
    let mut framer = Framer::new(RecordingWriter::new().accepting_at_most(4));
    let error = framer
        .write_frame(&json!({"success": true}))
        .expect_err("short write");
    assert!(matches!(
        error,
        FrameError::ShortWrite {
            written: 4,
            expected: 23
        }
    ));
}

#[test]
fn write_errors_are_reported() {
    let mut framer = Framer::new(RecordingWriter::new().failing(io::ErrorKind::BrokenPipe));
    let error = framer
        .write_frame(&json!({"success": true}))
        .expect_err("write fails");
    assert!(matches!(error, FrameError::Write { .. }));
}

#[test]
fn duplex_routes_reads_and_writes_to_their_halves() {
    let mut framer = Framer::new(memory_channel(ScriptedReader::new().chunk(b"{}".to_vec())));
    assert_eq!(framer.read_document().expect("read"), json!({}));
    framer.write_raw(b"{}").expect("write");

    let (reader, writer) = framer.into_inner().into_parts();
    assert_eq!(reader.reads(), 1);
    assert_eq!(writer.bytes(), b"{}<<END>>");
}
