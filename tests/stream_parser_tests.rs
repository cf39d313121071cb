use rudder::engine::stream::StreamParser;
use rudder::types::{FragmentContent, StreamEntry};

#[test]
fn test_fragmented_frames_reassemble() {
    let mut parser = StreamParser::new();

    let chunk1 = b"event: updates\ndata: {\"agent\":{\"final_re";
    let entries1 = parser.process(chunk1).expect("first chunk parse");
    assert_eq!(entries1.len(), 0);

    let chunk2 = b"port\":\"done\"}}\n\n";
    let entries2 = parser.process(chunk2).expect("second chunk parse");
    assert_eq!(entries2.len(), 1);

    match &entries2[0] {
        StreamEntry::Updates(payload) => {
            let agent = payload.0.get("agent").expect("agent node");
            assert_eq!(agent["final_report"], "done");
        }
        other => panic!("unexpected entry: {other:?}"),
    }
}

#[test]
fn test_malformed_json_does_not_fail_parser() {
    let mut parser = StreamParser::new();

    let entries = parser
        .process(b"event: updates\ndata: {invalid json}\n\n")
        .expect("malformed frames are skipped, not fatal");
    assert_eq!(entries.len(), 0);

    // The parser keeps working after the bad frame.
    let entries = parser
        .process(b"event: updates\ndata: {\"agent\":{\"final_report\":\"ok\"}}\n\n")
        .expect("later frames still parse");
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_unknown_stream_kind_is_skipped() {
    let mut parser = StreamParser::new();

    let entries = parser
        .process(b"event: metrics\ndata: {\"tokens\": 12}\n\n")
        .expect("unknown kinds are skipped");
    assert!(entries.is_empty());
}

#[test]
fn test_messages_frame_decodes_fragments() {
    let mut parser = StreamParser::new();

    let chunk = b"event: messages\ndata: {\"chunk\":{\"content\":[{\"type\":\"thinking\",\"thinking\":\"hm\"},\"plain\"]},\"metadata\":{}}\n\n";
    let entries = parser.process(chunk).expect("messages frame");
    assert_eq!(entries.len(), 1);

    match &entries[0] {
        StreamEntry::Messages(payload) => match &payload.chunk.content {
            FragmentContent::Fragments(fragments) => assert_eq!(fragments.len(), 2),
            other => panic!("unexpected content: {other:?}"),
        },
        other => panic!("unexpected entry: {other:?}"),
    }
}

#[test]
fn test_multiple_frames_in_one_chunk() {
    let mut parser = StreamParser::new();

    let chunk = b"event: updates\ndata: {\"tools\":{\"tools_executed\":[]}}\n\nevent: updates\ndata: {\"agent\":{\"final_report\":\"x\"}}\n\n";
    let entries = parser.process(chunk).expect("two frames");
    assert_eq!(entries.len(), 2);
}
