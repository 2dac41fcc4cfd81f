//! Event-stream parsing for classification responses
//!
//! The run endpoint answers with blocks separated by blank lines. Blocks that
//! start with `data:` carry one JSON event; anything else, or a payload that is
//! not valid JSON, is noise and is skipped.

use serde_json::Value;

/// Marker that starts a data block
pub const DATA_PREFIX: &str = "data:";

/// Location of the terminal result inside a qualifying event
pub const FINAL_RESULT_POINTER: &str = "/actions/stateDelta/final_json";

/// Parse every data block in document order, skipping unparseable ones
pub fn parse_event_stream(body: &str) -> Vec<Value> {
    let normalized = body.replace("\r\n", "\n");

    normalized
        .split("\n\n")
        .map(str::trim)
        .filter_map(|block| block.strip_prefix(DATA_PREFIX))
        .filter_map(|payload| serde_json::from_str::<Value>(payload.trim()).ok())
        .collect()
}

/// First `final_json` produced by `author`, in document order
pub fn find_final_result<'a>(events: &'a [Value], author: &str) -> Option<&'a Value> {
    events
        .iter()
        .filter(|event| event.get("author").and_then(Value::as_str) == Some(author))
        .find_map(|event| event.pointer(FINAL_RESULT_POINTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(event: &Value) -> String {
        format!("data: {event}\n\n")
    }

    fn final_event(author: &str, result: Value) -> Value {
        json!({
            "author": author,
            "actions": {"stateDelta": {"final_json": result}}
        })
    }

    #[test]
    fn test_parses_data_blocks_in_order() {
        let body = format!(
            "{}{}",
            block(&json!({"author": "router", "n": 1})),
            block(&json!({"author": "router", "n": 2}))
        );

        let events = parse_event_stream(&body);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["n"], 1);
        assert_eq!(events[1]["n"], 2);
    }

    #[test]
    fn test_skips_noise_and_bad_json() {
        let body = concat!(
            ": keep-alive\n\n",
            "event: ping\n\n",
            "data: {not json}\n\n",
            "data: {\"author\": \"a\"}\n\n",
            "garbage"
        );

        let events = parse_event_stream(body);
        assert_eq!(events, vec![json!({"author": "a"})]);
    }

    #[test]
    fn test_handles_crlf_and_missing_space() {
        let body = "data:{\"n\":1}\r\n\r\ndata: {\"n\":2}\r\n\r\n";
        let events = parse_event_stream(body);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_empty_body_has_no_events() {
        assert!(parse_event_stream("").is_empty());
        assert!(parse_event_stream("\n\n\n").is_empty());
    }

    #[test]
    fn test_first_qualifying_event_wins() {
        let events = vec![
            json!({"author": "triage_agent", "content": {"parts": []}}),
            final_event("json_generator", json!({"Id": "first"})),
            final_event("json_generator", json!({"Id": "second"})),
        ];

        let found = find_final_result(&events, "json_generator").unwrap();
        assert_eq!(found["Id"], "first");
    }

    #[test]
    fn test_other_authors_are_ignored() {
        let events = vec![
            final_event("triage_agent", json!({"Id": "wrong"})),
            final_event("json_generator", json!({"Id": "right"})),
        ];

        let found = find_final_result(&events, "json_generator").unwrap();
        assert_eq!(found["Id"], "right");
    }

    #[test]
    fn test_author_without_final_json_is_skipped() {
        let events = vec![
            json!({"author": "json_generator", "actions": {"stateDelta": {}}}),
            json!({"author": "json_generator"}),
        ];

        assert!(find_final_result(&events, "json_generator").is_none());
    }

    #[test]
    fn test_round_trip_through_stream() {
        let body = format!(
            "{}{}",
            block(&json!({"author": "triage_agent"})),
            block(&final_event("json_generator", json!({"Id": "500A", "Tier__c": "T3"})))
        );

        let events = parse_event_stream(&body);
        let found = find_final_result(&events, "json_generator").unwrap();
        assert_eq!(found["Tier__c"], "T3");
    }
}
