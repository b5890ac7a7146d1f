//! Shared SSE draining for the HTTP adapter's streaming invocations.
//!
//! SSE events are delimited by a blank line; each block may carry
//! `event:`, `data:`, `id:`, or `retry:` lines. Only `data:` lines matter
//! here.

/// Drains complete `data:` payloads out of `buffer` in place, leaving any
/// trailing partial event for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_single_event() {
        let mut buf = String::from("event: message\ndata: {\"a\":1}\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["{\"a\":1}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn leaves_partial_event_in_buffer() {
        let mut buf = String::from("data: complete\n\ndata: partial");
        assert_eq!(drain_data_lines(&mut buf), vec!["complete"]);
        assert_eq!(buf, "data: partial");
    }

    #[test]
    fn skips_empty_data_lines() {
        let mut buf = String::from("data: \n\n");
        assert!(drain_data_lines(&mut buf).is_empty());
    }

    #[test]
    fn incremental_buffering_across_calls() {
        let mut buf = String::from("data: chunk1");
        assert!(drain_data_lines(&mut buf).is_empty());
        buf.push_str("\n\ndata: chunk2\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["chunk1", "chunk2"]);
    }
}
