//! JSONL stream reader.
//!
//! Each non-blank line is one `StreamRecord`: an event or an admin command.

use guildwatch_schema::{SchemaError, StreamRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamReadError {
    #[error("invalid record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: SchemaError,
    },
}

/// Parse one line. Blank lines yield `None`. `line` is 1-based.
pub fn parse_record_line(line: usize, text: &str) -> Result<Option<StreamRecord>, StreamReadError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    StreamRecord::from_json(trimmed)
        .map(Some)
        .map_err(|source| StreamReadError::Parse { line, source })
}

/// Parse a whole stream, stopping at the first bad line.
pub fn parse_stream(content: &str) -> Result<Vec<StreamRecord>, StreamReadError> {
    let mut records = Vec::new();
    for (idx, text) in content.lines().enumerate() {
        if let Some(record) = parse_record_line(idx + 1, text)? {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildwatch_schema::{
        ActorSnapshot, AdminCommand, ChannelId, CommandRecord, Event, GuildId,
    };

    // ===========================================
    // Test Category C — Stream Parsing
    // ===========================================

    fn message_line(ts_ms: u64) -> String {
        StreamRecord::Event(Event::message(
            GuildId(1),
            ts_ms,
            ActorSnapshot::new(2, "someone", 0),
            ChannelId(3),
        ))
        .to_json()
    }

    #[test]
    fn test_parse_stream_empty() {
        assert!(parse_stream("").expect("parse").is_empty());
    }

    #[test]
    fn test_parse_stream_skips_blank_lines() {
        let content = format!("\n{}\n   \n{}\n", message_line(1), message_line(2));
        let records = parse_stream(&content).expect("parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].ts_ms(), 2);
    }

    #[test]
    fn test_parse_stream_mixes_commands_and_events() {
        let command = StreamRecord::Command(CommandRecord {
            guild: GuildId(1),
            ts_ms: 5,
            command: AdminCommand::RaidOn,
        })
        .to_json();
        let content = format!("{}\n{}\n", message_line(1), command);

        let records = parse_stream(&content).expect("parse");
        assert!(matches!(records[0], StreamRecord::Event(_)));
        assert!(matches!(records[1], StreamRecord::Command(_)));
    }

    #[test]
    fn test_parse_stream_reports_line_number() {
        let content = format!("{}\n\n{{\"record\":\"bogus\"}}\n", message_line(1));
        let err = parse_stream(&content).unwrap_err();
        let StreamReadError::Parse { line, .. } = err;
        assert_eq!(line, 3);
    }

    #[test]
    fn test_parse_record_line_blank() {
        assert!(parse_record_line(1, "  \t ").expect("parse").is_none());
    }
}
