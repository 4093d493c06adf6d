//! Parsing of LPEC protocol lines
//!
//! Two line kinds matter to a subscriber:
//!
//! ```text
//! ALIVE Ds 4c494e4e-0026-0f22-646e-01560511013f
//! EVENT 3 TransportState "Playing" Status "Yes"
//! ```
//!
//! Values are double-quoted and may contain `\"` and `\\` escapes.

use std::fmt;

use crate::error::{LpecError, Result};

/// Receiver variables tracked by monitors and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    TransportState,
    /// The sender reference; reported as `Sender` or `Uri` depending on firmware
    Sender,
    Status,
    ProtocolInfo,
}

impl Variable {
    pub const ALL: [Variable; 4] = [
        Variable::TransportState,
        Variable::Sender,
        Variable::Status,
        Variable::ProtocolInfo,
    ];

    /// Canonical name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Variable::TransportState => "TransportState",
            Variable::Sender => "Sender",
            Variable::Status => "Status",
            Variable::ProtocolInfo => "ProtocolInfo",
        }
    }

    /// Look up a recognized variable; unrecognized names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TransportState" => Some(Variable::TransportState),
            "Sender" | "Uri" => Some(Variable::Sender),
            "Status" => Some(Variable::Status),
            "ProtocolInfo" => Some(Variable::ProtocolInfo),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `ALIVE <service> <identifier>` announcement sent by the device on connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub service: String,
    pub identifier: String,
}

/// One parsed `EVENT` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LpecEvent {
    pub sequence: u64,
    /// Every `Name "value"` pair on the line, recognized or not, in order
    pub pairs: Vec<(String, String)>,
}

impl LpecEvent {
    /// The recognized variables carried by this event
    pub fn variables(&self) -> impl Iterator<Item = (Variable, &str)> + '_ {
        self.pairs
            .iter()
            .filter_map(|(name, value)| Variable::from_name(name).map(|v| (v, value.as_str())))
    }

    /// Raw value of any pair by name
    pub fn value(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Whether a line is an event line at all
pub fn is_event_line(line: &str) -> bool {
    line.trim_start().starts_with("EVENT")
}

/// Parse an `ALIVE` announcement; other lines yield `None`
pub fn parse_alive(line: &str) -> Option<Announcement> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "ALIVE" {
        return None;
    }
    let service = parts.next()?.to_string();
    let identifier = parts.next()?.to_string();
    Some(Announcement { service, identifier })
}

/// Parse an `EVENT <sequence> <payload>` line
pub fn parse_event(line: &str) -> Result<LpecEvent> {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix("EVENT")
        .ok_or_else(|| LpecError::Parse(format!("not an event line: {}", trimmed)))?;

    let tokens = tokenize(rest)?;
    let mut iter = tokens.into_iter().peekable();

    let sequence = match iter.next() {
        Some(Token::Word(word)) => word
            .parse::<u64>()
            .map_err(|_| LpecError::Parse(format!("invalid event sequence '{}'", word)))?,
        _ => return Err(LpecError::Parse(format!("missing event sequence: {}", trimmed))),
    };

    let mut pairs = Vec::new();
    while let Some(token) = iter.next() {
        if let Token::Word(name) = token {
            if matches!(iter.peek(), Some(Token::Quoted(_))) {
                if let Some(Token::Quoted(value)) = iter.next() {
                    pairs.push((name, value));
                }
            }
        }
    }

    Ok(LpecEvent { sequence, pairs })
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => break,
                    },
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(LpecError::Parse(format!("unterminated quoted value in '{}'", input.trim())));
            }
            tokens.push(Token::Quoted(value));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_parse_event_with_two_variables() {
        let event = parse_event(r#"EVENT 3 TransportState "Playing" Status "Yes""#).unwrap();
        assert_eq!(event.sequence, 3);
        let vars: Vec<_> = event.variables().collect();
        assert_eq!(
            vars,
            vec![(Variable::TransportState, "Playing"), (Variable::Status, "Yes")]
        );
    }

    #[test]
    fn test_unrecognized_variables_are_kept_raw_but_not_recognized() {
        let event = parse_event(r#"EVENT 7 Metadata "" TransportState "Stopped""#).unwrap();
        assert_eq!(event.pairs.len(), 2);
        assert_eq!(event.value("Metadata"), Some(""));
        assert_eq!(event.variables().count(), 1);
    }

    #[test]
    fn test_uri_is_an_alias_for_sender() {
        let event = parse_event(r#"EVENT 1 Uri "ohz://239.255.255.250:51972/udn""#).unwrap();
        assert_eq!(
            event.variables().next(),
            Some((Variable::Sender, "ohz://239.255.255.250:51972/udn"))
        );
    }

    #[test]
    fn test_escaped_quotes_in_values() {
        let event = parse_event(r#"EVENT 2 Status "say \"hi\" \\ bye""#).unwrap();
        assert_eq!(event.value("Status"), Some(r#"say "hi" \ bye"#));
    }

    #[test]
    fn test_extra_words_between_pairs_are_ignored() {
        // subscription id and sequence both present
        let event = parse_event(r#"EVENT 12 0 TransportState "Buffering""#).unwrap();
        assert_eq!(event.sequence, 12);
        assert_eq!(event.value("TransportState"), Some("Buffering"));
    }

    #[rstest]
    #[case("EVENT")]
    #[case("EVENT abc TransportState \"Playing\"")]
    #[case("EVENT 4 TransportState \"Playing")]
    #[case("ALIVE Ds udn")]
    fn test_malformed_lines_are_errors(#[case] line: &str) {
        assert!(matches!(parse_event(line), Err(LpecError::Parse(_))));
    }

    #[test]
    fn test_parse_alive() {
        assert_eq!(
            parse_alive("ALIVE Ds 4c494e4e-0026-0f22-646e-01560511013f"),
            Some(Announcement {
                service: "Ds".to_string(),
                identifier: "4c494e4e-0026-0f22-646e-01560511013f".to_string(),
            })
        );
        assert_eq!(parse_alive("ALIVE Ds"), None);
        assert_eq!(parse_alive("EVENT 1"), None);
    }

    #[test]
    fn test_variable_names_round_trip() {
        for variable in Variable::ALL {
            assert_eq!(Variable::from_name(variable.name()), Some(variable));
        }
        assert_eq!(Variable::from_name("Volume"), None);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(line in "\\PC*") {
            let _ = parse_event(&line);
        }

        #[test]
        fn prop_plain_values_survive_parsing(seq in 0u64..1_000_000, value in "[A-Za-z0-9 :/._-]{0,40}") {
            let line = format!("EVENT {} TransportState \"{}\"", seq, value);
            let event = parse_event(&line).unwrap();
            prop_assert_eq!(event.sequence, seq);
            prop_assert_eq!(event.value("TransportState"), Some(value.as_str()));
        }
    }
}
