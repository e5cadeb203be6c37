//! Chat command parsing. Dispatch lives in the coordinator; this module
//! only turns message text into typed commands.

use std::str::FromStr;

use booking::model::Bracket;
use engine::lifecycle::RefundKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List currently active bookings (managers only).
    Bookings,
    /// Claim an untaken booking; a 3v3 teammate comes from the mentions.
    Take { booking_id: String },
    /// Mark a booking as complete.
    Done { booking_id: String },
    Refund { kind: RefundKind, booking_id: String },
    /// Re-register the realms payment is collected on.
    SetRealms { booking_id: String },
    /// Hand a booking to the mentioned user.
    Transfer { booking_id: String },
    /// List fairness weights for a bracket (managers only).
    Weights { bracket: Bracket },
    /// Set the mentioned user's fairness weight (managers only).
    SetWeight { bracket: Bracket, value: f64 },
    Shutdown { force: bool },
}

/// Parse `content` against `prefix`. `None` when the message is not a
/// command at all; `Some(Err(..))` when it is one but the arguments are
/// unusable (the error line goes back to the user).
pub fn parse(prefix: &str, content: &str) -> Option<Result<Command, String>> {
    let rest = content.strip_prefix(prefix)?;
    let mut parts = rest.split_whitespace();
    let name = parts.next()?;

    let mut required = |what: &str| -> Result<String, String> {
        parts
            .next()
            .map(str::to_string)
            .ok_or_else(|| format!("Missing argument: {what}"))
    };

    let parsed = match name {
        "bookings" => Ok(Command::Bookings),
        "take" => required("booking ID").map(|booking_id| Command::Take { booking_id }),
        "done" => required("booking ID").map(|booking_id| Command::Done { booking_id }),
        "refund" => required("refund amount ('full' or 'partial')")
            .and_then(|kind| {
                RefundKind::from_str(&kind).map_err(|e| e.user_message())
            })
            .and_then(|kind| {
                required("booking ID").map(|booking_id| Command::Refund { kind, booking_id })
            }),
        "setrealms" => required("booking ID").map(|booking_id| Command::SetRealms { booking_id }),
        "transfer" => required("booking ID").map(|booking_id| Command::Transfer { booking_id }),
        "weights" => required("bracket ('2v2' or '3v3')").and_then(|b| {
            Bracket::from_str(&b)
                .map(|bracket| Command::Weights { bracket })
                .map_err(|_| "Bracket must be '2v2' or '3v3'".to_string())
        }),
        "setweight" => required("bracket ('2v2' or '3v3')")
            .and_then(|b| {
                Bracket::from_str(&b).map_err(|_| "Bracket must be '2v2' or '3v3'".to_string())
            })
            .and_then(|bracket| {
                required("weight value").and_then(|v| {
                    v.parse::<f64>()
                        .map(|value| Command::SetWeight { bracket, value })
                        .map_err(|_| "Weight value must be a number".to_string())
                })
            }),
        "shutdown" => Ok(Command::Shutdown {
            force: parts.next() == Some("force"),
        }),
        _ => return None,
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_commands_are_ignored() {
        assert!(parse("!", "hello there").is_none());
        assert!(parse("!", "!unknowncommand 123").is_none());
        assert!(parse("!", "?take 123").is_none());
    }

    #[test]
    fn take_and_done_need_a_booking_id() {
        assert_eq!(
            parse("!", "!take 1234567890"),
            Some(Ok(Command::Take {
                booking_id: "1234567890".to_string()
            }))
        );
        assert!(matches!(parse("!", "!done"), Some(Err(_))));
    }

    #[test]
    fn refund_parses_kind_then_id() {
        assert_eq!(
            parse("!", "!refund partial 42"),
            Some(Ok(Command::Refund {
                kind: RefundKind::Partial,
                booking_id: "42".to_string()
            }))
        );
        assert!(matches!(parse("!", "!refund half 42"), Some(Err(_))));
        assert!(matches!(parse("!", "!refund full"), Some(Err(_))));
    }

    #[test]
    fn weight_commands_parse_bracket_and_value() {
        assert_eq!(
            parse("!", "!weights 2v2"),
            Some(Ok(Command::Weights {
                bracket: Bracket::TwoVsTwo
            }))
        );
        assert_eq!(
            parse("!", "!setweight 3v3 1.5"),
            Some(Ok(Command::SetWeight {
                bracket: Bracket::ThreeVsThree,
                value: 1.5
            }))
        );
        assert!(matches!(parse("!", "!weights 4v4"), Some(Err(_))));
    }

    #[test]
    fn shutdown_force_flag() {
        assert_eq!(parse("!", "!shutdown"), Some(Ok(Command::Shutdown { force: false })));
        assert_eq!(
            parse("!", "!shutdown force"),
            Some(Ok(Command::Shutdown { force: true }))
        );
    }

    #[test]
    fn custom_prefixes_work() {
        assert_eq!(
            parse("?", "?bookings"),
            Some(Ok(Command::Bookings))
        );
        assert!(parse("?", "!bookings").is_none());
    }
}
