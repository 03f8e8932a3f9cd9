//! Prefix command parsing.
//!
//! Commands arrive as ordinary channel messages starting with the configured
//! prefix (`..` by default). Parsing is pure and platform-free; permission
//! gates and side effects live in [`crate::handlers`].

use thiserror::Error;
use ticketry_core::UserId;

/// A fully parsed ticket command, arguments resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TicketCommand {
    /// Open a ticket for the author, optionally titled.
    New { subject: Option<String> },
    /// Close the ticket hosted in the current channel.
    Close { reason: Option<String> },
    /// Grant a member visibility into the current ticket channel.
    AddUser { user: UserId },
    /// Revoke a member's visibility into the current ticket channel.
    RemoveUser { user: UserId },
    /// Open a ticket on behalf of another member.
    SudoNew { requester: UserId },
    /// Post (or re-post) the intake message and arm its trigger.
    Setup,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("`{verb}` needs a user argument, like `{verb} @someone`")]
    MissingUser { verb: String },
    #[error("`{token}` does not look like a user")]
    InvalidUser { token: String },
    #[error("unknown command `{verb}`")]
    UnknownVerb { verb: String },
}

/// Splits a message into a command, if it carries the prefix at all.
///
/// Returns `None` for plain chatter so the caller can drop it without a
/// reply. Verbs are case-insensitive; arguments keep their casing.
pub fn parse_command(
    prefix: &str,
    content: &str,
) -> Option<Result<TicketCommand, CommandParseError>> {
    let rest = content.strip_prefix(prefix)?;
    let mut parts = rest.trim().splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let args = parts.next().unwrap_or_default().trim();

    if verb.is_empty() {
        return None;
    }

    Some(match verb.as_str() {
        "new" => Ok(TicketCommand::New {
            subject: non_empty(args),
        }),
        "close" => Ok(TicketCommand::Close {
            reason: non_empty(args),
        }),
        "adduser" => user_argument(&verb, args).map(|user| TicketCommand::AddUser { user }),
        "removeuser" => user_argument(&verb, args).map(|user| TicketCommand::RemoveUser { user }),
        "sudonew" => user_argument(&verb, args).map(|requester| TicketCommand::SudoNew { requester }),
        "setup" => Ok(TicketCommand::Setup),
        _ => Err(CommandParseError::UnknownVerb { verb }),
    })
}

/// Reads a user id from a mention token.
///
/// Accepts `<@123>`, the nickname form `<@!123>`, and bare digits.
pub fn parse_user_mention(token: &str) -> Option<UserId> {
    let token = token.trim();
    let digits = token
        .strip_prefix("<@!")
        .or_else(|| token.strip_prefix("<@"))
        .map(|rest| rest.strip_suffix('>'))
        .unwrap_or(Some(token))?;
    let id = digits.parse::<i64>().ok()?;
    (id > 0).then_some(UserId(id))
}

fn user_argument(verb: &str, args: &str) -> Result<UserId, CommandParseError> {
    let token = args.split_whitespace().next().ok_or_else(|| {
        CommandParseError::MissingUser {
            verb: verb.to_string(),
        }
    })?;
    parse_user_mention(token).ok_or_else(|| CommandParseError::InvalidUser {
        token: token.to_string(),
    })
}

fn non_empty(args: &str) -> Option<String> {
    let trimmed = args.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_chatter_is_not_a_command() {
        assert_eq!(parse_command("..", "hello there"), None);
        assert_eq!(parse_command("..", ""), None);
        assert_eq!(parse_command("..", ".."), None);
    }

    #[test]
    fn new_keeps_the_whole_subject() {
        let parsed = parse_command("..", "..new printer is on fire").unwrap().unwrap();
        assert_eq!(
            parsed,
            TicketCommand::New {
                subject: Some("printer is on fire".to_string()),
            }
        );

        let bare = parse_command("..", "..new").unwrap().unwrap();
        assert_eq!(bare, TicketCommand::New { subject: None });
    }

    #[test]
    fn close_keeps_the_whole_reason() {
        let parsed = parse_command("..", "..close resolved by phone").unwrap().unwrap();
        assert_eq!(
            parsed,
            TicketCommand::Close {
                reason: Some("resolved by phone".to_string()),
            }
        );
    }

    #[test]
    fn verbs_are_case_insensitive() {
        let parsed = parse_command("..", "..CLOSE done").unwrap().unwrap();
        assert_eq!(
            parsed,
            TicketCommand::Close {
                reason: Some("done".to_string()),
            }
        );
    }

    #[test]
    fn user_commands_accept_every_mention_form() {
        for token in ["<@42>", "<@!42>", "42"] {
            let parsed = parse_command("..", &format!("..adduser {token}"))
                .unwrap()
                .unwrap();
            assert_eq!(parsed, TicketCommand::AddUser { user: UserId(42) });
        }
    }

    #[test]
    fn user_commands_report_missing_and_malformed_arguments() {
        assert_eq!(
            parse_command("..", "..adduser").unwrap(),
            Err(CommandParseError::MissingUser {
                verb: "adduser".to_string(),
            })
        );
        assert_eq!(
            parse_command("..", "..removeuser @bob").unwrap(),
            Err(CommandParseError::InvalidUser {
                token: "@bob".to_string(),
            })
        );
        assert_eq!(
            parse_command("..", "..sudonew <@99").unwrap(),
            Err(CommandParseError::InvalidUser {
                token: "<@99".to_string(),
            })
        );
    }

    #[test]
    fn unknown_verbs_are_reported_not_guessed() {
        assert_eq!(
            parse_command("..", "..frobnicate now").unwrap(),
            Err(CommandParseError::UnknownVerb {
                verb: "frobnicate".to_string(),
            })
        );
    }

    #[test]
    fn the_prefix_is_configurable() {
        let parsed = parse_command("!", "!setup").unwrap().unwrap();
        assert_eq!(parsed, TicketCommand::Setup);
        assert_eq!(parse_command("!", "..setup"), None);
    }

    #[test]
    fn mention_parsing_rejects_garbage() {
        assert_eq!(parse_user_mention("<@abc>"), None);
        assert_eq!(parse_user_mention("<@-3>"), None);
        assert_eq!(parse_user_mention("0"), None);
        assert_eq!(parse_user_mention(""), None);
    }
}
