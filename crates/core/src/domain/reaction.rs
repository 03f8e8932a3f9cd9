use std::fmt;

use serde::{Deserialize, Serialize};

/// The two reaction symbols the bot understands. One emoji serves both the
/// "accept" role on the intake message and the "confirm close" role on a
/// ticket's trigger message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionSymbol {
    /// 🔒 requests close confirmation on a ticket's trigger message.
    Lock,
    /// ✅ accepts (opens a ticket from the intake message) or confirms a close.
    Confirm,
}

impl ReactionSymbol {
    /// Parses a raw reaction token from the platform. Accepts the emoji
    /// itself or a `:name:` alias, case-insensitive.
    pub fn parse(token: &str) -> Option<Self> {
        let normalized = token.trim().trim_matches(':').to_ascii_lowercase();
        match normalized.as_str() {
            "\u{1f512}" | "lock" => Some(Self::Lock),
            "\u{2705}" | "white_check_mark" | "check" | "tick" => Some(Self::Confirm),
            _ => None,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Lock => "\u{1f512}",
            Self::Confirm => "\u{2705}",
        }
    }
}

impl fmt::Display for ReactionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

#[cfg(test)]
mod tests {
    use super::ReactionSymbol;

    #[test]
    fn parses_raw_emoji_and_colon_aliases() {
        assert_eq!(ReactionSymbol::parse("🔒"), Some(ReactionSymbol::Lock));
        assert_eq!(ReactionSymbol::parse(":lock:"), Some(ReactionSymbol::Lock));
        assert_eq!(ReactionSymbol::parse("✅"), Some(ReactionSymbol::Confirm));
        assert_eq!(ReactionSymbol::parse("White_Check_Mark"), Some(ReactionSymbol::Confirm));
        assert_eq!(ReactionSymbol::parse(" :tick: "), Some(ReactionSymbol::Confirm));
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert_eq!(ReactionSymbol::parse("🎉"), None);
        assert_eq!(ReactionSymbol::parse("thumbsup"), None);
        assert_eq!(ReactionSymbol::parse(""), None);
    }
}
