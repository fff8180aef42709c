use serde::{Deserialize, Serialize};

/// The command vocabulary of a scenario script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    EnableMatching,
    AddSymbol,
    DeleteSymbol,
    AddBook,
    DeleteBook,
    AddLimitBuy,
    AddLimitSell,
    AddMarketBuy,
    AddMarketSell,
    AddSlippageMarketBuy,
    AddSlippageMarketSell,
    ReduceOrder,
    ModifyOrder,
    ReplaceOrder,
    DeleteOrder,
    Comment,
    Unknown,
}

/// One parsed scenario line: the recognized command plus its raw arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCommand {
    pub kind: CommandKind,
    pub args: Vec<String>,
    pub line_number: usize,
}

/// Parse one script line. Command words are case-insensitive and matched
/// greedily (`add limit buy` before its arguments); `#` starts a full-line
/// comment; anything unrecognized parses as `Unknown`.
pub fn parse_line(line: &str, line_number: usize) -> ScenarioCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return ScenarioCommand {
            kind: CommandKind::Comment,
            args: Vec::new(),
            line_number,
        };
    }

    let mut tokens = trimmed.split_whitespace();
    let word = |token: Option<&str>| token.map(|t| t.to_ascii_lowercase());

    let first = word(tokens.next());
    let kind = match first.as_deref() {
        Some("enable") => match word(tokens.next()).as_deref() {
            Some("matching") => CommandKind::EnableMatching,
            _ => CommandKind::Unknown,
        },
        Some("add") => match word(tokens.next()).as_deref() {
            Some("symbol") => CommandKind::AddSymbol,
            Some("book") => CommandKind::AddBook,
            Some("limit") => match word(tokens.next()).as_deref() {
                Some("buy") => CommandKind::AddLimitBuy,
                Some("sell") => CommandKind::AddLimitSell,
                _ => CommandKind::Unknown,
            },
            Some("market") => match word(tokens.next()).as_deref() {
                Some("buy") => CommandKind::AddMarketBuy,
                Some("sell") => CommandKind::AddMarketSell,
                _ => CommandKind::Unknown,
            },
            Some("slippage") => match word(tokens.next()).as_deref() {
                Some("market") => match word(tokens.next()).as_deref() {
                    Some("buy") => CommandKind::AddSlippageMarketBuy,
                    Some("sell") => CommandKind::AddSlippageMarketSell,
                    _ => CommandKind::Unknown,
                },
                _ => CommandKind::Unknown,
            },
            _ => CommandKind::Unknown,
        },
        Some("delete") => match word(tokens.next()).as_deref() {
            Some("symbol") => CommandKind::DeleteSymbol,
            Some("book") => CommandKind::DeleteBook,
            Some("order") => CommandKind::DeleteOrder,
            _ => CommandKind::Unknown,
        },
        Some("reduce") => CommandKind::ReduceOrder,
        Some("modify") => CommandKind::ModifyOrder,
        Some("replace") => CommandKind::ReplaceOrder,
        _ => CommandKind::Unknown,
    };

    ScenarioCommand {
        kind,
        args: tokens.map(str::to_owned).collect(),
        line_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiword_commands_parse_greedily() {
        assert_eq!(parse_line("enable matching", 1).kind, CommandKind::EnableMatching);
        assert_eq!(parse_line("add limit buy 1 1 100.00 1000", 2).kind, CommandKind::AddLimitBuy);
        assert_eq!(parse_line("add market sell 2 1 400", 3).kind, CommandKind::AddMarketSell);
        assert_eq!(
            parse_line("add slippage market buy 3 1 400 0.02", 4).kind,
            CommandKind::AddSlippageMarketBuy
        );
        assert_eq!(parse_line("delete order 5", 5).kind, CommandKind::DeleteOrder);
    }

    #[test]
    fn test_case_insensitive_command_words() {
        assert_eq!(parse_line("ADD LIMIT SELL 2 1 100.10 1000", 1).kind, CommandKind::AddLimitSell);
        assert_eq!(parse_line("Enable Matching", 2).kind, CommandKind::EnableMatching);
    }

    #[test]
    fn test_arguments_are_preserved() {
        let command = parse_line("add limit buy 1 2 100.00 1000 extra", 9);
        assert_eq!(command.args, vec!["1", "2", "100.00", "1000", "extra"]);
        assert_eq!(command.line_number, 9);
    }

    #[test]
    fn test_comments_and_blanks() {
        assert_eq!(parse_line("# quote both sides", 1).kind, CommandKind::Comment);
        assert_eq!(parse_line("   ", 2).kind, CommandKind::Comment);
        assert_eq!(parse_line("", 3).kind, CommandKind::Comment);
    }

    #[test]
    fn test_unknown_commands() {
        assert_eq!(parse_line("frobnicate 1 2 3", 1).kind, CommandKind::Unknown);
        assert_eq!(parse_line("add widget 1", 2).kind, CommandKind::Unknown);
        assert_eq!(parse_line("enable turbo", 3).kind, CommandKind::Unknown);
    }
}
