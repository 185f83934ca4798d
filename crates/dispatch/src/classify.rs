/// Character that marks a message as a command.
pub const COMMAND_PREFIX: char = '/';

/// A message split into command name, arguments and the raw remainder.
///
/// `name` is empty for data submissions, and for a bare prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    pub remainder: String,
}

impl ParsedCommand {
    #[must_use]
    pub fn is_command(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Classify raw message text.
///
/// Text without the prefix comes back untouched as the remainder. Otherwise
/// the token after the prefix (lower-cased) is the name and whatever follows
/// the first whitespace run is the remainder.
pub fn parse_command(text: &str) -> ParsedCommand {
    let Some(body) = text.strip_prefix(COMMAND_PREFIX) else {
        return ParsedCommand {
            remainder: text.to_string(),
            ..Default::default()
        };
    };

    let (token, rest) = match body.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (body, ""),
    };

    ParsedCommand {
        name: token.to_lowercase(),
        args: rest.split_whitespace().map(str::to_string).collect(),
        remainder: rest.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("/status", "status", &[], "")]
    #[case("/update foo=1", "update", &["foo=1"], "foo=1")]
    #[case("/HELP", "help", &[], "")]
    #[case("/update  a=1, b=2", "update", &["a=1,", "b=2"], "a=1, b=2")]
    #[case("/", "", &[], "")]
    fn parses_commands(
        #[case] input: &str,
        #[case] name: &str,
        #[case] args: &[&str],
        #[case] remainder: &str,
    ) {
        let parsed = parse_command(input);
        assert_eq!(parsed.name, name);
        assert_eq!(parsed.args, args);
        assert_eq!(parsed.remainder, remainder);
    }

    #[test]
    fn plain_text_is_data() {
        let parsed = parse_command("hi");
        assert!(!parsed.is_command());
        assert!(parsed.args.is_empty());
        assert_eq!(parsed.remainder, "hi");
    }

    #[test]
    fn bare_prefix_is_not_a_command() {
        assert!(!parse_command("/").is_command());
        assert!(!parse_command("/ status").is_command());
    }
}
