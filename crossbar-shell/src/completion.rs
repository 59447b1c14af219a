use reedline::{Completer, Span, Suggestion};

/// Completes the first token of a line against the command table.
pub(crate) struct CmdCompleter {
    names: Vec<&'static str>,
}

impl CmdCompleter {
    pub(crate) fn new() -> Self {
        let mut names: Vec<&'static str> = crate::commands().map(|c| c.name).collect();
        names.sort_unstable();
        CmdCompleter { names }
    }
}

impl Completer for CmdCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let head = &line[..pos];
        let start = head.len() - head.trim_start().len();
        let word = &head[start..];
        if word.chars().any(char::is_whitespace) {
            // only the first token completes
            return vec![];
        }
        self.names
            .iter()
            .filter(|name| name.starts_with(word))
            .map(|name| Suggestion {
                value: name.to_string(),
                description: None,
                style: None,
                extra: None,
                span: Span::new(start, pos),
                append_whitespace: true,
                match_indices: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(line: &str, pos: usize) -> Vec<String> {
        CmdCompleter::new().complete(line, pos).into_iter().map(|s| s.value).collect()
    }

    #[test]
    fn completes_command_prefixes() {
        assert_eq!(values("li", 2), vec!["list".to_string()]);
        assert!(values("s", 1).contains(&"stop".to_string()));
        assert!(values("s", 1).contains(&"script".to_string()));
    }

    #[test]
    fn empty_prefix_offers_everything() {
        assert_eq!(values("", 0).len(), crate::commands().count());
    }

    #[test]
    fn only_the_first_token_completes() {
        assert!(values("stop wor", 8).is_empty());
    }
}
