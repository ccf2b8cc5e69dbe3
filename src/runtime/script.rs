//! Plain-text script format and source locations.
//!
//! One command per line: a name followed by whitespace-separated arguments.
//! Double quotes group an argument containing spaces. `#` starts a comment
//! line; blank lines are skipped but still count for line numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{ScriptError, ScriptResult};

/// A single parsed command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCommand {
    /// 1-based source line.
    pub line: usize,
    /// Command name (English name or localized alias).
    pub name: String,
    /// Positional arguments.
    pub args: Vec<String>,
}

impl ScriptCommand {
    /// Create a command without going through the text parser.
    pub fn new(line: usize, name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            line,
            name: name.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// The command rendered back to script text.
    pub fn content(&self) -> String {
        let mut out = self.name.clone();
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                out.push('"');
                out.push_str(arg);
                out.push('"');
            } else {
                out.push_str(arg);
            }
        }
        out
    }

    /// Location metadata used when reporting failures of this command.
    pub fn location(&self) -> ScriptLocation {
        ScriptLocation {
            line: self.line,
            command: self.name.clone(),
            content: self.content(),
        }
    }
}

/// Script location attached to errors for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLocation {
    /// 1-based source line.
    pub line: usize,
    /// Command name.
    pub command: String,
    /// Full command text.
    pub content: String,
}

impl fmt::Display for ScriptLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} ({}: {})", self.line, self.command, self.content)
    }
}

/// Parsed script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Commands in execution order.
    pub commands: Vec<ScriptCommand>,
}

impl Script {
    /// Build a script from already-parsed commands.
    pub fn from_commands(commands: Vec<ScriptCommand>) -> Self {
        Self { commands }
    }

    /// Parse script text.
    pub fn parse(source: &str) -> ScriptResult<Self> {
        let mut commands = Vec::new();
        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut words = split_words(trimmed, line)?.into_iter();
            let Some(name) = words.next() else {
                continue;
            };
            commands.push(ScriptCommand {
                line,
                name,
                args: words.collect(),
            });
        }
        Ok(Self { commands })
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the script has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn split_words(text: &str, line: usize) -> ScriptResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for ch in text.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(ScriptError::Syntax {
            line,
            detail: "unterminated quote".into(),
        });
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_keeps_line_numbers() {
        let script = Script::parse("# header\n\nSetVariable 1 5\n  GetUserSignal 2 3 4\n").unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.commands[0], ScriptCommand::new(3, "SetVariable", &["1", "5"]));
        assert_eq!(script.commands[1].line, 4);
        assert_eq!(script.commands[1].args, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_quoted_arguments() {
        let script = Script::parse(r#"SetVariable 1 "hello world" """#).unwrap();
        assert_eq!(script.commands[0].args, vec!["1", "hello world", ""]);
        assert_eq!(
            script.commands[0].content(),
            r#"SetVariable 1 "hello world" """#
        );
    }

    #[test]
    fn test_unterminated_quote_is_syntax_error() {
        let err = Script::parse("SetVariable 1 \"oops").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_location_display() {
        let location = ScriptCommand::new(7, "GetMyBestRecord", &["3", "10"]).location();
        assert_eq!(location.to_string(), "line 7 (GetMyBestRecord: GetMyBestRecord 3 10)");
    }
}
