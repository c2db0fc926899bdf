//! Line-oriented input for the query surface. Each line maps to the UI event
//! it stands in for.

use multimark_core::{Direction, Msg};
use multimark_engine::Command;
use thiserror::Error;

pub(crate) const HELP: &str = "\
commands:
  type <text>     type text one keystroke at a time
  set <text>      replace the search box content
  clear           empty the search box
  enter           commit the search box as a term
  next | prev     move between matches
  remove <n>      remove committed term n (1-based)
  key <name>      press a shortcut (activate-search, toggle-search)
  page            print the page with its highlights
  reload          reload the page
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UserCommand {
    /// Events for the surface, applied in order.
    Surface(Vec<Msg>),
    Shortcut(Command),
    ShowPage,
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{command}` needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("`{0}` is not a term number")]
    BadIndex(String),
    #[error("unknown shortcut `{0}`")]
    UnknownShortcut(String),
}

pub(crate) fn parse(line: &str) -> Result<UserCommand, CommandError> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let (word, rest) = match line.trim_start().split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (line.trim(), ""),
    };

    let command = match word {
        "type" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "type",
                    expected: "some text",
                });
            }
            UserCommand::Surface(keystrokes(rest))
        }
        "set" => UserCommand::Surface(vec![Msg::InputChanged(rest.to_string())]),
        "clear" => UserCommand::Surface(vec![Msg::InputChanged(String::new())]),
        "enter" => UserCommand::Surface(vec![Msg::QueryCommitted]),
        "next" | "n" => UserCommand::Surface(vec![Msg::NavigateClicked(Direction::Next)]),
        "prev" | "p" => UserCommand::Surface(vec![Msg::NavigateClicked(Direction::Prev)]),
        "remove" => {
            let raw = rest.trim();
            if raw.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "remove",
                    expected: "a term number",
                });
            }
            let number: usize = raw
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| CommandError::BadIndex(raw.to_string()))?;
            UserCommand::Surface(vec![Msg::RemoveTermClicked { index: number - 1 }])
        }
        "key" => {
            let name = rest.trim();
            let shortcut =
                Command::parse(name).ok_or_else(|| CommandError::UnknownShortcut(name.to_string()))?;
            UserCommand::Shortcut(shortcut)
        }
        "page" => UserCommand::ShowPage,
        "reload" => UserCommand::Reload,
        "help" | "?" => UserCommand::Help,
        "quit" | "exit" | "q" => UserCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// One `InputChanged` per typed character, carrying the text so far.
fn keystrokes(text: &str) -> Vec<Msg> {
    text.char_indices()
        .map(|(offset, ch)| Msg::InputChanged(text[..offset + ch.len_utf8()].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse, CommandError, UserCommand};
    use multimark_core::{Direction, Msg};
    use multimark_engine::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn typing_emits_one_event_per_keystroke() {
        assert_eq!(
            parse("type café").unwrap(),
            UserCommand::Surface(vec![
                Msg::InputChanged("c".into()),
                Msg::InputChanged("ca".into()),
                Msg::InputChanged("caf".into()),
                Msg::InputChanged("café".into()),
            ])
        );
    }

    #[test]
    fn set_keeps_inner_whitespace() {
        assert_eq!(
            parse("set on the").unwrap(),
            UserCommand::Surface(vec![Msg::InputChanged("on the".into())])
        );
    }

    #[test]
    fn remove_takes_one_based_numbers() {
        assert_eq!(
            parse("remove 2").unwrap(),
            UserCommand::Surface(vec![Msg::RemoveTermClicked { index: 1 }])
        );
        assert_eq!(parse("remove 0"), Err(CommandError::BadIndex("0".into())));
        assert!(matches!(
            parse("remove"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn navigation_and_shortcuts() {
        assert_eq!(
            parse("prev").unwrap(),
            UserCommand::Surface(vec![Msg::NavigateClicked(Direction::Prev)])
        );
        assert_eq!(
            parse("key activate-search").unwrap(),
            UserCommand::Shortcut(Command::ActivateSearch)
        );
        assert_eq!(
            parse("key nope"),
            Err(CommandError::UnknownShortcut("nope".into()))
        );
    }

    #[test]
    fn unknown_words_are_rejected() {
        assert_eq!(parse("dance"), Err(CommandError::Unknown("dance".into())));
        assert_eq!(parse("quit\n").unwrap(), UserCommand::Quit);
    }
}
