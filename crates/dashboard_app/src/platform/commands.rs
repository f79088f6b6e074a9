use std::path::PathBuf;

use dashboard_core::{LogLevel, Msg};
use thiserror::Error;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Maps directly onto a core message.
    Send(Msg),
    /// Replace the period dates; `None` clears a date.
    Period {
        start: Option<String>,
        end: Option<String>,
    },
    /// Write the whole log buffer to a file; a dated name when omitted.
    Export(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}; type `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
commands:
  run | run clean          start the pipeline (optionally clearing work dirs)
  cancel                   cancel the running job
  toggle <id> on|off       activate or deactivate a system
  option <id> <name> on|off
  all on|off               activate or deactivate every system
  period <start|-> <end|-> set the execution period (YYYY-MM-DD)
  save                     save the configuration
  pause | clear            pause/resume or clear the log view
  filter [text]            filter logs by text (empty clears)
  level <LEVEL>            show/hide INFO, WARN, ERROR or SUCCESS lines
  export [file]            write the log buffer to a file
  reconnect                retry the live connection
  status | help | quit";

pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(ParseError::Empty);
    };
    let args: Vec<&str> = words.collect();

    let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("run", []) => Command::Send(Msg::ExecuteClicked { clear_dirs: false }),
        ("run", ["clean"]) => Command::Send(Msg::ExecuteClicked { clear_dirs: true }),
        ("run", _) => return Err(ParseError::Usage("run [clean]")),
        ("cancel", []) => Command::Send(Msg::CancelClicked),
        ("toggle", [system_id, state]) => Command::Send(Msg::SystemToggled {
            system_id: system_id.to_string(),
            active: on_off(state).ok_or(ParseError::Usage("toggle <id> on|off"))?,
        }),
        ("toggle", _) => return Err(ParseError::Usage("toggle <id> on|off")),
        ("option", [system_id, option, state]) => Command::Send(Msg::OptionToggled {
            system_id: system_id.to_string(),
            option: option.to_string(),
            value: on_off(state).ok_or(ParseError::Usage("option <id> <name> on|off"))?,
        }),
        ("option", _) => return Err(ParseError::Usage("option <id> <name> on|off")),
        ("all", [state]) => Command::Send(Msg::AllSystemsToggled {
            active: on_off(state).ok_or(ParseError::Usage("all on|off"))?,
        }),
        ("all", _) => return Err(ParseError::Usage("all on|off")),
        ("period", [start, end]) => Command::Period {
            start: date_arg(start),
            end: date_arg(end),
        },
        ("period", _) => return Err(ParseError::Usage("period <start|-> <end|->")),
        ("save", []) => Command::Send(Msg::SaveConfigClicked),
        ("pause", []) => Command::Send(Msg::LogsPauseToggled),
        ("clear", []) => Command::Send(Msg::LogsCleared),
        // Everything after `filter` is the text, inner spacing included.
        ("filter", _) => Command::Send(Msg::FilterTextChanged(
            line.trim_start()[head.len()..].trim().to_string(),
        )),
        ("level", [level]) => Command::Send(Msg::LevelToggled(
            parse_level(level).ok_or(ParseError::Usage("level INFO|WARN|ERROR|SUCCESS"))?,
        )),
        ("level", _) => return Err(ParseError::Usage("level INFO|WARN|ERROR|SUCCESS")),
        ("export", []) => Command::Export(None),
        ("export", [file]) => Command::Export(Some(PathBuf::from(file))),
        ("reconnect", []) => Command::Send(Msg::ReconnectClicked),
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(ParseError::Unknown(line.trim().to_string())),
    };
    Ok(command)
}

fn on_off(word: &str) -> Option<bool> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn date_arg(word: &str) -> Option<String> {
    (word != "-").then(|| word.to_string())
}

fn parse_level(word: &str) -> Option<LogLevel> {
    match word.to_ascii_uppercase().as_str() {
        "INFO" => Some(LogLevel::Info),
        "WARN" | "WARNING" => Some(LogLevel::Warn),
        "ERROR" => Some(LogLevel::Error),
        "SUCCESS" => Some(LogLevel::Success),
        _ => None,
    }
}
