//! Console command parsing.
//!
//! The dashboard reads one command per line from stdin. Parsing is kept
//! separate from execution so it can be tested without any I/O.

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// `sim <depth>`: inject a depth reading as if the sensor reported it.
    Simulate(f64),
    AddRecipient(String),
    RemoveRecipient(String),
    ListRecipients,
    /// `alert [message]`: dispatch to every recipient, using the configured
    /// message when none is given.
    SendAlert(Option<String>),
    Weather,
    Verify,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "\
Commands:
  sim <depth>       inject a water depth in cm
  add <email>       add an alert recipient
  remove <email>    remove an alert recipient
  list              show alert recipients
  alert [message]   send an alert to every recipient
  weather           show the latest weather
  verify            check the sensor and weather endpoints
  help              show this help
  quit              exit";

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "sim" | "simulate" => {
            if rest.is_empty() {
                return Err("usage: sim <depth>".to_string());
            }
            let depth: f64 = rest
                .parse()
                .map_err(|_| format!("not a number: {}", rest))?;
            if !depth.is_finite() {
                return Err(format!("not a finite depth: {}", rest));
            }
            Ok(ConsoleCommand::Simulate(depth))
        }
        "add" => required_arg(rest, "add <email>").map(ConsoleCommand::AddRecipient),
        "remove" | "rm" => required_arg(rest, "remove <email>").map(ConsoleCommand::RemoveRecipient),
        "list" | "ls" => Ok(ConsoleCommand::ListRecipients),
        "alert" => Ok(ConsoleCommand::SendAlert(
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        "weather" => Ok(ConsoleCommand::Weather),
        "verify" => Ok(ConsoleCommand::Verify),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command: {} (try 'help')", other)),
    }
}

fn required_arg(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(rest.to_string())
    }
}
