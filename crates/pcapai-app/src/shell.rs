//! Line-oriented question loop.
//!
//! One question is in flight at a time; Ctrl-C abandons the current
//! question and returns to the prompt with the session unchanged.

use std::io::Write;
use std::path::Path;

use pcapai_core::error::PcapAiError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::host::Host;
use crate::output;

const HELP: &str = "\
Type a question, or one of:
  :load <pcap>        parse a capture and make it active
  :focus <proto|none> set or clear the protocol focus
  :info               show the active session
  :clear              discard the session and its snapshot
  :quit               leave the shell
";

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand<'a> {
    Empty,
    Help,
    Quit,
    Load(&'a str),
    Focus(&'a str),
    Info,
    Clear,
    Ask(&'a str),
    Unknown(&'a str),
}

fn parse_line(line: &str) -> ShellCommand<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    let Some(directive) = line.strip_prefix(':') else {
        return ShellCommand::Ask(line);
    };
    let (name, rest) = match directive.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (directive, ""),
    };
    match (name, rest) {
        ("quit" | "exit" | "q", _) => ShellCommand::Quit,
        ("help" | "h", _) => ShellCommand::Help,
        ("info", _) => ShellCommand::Info,
        ("clear", _) => ShellCommand::Clear,
        ("load", path) if !path.is_empty() => ShellCommand::Load(path),
        ("focus", focus) if !focus.is_empty() => ShellCommand::Focus(focus),
        _ => ShellCommand::Unknown(line),
    }
}

fn prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "pcapai> ")?;
    stdout.flush()
}

/// Run until `:quit` or end of input.
pub async fn run(host: &mut Host) -> Result<(), PcapAiError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("pcapai shell. Type :help for commands.");
    if let Some(info) = host.info() {
        println!("Active capture: {}", info.path.display());
    }

    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_line(&line) {
            ShellCommand::Empty => {}
            ShellCommand::Help => print!("{}", HELP),
            ShellCommand::Quit => break,
            ShellCommand::Load(path) => match host.load(Path::new(path)) {
                Ok(session) => print!("{}", output::format_loaded(&session)),
                Err(e) => eprintln!("Load failed: {}", e),
            },
            ShellCommand::Focus(focus) => match host.set_focus(focus) {
                Ok(Some(focus)) => println!("Focus set to {}.", focus),
                Ok(None) => println!("Focus cleared."),
                Err(e) => eprintln!("{}", e),
            },
            ShellCommand::Info => match host.info() {
                Some(info) => {
                    print!("{}", output::format_info(&info, host.summary().as_ref()));
                    println!("Exchanges:   {}", host.history().len());
                }
                None => println!("No capture loaded. Use :load <pcap>."),
            },
            ShellCommand::Clear => match host.clear() {
                Ok(()) => println!("Session cleared."),
                Err(e) => eprintln!("Clear failed: {}", e),
            },
            ShellCommand::Unknown(line) => {
                eprintln!("Unknown command: {}. Type :help for commands.", line)
            }
            ShellCommand::Ask(question) => {
                tokio::select! {
                    result = host.ask(question, None) => match result {
                        Ok(answer) => print!("{}", output::format_answer(&answer)),
                        Err(PcapAiError::NoCapture) => {
                            println!("No capture loaded. Use :load <pcap>.")
                        }
                        Err(e) => eprintln!("{}", e),
                    },
                    _ = tokio::signal::ctrl_c() => {
                        debug!("Question cancelled by interrupt");
                        println!("\nQuestion cancelled.");
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions() {
        assert_eq!(parse_line("   "), ShellCommand::Empty);
        assert_eq!(
            parse_line(" which hosts talk NFS? "),
            ShellCommand::Ask("which hosts talk NFS?")
        );
    }

    #[test]
    fn test_parse_directives() {
        assert_eq!(parse_line(":quit"), ShellCommand::Quit);
        assert_eq!(parse_line(":q"), ShellCommand::Quit);
        assert_eq!(parse_line(":info"), ShellCommand::Info);
        assert_eq!(parse_line(":clear"), ShellCommand::Clear);
        assert_eq!(parse_line(":help"), ShellCommand::Help);
        assert_eq!(
            parse_line(":load  /tmp/my trace.pcap "),
            ShellCommand::Load("/tmp/my trace.pcap")
        );
        assert_eq!(parse_line(":focus none"), ShellCommand::Focus("none"));
    }

    #[test]
    fn test_parse_incomplete_directives() {
        assert_eq!(parse_line(":load"), ShellCommand::Unknown(":load"));
        assert_eq!(parse_line(":focus   "), ShellCommand::Unknown(":focus"));
        assert_eq!(parse_line(":bogus x"), ShellCommand::Unknown(":bogus x"));
    }
}
