//! Interactive chat loop.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use pulse_session::{ChatSession, SessionError, SessionUpdate, Submission};
use pulse_storage::Message;

const HELP: &str = "Commands: /history, /clear, /quit";

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    History,
    Clear,
    Help,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "/quit" | "/exit" => Input::Quit,
        "/history" => Input::History,
        "/clear" => Input::Clear,
        "/help" => Input::Help,
        cmd if cmd.starts_with('/') => Input::Unknown(cmd),
        _ => Input::Message(line),
    }
}

/// Run the prompt until `/quit` or end of input.
pub async fn run(mut session: ChatSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Quit => break,
            Input::History => print_history(session.messages()),
            Input::Clear => match session.clear() {
                Ok(()) => println!("Conversation cleared."),
                Err(e) => println!("{e}"),
            },
            Input::Help => println!("{HELP}"),
            Input::Unknown(cmd) => println!("Unknown command {cmd}. {HELP}"),
            Input::Message(text) => match session.submit(text) {
                Ok(Submission::Accepted { .. }) => stream_reply(&mut session).await?,
                Ok(Submission::Failed { diagnostic, .. }) => println!("{diagnostic}"),
                Ok(Submission::Ignored) => {}
                Err(SessionError::RequestInFlight) => println!("Still waiting for a reply."),
                Err(e) => return Err(e.into()),
            },
        }
    }

    debug!("Leaving chat loop");
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}

/// Print the reply as it grows. Ctrl-C abandons it.
async fn stream_reply(session: &mut ChatSession) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;

    loop {
        let updates = tokio::select! {
            step = session.step() => match step {
                Some(updates) => updates,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                writeln!(stdout, "\n[cancelled]")?;
                break;
            }
        };

        for update in updates {
            match update {
                SessionUpdate::Snapshot { text, .. } => {
                    if let Some(tail) = text.get(printed..) {
                        write!(stdout, "{tail}")?;
                        stdout.flush()?;
                    }
                    printed = text.len();
                }
                SessionUpdate::Finished { .. } => writeln!(stdout)?,
                SessionUpdate::Failed { diagnostic, .. } => {
                    if printed > 0 {
                        writeln!(stdout)?;
                    }
                    writeln!(stdout, "[error] {diagnostic}")?;
                }
            }
        }
    }
    Ok(())
}

fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("(no messages)");
        return;
    }
    for message in messages {
        let who = if message.is_user() { "you" } else { "assistant" };
        println!("{who}: {}", message.content());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("  /history "), Input::History);
        assert_eq!(parse_input("/clear"), Input::Clear);
        assert_eq!(parse_input("/nope"), Input::Unknown("/nope"));
    }

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(parse_input("hello /quit"), Input::Message("hello /quit"));
        assert_eq!(parse_input(""), Input::Message(""));
    }
}
