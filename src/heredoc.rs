//! Interactive collection of heredoc bodies, performed before any stage of
//! the pipeline forks so an interrupt aborts cleanly in the shell process.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::env::Environment;
use crate::expander::{self, ExpandedCommand, IoRedirect};
use crate::signals::{self, SignalContext};

const SECONDARY_PROMPT: &str = "> ";

/// How a collection round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Complete,
    /// Ctrl-C during entry: the whole pipeline is abandoned.
    Interrupted,
}

/// Read the body of every heredoc in the pipeline, in order.
///
/// Bodies of heredocs whose delimiter was unquoted are expanded line by
/// line with double-quote rules (no splitting). Every heredoc is collected
/// even when a later redirection will end up supplying stdin instead.
pub fn collect(
    commands: &mut [ExpandedCommand],
    editor: &mut DefaultEditor,
    env: &Environment,
) -> Result<Collection> {
    signals::install(SignalContext::Heredoc);
    let outcome = collect_all(commands, editor, env);
    signals::install(SignalContext::Interactive);
    outcome
}

fn collect_all(
    commands: &mut [ExpandedCommand],
    editor: &mut DefaultEditor,
    env: &Environment,
) -> Result<Collection> {
    for command in commands.iter_mut() {
        for redirect in command.redirects.iter_mut() {
            if let IoRedirect::Heredoc {
                delimiter,
                expand,
                body,
            } = redirect
            {
                match read_body(editor, delimiter, *expand, env)? {
                    Some(text) => *body = text,
                    None => return Ok(Collection::Interrupted),
                }
            }
        }
    }
    Ok(Collection::Complete)
}

/// Read lines until one equals the delimiter exactly. EOF ends the body as
/// if the delimiter had been typed.
fn read_body(
    editor: &mut DefaultEditor,
    delimiter: &str,
    expand: bool,
    env: &Environment,
) -> Result<Option<String>> {
    let mut body = String::new();
    loop {
        match editor.readline(SECONDARY_PROMPT) {
            Ok(line) => {
                if line == delimiter {
                    break;
                }
                if expand {
                    body.push_str(&expander::expand_text(&line, env));
                } else {
                    body.push_str(&line);
                }
                body.push('\n');
            }
            Err(ReadlineError::Interrupted) => return Ok(None),
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(Some(body))
}
