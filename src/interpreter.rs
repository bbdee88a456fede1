//! The read-eval loop gluing the pieces together: prompt, lex, parse,
//! expand, collect heredocs, execute, repeat.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::env::Environment;
use crate::executor;
use crate::expander;
use crate::heredoc::{self, Collection};
use crate::lexer;
use crate::parser;
use crate::signals::{self, SignalContext};

const PROMPT: &str = "minishell$> ";

/// The interactive shell: an [`Environment`] plus the line editor that
/// feeds it.
pub struct Interpreter {
    env: Environment,
    editor: DefaultEditor,
}

impl Interpreter {
    pub fn new() -> Result<Self> {
        let shell_name = std::env::args()
            .next()
            .unwrap_or_else(|| "minishell".to_string());
        Ok(Self {
            env: Environment::new(shell_name),
            editor: DefaultEditor::new()?,
        })
    }

    /// Run the read-eval loop until `exit` or end of input, returning the
    /// status the process should exit with.
    pub fn repl(&mut self) -> Result<i32> {
        signals::install(SignalContext::Interactive);

        loop {
            if signals::take_interrupt() {
                self.env.last_status = 130;
            }
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = self.editor.add_history_entry(line.as_str());
                    }
                    self.execute_line(&line);
                    if let Some(code) = self.env.pending_exit {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    self.env.last_status = 130;
                }
                Err(ReadlineError::Eof) => return Ok(self.env.last_status),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Take one line through the whole pipeline. Errors are reported and
    /// folded into `last_status`; none of them end the loop.
    fn execute_line(&mut self, line: &str) {
        let tokens = match lexer::split_into_tokens(line) {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("minishell: {err}");
                self.env.last_status = 2;
                return;
            }
        };

        let pipeline = match parser::construct_pipeline(tokens) {
            Ok(Some(pipeline)) => pipeline,
            // blank line: nothing to do, nothing to report
            Ok(None) => return,
            Err(err) => {
                eprintln!("minishell: {err}");
                self.env.last_status = 2;
                return;
            }
        };

        let mut commands = expander::expand_pipeline(&pipeline, &self.env);

        match heredoc::collect(&mut commands, &mut self.editor, &self.env) {
            Ok(Collection::Complete) => {}
            Ok(Collection::Interrupted) => {
                self.env.last_status = 130;
                return;
            }
            Err(err) => {
                eprintln!("minishell: {err}");
                self.env.last_status = 1;
                return;
            }
        }

        if let Err(err) = executor::execute_pipeline(&commands, &mut self.env) {
            eprintln!("minishell: {err}");
            self.env.last_status = 1;
        }
    }
}
