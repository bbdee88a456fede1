//! Grammar validation and pipeline construction over the token stream.

use crate::lexer::{Token, Word};
use thiserror::Error;

/// Kind of redirection attached to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `<`: read standard input from a file.
    Input,
    /// `>`: write standard output to a file, truncating it.
    Output,
    /// `>>`: write standard output to a file, appending.
    Append,
    /// `<<`: read standard input from an inline document.
    Heredoc,
}

/// One redirection as written, with its still-unexpanded target word.
/// For heredocs the target is the delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: Word,
}

/// A single stage of a pipeline: the command words (name first) and its
/// redirections, both in the order they were written. A stage may consist
/// of redirections only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    pub words: Vec<Word>,
    pub redirects: Vec<Redirect>,
}

/// An ordered sequence of commands connected by `|`. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

/// Errors that can occur while validating the token stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// A token appeared where the grammar does not allow it.
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),
    /// The line ended where the grammar required another token.
    #[error("syntax error near unexpected token `newline'")]
    UnexpectedEnd,
}

/// The text a token had in the input, for error messages.
fn token_text(token: &Token) -> String {
    match token {
        Token::Word(parts) => parts.iter().map(|p| p.text.as_str()).collect(),
        Token::Pipe => "|".to_string(),
        Token::RedirectIn => "<".to_string(),
        Token::RedirectOut => ">".to_string(),
        Token::Append => ">>".to_string(),
        Token::Heredoc => "<<".to_string(),
    }
}

struct PipelineBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl PipelineBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        PipelineBuilder { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse a pipeline: command ('|' command)*
    fn build(mut self) -> Result<Pipeline, ParsingError> {
        let mut commands = Vec::new();

        commands.push(self.parse_command()?);

        while let Some(Token::Pipe) = self.peek() {
            self.consume();
            commands.push(self.parse_command()?);
        }

        Ok(Pipeline { commands })
    }

    /// Parse a command: (word | redirect)+
    ///
    /// Words and redirections keep their relative order; a command that ends
    /// up with neither (as after `|`, `| |`, or a trailing `|`) is a syntax
    /// error citing whatever the cursor is looking at.
    fn parse_command(&mut self) -> Result<Command, ParsingError> {
        let mut command = Command::default();

        loop {
            match self.peek() {
                None | Some(Token::Pipe) => break,
                Some(Token::Word(_)) => {
                    if let Some(Token::Word(word)) = self.consume() {
                        command.words.push(word);
                    }
                }
                Some(op) => {
                    let kind = match op {
                        Token::RedirectIn => RedirectKind::Input,
                        Token::RedirectOut => RedirectKind::Output,
                        Token::Append => RedirectKind::Append,
                        Token::Heredoc => RedirectKind::Heredoc,
                        _ => unreachable!(),
                    };
                    self.consume();
                    match self.consume() {
                        Some(Token::Word(target)) => {
                            command.redirects.push(Redirect { kind, target });
                        }
                        Some(other) => {
                            return Err(ParsingError::UnexpectedToken(token_text(&other)))
                        }
                        None => return Err(ParsingError::UnexpectedEnd),
                    }
                }
            }
        }

        if command.words.is_empty() && command.redirects.is_empty() {
            return Err(match self.peek() {
                Some(token) => ParsingError::UnexpectedToken(token_text(token)),
                None => ParsingError::UnexpectedEnd,
            });
        }

        Ok(command)
    }
}

/// Constructs a [`Pipeline`] from a vector of tokens.
///
/// An empty token stream is not an error: it yields `None` and the caller
/// simply has nothing to execute.
pub fn construct_pipeline(tokens: Vec<Token>) -> Result<Option<Pipeline>, ParsingError> {
    if tokens.is_empty() {
        return Ok(None);
    }
    PipelineBuilder::from(tokens).build().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    fn parse(line: &str) -> Result<Option<Pipeline>, ParsingError> {
        construct_pipeline(split_into_tokens(line).unwrap())
    }

    fn plain_text(word: &Word) -> String {
        word.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn test_single_command() {
        let pipeline = parse("echo hello world").unwrap().unwrap();
        assert_eq!(pipeline.commands.len(), 1);
        let command = &pipeline.commands[0];
        assert_eq!(command.words.len(), 3);
        assert_eq!(plain_text(&command.words[0]), "echo");
        assert!(command.redirects.is_empty());
    }

    #[test]
    fn test_pipeline_splits_on_pipe() {
        let pipeline = parse("ls | grep foo | wc -l").unwrap().unwrap();
        assert_eq!(pipeline.commands.len(), 3);
        assert_eq!(plain_text(&pipeline.commands[1].words[0]), "grep");
        assert_eq!(pipeline.commands[2].words.len(), 2);
    }

    #[test]
    fn test_redirect_order_is_preserved() {
        let pipeline = parse("sort < in > out >> log").unwrap().unwrap();
        let command = &pipeline.commands[0];
        assert_eq!(command.words.len(), 1);
        let kinds: Vec<RedirectKind> = command.redirects.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RedirectKind::Input, RedirectKind::Output, RedirectKind::Append]
        );
        assert_eq!(plain_text(&command.redirects[2].target), "log");
    }

    #[test]
    fn test_redirections_only_command_is_valid() {
        let pipeline = parse("> touched").unwrap().unwrap();
        let command = &pipeline.commands[0];
        assert!(command.words.is_empty());
        assert_eq!(command.redirects.len(), 1);
    }

    #[test]
    fn test_heredoc_keeps_delimiter_word() {
        let pipeline = parse("cat << EOF").unwrap().unwrap();
        let command = &pipeline.commands[0];
        assert_eq!(command.redirects[0].kind, RedirectKind::Heredoc);
        assert_eq!(plain_text(&command.redirects[0].target), "EOF");
    }

    #[test]
    fn test_words_after_redirect_still_join_argv() {
        let pipeline = parse("cat < in more args").unwrap().unwrap();
        let command = &pipeline.commands[0];
        assert_eq!(command.words.len(), 3);
        assert_eq!(command.redirects.len(), 1);
    }

    #[test]
    fn test_empty_input_is_no_pipeline() {
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn test_leading_pipe_is_an_error() {
        assert_eq!(
            parse("| cat"),
            Err(ParsingError::UnexpectedToken("|".to_string()))
        );
    }

    #[test]
    fn test_trailing_pipe_is_an_error() {
        assert_eq!(parse("cat |"), Err(ParsingError::UnexpectedEnd));
    }

    #[test]
    fn test_adjacent_pipes_are_an_error() {
        assert_eq!(
            parse("ls | | wc"),
            Err(ParsingError::UnexpectedToken("|".to_string()))
        );
    }

    #[test]
    fn test_redirect_without_target_is_an_error() {
        assert_eq!(parse("echo a >"), Err(ParsingError::UnexpectedEnd));
        assert_eq!(
            parse("echo a > | wc"),
            Err(ParsingError::UnexpectedToken("|".to_string()))
        );
        assert_eq!(
            parse("cat < < in"),
            Err(ParsingError::UnexpectedToken("<".to_string()))
        );
    }
}
