//! Lexical analysis: splitting a raw input line into operator and word tokens.

use thiserror::Error;

/// The quoting that surrounded a fragment of a word at lex time.
///
/// Single quotes suppress all later expansion; double quotes keep `$`
/// meaningful but suppress word splitting; unquoted text gets both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    None,
    Single,
    Double,
}

/// A run of characters inside a word that shared one kind of quoting.
/// The quote characters themselves are already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPart {
    pub text: String,
    pub quoting: Quoting,
}

/// A word is the concatenation of adjacent fragments with no separating
/// whitespace, e.g. `a"b"'c'` lexes to one word of three fragments.
pub type Word = Vec<WordPart>;

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word, possibly composed of multiple differently-quoted fragments.
    Word(Word),
    /// The pipe operator, `|`.
    Pipe,
    /// Input redirection, `<`.
    RedirectIn,
    /// Output redirection, `>`.
    RedirectOut,
    /// Appending output redirection, `>>`.
    Append,
    /// Heredoc redirection, `<<`.
    Heredoc,
}

/// Errors that can occur during lexical analysis.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unexpected end of line while looking for matching `{0}'")]
    UnterminatedQuote(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Word,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
        }
    }

    /// Performs lexical analysis on the input line and returns the tokens.
    ///
    /// The FSM walks the input once, accumulating word fragments tagged with
    /// the quoting that surrounded them and emitting operator tokens as they
    /// are seen. Two-character operators win over one-character ones.
    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_quote_end(ch, '\'', Quoting::Single),
                LexingState::ReadingDoubleQuote => self.handle_quote_end(ch, '"', Quoting::Double),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(LexingError::UnterminatedQuote('\'')),
            LexingState::ReadingDoubleQuote => return Err(LexingError::UnterminatedQuote('"')),
            _ => {}
        }

        self.flush_fragment();
        self.flush_word(&mut out);

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' => {}
            '|' | '<' | '>' => {
                let op = self.operator(ch);
                out.push(op);
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' => {
                self.flush_fragment();
                self.flush_word(out);
                self.state = LexingState::Start;
            }
            '|' | '<' | '>' => {
                self.flush_fragment();
                self.flush_word(out);
                let op = self.operator(ch);
                out.push(op);
                self.state = LexingState::Start;
            }
            '\'' => {
                self.flush_fragment();
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.flush_fragment();
                self.state = LexingState::ReadingDoubleQuote;
            }
            c => self.buffer.push(c),
        }
    }

    /// Inside a quoted run: accumulate until the matching close quote, then
    /// emit the fragment. An empty quoted run still produces a fragment so
    /// that `""` survives as an empty word.
    fn handle_quote_end(&mut self, ch: char, close: char, quoting: Quoting) {
        if ch == close {
            self.current_word.push(WordPart {
                text: std::mem::take(&mut self.buffer),
                quoting,
            });
            self.state = LexingState::ReadingWord;
        } else {
            self.buffer.push(ch);
        }
    }

    /// Consume an operator starting at `ch`, preferring the two-character
    /// forms `<<` and `>>`.
    fn operator(&mut self, ch: char) -> Token {
        match ch {
            '|' => Token::Pipe,
            '<' => {
                if self.peek_char() == Some('<') {
                    self.read_char();
                    Token::Heredoc
                } else {
                    Token::RedirectIn
                }
            }
            '>' => {
                if self.peek_char() == Some('>') {
                    self.read_char();
                    Token::Append
                } else {
                    Token::RedirectOut
                }
            }
            _ => unreachable!("operator() called on non-operator character"),
        }
    }

    fn flush_fragment(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word.push(WordPart {
                text: std::mem::take(&mut self.buffer),
                quoting: Quoting::None,
            });
        }
    }

    fn flush_word(&mut self, out: &mut Vec<Token>) {
        if !self.current_word.is_empty() {
            out.push(Token::Word(std::mem::take(&mut self.current_word)));
        }
    }
}

/// The entry point for lexical analysis: tokenize one input line.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(parts: &[(&str, Quoting)]) -> Token {
        Token::Word(
            parts
                .iter()
                .map(|(text, quoting)| WordPart {
                    text: text.to_string(),
                    quoting: *quoting,
                })
                .collect(),
        )
    }

    fn plain(text: &str) -> Token {
        word(&[(text, Quoting::None)])
    }

    #[test]
    fn test_words_and_pipe() {
        let tokens = split_into_tokens("echo hello | wc -l").unwrap();
        assert_eq!(
            tokens,
            vec![
                plain("echo"),
                plain("hello"),
                Token::Pipe,
                plain("wc"),
                plain("-l"),
            ]
        );
    }

    #[test]
    fn test_two_char_operators_win() {
        let tokens = split_into_tokens("cat << EOF >> out").unwrap();
        assert_eq!(
            tokens,
            vec![
                plain("cat"),
                Token::Heredoc,
                plain("EOF"),
                Token::Append,
                plain("out"),
            ]
        );
    }

    #[test]
    fn test_operator_adjacent_to_word() {
        let tokens = split_into_tokens("echo>file").unwrap();
        assert_eq!(tokens, vec![plain("echo"), Token::RedirectOut, plain("file")]);
    }

    #[test]
    fn test_quoting_is_recorded_and_quotes_stripped() {
        let tokens = split_into_tokens("echo 'a b' \"c d\"").unwrap();
        assert_eq!(
            tokens,
            vec![
                plain("echo"),
                word(&[("a b", Quoting::Single)]),
                word(&[("c d", Quoting::Double)]),
            ]
        );
    }

    #[test]
    fn test_adjacent_fragments_form_one_word() {
        let tokens = split_into_tokens("a\"b\"'c'$D").unwrap();
        assert_eq!(
            tokens,
            vec![word(&[
                ("a", Quoting::None),
                ("b", Quoting::Double),
                ("c", Quoting::Single),
                ("$D", Quoting::None),
            ])]
        );
    }

    #[test]
    fn test_empty_quotes_survive() {
        let tokens = split_into_tokens("echo \"\" ''").unwrap();
        assert_eq!(
            tokens,
            vec![
                plain("echo"),
                word(&[("", Quoting::Double)]),
                word(&[("", Quoting::Single)]),
            ]
        );
    }

    #[test]
    fn test_dollar_is_ordinary_to_the_lexer() {
        let tokens = split_into_tokens("echo \"$HOME\" '$HOME'").unwrap();
        assert_eq!(
            tokens,
            vec![
                plain("echo"),
                word(&[("$HOME", Quoting::Double)]),
                word(&[("$HOME", Quoting::Single)]),
            ]
        );
    }

    #[test]
    fn test_tabs_separate_words() {
        let tokens = split_into_tokens("\techo\thi\t").unwrap();
        assert_eq!(tokens, vec![plain("echo"), plain("hi")]);
    }

    #[test]
    fn test_unterminated_quotes() {
        assert_eq!(
            split_into_tokens("echo 'oops"),
            Err(LexingError::UnterminatedQuote('\''))
        );
        assert_eq!(
            split_into_tokens("echo \"oops"),
            Err(LexingError::UnterminatedQuote('"'))
        );
    }

    #[test]
    fn test_empty_line_yields_no_tokens() {
        assert_eq!(split_into_tokens(""), Ok(vec![]));
        assert_eq!(split_into_tokens("   \t "), Ok(vec![]));
    }
}
