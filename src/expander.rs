//! Variable expansion over parsed words: `$NAME`, `$?` and `$0`, applied
//! with quote-sensitive rules, plus the word splitting of unquoted
//! substitutions.

use std::iter::Peekable;
use std::str::Chars;

use crate::env::Environment;
use crate::lexer::{Quoting, Word};
use crate::parser::{Pipeline, RedirectKind};

/// A redirection after expansion, ready for the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoRedirect {
    Input(String),
    Output(String),
    Append(String),
    /// `expand` records whether the delimiter was entirely unquoted, which
    /// decides whether the collected body lines get expanded. `body` is
    /// empty until the heredoc collector fills it.
    Heredoc {
        delimiter: String,
        expand: bool,
        body: String,
    },
}

/// One pipeline stage after expansion: a flat argv and its redirections in
/// written order. `argv` may be empty when the stage is redirections-only or
/// when every word expanded away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedCommand {
    pub argv: Vec<String>,
    pub redirects: Vec<IoRedirect>,
}

/// Expand every stage of a parsed pipeline.
///
/// Argv words expand with word splitting; redirection targets expand without
/// splitting; heredoc delimiters are taken verbatim, stripped of quotes.
pub fn expand_pipeline(pipeline: &Pipeline, env: &Environment) -> Vec<ExpandedCommand> {
    pipeline
        .commands
        .iter()
        .map(|command| {
            let mut argv = Vec::new();
            for word in &command.words {
                argv.extend(expand_word(word, env));
            }
            let redirects = command
                .redirects
                .iter()
                .map(|redirect| match redirect.kind {
                    RedirectKind::Input => IoRedirect::Input(expand_word_joined(&redirect.target, env)),
                    RedirectKind::Output => IoRedirect::Output(expand_word_joined(&redirect.target, env)),
                    RedirectKind::Append => IoRedirect::Append(expand_word_joined(&redirect.target, env)),
                    RedirectKind::Heredoc => IoRedirect::Heredoc {
                        delimiter: redirect.target.iter().map(|p| p.text.as_str()).collect(),
                        expand: redirect
                            .target
                            .iter()
                            .all(|part| part.quoting == Quoting::None),
                        body: String::new(),
                    },
                })
                .collect();
            ExpandedCommand { argv, redirects }
        })
        .collect()
}

/// Expand one word into zero or more argv entries.
///
/// Single-quoted fragments pass through untouched; double-quoted fragments
/// substitute without splitting; unquoted fragments substitute and split the
/// substituted value at whitespace. A word that reduces to nothing is
/// dropped unless some fragment of it was quoted, so `$UNSET` vanishes while
/// `""` and `"$UNSET"` stay as one empty entry.
pub fn expand_word(word: &Word, env: &Environment) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut any_quoted = false;

    for part in word {
        match part.quoting {
            Quoting::Single => {
                any_quoted = true;
                current.push_str(&part.text);
            }
            Quoting::Double => {
                any_quoted = true;
                expand_into(&part.text, env, &mut current);
            }
            Quoting::None => {
                let mut chars = part.text.chars().peekable();
                while let Some(ch) = chars.next() {
                    if ch == '$' {
                        match scan_dollar(&mut chars, env) {
                            Some(value) => split_value_into(&value, &mut current, &mut fields),
                            None => current.push('$'),
                        }
                    } else {
                        current.push(ch);
                    }
                }
            }
        }
    }

    if !current.is_empty() {
        fields.push(current);
    } else if fields.is_empty() && any_quoted {
        fields.push(String::new());
    }
    fields
}

/// Expand a word to a single string, never splitting. Used for the targets
/// of file redirections.
pub fn expand_word_joined(word: &Word, env: &Environment) -> String {
    let mut out = String::new();
    for part in word {
        match part.quoting {
            Quoting::Single => out.push_str(&part.text),
            Quoting::Double | Quoting::None => expand_into(&part.text, env, &mut out),
        }
    }
    out
}

/// Expand `$` forms in free text, never splitting. Used for heredoc body
/// lines when the delimiter was unquoted.
pub fn expand_text(text: &str, env: &Environment) -> String {
    let mut out = String::new();
    expand_into(text, env, &mut out);
    out
}

fn expand_into(text: &str, env: &Environment, out: &mut String) {
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '$' {
            match scan_dollar(&mut chars, env) {
                Some(value) => out.push_str(&value),
                None => out.push('$'),
            }
        } else {
            out.push(ch);
        }
    }
}

/// Resolve the expansion form following a `$`, consuming exactly the
/// characters that belong to it.
///
/// Returns `None` when the `$` stands for itself (end of fragment, digit
/// other than `0`, punctuation); the character after it is left for the
/// caller to rescan normally.
fn scan_dollar(chars: &mut Peekable<Chars>, env: &Environment) -> Option<String> {
    match chars.peek().copied() {
        Some('?') => {
            chars.next();
            Some(env.last_status.to_string())
        }
        Some('0') => {
            chars.next();
            Some(env.shell_name.clone())
        }
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            Some(env.get_var(&name).unwrap_or_default().to_string())
        }
        _ => None,
    }
}

/// Append a substituted value to the field under construction, splitting at
/// whitespace. Leading or trailing whitespace in the value also closes the
/// current field, so `p$X` with `X=" a "` yields `p` and `a`.
fn split_value_into(value: &str, current: &mut String, fields: &mut Vec<String>) {
    if value.is_empty() {
        return;
    }
    let starts_blank = value.starts_with(|c: char| c.is_ascii_whitespace());
    let ends_blank = value.ends_with(|c: char| c.is_ascii_whitespace());

    if starts_blank && !current.is_empty() {
        fields.push(std::mem::take(current));
    }
    let mut pieces = value.split_ascii_whitespace().peekable();
    while let Some(piece) = pieces.next() {
        current.push_str(piece);
        if pieces.peek().is_some() || ends_blank {
            fields.push(std::mem::take(current));
        }
    }
}
