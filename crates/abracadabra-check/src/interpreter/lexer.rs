//! Lexer for candidate programs.
//!
//! Logos produces raw tokens including trivia; [`lex`] then applies the
//! line structure:
//! - whitespace, comments and `\` continuations are dropped
//! - newlines inside brackets are dropped (implicit line joining)
//! - blank and comment-only lines produce nothing
//! - the first token of each logical line is preceded by `Newline` and by
//!   `Indent`/`Dedent` tokens derived from its column
//!
//! The indentation of the first logical line is the baseline, so uniformly
//! indented snippets lex the same as unindented ones.

use std::ops::Range;

use logos::Logos;

use super::error::ParseError;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("->")]
    Arrow,
    #[token("@")]
    At,
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    AugAssign,

    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("is")]
    Is,
    #[token("pass")]
    Pass,
    #[token("True")]
    TrueLit,
    #[token("False")]
    FalseLit,
    #[token("None")]
    NoneLit,
    /// Keywords with no place in a graph-construction program. Kept as their
    /// own kind so they cannot be used as names.
    #[token("def")]
    #[token("class")]
    #[token("import")]
    #[token("from")]
    #[token("return")]
    #[token("try")]
    #[token("except")]
    #[token("finally")]
    #[token("with")]
    #[token("as")]
    #[token("lambda")]
    #[token("break")]
    #[token("continue")]
    #[token("yield")]
    #[token("global")]
    #[token("nonlocal")]
    #[token("del")]
    #[token("assert")]
    #[token("raise")]
    #[token("async")]
    #[token("await")]
    ReservedKeyword,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Name,
    #[regex(r"[0-9][0-9_]*")]
    Int,
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+")]
    Float,
    #[regex(r#""(?:[^"\\\n]|\\.)*""#)]
    #[regex(r"'(?:[^'\\\n]|\\.)*'")]
    Str,

    #[regex(r"[ \t\x0c]+")]
    Whitespace,
    #[regex(r"#[^\r\n]*", allow_greedy = true)]
    Comment,
    #[regex(r"\\\r?\n")]
    Continuation,
    #[token("\n")]
    #[token("\r\n")]
    Newline,

    // Produced by `lex`, never by logos.
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::Continuation
        )
    }

    /// Human-readable spelling used in parse errors.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Newline => "end of line",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::Eof => "end of input",
            TokenKind::Name => "name",
            TokenKind::Int | TokenKind::Float => "number",
            TokenKind::Str => "string",
            _ => "token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    /// 1-based source line.
    pub line: usize,
}

/// Tokenizes `source`, ending with `Newline` (when non-empty), any pending
/// `Dedent`s and `Eof`.
pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);

    let mut line = 1;
    let mut line_start = 0;
    let mut at_line_start = true;
    let mut depth = 0usize;
    let mut indents: Vec<usize> = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let kind = match result {
            Ok(kind) => kind,
            Err(()) => {
                return Err(ParseError::new(
                    line,
                    format!("invalid character {:?}", lexer.slice()),
                ));
            }
        };

        if kind.is_trivia() {
            if kind == TokenKind::Continuation {
                line += 1;
                line_start = span.end;
            }
            continue;
        }

        if kind == TokenKind::Newline {
            line += 1;
            line_start = span.end;
            if depth == 0 {
                at_line_start = true;
            }
            continue;
        }

        if at_line_start {
            at_line_start = false;
            let width = indent_width(&source[line_start..span.start]);
            match indents.last().copied() {
                None => indents.push(width),
                Some(current) => {
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        span: span.start..span.start,
                        line,
                    });
                    if width > current {
                        indents.push(width);
                        tokens.push(Token {
                            kind: TokenKind::Indent,
                            span: span.start..span.start,
                            line,
                        });
                    } else if width < current {
                        while indents.last().is_some_and(|&top| top > width) && indents.len() > 1 {
                            indents.pop();
                            tokens.push(Token {
                                kind: TokenKind::Dedent,
                                span: span.start..span.start,
                                line,
                            });
                        }
                        if indents.last() != Some(&width) {
                            return Err(ParseError::new(
                                line,
                                "unindent does not match any outer indentation level",
                            ));
                        }
                    }
                }
            }
        }

        match kind {
            TokenKind::ParenOpen | TokenKind::BracketOpen | TokenKind::BraceOpen => depth += 1,
            TokenKind::ParenClose | TokenKind::BracketClose | TokenKind::BraceClose => {
                depth = depth.saturating_sub(1)
            }
            _ => {}
        }

        tokens.push(Token { kind, span, line });
    }

    let end = source.len();
    if !indents.is_empty() {
        tokens.push(Token {
            kind: TokenKind::Newline,
            span: end..end,
            line,
        });
    }
    for _ in 1..indents.len() {
        tokens.push(Token {
            kind: TokenKind::Dedent,
            span: end..end,
            line,
        });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: end..end,
        line,
    });

    Ok(tokens)
}

/// Column width of leading whitespace; tabs advance to the next multiple of 8.
fn indent_width(prefix: &str) -> usize {
    prefix.chars().fold(0, |width, c| match c {
        '\t' => (width / 8 + 1) * 8,
        _ => width + 1,
    })
}
