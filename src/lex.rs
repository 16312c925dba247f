use std::fmt;
use std::iter::FusedIterator;
use thiserror::Error;

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    /// A single `\n`, `\r\n` or `\r`
    LineBreak,
    /// The recipe prefix character at the start of a logical line
    LeadingTab,
    /// `#` up to the end of the physical line
    Comment,
    /// A single- or double-quoted literal on one line
    StringLiteral,
    /// Any other text
    PlainText,
    /// `$(` or `${`
    ExpansionPrefix,
    /// `)` or `}` closing an expansion
    ExpansionSuffix,
    /// `$x`
    VarRef,
    /// One of `=`, `?=`, `:=`, `::=`, `+=`, `!=`
    AssignOp,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// A run of blanks
    Whitespace,
    /// `override`
    KwOverride,
    /// `export`
    KwExport,
    /// `unexport`
    KwUnexport,
    /// `ifdef`
    KwIfdef,
    /// `ifndef`
    KwIfndef,
    /// `ifeq`
    KwIfeq,
    /// `ifneq`
    KwIfneq,
    /// `else`
    KwElse,
    /// `endif`
    KwEndif,
    /// `define`
    KwDefine,
    /// `endef`
    KwEndef,
    /// `undefine`
    KwUndefine,
    /// `include`, `-include` or `sinclude`
    KwInclude,
}

impl TokenKind {
    fn keyword(text: &str) -> Option<TokenKind> {
        Some(match text {
            "override" => TokenKind::KwOverride,
            "export" => TokenKind::KwExport,
            "unexport" => TokenKind::KwUnexport,
            "ifdef" => TokenKind::KwIfdef,
            "ifndef" => TokenKind::KwIfndef,
            "ifeq" => TokenKind::KwIfeq,
            "ifneq" => TokenKind::KwIfneq,
            "else" => TokenKind::KwElse,
            "endif" => TokenKind::KwEndif,
            "define" => TokenKind::KwDefine,
            "endef" => TokenKind::KwEndef,
            "undefine" => TokenKind::KwUndefine,
            "include" | "-include" | "sinclude" => TokenKind::KwInclude,
            _ => return None,
        })
    }

    /// Whether this is one of the directive keywords
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KwOverride
                | TokenKind::KwExport
                | TokenKind::KwUnexport
                | TokenKind::KwIfdef
                | TokenKind::KwIfndef
                | TokenKind::KwIfeq
                | TokenKind::KwIfneq
                | TokenKind::KwElse
                | TokenKind::KwEndif
                | TokenKind::KwDefine
                | TokenKind::KwEndef
                | TokenKind::KwUndefine
                | TokenKind::KwInclude
        )
    }

    /// Whether this keyword opens a conditional
    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            TokenKind::KwIfdef | TokenKind::KwIfndef | TokenKind::KwIfeq | TokenKind::KwIfneq
        )
    }

    /// Whether this keyword may prefix an assignment
    pub fn is_specifier(self) -> bool {
        matches!(
            self,
            TokenKind::KwOverride
                | TokenKind::KwExport
                | TokenKind::KwUnexport
                | TokenKind::KwUndefine
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::LineBreak => "line break",
            TokenKind::LeadingTab => "recipe prefix",
            TokenKind::Comment => "comment",
            TokenKind::StringLiteral => "string literal",
            TokenKind::PlainText => "text",
            TokenKind::ExpansionPrefix => "'$('",
            TokenKind::ExpansionSuffix => "')'",
            TokenKind::VarRef => "variable reference",
            TokenKind::AssignOp => "assignment operator",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Whitespace => "whitespace",
            TokenKind::KwOverride => "'override'",
            TokenKind::KwExport => "'export'",
            TokenKind::KwUnexport => "'unexport'",
            TokenKind::KwIfdef => "'ifdef'",
            TokenKind::KwIfndef => "'ifndef'",
            TokenKind::KwIfeq => "'ifeq'",
            TokenKind::KwIfneq => "'ifneq'",
            TokenKind::KwElse => "'else'",
            TokenKind::KwEndif => "'endif'",
            TokenKind::KwDefine => "'define'",
            TokenKind::KwEndef => "'endef'",
            TokenKind::KwUndefine => "'undefine'",
            TokenKind::KwInclude => "'include'",
        };
        f.write_str(name)
    }
}

/// A location in the source text.
///
/// `line` and `column` are 1-based, `column` counts characters; `offset` is a
/// 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Line number
    pub line: usize,
    /// Column number
    pub column: usize,
    /// Byte offset
    pub offset: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A classified lexeme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    /// What kind of token this is
    pub kind: TokenKind,
    /// The raw text, exactly as it appears in the input
    pub text: String,
    /// Where the token starts
    pub position: Position,
}

impl Token {
    /// Byte offset just past the end of the token
    pub fn end(&self) -> usize {
        self.position.offset + self.text.len()
    }
}

/// The kind of an entry on the lexer's nesting stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Opened by `$(` or `${`
    Expansion,
    /// Opened by a bare `(` inside an expansion
    LiteralParen,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameKind::Expansion => f.write_str("expansion"),
            FrameKind::LiteralParen => f.write_str("parenthesis"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    position: Position,
}

/// An error produced while tokenizing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A control character that cannot appear in a makefile. The lexer skips
    /// it and carries on.
    #[error("{position}: illegal character {character:?}")]
    IllegalCharacter {
        /// Where the character was found
        position: Position,
        /// The offending character
        character: char,
    },

    /// The input ended while an expansion or parenthesis was still open.
    #[error("{position}: unterminated {frame}")]
    UnterminatedNesting {
        /// Where the innermost unclosed frame was opened
        position: Position,
        /// What kind of frame was left open
        frame: FrameKind,
    },
}

impl LexError {
    /// Where the error occurred
    pub fn position(&self) -> Position {
        match self {
            LexError::IllegalCharacter { position, .. } => *position,
            LexError::UnterminatedNesting { position, .. } => *position,
        }
    }

    /// Whether the token stream ends with this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, LexError::UnterminatedNesting { .. })
    }
}

/// Options that change how input is split into tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexOptions {
    /// The character that introduces a recipe line (`.RECIPEPREFIX`)
    pub recipe_prefix: char,
}

impl Default for LexOptions {
    fn default() -> Self {
        LexOptions {
            recipe_prefix: '\t',
        }
    }
}

const ASSIGN_OPS: [&str; 6] = ["::=", ":=", "?=", "+=", "!=", "="];

fn line_break_len(s: &str) -> Option<usize> {
    if s.starts_with("\r\n") {
        Some(2)
    } else if s.starts_with('\n') || s.starts_with('\r') {
        Some(1)
    } else {
        None
    }
}

/// Length of a `\` + line break sequence at the start of `s`
pub(crate) fn continuation_len(s: &str) -> Option<usize> {
    s.strip_prefix('\\').and_then(line_break_len).map(|len| len + 1)
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0b' | '\x0c')
}

fn is_run_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.')
}

fn is_illegal(c: char) -> bool {
    c.is_control() && !is_blank(c) && c != '\n' && c != '\r'
}

/// A single-pass tokenizer over makefile text.
///
/// Yields `Err(LexError::IllegalCharacter)` for each skipped character and keeps
/// going; a final `Err(LexError::UnterminatedNesting)` ends the stream.
pub struct Lexer<'a> {
    text: &'a str,
    offset: usize,
    origin: usize,
    line: usize,
    column: usize,
    stack: Vec<Frame>,
    at_line_start: bool,
    only_whitespace: bool,
    options: LexOptions,
    finished: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer with the default options
    pub fn new(text: &'a str) -> Self {
        Self::with_options(text, LexOptions::default())
    }

    /// Create a lexer with the given options
    pub fn with_options(text: &'a str, options: LexOptions) -> Self {
        Lexer {
            text,
            offset: 0,
            origin: 0,
            line: 1,
            column: 1,
            stack: Vec::new(),
            at_line_start: true,
            only_whitespace: true,
            options,
            finished: false,
        }
    }

    /// Lex a fragment that starts in the middle of a line at `origin`.
    pub(crate) fn with_origin(text: &'a str, origin: Position, options: LexOptions) -> Self {
        Lexer {
            origin: origin.offset,
            line: origin.line,
            column: origin.column,
            at_line_start: false,
            only_whitespace: false,
            ..Self::with_options(text, options)
        }
    }

    /// Number of frames currently open
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.origin + self.offset,
        }
    }

    fn advance(&mut self, len: usize) -> &'a str {
        let source: &'a str = self.text;
        let text = &source[self.offset..self.offset + len];
        for (i, c) in text.char_indices() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.column = 1;
                }
                '\r' if !text[i + 1..].starts_with('\n') => {
                    self.line += 1;
                    self.column = 1;
                }
                _ => self.column += 1,
            }
        }
        self.offset += len;
        text
    }

    fn push(&mut self, kind: FrameKind, position: Position) {
        log::trace!("{}: open {}", position, kind);
        self.stack.push(Frame { kind, position });
    }

    fn pop(&mut self) -> Option<FrameKind> {
        let frame = self.stack.pop()?;
        log::trace!("{}: close {}", self.here(), frame.kind);
        Some(frame.kind)
    }

    fn emit(&mut self, kind: TokenKind, len: usize, position: Position) -> Token {
        let text = self.advance(len);
        self.at_line_start = false;
        self.only_whitespace &= matches!(kind, TokenKind::Whitespace | TokenKind::LeadingTab);
        Token {
            kind,
            text: text.to_string(),
            position,
        }
    }

    fn finish(&mut self) -> Option<Result<Token, LexError>> {
        self.finished = true;
        self.stack.last().map(|frame| {
            Err(LexError::UnterminatedNesting {
                position: frame.position,
                frame: frame.kind,
            })
        })
    }

    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        let source: &'a str = self.text;
        loop {
            let rest = &source[self.offset..];
            let Some(c) = rest.chars().next() else {
                return self.finish();
            };
            let start = self.here();

            if let Some(len) = line_break_len(rest) {
                let token = self.emit(TokenKind::LineBreak, len, start);
                self.at_line_start = true;
                self.only_whitespace = true;
                return Some(Ok(token));
            }
            if let Some(len) = continuation_len(rest) {
                // The logical line carries on, so line-start state is left alone.
                self.advance(len);
                continue;
            }
            if c == self.options.recipe_prefix && self.at_line_start {
                return Some(Ok(self.emit(TokenKind::LeadingTab, c.len_utf8(), start)));
            }

            let after = &rest[c.len_utf8()..];
            let (kind, len) = if rest.starts_with("$$(") {
                (TokenKind::PlainText, 3)
            } else if c == '\\' && after.starts_with(['(', ')', '#']) {
                (TokenKind::PlainText, 2)
            } else if rest.starts_with("$(") || rest.starts_with("${") {
                self.push(FrameKind::Expansion, start);
                (TokenKind::ExpansionPrefix, 2)
            } else if c == '$' {
                match after.chars().next() {
                    Some(next)
                        if line_break_len(after).is_none() && continuation_len(after).is_none() =>
                    {
                        (TokenKind::VarRef, 1 + next.len_utf8())
                    }
                    _ => (TokenKind::PlainText, 1),
                }
            } else if c == ')' || c == '}' {
                match self.stack.last().map(|frame| frame.kind) {
                    Some(FrameKind::Expansion) => {
                        self.pop();
                        (TokenKind::ExpansionSuffix, 1)
                    }
                    Some(FrameKind::LiteralParen) => {
                        self.pop();
                        (TokenKind::PlainText, 1)
                    }
                    None => (TokenKind::PlainText, 1),
                }
            } else if c == '(' {
                if !self.stack.is_empty() {
                    self.push(FrameKind::LiteralParen, start);
                }
                (TokenKind::PlainText, 1)
            } else if let Some(op) = ASSIGN_OPS.iter().find(|op| rest.starts_with(*op)) {
                (TokenKind::AssignOp, op.len())
            } else if c == ':' {
                (TokenKind::Colon, 1)
            } else if c == ',' {
                (TokenKind::Comma, 1)
            } else if is_blank(c) {
                let len = rest.find(|c| !is_blank(c)).unwrap_or(rest.len());
                (TokenKind::Whitespace, len)
            } else if c == '#' {
                let len = rest.find(['\n', '\r']).unwrap_or(rest.len());
                (TokenKind::Comment, len)
            } else if c == '"' || c == '\'' {
                match after.find([c, '\n', '\r']) {
                    Some(end) if after[end..].starts_with(c) => (TokenKind::StringLiteral, end + 2),
                    _ => (TokenKind::PlainText, 1),
                }
            } else if is_run_char(c) {
                let len = rest.find(|c| !is_run_char(c)).unwrap_or(rest.len());
                let kind = match TokenKind::keyword(&rest[..len]) {
                    Some(TokenKind::KwInclude) if !self.only_whitespace => TokenKind::PlainText,
                    Some(keyword) if self.stack.is_empty() => keyword,
                    _ => TokenKind::PlainText,
                };
                (kind, len)
            } else if is_illegal(c) {
                self.advance(c.len_utf8());
                self.at_line_start = false;
                self.only_whitespace = false;
                return Some(Err(LexError::IllegalCharacter {
                    position: start,
                    character: c,
                }));
            } else {
                (TokenKind::PlainText, c.len_utf8())
            };
            return Some(Ok(self.emit(kind, len, start)));
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.next_token()
    }
}

impl FusedIterator for Lexer<'_> {}

/// Tokenize `text` with the default options.
///
/// Illegal characters are logged and skipped; an unterminated expansion is an
/// error.
///
/// # Example
/// ```
/// use makefile_grammar::{tokenize, TokenKind};
///
/// let tokens = tokenize("CC := gcc\n").unwrap();
/// assert_eq!(tokens[2].kind, TokenKind::AssignOp);
/// assert_eq!(tokens[2].text, ":=");
/// ```
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    tokenize_with(text, LexOptions::default())
}

/// Tokenize `text` with the given options
pub fn tokenize_with(text: &str, options: LexOptions) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    for item in Lexer::with_options(text, options) {
        match item {
            Ok(token) => tokens.push(token),
            Err(err) if !err.is_fatal() => log::warn!("skipping {}", err),
            Err(err) => return Err(err),
        }
    }
    Ok(tokens)
}
