use crate::lex::{continuation_len, LexError, LexOptions, Lexer, Position, Token, TokenKind};
use crate::SyntaxKind;
use crate::SyntaxKind::*;
use rowan::ast::AstNode;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
/// An error that can occur when parsing a makefile
pub enum Error {
    /// An I/O error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input could not be tokenized
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    /// A parse error occurred
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Something the parser would have accepted where it failed
pub enum Expected {
    /// A token of the given kind
    Token(TokenKind),
    /// A described construct, such as a variable name or a literal `)`
    Text(&'static str),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expected::Token(kind) => write!(f, "{}", kind),
            Expected::Text(text) => f.write_str(text),
        }
    }
}

fn describe(expected: &[Expected]) -> String {
    let items = expected.iter().map(|e| e.to_string()).collect::<Vec<_>>();
    match items.len() {
        0 => "nothing".to_string(),
        1 => items.join(""),
        _ => format!("one of {}", items.join(", ")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// An error that occurred while parsing a makefile
pub enum ParseError {
    /// A token that does not fit the grammar at this point
    #[error("{position}: unexpected {found} {text:?}, expected {}", describe(.expected))]
    UnexpectedToken {
        /// Where the token starts
        position: Position,
        /// The kind of token found
        found: TokenKind,
        /// The text of the token found
        text: String,
        /// What would have been accepted instead
        expected: Vec<Expected>,
    },

    /// The input ended in the middle of a construct
    #[error("unexpected end of input, expected {}", describe(.expected))]
    UnexpectedEof {
        /// What would have been accepted instead
        expected: Vec<Expected>,
    },
}

impl ParseError {
    /// Where the error occurred, if not at the end of input
    pub fn position(&self) -> Option<Position> {
        match self {
            ParseError::UnexpectedToken { position, .. } => Some(*position),
            ParseError::UnexpectedEof { .. } => None,
        }
    }

    /// What the parser would have accepted
    pub fn expected(&self) -> &[Expected] {
        match self {
            ParseError::UnexpectedToken { expected, .. } => expected,
            ParseError::UnexpectedEof { expected } => expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Options controlling a parse
pub struct ParseOptions {
    /// Options passed on to the lexer
    pub lex: LexOptions,
    /// Treat illegal characters as errors instead of skipping them
    pub strict: bool,
}

/// The rowan language of Makefile trees, mapping raw kinds to [`SyntaxKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lang {}
impl rowan::Language for Lang {
    type Kind = SyntaxKind;
    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 <= EXPANSION as u16);
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }
    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

/// GreenNode is an immutable tree, which is cheap to change,
/// but doesn't contain offsets and parent pointers.
use rowan::GreenNode;

/// You can construct GreenNodes by hand, but a builder
/// is helpful for top-down parsers: it maintains a stack
/// of currently in-progress nodes
use rowan::GreenNodeBuilder;

/// The parse results are stored as a "green tree".
#[derive(Debug)]
pub(crate) struct Parse {
    pub(crate) green_node: GreenNode,
}

/// Shape of a logical line, judged from its first tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Eof,
    Blank,
    Comment,
    Recipe,
    Keyword(TokenKind),
    Other,
}

fn is_text(token: &Token, text: &str) -> bool {
    token.kind == TokenKind::PlainText && token.text == text
}

fn ends_prerequisites(token: &Token) -> bool {
    is_text(token, "|") || is_text(token, ";")
}

/// A lexer over the inside of a quoted literal
fn quoted(token: &Token, options: LexOptions) -> Lexer<'_> {
    let origin = Position {
        line: token.position.line,
        column: token.position.column + 1,
        offset: token.position.offset + 1,
    };
    Lexer::with_origin(&token.text[1..token.text.len() - 1], origin, options)
}

/// The first illegal character inside a quoted literal, where the outer lexer
/// does not look.
fn hidden_illegal_character(token: &Token, options: LexOptions) -> Option<LexError> {
    quoted(token, options).find_map(|item| match item {
        Ok(inner) if inner.kind == TokenKind::StringLiteral => {
            hidden_illegal_character(&inner, options)
        }
        Ok(_) => None,
        Err(err) => (!err.is_fatal()).then_some(err),
    })
}

pub(crate) fn parse(text: &str, options: &ParseOptions) -> Result<Parse, Error> {
    struct Parser<'a> {
        /// the original text, used to recover what the lexer dropped
        text: &'a str,
        /// input tokens, including whitespace,
        /// in *reverse* order.
        tokens: Vec<Token>,
        /// the in-progress tree.
        builder: GreenNodeBuilder<'static>,
        /// byte offset up to which the tree covers the text
        cursor: usize,
        /// line breaks are part of expressions (define bodies)
        multiline: bool,
        options: &'a ParseOptions,
    }

    impl Parser<'_> {
        fn parse(mut self) -> Result<GreenNode, ParseError> {
            self.builder.start_node(ROOT.into());
            while self.current().is_some() {
                self.parse_statement()?;
            }
            self.trivia_until(self.text.len());
            self.builder.finish_node();
            Ok(self.builder.finish())
        }

        fn parse_statement(&mut self) -> Result<(), ParseError> {
            let first = self.skip_blank_from(0);
            let Some(kind) = self.nth(first).map(|t| t.kind) else {
                // Trailing blanks at the end of input
                while self.current().is_some() {
                    self.bump();
                }
                return Ok(());
            };
            log::debug!("statement starting with {}", kind);
            match kind {
                TokenKind::LineBreak => self.parse_blank_line(),
                TokenKind::Comment => self.parse_comment_line(),
                kind if kind.is_conditional() => self.parse_conditional(CONDITIONAL),
                TokenKind::KwOverride
                | TokenKind::KwExport
                | TokenKind::KwUnexport
                | TokenKind::KwUndefine
                | TokenKind::KwDefine => self.parse_specified(first),
                TokenKind::KwInclude => self.parse_include(),
                TokenKind::KwElse | TokenKind::KwEndif | TokenKind::KwEndef => {
                    Err(self.unexpected_at(first, &[Expected::Text("statement")]))
                }
                _ => match self.find_top_level(
                    first,
                    &[TokenKind::Colon, TokenKind::AssignOp],
                    false,
                ) {
                    Some(TokenKind::Colon) => self.parse_rule(),
                    Some(_) => self.parse_assignment(),
                    None if self.starts_expansion(first) => self.parse_function(),
                    None => Err(self.unexpected_at(
                        first,
                        &[Expected::Token(TokenKind::Colon), Expected::Token(TokenKind::AssignOp)],
                    )),
                },
            }
        }

        fn parse_blank_line(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(BLANK_LINE.into());
            self.skip_blank();
            if self.at(TokenKind::LineBreak) {
                self.bump();
            }
            self.builder.finish_node();
            Ok(())
        }

        fn parse_comment_line(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(COMMENT_LINE.into());
            self.skip_blank();
            self.expect_eol()?;
            self.builder.finish_node();
            Ok(())
        }

        /// Lines led by `override`, `export`, `unexport`, `undefine` or `define`.
        fn parse_specified(&mut self, first: usize) -> Result<(), ParseError> {
            let (specifiers, after) = self.specifiers_at(first)?;
            let next = self.nth(after).map(|t| t.kind);
            if next == Some(TokenKind::KwDefine) {
                return self.parse_define();
            }
            if specifiers.contains(&TokenKind::KwUndefine)
                || self
                    .find_top_level(after, &[TokenKind::AssignOp], false)
                    .is_some()
            {
                return self.parse_assignment();
            }
            if matches!(specifiers.as_slice(), [TokenKind::KwExport] | [TokenKind::KwUnexport]) {
                return self.parse_export();
            }
            match next {
                None | Some(TokenKind::LineBreak) | Some(TokenKind::Comment) => {
                    Err(self.unexpected_at(after, &[Expected::Text("variable name")]))
                }
                Some(_) => Err(self.unexpected_at(
                    self.line_end_from(after),
                    &[Expected::Token(TokenKind::AssignOp)],
                )),
            }
        }

        /// Collect the specifier keywords starting at `n`, checking that they
        /// combine: `override` plus at most one of the others.
        fn specifiers_at(&self, mut n: usize) -> Result<(Vec<TokenKind>, usize), ParseError> {
            let mut found = Vec::new();
            while let Some(kind) = self.nth(n).map(|t| t.kind).filter(|k| k.is_specifier()) {
                let conflict = if kind == TokenKind::KwOverride {
                    found.contains(&TokenKind::KwOverride)
                } else {
                    found.iter().any(|k| *k != TokenKind::KwOverride)
                };
                if conflict {
                    return Err(self.unexpected_at(n, &[Expected::Text("variable name")]));
                }
                found.push(kind);
                n = self.skip_ws_from(n + 1);
            }
            Ok((found, n))
        }

        fn bump_specifiers(&mut self) -> Result<Vec<TokenKind>, ParseError> {
            let (specifiers, _) = self.specifiers_at(0)?;
            for _ in &specifiers {
                self.bump();
                self.skip_ws();
            }
            Ok(specifiers)
        }

        fn parse_assignment(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(ASSIGNMENT.into());
            self.skip_blank();
            let specifiers = self.bump_specifiers()?;
            if self.at_line_end() || self.at(TokenKind::AssignOp) {
                return Err(self.unexpected(&[Expected::Text("variable name")]));
            }
            if specifiers.contains(&TokenKind::KwUndefine) {
                self.parse_expr(|t| t.kind == TokenKind::Comment)?;
                self.expect_eol()?;
                self.builder.finish_node();
                return Ok(());
            }
            self.parse_expr(|t| t.kind == TokenKind::AssignOp)?;
            self.skip_ws();
            if !self.at(TokenKind::AssignOp) {
                return Err(self.unexpected(&[Expected::Token(TokenKind::AssignOp)]));
            }
            self.bump();
            self.skip_ws();
            self.parse_expr(|t| t.kind == TokenKind::Comment)?;
            self.expect_eol()?;
            self.builder.finish_node();
            Ok(())
        }

        fn starts_expansion(&self, n: usize) -> bool {
            self.nth(n).is_some_and(|t| match t.kind {
                TokenKind::ExpansionPrefix => true,
                TokenKind::VarRef => t.text != "$$",
                _ => false,
            })
        }

        /// A line evaluated for its side effects, as in `$(eval $(call T,a))`.
        fn parse_function(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(FUNCTION.into());
            self.skip_blank();
            self.parse_expr(|t| t.kind == TokenKind::Comment)?;
            self.expect_eol()?;
            self.builder.finish_node();
            Ok(())
        }

        fn parse_export(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(EXPORT.into());
            self.skip_blank();
            self.bump();
            self.skip_ws();
            if !self.at_line_end() {
                self.parse_words(|_| false)?;
            }
            self.expect_eol()?;
            self.builder.finish_node();
            Ok(())
        }

        fn parse_include(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(INCLUDE.into());
            self.skip_blank();
            self.bump();
            self.skip_ws();
            if self.at_line_end() {
                return Err(self.unexpected(&[Expected::Text("file name")]));
            }
            self.parse_words(|_| false)?;
            self.expect_eol()?;
            self.builder.finish_node();
            Ok(())
        }

        fn parse_define(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(DEFINE.into());
            self.skip_blank();
            self.bump_specifiers()?;
            self.bump();
            self.skip_ws();
            if self.at_line_end() || self.at(TokenKind::AssignOp) {
                return Err(self.unexpected(&[Expected::Text("macro name")]));
            }
            self.parse_expr(|t| matches!(t.kind, TokenKind::Whitespace | TokenKind::AssignOp))?;
            self.skip_ws();
            if self.at(TokenKind::AssignOp) {
                self.bump();
            }
            self.expect_eol()?;

            let endef = self.find_endef().ok_or_else(|| ParseError::UnexpectedEof {
                expected: vec![Expected::Token(TokenKind::KwEndef)],
            })?;
            // The line break ending the last body line belongs to the define,
            // not to the body.
            let body_len = endef.saturating_sub(1);
            let body = self.tokens.split_off(self.tokens.len() - body_len);
            let outer = std::mem::replace(&mut self.tokens, body);
            self.builder.start_node(EXPR.into());
            self.multiline = true;
            let result = self.parse_fragments();
            self.multiline = false;
            self.tokens = outer;
            result?;
            self.builder.finish_node();

            if endef > 0 {
                self.bump();
            }
            self.skip_blank();
            self.bump();
            self.expect_eol()?;
            self.builder.finish_node();
            Ok(())
        }

        /// Index of the line holding the `endef` that closes the current define.
        fn find_endef(&self) -> Option<usize> {
            let mut depth = 0usize;
            let mut n = 0;
            loop {
                let first = self.skip_blank_from(n);
                match self.nth(first).map(|t| t.kind) {
                    None => return None,
                    // Recipe lines never open or close a define
                    _ if self.nth(n).is_some_and(|t| t.kind == TokenKind::LeadingTab) => {}
                    Some(TokenKind::KwEndef) if self.ends_directive(first + 1) => {
                        if depth == 0 {
                            return Some(n);
                        }
                        depth -= 1;
                    }
                    Some(kind) if kind == TokenKind::KwDefine || kind.is_specifier() => {
                        if self.define_follows(first) {
                            depth += 1;
                        }
                    }
                    _ => {}
                }
                n = self.next_line(n);
            }
        }

        fn define_follows(&self, mut n: usize) -> bool {
            while let Some(token) = self.nth(n) {
                match token.kind {
                    TokenKind::KwDefine => return true,
                    TokenKind::Whitespace => {}
                    kind if kind.is_specifier() => {}
                    _ => return false,
                }
                n += 1;
            }
            false
        }

        /// Only whitespace or a comment remain on the line at `n`.
        fn ends_directive(&self, n: usize) -> bool {
            matches!(
                self.nth(self.skip_ws_from(n)).map(|t| t.kind),
                None | Some(TokenKind::LineBreak) | Some(TokenKind::Comment)
            )
        }

        fn parse_conditional(&mut self, kind: SyntaxKind) -> Result<(), ParseError> {
            self.builder.start_node(kind.into());
            self.skip_blank();
            self.parse_condition()?;
            self.expect_eol()?;
            self.parse_branch(kind)?;
            if self.branch_end(kind) == Some(TokenKind::KwElse) {
                self.builder.start_node(ELSE_BRANCH.into());
                self.skip_blank();
                self.bump();
                self.skip_ws();
                if self.current().is_some_and(|t| t.kind.is_conditional()) {
                    // `else ifeq ...` chains; the nested conditional owns the endif.
                    self.parse_conditional(kind)?;
                    self.builder.finish_node();
                    self.builder.finish_node();
                    return Ok(());
                }
                self.expect_eol()?;
                self.parse_branch(kind)?;
                self.builder.finish_node();
            }
            if self.branch_end(kind) != Some(TokenKind::KwEndif) {
                return Err(self.unexpected_at(
                    self.skip_blank_from(0),
                    &[Expected::Token(TokenKind::KwEndif)],
                ));
            }
            self.skip_blank();
            self.bump();
            self.expect_eol()?;
            self.builder.finish_node();
            Ok(())
        }

        fn parse_condition(&mut self) -> Result<(), ParseError> {
            let Some(keyword) = self.current().map(|t| t.kind) else {
                return Err(self.unexpected(&[Expected::Text("conditional")]));
            };
            self.bump();
            self.skip_ws();
            self.builder.start_node(CONDITION.into());
            if matches!(keyword, TokenKind::KwIfdef | TokenKind::KwIfndef) {
                if self.at_line_end() {
                    return Err(self.unexpected(&[Expected::Text("variable name")]));
                }
                self.parse_expr(|t| t.kind == TokenKind::Whitespace)?;
            } else if self.current().is_some_and(|t| is_text(t, "(")) {
                self.bump();
                self.skip_ws();
                self.parse_operand(|t| t.kind == TokenKind::Comma || is_text(t, ")"))?;
                self.skip_ws();
                if !self.at(TokenKind::Comma) {
                    return Err(self.unexpected(&[Expected::Token(TokenKind::Comma)]));
                }
                self.bump();
                self.skip_ws();
                self.parse_operand(|t| is_text(t, ")"))?;
                self.skip_ws();
                if !self.current().is_some_and(|t| is_text(t, ")")) {
                    return Err(self.unexpected(&[Expected::Text("')'")]));
                }
                self.bump();
            } else if self.at(TokenKind::StringLiteral) {
                self.parse_quoted_operand()?;
                self.skip_ws();
                if !self.at(TokenKind::StringLiteral) {
                    return Err(self.unexpected(&[Expected::Token(TokenKind::StringLiteral)]));
                }
                self.parse_quoted_operand()?;
            } else {
                return Err(self.unexpected(&[
                    Expected::Text("'('"),
                    Expected::Token(TokenKind::StringLiteral),
                ]));
            }
            self.builder.finish_node();
            Ok(())
        }

        /// One side of `(A,B)`; literal parentheses nest.
        fn parse_operand(&mut self, end: impl Fn(&Token) -> bool) -> Result<(), ParseError> {
            self.builder.start_node(EXPR.into());
            let mut depth = 0usize;
            while let Some(token) = self.current() {
                if token.kind == TokenKind::LineBreak {
                    break;
                }
                if depth == 0 && end(token) {
                    break;
                }
                if token.kind == TokenKind::Whitespace && depth == 0 {
                    let m = self.skip_ws_from(0);
                    if self.nth(m).map_or(true, |t| t.kind == TokenKind::LineBreak || end(t)) {
                        break;
                    }
                }
                if is_text(token, "(") {
                    depth += 1;
                } else if is_text(token, ")") {
                    depth = depth.saturating_sub(1);
                }
                self.parse_fragment()?;
            }
            self.builder.finish_node();
            Ok(())
        }

        fn parse_quoted_operand(&mut self) -> Result<(), ParseError> {
            let Some(token) = self.tokens.pop() else {
                return Err(self.unexpected(&[Expected::Token(TokenKind::StringLiteral)]));
            };
            let close = token.text.len() - 1;
            self.token_at(QUOTE, token.position.offset, &token.text[..1]);
            self.builder.start_node(EXPR.into());
            match self.relex(&token) {
                Some(inner) => self.parse_inner(inner)?,
                None => self.token_at(TEXT, token.position.offset + 1, &token.text[1..close]),
            }
            self.builder.finish_node();
            self.token_at(QUOTE, token.position.offset + close, &token.text[close..]);
            Ok(())
        }

        fn parse_branch(&mut self, context: SyntaxKind) -> Result<(), ParseError> {
            let recipe = context == RECIPE_CONDITIONAL;
            self.builder
                .start_node(if recipe { RECIPE_BRANCH } else { BRANCH }.into());
            while self.branch_end(context).is_none() {
                match self.line_kind(0) {
                    Line::Eof => {
                        return Err(ParseError::UnexpectedEof {
                            expected: vec![
                                Expected::Token(TokenKind::KwElse),
                                Expected::Token(TokenKind::KwEndif),
                            ],
                        })
                    }
                    line if recipe => self.parse_recipe_item(line)?,
                    _ => self.parse_statement()?,
                }
            }
            self.builder.finish_node();
            Ok(())
        }

        /// `else` or `endif` if the next line is one. In recipe context a
        /// tab-led line is always a command.
        fn branch_end(&self, context: SyntaxKind) -> Option<TokenKind> {
            let kind = if context == RECIPE_CONDITIONAL {
                match self.line_kind(0) {
                    Line::Keyword(kind) => Some(kind),
                    _ => None,
                }
            } else {
                self.nth(self.skip_blank_from(0)).map(|t| t.kind)
            };
            kind.filter(|k| matches!(k, TokenKind::KwElse | TokenKind::KwEndif))
        }

        fn parse_recipe_item(&mut self, line: Line) -> Result<(), ParseError> {
            match line {
                Line::Recipe => self.parse_recipe_line(),
                Line::Blank => self.parse_blank_line(),
                Line::Comment => self.parse_comment_line(),
                Line::Keyword(kind) if kind.is_conditional() => {
                    self.parse_conditional(RECIPE_CONDITIONAL)
                }
                _ => Err(self.unexpected_at(
                    self.skip_blank_from(0),
                    &[
                        Expected::Token(TokenKind::LeadingTab),
                        Expected::Token(TokenKind::KwElse),
                        Expected::Token(TokenKind::KwEndif),
                    ],
                )),
            }
        }

        fn parse_recipe_line(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(RECIPE.into());
            self.bump();
            self.skip_ws();
            self.parse_expr(|_| false)?;
            self.skip_ws();
            if self.at(TokenKind::LineBreak) {
                self.bump();
            }
            self.builder.finish_node();
            Ok(())
        }

        fn parse_rule(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(RULE.into());
            self.skip_blank();
            if self.at(TokenKind::Colon) {
                return Err(self.unexpected(&[Expected::Text("target")]));
            }
            self.builder.start_node(TARGETS.into());
            loop {
                self.parse_expr(|t| matches!(t.kind, TokenKind::Whitespace | TokenKind::Colon))?;
                let m = self.skip_ws_from(0);
                match self.nth(m).map(|t| t.kind) {
                    Some(TokenKind::Colon) => break,
                    None | Some(TokenKind::LineBreak) | Some(TokenKind::Comment) => {
                        return Err(self.unexpected_at(m, &[Expected::Token(TokenKind::Colon)]))
                    }
                    Some(_) => self.skip_ws(),
                }
            }
            self.builder.finish_node();
            self.skip_ws();
            self.bump();
            // `::` with nothing between the colons
            let cursor = self.cursor;
            if self
                .current()
                .is_some_and(|t| t.kind == TokenKind::Colon && t.position.offset == cursor)
            {
                self.bump();
            }
            self.skip_ws();

            if self
                .find_top_level(0, &[TokenKind::AssignOp], true)
                .is_some()
            {
                // Target-specific variable
                self.parse_assignment()?;
                self.builder.finish_node();
                return Ok(());
            }

            if !self.at_line_end() && !self.current().is_some_and(ends_prerequisites) {
                self.builder.start_node(PREREQUISITES.into());
                self.parse_words(ends_prerequisites)?;
                self.builder.finish_node();
                self.skip_ws();
            }
            if self.current().is_some_and(|t| is_text(t, "|")) {
                self.bump();
                self.skip_ws();
                if !self.at_line_end() && !self.current().is_some_and(ends_prerequisites) {
                    self.builder.start_node(ORDER_ONLY.into());
                    self.parse_words(ends_prerequisites)?;
                    self.builder.finish_node();
                    self.skip_ws();
                }
            }
            if self.current().is_some_and(|t| is_text(t, ";")) {
                self.builder.start_node(RECIPE.into());
                self.bump();
                self.skip_ws();
                self.parse_expr(|_| false)?;
                self.skip_ws();
                if self.at(TokenKind::LineBreak) {
                    self.bump();
                }
                self.builder.finish_node();
            } else {
                self.expect_eol()?;
            }

            self.parse_recipes()?;
            self.builder.finish_node();
            Ok(())
        }

        /// Accumulate recipe lines after a rule header. Blank and comment lines
        /// only stay with the rule when more recipe follows them.
        fn parse_recipes(&mut self) -> Result<(), ParseError> {
            loop {
                match self.line_kind(0) {
                    Line::Recipe => self.parse_recipe_line()?,
                    line @ (Line::Blank | Line::Comment) => {
                        let mut n = 0;
                        while self.nth(n).is_some()
                            && matches!(self.line_kind(n), Line::Blank | Line::Comment)
                        {
                            n = self.next_line(n);
                        }
                        if !self.continues_recipe(n) {
                            break;
                        }
                        self.parse_recipe_item(line)?;
                    }
                    Line::Keyword(kind)
                        if kind.is_conditional() && self.is_recipe_conditional(0) =>
                    {
                        self.parse_conditional(RECIPE_CONDITIONAL)?
                    }
                    _ => break,
                }
            }
            Ok(())
        }

        fn continues_recipe(&self, n: usize) -> bool {
            match self.line_kind(n) {
                Line::Recipe => true,
                Line::Keyword(kind) if kind.is_conditional() => self.is_recipe_conditional(n),
                _ => false,
            }
        }

        /// A conditional after a rule belongs to its recipe when everything up
        /// to the matching `endif` is recipe, blank or comment lines.
        fn is_recipe_conditional(&self, mut n: usize) -> bool {
            let mut depth = 0usize;
            let mut saw_recipe = false;
            loop {
                match self.line_kind(n) {
                    Line::Keyword(kind) if kind.is_conditional() => depth += 1,
                    Line::Keyword(TokenKind::KwElse) => {}
                    Line::Keyword(TokenKind::KwEndif) => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return saw_recipe;
                        }
                    }
                    Line::Recipe => saw_recipe = true,
                    Line::Blank | Line::Comment => {}
                    Line::Eof | Line::Keyword(_) | Line::Other => return false,
                }
                n = self.next_line(n);
            }
        }

        /// Whitespace separated expressions, up to the end of the line or a
        /// token matching `end`.
        fn parse_words(&mut self, end: impl Fn(&Token) -> bool) -> Result<(), ParseError> {
            loop {
                self.parse_expr(|t| {
                    matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment) || end(t)
                })?;
                let m = self.skip_ws_from(0);
                match self.nth(m) {
                    None => break,
                    Some(t)
                        if matches!(t.kind, TokenKind::LineBreak | TokenKind::Comment) || end(t) =>
                    {
                        break
                    }
                    Some(_) => self.skip_ws(),
                }
            }
            Ok(())
        }

        /// An expression running up to `stop`, a line break or the end of
        /// input. Trailing whitespace is left outside.
        fn parse_expr(&mut self, stop: impl Fn(&Token) -> bool) -> Result<(), ParseError> {
            self.builder.start_node(EXPR.into());
            while let Some(token) = self.current() {
                if token.kind == TokenKind::LineBreak || stop(token) {
                    break;
                }
                if token.kind == TokenKind::Whitespace {
                    let m = self.skip_ws_from(0);
                    if self
                        .nth(m)
                        .map_or(true, |t| t.kind == TokenKind::LineBreak || stop(t))
                    {
                        break;
                    }
                }
                self.parse_fragment()?;
            }
            self.builder.finish_node();
            Ok(())
        }

        fn parse_fragments(&mut self) -> Result<(), ParseError> {
            while self.current().is_some() {
                self.parse_fragment()?;
            }
            Ok(())
        }

        fn parse_fragment(&mut self) -> Result<(), ParseError> {
            let Some((kind, escaped)) = self.current().map(|t| (t.kind, t.text == "$$")) else {
                return Err(self.unexpected(&[Expected::Text("expression")]));
            };
            match kind {
                TokenKind::ExpansionPrefix => self.parse_expansion(),
                TokenKind::VarRef if !escaped => {
                    self.builder.start_node(EXPANSION.into());
                    self.bump();
                    self.builder.finish_node();
                    Ok(())
                }
                TokenKind::StringLiteral => self.parse_string_literal(),
                TokenKind::ExpansionSuffix => Err(self.unexpected(&[Expected::Text("text")])),
                _ => {
                    self.bump();
                    Ok(())
                }
            }
        }

        /// `$(name args...)`: the name runs to the first blank, arguments are
        /// split on commas outside literal parentheses.
        fn parse_expansion(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(EXPANSION.into());
            self.bump();
            self.builder.start_node(EXPR.into());
            let mut depth = 0usize;
            loop {
                match self.current() {
                    None => return Err(self.unclosed()),
                    Some(t) if t.kind == TokenKind::LineBreak && !self.multiline => {
                        return Err(self.unclosed())
                    }
                    Some(t) if t.kind == TokenKind::ExpansionSuffix => break,
                    Some(t) if t.kind == TokenKind::Whitespace && depth == 0 => break,
                    Some(t) => {
                        depth = Self::literal_depth(t, depth);
                        self.parse_fragment()?;
                    }
                }
            }
            self.builder.finish_node();
            self.skip_ws();
            if !self.at(TokenKind::ExpansionSuffix) {
                loop {
                    self.parse_argument()?;
                    if !self.at(TokenKind::Comma) {
                        break;
                    }
                    self.bump();
                }
            }
            self.bump();
            self.builder.finish_node();
            Ok(())
        }

        fn parse_argument(&mut self) -> Result<(), ParseError> {
            self.builder.start_node(EXPR.into());
            let mut depth = 0usize;
            loop {
                match self.current() {
                    None => return Err(self.unclosed()),
                    Some(t) if t.kind == TokenKind::LineBreak && !self.multiline => {
                        return Err(self.unclosed())
                    }
                    Some(t) if t.kind == TokenKind::ExpansionSuffix => break,
                    Some(t) if t.kind == TokenKind::Comma && depth == 0 => break,
                    Some(t) => {
                        depth = Self::literal_depth(t, depth);
                        self.parse_fragment()?;
                    }
                }
            }
            self.builder.finish_node();
            Ok(())
        }

        /// Mirror the lexer's literal-paren frames.
        fn literal_depth(token: &Token, depth: usize) -> usize {
            if is_text(token, "(") {
                depth + 1
            } else if is_text(token, ")") || is_text(token, "}") {
                depth.saturating_sub(1)
            } else {
                depth
            }
        }

        fn unclosed(&self) -> ParseError {
            self.unexpected(&[Expected::Token(TokenKind::ExpansionSuffix)])
        }

        /// Quoted text may hold expansions; re-lex its inside so they show up
        /// in the tree.
        fn parse_string_literal(&mut self) -> Result<(), ParseError> {
            let Some(token) = self.tokens.pop() else {
                return Err(self.unexpected(&[Expected::Token(TokenKind::StringLiteral)]));
            };
            let Some(inner) = self.relex(&token) else {
                self.token_at(STRING, token.position.offset, &token.text);
                return Ok(());
            };
            let close = token.text.len() - 1;
            self.token_at(QUOTE, token.position.offset, &token.text[..1]);
            self.parse_inner(inner)?;
            self.token_at(QUOTE, token.position.offset + close, &token.text[close..]);
            Ok(())
        }

        /// Tokens inside a quoted literal. Illegal characters were already
        /// reported, so they are skipped here and come back as trivia.
        fn relex(&self, token: &Token) -> Option<Vec<Token>> {
            let mut tokens = Vec::new();
            for item in quoted(token, self.options.lex) {
                match item {
                    Ok(token) => tokens.push(token),
                    Err(err) if !err.is_fatal() => {}
                    Err(_) => return None,
                }
            }
            tokens.reverse();
            Some(tokens)
        }

        fn parse_inner(&mut self, inner: Vec<Token>) -> Result<(), ParseError> {
            let outer = std::mem::replace(&mut self.tokens, inner);
            let result = self.parse_fragments();
            self.tokens = outer;
            result
        }

        fn expect_eol(&mut self) -> Result<(), ParseError> {
            self.skip_ws();
            if self.at(TokenKind::Comment) {
                self.bump();
            }
            match self.current().map(|t| t.kind) {
                None => Ok(()),
                Some(TokenKind::LineBreak) => {
                    self.bump();
                    Ok(())
                }
                Some(_) => Err(self.unexpected(&[Expected::Token(TokenKind::LineBreak)])),
            }
        }

        /// First of `wanted` on this line outside any expansion.
        fn find_top_level(
            &self,
            mut n: usize,
            wanted: &[TokenKind],
            stop_at_semicolon: bool,
        ) -> Option<TokenKind> {
            let mut depth = 0usize;
            while let Some(token) = self.nth(n) {
                match token.kind {
                    TokenKind::LineBreak => break,
                    TokenKind::ExpansionPrefix => depth += 1,
                    TokenKind::ExpansionSuffix => depth = depth.saturating_sub(1),
                    _ if depth > 0 => {}
                    TokenKind::Comment => break,
                    _ if stop_at_semicolon && is_text(token, ";") => break,
                    kind if wanted.contains(&kind) => return Some(kind),
                    _ => {}
                }
                n += 1;
            }
            None
        }

        fn line_kind(&self, n: usize) -> Line {
            match self.nth(n).map(|t| t.kind) {
                None => return Line::Eof,
                Some(TokenKind::LeadingTab) => return Line::Recipe,
                _ => {}
            }
            match self.nth(self.skip_blank_from(n)).map(|t| t.kind) {
                None | Some(TokenKind::LineBreak) => Line::Blank,
                Some(TokenKind::Comment) => Line::Comment,
                Some(kind) if kind.is_keyword() => Line::Keyword(kind),
                Some(_) => Line::Other,
            }
        }

        /// Index of the first token of the line after the one holding `n`.
        fn next_line(&self, mut n: usize) -> usize {
            while let Some(token) = self.nth(n) {
                n += 1;
                if token.kind == TokenKind::LineBreak {
                    break;
                }
            }
            n
        }

        /// Index of the line break (or end of input) ending the line at `n`.
        fn line_end_from(&self, mut n: usize) -> usize {
            while self
                .nth(n)
                .is_some_and(|t| t.kind != TokenKind::LineBreak)
            {
                n += 1;
            }
            n
        }

        fn skip_ws_from(&self, mut n: usize) -> usize {
            while self.nth(n).is_some_and(|t| t.kind == TokenKind::Whitespace) {
                n += 1;
            }
            n
        }

        fn skip_blank_from(&self, mut n: usize) -> usize {
            while self.nth(n).is_some_and(|t| {
                matches!(t.kind, TokenKind::Whitespace | TokenKind::LeadingTab)
            }) {
                n += 1;
            }
            n
        }

        fn unexpected(&self, expected: &[Expected]) -> ParseError {
            self.unexpected_at(0, expected)
        }

        fn unexpected_at(&self, n: usize, expected: &[Expected]) -> ParseError {
            match self.nth(n) {
                Some(token) => ParseError::UnexpectedToken {
                    position: token.position,
                    found: token.kind,
                    text: token.text.clone(),
                    expected: expected.to_vec(),
                },
                None => ParseError::UnexpectedEof {
                    expected: expected.to_vec(),
                },
            }
        }

        /// Advance one token, adding it to the current branch of the tree builder.
        fn bump(&mut self) {
            if let Some(token) = self.tokens.pop() {
                self.token_at(token.kind.into(), token.position.offset, &token.text);
            }
        }

        fn token_at(&mut self, kind: SyntaxKind, offset: usize, text: &str) {
            self.trivia_until(offset);
            self.builder.token(kind.into(), text);
            self.cursor = offset + text.len();
        }

        /// Put back what the lexer dropped before `offset`: line continuations
        /// and skipped characters.
        fn trivia_until(&mut self, offset: usize) {
            while self.cursor < offset {
                let gap = &self.text[self.cursor..offset];
                let (kind, len) = match continuation_len(gap) {
                    Some(len) => (CONTINUATION, len),
                    None => (ERROR, gap.chars().next().map_or(gap.len(), char::len_utf8)),
                };
                self.builder.token(kind.into(), &gap[..len]);
                self.cursor += len;
            }
        }

        /// Peek at the first unprocessed token
        fn current(&self) -> Option<&Token> {
            self.tokens.last()
        }

        fn nth(&self, n: usize) -> Option<&Token> {
            self.tokens
                .len()
                .checked_sub(n + 1)
                .map(|i| &self.tokens[i])
        }

        fn at(&self, kind: TokenKind) -> bool {
            self.current().is_some_and(|t| t.kind == kind)
        }

        fn at_line_end(&self) -> bool {
            matches!(
                self.current().map(|t| t.kind),
                None | Some(TokenKind::LineBreak) | Some(TokenKind::Comment)
            )
        }

        fn skip_ws(&mut self) {
            while self.at(TokenKind::Whitespace) {
                self.bump()
            }
        }

        fn skip_blank(&mut self) {
            while self.at(TokenKind::Whitespace) || self.at(TokenKind::LeadingTab) {
                self.bump()
            }
        }
    }

    let mut tokens = Vec::new();
    for item in Lexer::with_options(text, options.lex) {
        match item {
            Ok(token) => {
                if token.kind == TokenKind::StringLiteral {
                    if let Some(err) = hidden_illegal_character(&token, options.lex) {
                        if options.strict {
                            return Err(err.into());
                        }
                        log::warn!("skipping {}", err);
                    }
                }
                tokens.push(token);
            }
            Err(err) if !err.is_fatal() && !options.strict => log::warn!("skipping {}", err),
            Err(err) => return Err(err.into()),
        }
    }
    tokens.reverse();
    let green_node = Parser {
        text,
        tokens,
        builder: GreenNodeBuilder::new(),
        cursor: 0,
        multiline: false,
        options,
    }
    .parse()
    .inspect_err(|err| log::debug!("parse failed: {}", err))?;
    Ok(Parse { green_node })
}

/// To work with the parse results we need a view into the
/// green tree - the Syntax tree.
/// It is also immutable, like a GreenNode,
/// but it contains parent pointers, offsets, and
/// has identity semantics.
pub type SyntaxNode = rowan::SyntaxNode<Lang>;
pub(crate) type SyntaxToken = rowan::SyntaxToken<Lang>;

impl Parse {
    fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green_node.clone())
    }

    pub(crate) fn root(&self) -> Makefile {
        Makefile(self.syntax())
    }
}

macro_rules! ast_node {
    ($ast:ident, $kind:ident, $doc:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        #[doc = $doc]
        pub struct $ast(SyntaxNode);

        impl AstNode for $ast {
            type Language = Lang;

            fn can_cast(kind: SyntaxKind) -> bool {
                kind == $kind
            }

            fn cast(syntax: SyntaxNode) -> Option<Self> {
                if Self::can_cast(syntax.kind()) {
                    Some(Self(syntax))
                } else {
                    None
                }
            }

            fn syntax(&self) -> &SyntaxNode {
                &self.0
            }
        }

        impl core::fmt::Display for $ast {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
                write!(f, "{}", self.0.text())
            }
        }
    };
}

ast_node!(Makefile, ROOT, "A whole parsed makefile");
ast_node!(Comment, COMMENT_LINE, "A line holding only a comment");
ast_node!(Assignment, ASSIGNMENT, "A variable assignment");
ast_node!(Rule, RULE, "A rule with its recipe");
ast_node!(Conditional, CONDITIONAL, "A conditional whose branches hold statements");
ast_node!(
    RecipeConditional,
    RECIPE_CONDITIONAL,
    "A conditional inside a recipe; its branches hold recipe lines"
);
ast_node!(Condition, CONDITION, "The test of a conditional");
ast_node!(Branch, BRANCH, "The statements of one conditional branch");
ast_node!(RecipeBranch, RECIPE_BRANCH, "The recipe lines of one conditional branch");
ast_node!(Define, DEFINE, "A multi-line `define` ... `endef` macro");
ast_node!(Include, INCLUDE, "An include directive");
ast_node!(Export, EXPORT, "An export or unexport directive without an assignment");
ast_node!(FunctionCall, FUNCTION, "A line holding only an expression");
ast_node!(Expression, EXPR, "Text with embedded expansions");
ast_node!(Expansion, EXPANSION, "A variable reference or function call");

impl FromStr for Makefile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse(s, &ParseOptions::default())?.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fragment, Statement};

    fn tree(text: &str) -> String {
        format!(
            "{:#?}",
            parse(text, &ParseOptions::default()).unwrap().syntax()
        )
    }

    fn parse_error(text: &str) -> ParseError {
        match parse(text, &ParseOptions::default()) {
            Err(Error::Parse(err)) => err,
            other => panic!("expected a parse error, got {:?}", other.map(|p| p.root())),
        }
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            tree("CC = gcc\n"),
            r#"ROOT@0..9
  ASSIGNMENT@0..9
    EXPR@0..2
      TEXT@0..2 "CC"
    WHITESPACE@2..3 " "
    OPERATOR@3..4 "="
    WHITESPACE@4..5 " "
    EXPR@5..8
      TEXT@5..8 "gcc"
    NEWLINE@8..9 "\n"
"#
        );
    }

    #[test]
    fn test_parse_rule() {
        assert_eq!(
            tree("all: main.c\n\tgcc -o out main.c\n"),
            r#"ROOT@0..31
  RULE@0..31
    TARGETS@0..3
      EXPR@0..3
        TEXT@0..3 "all"
    COLON@3..4 ":"
    WHITESPACE@4..5 " "
    PREREQUISITES@5..11
      EXPR@5..11
        TEXT@5..11 "main.c"
    NEWLINE@11..12 "\n"
    RECIPE@12..31
      INDENT@12..13 "\t"
      EXPR@13..30
        TEXT@13..16 "gcc"
        WHITESPACE@16..17 " "
        TEXT@17..19 "-o"
        WHITESPACE@19..20 " "
        TEXT@20..23 "out"
        WHITESPACE@23..24 " "
        TEXT@24..30 "main.c"
      NEWLINE@30..31 "\n"
"#
        );
    }

    #[test]
    fn test_parse_conditional() {
        assert_eq!(
            tree("ifeq ($(OS),Windows)\nFOO=1\nendif\n"),
            r#"ROOT@0..33
  CONDITIONAL@0..33
    IFEQ_KW@0..4 "ifeq"
    WHITESPACE@4..5 " "
    CONDITION@5..20
      TEXT@5..6 "("
      EXPR@6..11
        EXPANSION@6..11
          EXPANSION_OPEN@6..8 "$("
          EXPR@8..10
            TEXT@8..10 "OS"
          EXPANSION_CLOSE@10..11 ")"
      COMMA@11..12 ","
      EXPR@12..19
        TEXT@12..19 "Windows"
      TEXT@19..20 ")"
    NEWLINE@20..21 "\n"
    BRANCH@21..27
      ASSIGNMENT@21..27
        EXPR@21..24
          TEXT@21..24 "FOO"
        OPERATOR@24..25 "="
        EXPR@25..26
          TEXT@25..26 "1"
        NEWLINE@26..27 "\n"
    ENDIF_KW@27..32 "endif"
    NEWLINE@32..33 "\n"
"#
        );
    }

    #[test]
    fn test_parse_define() {
        assert_eq!(
            tree("define GREETING\nHello, $(NAME)!\nendef\n"),
            r#"ROOT@0..38
  DEFINE@0..38
    DEFINE_KW@0..6 "define"
    WHITESPACE@6..7 " "
    EXPR@7..15
      TEXT@7..15 "GREETING"
    NEWLINE@15..16 "\n"
    EXPR@16..31
      TEXT@16..21 "Hello"
      COMMA@21..22 ","
      WHITESPACE@22..23 " "
      EXPANSION@23..30
        EXPANSION_OPEN@23..25 "$("
        EXPR@25..29
          TEXT@25..29 "NAME"
        EXPANSION_CLOSE@29..30 ")"
      TEXT@30..31 "!"
    NEWLINE@31..32 "\n"
    ENDEF_KW@32..37 "endef"
    NEWLINE@37..38 "\n"
"#
        );
    }

    #[test]
    fn test_continuation_and_illegal_characters_are_kept() {
        let text = "A = b \\\n  c\u{1}\n";
        let parsed = parse(text, &ParseOptions::default()).unwrap();
        let node = parsed.syntax();
        assert_eq!(node.text().to_string(), text);
        let kinds = node
            .descendants_with_tokens()
            .map(|element| element.kind())
            .collect::<Vec<_>>();
        assert!(kinds.contains(&CONTINUATION));
        assert!(kinds.contains(&ERROR));
    }

    #[test]
    fn test_strict_rejects_illegal_characters() {
        let options = ParseOptions {
            strict: true,
            ..Default::default()
        };
        assert!(matches!(
            parse("A = \u{7}\n", &options),
            Err(Error::Lex(LexError::IllegalCharacter { character: '\u{7}', .. }))
        ));
    }

    #[test]
    fn test_illegal_character_inside_quotes() {
        let text = "A = \"$(B)\u{1}\"\n";
        let options = ParseOptions {
            strict: true,
            ..Default::default()
        };
        match parse(text, &options) {
            Err(Error::Lex(LexError::IllegalCharacter {
                character,
                position,
            })) => {
                assert_eq!(character, '\u{1}');
                assert_eq!(position.offset, 9);
                assert_eq!(position.column, 10);
            }
            other => panic!("expected an illegal character, got {:?}", other),
        }

        // Skipped by default, with the expansion inside the quote still parsed
        let parsed = parse(text, &ParseOptions::default()).unwrap();
        let root = parsed.syntax();
        assert_eq!(root.text().to_string(), text);
        assert!(root.descendants().any(|node| node.kind() == EXPANSION));
        assert!(root
            .descendants_with_tokens()
            .filter_map(|it| it.into_token())
            .any(|token| token.kind() == ERROR && token.text() == "\u{1}"));
    }

    #[test]
    fn test_unterminated_expansion_is_a_lex_error() {
        assert!(matches!(
            parse("A = $(foo\n", &ParseOptions::default()),
            Err(Error::Lex(LexError::UnterminatedNesting { .. }))
        ));
    }

    #[test]
    fn test_expansion_closed_on_next_line() {
        let err = parse_error("A = $(foo\n)\n");
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                position: Position {
                    line: 1,
                    column: 10,
                    offset: 9
                },
                found: TokenKind::LineBreak,
                text: "\n".to_string(),
                expected: vec![Expected::Token(TokenKind::ExpansionSuffix)],
            }
        );
    }

    #[test]
    fn test_missing_separator() {
        let err = parse_error("CC = gcc\nfoo bar\n");
        assert_eq!(err.position().map(|p| p.line), Some(2));
        assert_eq!(
            err.expected(),
            &[
                Expected::Token(TokenKind::Colon),
                Expected::Token(TokenKind::AssignOp)
            ]
        );
    }

    #[test]
    fn test_missing_endif() {
        assert_eq!(
            parse_error("ifdef X\nA = 1\n"),
            ParseError::UnexpectedEof {
                expected: vec![
                    Expected::Token(TokenKind::KwElse),
                    Expected::Token(TokenKind::KwEndif)
                ]
            }
        );
    }

    #[test]
    fn test_stray_endif() {
        let err = parse_error("A = 1\nendif\n");
        assert!(matches!(
            err,
            ParseError::UnexpectedToken {
                found: TokenKind::KwEndif,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_endef() {
        assert_eq!(
            parse_error("define X\nbody\n"),
            ParseError::UnexpectedEof {
                expected: vec![Expected::Token(TokenKind::KwEndef)]
            }
        );
    }

    #[test]
    fn test_bad_specifier_combination() {
        let err = parse_error("export unexport A = 1\n");
        assert!(matches!(
            err,
            ParseError::UnexpectedToken {
                found: TokenKind::KwUnexport,
                ..
            }
        ));
    }

    #[test]
    fn test_bad_ifeq_condition() {
        let err = parse_error("ifeq a b\nendif\n");
        assert_eq!(
            err.expected(),
            &[
                Expected::Text("'('"),
                Expected::Token(TokenKind::StringLiteral)
            ]
        );
        let err = parse_error("ifeq (a b)\nendif\n");
        assert_eq!(err.expected(), &[Expected::Token(TokenKind::Comma)]);
    }

    #[test]
    fn test_error_display() {
        let err = parse_error("ifeq (a,b\nendif\n");
        assert_eq!(
            err.to_string(),
            "1:10: unexpected line break \"\\n\", expected ')'"
        );
        assert_eq!(
            parse_error("ifdef X\n").to_string(),
            "unexpected end of input, expected one of 'else', 'endif'"
        );
    }

    #[test]
    fn test_shell_literal_parens() {
        let makefile: Makefile = "X = $(shell echo (a,b))\n".parse().unwrap();
        let assignment = makefile.assignments().next().unwrap();
        let fragments = assignment.value().unwrap().fragments();
        assert_eq!(fragments.len(), 1);
        let Fragment::Expansion(expansion) = &fragments[0] else {
            panic!("expected an expansion");
        };
        assert_eq!(expansion.name(), "shell");
        let arguments = expansion.arguments();
        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments[0].to_string(), "echo (a,b)");
    }

    #[test]
    fn test_statement_order_is_preserved() {
        let makefile: Makefile = "# top\nA = 1\n\ninclude a.mk\nall:\nexport\n$(info x)\n"
            .parse()
            .unwrap();
        let kinds = makefile
            .statements()
            .map(|s| match s {
                Statement::Comment(_) => "comment",
                Statement::Assignment(_) => "assignment",
                Statement::Rule(_) => "rule",
                Statement::Conditional(_) => "conditional",
                Statement::Define(_) => "define",
                Statement::Include(_) => "include",
                Statement::Export(_) => "export",
                Statement::Function(_) => "function",
            })
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec!["comment", "assignment", "include", "rule", "export", "function"]
        );
    }

    #[test]
    fn test_read() {
        let mut buf = "A = 1\n".as_bytes();
        let makefile = Makefile::read(&mut buf).unwrap();
        assert_eq!(makefile.code(), "A = 1\n");
    }

    #[test]
    fn test_empty_input() {
        let makefile: Makefile = "".parse().unwrap();
        assert_eq!(makefile.statements().count(), 0);
        let makefile: Makefile = "  \n\n".parse().unwrap();
        assert_eq!(makefile.statements().count(), 0);
        assert_eq!(makefile.to_string(), "  \n\n");
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parsed_tree_is_lossless(text in r#"[a-z$(){}:=,#\\\t \n'"|;-]{0,48}"#) {
            if let Ok(parsed) = parse(&text, &ParseOptions::default()) {
                prop_assert_eq!(parsed.syntax().text().to_string(), text);
            }
        }

        #[test]
        fn makefile_lines_are_lossless(
            lines in proptest::collection::vec(prop_oneof![
                Just("CC := gcc".to_string()),
                Just("all: main.o | dir".to_string()),
                Just("\t$(CC) -c $< -o $@".to_string()),
                Just("ifdef DEBUG".to_string()),
                Just("else".to_string()),
                Just("endif".to_string()),
                Just("# note".to_string()),
                Just("$(info $(CC))".to_string()),
                Just("".to_string()),
                "[a-z]{1,5} [+?]?= [a-z ]{0,6}",
            ], 0..12)
        ) {
            let text = lines.join("\n");
            if let Ok(parsed) = parse(&text, &ParseOptions::default()) {
                prop_assert_eq!(parsed.syntax().text().to_string(), text);
            }
        }
    }
}
