#![allow(clippy::tabs_in_doc_comments)] // Makefile uses tabs
#![deny(missing_docs)]

//! A tokenizer and parser for GNU Make syntax
//!
//! The parser produces a lossless syntax tree with typed views over
//! statements and expressions. Nothing is evaluated: expansions are recorded,
//! never substituted.
//!
//! Example:
//!
//! ```rust
//! use makefile_grammar::{Fragment, Statement};
//!
//! let contents = r#"CC = gcc
//!
//! all: main.c
//! 	$(CC) -o out main.c
//! "#;
//! let makefile = makefile_grammar::parse(contents).unwrap();
//!
//! assert_eq!(makefile.statements().count(), 2);
//! let rule = makefile.rules().next().unwrap();
//! let command = rule.recipes().next().unwrap().command().unwrap();
//! assert!(matches!(&command.fragments()[0], Fragment::Expansion(e) if e.name() == "CC"));
//! assert_eq!(makefile.to_string(), contents);
//! ```

mod ast {
    pub(crate) mod conditional;
    pub(crate) mod define;
    pub(crate) mod expr;
    pub(crate) mod include;
    pub(crate) mod makefile;
    pub(crate) mod rule;
    pub(crate) mod variable;
}
mod lex;
mod lossless;

pub use ast::conditional::{ConditionalKind, ElseBranch, RecipeElseBranch};
pub use ast::expr::Fragment;
pub use ast::makefile::Statement;
pub use ast::rule::RecipeLine;
pub use ast::variable::{AssignOp, Specifier};
pub use lex::{
    tokenize, tokenize_with, FrameKind, LexError, LexOptions, Lexer, Position, Token, TokenKind,
};
pub use lossless::{
    Assignment, Branch, Comment, Condition, Conditional, Define, Error, Expansion, Expected,
    Export, Expression, FunctionCall, Include, Lang, Makefile, ParseError, ParseOptions,
    RecipeBranch, RecipeConditional, Rule, SyntaxNode,
};
pub use rowan::ast::AstNode;

/// Parse makefile text with the default options.
///
/// Stops at the first error; there is no partial result.
pub fn parse(text: &str) -> Result<Makefile, Error> {
    parse_with(text, &ParseOptions::default())
}

/// Parse makefile text with the given options
pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Makefile, Error> {
    Ok(lossless::parse(text, options)?.root())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(non_camel_case_types)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum SyntaxKind {
    NEWLINE = 0,
    INDENT,
    COMMENT,
    STRING,
    TEXT,
    EXPANSION_OPEN,
    EXPANSION_CLOSE,
    VAR_REF,
    OPERATOR,
    COLON,
    COMMA,
    WHITESPACE,

    OVERRIDE_KW,
    EXPORT_KW,
    UNEXPORT_KW,
    IFDEF_KW,
    IFNDEF_KW,
    IFEQ_KW,
    IFNEQ_KW,
    ELSE_KW,
    ENDIF_KW,
    DEFINE_KW,
    ENDEF_KW,
    UNDEFINE_KW,
    INCLUDE_KW,

    QUOTE,
    CONTINUATION, // `\` + line break, dropped by the lexer
    ERROR,        // a skipped illegal character

    // composite nodes
    ROOT, // The entire file
    BLANK_LINE,
    COMMENT_LINE,
    ASSIGNMENT,
    RULE,
    TARGETS,
    PREREQUISITES,
    ORDER_ONLY,
    RECIPE,
    CONDITIONAL,
    RECIPE_CONDITIONAL,
    CONDITION,
    BRANCH,
    RECIPE_BRANCH,
    ELSE_BRANCH,
    DEFINE,
    INCLUDE,
    EXPORT,
    FUNCTION, // a line holding only an expression, such as `$(eval ...)`
    EXPR,
    EXPANSION,
}

/// Convert our `SyntaxKind` into the rowan `SyntaxKind`.
impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

impl From<TokenKind> for SyntaxKind {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::LineBreak => SyntaxKind::NEWLINE,
            TokenKind::LeadingTab => SyntaxKind::INDENT,
            TokenKind::Comment => SyntaxKind::COMMENT,
            TokenKind::StringLiteral => SyntaxKind::STRING,
            TokenKind::PlainText => SyntaxKind::TEXT,
            TokenKind::ExpansionPrefix => SyntaxKind::EXPANSION_OPEN,
            TokenKind::ExpansionSuffix => SyntaxKind::EXPANSION_CLOSE,
            TokenKind::VarRef => SyntaxKind::VAR_REF,
            TokenKind::AssignOp => SyntaxKind::OPERATOR,
            TokenKind::Colon => SyntaxKind::COLON,
            TokenKind::Comma => SyntaxKind::COMMA,
            TokenKind::Whitespace => SyntaxKind::WHITESPACE,
            TokenKind::KwOverride => SyntaxKind::OVERRIDE_KW,
            TokenKind::KwExport => SyntaxKind::EXPORT_KW,
            TokenKind::KwUnexport => SyntaxKind::UNEXPORT_KW,
            TokenKind::KwIfdef => SyntaxKind::IFDEF_KW,
            TokenKind::KwIfndef => SyntaxKind::IFNDEF_KW,
            TokenKind::KwIfeq => SyntaxKind::IFEQ_KW,
            TokenKind::KwIfneq => SyntaxKind::IFNEQ_KW,
            TokenKind::KwElse => SyntaxKind::ELSE_KW,
            TokenKind::KwEndif => SyntaxKind::ENDIF_KW,
            TokenKind::KwDefine => SyntaxKind::DEFINE_KW,
            TokenKind::KwEndef => SyntaxKind::ENDEF_KW,
            TokenKind::KwUndefine => SyntaxKind::UNDEFINE_KW,
            TokenKind::KwInclude => SyntaxKind::INCLUDE_KW,
        }
    }
}
