use crate::lossless::{Assignment, Export, Expression, SyntaxNode, SyntaxToken};
use crate::SyntaxKind::{self, *};
use rowan::ast::AstNode;
use std::fmt;

/// The operator of an assignment, which decides when the value is expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    /// `=`: expanded on every use
    Deferred,
    /// `?=`: only set when undefined
    Conditional,
    /// `:=`: expanded once, at assignment
    Immediate,
    /// `::=`: the POSIX spelling of `:=`
    ImmediatePosix,
    /// `+=`: appended to the existing value
    Append,
    /// `!=`: the value is run through the shell
    Shell,
}

impl AssignOp {
    /// Recognize an operator from its text
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "=" => AssignOp::Deferred,
            "?=" => AssignOp::Conditional,
            ":=" => AssignOp::Immediate,
            "::=" => AssignOp::ImmediatePosix,
            "+=" => AssignOp::Append,
            "!=" => AssignOp::Shell,
            _ => return None,
        })
    }

    /// The operator as written
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Deferred => "=",
            AssignOp::Conditional => "?=",
            AssignOp::Immediate => ":=",
            AssignOp::ImmediatePosix => "::=",
            AssignOp::Append => "+=",
            AssignOp::Shell => "!=",
        }
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A keyword that modifies an assignment or define
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Specifier {
    /// `override`
    Override,
    /// `export`
    Export,
    /// `unexport`
    Unexport,
    /// `undefine`
    Undefine,
}

impl Specifier {
    fn from_kind(kind: SyntaxKind) -> Option<Self> {
        match kind {
            OVERRIDE_KW => Some(Specifier::Override),
            EXPORT_KW => Some(Specifier::Export),
            UNEXPORT_KW => Some(Specifier::Unexport),
            UNDEFINE_KW => Some(Specifier::Undefine),
            _ => None,
        }
    }
}

/// Specifier keywords among the direct children of `node`.
pub(crate) fn specifiers(node: &SyntaxNode) -> Vec<Specifier> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .filter_map(|token| Specifier::from_kind(token.kind()))
        .collect()
}

pub(crate) fn operator_token(node: &SyntaxNode) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|token| token.kind() == OPERATOR)
}

impl Assignment {
    /// The variable name
    pub fn name(&self) -> Option<Expression> {
        self.syntax().children().find_map(Expression::cast)
    }

    /// The assignment operator; `None` for `undefine`
    pub fn operator(&self) -> Option<AssignOp> {
        operator_token(self.syntax()).and_then(|token| AssignOp::from_text(token.text()))
    }

    /// The assigned value, without leading whitespace or a trailing comment
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "CFLAGS += -O2 -g # optimize\n".parse().unwrap();
    /// let assignment = makefile.assignments().next().unwrap();
    /// assert_eq!(assignment.value().unwrap().to_string(), "-O2 -g");
    /// ```
    pub fn value(&self) -> Option<Expression> {
        operator_token(self.syntax())?;
        self.syntax().children().filter_map(Expression::cast).nth(1)
    }

    /// The specifier keywords in front of the name
    pub fn specifiers(&self) -> Vec<Specifier> {
        specifiers(self.syntax())
    }

    /// Whether this assignment carries `override`
    pub fn is_override(&self) -> bool {
        self.specifiers().contains(&Specifier::Override)
    }

    /// Whether this assignment carries `export`
    pub fn is_export(&self) -> bool {
        self.specifiers().contains(&Specifier::Export)
    }

    /// Whether this is an `undefine` directive
    pub fn is_undefine(&self) -> bool {
        self.specifiers().contains(&Specifier::Undefine)
    }

    /// The trailing comment, if any
    pub fn comment(&self) -> Option<String> {
        self.syntax()
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|token| token.kind() == COMMENT)
            .map(|token| token.text().to_string())
    }
}

impl Export {
    /// Whether this is `unexport`
    pub fn is_unexport(&self) -> bool {
        self.specifiers().contains(&Specifier::Unexport)
    }

    /// The variables named, one expression per word
    pub fn names(&self) -> impl Iterator<Item = Expression> {
        self.syntax().children().filter_map(Expression::cast)
    }

    /// Whether no variables are named, which applies to all of them
    pub fn is_bare(&self) -> bool {
        self.names().next().is_none()
    }

    fn specifiers(&self) -> Vec<Specifier> {
        specifiers(self.syntax())
    }
}
