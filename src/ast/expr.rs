use crate::lossless::{Expansion, Expression, SyntaxToken};
use crate::SyntaxKind::*;
use rowan::ast::AstNode;
use rowan::NodeOrToken;

/// A piece of an expression: literal text or an expansion
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fragment {
    /// Literal text, with adjacent tokens merged
    Text(String),
    /// A `$(...)`, `${...}` or `$x` expansion
    Expansion(Expansion),
}

impl Fragment {
    /// The literal text, if this is a text fragment
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Fragment::Text(text) => Some(text),
            Fragment::Expansion(_) => None,
        }
    }

    /// The expansion, if this is an expansion fragment
    pub fn as_expansion(&self) -> Option<&Expansion> {
        match self {
            Fragment::Text(_) => None,
            Fragment::Expansion(expansion) => Some(expansion),
        }
    }
}

/// Line continuations and skipped characters are not part of the token stream.
fn is_dropped(token: &SyntaxToken) -> bool {
    matches!(token.kind(), CONTINUATION | ERROR)
}

impl Expression {
    /// The fragments of this expression, in source order
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::{Fragment, Makefile};
    /// let makefile: Makefile = "OBJ = $(SRC:.c=.o) main.o\n".parse().unwrap();
    /// let value = makefile.assignments().next().unwrap().value().unwrap();
    /// let fragments = value.fragments();
    /// assert_eq!(fragments.len(), 2);
    /// assert_eq!(fragments[1], Fragment::Text(" main.o".to_string()));
    /// ```
    pub fn fragments(&self) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        for child in self.syntax().children_with_tokens() {
            match child {
                NodeOrToken::Node(node) => {
                    if let Some(expansion) = Expansion::cast(node) {
                        fragments.push(Fragment::Expansion(expansion));
                    }
                }
                NodeOrToken::Token(token) if is_dropped(&token) => {}
                NodeOrToken::Token(token) => match fragments.last_mut() {
                    Some(Fragment::Text(text)) => text.push_str(token.text()),
                    _ => fragments.push(Fragment::Text(token.text().to_string())),
                },
            }
        }
        fragments
    }

    /// The expansions directly inside this expression
    pub fn expansions(&self) -> impl Iterator<Item = Expansion> + '_ {
        self.syntax().children().filter_map(Expansion::cast)
    }

    /// Whether the expression holds no expansions
    pub fn is_literal(&self) -> bool {
        self.expansions().next().is_none()
    }

    /// Whether the expression covers no text at all
    pub fn is_empty(&self) -> bool {
        self.syntax().text().is_empty()
    }
}

impl Expansion {
    /// Whether this is a single-character reference such as `$@`
    pub fn is_short(&self) -> bool {
        self.syntax()
            .first_token()
            .is_some_and(|token| token.kind() == VAR_REF)
    }

    /// The opening delimiter: `$(`, `${`, or the whole of a short reference
    pub fn opener(&self) -> Option<String> {
        self.syntax()
            .first_token()
            .map(|token| token.text().to_string())
    }

    /// The name as written: the variable or function name
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "all:\n\t$(CC) -o $@ ${SRC}\n".parse().unwrap();
    /// let command = makefile.rules().next().unwrap().recipes().next().unwrap().command().unwrap();
    /// let names = command.expansions().map(|e| e.name()).collect::<Vec<_>>();
    /// assert_eq!(names, vec!["CC", "@", "SRC"]);
    /// ```
    pub fn name(&self) -> String {
        if self.is_short() {
            return self
                .syntax()
                .first_token()
                .map(|token| token.text().trim_start_matches('$').to_string())
                .unwrap_or_default();
        }
        self.name_expr()
            .map(|expr| expr.to_string())
            .unwrap_or_default()
    }

    /// The name as an expression, which may itself contain expansions
    pub fn name_expr(&self) -> Option<Expression> {
        self.syntax().children().find_map(Expression::cast)
    }

    /// Comma separated arguments following the name
    pub fn arguments(&self) -> Vec<Expression> {
        self.syntax()
            .children()
            .filter_map(Expression::cast)
            .skip(1)
            .collect()
    }

    /// Whether arguments follow the name, as in `$(subst a,b,$(X))`
    pub fn is_function_call(&self) -> bool {
        !self.arguments().is_empty()
    }
}
