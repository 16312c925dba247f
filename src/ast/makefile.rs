use crate::lossless::{
    Assignment, Comment, Conditional, Define, Error, Export, Expression, FunctionCall, Include,
    Makefile, Rule, SyntaxNode,
};
use crate::SyntaxKind::*;
use rowan::ast::AstNode;

/// A top-level construct of a makefile, or of a conditional branch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    /// A line holding only a comment
    Comment(Comment),
    /// A variable assignment (e.g., "VAR = value"), including `undefine`
    Assignment(Assignment),
    /// A rule definition (e.g., "target: prerequisites")
    Rule(Rule),
    /// A conditional block (e.g., "ifdef DEBUG ... endif")
    Conditional(Conditional),
    /// A `define` ... `endef` block
    Define(Define),
    /// An include directive (e.g., "include foo.mk")
    Include(Include),
    /// `export` or `unexport` without an assignment
    Export(Export),
    /// A line holding only an expression (e.g., "$(eval $(call T,a))")
    Function(FunctionCall),
}

impl Statement {
    /// Try to cast a syntax node to a Statement
    pub(crate) fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            COMMENT_LINE => Comment::cast(node).map(Statement::Comment),
            ASSIGNMENT => Assignment::cast(node).map(Statement::Assignment),
            RULE => Rule::cast(node).map(Statement::Rule),
            CONDITIONAL => Conditional::cast(node).map(Statement::Conditional),
            DEFINE => Define::cast(node).map(Statement::Define),
            INCLUDE => Include::cast(node).map(Statement::Include),
            EXPORT => Export::cast(node).map(Statement::Export),
            FUNCTION => FunctionCall::cast(node).map(Statement::Function),
            _ => None,
        }
    }

    /// Get the underlying syntax node
    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Statement::Comment(c) => c.syntax(),
            Statement::Assignment(a) => a.syntax(),
            Statement::Rule(r) => r.syntax(),
            Statement::Conditional(c) => c.syntax(),
            Statement::Define(d) => d.syntax(),
            Statement::Include(i) => i.syntax(),
            Statement::Export(e) => e.syntax(),
            Statement::Function(f) => f.syntax(),
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.syntax().text())
    }
}

/// Statements among the children of `node`; blank lines are skipped.
pub(crate) fn statements(node: &SyntaxNode) -> impl Iterator<Item = Statement> {
    node.children().filter_map(Statement::cast)
}

impl Comment {
    /// The comment text without the leading `#`
    pub fn text(&self) -> Option<String> {
        self.syntax()
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|token| token.kind() == COMMENT)
            .map(|token| {
                let text = token.text();
                text.strip_prefix('#').unwrap_or(text).to_string()
            })
    }
}

impl FunctionCall {
    /// The expression making up the line, without any trailing comment
    pub fn expression(&self) -> Option<Expression> {
        self.syntax().children().find_map(Expression::cast)
    }
}

impl Makefile {
    /// Get the text content of the makefile
    pub fn code(&self) -> String {
        self.syntax().text().to_string()
    }

    /// Read a makefile from a reader
    pub fn read<R: std::io::Read>(mut r: R) -> Result<Makefile, Error> {
        let mut buf = String::new();
        r.read_to_string(&mut buf)?;
        buf.parse()
    }

    /// The top-level statements, in source order
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::{Makefile, Statement};
    /// let makefile: Makefile = r#"VAR = value
    /// ifdef DEBUG
    /// CFLAGS = -g
    /// endif
    ///
    /// rule:
    /// 	command
    /// "#.parse().unwrap();
    /// let statements: Vec<_> = makefile.statements().collect();
    /// assert_eq!(statements.len(), 3);
    /// assert!(matches!(statements[1], Statement::Conditional(_)));
    /// ```
    pub fn statements(&self) -> impl Iterator<Item = Statement> {
        statements(self.syntax())
    }

    /// Retrieve the top-level rules in the makefile
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "rule: dependency\n\tcommand\n".parse().unwrap();
    /// assert_eq!(makefile.rules().count(), 1);
    /// ```
    pub fn rules(&self) -> impl Iterator<Item = Rule> {
        self.syntax().children().filter_map(Rule::cast)
    }

    /// Get all top-level variable assignments
    pub fn assignments(&self) -> impl Iterator<Item = Assignment> {
        self.syntax().children().filter_map(Assignment::cast)
    }

    /// Get all top-level conditionals
    pub fn conditionals(&self) -> impl Iterator<Item = Conditional> {
        self.syntax().children().filter_map(Conditional::cast)
    }

    /// Get all top-level `define` blocks
    pub fn defines(&self) -> impl Iterator<Item = Define> {
        self.syntax().children().filter_map(Define::cast)
    }

    /// Get all top-level include directives
    pub fn includes(&self) -> impl Iterator<Item = Include> {
        self.syntax().children().filter_map(Include::cast)
    }

    /// Get all top-level `export`/`unexport` directives
    pub fn exports(&self) -> impl Iterator<Item = Export> {
        self.syntax().children().filter_map(Export::cast)
    }

    /// Get all top-level lines holding only an expression
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "$(info building)\n".parse().unwrap();
    /// let call = makefile.function_calls().next().unwrap();
    /// let expansion = call.expression().unwrap().expansions().next().unwrap();
    /// assert_eq!(expansion.name(), "info");
    /// ```
    pub fn function_calls(&self) -> impl Iterator<Item = FunctionCall> {
        self.syntax().children().filter_map(FunctionCall::cast)
    }

    /// Get all comment lines
    pub fn comments(&self) -> impl Iterator<Item = Comment> {
        self.syntax().children().filter_map(Comment::cast)
    }

    /// Find assignments to a variable, at any depth
    ///
    /// Only literal names match; conditionals are searched in both branches.
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "CC = cc\nifdef GNU\nCC = gcc\nendif\n".parse().unwrap();
    /// assert_eq!(makefile.find_assignments("CC").count(), 2);
    /// ```
    pub fn find_assignments<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Assignment> + 'a {
        self.syntax()
            .descendants()
            .filter_map(Assignment::cast)
            .filter(move |assignment| {
                assignment
                    .name()
                    .is_some_and(|expr| expr.is_literal() && expr.to_string() == name)
            })
    }
}
