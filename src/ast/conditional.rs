use crate::ast::makefile::{statements, Statement};
use crate::ast::rule::{recipe_lines, RecipeLine};
use crate::lossless::{
    Branch, Condition, Conditional, Expression, RecipeBranch, RecipeConditional, SyntaxNode,
};
use crate::SyntaxKind::*;
use rowan::ast::AstNode;

/// Which directive opens a conditional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalKind {
    /// `ifdef NAME`
    Ifdef,
    /// `ifndef NAME`
    Ifndef,
    /// `ifeq (A,B)` or `ifeq "A" "B"`
    Ifeq,
    /// `ifneq (A,B)` or `ifneq "A" "B"`
    Ifneq,
}

impl ConditionalKind {
    /// The directive keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionalKind::Ifdef => "ifdef",
            ConditionalKind::Ifndef => "ifndef",
            ConditionalKind::Ifeq => "ifeq",
            ConditionalKind::Ifneq => "ifneq",
        }
    }

    /// Whether the condition holds when the test fails
    pub fn is_negated(&self) -> bool {
        matches!(self, ConditionalKind::Ifndef | ConditionalKind::Ifneq)
    }
}

/// What follows `else` in a statement conditional
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElseBranch {
    /// A plain `else` and its statements
    Body(Branch),
    /// `else ifeq ...`, a chained conditional that owns the closing `endif`
    Conditional(Conditional),
}

/// What follows `else` in a recipe conditional
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecipeElseBranch {
    /// A plain `else` and its recipe lines
    Body(RecipeBranch),
    /// `else ifeq ...` inside a recipe
    Conditional(RecipeConditional),
}

fn kind(node: &SyntaxNode) -> Option<ConditionalKind> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find_map(|token| match token.kind() {
            IFDEF_KW => Some(ConditionalKind::Ifdef),
            IFNDEF_KW => Some(ConditionalKind::Ifndef),
            IFEQ_KW => Some(ConditionalKind::Ifeq),
            IFNEQ_KW => Some(ConditionalKind::Ifneq),
            _ => None,
        })
}

fn else_node(node: &SyntaxNode) -> Option<SyntaxNode> {
    node.children().find(|it| it.kind() == ELSE_BRANCH)
}

/// Whether `node` is closed by its own `endif`; chained conditionals share
/// the innermost one.
fn owns_endif(node: &SyntaxNode) -> bool {
    node.children_with_tokens().any(|it| it.kind() == ENDIF_KW)
}

impl Conditional {
    /// The opening directive
    pub fn kind(&self) -> Option<ConditionalKind> {
        kind(self.syntax())
    }

    /// The test
    pub fn condition(&self) -> Option<Condition> {
        self.syntax().children().find_map(Condition::cast)
    }

    /// The statements used when the test holds
    pub fn then_branch(&self) -> Option<Branch> {
        self.syntax().children().find_map(Branch::cast)
    }

    /// The `else` part, if any
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::{ElseBranch, Makefile};
    /// let makefile: Makefile = r#"ifeq ($(OS),Windows_NT)
    /// EXE = .exe
    /// else ifeq ($(OS),Darwin)
    /// EXE = .app
    /// else
    /// EXE =
    /// endif
    /// "#.parse().unwrap();
    /// let conditional = makefile.conditionals().next().unwrap();
    /// let Some(ElseBranch::Conditional(chained)) = conditional.else_branch() else {
    ///     panic!("expected else ifeq");
    /// };
    /// assert!(matches!(chained.else_branch(), Some(ElseBranch::Body(_))));
    /// ```
    pub fn else_branch(&self) -> Option<ElseBranch> {
        let node = else_node(self.syntax())?;
        node.children().find_map(|child| {
            Branch::cast(child.clone())
                .map(ElseBranch::Body)
                .or_else(|| Conditional::cast(child).map(ElseBranch::Conditional))
        })
    }

    /// Whether there is an `else` part
    pub fn has_else(&self) -> bool {
        else_node(self.syntax()).is_some()
    }

    /// Whether this conditional is closed by its own `endif` rather than being
    /// the tail of an `else` chain
    pub fn has_endif(&self) -> bool {
        owns_endif(self.syntax())
    }
}

impl Branch {
    /// The statements in this branch, in source order
    pub fn statements(&self) -> impl Iterator<Item = Statement> {
        statements(self.syntax())
    }
}

impl RecipeConditional {
    /// The opening directive
    pub fn kind(&self) -> Option<ConditionalKind> {
        kind(self.syntax())
    }

    /// The test
    pub fn condition(&self) -> Option<Condition> {
        self.syntax().children().find_map(Condition::cast)
    }

    /// The recipe lines used when the test holds
    pub fn then_branch(&self) -> Option<RecipeBranch> {
        self.syntax().children().find_map(RecipeBranch::cast)
    }

    /// The `else` part, if any
    pub fn else_branch(&self) -> Option<RecipeElseBranch> {
        let node = else_node(self.syntax())?;
        node.children().find_map(|child| {
            RecipeBranch::cast(child.clone())
                .map(RecipeElseBranch::Body)
                .or_else(|| RecipeConditional::cast(child).map(RecipeElseBranch::Conditional))
        })
    }

    /// Whether there is an `else` part
    pub fn has_else(&self) -> bool {
        else_node(self.syntax()).is_some()
    }
}

impl RecipeBranch {
    /// The recipe lines in this branch
    pub fn recipes(&self) -> impl Iterator<Item = RecipeLine> {
        recipe_lines(self.syntax())
    }
}

impl Condition {
    /// The operands: one name for `ifdef`/`ifndef`, two values for `ifeq`/`ifneq`
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "ifneq ( $(CC) , gcc )\nendif\n".parse().unwrap();
    /// let condition = makefile.conditionals().next().unwrap().condition().unwrap();
    /// let operands = condition.operands().iter().map(|o| o.to_string()).collect::<Vec<_>>();
    /// assert_eq!(operands, vec!["$(CC)", "gcc"]);
    /// ```
    pub fn operands(&self) -> Vec<Expression> {
        self.syntax().children().filter_map(Expression::cast).collect()
    }

    /// Whether the operands are quoted rather than parenthesized
    pub fn is_quoted(&self) -> bool {
        self.syntax()
            .children_with_tokens()
            .any(|it| it.kind() == QUOTE)
    }
}
