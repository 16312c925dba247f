use crate::lossless::{Assignment, Expression, RecipeConditional, Rule, SyntaxNode};
use crate::SyntaxKind::{self, *};
use rowan::ast::AstNode;

/// A line of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecipeLine {
    /// A command handed to the shell, without its recipe prefix
    Command(Expression),
    /// A conditional whose branches hold more recipe lines
    Conditional(RecipeConditional),
}

impl RecipeLine {
    pub(crate) fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            RECIPE => node
                .children()
                .find_map(Expression::cast)
                .map(RecipeLine::Command),
            RECIPE_CONDITIONAL => RecipeConditional::cast(node).map(RecipeLine::Conditional),
            _ => None,
        }
    }

    /// The command, if this line is one
    pub fn command(&self) -> Option<Expression> {
        match self {
            RecipeLine::Command(expr) => Some(expr.clone()),
            RecipeLine::Conditional(_) => None,
        }
    }

    /// The conditional, if this line is one
    pub fn as_conditional(&self) -> Option<&RecipeConditional> {
        match self {
            RecipeLine::Command(_) => None,
            RecipeLine::Conditional(conditional) => Some(conditional),
        }
    }
}

/// Recipe lines among the children of `node`, skipping blank and comment lines.
pub(crate) fn recipe_lines(node: &SyntaxNode) -> impl Iterator<Item = RecipeLine> {
    node.children().filter_map(RecipeLine::cast)
}

fn words(node: &SyntaxNode, kind: SyntaxKind) -> impl Iterator<Item = Expression> {
    node.children()
        .find(|it| it.kind() == kind)
        .into_iter()
        .flat_map(|it| it.children().filter_map(Expression::cast))
}

impl Rule {
    /// The targets, one expression per word
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "a.o b.o: common.h\n".parse().unwrap();
    /// let rule = makefile.rules().next().unwrap();
    /// let targets = rule.targets().map(|t| t.to_string()).collect::<Vec<_>>();
    /// assert_eq!(targets, vec!["a.o", "b.o"]);
    /// ```
    pub fn targets(&self) -> impl Iterator<Item = Expression> {
        words(self.syntax(), TARGETS)
    }

    /// The normal prerequisites
    pub fn prerequisites(&self) -> impl Iterator<Item = Expression> {
        words(self.syntax(), PREREQUISITES)
    }

    /// The prerequisites after `|`
    pub fn order_only_prerequisites(&self) -> impl Iterator<Item = Expression> {
        words(self.syntax(), ORDER_ONLY)
    }

    /// Whether the targets are separated by `::`
    pub fn is_double_colon(&self) -> bool {
        self.syntax()
            .children_with_tokens()
            .filter(|it| it.kind() == COLON)
            .count()
            == 2
    }

    /// The recipe, including a command given after `;` on the rule line
    pub fn recipes(&self) -> impl Iterator<Item = RecipeLine> {
        recipe_lines(self.syntax())
    }

    /// The command given after `;` on the rule line
    pub fn inline_recipe(&self) -> Option<Expression> {
        self.syntax()
            .children()
            .find(|it| {
                it.kind() == RECIPE && it.first_token().is_some_and(|token| token.text() == ";")
            })
            .and_then(|it| it.children().find_map(Expression::cast))
    }

    /// The assignment of a target-specific variable, as in `prog: CFLAGS = -g`
    pub fn target_assignment(&self) -> Option<Assignment> {
        self.syntax().children().find_map(Assignment::cast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_with, AssignOp, LexOptions, Makefile, ParseOptions};

    fn rule(text: &str) -> Rule {
        let makefile: Makefile = text.parse().unwrap();
        makefile.rules().next().unwrap()
    }

    fn strings(exprs: impl Iterator<Item = Expression>) -> Vec<String> {
        exprs.map(|e| e.to_string()).collect()
    }

    fn commands(rule: &Rule) -> Vec<String> {
        rule.recipes()
            .filter_map(|line| line.command())
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn test_simple_rule() {
        let rule = rule("all: main.o util.o\n\t$(CC) -o $@ $^\n\t@echo done\n");
        assert_eq!(strings(rule.targets()), vec!["all"]);
        assert_eq!(strings(rule.prerequisites()), vec!["main.o", "util.o"]);
        assert_eq!(commands(&rule), vec!["$(CC) -o $@ $^", "@echo done"]);
        assert!(!rule.is_double_colon());
    }

    #[test]
    fn test_no_prerequisites() {
        let rule = rule("clean:\n\trm -f *.o\n");
        assert_eq!(rule.prerequisites().count(), 0);
        assert_eq!(commands(&rule), vec!["rm -f *.o"]);
    }

    #[test]
    fn test_double_colon() {
        let rule = rule("install:: all\n");
        assert!(rule.is_double_colon());
        assert_eq!(strings(rule.prerequisites()), vec!["all"]);
    }

    #[test]
    fn test_order_only() {
        let mixed = rule("obj/a.o: a.c | obj\n");
        assert_eq!(strings(mixed.prerequisites()), vec!["a.c"]);
        assert_eq!(strings(mixed.order_only_prerequisites()), vec!["obj"]);

        let only = rule("a.o: | obj dist\n");
        assert_eq!(only.prerequisites().count(), 0);
        assert_eq!(strings(only.order_only_prerequisites()), vec!["obj", "dist"]);
    }

    #[test]
    fn test_inline_recipe() {
        let rule = rule("hello: ; @echo hi\n\t@echo again\n");
        assert_eq!(rule.inline_recipe().unwrap().to_string(), "@echo hi");
        assert_eq!(commands(&rule), vec!["@echo hi", "@echo again"]);
    }

    #[test]
    fn test_target_specific_assignment() {
        let rule = rule("prog: CFLAGS += -g\n");
        let assignment = rule.target_assignment().unwrap();
        assert_eq!(assignment.name().unwrap().to_string(), "CFLAGS");
        assert_eq!(assignment.operator(), Some(AssignOp::Append));
        assert_eq!(rule.prerequisites().count(), 0);
        assert_eq!(rule.recipes().count(), 0);
    }

    #[test]
    fn test_static_pattern() {
        let rule = rule("$(OBJ): %.o: %.c\n\t$(CC) -c $<\n");
        assert_eq!(strings(rule.targets()), vec!["$(OBJ)"]);
        assert_eq!(strings(rule.prerequisites()), vec!["%.o:", "%.c"]);
    }

    #[test]
    fn test_target_with_expansion_colon() {
        let rule = rule("$(subst :,_,$(X)): dep\n");
        assert_eq!(strings(rule.targets()), vec!["$(subst :,_,$(X))"]);
        assert_eq!(strings(rule.prerequisites()), vec!["dep"]);
    }

    #[test]
    fn test_blank_and_comment_lines_inside_recipe() {
        let makefile: Makefile = "all:\n\tone\n\n# note\n\ttwo\n\nA = 1\n".parse().unwrap();
        let rule = makefile.rules().next().unwrap();
        assert_eq!(commands(&rule), vec!["one", "two"]);
        // The blank line before the assignment stays outside the rule
        assert_eq!(rule.to_string(), "all:\n\tone\n\n# note\n\ttwo\n");
        assert_eq!(makefile.assignments().count(), 1);
    }

    #[test]
    fn test_recipe_comment_is_command_text() {
        let rule = rule("all:\n\techo a # not a comment\n");
        assert_eq!(commands(&rule), vec!["echo a # not a comment"]);
    }

    #[test]
    fn test_trailing_comment_on_rule_line() {
        let rule = rule("all: dep # build everything\n\ttrue\n");
        assert_eq!(strings(rule.prerequisites()), vec!["dep"]);
        assert_eq!(commands(&rule), vec!["true"]);
    }

    #[test]
    fn test_recipe_prefix_option() {
        let options = ParseOptions {
            lex: LexOptions { recipe_prefix: '>' },
            ..Default::default()
        };
        let makefile = parse_with("all:\n>echo hi\n", &options).unwrap();
        let rule = makefile.rules().next().unwrap();
        assert_eq!(commands(&rule), vec!["echo hi"]);
    }

    #[test]
    fn test_recipe_ends_at_non_recipe_line() {
        let makefile: Makefile = "a:\n\tone\nb:\n\ttwo\n".parse().unwrap();
        let rules = makefile.rules().collect::<Vec<_>>();
        assert_eq!(rules.len(), 2);
        assert_eq!(commands(&rules[0]), vec!["one"]);
        assert_eq!(commands(&rules[1]), vec!["two"]);
    }

    #[test]
    fn test_recipe_conditional() {
        let rule = rule(
            "all:\n\techo start\nifdef DEBUG\n\techo debug\nelse\n\techo release\nendif\n\techo end\n",
        );
        let lines = rule.recipes().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        let conditional = lines[1].as_conditional().unwrap();
        let then_branch = conditional.then_branch().unwrap();
        let then = strings(then_branch.recipes().filter_map(|l| l.command()));
        assert_eq!(then, vec!["echo debug"]);
        assert!(conditional.has_else());
        assert_eq!(lines[2].command().unwrap().to_string(), "echo end");
    }

    #[test]
    fn test_tab_led_else_is_a_command() {
        let rule = rule("all:\n\telse\n");
        assert_eq!(commands(&rule), vec!["else"]);
    }

    #[test]
    fn test_missing_target() {
        assert!(": dep\n".parse::<Makefile>().is_err());
    }
}
