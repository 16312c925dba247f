use crate::lossless::{Expression, Include};
use crate::SyntaxKind::INCLUDE_KW;
use rowan::ast::AstNode;

impl Include {
    /// The directive as written: `include`, `-include` or `sinclude`
    pub fn keyword(&self) -> Option<String> {
        self.syntax()
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|token| token.kind() == INCLUDE_KW)
            .map(|token| token.text().to_string())
    }

    /// Check if this is an optional include (-include or sinclude)
    pub fn is_optional(&self) -> bool {
        matches!(self.keyword().as_deref(), Some("-include" | "sinclude"))
    }

    /// The file name patterns, one expression per word
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "-include $(DEPS) local.mk\n".parse().unwrap();
    /// let include = makefile.includes().next().unwrap();
    /// assert!(include.is_optional());
    /// let patterns = include.patterns().map(|p| p.to_string()).collect::<Vec<_>>();
    /// assert_eq!(patterns, vec!["$(DEPS)", "local.mk"]);
    /// ```
    pub fn patterns(&self) -> impl Iterator<Item = Expression> {
        self.syntax().children().filter_map(Expression::cast)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Makefile, Statement};

    #[test]
    fn test_include() {
        let makefile: Makefile = "include config.mk\n".parse().unwrap();
        let include = makefile.includes().next().unwrap();
        assert_eq!(include.keyword().as_deref(), Some("include"));
        assert!(!include.is_optional());
        assert_eq!(include.patterns().count(), 1);
    }

    #[test]
    fn test_sinclude_with_comment() {
        let makefile: Makefile = "sinclude a.mk b.mk # optional\n".parse().unwrap();
        let include = makefile.includes().next().unwrap();
        assert!(include.is_optional());
        let patterns = include
            .patterns()
            .map(|p| p.to_string())
            .collect::<Vec<_>>();
        assert_eq!(patterns, vec!["a.mk", "b.mk"]);
    }

    #[test]
    fn test_include_inside_conditional() {
        let makefile: Makefile = "ifdef DEBUG\ninclude debug.mk\nendif\n".parse().unwrap();
        let branch = makefile
            .conditionals()
            .next()
            .unwrap()
            .then_branch()
            .unwrap();
        assert!(matches!(
            branch.statements().next(),
            Some(Statement::Include(_))
        ));
    }

    #[test]
    fn test_include_without_file() {
        assert!("include\n".parse::<Makefile>().is_err());
    }

    #[test]
    fn test_include_as_variable_name() {
        // Not at the start of a line, so not a directive
        let makefile: Makefile = "A = include\n".parse().unwrap();
        assert_eq!(makefile.includes().count(), 0);
        assert_eq!(makefile.assignments().count(), 1);
    }
}
