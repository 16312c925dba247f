use crate::ast::variable::{operator_token, specifiers, AssignOp, Specifier};
use crate::lossless::{Define, Expression};
use rowan::ast::AstNode;

impl Define {
    /// The macro name
    pub fn name(&self) -> Option<Expression> {
        self.syntax().children().find_map(Expression::cast)
    }

    /// The flavor given after the name, as in `define X :=`
    pub fn operator(&self) -> Option<AssignOp> {
        operator_token(self.syntax()).and_then(|token| AssignOp::from_text(token.text()))
    }

    /// The lines between `define` and `endef`, without the final line break
    ///
    /// # Example
    /// ```
    /// use makefile_grammar::Makefile;
    /// let makefile: Makefile = "define RUN\n\t$(CC) $<\n\t@echo done\nendef\n".parse().unwrap();
    /// let define = makefile.defines().next().unwrap();
    /// assert_eq!(define.name().unwrap().to_string(), "RUN");
    /// assert_eq!(define.body().unwrap().to_string(), "\t$(CC) $<\n\t@echo done");
    /// ```
    pub fn body(&self) -> Option<Expression> {
        self.syntax().children().filter_map(Expression::cast).nth(1)
    }

    /// The specifier keywords before `define`
    pub fn specifiers(&self) -> Vec<Specifier> {
        specifiers(self.syntax())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fragment, Makefile};

    fn define(text: &str) -> Define {
        let makefile: Makefile = text.parse().unwrap();
        makefile.defines().next().unwrap()
    }

    #[test]
    fn test_body_fragments() {
        let define = define("define GREETING\nHello, $(NAME)!\nendef\n");
        assert_eq!(define.name().unwrap().to_string(), "GREETING");
        assert_eq!(define.operator(), None);
        let fragments = define.body().unwrap().fragments();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], Fragment::Text("Hello, ".to_string()));
        assert_eq!(fragments[1].as_expansion().unwrap().name(), "NAME");
        assert_eq!(fragments[2], Fragment::Text("!".to_string()));
    }

    #[test]
    fn test_empty_body() {
        let define = define("define EMPTY\nendef\n");
        assert_eq!(define.name().unwrap().to_string(), "EMPTY");
        assert!(define.body().unwrap().is_empty());
        assert_eq!(define.operator(), None);
    }

    #[test]
    fn test_operator_and_specifiers() {
        let define = define("override define X :=\nvalue\nendef\n");
        assert_eq!(define.operator(), Some(AssignOp::Immediate));
        assert_eq!(define.specifiers(), vec![Specifier::Override]);
        assert_eq!(define.body().unwrap().to_string(), "value");
    }

    #[test]
    fn test_body_keeps_directives_as_text() {
        let define = define("define X\nifdef A\ninclude b\nendif\nendef\n");
        let body = define.body().unwrap();
        assert_eq!(body.to_string(), "ifdef A\ninclude b\nendif");
        assert!(body.is_literal());
    }

    #[test]
    fn test_nested_define() {
        let define = define("define OUTER\ndefine INNER\nx\nendef\nendef\nA = 1\n");
        assert_eq!(
            define.body().unwrap().to_string(),
            "define INNER\nx\nendef"
        );
    }

    #[test]
    fn test_expansion_spanning_lines() {
        let define = define("define X\n$(foo\n)\nendef\n");
        let body = define.body().unwrap();
        assert_eq!(body.expansions().count(), 1);
    }

    #[test]
    fn test_endef_with_comment() {
        let define = define("define X\nbody\nendef # X\n");
        assert_eq!(define.body().unwrap().to_string(), "body");
    }

    #[test]
    fn test_recipe_prefixed_endef_is_body() {
        let define = define("define RECIPE\n\techo hi\n\tendef\nendef\n");
        assert_eq!(define.body().unwrap().to_string(), "\techo hi\n\tendef");
    }

    #[test]
    fn test_recipe_prefixed_define_does_not_nest() {
        let makefile: Makefile = "define X\n\tdefine Y\nendef\nA = 1\n".parse().unwrap();
        let define = makefile.defines().next().unwrap();
        assert_eq!(define.body().unwrap().to_string(), "\tdefine Y");
        assert_eq!(makefile.assignments().count(), 1);
    }

    #[test]
    fn test_endef_followed_by_text_is_body() {
        let define = define("define X\nendef extra\nendef\n");
        assert_eq!(define.body().unwrap().to_string(), "endef extra");
    }
}
