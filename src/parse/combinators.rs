use std::cell::RefCell;
use std::rc::Rc;

use crate::lang::ast::Node;
use crate::parse::pattern::Pattern;

/// Parse tree handed between combinators and rule transformers.
///
/// Rule transformers lower subtrees to AST nodes as soon as a rule matches,
/// so an interior `Seq` may hold a mix of raw words and finished AST nodes
/// while the parse is in flight. The whole tree is transient and discarded
/// once the AST is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// Interior node: children collected by `Sequence` and `Repeat`, empty
    /// for a failed `Optional`.
    Seq(Vec<Tree>),
    /// Matched literal text.
    Word(String),
    /// Subtree already lowered by a rule transformer.
    Ast(Node),
}

impl Tree {
    pub fn empty() -> Tree {
        Tree::Seq(Vec::new())
    }

    // The grammar is fixed at build time, so a shape mismatch in any of the
    // accessors below is a defect in the rule table, not a user error.

    pub fn children(self) -> Vec<Tree> {
        match self {
            Tree::Seq(children) => children,
            other => panic!("expected an interior tree node, got {:?}", other),
        }
    }

    pub fn word(self) -> String {
        match self {
            Tree::Word(word) => word,
            other => panic!("expected a matched word, got {:?}", other),
        }
    }

    pub fn into_ast(self) -> Node {
        match self {
            Tree::Ast(node) => node,
            other => panic!("expected a lowered AST node, got {:?}", other),
        }
    }
}

/// A successful match: the subtree built so far and the unconsumed suffix.
#[derive(Debug)]
pub struct ParseResult<'a> {
    pub tree: Tree,
    pub rest: &'a str,
}

/// Post-match hook a rule applies to its subtree before handing it to the
/// parent combinator.
pub type Transformer = fn(Tree) -> Tree;

/// The combinator set.
///
/// Matching never raises: a `None` simply means "no match here, try the next
/// alternative or fail the whole parse".
#[derive(Debug)]
pub enum Matcher {
    /// Optional whitespace followed by one tokenizing pattern.
    Literal(Pattern),
    /// First matching branch wins; order encodes precedence.
    Alternative(Vec<Rc<Matcher>>),
    /// Never fails; yields an empty tree on mismatch.
    Optional(Rc<Matcher>),
    /// Never fails; collects zero or more matches.
    Repeat(Rc<Matcher>),
    /// All in order, or nothing (partial progress is discarded).
    Sequence(Vec<Rc<Matcher>>),
    /// A named grammar rule, resolvable before its body is bound so rules can
    /// be mutually recursive.
    Rule(Rc<Rule>),
}

/// A named rule: a forward-declared placeholder for a combinator expression,
/// bound once at grammar-setup time, plus the rule's transformer.
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    transformer: Transformer,
    matcher: RefCell<Option<Rc<Matcher>>>,
}

impl Rule {
    pub fn forward(name: &'static str, transformer: Transformer) -> Rc<Rule> {
        Rc::new(Rule {
            name,
            transformer,
            matcher: RefCell::new(None),
        })
    }

    pub fn bind(&self, matcher: Rc<Matcher>) {
        *self.matcher.borrow_mut() = Some(matcher);
    }
}

impl Matcher {
    pub fn matches<'a>(&self, input: &'a str) -> Option<ParseResult<'a>> {
        match self {
            Matcher::Literal(pattern) => {
                let m = pattern.match_prefix(input)?;
                Some(ParseResult {
                    tree: Tree::Word(m.text.to_string()),
                    rest: &input[m.end..],
                })
            }

            Matcher::Alternative(branches) => {
                branches.iter().find_map(|branch| branch.matches(input))
            }

            Matcher::Optional(inner) => Some(inner.matches(input).unwrap_or(ParseResult {
                tree: Tree::empty(),
                rest: input,
            })),

            Matcher::Repeat(inner) => {
                let mut children = Vec::new();
                let mut rest = input;
                while let Some(m) = inner.matches(rest) {
                    children.push(m.tree);
                    rest = m.rest;
                }
                Some(ParseResult {
                    tree: Tree::Seq(children),
                    rest,
                })
            }

            Matcher::Sequence(parts) => {
                let mut children = Vec::with_capacity(parts.len());
                let mut rest = input;
                for part in parts {
                    let m = part.matches(rest)?;
                    children.push(m.tree);
                    rest = m.rest;
                }
                Some(ParseResult {
                    tree: Tree::Seq(children),
                    rest,
                })
            }

            Matcher::Rule(rule) => {
                let bound = rule.matcher.borrow();
                let matcher = bound
                    .as_ref()
                    .unwrap_or_else(|| panic!("grammar rule '{}' was never bound", rule.name));
                let mut result = matcher.matches(input)?;
                result.tree = (rule.transformer)(result.tree);
                Some(result)
            }
        }
    }
}

// Constructors, so the grammar table reads like the grammar itself.

/// Match exact text, with optional leading whitespace.
pub fn lit(text: &str) -> Rc<Matcher> {
    token(&regex::escape(text))
}

/// Match a regex token, with optional leading whitespace.
pub fn token(expr: &str) -> Rc<Matcher> {
    let pattern = Pattern::new(&format!(r"\s*({})", expr))
        .unwrap_or_else(|e| panic!("invalid token pattern {:?}: {}", expr, e));
    Rc::new(Matcher::Literal(pattern))
}

pub fn alt(branches: Vec<Rc<Matcher>>) -> Rc<Matcher> {
    Rc::new(Matcher::Alternative(branches))
}

pub fn opt(inner: Rc<Matcher>) -> Rc<Matcher> {
    Rc::new(Matcher::Optional(inner))
}

pub fn rep(inner: Rc<Matcher>) -> Rc<Matcher> {
    Rc::new(Matcher::Repeat(inner))
}

pub fn seq(parts: Vec<Rc<Matcher>>) -> Rc<Matcher> {
    Rc::new(Matcher::Sequence(parts))
}

pub fn rule(rule: &Rc<Rule>) -> Rc<Matcher> {
    Rc::new(Matcher::Rule(rule.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tree: Tree) -> Vec<String> {
        tree.children().into_iter().map(Tree::word).collect()
    }

    #[test]
    fn test_literal_skips_whitespace() {
        let m = lit("while").matches("  while x").unwrap();
        assert_eq!(m.tree, Tree::Word("while".to_string()));
        assert_eq!(m.rest, " x");
    }

    #[test]
    fn test_literal_mismatch() {
        assert!(lit("while").matches("if x").is_none());
    }

    #[test]
    fn test_alternative_order_encodes_precedence() {
        // The two-character operator must be listed first or "<=" tokenizes
        // as "<" followed by stray "=".
        let cmp = alt(vec![lit("<="), lit("<")]);
        let m = cmp.matches("<= y").unwrap();
        assert_eq!(m.tree, Tree::Word("<=".to_string()));

        let greedy_wrong = alt(vec![lit("<"), lit("<=")]);
        let m = greedy_wrong.matches("<= y").unwrap();
        assert_eq!(m.tree, Tree::Word("<".to_string()));
    }

    #[test]
    fn test_optional_never_fails() {
        let m = opt(lit("x")).matches("y").unwrap();
        assert_eq!(m.tree, Tree::empty());
        assert_eq!(m.rest, "y");

        let m = opt(lit("x")).matches("x y").unwrap();
        assert_eq!(m.tree, Tree::Word("x".to_string()));
    }

    #[test]
    fn test_repeat_collects_until_mismatch() {
        let m = rep(lit("a")).matches("a a a b").unwrap();
        assert_eq!(words(m.tree), vec!["a", "a", "a"]);
        assert_eq!(m.rest, " b");

        let m = rep(lit("a")).matches("b").unwrap();
        assert_eq!(m.tree, Tree::empty());
    }

    #[test]
    fn test_sequence_discards_partial_progress() {
        let s = seq(vec![lit("a"), lit("b")]);
        assert!(s.matches("a c").is_none());

        let m = s.matches("a b c").unwrap();
        assert_eq!(words(m.tree), vec!["a", "b"]);
        assert_eq!(m.rest, " c");
    }

    #[test]
    fn test_forward_declared_rule_recursion() {
        // nested := '(' nested? ')'
        fn identity(tree: Tree) -> Tree {
            tree
        }
        let nested = Rule::forward("nested", identity);
        nested.bind(seq(vec![lit("("), opt(rule(&nested)), lit(")")]));

        assert!(rule(&nested).matches("((()))").is_some());
        assert!(rule(&nested).matches("(").is_none());
    }
}
