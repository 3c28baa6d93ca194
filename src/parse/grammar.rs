//! The concrete syntax, expressed as a table of named rules wired through the
//! combinators into one entry rule (`statements`).
//!
//! ```text
//! expression  := term (('+'|'-'|'*') term)*                  ; left-assoc
//! condition   := expression (('=='|'!='|'<='|'<'|'>='|'>') expression)*
//! term        := (number | name | string) call*
//! call        := '(' arglist? ')'
//! arglist     := (expression ',')* expression
//! paramlist   := (name ',')* name
//! assign_stmt := name ':=' expression
//! funcdef     := name '(' paramlist? ')' ':' statements '.'
//! if_stmt     := 'if' condition ':' statements '.'
//! if_else     := 'if' condition ':' statements '.' 'else' ':' statements '.'
//! while_stmt  := 'while' condition ':' statements '.'
//! print_stmt  := 'print' expression
//! return_stmt := 'return' expression
//! statements  := (assign_stmt | funcdef | if_else | if_stmt | print_stmt
//!                | return_stmt | while_stmt)*
//! ```
//!
//! All binary operators are strictly left-associative with no precedence
//! levels inside `expression` or `condition`.

use std::rc::Rc;
use std::str::FromStr;

use num_bigint::BigInt;

use crate::lang::ast::{BinOp, Node};
use crate::parse::combinators::{Matcher, Rule, Tree, alt, lit, opt, rep, rule, seq, token};
use crate::parse::parse_error::SyntaxError;

pub struct Grammar {
    root: Rc<Matcher>,
}

impl Grammar {
    pub fn new() -> Grammar {
        let expression = Rule::forward("expression", t_binary_chain);
        let condition = Rule::forward("condition", t_binary_chain);
        let term = Rule::forward("term", t_term);
        let call = Rule::forward("call", t_call);
        let arglist = Rule::forward("arglist", t_list);
        let paramlist = Rule::forward("paramlist", t_list);
        let number = Rule::forward("number", t_number);
        let name = Rule::forward("name", t_name);
        let string = Rule::forward("string", t_string);
        let assign_stmt = Rule::forward("assign_stmt", t_assign);
        let funcdef = Rule::forward("funcdef", t_funcdef);
        let if_stmt = Rule::forward("if_stmt", t_if);
        let if_else = Rule::forward("if_else", t_if_else);
        let while_stmt = Rule::forward("while_stmt", t_while);
        let print_stmt = Rule::forward("print_stmt", t_print);
        let return_stmt = Rule::forward("return_stmt", t_return);
        let statements = Rule::forward("statements", t_statements);

        number.bind(token(r"[+-]?[0-9]+"));
        name.bind(token(r"[A-Za-z_][A-Za-z0-9_]*"));
        string.bind(token(r"'[^\n]*?'"));

        expression.bind(seq(vec![
            rule(&term),
            rep(seq(vec![
                alt(vec![lit("+"), lit("-"), lit("*")]),
                rule(&term),
            ])),
        ]));
        // Two-character operators first, or "<=" mis-tokenizes as "<".
        condition.bind(seq(vec![
            rule(&expression),
            rep(seq(vec![
                alt(vec![
                    lit("=="),
                    lit("!="),
                    lit("<="),
                    lit("<"),
                    lit(">="),
                    lit(">"),
                ]),
                rule(&expression),
            ])),
        ]));
        term.bind(seq(vec![
            alt(vec![rule(&number), rule(&name), rule(&string)]),
            rep(rule(&call)),
        ]));
        call.bind(seq(vec![lit("("), opt(rule(&arglist)), lit(")")]));
        arglist.bind(seq(vec![
            rep(seq(vec![rule(&expression), lit(",")])),
            rule(&expression),
        ]));
        paramlist.bind(seq(vec![
            rep(seq(vec![rule(&name), lit(",")])),
            rule(&name),
        ]));

        assign_stmt.bind(seq(vec![rule(&name), lit(":="), rule(&expression)]));
        funcdef.bind(seq(vec![
            rule(&name),
            lit("("),
            opt(rule(&paramlist)),
            lit(")"),
            lit(":"),
            rule(&statements),
            lit("."),
        ]));
        if_stmt.bind(seq(vec![
            lit("if"),
            rule(&condition),
            lit(":"),
            rule(&statements),
            lit("."),
        ]));
        if_else.bind(seq(vec![
            lit("if"),
            rule(&condition),
            lit(":"),
            rule(&statements),
            lit("."),
            lit("else"),
            lit(":"),
            rule(&statements),
            lit("."),
        ]));
        while_stmt.bind(seq(vec![
            lit("while"),
            rule(&condition),
            lit(":"),
            rule(&statements),
            lit("."),
        ]));
        print_stmt.bind(seq(vec![lit("print"), rule(&expression)]));
        return_stmt.bind(seq(vec![lit("return"), rule(&expression)]));

        statements.bind(rep(alt(vec![
            rule(&assign_stmt),
            rule(&funcdef),
            rule(&if_else),
            rule(&if_stmt),
            rule(&print_stmt),
            rule(&return_stmt),
            rule(&while_stmt),
        ])));

        Grammar {
            root: rule(&statements),
        }
    }

    /// Parse a whole source text into top-level statements.
    ///
    /// The root rule never fails outright (it is a repetition), so the only
    /// syntax error is input left over after it has consumed what it can.
    pub fn parse(&self, source: &str) -> Result<Vec<Node>, SyntaxError> {
        let result = match self.root.matches(source) {
            Some(result) => result,
            None => {
                return Err(SyntaxError {
                    rest: source.trim_start().to_string(),
                });
            }
        };
        let rest = result.rest.trim_start();
        if !rest.is_empty() {
            return Err(SyntaxError {
                rest: rest.to_string(),
            });
        }
        Ok(result
            .tree
            .children()
            .into_iter()
            .map(Tree::into_ast)
            .collect())
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::new()
    }
}

// Rule transformers. Each receives the raw subtree of its own rule and lowers
// it; panics here indicate a defect in the rule table above, never bad input.

fn name_of(tree: Tree) -> String {
    match tree.into_ast() {
        Node::Name(name) => name,
        other => panic!("expected a name node, got {:?}", other),
    }
}

/// Left-fold `first (op operand)*` into nested `BinaryOp`s.
fn t_binary_chain(tree: Tree) -> Tree {
    let mut children = tree.children().into_iter();
    let mut acc = children
        .next()
        .expect("chain rule always has a first operand")
        .into_ast();
    for pair in children
        .next()
        .expect("chain rule always has a repetition")
        .children()
    {
        let mut parts = pair.children().into_iter();
        let symbol = parts.next().expect("operator word").word();
        let operand = parts.next().expect("right operand").into_ast();
        let op = BinOp::from_symbol(&symbol)
            .unwrap_or_else(|| panic!("rule table matched unknown operator {:?}", symbol));
        acc = Node::BinaryOp {
            op,
            left: Box::new(acc),
            right: Box::new(operand),
        };
    }
    Tree::Ast(acc)
}

fn t_term(tree: Tree) -> Tree {
    let mut children = tree.children().into_iter();
    let mut term = children.next().expect("primary").into_ast();
    for arglist in children.next().expect("call repetition").children() {
        term = Node::Call {
            callee: Box::new(term),
            args: arglist.children().into_iter().map(Tree::into_ast).collect(),
        };
    }
    Tree::Ast(term)
}

/// `'(' arglist? ')'` reduces to the argument list alone; an absent list is
/// the empty tree, i.e. a zero-argument call.
fn t_call(tree: Tree) -> Tree {
    let mut children = tree.children().into_iter();
    children.next();
    children.next().expect("argument list")
}

/// `(item ',')* item` flattens to a plain sequence; shared by `arglist` and
/// `paramlist`.
fn t_list(tree: Tree) -> Tree {
    let mut children = tree.children().into_iter();
    let mut items: Vec<Tree> = children
        .next()
        .expect("leading items")
        .children()
        .into_iter()
        .map(|pair| {
            pair.children()
                .into_iter()
                .next()
                .expect("item before comma")
        })
        .collect();
    items.push(children.next().expect("trailing item"));
    Tree::Seq(items)
}

fn t_number(tree: Tree) -> Tree {
    let word = tree.word();
    // Literals too wide for the machine width go straight to Long.
    let value = match word.parse::<i64>() {
        Ok(n) => crate::lang::value::Value::Int(n),
        Err(_) => crate::lang::value::Value::Long(
            BigInt::from_str(&word).expect("number rule matched non-numeric text"),
        ),
    };
    Tree::Ast(Node::Const(value))
}

fn t_name(tree: Tree) -> Tree {
    Tree::Ast(Node::Name(tree.word()))
}

fn t_string(tree: Tree) -> Tree {
    let word = tree.word();
    let inner = &word[1..word.len() - 1];
    Tree::Ast(Node::Const(crate::lang::value::Value::Str(
        inner.to_string(),
    )))
}

fn t_assign(tree: Tree) -> Tree {
    let mut children = tree.children().into_iter();
    let name = name_of(children.next().expect("target name"));
    children.next();
    let expr = children.next().expect("value expression").into_ast();
    Tree::Ast(Node::Assign {
        name,
        expr: Box::new(expr),
    })
}

fn t_funcdef(tree: Tree) -> Tree {
    let mut children: Vec<Tree> = tree.children();
    let body = children.remove(5).children();
    let params = children.remove(2).children();
    let name = name_of(children.remove(0));
    Tree::Ast(Node::FunctionDef {
        name,
        params: params.into_iter().map(name_of).collect(),
        body: body.into_iter().map(Tree::into_ast).collect(),
    })
}

fn t_if(tree: Tree) -> Tree {
    let mut children: Vec<Tree> = tree.children();
    let body = children.remove(3).children();
    let condition = children.remove(1).into_ast();
    Tree::Ast(Node::If {
        condition: Box::new(condition),
        body: body.into_iter().map(Tree::into_ast).collect(),
    })
}

fn t_if_else(tree: Tree) -> Tree {
    let mut children: Vec<Tree> = tree.children();
    let else_body = children.remove(7).children();
    let body = children.remove(3).children();
    let condition = children.remove(1).into_ast();
    Tree::Ast(Node::IfElse {
        condition: Box::new(condition),
        body: body.into_iter().map(Tree::into_ast).collect(),
        else_body: else_body.into_iter().map(Tree::into_ast).collect(),
    })
}

fn t_while(tree: Tree) -> Tree {
    let mut children: Vec<Tree> = tree.children();
    let body = children.remove(3).children();
    let condition = children.remove(1).into_ast();
    Tree::Ast(Node::While {
        condition: Box::new(condition),
        body: body.into_iter().map(Tree::into_ast).collect(),
    })
}

fn t_print(tree: Tree) -> Tree {
    let mut children = tree.children().into_iter();
    children.next();
    Tree::Ast(Node::Print(Box::new(
        children.next().expect("printed expression").into_ast(),
    )))
}

fn t_return(tree: Tree) -> Tree {
    let mut children = tree.children().into_iter();
    children.next();
    Tree::Ast(Node::Return(Box::new(
        children.next().expect("returned expression").into_ast(),
    )))
}

fn t_statements(tree: Tree) -> Tree {
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::value::Value;

    fn parse(source: &str) -> Vec<Node> {
        Grammar::new().parse(source).expect("parse should succeed")
    }

    fn int(n: i64) -> Node {
        Node::Const(Value::Int(n))
    }

    #[test]
    fn test_assign_statement() {
        assert_eq!(
            parse("x := 3"),
            vec![Node::Assign {
                name: "x".to_string(),
                expr: Box::new(int(3)),
            }]
        );
    }

    #[test]
    fn test_expression_is_left_associative() {
        // 1 - 2 + 3 parses as (1 - 2) + 3.
        let stmts = parse("print 1 - 2 + 3");
        let Node::Print(expr) = &stmts[0] else {
            panic!("expected print");
        };
        assert_eq!(
            **expr,
            Node::BinaryOp {
                op: BinOp::Add,
                left: Box::new(Node::BinaryOp {
                    op: BinOp::Sub,
                    left: Box::new(int(1)),
                    right: Box::new(int(2)),
                }),
                right: Box::new(int(3)),
            }
        );
    }

    #[test]
    fn test_no_precedence_between_plus_and_star() {
        // 1 + 2 * 3 parses as (1 + 2) * 3: one level, left associative.
        let stmts = parse("print 1 + 2 * 3");
        let Node::Print(expr) = &stmts[0] else {
            panic!("expected print");
        };
        let Node::BinaryOp { op, left, .. } = &**expr else {
            panic!("expected binary op");
        };
        assert_eq!(*op, BinOp::Mul);
        assert!(matches!(&**left, Node::BinaryOp { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_two_character_comparisons_win() {
        let stmts = parse("if a <= b:\n.\n");
        let Node::If { condition, .. } = &stmts[0] else {
            panic!("expected if");
        };
        assert!(matches!(&**condition, Node::BinaryOp { op: BinOp::Le, .. }));
    }

    #[test]
    fn test_call_with_arguments() {
        assert_eq!(
            parse("x := f(2, 3)"),
            vec![Node::Assign {
                name: "x".to_string(),
                expr: Box::new(Node::Call {
                    callee: Box::new(Node::Name("f".to_string())),
                    args: vec![int(2), int(3)],
                }),
            }]
        );
    }

    #[test]
    fn test_call_without_arguments() {
        let stmts = parse("x := f()");
        let Node::Assign { expr, .. } = &stmts[0] else {
            panic!("expected assign");
        };
        let Node::Call { args, .. } = &**expr else {
            panic!("expected call");
        };
        assert!(args.is_empty());
    }

    #[test]
    fn test_chained_calls() {
        // f(1)(2) applies the result of the first call.
        let stmts = parse("x := f(1)(2)");
        let Node::Assign { expr, .. } = &stmts[0] else {
            panic!("expected assign");
        };
        let Node::Call { callee, args } = &**expr else {
            panic!("expected call");
        };
        assert_eq!(args, &vec![int(2)]);
        assert!(matches!(&**callee, Node::Call { .. }));
    }

    #[test]
    fn test_funcdef() {
        assert_eq!(
            parse("f(a, b):\nreturn a\n.\n"),
            vec![Node::FunctionDef {
                name: "f".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
                body: vec![Node::Return(Box::new(Node::Name("a".to_string())))],
            }]
        );
    }

    #[test]
    fn test_funcdef_without_parameters() {
        let stmts = parse("f():\n.\n");
        let Node::FunctionDef { params, body, .. } = &stmts[0] else {
            panic!("expected funcdef");
        };
        assert!(params.is_empty());
        assert!(body.is_empty());
    }

    #[test]
    fn test_if_else_binds_before_if() {
        let stmts = parse("if x:\nprint 1\n.\nelse:\nprint 2\n.\n");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Node::IfElse { .. }));
    }

    #[test]
    fn test_while_statement() {
        let stmts = parse("while x < 3:\nx := x + 1\n.\n");
        let Node::While { body, .. } = &stmts[0] else {
            panic!("expected while");
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            parse("print 'hello'"),
            vec![Node::Print(Box::new(Node::Const(Value::Str(
                "hello".to_string()
            ))))]
        );
    }

    #[test]
    fn test_signed_number_literal() {
        assert_eq!(parse("x := -7"), vec![Node::Assign {
            name: "x".to_string(),
            expr: Box::new(int(-7)),
        }]);
    }

    #[test]
    fn test_wide_number_literal_becomes_long() {
        let stmts = parse("x := 99999999999999999999999999");
        let Node::Assign { expr, .. } = &stmts[0] else {
            panic!("expected assign");
        };
        assert!(matches!(&**expr, Node::Const(Value::Long(_))));
    }

    #[test]
    fn test_unconsumed_input_is_a_syntax_error() {
        let err = Grammar::new().parse("x := 3\n???").unwrap_err();
        assert_eq!(err.rest, "???");
    }

    #[test]
    fn test_empty_source_parses_to_no_statements() {
        assert!(parse("  \n ").is_empty());
    }
}
