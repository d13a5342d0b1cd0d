use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, none_of, space0},
    combinator::{map, map_opt, not, opt, value},
    error::context,
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    Parser as _,
};
use strum::Display;

use super::{
    and, identifier, is, none, not_, or, r#false, r#for, r#if, r#in, r#true, ws, ParseResult,
    Parser, Span,
};
use crate::stack::ensure_sufficient_stack;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expression {
    Literal(Literal),
    Variable {
        name: String,
    },
    List(Vec<Expression>),
    ListComprehension(Box<Comprehension>),
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Argument>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

impl Expression {
    pub(super) fn parse(input: Span) -> ParseResult<Self> {
        ensure_sufficient_stack(|| context("expression", disjunction)(input))
    }

    fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn logical(op: LogicalOp, lhs: Self, rhs: Self) -> Self {
        Self::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn unary(op: UnaryOp, operand: Self) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}

/// `[element for variable in iterable if condition]`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Comprehension {
    pub element: Expression,
    pub variable: String,
    pub iterable: Expression,
    pub condition: Option<Expression>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Argument {
    Positional(Expression),
    Keyword { name: String, value: Expression },
}

impl Argument {
    fn parse(input: Span) -> ParseResult<Self> {
        alt((
            separated_pair(
                identifier,
                ws(terminated(char('='), not(char('=')))),
                Expression::parse,
            )
            .map(|(name, value)| Self::Keyword { name, value }),
            map(Expression::parse, Self::Positional),
        ))(input)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Literal {
    Int(i64),
    String(String),
    Bool(bool),
    None,
}

impl Literal {
    fn parse(input: Span) -> ParseResult<Self> {
        context(
            "literal",
            alt((
                map_opt(digit1, |digits: Span| digits.fragment().parse::<i64>().ok()).map(Self::Int),
                string.map(Self::String),
                r#true.map(|_| Self::Bool(true)),
                r#false.map(|_| Self::Bool(false)),
                none.map(|_| Self::None),
            )),
        )(input)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum UnaryOp {
    #[strum(to_string = "-")]
    Neg,
    #[strum(to_string = "not")]
    Not,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum BinaryOp {
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Sub,
    #[strum(to_string = "*")]
    Mul,
    #[strum(to_string = "//")]
    FloorDiv,
    #[strum(to_string = "%")]
    Mod,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum CompareOp {
    #[strum(to_string = "==")]
    Eq,
    #[strum(to_string = "!=")]
    NotEq,
    #[strum(to_string = "<")]
    Lt,
    #[strum(to_string = "<=")]
    LtE,
    #[strum(to_string = ">")]
    Gt,
    #[strum(to_string = ">=")]
    GtE,
    #[strum(to_string = "in")]
    In,
    #[strum(to_string = "not in")]
    NotIn,
    #[strum(to_string = "is")]
    Is,
    #[strum(to_string = "is not")]
    IsNot,
}

impl CompareOp {
    fn parse(input: Span) -> ParseResult<Self> {
        alt((
            value(Self::Eq, tag("==")),
            value(Self::NotEq, tag("!=")),
            value(Self::LtE, tag("<=")),
            value(Self::GtE, tag(">=")),
            value(Self::Lt, char('<')),
            value(Self::Gt, char('>')),
            value(Self::NotIn, pair(not_, ws(r#in))),
            value(Self::In, r#in),
            value(Self::IsNot, pair(is, ws(not_))),
            value(Self::Is, is),
        ))(input)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum LogicalOp {
    #[strum(to_string = "and")]
    And,
    #[strum(to_string = "or")]
    Or,
}

fn disjunction(input: Span) -> ParseResult<Expression> {
    let (input, first) = conjunction(input)?;
    let (input, rest) = many0(preceded(ws(or), conjunction))(input)?;

    Ok((
        input,
        rest.into_iter()
            .fold(first, |lhs, rhs| Expression::logical(LogicalOp::Or, lhs, rhs)),
    ))
}

fn conjunction(input: Span) -> ParseResult<Expression> {
    let (input, first) = inversion(input)?;
    let (input, rest) = many0(preceded(ws(and), inversion))(input)?;

    Ok((
        input,
        rest.into_iter()
            .fold(first, |lhs, rhs| Expression::logical(LogicalOp::And, lhs, rhs)),
    ))
}

fn inversion(input: Span) -> ParseResult<Expression> {
    ensure_sufficient_stack(|| {
        alt((
            preceded(pair(not_, space0), inversion)
                .map(|operand| Expression::unary(UnaryOp::Not, operand)),
            comparison,
        ))(input)
    })
}

/// Comparisons don't chain: `a < b < c` is a syntax error.
fn comparison(input: Span) -> ParseResult<Expression> {
    let (input, lhs) = sum(input)?;
    let (input, rhs) = opt(pair(ws(CompareOp::parse), sum))(input)?;

    let expression = match rhs {
        Some((op, rhs)) => Expression::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        None => lhs,
    };

    Ok((input, expression))
}

fn sum(input: Span) -> ParseResult<Expression> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Add, terminated(char('+'), not(char('=')))),
            value(BinaryOp::Sub, terminated(char('-'), not(char('=')))),
        ))),
        term,
    ))(input)?;

    Ok((input, fold_binary(first, rest)))
}

fn term(input: Span) -> ParseResult<Expression> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::FloorDiv, tag("//")),
            value(BinaryOp::Mul, terminated(char('*'), not(char('=')))),
            value(BinaryOp::Mod, char('%')),
        ))),
        factor,
    ))(input)?;

    Ok((input, fold_binary(first, rest)))
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOp, Expression)>) -> Expression {
    rest.into_iter()
        .fold(first, |lhs, (op, rhs)| Expression::binary(op, lhs, rhs))
}

fn factor(input: Span) -> ParseResult<Expression> {
    ensure_sufficient_stack(|| {
        alt((
            preceded(pair(char('-'), space0), factor)
                .map(|operand| Expression::unary(UnaryOp::Neg, operand)),
            postfix,
        ))(input)
    })
}

enum Suffix {
    Call(Vec<Argument>),
    Attribute(String),
}

impl Suffix {
    fn parse(input: Span) -> ParseResult<Self> {
        alt((
            call_arguments.map(Self::Call),
            preceded(ws(char('.')), identifier).map(Self::Attribute),
        ))(input)
    }

    fn apply(self, expression: Expression) -> Expression {
        match self {
            Self::Call(args) => Expression::Call {
                callee: Box::new(expression),
                args,
            },
            Self::Attribute(name) => Expression::Attribute {
                object: Box::new(expression),
                name,
            },
        }
    }
}

/// An atom followed by any number of calls and attribute lookups.
pub(super) fn postfix(input: Span) -> ParseResult<Expression> {
    let (input, atom) = atom(input)?;
    let (input, suffixes) = many0(Suffix::parse)(input)?;

    Ok((
        input,
        suffixes
            .into_iter()
            .fold(atom, |expression, suffix| suffix.apply(expression)),
    ))
}

fn call_arguments(input: Span) -> ParseResult<Vec<Argument>> {
    context(
        "call",
        delimited(
            pair(space0, char('(')),
            ws(separated_list0(ws(char(',')), Argument::parse)),
            pair(opt(ws(char(','))), char(')')),
        ),
    )(input)
}

fn atom(input: Span) -> ParseResult<Expression> {
    context(
        "atom",
        alt((
            Literal::parse.map(Expression::Literal),
            list_display,
            delimited(pair(char('('), space0), Expression::parse, pair(space0, char(')'))),
            identifier.map(|name| Expression::Variable { name }),
        )),
    )(input)
}

fn list_display(input: Span) -> ParseResult<Expression> {
    let (input, _) = pair(char('['), space0)(input)?;

    alt((
        char(']').map(|_| Expression::List(Vec::new())),
        terminated(comprehension, pair(space0, char(']')))
            .map(|comprehension| Expression::ListComprehension(Box::new(comprehension))),
        terminated(
            separated_list1(ws(char(',')), Expression::parse),
            tuple((space0, opt(ws(char(','))), char(']'))),
        )
        .map(Expression::List),
    ))(input)
}

fn comprehension(input: Span) -> ParseResult<Comprehension> {
    context(
        "comprehension",
        tuple((
            Expression::parse,
            ws(r#for),
            identifier,
            ws(r#in),
            disjunction,
            opt(preceded(ws(r#if), disjunction)),
        )),
    )
    .map(
        |(element, _for, variable, _in, iterable, condition)| Comprehension {
            element,
            variable,
            iterable,
            condition,
        },
    )
    .parse(input)
}

fn string(input: Span) -> ParseResult<String> {
    context("string", alt((quoted('"', "\"\\\n"), quoted('\'', "'\\\n"))))(input)
}

fn quoted<'a>(quote: char, special: &'static str) -> impl Parser<'a, String> {
    delimited(
        char(quote),
        many0(alt((none_of(special), preceded(char('\\'), escape)))),
        char(quote),
    )
    .map(|chars: Vec<char>| chars.into_iter().collect())
}

fn escape(input: Span) -> ParseResult<char> {
    alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\\', char('\\')),
        value('\'', char('\'')),
        value('"', char('"')),
    ))(input)
}

#[cfg(test)]
mod tests {
    use nom::Finish;

    use super::{
        Argument, BinaryOp, CompareOp, Comprehension, Expression, Literal, LogicalOp, UnaryOp,
    };
    use crate::syntax_tree::Span;

    #[test]
    fn precedence() {
        assert_eq!(
            parse("1 + 2 * 3"),
            Expression::binary(
                BinaryOp::Add,
                int(1),
                Expression::binary(BinaryOp::Mul, int(2), int(3))
            )
        );
    }

    #[test]
    fn left_associative() {
        assert_eq!(
            parse("x + paramA + exampleLocal"),
            Expression::binary(
                BinaryOp::Add,
                Expression::binary(BinaryOp::Add, variable("x"), variable("paramA")),
                variable("exampleLocal")
            )
        );
    }

    #[test]
    fn boolean_operators() {
        assert_eq!(
            parse("not a and b or c"),
            Expression::logical(
                LogicalOp::Or,
                Expression::logical(
                    LogicalOp::And,
                    Expression::unary(UnaryOp::Not, variable("a")),
                    variable("b")
                ),
                variable("c")
            )
        );
    }

    #[test]
    fn membership() {
        assert_eq!(
            parse("x not in xs"),
            Expression::Compare {
                op: CompareOp::NotIn,
                lhs: Box::new(variable("x")),
                rhs: Box::new(variable("xs")),
            }
        );
        assert_eq!(
            parse("x is not None"),
            Expression::Compare {
                op: CompareOp::IsNot,
                lhs: Box::new(variable("x")),
                rhs: Box::new(Expression::Literal(Literal::None)),
            }
        );
    }

    #[test]
    fn method_call_chain() {
        assert_eq!(
            parse("Pair(1, 2).swap()"),
            Expression::Call {
                callee: Box::new(Expression::Attribute {
                    object: Box::new(Expression::Call {
                        callee: Box::new(variable("Pair")),
                        args: vec![Argument::Positional(int(1)), Argument::Positional(int(2))],
                    }),
                    name: "swap".to_owned(),
                }),
                args: Vec::new(),
            }
        );
    }

    #[test]
    fn list_comprehension() {
        assert_eq!(
            parse("[f(x) for x in xs if x]"),
            Expression::ListComprehension(Box::new(Comprehension {
                element: Expression::Call {
                    callee: Box::new(variable("f")),
                    args: vec![Argument::Positional(variable("x"))],
                },
                variable: "x".to_owned(),
                iterable: variable("xs"),
                condition: Some(variable("x")),
            }))
        );
    }

    #[test]
    fn list_literals() {
        assert_eq!(parse("[]"), Expression::List(Vec::new()));
        assert_eq!(
            parse("[1, 2, ]"),
            Expression::List(vec![int(1), int(2)])
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            parse(r#"'it\'s' "#),
            Expression::Literal(Literal::String("it's".to_owned()))
        );
        assert_eq!(
            parse(r#""a\tb""#),
            Expression::Literal(Literal::String("a\tb".to_owned()))
        );
        assert_eq!(
            parse(r#""""#),
            Expression::Literal(Literal::String(String::new()))
        );
    }

    #[test]
    fn negative_numbers() {
        assert_eq!(parse("-1"), Expression::unary(UnaryOp::Neg, int(1)));
    }

    #[test]
    fn deeply_nested() {
        let depth = 1000;
        let parens = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&parens), int(1));

        let negated = parse(&format!("{}1", "- ".repeat(depth)));
        let mut operand = &negated;

        for _ in 0..depth {
            let Expression::Unary { op: UnaryOp::Neg, operand: inner } = operand else {
                panic!("Expected a negation, got {operand:?}");
            };
            operand = &**inner;
        }

        assert_eq!(operand, &int(1));
    }

    fn parse(input: &str) -> Expression {
        let (rest, expression) = Expression::parse(Span::new(input)).finish().unwrap();
        assert_eq!(rest.fragment().trim(), "", "Unparsed input");
        expression
    }

    fn variable(name: &str) -> Expression {
        Expression::Variable {
            name: name.to_owned(),
        }
    }

    fn int(value: i64) -> Expression {
        Expression::Literal(Literal::Int(value))
    }
}
