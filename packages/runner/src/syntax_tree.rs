use std::{iter::Peekable, rc::Rc, vec};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, satisfy, space0},
    combinator::{all_consuming, map, map_opt, not, opt, recognize, value, verify},
    error::{context, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish, IResult, Parser as _,
};
use nom_greedyerror::{convert_error, GreedyError};
use nom_locate::LocatedSpan;
use thiserror::Error;

use crate::layout::{self, Block, Diagnostic, DiagnosticKind, IndentationPolicy, LogicalLine};

mod expression;

pub use expression::{Argument, BinaryOp, CompareOp, Comprehension, Expression, Literal, LogicalOp, UnaryOp};

pub fn parse(input: &str, policy: IndentationPolicy) -> Result<Module, ParseError> {
    let layout = layout::layout(input, policy)?;
    let body = Body::assemble(layout.blocks, Context::MODULE)?;

    Ok(Module {
        body,
        diagnostics: layout.diagnostics,
    })
}

type Span<'a> = LocatedSpan<&'a str>;

type ParseResult<'a, T> = IResult<Span<'a>, T, GreedyError<Span<'a>, ErrorKind>>;

trait Parser<'a, O>: nom::Parser<Span<'a>, O, GreedyError<Span<'a>, ErrorKind>> {}

impl<'a, O, P: nom::Parser<Span<'a>, O, GreedyError<Span<'a>, ErrorKind>>> Parser<'a, O> for P {}

#[derive(PartialEq, Eq, Debug)]
pub struct Module {
    body: Body,
    diagnostics: Vec<Diagnostic>,
}

impl Module {
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Indentation problems that were tolerated while parsing.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct Body(Vec<Statement>);

impl Body {
    pub fn new(stmts: impl IntoIterator<Item = Statement>) -> Self {
        Self(stmts.into_iter().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.0.iter()
    }

    /// The last source line covered by this body.
    pub fn last_line(&self) -> Option<usize> {
        self.0.last().map(Statement::last_line)
    }

    fn assemble(blocks: Vec<Block>, context: Context) -> Result<Self, ParseError> {
        let mut parsed = blocks
            .into_iter()
            .map(ParsedBlock::parse)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .peekable();
        let mut statements = Vec::new();

        while let Some(block) = parsed.next() {
            statements.push(Statement::assemble(block, &mut parsed, context)?);
        }

        Ok(Self(statements))
    }
}

/// Which statements are allowed where.
#[derive(Copy, Clone, Debug)]
struct Context {
    in_function: bool,
    in_loop: bool,
}

impl Context {
    const MODULE: Self = Self {
        in_function: false,
        in_loop: false,
    };

    fn function() -> Self {
        Self {
            in_function: true,
            in_loop: false,
        }
    }

    fn in_loop(self) -> Self {
        Self {
            in_loop: true,
            ..self
        }
    }
}

#[derive(Eq, PartialEq, Debug)]
pub struct Statement {
    span: SrcSpan,
    kind: StatementKind,
}

impl Statement {
    pub fn new(span: SrcSpan, kind: StatementKind) -> Self {
        Self { span, kind }
    }

    pub fn span(&self) -> SrcSpan {
        self.span
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub fn last_line(&self) -> usize {
        self.kind
            .bodies()
            .into_iter()
            .filter_map(Body::last_line)
            .max()
            .unwrap_or(self.span.line())
            .max(self.span.line())
    }

    fn assemble(
        block: ParsedBlock,
        rest: &mut Peekable<vec::IntoIter<ParsedBlock>>,
        context: Context,
    ) -> Result<Self, ParseError> {
        let ParsedBlock {
            span,
            line,
            children,
        } = block;
        let line_number = span.line();

        let kind = match line {
            Line::Simple(kind) => {
                if !children.is_empty() {
                    return Err(ParseError::invalid(line_number, "unexpected indented block"));
                }

                kind.check(line_number, context)?;
                kind
            }
            Line::Compound(header, inline) => {
                let clause = Clause {
                    span,
                    inline,
                    children,
                };

                match header {
                    Header::If(condition) => {
                        let mut branches = vec![Branch {
                            condition,
                            body: clause.body(context)?,
                        }];

                        while let Some((Header::Elif(condition), clause)) =
                            next_clause(rest, |h| matches!(h, Header::Elif(_)))
                        {
                            branches.push(Branch {
                                condition,
                                body: clause.body(context)?,
                            });
                        }

                        let else_block = else_clause(rest, context)?;

                        StatementKind::If {
                            branches,
                            else_block,
                        }
                    }
                    Header::While(condition) => StatementKind::While {
                        condition,
                        body: clause.body(context.in_loop())?,
                    },
                    Header::For { variable, iterable } => StatementKind::For {
                        variable,
                        iterable,
                        body: clause.body(context.in_loop())?,
                    },
                    Header::Try => {
                        let body = clause.body(context)?;
                        let mut handlers = Vec::new();

                        while let Some((Header::Except(pattern), clause)) =
                            next_clause(rest, |h| matches!(h, Header::Except(_)))
                        {
                            handlers.push(ExceptHandler {
                                span: clause.span,
                                pattern,
                                body: clause.body(context)?,
                            });
                        }

                        if handlers.is_empty() {
                            return Err(ParseError::invalid(
                                line_number,
                                "expected 'except' after 'try' block",
                            ));
                        }

                        StatementKind::Try {
                            body,
                            handlers,
                            else_block: else_clause(rest, context)?,
                        }
                    }
                    Header::Def { name, params } => {
                        check_params(line_number, &params)?;

                        StatementKind::FunctionDef(Rc::new(FunctionDef {
                            name,
                            params,
                            body: clause.body(Context::function())?,
                        }))
                    }
                    Header::Class { name, base } => StatementKind::ClassDef(ClassDef {
                        name,
                        base,
                        body: clause.body(Context::MODULE)?,
                    }),
                    Header::Elif(_) => {
                        return Err(ParseError::invalid(line_number, "'elif' without 'if'"))
                    }
                    Header::Else => {
                        return Err(ParseError::invalid(
                            line_number,
                            "'else' without 'if' or 'try'",
                        ))
                    }
                    Header::Except(_) => {
                        return Err(ParseError::invalid(line_number, "'except' without 'try'"))
                    }
                }
            }
        };

        Ok(Self { span, kind })
    }
}

#[derive(Eq, PartialEq, Debug)]
pub enum StatementKind {
    Pass,
    Break,
    Continue,
    Expression(Expression),
    Assign {
        target: Target,
        value: Expression,
    },
    AugmentedAssign {
        target: Target,
        op: BinaryOp,
        value: Expression,
    },
    Return(Option<Expression>),
    Import {
        modules: Vec<String>,
    },
    FromImport {
        module: String,
        names: Vec<String>,
    },
    If {
        branches: Vec<Branch>,
        else_block: Option<Body>,
    },
    While {
        condition: Expression,
        body: Body,
    },
    For {
        variable: String,
        iterable: Expression,
        body: Body,
    },
    Try {
        body: Body,
        handlers: Vec<ExceptHandler>,
        else_block: Option<Body>,
    },
    FunctionDef(Rc<FunctionDef>),
    ClassDef(ClassDef),
}

impl StatementKind {
    /// Nested bodies, in source order.
    pub fn bodies(&self) -> Vec<&Body> {
        match self {
            Self::If {
                branches,
                else_block,
            } => branches
                .iter()
                .map(|branch| &branch.body)
                .chain(else_block)
                .collect(),
            Self::While { body, .. } | Self::For { body, .. } => vec![body],
            Self::Try {
                body,
                handlers,
                else_block,
            } => [body]
                .into_iter()
                .chain(handlers.iter().map(|handler| &handler.body))
                .chain(else_block)
                .collect(),
            Self::FunctionDef(function) => vec![&function.body],
            Self::ClassDef(class) => vec![&class.body],
            Self::Pass
            | Self::Break
            | Self::Continue
            | Self::Expression(_)
            | Self::Assign { .. }
            | Self::AugmentedAssign { .. }
            | Self::Return(_)
            | Self::Import { .. }
            | Self::FromImport { .. } => Vec::new(),
        }
    }

    fn parse_simple(input: Span) -> ParseResult<Self> {
        context(
            "statement",
            alt((
                pass.map(|_| Self::Pass),
                r#break.map(|_| Self::Break),
                r#continue.map(|_| Self::Continue),
                preceded(r#return, opt(ws(Expression::parse))).map(Self::Return),
                Self::parse_import,
                Self::parse_from_import,
                Self::parse_assign,
                Self::parse_augmented_assign,
                map(Expression::parse, Self::Expression),
            )),
        )(input)
    }

    fn parse_import(input: Span) -> ParseResult<Self> {
        preceded(
            import,
            ws(separated_list1(ws(char(',')), dotted_name)),
        )
        .map(|modules| Self::Import { modules })
        .parse(input)
    }

    fn parse_from_import(input: Span) -> ParseResult<Self> {
        tuple((
            from,
            ws(dotted_name),
            import,
            ws(alt((
                char('*').map(|_| vec!["*".to_owned()]),
                separated_list1(ws(char(',')), identifier),
            ))),
        ))
        .map(|(_from, module, _import, names)| Self::FromImport { module, names })
        .parse(input)
    }

    fn parse_assign(input: Span) -> ParseResult<Self> {
        let (input, target) = Target::parse(input)?;
        let (input, _) = ws(terminated(char('='), not(char('=')))).parse(input)?;
        let (input, value) = Expression::parse(input)?;

        Ok((input, Self::Assign { target, value }))
    }

    fn parse_augmented_assign(input: Span) -> ParseResult<Self> {
        let (input, target) = Target::parse(input)?;
        let (input, op) = ws(alt((
            value(BinaryOp::Add, tag("+=")),
            value(BinaryOp::Sub, tag("-=")),
            value(BinaryOp::Mul, tag("*=")),
        )))
        .parse(input)?;
        let (input, value) = Expression::parse(input)?;

        Ok((input, Self::AugmentedAssign { target, op, value }))
    }

    fn check(&self, line: usize, context: Context) -> Result<(), ParseError> {
        match self {
            Self::Return(_) if !context.in_function => {
                Err(ParseError::invalid(line, "'return' outside function"))
            }
            Self::Break if !context.in_loop => Err(ParseError::invalid(line, "'break' outside loop")),
            Self::Continue if !context.in_loop => {
                Err(ParseError::invalid(line, "'continue' not properly in loop"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Eq, PartialEq, Debug)]
pub struct Branch {
    pub condition: Expression,
    pub body: Body,
}

#[derive(Eq, PartialEq, Debug)]
pub struct ExceptHandler {
    span: SrcSpan,
    pattern: ExceptPattern,
    body: Body,
}

impl ExceptHandler {
    pub fn span(&self) -> SrcSpan {
        self.span
    }

    pub fn pattern(&self) -> &ExceptPattern {
        &self.pattern
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

/// `except [Exception [as binding]]`
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct ExceptPattern {
    pub exception: Option<String>,
    pub binding: Option<String>,
}

impl ExceptPattern {
    fn parse(input: Span) -> ParseResult<Self> {
        opt(pair(ws(identifier), opt(preceded(r#as, ws(identifier)))))
            .map(|pattern| match pattern {
                Some((exception, binding)) => Self {
                    exception: Some(exception),
                    binding,
                },
                None => Self::default(),
            })
            .parse(input)
    }
}

#[derive(Eq, PartialEq, Debug)]
pub struct FunctionDef {
    name: String,
    params: Vec<Param>,
    body: Body,
}

impl FunctionDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

#[derive(Eq, PartialEq, Debug)]
pub struct Param {
    name: String,
    default: Option<Expression>,
}

impl Param {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Expression> {
        self.default.as_ref()
    }

    fn parse(input: Span) -> ParseResult<Self> {
        pair(identifier, opt(preceded(ws(char('=')), Expression::parse)))
            .map(|(name, default)| Self { name, default })
            .parse(input)
    }

    fn parse_list(input: Span) -> ParseResult<Vec<Self>> {
        delimited(
            char('('),
            ws(separated_list0(ws(char(',')), Self::parse)),
            pair(opt(ws(char(','))), char(')')),
        )(input)
    }
}

fn check_params(line: usize, params: &[Param]) -> Result<(), ParseError> {
    let mut seen_default = false;

    for (index, param) in params.iter().enumerate() {
        if params[..index].iter().any(|p| p.name == param.name) {
            return Err(ParseError::invalid(
                line,
                format!("duplicate argument '{}' in function definition", param.name),
            ));
        }

        match param.default {
            Some(_) => seen_default = true,
            None if seen_default => {
                return Err(ParseError::invalid(
                    line,
                    "non-default argument follows default argument",
                ))
            }
            None => (),
        }
    }

    Ok(())
}

#[derive(Eq, PartialEq, Debug)]
pub struct ClassDef {
    name: String,
    base: Option<Expression>,
    body: Body,
}

impl ClassDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Expression> {
        self.base.as_ref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

/// The left hand side of an assignment.
#[derive(Eq, PartialEq, Debug)]
pub enum Target {
    Name(String),
    Attribute { object: Expression, name: String },
}

impl Target {
    fn parse(input: Span) -> ParseResult<Self> {
        map_opt(expression::postfix, |expr| match expr {
            Expression::Variable { name } => Some(Self::Name(name)),
            Expression::Attribute { object, name } => Some(Self::Attribute {
                object: *object,
                name,
            }),
            _ => None,
        })(input)
    }
}

/// One logical line, parsed but not yet attached to its block.
struct ParsedBlock {
    span: SrcSpan,
    line: Line,
    children: Vec<Block>,
}

impl ParsedBlock {
    fn parse(block: Block) -> Result<Self, ParseError> {
        let Block { line, children } = block;

        Ok(Self {
            span: SrcSpan::from_line(&line),
            line: parse_line(&line)?,
            children,
        })
    }

    fn into_clause(self) -> Option<(Header, Clause)> {
        match self.line {
            Line::Compound(header, inline) => Some((
                header,
                Clause {
                    span: self.span,
                    inline,
                    children: self.children,
                },
            )),
            Line::Simple(_) => None,
        }
    }
}

/// A header's body: either a statement on the same line, or an indented
/// block.
struct Clause {
    span: SrcSpan,
    inline: Option<StatementKind>,
    children: Vec<Block>,
}

impl Clause {
    fn body(self, context: Context) -> Result<Body, ParseError> {
        match self.inline {
            Some(kind) => {
                kind.check(self.span.line(), context)?;
                Ok(Body(vec![Statement::new(self.span, kind)]))
            }
            None => Body::assemble(self.children, context),
        }
    }
}

fn next_clause(
    rest: &mut Peekable<vec::IntoIter<ParsedBlock>>,
    select: fn(&Header) -> bool,
) -> Option<(Header, Clause)> {
    rest.next_if(|block| matches!(&block.line, Line::Compound(header, _) if select(header)))
        .and_then(ParsedBlock::into_clause)
}

fn else_clause(
    rest: &mut Peekable<vec::IntoIter<ParsedBlock>>,
    context: Context,
) -> Result<Option<Body>, ParseError> {
    next_clause(rest, |h| matches!(h, Header::Else))
        .map(|(_else, clause)| clause.body(context))
        .transpose()
}

enum Line {
    Simple(StatementKind),
    Compound(Header, Option<StatementKind>),
}

impl Line {
    fn parse(input: Span) -> ParseResult<Self> {
        alt((
            tuple((Header::parse, colon, opt(StatementKind::parse_simple)))
                .map(|(header, _colon, inline)| Self::Compound(header, inline)),
            map(StatementKind::parse_simple, Self::Simple),
        ))(input)
    }
}

fn parse_line(line: &LogicalLine) -> Result<Line, ParseError> {
    match all_consuming(terminated(Line::parse, space0))
        .parse(Span::new(&line.code))
        .finish()
    {
        Ok((_, parsed)) => Ok(parsed),
        Err(e) => Err(ParseError::Syntax {
            line: line.number,
            details: convert_error(line.code.as_str(), e),
        }),
    }
}

enum Header {
    If(Expression),
    Elif(Expression),
    Else,
    While(Expression),
    For {
        variable: String,
        iterable: Expression,
    },
    Try,
    Except(ExceptPattern),
    Def {
        name: String,
        params: Vec<Param>,
    },
    Class {
        name: String,
        base: Option<Expression>,
    },
}

impl Header {
    fn parse(input: Span) -> ParseResult<Self> {
        context(
            "block header",
            alt((
                preceded(r#if, ws(Expression::parse)).map(Self::If),
                preceded(elif, ws(Expression::parse)).map(Self::Elif),
                r#else.map(|_| Self::Else),
                preceded(r#while, ws(Expression::parse)).map(Self::While),
                tuple((r#for, ws(identifier), r#in, ws(Expression::parse))).map(
                    |(_for, variable, _in, iterable)| Self::For { variable, iterable },
                ),
                r#try.map(|_| Self::Try),
                preceded(except, ExceptPattern::parse).map(Self::Except),
                tuple((def, ws(identifier), Param::parse_list))
                    .map(|(_def, name, params)| Self::Def { name, params }),
                tuple((
                    class,
                    ws(identifier),
                    opt(delimited(
                        pair(char('('), space0),
                        opt(Expression::parse),
                        pair(space0, char(')')),
                    )),
                ))
                .map(|(_class, name, base)| Self::Class {
                    name,
                    base: base.flatten(),
                }),
            )),
        )(input)
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: syntax error:\n{details}")]
    Syntax { line: usize, details: String },
    #[error("line {line}: {kind}\n{text}")]
    Indentation {
        line: usize,
        kind: DiagnosticKind,
        text: String,
    },
    #[error("line {line}: expected an indented block")]
    ExpectedIndent { line: usize },
    #[error("line {line}: {message}")]
    Invalid { line: usize, message: String },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. }
            | Self::Indentation { line, .. }
            | Self::ExpectedIndent { line }
            | Self::Invalid { line, .. } => *line,
        }
    }

    fn invalid(line: usize, message: impl Into<String>) -> Self {
        Self::Invalid {
            line,
            message: message.into(),
        }
    }
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "break", "class", "continue", "def", "elif", "else",
    "except", "for", "from", "if", "import", "in", "is", "not", "or", "pass", "return", "try",
    "while",
];

fn identifier(input: Span) -> ParseResult<String> {
    context(
        "identifier",
        verify(
            recognize(pair(
                alt((alpha1, tag("_"))),
                many0(alt((alphanumeric1, tag("_")))),
            )),
            |name: &Span| !KEYWORDS.contains(name.fragment()),
        ),
    )
    .map(|name: Span| name.fragment().to_string())
    .parse(input)
}

fn dotted_name(input: Span) -> ParseResult<String> {
    recognize(separated_list1(char('.'), identifier))
        .map(|name: Span| name.fragment().to_string())
        .parse(input)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ws<'a, F, O>(inner: F) -> impl Parser<'a, O>
where
    F: Parser<'a, O>,
{
    delimited(space0, inner, space0)
}

macro_rules! keywords {
    ($($kw:ident $(($kw_text:literal))?),*) => {
        $(
            keyword!($kw $( ($kw_text) )?);
        )*
    };
}

macro_rules! keyword {
    ($kw:ident) => {
        keyword!($kw(stringify!($kw)));
    };
    ($kw:ident($kw_text:expr)) => {
        fn $kw(input: Span) -> ParseResult<Span> {
            terminated(tag($kw_text), not(satisfy(is_identifier_char))).parse(input)
        }
    };
}

keywords!(
    def,
    class,
    pass,
    elif,
    except,
    import,
    from,
    and,
    or,
    is,
    not_("not"),
    r#if("if"),
    r#else("else"),
    r#while("while"),
    r#for("for"),
    r#in("in"),
    r#try("try"),
    r#as("as"),
    r#break("break"),
    r#continue("continue"),
    r#return("return"),
    r#true("True"),
    r#false("False"),
    none("None")
);

macro_rules! operators {
    ($(($name:ident, $op:expr)),*) => {
        $(
            fn $name(input: Span) -> ParseResult<()> {
                ws(value((), tag($op))).parse(input)
            }
        )*
    }
}

operators!((colon, ":"));

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SrcSpan {
    line: usize,
    column: usize,
}

impl SrcSpan {
    pub fn from_line(line: &LogicalLine) -> Self {
        Self {
            line: line.number,
            column: line.indent + 1,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based column of the first character of code.
    pub fn column(&self) -> usize {
        self.column
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use indoc::indoc;

    use super::{
        parse, Argument, Body, Branch, Expression, FunctionDef, Literal, Param, ParseError,
        SrcSpan, Statement, StatementKind, Target,
    };
    use crate::layout::IndentationPolicy;

    #[test]
    fn pass_statement() {
        parse_body(indoc! {"
            pass
        "}, [StatementKind::Pass]);
    }

    #[test]
    fn assignment() {
        parse_body(
            indoc! {"
                x = 1
            "},
            [StatementKind::Assign {
                target: Target::Name("x".to_owned()),
                value: int(1),
            }],
        );
    }

    #[test]
    fn deeply_parenthesized_assignment() {
        let depth = 300;

        parse_body(
            &format!("x = {}1{}\n", "(".repeat(depth), ")".repeat(depth)),
            [StatementKind::Assign {
                target: Target::Name("x".to_owned()),
                value: int(1),
            }],
        );
    }

    #[test]
    fn attribute_assignment() {
        parse_body(
            indoc! {"
                self.a = b
            "},
            [StatementKind::Assign {
                target: Target::Attribute {
                    object: variable("self"),
                    name: "a".to_owned(),
                },
                value: variable("b"),
            }],
        );
    }

    #[test]
    fn comparison_is_not_assignment() {
        parse_body(
            indoc! {"
                x == 1
            "},
            [StatementKind::Expression(Expression::Compare {
                op: super::CompareOp::Eq,
                lhs: Box::new(variable("x")),
                rhs: Box::new(int(1)),
            })],
        );
    }

    #[test]
    fn keyword_prefix_is_identifier() {
        parse_body(
            indoc! {"
                passed = iffy
            "},
            [StatementKind::Assign {
                target: Target::Name("passed".to_owned()),
                value: variable("iffy"),
            }],
        );
    }

    #[test]
    fn if_elif_else() {
        let module = parse(
            indoc! {"
                if a:
                    pass
                elif b:
                    pass
                else:
                    pass
            "},
            IndentationPolicy::Strict,
        )
        .unwrap();
        let statements: Vec<_> = module.body().iter().collect();

        assert_eq!(statements.len(), 1);
        let StatementKind::If {
            branches,
            else_block,
        } = statements[0].kind()
        else {
            panic!("Expected an if statement");
        };
        assert_eq!(
            branches
                .iter()
                .map(|Branch { condition, .. }| condition.clone())
                .collect::<Vec<_>>(),
            [variable("a"), variable("b")]
        );
        assert!(else_block.is_some());
        assert_eq!(statements[0].last_line(), 6);
    }

    #[test]
    fn inline_body() {
        let module = parse("while x: pass\n", IndentationPolicy::Strict).unwrap();
        let statement = module.body().iter().next().unwrap();

        assert_eq!(
            statement.kind(),
            &StatementKind::While {
                condition: variable("x"),
                body: Body::new([Statement::new(src_span(1, 1), StatementKind::Pass)]),
            }
        );
    }

    #[test]
    fn function_with_default() {
        parse_body(
            indoc! {"
                def f(x, y=1):
                    return x
            "},
            [StatementKind::FunctionDef(Rc::new(FunctionDef {
                name: "f".to_owned(),
                params: vec![
                    Param {
                        name: "x".to_owned(),
                        default: None,
                    },
                    Param {
                        name: "y".to_owned(),
                        default: Some(int(1)),
                    },
                ],
                body: Body::new([Statement::new(
                    src_span(2, 5),
                    StatementKind::Return(Some(variable("x"))),
                )]),
            }))],
        );
    }

    #[test]
    fn call_with_keyword_argument() {
        parse_body(
            indoc! {"
                f(1, name='x')
            "},
            [StatementKind::Expression(Expression::Call {
                callee: Box::new(variable("f")),
                args: vec![
                    Argument::Positional(int(1)),
                    Argument::Keyword {
                        name: "name".to_owned(),
                        value: Expression::Literal(Literal::String("x".to_owned())),
                    },
                ],
            })],
        );
    }

    #[test]
    fn imports() {
        parse_body(
            indoc! {"
                import os, os.path
                from microbit import *
            "},
            [
                StatementKind::Import {
                    modules: vec!["os".to_owned(), "os.path".to_owned()],
                },
                StatementKind::FromImport {
                    module: "microbit".to_owned(),
                    names: vec!["*".to_owned()],
                },
            ],
        );
    }

    #[test]
    fn try_needs_except() {
        let result = parse("try:\n    pass\nx = 1\n", IndentationPolicy::Strict);

        assert!(matches!(result, Err(ParseError::Invalid { line: 1, .. })));
    }

    #[test]
    fn orphan_else() {
        let result = parse("x = 1\nelse:\n    pass\n", IndentationPolicy::Strict);

        assert!(matches!(result, Err(ParseError::Invalid { line: 2, .. })));
    }

    #[test]
    fn return_outside_function() {
        let result = parse("return 1\n", IndentationPolicy::Strict);

        assert!(matches!(result, Err(ParseError::Invalid { line: 1, .. })));
    }

    #[test]
    fn break_inside_if_inside_loop() {
        let result = parse(
            indoc! {"
                while True:
                    if x:
                        break
            "},
            IndentationPolicy::Strict,
        );

        assert!(result.is_ok());
    }

    #[test]
    fn break_inside_function_inside_loop() {
        let result = parse(
            indoc! {"
                while True:
                    def f():
                        break
            "},
            IndentationPolicy::Strict,
        );

        assert!(matches!(result, Err(ParseError::Invalid { line: 3, .. })));
    }

    #[test]
    fn non_default_after_default() {
        let result = parse("def f(a=1, b):\n    pass\n", IndentationPolicy::Strict);

        assert!(matches!(result, Err(ParseError::Invalid { line: 1, .. })));
    }

    #[test]
    fn syntax_error_line() {
        let result = parse("x = 1\ny = (\n", IndentationPolicy::Strict);

        assert!(matches!(result, Err(ParseError::Syntax { line: 2, .. })));
    }

    fn parse_body<const COUNT: usize>(input: &str, body: [StatementKind; COUNT]) {
        let module = parse(input, IndentationPolicy::Strict).unwrap();
        let kinds: Vec<_> = module.body().iter().map(Statement::kind).collect();

        assert_eq!(kinds, body.iter().collect::<Vec<_>>());
    }

    fn variable(name: &str) -> Expression {
        Expression::Variable {
            name: name.to_owned(),
        }
    }

    fn int(value: i64) -> Expression {
        Expression::Literal(Literal::Int(value))
    }

    fn src_span(line: usize, column: usize) -> SrcSpan {
        SrcSpan { line, column }
    }
}
