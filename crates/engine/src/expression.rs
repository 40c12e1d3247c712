//! The expression boundary: values, the evaluation focus, and the small
//! path language used in `select` and `test` attributes.
//!
//! Anything the path language cannot say is supplied as a closure through
//! [`from_fn`]; the executor only ever sees the [`Expression`] trait.
use crate::error::{CompileError, ExecutionError};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, opt, recognize, value},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use stylus_names::{NamePool, NamespaceResolver, standard};
use stylus_tree::{Axis, NodeKind, NodeRef, NodeTest, sort_in_document_order};

/// The context an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Focus<'d> {
    pub node: NodeRef<'d>,
    /// One-based position of `node` in the sequence being processed.
    pub position: usize,
    pub size: usize,
}

impl<'d> Focus<'d> {
    /// A focus on a single node.
    pub fn new(node: NodeRef<'d>) -> Self {
        Focus {
            node,
            position: 1,
            size: 1,
        }
    }
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'d> {
    /// Nodes in document order, without duplicates.
    Nodes(Vec<NodeRef<'d>>),
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl<'d> Value<'d> {
    pub fn empty() -> Self {
        Value::Nodes(Vec::new())
    }

    /// The string value: for nodes, that of the first node.
    pub fn string_value(&self) -> String {
        match self {
            Value::Nodes(nodes) => nodes.first().map(|n| n.string_value()).unwrap_or_default(),
            Value::Text(text) => text.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Text(text) => !text.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            other => other.string_value().trim().parse().unwrap_or(f64::NAN),
        }
    }

    pub fn into_nodes(self) -> Result<Vec<NodeRef<'d>>, ExecutionError> {
        match self {
            Value::Nodes(nodes) => Ok(nodes),
            other => Err(ExecutionError::type_error(format!(
                "expected a node-set, found {}",
                other.type_name()
            ))),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Nodes(_) => "a node-set",
            Value::Text(_) => "a string",
            Value::Number(_) => "a number",
            Value::Boolean(_) => "a boolean",
        }
    }
}

/// Integral values print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Where a variable's value lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableRef {
    /// A slot in the current local frame.
    Local(usize),
    /// A stylesheet-level variable or parameter.
    Global(usize),
}

/// Read access to variable values during evaluation.
pub trait Variables<'d> {
    fn value(&mut self, variable: VariableRef) -> Result<Value<'d>, ExecutionError>;
}

/// The variables in scope at the point an expression is compiled.
pub trait VariableScope {
    fn resolve(&self, name: &str) -> Option<VariableRef>;
}

pub trait Expression: fmt::Debug + Send + Sync {
    fn evaluate<'d>(
        &self,
        focus: &Focus<'d>,
        variables: &mut dyn Variables<'d>,
    ) -> Result<Value<'d>, ExecutionError>;

    /// Binds variable references to slots. `None` means the expression has
    /// nothing to bind and can be used as it is.
    fn bind(&self, _scope: &dyn VariableScope) -> Result<Option<Expr>, CompileError> {
        Ok(None)
    }
}

pub type Expr = Arc<dyn Expression>;

type ExpressionFn = dyn for<'d> Fn(&Focus<'d>) -> Result<Value<'d>, ExecutionError> + Send + Sync;

/// An expression backed by a closure over the focus.
pub struct FnExpression {
    description: String,
    f: Box<ExpressionFn>,
}

impl fmt::Debug for FnExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnExpression").field(&self.description).finish()
    }
}

impl Expression for FnExpression {
    fn evaluate<'d>(&self, focus: &Focus<'d>, _: &mut dyn Variables<'d>) -> Result<Value<'d>, ExecutionError> {
        (self.f)(focus)
    }
}

pub fn from_fn<F>(description: &str, f: F) -> Expr
where
    F: for<'d> Fn(&Focus<'d>) -> Result<Value<'d>, ExecutionError> + Send + Sync + 'static,
{
    Arc::new(FnExpression {
        description: description.to_string(),
        f: Box::new(f),
    })
}

/// A string literal expression.
pub fn literal(text: &str) -> Expr {
    Arc::new(PathExpression {
        text: Arc::from(format!("'{}'", text)),
        terms: vec![Term::Literal(text.to_string())],
    })
}

// --- Path expressions ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum Positional {
    Index(usize),
    Last,
}

impl Positional {
    fn filter<'d>(self, nodes: Vec<NodeRef<'d>>) -> Vec<NodeRef<'d>> {
        match self {
            Positional::Index(n) => n
                .checked_sub(1)
                .and_then(|i| nodes.get(i).copied())
                .into_iter()
                .collect(),
            Positional::Last => nodes.last().copied().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Positional>,
}

impl Step {
    /// Appends the nodes this step reaches from `origin`, in axis order.
    /// A leading positional predicate stops the axis early.
    fn select<'d>(&self, origin: &NodeRef<'d>, out: &mut Vec<NodeRef<'d>>) {
        let mut nodes = origin.axis(self.axis, self.test.clone());
        let Some((first, rest)) = self.predicates.split_first() else {
            out.extend(nodes);
            return;
        };
        let mut selected: Vec<NodeRef<'d>> = match first {
            Positional::Index(n) => n.checked_sub(1).and_then(|i| nodes.nth(i)).into_iter().collect(),
            Positional::Last => nodes.last().into_iter().collect(),
        };
        for predicate in rest {
            selected = predicate.filter(selected);
        }
        out.extend(selected);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Variable {
    name: String,
    slot: Option<VariableRef>,
}

impl Variable {
    fn value<'d>(&self, variables: &mut dyn Variables<'d>) -> Result<Value<'d>, ExecutionError> {
        match self.slot {
            Some(slot) => variables.value(slot),
            None => Err(ExecutionError::type_error(format!(
                "variable ${} was never bound",
                self.name
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Start {
    Context,
    Root,
    Variable(Variable),
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Literal(String),
    Number(f64),
    Path { start: Start, steps: Vec<Step> },
}

impl Term {
    fn evaluate<'d>(&self, focus: &Focus<'d>, variables: &mut dyn Variables<'d>) -> Result<Value<'d>, ExecutionError> {
        let (start, steps) = match self {
            Term::Literal(text) => return Ok(Value::Text(text.clone())),
            Term::Number(n) => return Ok(Value::Number(*n)),
            Term::Path { start, steps } => (start, steps),
        };
        let mut nodes = match start {
            Start::Context => vec![focus.node],
            Start::Root => vec![focus.node.root()],
            Start::Variable(var) => {
                let value = var.value(variables)?;
                if steps.is_empty() {
                    return Ok(value);
                }
                value.into_nodes()?
            }
        };
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                step.select(node, &mut next);
            }
            if next.len() > 1 {
                sort_in_document_order(&mut next);
            }
            nodes = next;
        }
        Ok(Value::Nodes(nodes))
    }
}

/// A compiled path expression: literals, numbers, variable references and
/// location paths, optionally combined with `|`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    text: Arc<str>,
    terms: Vec<Term>,
}

impl PathExpression {
    /// Parses `text`, resolving name-test prefixes through `resolver`.
    pub fn parse(
        text: &str,
        pool: &NamePool,
        resolver: &dyn NamespaceResolver,
    ) -> Result<PathExpression, CompileError> {
        let raw = match union(text.trim()) {
            Ok(("", raw)) => raw,
            Ok((rest, _)) => {
                return Err(CompileError::expression(text, format!("unexpected input '{}'", rest)));
            }
            Err(e) => return Err(CompileError::expression(text, e.to_string())),
        };
        let resolver = Resolver { pool, resolver, text };
        let terms = raw
            .into_iter()
            .map(|term| resolver.term(term))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PathExpression {
            text: Arc::from(text.trim()),
            terms,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The names of the variables this expression refers to.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|term| match term {
            Term::Path {
                start: Start::Variable(var),
                ..
            } => Some(var.name.as_str()),
            _ => None,
        })
    }
}

impl Expression for PathExpression {
    fn evaluate<'d>(&self, focus: &Focus<'d>, variables: &mut dyn Variables<'d>) -> Result<Value<'d>, ExecutionError> {
        if let [term] = self.terms.as_slice() {
            return term.evaluate(focus, variables);
        }
        let mut nodes = Vec::new();
        for term in &self.terms {
            nodes.extend(term.evaluate(focus, variables)?.into_nodes()?);
        }
        sort_in_document_order(&mut nodes);
        Ok(Value::Nodes(nodes))
    }

    fn bind(&self, scope: &dyn VariableScope) -> Result<Option<Expr>, CompileError> {
        if self.variable_names().next().is_none() {
            return Ok(None);
        }
        let mut bound = self.clone();
        for term in &mut bound.terms {
            if let Term::Path {
                start: Start::Variable(var),
                ..
            } = term
            {
                var.slot = Some(
                    scope
                        .resolve(&var.name)
                        .ok_or_else(|| CompileError::UndeclaredVariable(var.name.clone()))?,
                );
            }
        }
        Ok(Some(Arc::new(bound)))
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// --- Name resolution ---

struct Resolver<'a> {
    pool: &'a NamePool,
    resolver: &'a dyn NamespaceResolver,
    text: &'a str,
}

impl Resolver<'_> {
    fn term(&self, raw: RawTerm<'_>) -> Result<Term, CompileError> {
        Ok(match raw {
            RawTerm::Literal(text) => Term::Literal(text.to_string()),
            RawTerm::Number(n) => Term::Number(n),
            RawTerm::Path { start, steps } => Term::Path {
                start: match start {
                    RawStart::Context => Start::Context,
                    RawStart::Root => Start::Root,
                    RawStart::Variable(name) => Start::Variable(Variable {
                        name: name.to_string(),
                        slot: None,
                    }),
                },
                steps: steps
                    .into_iter()
                    .map(|step| self.step(step))
                    .collect::<Result<Vec<_>, _>>()?,
            },
        })
    }

    fn step(&self, raw: RawStep<'_>) -> Result<Step, CompileError> {
        let axis = match raw.axis {
            RawAxis::Default => Axis::Child,
            RawAxis::Attribute => Axis::Attribute,
            RawAxis::Named(name) => Axis::from_str(name)
                .map_err(|e| CompileError::expression(self.text, e.to_string()))?,
        };
        Ok(Step {
            axis,
            test: self.test(axis.principal_node_kind(), raw.test)?,
            predicates: raw.predicates,
        })
    }

    fn test(&self, principal: NodeKind, raw: RawTest<'_>) -> Result<NodeTest, CompileError> {
        Ok(match raw {
            RawTest::Any => NodeTest::Kind(principal),
            RawTest::Node => NodeTest::AnyNode,
            RawTest::Text => NodeTest::Kind(NodeKind::Text),
            RawTest::Comment => NodeTest::Kind(NodeKind::Comment),
            RawTest::ProcessingInstruction(None) => NodeTest::Kind(NodeKind::ProcessingInstruction),
            RawTest::ProcessingInstruction(Some(target)) => NodeTest::Name(
                NodeKind::ProcessingInstruction,
                self.pool.allocate("", "", target)?.fingerprint(),
            ),
            RawTest::LocalWildcard(local) => NodeTest::Local(principal, Arc::from(local)),
            RawTest::NamespaceWildcard(prefix) => {
                let uri = match prefix {
                    "xml" => standard::XML.to_string(),
                    p => self
                        .resolver
                        .resolve_prefix(p)
                        .ok_or_else(|| stylus_names::NamePoolError::UndeclaredPrefix(p.to_string()))?,
                };
                NodeTest::Namespace(principal, self.pool.allocate_uri(&uri)?)
            }
            RawTest::Name(qname) => NodeTest::Name(
                principal,
                self.pool
                    .allocate_lexical(qname, self.resolver, false)?
                    .fingerprint(),
            ),
        })
    }
}

// --- Parser ---

#[derive(Debug, Clone, PartialEq)]
enum RawTest<'a> {
    Any,
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<&'a str>),
    NamespaceWildcard(&'a str),
    LocalWildcard(&'a str),
    Name(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
enum RawAxis<'a> {
    Default,
    Attribute,
    Named(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
struct RawStep<'a> {
    axis: RawAxis<'a>,
    test: RawTest<'a>,
    predicates: Vec<Positional>,
}

impl RawStep<'_> {
    fn along(axis: &'static str) -> Self {
        RawStep {
            axis: RawAxis::Named(axis),
            test: RawTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RawStart<'a> {
    Context,
    Root,
    Variable(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
enum RawTerm<'a> {
    Literal(&'a str),
    Number(f64),
    Path { start: RawStart<'a>, steps: Vec<RawStep<'a>> },
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn union(input: &str) -> IResult<&str, Vec<RawTerm<'_>>> {
    separated_list1(ws(char('|')), ws(term)).parse(input)
}

fn term(input: &str) -> IResult<&str, RawTerm<'_>> {
    alt((map(string_literal, RawTerm::Literal), number, path)).parse(input)
}

fn number(input: &str) -> IResult<&str, RawTerm<'_>> {
    map_res(recognize(pair(digit1, opt(pair(char('.'), digit1)))), |digits: &str| {
        digits.parse::<f64>().map(RawTerm::Number)
    })
    .parse(input)
}

fn path(input: &str) -> IResult<&str, RawTerm<'_>> {
    alt((
        map(pair(preceded(char('$'), q_name), opt(continuation)), |(name, steps)| RawTerm::Path {
            start: RawStart::Variable(name),
            steps: steps.unwrap_or_default(),
        }),
        map(preceded(tag("//"), relative_path), |steps| RawTerm::Path {
            start: RawStart::Root,
            steps: std::iter::once(RawStep::along("descendant-or-self")).chain(steps).collect(),
        }),
        map(preceded(char('/'), opt(relative_path)), |steps| RawTerm::Path {
            start: RawStart::Root,
            steps: steps.unwrap_or_default(),
        }),
        map(relative_path, |steps| RawTerm::Path {
            start: RawStart::Context,
            steps,
        }),
    ))
    .parse(input)
}

/// `/step` or `//step` pairs; `//` expands to a descendant-or-self step.
fn connected(pairs: Vec<(bool, RawStep<'_>)>) -> Vec<RawStep<'_>> {
    let mut steps = Vec::with_capacity(pairs.len());
    for (descendant, step) in pairs {
        if descendant {
            steps.push(RawStep::along("descendant-or-self"));
        }
        steps.push(step);
    }
    steps
}

fn continuation(input: &str) -> IResult<&str, Vec<RawStep<'_>>> {
    map(many1(pair(connector, step)), connected).parse(input)
}

fn relative_path(input: &str) -> IResult<&str, Vec<RawStep<'_>>> {
    let (input, first) = step(input)?;
    let (input, rest) = many0(pair(connector, step)).parse(input)?;
    let mut steps = vec![first];
    steps.extend(connected(rest));
    Ok((input, steps))
}

/// True for `//`.
fn connector(input: &str) -> IResult<&str, bool> {
    alt((value(true, tag("//")), value(false, char('/')))).parse(input)
}

fn step(input: &str) -> IResult<&str, RawStep<'_>> {
    alt((
        value(RawStep::along("parent"), tag("..")),
        value(RawStep::along("self"), char('.')),
        axis_step,
    ))
    .parse(input)
}

fn axis_step(input: &str) -> IResult<&str, RawStep<'_>> {
    let (input, axis) = alt((
        value(RawAxis::Attribute, char('@')),
        map(opt(terminated(axis_name, tag("::"))), |axis| {
            axis.map_or(RawAxis::Default, RawAxis::Named)
        }),
    ))
    .parse(input)?;
    let (input, test) = node_test(input)?;
    let (input, predicates) = many0(predicate).parse(input)?;
    Ok((input, RawStep { axis, test, predicates }))
}

fn axis_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_lowercase() || c == '-').parse(input)
}

fn node_test(input: &str) -> IResult<&str, RawTest<'_>> {
    alt((
        kind_test,
        map(preceded(tag("*:"), nc_name), RawTest::LocalWildcard),
        value(RawTest::Any, char('*')),
        map(terminated(nc_name, tag(":*")), RawTest::NamespaceWildcard),
        map(q_name, RawTest::Name),
    ))
    .parse(input)
}

fn empty_parens(input: &str) -> IResult<&str, ()> {
    value((), pair(ws(char('(')), char(')'))).parse(input)
}

fn kind_test(input: &str) -> IResult<&str, RawTest<'_>> {
    alt((
        value(RawTest::Node, pair(tag("node"), empty_parens)),
        value(RawTest::Text, pair(tag("text"), empty_parens)),
        value(RawTest::Comment, pair(tag("comment"), empty_parens)),
        map(
            delimited(
                pair(tag("processing-instruction"), ws(char('('))),
                opt(ws(string_literal)),
                char(')'),
            ),
            RawTest::ProcessingInstruction,
        ),
    ))
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Positional> {
    delimited(
        ws(char('[')),
        alt((
            map_res(digit1, |digits: &str| digits.parse::<usize>().map(Positional::Index)),
            value(Positional::Last, pair(tag("last"), empty_parens)),
        )),
        ws(char(']')),
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))
    .parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(nc_name, opt(pair(char(':'), nc_name)))).parse(input)
}
