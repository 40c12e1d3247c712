//! Match patterns: parsing with `nom`, default priorities, and matching
//! against nodes by walking from the candidate node up towards the root.
use crate::error::PatternError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{consumed, map, map_res, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};
use std::fmt;
use std::sync::Arc;
use stylus_names::{Fingerprint, NamePool, NamespaceResolver, standard};
use stylus_tree::{Axis, NodeKind, NodeRef, NodeTest};

/// A node predicate supplied by the host instead of pattern text.
pub type PredicateFn = Arc<dyn Fn(&NodeRef<'_>) -> bool + Send + Sync>;

/// A compiled match pattern: one or more alternatives separated by `|`.
#[derive(Clone)]
pub struct Pattern {
    text: Arc<str>,
    alternatives: Vec<Alternative>,
}

impl Pattern {
    /// Compiles pattern text. Prefixes are resolved through `resolver`;
    /// unprefixed names are in no namespace.
    pub fn parse(
        text: &str,
        pool: &NamePool,
        resolver: &dyn NamespaceResolver,
    ) -> Result<Pattern, PatternError> {
        let paths = match pattern(text.trim()) {
            Ok(("", paths)) => paths,
            Ok((rest, _)) => {
                return Err(PatternError::syntax(text, format!("unexpected input '{}'", rest)));
            }
            Err(e) => return Err(PatternError::syntax(text, e.to_string())),
        };
        let resolver = Resolver { pool, resolver, text };
        let alternatives = paths
            .into_iter()
            .map(|(source, raw)| resolver.path(source, raw).map(Alternative::Path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pattern {
            text: Arc::from(text.trim()),
            alternatives,
        })
    }

    /// A pattern backed by a closure. `kind` narrows the nodes it is tried
    /// against when known.
    pub fn from_predicate<F>(description: &str, kind: Option<NodeKind>, priority: f64, test: F) -> Pattern
    where
        F: Fn(&NodeRef<'_>) -> bool + Send + Sync + 'static,
    {
        let description: Arc<str> = Arc::from(description);
        Pattern {
            text: Arc::clone(&description),
            alternatives: vec![Alternative::Predicate {
                description,
                kind,
                priority,
                test: Arc::new(test),
            }],
        }
    }

    pub fn matches(&self, node: &NodeRef<'_>) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(node))
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("text", &self.text)
            .field("alternatives", &self.alternatives)
            .finish()
    }
}

/// One branch of a union pattern. Each branch becomes its own rule.
#[derive(Clone)]
pub enum Alternative {
    Path(PathPattern),
    Predicate {
        description: Arc<str>,
        kind: Option<NodeKind>,
        priority: f64,
        test: PredicateFn,
    },
}

impl Alternative {
    pub fn matches(&self, node: &NodeRef<'_>) -> bool {
        match self {
            Alternative::Path(path) => path.matches(node),
            Alternative::Predicate { kind, test, .. } => {
                kind.is_none_or(|k| k == node.kind()) && test(node)
            }
        }
    }

    pub fn default_priority(&self) -> f64 {
        match self {
            Alternative::Path(path) => path.default_priority(),
            Alternative::Predicate { priority, .. } => *priority,
        }
    }

    /// The only node kind this branch can match, if it is restricted to one.
    pub fn node_kind(&self) -> Option<NodeKind> {
        match self {
            Alternative::Path(path) => path.node_kind(),
            Alternative::Predicate { kind, .. } => *kind,
        }
    }

    /// The only name this branch can match, if it is restricted to one.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match self {
            Alternative::Path(path) => path.fingerprint(),
            Alternative::Predicate { .. } => None,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Alternative::Path(path) => &path.text,
            Alternative::Predicate { description, .. } => description,
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl fmt::Debug for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alternative::Path(path) => path.fmt(f),
            Alternative::Predicate {
                description,
                kind,
                priority,
                ..
            } => f
                .debug_struct("Predicate")
                .field("description", description)
                .field("kind", kind)
                .field("priority", priority)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `a/b`: may match at any depth.
    Relative,
    /// `/a/b`: the first step must be a child of the root.
    Root,
    /// `//a/b`: the first step may be any descendant of the root.
    AnyDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    /// `/`
    Child,
    /// `//`
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
enum StepPredicate {
    Position(usize),
    Last,
    HasAttribute(NodeTest),
    AttributeEquals(NodeTest, String),
}

#[derive(Debug, Clone, PartialEq)]
struct PatternStep {
    /// How this step relates to the step before it.
    connector: Connector,
    axis: Axis,
    test: NodeTest,
    predicates: Vec<StepPredicate>,
}

impl PatternStep {
    fn accepts(&self, node: &NodeRef<'_>) -> bool {
        let kind = node.kind();
        let on_axis = match self.axis {
            Axis::Attribute => kind == NodeKind::Attribute,
            _ => !matches!(kind, NodeKind::Attribute | NodeKind::Namespace | NodeKind::Root),
        };
        on_axis
            && self.test.matches(node)
            && (0..self.predicates.len()).all(|k| self.predicate_holds(node, k))
    }

    fn predicate_holds(&self, node: &NodeRef<'_>, k: usize) -> bool {
        match &self.predicates[k] {
            StepPredicate::Position(n) => self.position(node, k, false) == Some(*n),
            StepPredicate::Last => self.position(node, k, true).is_some(),
            StepPredicate::HasAttribute(test) => node.axis(Axis::Attribute, test.clone()).next().is_some(),
            StepPredicate::AttributeEquals(test, expected) => node
                .axis(Axis::Attribute, test.clone())
                .any(|attr| attr.string_value() == *expected),
        }
    }

    /// The position of `node` among the nodes its parent reaches along this
    /// step's axis that pass the test and the predicates before `k`. With
    /// `require_last`, `Some` only if it is also the final such node.
    fn position(&self, node: &NodeRef<'_>, k: usize, require_last: bool) -> Option<usize> {
        let parent = node.parent()?;
        let mut peers = parent
            .axis(self.axis, self.test.clone())
            .filter(|peer| (0..k).all(|j| self.predicate_holds(peer, j)));
        let position = peers.by_ref().position(|peer| peer == *node)? + 1;
        if require_last && peers.next().is_some() {
            return None;
        }
        Some(position)
    }
}

/// A single location-path alternative.
#[derive(Clone, PartialEq)]
pub struct PathPattern {
    text: Arc<str>,
    anchor: Anchor,
    steps: Vec<PatternStep>,
}

impl PathPattern {
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn matches(&self, node: &NodeRef<'_>) -> bool {
        match self.steps.len() {
            0 => node.is_root(),
            n => self.matches_from(node, n - 1),
        }
    }

    /// Matches `steps[..=last]` with `node` as the node for `steps[last]`.
    fn matches_from(&self, node: &NodeRef<'_>, last: usize) -> bool {
        let step = &self.steps[last];
        if !step.accepts(node) {
            return false;
        }
        if last == 0 {
            return match self.anchor {
                Anchor::Relative | Anchor::AnyDepth => true,
                Anchor::Root => node.parent().is_some_and(|p| p.is_root()),
            };
        }
        let Some(parent) = node.parent() else {
            return false;
        };
        match step.connector {
            Connector::Child => self.matches_from(&parent, last - 1),
            Connector::Descendant => {
                let mut candidate = Some(parent);
                while let Some(ancestor) = candidate {
                    if self.matches_from(&ancestor, last - 1) {
                        return true;
                    }
                    candidate = ancestor.parent();
                }
                false
            }
        }
    }

    /// `-0.5` for `/`; the node test's priority for a single relative step
    /// with no predicates; `0.5` for anything more specific.
    pub fn default_priority(&self) -> f64 {
        match self.steps.as_slice() {
            [] => -0.5,
            [step] if self.anchor == Anchor::Relative && step.predicates.is_empty() => {
                step.test.default_priority()
            }
            _ => 0.5,
        }
    }

    pub fn node_kind(&self) -> Option<NodeKind> {
        match self.steps.last() {
            None => Some(NodeKind::Root),
            Some(step) if step.axis == Axis::Attribute => Some(NodeKind::Attribute),
            Some(step) => step.test.node_kind(),
        }
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.steps.last().and_then(|step| step.test.fingerprint())
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("text", &self.text)
            .field("anchor", &self.anchor)
            .field("steps", &self.steps.len())
            .finish()
    }
}

// --- Name resolution ---

struct Resolver<'a> {
    pool: &'a NamePool,
    resolver: &'a dyn NamespaceResolver,
    text: &'a str,
}

impl Resolver<'_> {
    fn path(&self, source: &str, raw: RawPath<'_>) -> Result<PathPattern, PatternError> {
        let steps = raw
            .steps
            .into_iter()
            .map(|(connector, step)| self.step(connector, step))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PathPattern {
            text: Arc::from(source.trim()),
            anchor: raw.anchor,
            steps,
        })
    }

    fn step(&self, connector: Connector, raw: RawStep<'_>) -> Result<PatternStep, PatternError> {
        let axis = match raw.axis {
            None | Some("child") => Axis::Child,
            Some("attribute") => Axis::Attribute,
            Some(other) => {
                return Err(PatternError::UnsupportedAxis {
                    pattern: self.text.to_string(),
                    axis: other.to_string(),
                });
            }
        };
        let principal = axis.principal_node_kind();
        let test = match (axis, raw.test) {
            (Axis::Attribute, RawTest::Node) => NodeTest::Kind(NodeKind::Attribute),
            (_, test) => self.test(principal, test)?,
        };
        let predicates = raw
            .predicates
            .into_iter()
            .map(|p| {
                Ok(match p {
                    RawPredicate::Position(n) => StepPredicate::Position(n),
                    RawPredicate::Last => StepPredicate::Last,
                    RawPredicate::Attribute(name, None) => {
                        StepPredicate::HasAttribute(self.test(NodeKind::Attribute, name)?)
                    }
                    RawPredicate::Attribute(name, Some(value)) => StepPredicate::AttributeEquals(
                        self.test(NodeKind::Attribute, name)?,
                        value.to_string(),
                    ),
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;
        Ok(PatternStep {
            connector,
            axis,
            test,
            predicates,
        })
    }

    fn test(&self, principal: NodeKind, raw: RawTest<'_>) -> Result<NodeTest, PatternError> {
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
enum RawPredicate<'a> {
    Position(usize),
    Last,
    Attribute(RawTest<'a>, Option<&'a str>),
}

#[derive(Debug, Clone, PartialEq)]
struct RawStep<'a> {
    axis: Option<&'a str>,
    test: RawTest<'a>,
    predicates: Vec<RawPredicate<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
struct RawPath<'a> {
    anchor: Anchor,
    steps: Vec<(Connector, RawStep<'a>)>,
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn pattern(input: &str) -> IResult<&str, Vec<(&str, RawPath<'_>)>> {
    separated_list1(ws(char('|')), ws(consumed(path))).parse(input)
}

fn path(input: &str) -> IResult<&str, RawPath<'_>> {
    alt((
        map(preceded(tag("//"), relative_path), |steps| RawPath {
            anchor: Anchor::AnyDepth,
            steps,
        }),
        map(preceded(char('/'), opt(relative_path)), |steps| RawPath {
            anchor: Anchor::Root,
            steps: steps.unwrap_or_default(),
        }),
        map(relative_path, |steps| RawPath {
            anchor: Anchor::Relative,
            steps,
        }),
    ))
    .parse(input)
}

fn relative_path(input: &str) -> IResult<&str, Vec<(Connector, RawStep<'_>)>> {
    let (input, first) = step(input)?;
    let (input, rest) = many0(pair(connector, step)).parse(input)?;
    let mut steps = Vec::with_capacity(rest.len() + 1);
    steps.push((Connector::Child, first));
    steps.extend(rest);
    Ok((input, steps))
}

fn connector(input: &str) -> IResult<&str, Connector> {
    alt((
        value(Connector::Descendant, tag("//")),
        value(Connector::Child, char('/')),
    ))
    .parse(input)
}

fn step(input: &str) -> IResult<&str, RawStep<'_>> {
    let (input, axis) = alt((
        map(char('@'), |_| Some("attribute")),
        opt(terminated(nc_name, tag("::"))),
    ))
    .parse(input)?;
    let (input, test) = node_test(input)?;
    let (input, predicates) = many0(predicate).parse(input)?;
    Ok((input, RawStep { axis, test, predicates }))
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

fn predicate(input: &str) -> IResult<&str, RawPredicate<'_>> {
    delimited(
        ws(char('[')),
        alt((
            map_res(digit1, |digits: &str| digits.parse::<usize>().map(RawPredicate::Position)),
            value(RawPredicate::Last, pair(tag("last"), empty_parens)),
            map(
                pair(
                    preceded(char('@'), attribute_name_test),
                    opt(preceded(ws(char('=')), string_literal)),
                ),
                |(name, value)| RawPredicate::Attribute(name, value),
            ),
        )),
        ws(char(']')),
    )
    .parse(input)
}

fn attribute_name_test(input: &str) -> IResult<&str, RawTest<'_>> {
    alt((
        value(RawTest::Any, char('*')),
        map(terminated(nc_name, tag(":*")), RawTest::NamespaceWildcard),
        map(q_name, RawTest::Name),
    ))
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
