//! Template rules grouped by mode, and the conflict-resolution procedure
//! that picks one rule for a node.
//!
//! Within a mode, rules are kept in lists ordered by descending precedence,
//! then descending priority, with later registrations first among equals.
//! A node is only tested against the list for its name, the list for its
//! kind, and the generic list, and each list is abandoned as soon as its
//! remaining rules rank below the best match found so far.
use crate::error::{RuleDescription, RuleError};
use crate::pattern::{Alternative, Pattern};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stylus_names::{Fingerprint, NamePool};
use stylus_tree::{NodeKind, NodeRef, path};

/// What to do when two rules of different declarations tie for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Report the conflict as an error.
    #[default]
    Fail,
    /// Pick the rule registered last and log a warning.
    RecoverWithWarnings,
    /// Pick the rule registered last.
    RecoverSilently,
}

/// A mode identifier. The unnamed mode is distinct from every named mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeName {
    Default,
    Named(Fingerprint),
}

impl ModeName {
    /// A printable name: `#default`, or the mode's expanded name.
    pub fn label(&self, pool: &NamePool) -> String {
        match self {
            ModeName::Default => "#default".to_string(),
            ModeName::Named(fp) => pool
                .clark_name(fp.to_name_code())
                .unwrap_or_else(|_| format!("{:?}", fp)),
        }
    }
}

/// One rule: a single pattern alternative bound to an action.
#[derive(Debug, Clone)]
pub struct Rule<A> {
    pattern: Alternative,
    action: A,
    precedence: i32,
    priority: f64,
    /// Registration order within the whole manager.
    sequence: usize,
    /// Shared by the alternatives of one union pattern.
    declaration: usize,
    origin: Option<Arc<str>>,
}

impl<A> Rule<A> {
    pub fn pattern(&self) -> &Alternative {
        &self.pattern
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn precedence(&self) -> i32 {
        self.precedence
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn declaration(&self) -> usize {
        self.declaration
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn describe(&self) -> RuleDescription {
        RuleDescription {
            pattern: self.pattern.text().to_string(),
            precedence: self.precedence,
            priority: self.priority,
            origin: self.origin.as_ref().map(|o| o.to_string()),
        }
    }

    fn rank(&self) -> (i32, f64) {
        (self.precedence, self.priority)
    }
}

fn compare_rank(a: (i32, f64), b: (i32, f64)) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

/// The outcome of searching one mode for a node.
struct Search<'r, A> {
    best: Option<&'r Rule<A>>,
    /// A rule of another declaration with the same rank as `best`.
    rival: Option<&'r Rule<A>>,
}

impl<'r, A> Search<'r, A> {
    fn new() -> Self {
        Search { best: None, rival: None }
    }

    /// Scans one ordered list. With `first_only`, stops at the first match.
    fn scan(&mut self, rules: &'r [Rule<A>], list: &[usize], node: &NodeRef<'_>, first_only: bool) {
        for &index in list {
            let rule = &rules[index];
            if let Some(best) = self.best {
                if compare_rank(rule.rank(), best.rank()) == Ordering::Less {
                    break;
                }
            }
            if !rule.pattern.matches(node) {
                continue;
            }
            self.offer(rule);
            if first_only {
                break;
            }
        }
    }

    fn offer(&mut self, rule: &'r Rule<A>) {
        let Some(best) = self.best else {
            self.best = Some(rule);
            return;
        };
        match compare_rank(rule.rank(), best.rank()) {
            Ordering::Greater => {
                self.best = Some(rule);
                self.rival = None;
            }
            Ordering::Equal => {
                let (winner, loser) = if rule.sequence > best.sequence {
                    (rule, best)
                } else {
                    (best, rule)
                };
                if loser.declaration != winner.declaration && self.rival.is_none() {
                    self.rival = Some(loser);
                }
                self.best = Some(winner);
            }
            Ordering::Less => {}
        }
    }
}

/// The rules of one mode.
#[derive(Debug, Clone)]
pub struct Mode<A> {
    name: ModeName,
    label: String,
    rules: Vec<Rule<A>>,
    /// Element and attribute rules that can only match one name.
    named: HashMap<(NodeKind, Fingerprint), Vec<usize>>,
    /// Rules that can only match one kind of node, indexed by kind.
    by_kind: [Vec<usize>; 7],
    generic: Vec<usize>,
}

impl<A> Mode<A> {
    fn new(name: ModeName, label: String) -> Self {
        Mode {
            name,
            label,
            rules: Vec::new(),
            named: HashMap::new(),
            by_kind: Default::default(),
            generic: Vec::new(),
        }
    }

    pub fn name(&self) -> ModeName {
        self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn rules(&self) -> &[Rule<A>] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn add(&mut self, rule: Rule<A>) {
        let index = self.rules.len();
        let kind = rule.pattern.node_kind();
        let fingerprint = rule.pattern.fingerprint();
        let rank = rule.rank();
        self.rules.push(rule);

        let list = match (kind, fingerprint) {
            (Some(kind @ (NodeKind::Element | NodeKind::Attribute)), Some(fp)) => {
                self.named.entry((kind, fp)).or_default()
            }
            (Some(kind), _) => &mut self.by_kind[kind.index()],
            (None, _) => &mut self.generic,
        };
        // Before every rule of the same or lower rank, so the newest comes first among equals.
        let rules = &self.rules;
        let at = list
            .iter()
            .position(|&i| compare_rank(rules[i].rank(), rank) != Ordering::Greater)
            .unwrap_or(list.len());
        list.insert(at, index);
    }

    fn lists_for(&self, node: &NodeRef<'_>) -> [&[usize]; 3] {
        let kind = node.kind();
        let named: &[usize] = match (kind, node.fingerprint()) {
            (NodeKind::Element | NodeKind::Attribute, Some(fp)) => {
                self.named.get(&(kind, fp)).map_or(&[], Vec::as_slice)
            }
            _ => &[],
        };
        [named, &self.by_kind[kind.index()], &self.generic]
    }

    /// Selects the rule for `node`: the matching rule with the highest
    /// precedence, then the highest priority. A tie between rules of
    /// different declarations is handled according to `policy`.
    pub fn find_rule(&self, node: &NodeRef<'_>, policy: AmbiguityPolicy) -> Result<Option<&Rule<A>>, RuleError> {
        let first_only = policy == AmbiguityPolicy::RecoverSilently;
        let mut search = Search::new();
        for list in self.lists_for(node) {
            search.scan(&self.rules, list, node, first_only);
        }
        let Some(best) = search.best else {
            trace!("No rule in mode {} for {}", self.label, path(node));
            return Ok(None);
        };
        if let Some(rival) = search.rival {
            match policy {
                AmbiguityPolicy::Fail => {
                    return Err(RuleError::Ambiguous {
                        node: path(node),
                        mode: self.label.clone(),
                        first: rival.describe(),
                        second: best.describe(),
                    });
                }
                AmbiguityPolicy::RecoverWithWarnings => warn!(
                    "Ambiguous rule match for {} in mode {}: {} and {}; using the latter",
                    path(node),
                    self.label,
                    rival.describe(),
                    best.describe()
                ),
                AmbiguityPolicy::RecoverSilently => {}
            }
        }
        Ok(Some(best))
    }

    /// Selects the best rule among those with precedence in `min..=max`,
    /// without ambiguity reporting. Used to find overridden rules.
    pub fn find_rule_in_range(&self, node: &NodeRef<'_>, min: i32, max: i32) -> Option<&Rule<A>> {
        let mut best: Option<&Rule<A>> = None;
        for list in self.lists_for(node) {
            let found = list
                .iter()
                .map(|&i| &self.rules[i])
                .filter(|rule| (min..=max).contains(&rule.precedence))
                .find(|rule| rule.pattern.matches(node));
            if let Some(rule) = found {
                let better = best.is_none_or(|b| {
                    compare_rank(rule.rank(), b.rank())
                        .then(rule.sequence.cmp(&b.sequence))
                        == Ordering::Greater
                });
                if better {
                    best = Some(rule);
                }
            }
        }
        best
    }
}

/// All template rules of a stylesheet, by mode.
pub struct RuleManager<A> {
    pool: Arc<NamePool>,
    modes: HashMap<ModeName, Mode<A>>,
    sequence: usize,
    declarations: usize,
}

impl<A: Clone> RuleManager<A> {
    pub fn new(pool: Arc<NamePool>) -> Self {
        let mut modes = HashMap::new();
        modes.insert(ModeName::Default, Mode::new(ModeName::Default, "#default".to_string()));
        RuleManager {
            pool,
            modes,
            sequence: 0,
            declarations: 0,
        }
    }

    pub fn pool(&self) -> &Arc<NamePool> {
        &self.pool
    }

    /// Registers `pattern` in `mode`, one rule per alternative. Without an
    /// explicit priority each alternative takes its own default priority.
    /// Returns the declaration number shared by the new rules.
    pub fn add_rule(
        &mut self,
        pattern: &Pattern,
        action: A,
        mode: ModeName,
        precedence: i32,
        priority: Option<f64>,
        origin: Option<&str>,
    ) -> Result<usize, RuleError> {
        if let Some(p) = priority.filter(|p| !p.is_finite()) {
            return Err(RuleError::InvalidPriority(p));
        }
        let declaration = self.declarations;
        self.declarations += 1;
        let origin: Option<Arc<str>> = origin.map(Arc::from);
        let label = mode.label(&self.pool);
        let target = self
            .modes
            .entry(mode)
            .or_insert_with(|| Mode::new(mode, label));
        for alternative in pattern.alternatives() {
            let priority = priority.unwrap_or_else(|| alternative.default_priority());
            debug!(
                "Rule '{}' in mode {}: precedence {}, priority {}",
                alternative,
                target.label,
                precedence,
                priority
            );
            target.add(Rule {
                pattern: alternative.clone(),
                action: action.clone(),
                precedence,
                priority,
                sequence: self.sequence,
                declaration,
                origin: origin.clone(),
            });
            self.sequence += 1;
        }
        Ok(declaration)
    }

    /// Ensures `mode` exists even if no rule names it.
    pub fn declare_mode(&mut self, mode: ModeName) {
        let label = mode.label(&self.pool);
        self.modes.entry(mode).or_insert_with(|| Mode::new(mode, label));
    }
}

impl<A> RuleManager<A> {
    pub fn mode(&self, name: &ModeName) -> Option<&Mode<A>> {
        self.modes.get(name)
    }

    pub fn modes(&self) -> impl Iterator<Item = &Mode<A>> {
        self.modes.values()
    }

    pub fn rule_count(&self) -> usize {
        self.modes.values().map(|m| m.rules.len()).sum()
    }

    /// The rule for `node` in `mode`, or `None` if no rule matches (the
    /// caller then applies the built-in behaviour for the node's kind).
    pub fn find_rule(
        &self,
        node: &NodeRef<'_>,
        mode: &ModeName,
        policy: AmbiguityPolicy,
    ) -> Result<Option<&Rule<A>>, RuleError> {
        match self.modes.get(mode) {
            Some(m) => m.find_rule(node, policy),
            None => Ok(None),
        }
    }

    pub fn find_rule_in_range(
        &self,
        node: &NodeRef<'_>,
        mode: &ModeName,
        min_precedence: i32,
        max_precedence: i32,
    ) -> Option<&Rule<A>> {
        self.modes
            .get(mode)?
            .find_rule_in_range(node, min_precedence, max_precedence)
    }
}

impl<A> fmt::Debug for RuleManager<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleManager")
            .field("modes", &self.modes.len())
            .field("rules", &self.rule_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Bindings;
    use stylus_tree::{Axis, BuildOptions, Document, NodeTest, parse_document};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn doc() -> Document {
        parse_document(
            "<doc><para kind='note'>text</para><para/><list><item/></list></doc>",
            NamePool::new_shared(),
            BuildOptions::default(),
        )
        .unwrap()
    }

    fn pattern(doc: &Document, text: &str) -> Pattern {
        Pattern::parse(text, doc.pool(), &Bindings::<String, String>::new()).unwrap()
    }

    fn first<'d>(doc: &'d Document, local: &str) -> NodeRef<'d> {
        doc.root()
            .axis(Axis::Descendant, NodeTest::AnyNode)
            .find(|n| &*n.local_name() == local)
            .unwrap()
    }

    fn chosen(manager: &RuleManager<&'static str>, node: &NodeRef<'_>) -> Option<&'static str> {
        manager
            .find_rule(node, &ModeName::Default, AmbiguityPolicy::Fail)
            .unwrap()
            .map(|rule| *rule.action())
    }

    #[test]
    fn higher_precedence_wins_over_higher_priority() {
        init();
        let doc = doc();
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        manager
            .add_rule(&pattern(&doc, "para"), "imported", ModeName::Default, 0, Some(10.0), None)
            .unwrap();
        manager
            .add_rule(&pattern(&doc, "*"), "main", ModeName::Default, 1, None, None)
            .unwrap();
        assert_eq!(chosen(&manager, &first(&doc, "para")), Some("main"));
    }

    #[test]
    fn priority_breaks_precedence_ties() {
        let doc = doc();
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        for (text, action) in [("*", "any"), ("para", "para"), ("doc/para", "path"), ("para[@kind]", "pred")] {
            manager
                .add_rule(&pattern(&doc, text), action, ModeName::Default, 0, None, None)
                .unwrap();
        }
        let para = first(&doc, "para");
        // doc/para and para[@kind] tie at 0.5.
        assert!(matches!(
            manager.find_rule(&para, &ModeName::Default, AmbiguityPolicy::Fail),
            Err(RuleError::Ambiguous { .. })
        ));
        let second_para = para.axis(Axis::FollowingSibling, NodeTest::AnyNode).next().unwrap();
        assert_eq!(chosen(&manager, &second_para), Some("path"));
        assert_eq!(chosen(&manager, &first(&doc, "item")), Some("any"));
        assert_eq!(chosen(&manager, &doc.root()), None);
    }

    #[test]
    fn ambiguity_reports_both_rules() {
        let doc = doc();
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        manager
            .add_rule(&pattern(&doc, "para"), "first", ModeName::Default, 0, None, Some("a.xsl"))
            .unwrap();
        manager
            .add_rule(&pattern(&doc, "para"), "second", ModeName::Default, 0, None, Some("b.xsl"))
            .unwrap();
        let para = first(&doc, "para");
        match manager.find_rule(&para, &ModeName::Default, AmbiguityPolicy::Fail) {
            Err(RuleError::Ambiguous { node, mode, first, second }) => {
                assert_eq!(node, "/doc[1]/para[1]");
                assert_eq!(mode, "#default");
                assert_eq!(first.origin.as_deref(), Some("a.xsl"));
                assert_eq!(second.origin.as_deref(), Some("b.xsl"));
            }
            other => panic!("expected ambiguity, got {:?}", other.map(|r| r.map(|r| *r.action()))),
        }

        for policy in [AmbiguityPolicy::RecoverWithWarnings, AmbiguityPolicy::RecoverSilently] {
            let rule = manager.find_rule(&para, &ModeName::Default, policy).unwrap().unwrap();
            assert_eq!(*rule.action(), "second");
        }
    }

    #[test]
    fn union_alternatives_never_conflict_with_each_other() {
        let doc = doc();
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        manager
            .add_rule(&pattern(&doc, "para | *"), "union", ModeName::Default, 0, Some(1.0), None)
            .unwrap();
        assert_eq!(manager.rule_count(), 2);
        assert_eq!(chosen(&manager, &first(&doc, "para")), Some("union"));
    }

    #[test]
    fn modes_are_independent() {
        let doc = doc();
        let toc = ModeName::Named(doc.pool().allocate("", "", "toc").unwrap().fingerprint());
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        manager
            .add_rule(&pattern(&doc, "para"), "toc", toc, 0, None, None)
            .unwrap();
        let para = first(&doc, "para");
        assert_eq!(chosen(&manager, &para), None);
        let rule = manager.find_rule(&para, &toc, AmbiguityPolicy::Fail).unwrap().unwrap();
        assert_eq!(*rule.action(), "toc");
        assert_eq!(manager.mode(&toc).unwrap().label(), "toc");
        let unknown = ModeName::Named(doc.pool().allocate("", "", "other").unwrap().fingerprint());
        assert!(manager.find_rule(&para, &unknown, AmbiguityPolicy::Fail).unwrap().is_none());
    }

    #[test]
    fn generic_and_specific_lists_compete_on_rank() {
        let doc = doc();
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        manager
            .add_rule(&pattern(&doc, "node()"), "generic", ModeName::Default, 0, Some(2.0), None)
            .unwrap();
        manager
            .add_rule(&pattern(&doc, "item"), "named", ModeName::Default, 0, None, None)
            .unwrap();
        manager
            .add_rule(&pattern(&doc, "text()"), "text", ModeName::Default, 0, Some(3.0), None)
            .unwrap();
        assert_eq!(chosen(&manager, &first(&doc, "item")), Some("generic"));
        let text = first(&doc, "para").children().next().unwrap();
        assert_eq!(chosen(&manager, &text), Some("text"));
    }

    #[test]
    fn range_search_finds_overridden_rules() {
        let doc = doc();
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        manager
            .add_rule(&pattern(&doc, "para"), "low", ModeName::Default, 0, None, None)
            .unwrap();
        manager
            .add_rule(&pattern(&doc, "*"), "low-generic", ModeName::Default, 0, None, None)
            .unwrap();
        manager
            .add_rule(&pattern(&doc, "para"), "high", ModeName::Default, 2, None, None)
            .unwrap();
        let para = first(&doc, "para");
        assert_eq!(chosen(&manager, &para), Some("high"));
        let overridden = manager
            .find_rule_in_range(&para, &ModeName::Default, 0, 1)
            .map(|r| *r.action());
        assert_eq!(overridden, Some("low"));
        assert!(manager.find_rule_in_range(&para, &ModeName::Default, 3, 5).is_none());
    }

    #[test]
    fn rejects_non_finite_priorities() {
        let doc = doc();
        let mut manager = RuleManager::new(Arc::clone(doc.pool()));
        assert!(matches!(
            manager.add_rule(&pattern(&doc, "para"), "x", ModeName::Default, 0, Some(f64::NAN), None),
            Err(RuleError::InvalidPriority(_))
        ));
    }

    #[test]
    fn ambiguity_policy_reads_from_json() {
        let policy: AmbiguityPolicy = serde_json::from_str("\"recover-with-warnings\"").unwrap();
        assert_eq!(policy, AmbiguityPolicy::RecoverWithWarnings);
    }
}
