mod common;

use common::TestResult;
use std::collections::HashMap;
use std::sync::Arc;
use stylus::names::NamePool;
use stylus::rules::{AmbiguityPolicy, ModeName, Pattern, RuleError, RuleManager};
use stylus::tree::{BuildOptions, Document, NodeRef, parse_document};

struct Fixture {
    doc: Document,
    bindings: HashMap<String, String>,
}

impl Fixture {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let doc = parse_document(
            r#"<book><chapter n="1"><title/></chapter><chapter n="2"/></book>"#,
            NamePool::new_shared(),
            BuildOptions::default(),
        )?;
        Ok(Fixture {
            doc,
            bindings: HashMap::new(),
        })
    }

    fn pattern(&self, text: &str) -> Result<Pattern, Box<dyn std::error::Error>> {
        Ok(Pattern::parse(text, self.doc.pool(), &self.bindings)?)
    }

    fn rules(&self) -> RuleManager<&'static str> {
        RuleManager::new(Arc::clone(self.doc.pool()))
    }

    fn mode(&self, name: &str) -> Result<ModeName, Box<dyn std::error::Error>> {
        Ok(ModeName::Named(self.doc.pool().allocate("", "", name)?.fingerprint()))
    }

    fn chapter(&self) -> Result<NodeRef<'_>, Box<dyn std::error::Error>> {
        Ok(self
            .doc
            .document_element()
            .and_then(|book| book.children().next())
            .ok_or("no chapter")?)
    }
}

#[test]
fn higher_precedence_wins_in_a_named_mode() -> TestResult {
    common::init_logging();
    let fixture = Fixture::new()?;
    let mode = fixture.mode("M")?;
    let mut rules = fixture.rules();
    rules.add_rule(&fixture.pattern("chapter")?, "low", mode, 1, Some(100.0), None)?;
    rules.add_rule(&fixture.pattern("chapter")?, "high", mode, 2, Some(-100.0), None)?;

    let chapter = fixture.chapter()?;
    let rule = rules.find_rule(&chapter, &mode, AmbiguityPolicy::Fail)?.ok_or("no rule")?;
    assert_eq!(*rule.action(), "high");
    assert!(rules.find_rule(&chapter, &ModeName::Default, AmbiguityPolicy::Fail)?.is_none());
    Ok(())
}

#[test]
fn higher_priority_wins_at_equal_precedence() -> TestResult {
    let fixture = Fixture::new()?;
    let mode = fixture.mode("M")?;
    let mut rules = fixture.rules();
    rules.add_rule(&fixture.pattern("chapter")?, "half", mode, 0, Some(0.5), None)?;
    rules.add_rule(&fixture.pattern("*")?, "minus-half", mode, 0, Some(-0.5), None)?;
    let rule = rules
        .find_rule(&fixture.chapter()?, &mode, AmbiguityPolicy::Fail)?
        .ok_or("no rule")?;
    assert_eq!(*rule.action(), "half");
    Ok(())
}

#[test]
fn equal_rank_is_reported_as_ambiguous() -> TestResult {
    let fixture = Fixture::new()?;
    let mut rules = fixture.rules();
    rules.add_rule(&fixture.pattern("chapter")?, "one", ModeName::Default, 0, None, Some("a.xsl"))?;
    rules.add_rule(&fixture.pattern("book/chapter")?, "two", ModeName::Default, 0, Some(0.0), Some("b.xsl"))?;
    let chapter = fixture.chapter()?;

    for _ in 0..3 {
        match rules.find_rule(&chapter, &ModeName::Default, AmbiguityPolicy::Fail) {
            Err(RuleError::Ambiguous { node, mode, first, second }) => {
                assert_eq!(node, "/book[1]/chapter[1]");
                assert_eq!(mode, "#default");
                let mut origins = [first.origin, second.origin];
                origins.sort();
                assert_eq!(origins, [Some("a.xsl".to_string()), Some("b.xsl".to_string())]);
            }
            other => panic!("expected ambiguity, got {:?}", other.map(|r| r.map(|r| *r.action()))),
        }
    }

    let recovered = rules
        .find_rule(&chapter, &ModeName::Default, AmbiguityPolicy::RecoverWithWarnings)?
        .ok_or("no rule")?;
    assert_eq!(*recovered.action(), "two");
    Ok(())
}

#[test]
fn union_alternatives_never_conflict() -> TestResult {
    let fixture = Fixture::new()?;
    let mut rules = fixture.rules();
    rules.add_rule(&fixture.pattern("chapter | book/chapter")?, "union", ModeName::Default, 0, Some(1.0), None)?;
    let rule = rules
        .find_rule(&fixture.chapter()?, &ModeName::Default, AmbiguityPolicy::Fail)?
        .ok_or("no rule")?;
    assert_eq!(*rule.action(), "union");
    assert_eq!(rules.rule_count(), 2);
    Ok(())
}

#[test]
fn default_priorities_follow_pattern_shape() -> TestResult {
    let fixture = Fixture::new()?;
    let priority = |text: &str| -> Result<Vec<f64>, Box<dyn std::error::Error>> {
        Ok(fixture
            .pattern(text)?
            .alternatives()
            .iter()
            .map(|a| a.default_priority())
            .collect())
    };
    assert_eq!(priority("chapter")?, [0.0]);
    assert_eq!(priority("*")?, [-0.5]);
    assert_eq!(priority("node()")?, [-0.5]);
    assert_eq!(priority("book/chapter")?, [0.5]);
    assert_eq!(priority("chapter[@n='2']")?, [0.5]);
    assert_eq!(priority("/")?, [-0.5]);
    Ok(())
}

#[test]
fn range_lookup_skips_higher_precedence() -> TestResult {
    let fixture = Fixture::new()?;
    let mut rules = fixture.rules();
    rules.add_rule(&fixture.pattern("chapter")?, "imported", ModeName::Default, 0, None, None)?;
    rules.add_rule(&fixture.pattern("chapter")?, "main", ModeName::Default, 1, None, None)?;
    let chapter = fixture.chapter()?;
    let rule = rules
        .find_rule_in_range(&chapter, &ModeName::Default, 0, 0)
        .ok_or("no rule")?;
    assert_eq!(*rule.action(), "imported");
    assert!(rules.find_rule_in_range(&chapter, &ModeName::Default, 2, 5).is_none());
    Ok(())
}
