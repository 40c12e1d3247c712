//! Rule dispatch and transformation throughput
//!
//! Runs stylesheets of increasing rule counts over documents of increasing
//! size, and a tail-recursive walk over long sibling chains.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use stylus::engine::TextCollector;
use stylus::names::NamePool;
use stylus::tree::BuildOptions;
use stylus::{ExecutionConfig, Executor, Instruction as I, Module, Stylesheet, StylesheetBuilder, Template};

/// One rule per record kind plus a catch-all, so each lookup has to rank
/// several candidates.
fn record_stylesheet(kinds: usize) -> Stylesheet {
    let mut module = Module::new("main")
        .template(Template::matching("*").body(vec![I::apply_templates()]))
        .template(Template::matching("record").body(vec![I::element("row", vec![I::apply_templates()])]));
    for kind in 0..kinds {
        module = module.template(
            Template::matching(&format!("field{}", kind)).body(vec![I::element("cell", vec![I::value_of(".")])]),
        );
    }
    StylesheetBuilder::new(NamePool::new_shared())
        .module(module)
        .compile("main")
        .expect("stylesheet failed to compile")
}

fn records(count: usize, kinds: usize) -> String {
    let mut source = String::from("<records>");
    for i in 0..count {
        source.push_str("<record>");
        for kind in 0..kinds {
            source.push_str(&format!("<field{kind}>{i}</field{kind}>"));
        }
        source.push_str("</record>");
    }
    source.push_str("</records>");
    source
}

fn benchmark_rule_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_dispatch");
    let config = ExecutionConfig::default();

    for kinds in [1, 10, 50] {
        let stylesheet = record_stylesheet(kinds);
        let doc = stylesheet
            .parse_source(&records(200, kinds), BuildOptions::default(), &config)
            .expect("failed to parse source");
        group.throughput(Throughput::Elements((200 * kinds) as u64));
        group.bench_with_input(BenchmarkId::new("rules", kinds), &kinds, |b, _| {
            b.iter(|| {
                let mut out = TextCollector::new();
                Executor::new(&stylesheet, &doc, config.clone())
                    .expect("foreign document")
                    .run(&mut out)
                    .expect("transformation failed");
                out.into_text()
            });
        });
    }

    group.finish();
}

fn benchmark_transform_to_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_to_tree");
    let stylesheet = record_stylesheet(5);
    let config = ExecutionConfig::default();

    for count in [10, 100, 1_000] {
        let source = records(count, 5);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("records", count), &source, |b, source| {
            b.iter(|| stylus::transform(&stylesheet, source, &config).expect("transformation failed"));
        });
    }

    group.finish();
}

fn benchmark_tail_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("tail_walk");
    let stylesheet = StylesheetBuilder::new(NamePool::new_shared())
        .module(
            Module::new("main")
                .template(Template::matching("list").body(vec![I::call_template("walk").on("i[1]")]))
                .template(Template::named("walk").body(vec![
                    I::value_of("."),
                    I::call_template("walk").on("following-sibling::*[1]"),
                ])),
        )
        .compile("main")
        .expect("stylesheet failed to compile");
    let config = ExecutionConfig::default();

    for count in [1_000, 10_000, 100_000] {
        let mut source = String::from("<list>");
        source.push_str(&"<i>x</i>".repeat(count));
        source.push_str("</list>");
        let doc = stylesheet
            .parse_source(&source, BuildOptions::default(), &config)
            .expect("failed to parse source");
        assert!(Arc::ptr_eq(doc.pool(), stylesheet.pool()));

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("siblings", count), &count, |b, _| {
            b.iter(|| {
                let mut out = TextCollector::new();
                Executor::new(&stylesheet, &doc, config.clone())
                    .expect("foreign document")
                    .run(&mut out)
                    .expect("walk failed");
                out.into_text()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_rule_dispatch,
    benchmark_transform_to_tree,
    benchmark_tail_walk
);
criterion_main!(benches);
