//! Benchmarks for rule compilation and per-request decisions.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use smartroute_rules::rule::{ProxyProtocol, ProxyServer, RuleRecord};
use smartroute_rules::{
    CompiledRuleSet, DecisionEngine, ProfileType, RoutingConfig, RuleSetBuilder, ScriptEmitter,
    SmartProfile,
};

fn records(n: usize) -> Vec<RuleRecord> {
    (0..n)
        .map(|i| match i % 4 {
            0 => RuleRecord::from_source(format!("host{i}.example.com")),
            1 => RuleRecord::from_pattern(format!("*://*.wild{i}.example.org/*")),
            2 => RuleRecord::from_source(format!(".site{i}.example.net/path")),
            _ => RuleRecord::from_pattern(format!("https://exact{i}.example.io/a*")),
        })
        .collect()
}

fn rule_set(n: usize) -> CompiledRuleSet {
    let mut builder = RuleSetBuilder::new();
    builder
        .add_whitelist(records(n / 10))
        .add_rules(records(n));
    builder.build()
}

fn profile(n: usize) -> SmartProfile {
    let proxy = Arc::new(ProxyServer::new("p", "10.0.0.1", 1080, ProxyProtocol::Socks5));
    SmartProfile::new("bench", ProfileType::SmartRules)
        .with_rules(rule_set(n))
        .with_default_proxy(proxy)
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for n in [100, 1000] {
        let records = records(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &records, |b, records| {
            b.iter(|| {
                let mut builder = RuleSetBuilder::new();
                builder.add_rules(records.iter().cloned());
                black_box(builder.build())
            })
        });
    }
    group.finish();
}

fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide");
    for n in [100, 1000, 10000] {
        let engine = DecisionEngine::new(RoutingConfig::new(profile(n)));
        group.bench_with_input(BenchmarkId::new("miss", n), &engine, |b, engine| {
            b.iter(|| engine.decide(black_box("https://unlisted.example.com:8443/x"), None))
        });
        group.bench_with_input(BenchmarkId::new("last", n), &engine, |b, engine| {
            let url = format!("https://exact{}.example.io/a/b", n - 1);
            b.iter(|| engine.decide(black_box(&url), None))
        });
    }
    group.finish();
}

fn bench_emit(c: &mut Criterion) {
    let profile = profile(1000);
    c.bench_function("emit_script_1000", |b| {
        b.iter(|| ScriptEmitter::new(black_box(&profile), None).emit())
    });
}

criterion_group!(benches, bench_compile, bench_decide, bench_emit);
criterion_main!(benches);
