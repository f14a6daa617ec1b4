//! Benchmark for rule parsing, combination and evaluation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rule_engine_core::rule::{combine, evaluate, parse, AttributeRecord, LogicalOperator};

const COMPLEX_RULE: &str = "((age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')) AND (salary > 50000 OR experience > 5)";

/// Generate `count` distinct rules, every third one repeated
fn create_rules(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let i = if i % 3 == 0 { 0 } else { i };
            format!("(age > {} AND salary >= {}) OR department = 'dept_{}'", i, i * 1000, i)
        })
        .collect()
}

fn create_attributes() -> AttributeRecord {
    let mut attrs = AttributeRecord::new();
    attrs.insert("age", 35);
    attrs.insert("department", "Sales");
    attrs.insert("salary", 60000);
    attrs.insert("experience", 3);
    attrs
}

fn benchmark_parse(c: &mut Criterion) {
    c.bench_function("parse_complex_rule", |b| {
        b.iter(|| parse(black_box(COMPLEX_RULE)).unwrap())
    });
}

fn benchmark_combine(c: &mut Criterion) {
    let rules = create_rules(100);
    c.bench_function("combine_100_rules", |b| {
        b.iter(|| combine(black_box(rules.as_slice()), LogicalOperator::And).unwrap())
    });
}

fn benchmark_evaluate(c: &mut Criterion) {
    let ast = parse(COMPLEX_RULE).unwrap();
    let attrs = create_attributes();
    c.bench_function("evaluate_complex_rule", |b| {
        b.iter(|| evaluate(black_box(&ast), black_box(&attrs)).unwrap())
    });

    let combined = combine(create_rules(100).as_slice(), LogicalOperator::Or).unwrap().ast;
    c.bench_function("evaluate_combined_100_rules", |b| {
        b.iter(|| evaluate(black_box(&combined), black_box(&attrs)).unwrap())
    });
}

criterion_group!(benches, benchmark_parse, benchmark_combine, benchmark_evaluate);
criterion_main!(benches);
