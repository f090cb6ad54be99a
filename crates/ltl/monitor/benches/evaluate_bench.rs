use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ltl_monitor::{Label, LabelMap, RulePriority, RuleTemplate};

const RESPONSE: &str = "G (req -> F ack)";
const ZIPPER: &str =
    "G ((merged_x & !in_direct_front_x & !merged_e) -> G (merged_e -> !in_direct_front_x))";
const AGENT: &str = "G (close#0 & slow#1 -> !overtake#0)";

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_zipper", |b| {
        b.iter(|| RuleTemplate::new(black_box(ZIPPER), -1.0, RulePriority(0)).unwrap())
    });
}

fn bench_evaluate_response(c: &mut Criterion) {
    let rule = RuleTemplate::new(RESPONSE, -1.0, RulePriority(0)).unwrap();
    let mut inst = rule.instantiate(&[], &[]).remove(0);
    let steps: Vec<LabelMap> = (0..8)
        .map(|i| {
            let mut labels = LabelMap::new();
            labels.insert(Label::new("req"), i % 3 == 0);
            labels.insert(Label::new("ack"), i % 4 == 0);
            labels
        })
        .collect();
    c.bench_function("evaluate_response", |b| {
        b.iter(|| {
            for labels in &steps {
                black_box(rule.evaluate(labels, &mut inst));
            }
        })
    });
}

fn bench_evaluate_agents(c: &mut Criterion) {
    let rule = RuleTemplate::new(AGENT, -1.0, RulePriority(0)).unwrap();
    let ids: Vec<i32> = (0..6).collect();
    let mut instances = rule.instantiate(&ids, &[]);
    let mut labels = LabelMap::new();
    for &id in &ids {
        labels.insert(Label::for_agent("close", id), id % 2 == 0);
        labels.insert(Label::for_agent("slow", id), id % 3 == 0);
        labels.insert(Label::for_agent("overtake", id), false);
    }
    c.bench_function("evaluate_agents_30", |b| {
        b.iter(|| {
            for inst in instances.iter_mut() {
                black_box(rule.evaluate(&labels, inst));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_evaluate_response,
    bench_evaluate_agents
);
criterion_main!(benches);
