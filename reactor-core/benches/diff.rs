//! Benchmarks for the markup diff over keyed lists.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reactor_core::render::{diff, Fragment};

/// A list of `n` keyed items, every `completed_every`th one completed.
fn list(n: usize, completed_every: usize, skip: Option<usize>) -> Fragment {
    let mut markup = String::from(r#"<ul class="todo-list">"#);
    for i in (0..n).filter(|i| Some(*i) != skip) {
        let class = if i % completed_every == 0 { r#" class="completed""# } else { "" };
        markup.push_str(&format!(
            r#"<x-todo-item id="{i}"{class}><li><label>item {i}</label></li></x-todo-item>"#
        ));
    }
    markup.push_str("</ul>");
    Fragment::parse(&markup).expect("bench markup parses")
}

fn keyed_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list");

    for n in [50, 200, 1000] {
        let old = list(n, 3, None);
        let toggled = list(n, 4, None);
        let removed = list(n, 3, Some(n / 2));

        group.bench_with_input(BenchmarkId::new("unchanged", n), &n, |b, _| {
            b.iter(|| diff(Some(black_box(&old)), black_box(&old)))
        });
        group.bench_with_input(BenchmarkId::new("classes_changed", n), &n, |b, _| {
            b.iter(|| diff(Some(black_box(&old)), black_box(&toggled)))
        });
        group.bench_with_input(BenchmarkId::new("one_removed", n), &n, |b, _| {
            b.iter(|| diff(Some(black_box(&old)), black_box(&removed)))
        });
    }

    group.finish();
}

fn initial_render(c: &mut Criterion) {
    let fresh = list(200, 3, None);
    c.bench_function("initial_render_200", |b| b.iter(|| diff(None, black_box(&fresh))));
}

criterion_group!(benches, keyed_lists, initial_render);
criterion_main!(benches);
