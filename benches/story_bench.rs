use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use inkvm::Story;

/// A chain of `knots` knots, each printing a line, bumping a global and
/// diverting to the next.
fn chain_story(knots: usize) -> String {
    let mut named = Vec::with_capacity(knots + 1);
    for i in 0..knots {
        let next = if i + 1 < knots {
            format!(r#"{{"->":"k{}"}}"#, i + 1)
        } else {
            r#""end""#.to_string()
        };
        named.push(format!(
            r##""k{i}":["^line {i}","\n","ev",{{"VAR?":"n"}},1,"+","/ev",{{"VAR=":"n","re":true}},{next},{{"#f":1}}]"##
        ));
    }
    named.push(r#""global decl":["ev",0,{"VAR=":"n"},"/ev","end",null]"#.to_string());
    format!(
        r#"{{"inkVersion":21,"root":[{{"->":"k0"}},{{{}}}],"listDefs":{{}}}}"#,
        named.join(",")
    )
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("story/load");

    for &size in &[10, 100, 1_000] {
        let source = chain_story(size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| black_box(Story::from_json(source).unwrap()));
        });
    }

    group.finish();
}

fn bench_continue(c: &mut Criterion) {
    let mut group = c.benchmark_group("story/continue_maximally");

    for &size in &[10, 100, 1_000] {
        let source = chain_story(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter_batched(
                || Story::from_json(source).unwrap(),
                |mut story| black_box(story.continue_maximally().unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_save_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("story/save_state");

    for &size in &[10, 100, 1_000] {
        let mut story = Story::from_json(&chain_story(size)).unwrap();
        story.continue_maximally().unwrap();
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| black_box(story.save_state().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_load, bench_continue, bench_save_state);
criterion_main!(benches);
