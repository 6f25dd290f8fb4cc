use criterion::{black_box, criterion_group, criterion_main, Criterion};
use locusview_core::panel::PanelSettings;
use locusview_core::{
    Domain, HitTester, InstanceBuilder, IntervalRecord, PanelController, ViewportSize,
};

fn synthetic_records(n: u64) -> Vec<IntervalRecord> {
    (0..n)
        .map(|i| {
            let start = i * 30_000;
            IntervalRecord::new(format!("r{}", i), "1", start, start + 1_000, ((i % 97) as f64 / 48.0) - 1.0)
                .with_color((i as u32).wrapping_mul(2_654_435_761) & 0xffffff)
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let records = synthetic_records(100_000);
    let builder = InstanceBuilder::default();
    c.bench_function("build_100k", |b| b.iter(|| builder.build(black_box(&records))));
}

fn bench_pick(c: &mut Criterion) {
    let records = synthetic_records(100_000);
    let controller = PanelController::new(
        &[Domain::new(0.0, 3_000_000_000.0)],
        ViewportSize::new(1600, 400),
        Domain::new(0.0, 3_000_000_000.0),
        Domain::new(-1.5, 1.5),
        PanelSettings::default(),
    );
    let mut tester = HitTester::default();
    tester.refresh(&records, controller.panels());
    let panel = &controller.panels()[0];

    c.bench_function("find_nearest_100k", |b| {
        b.iter(|| tester.find_nearest(&records, panel, black_box(800.0), black_box(200.0)))
    });
}

criterion_group!(benches, bench_build, bench_pick);
criterion_main!(benches);
