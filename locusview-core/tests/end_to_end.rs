use locusview_core::{
    AnchorMode, Domain, HitTester, InstanceBuilder, IntervalRecord, PanelController, StyleRules,
    ViewportSize,
};
use locusview_core::panel::PanelSettings;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn demo_records() -> Vec<IntervalRecord> {
    vec![
        IntervalRecord::new("r1", "1", 100, 200, 0.5).with_color(0x2a6fef),
        IntervalRecord::new("r2", "1", 500, 600, -0.5).with_color(0xe53935),
        IntervalRecord::new("r3", "9", 2_000_000_000, 2_000_000_100, 1.0)
            .with_annotation("Oncogenicity: Likely Oncogenic"),
    ]
}

#[test]
fn visible_subset_follows_zoom() {
    init_logging();
    let records = demo_records();
    let mut controller = PanelController::new(
        &[Domain::new(0.0, 1000.0)],
        ViewportSize::new(800, 400),
        Domain::new(0.0, 3_100_000_000.0),
        Domain::new(-1.0, 1.0),
        PanelSettings::default(),
    );
    let mut tester = HitTester::new(8.0, AnchorMode::Midpoint);

    tester.refresh(&records, controller.panels());
    assert_eq!(tester.visible(0), &[0, 1]);

    controller.set_domains(&[Domain::new(2_000_000_000.0, 2_000_000_200.0)]);
    tester.refresh(&records, controller.panels());
    assert_eq!(tester.visible(0), &[2]);

    let panel = &controller.panels()[0];
    let (x, _) = tester.screen_position(panel, &records[2]);
    assert_eq!(x, 49.0 * 4.0);
}

#[test]
fn out_of_range_request_is_clamped_then_recovered() {
    init_logging();
    let mut controller = PanelController::new(
        &[Domain::new(0.0, 1000.0)],
        ViewportSize::new(800, 400),
        Domain::new(0.0, 1000.0),
        Domain::new(-1.0, 1.0),
        PanelSettings::default(),
    );
    controller.set_domains(&[Domain::new(500.0, 5000.0)]);
    assert_eq!(controller.domains(), vec![Domain::new(500.0, 1000.0)]);

    controller.set_full_extent(Domain::new(0.0, 10_000.0));
    assert_eq!(controller.domains(), vec![Domain::new(500.0, 5000.0)]);
}

#[test]
fn built_positions_match_hit_test_positions() {
    let records = demo_records();
    let set = InstanceBuilder::new(AnchorMode::Midpoint, StyleRules::default()).build(&records);
    for (i, r) in records.iter().enumerate() {
        let pos = set.position_high[i] as f64 + set.position_low[i] as f64;
        assert_eq!(pos, r.anchor_position(AnchorMode::Midpoint));
    }
}
