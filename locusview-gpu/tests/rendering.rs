use locusview_core::panel::PanelSettings;
use locusview_core::{
    Attribute, Domain, EngineConfig, EngineError, GenomeInfo, Gesture, InstanceBuilder,
    IntervalRecord, PanelController, RenderMode, ViewportSize,
};
use locusview_gpu::{
    ContextEvent, DensityRenderer, FrameParams, GenomeView, RenderBackend, RenderStyle,
    ShapeRenderer, SoftwareBackend,
};
use std::cell::RefCell;
use std::rc::Rc;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn controller(domains: &[Domain], viewport: ViewportSize) -> PanelController {
    PanelController::new(
        domains,
        viewport,
        Domain::new(0.0, 3_100_000_000.0),
        Domain::new(-1.0, 1.0),
        PanelSettings::default(),
    )
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn shapes(records: &[IntervalRecord], c: &PanelController) -> ShapeRenderer<SoftwareBackend> {
    let mut r = ShapeRenderer::new(SoftwareBackend::new(), RenderStyle::default());
    r.set_data(InstanceBuilder::default().build(records)).unwrap();
    r.update_viewport(c.viewport(), c.panels(), c.value_domain())
        .unwrap();
    r
}

#[test]
fn glyph_lands_on_exact_pixel_far_into_genome() {
    init_logging();
    // anchor = 2_000_000_196, which plain f32 would round to 2_000_000_256
    let records = vec![IntervalRecord::new("far", "9", 2_000_000_197, 2_000_000_197, 0.0)];
    let c = controller(
        &[Domain::new(2_000_000_000.0, 2_000_000_800.0)],
        ViewportSize::new(800, 100),
    );
    let mut r = shapes(&records, &c);
    r.render().unwrap();
    let img = r.read_pixels().unwrap();

    assert_eq!(img.get_pixel(196, 50).0, BLACK);
    assert_eq!(img.get_pixel(193, 50).0, BLACK);
    assert_eq!(img.get_pixel(205, 50).0, WHITE);
    assert_eq!(img.get_pixel(256, 50).0, WHITE);
}

fn glyph_columns(img: &image::RgbaImage, row: u32) -> Vec<u32> {
    (0..img.width())
        .filter(|&x| img.get_pixel(x, row).0 != WHITE)
        .collect()
}

#[test]
fn repeated_zoom_keeps_glyph_on_the_same_columns() {
    let home = Domain::new(2_000_000_000.0, 2_000_000_800.0);
    let records = vec![IntervalRecord::new("far", "9", 2_000_000_197, 2_000_000_197, 0.0)];
    let mut c = controller(&[home], ViewportSize::new(800, 100));
    let mut r = shapes(&records, &c);

    let mut seen = Vec::new();
    for _ in 0..5 {
        c.set_domains(&[home]);
        // zoom about the glyph itself, so it should not move at all
        let zoomed = c
            .apply_gesture(0, Gesture::Zoom { factor: 2.0, anchor_x: 196.0 })
            .unwrap();
        assert!((zoomed.start - 2_000_000_098.0).abs() <= 1.0);
        r.update_viewport(c.viewport(), c.panels(), c.value_domain())
            .unwrap();
        r.render().unwrap();
        seen.push(glyph_columns(&r.read_pixels().unwrap(), 50));
    }

    assert!(seen[0].iter().any(|&x| (192..=200).contains(&x)));
    assert!(seen.iter().all(|columns| *columns == seen[0]));
}

#[test]
fn highlight_outline_changes_only_the_hovered_glyph() {
    let records = vec![
        IntervalRecord::new("a", "1", 51, 51, 0.0).with_color(0xff0000),
        IntervalRecord::new("b", "1", 151, 151, 0.0).with_color(0xff0000),
    ];
    let c = controller(&[Domain::new(0.0, 200.0)], ViewportSize::new(200, 100));
    let mut r = shapes(&records, &c);

    r.render().unwrap();
    let plain = r.read_pixels().unwrap();
    assert_eq!(plain.get_pixel(54, 50).0[0], 255);

    assert!(r.set_highlight(0).unwrap());
    assert_eq!(
        r.context().backend().buffer_words(Attribute::Highlight),
        &[1, 0]
    );
    r.render().unwrap();
    let lit = r.read_pixels().unwrap();

    // rim of the hovered glyph turns to the outline color, its fill stays
    assert!(lit.get_pixel(54, 50).0[0] < 200);
    assert_eq!(lit.get_pixel(50, 50).0, [255, 0, 0, 255]);
    assert_eq!(lit.get_pixel(154, 50).0, plain.get_pixel(154, 50).0);
}

#[test]
fn density_darkens_with_overlap() {
    let c = controller(&[Domain::new(0.0, 100.0)], ViewportSize::new(100, 100));
    let centre_after = |n: usize| {
        let records: Vec<_> = (0..n)
            .map(|i| IntervalRecord::new(format!("p{}", i), "1", 51, 51, 0.0))
            .collect();
        let mut r = DensityRenderer::new(SoftwareBackend::new(), RenderStyle::default());
        r.set_data(InstanceBuilder::default().build(&records)).unwrap();
        r.update_viewport(c.viewport(), c.panels(), c.value_domain())
            .unwrap();
        r.render().unwrap();
        let density = r.context().backend().density_at(50, 50);
        let img = r.read_pixels().unwrap();
        (density, img.get_pixel(50, 50).0[0], img.get_pixel(80, 50).0)
    };

    let (d1, single, _) = centre_after(1);
    let (d3, triple, outside) = centre_after(3);
    assert_eq!(d1, Some(1.0));
    assert_eq!(d3, Some(3.0));
    assert_eq!(single, 128);
    assert!(triple < single);
    assert_eq!(outside, WHITE);
}

#[test]
fn panels_clip_glyphs_at_their_edges() {
    let records = vec![
        IntervalRecord::new("edge", "1", 100, 100, 0.0),
        IntervalRecord::new("right", "1", 1051, 1051, 0.0),
    ];
    let c = controller(
        &[Domain::new(0.0, 100.0), Domain::new(1000.0, 1100.0)],
        ViewportSize::new(200, 100),
    );
    let mut r = shapes(&records, &c);
    r.render().unwrap();
    let img = r.read_pixels().unwrap();

    assert_eq!(img.get_pixel(98, 50).0, BLACK);
    assert_eq!(img.get_pixel(101, 50).0, WHITE);
    assert_eq!(img.get_pixel(150, 50).0, BLACK);
}

#[test]
fn mismatched_buffers_draw_background_only() {
    let mut backend = SoftwareBackend::new();
    backend.initialize(16, 16).unwrap();
    for attribute in Attribute::ALL {
        let data: &[u32] = if attribute == Attribute::Opacity { &[] } else { &[0] };
        backend
            .reallocate(attribute, bytemuck::cast_slice(data))
            .unwrap();
    }

    let c = controller(&[Domain::new(0.0, 16.0)], ViewportSize::new(16, 16));
    let frame = FrameParams::build(c.viewport(), c.panels(), c.value_domain(), &RenderStyle::default());
    backend.draw_shapes(&frame).unwrap();
    let img = backend.read_pixels().unwrap();
    assert!(img.pixels().all(|p| p.0 == WHITE));
}

#[test]
fn restore_reproduces_the_frame_after_loss() {
    let records = vec![IntervalRecord::new("a", "1", 51, 51, 0.0).with_color(0x2a6fef)];
    let c = controller(&[Domain::new(0.0, 100.0)], ViewportSize::new(100, 100));
    let mut r = shapes(&records, &c);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    r.on_context_event(move |e| sink.borrow_mut().push(e));

    r.render().unwrap();
    let before = r.read_pixels().unwrap();

    r.backend_mut().simulate_loss();
    assert!(matches!(r.render(), Err(EngineError::ContextLost)));
    assert!(matches!(r.set_highlight(0), Err(EngineError::ContextLost)));

    r.restore().unwrap();
    r.render().unwrap();
    let after = r.read_pixels().unwrap();

    assert_eq!(before.as_raw(), after.as_raw());
    assert_eq!(
        *events.borrow(),
        vec![ContextEvent::Lost, ContextEvent::Restored]
    );
}

#[test]
fn view_in_density_mode_renders_records() {
    let mut config = EngineConfig::default();
    config.render.mode = RenderMode::Density;
    let mut view = GenomeView::new(SoftwareBackend::new(), config, ViewportSize::new(200, 100)).unwrap();
    view.set_genome(GenomeInfo::grch37());
    view.load_records(vec![
        IntervalRecord::new("a", "1", 101, 101, 0.0),
        IntervalRecord::new("b", "1", 101, 101, 0.0),
    ])
    .unwrap();
    view.set_common_value_range(Some(Domain::new(-1.0, 1.0)));
    view.set_domains(&[Domain::new(0.0, 200.0)]);
    view.render().unwrap();

    let img = view.read_pixels().unwrap();
    assert!(img.get_pixel(100, 50).0[0] < 128);
    assert_eq!(img.get_pixel(20, 20).0, WHITE);
}

#[test]
fn rendered_frame_survives_png_export() {
    init_logging();
    let records = vec![IntervalRecord::new("a", "1", 51, 51, 0.0).with_color(0x2a6fef)];
    let c = controller(&[Domain::new(0.0, 100.0)], ViewportSize::new(100, 100));
    let mut r = shapes(&records, &c);
    r.render().unwrap();
    let img = r.read_pixels().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    img.save(&path).unwrap();
    let reloaded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(reloaded.as_raw(), img.as_raw());
    assert_eq!(reloaded.get_pixel(50, 50).0, [0x2a, 0x6f, 0xef, 255]);
}
