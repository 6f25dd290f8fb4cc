use locusview_core::{Domain, Gesture, PanelController, ViewportSize};
use locusview_core::panel::PanelSettings;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Begin(usize),
    Apply(usize, Gesture),
    End(usize),
}

fn gesture() -> impl Strategy<Value = Gesture> {
    prop_oneof![
        (-2_000.0f64..2_000.0).prop_map(|dx| Gesture::Pan { dx }),
        (0.05f64..20.0, -50.0f64..450.0).prop_map(|(factor, anchor_x)| Gesture::Zoom { factor, anchor_x }),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..2).prop_map(Step::Begin),
        (0usize..2, gesture()).prop_map(|(p, g)| Step::Apply(p, g)),
        (0usize..2).prop_map(Step::End),
    ]
}

fn two_panels() -> PanelController {
    PanelController::new(
        &[Domain::new(1_000.0, 5_000.0), Domain::new(20_000.0, 40_000.0)],
        ViewportSize::new(800, 300),
        Domain::new(0.0, 100_000.0),
        Domain::new(-1.0, 1.0),
        PanelSettings::default(),
    )
}

fn assert_consistent(c: &PanelController) -> Result<(), TestCaseError> {
    let d = c.domains();
    for domain in &d {
        prop_assert!(domain.start < domain.end, "inverted domain {:?}", domain);
        prop_assert!(domain.start >= 0.0 && domain.end <= 100_000.0);
        prop_assert_eq!(domain.start, domain.start.round());
        prop_assert_eq!(domain.end, domain.end.round());
    }
    prop_assert!(d[0].end <= d[1].start, "panels overlap: {:?} / {:?}", d[0], d[1]);
    Ok(())
}

proptest! {
    #[test]
    fn domains_never_overlap(steps in proptest::collection::vec(step(), 1..60)) {
        let mut c = two_panels();
        for s in steps {
            match s {
                Step::Begin(p) => c.begin_gesture(p).unwrap(),
                Step::Apply(p, g) => { c.apply_gesture(p, g).unwrap(); }
                Step::End(p) => c.end_gesture(p).unwrap(),
            }
            assert_consistent(&c)?;
        }
    }

    #[test]
    fn flush_yields_latest_domain(steps in proptest::collection::vec((0usize..2, gesture()), 1..30)) {
        let mut c = two_panels();
        let mut last = [None, None];
        for (p, g) in steps {
            last[p] = Some(c.apply_gesture(p, g).unwrap());
        }
        let updates = c.flush_frame();
        for u in &updates {
            prop_assert_eq!(Some(u.domain), last[u.panel]);
        }
        prop_assert_eq!(updates.len(), last.iter().filter(|l| l.is_some()).count());
        prop_assert!(!c.has_pending());
    }
}
