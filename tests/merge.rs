mod common;

use common::synthetic::{crystal_with, observation};
use still_merge::{CancelToken, Hkl, MergeOptions, MergePipeline, SymOpList};

fn pipeline(point_group: &str, min_redundancy: u32) -> MergePipeline {
    MergePipeline::new(MergeOptions {
        point_group: point_group.to_string(),
        no_scale: true,
        min_redundancy,
        ..Default::default()
    })
    .expect("valid options")
}

#[test]
fn single_crystal_single_reflection() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut crystals = vec![crystal_with(vec![observation(
        Hkl::new(1, 0, 0),
        100.0,
        10.0,
        1.0,
    )])];

    let outcome = pipeline("1", 1)
        .run(&mut crystals, &CancelToken::new())
        .expect("merge succeeds");

    assert_eq!(outcome.reflections.len(), 1);
    let r = &outcome.reflections[0];
    assert_eq!(r.hkl, Hkl::new(1, 0, 0));
    assert!((r.i_full - 100.0).abs() < 1e-9);
    assert_eq!(r.redundancy, 1);
    assert!(r.sigma.abs() < 1e-9);
    assert!(!r.suppressed);
}

#[test]
fn two_crystals_perfect_agreement() {
    let mut crystals = vec![
        crystal_with(vec![observation(Hkl::new(2, 0, 0), 50.0, 5.0, 0.5)]),
        crystal_with(vec![observation(Hkl::new(2, 0, 0), 50.0, 5.0, 0.5)]),
    ];

    let outcome = pipeline("1", 2)
        .run(&mut crystals, &CancelToken::new())
        .expect("merge succeeds");

    assert_eq!(outcome.reflections.len(), 1);
    let r = &outcome.reflections[0];
    assert!((r.i_full - 100.0).abs() < 1e-9, "partiality correction: 50/0.5");
    assert_eq!(r.redundancy, 2);
    assert!(r.sigma.abs() < 1e-9);
    assert!(!r.suppressed);
}

#[test]
fn equivalents_fold_to_one_key() {
    // Every 4/mmm equivalent of (2,1,3), one observation each.
    let sym = SymOpList::from_name("4/mmm").unwrap();
    let equivalents = sym.equivalents(Hkl::new(2, 1, 3));
    assert_eq!(equivalents.len(), 16);

    let observations = equivalents
        .iter()
        .map(|&hkl| observation(hkl, 100.0, 10.0, 1.0))
        .collect();
    let mut crystals = vec![crystal_with(observations)];

    let outcome = pipeline("4/mmm", 1)
        .run(&mut crystals, &CancelToken::new())
        .expect("merge succeeds");

    assert_eq!(
        outcome.reflections.len(),
        1,
        "all equivalents must land on one asymmetric-unit key"
    );
    let r = &outcome.reflections[0];
    assert_eq!(r.hkl, sym.to_asu(Hkl::new(2, 1, 3)));
    assert_eq!(r.redundancy, equivalents.len() as u32);
    assert!((r.i_full - 100.0).abs() < 1e-9);
}

#[test]
fn merged_invariants_hold() {
    let mut crystals = vec![
        crystal_with(vec![
            observation(Hkl::new(1, 0, 0), 80.0, 8.0, 0.8),
            observation(Hkl::new(2, 1, 0), 40.0, 4.0, 0.4),
        ]),
        crystal_with(vec![observation(Hkl::new(1, 0, 0), 120.0, 12.0, 1.0)]),
    ];

    let outcome = pipeline("1", 2)
        .run(&mut crystals, &CancelToken::new())
        .expect("merge succeeds");

    for r in &outcome.reflections {
        assert!(r.redundancy >= 1);
        assert!(r.i_full.is_finite());
        assert!(r.sigma >= 0.0);
    }
    let lone = outcome
        .reflections
        .iter()
        .find(|r| r.hkl == Hkl::new(2, 1, 0))
        .unwrap();
    assert!(lone.suppressed, "redundancy 1 is below the minimum of 2");
}
