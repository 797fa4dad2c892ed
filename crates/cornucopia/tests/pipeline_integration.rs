//! Integration tests for sampling, application and replay of transform trees.
//!
//! These tests run whole pipelines over synthetic co-registered volumes.

use std::collections::BTreeSet;

use cornucopia::prelude::*;
use cornucopia_core::NodePath;
use ndarray::{s, Array3};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Create a synthetic image, label map and two-channel k-space volume.
fn create_synthetic_bundle(seed: u64, size: usize) -> Bundle {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let label = Array3::from_shape_fn((1, size, size), |_| rng.gen_range(0..3) as f32);
    let image = label.mapv(|class| class * 100.0) + Array3::from_shape_fn((1, size, size), |_| rng.gen::<f32>());
    let kspace = Array3::from_shape_fn((2, size, size), |_| rng.gen::<f32>() - 0.5);

    Bundle::new()
        .with("image", Member::intensity(image))
        .with("label", Member::label(label))
        .with("kspace", Member::kspace(kspace))
}

fn flat(bundle: &Bundle, role: &str) -> Vec<f32> {
    bundle.get(role).unwrap().data().iter().copied().collect()
}

fn flip_first_axis(bundle: &Bundle, role: &str) -> Vec<f32> {
    let data = bundle.get(role).unwrap().data();
    data.slice(s![.., ..;-1, ..]).iter().copied().collect()
}

fn scenario() -> Sequence {
    Sequence::new()
        .then(Probability::new(Flip::new(vec![0]), 0.5))
        .then(RandomChoice::new().or(Gamma::new(0.5, 1.5)).or(Identity))
}

fn augmentation_tree() -> Sequence {
    Sequence::new()
        .then(RandomFlip::new(2))
        .then(Translate::new(2.5, 2))
        .then(RandomChoice::new().or(Gamma::new(0.5, 1.5)).or(GaussianNoise::new(0.2)))
        .then(Probability::new(IntensityScale::new(0.8, 1.25), 0.5))
        .then(RandomPatch::new(vec![10], 2))
}

#[test]
fn test_same_seed_same_result() {
    let pipeline = Pipeline::new(augmentation_tree());
    let bundle = create_synthetic_bundle(0, 16);

    let (first, first_params) = pipeline.run(&bundle, Some(Seed::new(42))).unwrap();
    let (second, second_params) = pipeline.run(&bundle, Some(Seed::new(42))).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_params, second_params);
    assert_eq!(first_params.to_json().unwrap(), second_params.to_json().unwrap());
}

#[test]
fn test_different_seeds_differ() {
    let pipeline = Pipeline::new(Translate::new(2.5, 2));
    let a = pipeline.sample(Some(Seed::new(1))).unwrap();
    let b = pipeline.sample(Some(Seed::new(2))).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_sibling_independence() {
    let seed = Some(Seed::new(9));

    // A sibling that draws nothing and one that draws a lot.
    let quiet = Pipeline::new(Sequence::new().then(Identity).then(Gamma::new(0.5, 1.5)));
    let busy = Pipeline::new(
        Sequence::new()
            .then(Translate::new(3.0, 3))
            .then(Gamma::new(0.5, 1.5)),
    );
    let (Params::Sequence { children: quiet }, Params::Sequence { children: busy }) =
        (quiet.sample(seed).unwrap(), busy.sample(seed).unwrap())
    else {
        panic!("expected sequence parameters");
    };
    assert_eq!(quiet[1], busy[1]);

    // A closed gate does not shift the next sibling's stream.
    for p in [0.0, 1.0] {
        let gated = Pipeline::new(
            Sequence::new()
                .then(Probability::new(GaussianNoise::new(0.1), p))
                .then(Gamma::new(0.5, 1.5)),
        );
        let Params::Sequence { children } = gated.sample(seed).unwrap() else {
            panic!("expected sequence parameters");
        };
        assert_eq!(children[1], quiet[1]);
    }
}

#[test]
fn test_widening_a_sibling_keeps_the_others() {
    let tree = |low: f64, high: f64| {
        RandomSubset::new(SubsetSize::Exact(3))
            .with(Gamma::new(low, high))
            .with(IntensityScale::new(0.8, 1.25))
            .with(Translate::new(2.0, 2))
    };
    for seed in 0..20 {
        let narrow = Pipeline::new(tree(0.9, 1.1)).sample(Some(Seed::new(seed))).unwrap();
        let wide = Pipeline::new(tree(0.2, 5.0)).sample(Some(Seed::new(seed))).unwrap();
        let (Params::Subset { children: narrow, .. }, Params::Subset { children: wide, .. }) = (narrow, wide) else {
            panic!("expected subset parameters");
        };
        assert_ne!(narrow[0], wide[0]);
        assert_eq!(narrow[1..], wide[1..]);
    }
}

#[test]
fn test_widening_a_random_order_child_keeps_its_siblings() {
    let tree = |low: f64, high: f64| {
        RandomOrder::new()
            .then(Gamma::new(low, high))
            .then(IntensityScale::new(0.8, 1.25))
            .then(Translate::new(2.0, 2))
    };
    for seed in 0..20 {
        let narrow = Pipeline::new(tree(0.9, 1.1)).sample(Some(Seed::new(seed))).unwrap();
        let wide = Pipeline::new(tree(0.2, 5.0)).sample(Some(Seed::new(seed))).unwrap();
        let (
            Params::Ordered { order: narrow_order, children: narrow },
            Params::Ordered { order: wide_order, children: wide },
        ) = (narrow, wide)
        else {
            panic!("expected ordered parameters");
        };
        assert_ne!(narrow[0], wide[0]);
        assert_eq!(narrow[1..], wide[1..]);
        assert_eq!(narrow_order, wide_order);
    }
}

#[test]
fn test_field_of_view_keeps_members_aligned() {
    let pipeline = Pipeline::new(
        Sequence::new()
            .then(Crop::new(vec![2]))
            .then(Flip::new(vec![0]).with_targets(Targets::roles(["image"])))
            .then(Pad::new(vec![1]).with_side(Side::Post))
            .then(PowerTwo::new(vec![2])),
    );
    let bundle = create_synthetic_bundle(4, 10);
    let (out, params) = pipeline.run(&bundle, Some(Seed::new(4))).unwrap();

    // 10 -> 6 -> 7 -> 8
    for role in ["image", "label", "kspace"] {
        assert_eq!(out.get(role).unwrap().spatial_shape(), &[8, 8]);
    }
    let labels: BTreeSet<u32> = flat(&out, "label").iter().map(|&v| v as u32).collect();
    assert!(labels.is_subset(&[0, 1, 2].into_iter().collect()));
    assert_eq!(pipeline.replay(&params, &bundle).unwrap(), out);
}

#[test]
fn test_replay_equivalence() {
    let pipeline = Pipeline::new(augmentation_tree());

    for seed in 0..20 {
        let bundle = create_synthetic_bundle(seed, 16);
        let (out, params) = pipeline.run(&bundle, Some(Seed::new(seed))).unwrap();
        assert_eq!(pipeline.replay(&params, &bundle).unwrap(), out);

        let restored = Params::from_json(&params.to_json().unwrap()).unwrap();
        assert_eq!(restored, params);
        assert_eq!(pipeline.replay(&restored, &bundle).unwrap(), out);
    }
}

#[test]
fn test_replay_on_companion_volume() {
    let pipeline = Pipeline::new(Sequence::new().then(RandomFlip::new(2)).then(Translate::new(2.0, 2)));
    let bundle = create_synthetic_bundle(3, 12);
    let (out, params) = pipeline.run(&bundle, Some(Seed::new(3))).unwrap();

    // Replaying on the label alone gives the label of the full run.
    let label_only = Bundle::new().with("label", bundle.get("label").unwrap().clone());
    let replayed = pipeline.replay(&params, &label_only).unwrap();
    assert_eq!(replayed.get("label"), out.get("label"));
}

#[test]
fn test_labels_keep_their_values() {
    let pipeline = Pipeline::new(augmentation_tree());
    let allowed: BTreeSet<u32> = [0, 1, 2].into_iter().collect();

    for seed in 0..50 {
        let bundle = create_synthetic_bundle(seed, 16);
        let (out, _) = pipeline.run(&bundle, Some(Seed::new(seed))).unwrap();

        let label = flat(&out, "label");
        assert!(label.iter().all(|v| v.fract() == 0.0));
        let values: BTreeSet<u32> = label.iter().map(|&v| v as u32).collect();
        assert!(values.is_subset(&allowed));

        for role in ["image", "label"] {
            assert_eq!(out.get(role).unwrap().spatial_shape(), &[10, 10]);
        }
        assert_eq!(out.get("kspace").unwrap().shape(), &[2, 10, 10]);
    }
}

#[test]
fn test_probability_extremes() {
    let bundle = create_synthetic_bundle(1, 8);

    let never = Pipeline::new(Probability::new(Gamma::new(0.5, 1.5), 0.0));
    let always = Pipeline::new(Probability::new(Gamma::new(0.5, 1.5), 1.0));
    for seed in 0..1000 {
        let (out, params) = never.run(&bundle, Some(Seed::new(seed))).unwrap();
        assert_eq!(params, Params::Gated { gate: false, child: None });
        assert_eq!(out, bundle);

        let params = always.sample(Some(Seed::new(seed))).unwrap();
        assert!(matches!(params, Params::Gated { gate: true, child: Some(_) }));
    }
}

#[test]
fn test_random_choice_covers_every_child() {
    let pipeline = Pipeline::new(
        RandomChoice::new()
            .or(Identity)
            .or(Gamma::new(0.5, 1.5))
            .or(IntensityScale::new(0.8, 1.25)),
    );
    let mut seen = BTreeSet::new();
    for seed in 0..300 {
        match pipeline.sample(Some(Seed::new(seed))).unwrap() {
            Params::Choice { choice_index, .. } => {
                seen.insert(choice_index);
            }
            other => panic!("expected choice parameters, got {other:?}"),
        }
    }
    assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test]
fn test_random_choice_follows_weights() {
    let pipeline = Pipeline::new(RandomChoice::new().or(Identity).or(Identity).with_weights(vec![1.0, 3.0]));
    let trials = 4000;
    let second = (0..trials)
        .filter(|&seed| {
            matches!(
                pipeline.sample(Some(Seed::new(seed))).unwrap(),
                Params::Choice { choice_index: 1, .. }
            )
        })
        .count();
    let freq = second as f64 / trials as f64;
    assert!((0.70..0.80).contains(&freq), "frequency {freq}");
}

#[test]
fn test_random_subset_and_order() {
    let subset = Pipeline::new(
        RandomSubset::new(SubsetSize::Any)
            .with(Identity)
            .with(Gamma::new(0.5, 1.5))
            .with(IntensityScale::new(0.8, 1.25))
            .with(GaussianNoise::new(0.1)),
    );
    let order = Pipeline::new(
        RandomOrder::new()
            .then(Identity)
            .then(Gamma::new(0.5, 1.5))
            .then(IntensityScale::new(0.8, 1.25)),
    );
    let bundle = create_synthetic_bundle(2, 8);

    for seed in 0..100 {
        let (out, params) = subset.run(&bundle, Some(Seed::new(seed))).unwrap();
        let Params::Subset { ref indices, ref children } = params else {
            panic!("expected subset parameters");
        };
        assert!((1..=4).contains(&indices.len()));
        assert_eq!(indices.len(), children.len());
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(subset.replay(&params, &bundle).unwrap(), out);

        let Params::Ordered { order: drawn, children } = order.sample(Some(Seed::new(seed))).unwrap() else {
            panic!("expected ordered parameters");
        };
        let mut sorted = drawn.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
        assert_eq!(children.len(), 3);
    }
}

#[test]
fn test_flip_or_gamma_scenario() {
    let pipeline = Pipeline::new(scenario());
    let bundle = create_synthetic_bundle(42, 8);
    let (out, params) = pipeline.run(&bundle, Some(Seed::new(42))).unwrap();

    let Params::Sequence { ref children } = params else {
        panic!("expected sequence parameters");
    };
    let Params::Gated { gate, .. } = children[0] else {
        panic!("expected gated parameters");
    };
    let Params::Choice { choice_index, .. } = children[1] else {
        panic!("expected choice parameters");
    };

    // Label and k-space see only the flip.
    for role in ["label", "kspace"] {
        let expected = if gate { flip_first_axis(&bundle, role) } else { flat(&bundle, role) };
        assert_eq!(flat(&out, role), expected);
    }
    let geometric = if gate { flip_first_axis(&bundle, "image") } else { flat(&bundle, "image") };
    if choice_index == 1 {
        assert_eq!(flat(&out, "image"), geometric);
    } else {
        assert_eq!(out.get("image").unwrap().shape(), &[1, 8, 8]);
    }

    assert_eq!(pipeline.replay(&params, &bundle).unwrap(), out);
}

#[test]
fn test_scenario_reaches_every_branch() {
    let pipeline = Pipeline::new(scenario());
    let mut branches = BTreeSet::new();
    for seed in 0..200 {
        let Params::Sequence { children } = pipeline.sample(Some(Seed::new(seed))).unwrap() else {
            panic!("expected sequence parameters");
        };
        let (Params::Gated { gate, .. }, Params::Choice { choice_index, .. }) = (&children[0], &children[1]) else {
            panic!("unexpected parameter shape");
        };
        branches.insert((*gate, *choice_index));
    }
    assert_eq!(branches.len(), 4);
}

#[test]
fn test_missing_role_is_located() {
    let pipeline = Pipeline::new(
        Sequence::new()
            .then(Identity)
            .then(Gamma::new(0.5, 1.5).with_targets(Targets::roles(["t2"]))),
    );
    let err = pipeline.run(&create_synthetic_bundle(0, 8), Some(Seed::new(0))).unwrap_err();
    assert!(matches!(err, CoreError::Role { ref role, .. } if role == "t2"));
    assert_eq!(err.path(), Some(&NodePath::from(vec![1])));
}

#[test]
fn test_rank_mismatch_is_located() {
    let pipeline = Pipeline::new(
        Sequence::new()
            .then(Identity)
            .then(Sequence::new().then(Identity).then(Translate::new(1.0, 3))),
    );
    let err = pipeline.run(&create_synthetic_bundle(0, 8), Some(Seed::new(0))).unwrap_err();
    assert!(matches!(err, CoreError::ShapeMismatch { .. }));
    assert_eq!(err.path(), Some(&NodePath::from(vec![1, 1])));
}

#[test]
fn test_disagreeing_spatial_shapes() {
    let bundle = Bundle::new()
        .with("image", Member::intensity(Array3::<f32>::zeros((1, 8, 8))))
        .with("label", Member::label(Array3::<f32>::zeros((1, 6, 6))));
    let err = Pipeline::new(Flip::new(vec![0])).run(&bundle, Some(Seed::new(0))).unwrap_err();
    assert!(matches!(err, CoreError::ShapeMismatch { ref role, .. } if role == "label"));
}

#[test]
fn test_replay_with_foreign_params() {
    let two = Pipeline::new(Sequence::new().then(Identity).then(Identity));
    let three = Pipeline::new(Sequence::new().then(Identity).then(Identity).then(Identity));
    let params = two.sample(Some(Seed::new(0))).unwrap();
    let err = three.replay(&params, &create_synthetic_bundle(0, 8)).unwrap_err();
    assert!(matches!(err, CoreError::ReplayMismatch { .. }));

    let err = Pipeline::new(Probability::new(Identity, 0.5))
        .replay(&params, &create_synthetic_bundle(0, 8))
        .unwrap_err();
    assert!(matches!(err, CoreError::ReplayMismatch { .. }));
}

#[test]
fn test_run_batch() {
    let pipeline = Pipeline::new(augmentation_tree());
    let bundles: Vec<Bundle> = (0..6).map(|i| create_synthetic_bundle(i, 16)).collect();

    let first = pipeline.run_batch(&bundles, Seed::new(5));
    let second = pipeline.run_batch(&bundles, Seed::new(5));
    assert_eq!(first.len(), bundles.len());

    let mut batch_sampler = Sampler::new(Seed::new(5));
    for ((a, b), bundle) in first.iter().zip(&second).zip(&bundles) {
        let (out_a, params_a) = a.as_ref().unwrap();
        let (out_b, params_b) = b.as_ref().unwrap();
        assert_eq!(out_a, out_b);
        assert_eq!(params_a, params_b);

        let item_seed = batch_sampler.fork().seed();
        let (out, params) = pipeline.run(bundle, Some(item_seed)).unwrap();
        assert_eq!(&out, out_a);
        assert_eq!(&params, params_a);
    }
}

#[test]
fn test_pipeline_from_json_document() {
    let json = r#"{
        "v": 1,
        "seed": 42,
        "root": {
            "type": "sequence",
            "children": [
                { "type": "probability", "p": 0.5,
                  "transform": { "type": "flip", "axes": [0] } },
                { "type": "random_choice",
                  "children": [
                      { "type": "gamma", "gamma": { "kind": "uniform", "low": 0.5, "high": 1.5 } },
                      { "type": "identity" }
                  ] }
            ]
        }
    }"#;
    let config = PipelineConfig::from_json(json).unwrap();
    let from_json = config.build().unwrap();
    let from_code = Pipeline::new(scenario());
    let bundle = create_synthetic_bundle(42, 8);

    let (json_out, json_params) = from_json.run(&bundle, config.seed()).unwrap();
    let (code_out, code_params) = from_code.run(&bundle, Some(Seed::new(42))).unwrap();
    assert_eq!(json_out, code_out);
    assert_eq!(json_params, code_params);
}

#[test]
fn test_params_json_is_inspectable() {
    let pipeline = Pipeline::new(scenario());
    let params = pipeline.sample(Some(Seed::new(42))).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&params.to_json_pretty().unwrap()).unwrap();
    assert_eq!(doc["node"], "sequence");
    assert_eq!(doc["children"][0]["node"], "gated");
    assert_eq!(doc["children"][1]["node"], "choice");
}
