//! Property tests for partitioning and model invariants.
//!
//! Uses proptest to verify:
//! 1. Split partitions are disjoint, cover the input, and are seed-deterministic
//! 2. Test partition size is `ceil(n * test_size)`
//! 3. The fitted penalty term never grows with a larger alpha
//! 4. Artifact tampering is always detected

use proptest::prelude::*;
use winelab_core::data::{train_test_split, Table};
use winelab_core::model::{ArtifactError, ElasticNet, ModelArtifact};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_table() -> impl Strategy<Value = Table> {
    (2usize..200).prop_map(|n| Table {
        headers: vec!["id".into(), "quality".into()],
        rows: (0..n).map(|i| vec![i.to_string(), (i % 7).to_string()]).collect(),
    })
}

fn arb_dataset() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<f64>)> {
    prop::collection::vec((-10.0..10.0_f64, -10.0..10.0_f64, -1.0..1.0_f64), 10..60).prop_map(
        |rows| {
            let x: Vec<Vec<f64>> = rows.iter().map(|(a, b, _)| vec![*a, *b]).collect();
            let y = rows
                .iter()
                .map(|(a, b, noise)| 1.5 * a - 0.5 * b + 4.0 + noise)
                .collect();
            (x, y)
        },
    )
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn split_is_a_partition(table in arb_table(), test_size in 0.05..0.5_f64, seed in any::<u64>()) {
        let (train, test) = train_test_split(&table, test_size, seed).unwrap();

        let expected_test = (table.len() as f64 * test_size).ceil() as usize;
        prop_assert_eq!(test.len(), expected_test);
        prop_assert_eq!(train.len() + test.len(), table.len());

        let mut ids: Vec<usize> = train
            .rows
            .iter()
            .chain(test.rows.iter())
            .map(|r| r[0].parse().unwrap())
            .collect();
        ids.sort_unstable();
        prop_assert_eq!(ids, (0..table.len()).collect::<Vec<_>>());

        let again = train_test_split(&table, test_size, seed).unwrap();
        prop_assert_eq!(again, (train, test));
    }

    #[test]
    fn stronger_penalty_never_grows_penalty_term((x, y) in arb_dataset()) {
        // l1_ratio = 0.5: 0.5 * |w|_1 + 0.25 * |w|_2^2
        let penalty = |alpha: f64| {
            let mut model = ElasticNet::new(alpha, 0.5).with_tol(1e-8).with_max_iter(5000);
            model.fit(&x, &y).unwrap();
            let w = model.coefficients().unwrap();
            0.5 * w.iter().map(|c| c.abs()).sum::<f64>()
                + 0.25 * w.iter().map(|c| c * c).sum::<f64>()
        };
        prop_assert!(penalty(2.0) <= penalty(0.1) + 1e-4);
    }

    #[test]
    fn any_payload_flip_is_detected((x, y) in arb_dataset(), offset in any::<prop::sample::Index>()) {
        let mut model = ElasticNet::new(0.1, 0.5);
        model.fit(&x, &y).unwrap();
        let mut bytes = ModelArtifact::new(vec!["a".into(), "b".into()], "y".into(), model)
            .to_bytes()
            .unwrap();

        let payload_start = 48;
        let i = payload_start + offset.index(bytes.len() - payload_start);
        bytes[i] ^= 0x20;
        prop_assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(ArtifactError::ChecksumMismatch)
        ));
    }
}
