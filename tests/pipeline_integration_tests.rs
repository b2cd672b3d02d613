use approx::assert_relative_eq;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use u_numchain::config::{Config, Mode};
use u_numchain::error::BroadcastError;
use u_numchain::*;

fn seq(xs: &[f64]) -> Value {
    Value::from(xs.to_vec())
}

fn random_vec(rng: &mut SmallRng, n: usize, lo: f64, hi: f64) -> Vec<f64> {
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}

// ============================================================================
// Free functions
// ============================================================================

#[test]
fn test_documented_arithmetic() {
    let data = seq(&[5.0, 7.0, 1.0, 4.0]);
    assert_eq!(sum(&data, None), Value::from(17));
    assert_eq!(
        sum(&data, Some(&seq(&[1.0, 0.0, 2.0, -2.0]))),
        seq(&[6.0, 7.0, 3.0, 2.0])
    );
    assert_eq!(subtract(&data, Some(&Value::from(1))), seq(&[4.0, 6.0, 0.0, 3.0]));
    assert_eq!(
        divide(&data, Some(&seq(&[1.0, 7.0, 0.5, -2.0]))),
        seq(&[5.0, 1.0, 2.0, -2.0])
    );
    assert_eq!(
        multiply(&seq(&[-3.0, 1.0, 0.0, 0.5, 17.0]), Some(&Value::from(2))),
        seq(&[-6.0, 2.0, 0.0, 1.0, 34.0])
    );
}

#[test]
fn test_documented_rounding_and_means() {
    assert_eq!(round(&Value::from(55.000000001), 2), Value::from(55));
    assert_eq!(round(&Value::from(10.876), 2), Value::from(10.88));

    let age = seq(&[19.0, 22.0, 18.0, 36.0, 25.0]);
    assert_eq!(mean(&age, None), 24.0);
    assert_eq!(mean(&age, Some(&seq(&[2.0, 1.0, 2.0, 5.0, 3.0]))), 27.0);
}

#[test]
fn test_linearize_mixed() {
    let items = [
        Value::from(5),
        Value::from(vec![4, 7]),
        Value::mapping([("0", 1)]),
        Value::from(12),
        Value::from(vec![34]),
    ];
    assert_eq!(
        Value::Sequence(linearize(&items)),
        seq(&[5.0, 4.0, 7.0, 1.0, 12.0, 34.0])
    );
}

#[test]
fn test_json_input() {
    let json: serde_json::Value =
        serde_json::from_str(r#"{"north": [10, 20], "south": {"a": 30, "b": [40]}}"#).unwrap();
    let v = wrap(json).multiply(2).value();
    assert_eq!(v, seq(&[20.0, 40.0, 60.0, 80.0]));
}

// ============================================================================
// Pipelines
// ============================================================================

#[test]
fn test_pipeline_statistics_chain() {
    let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
    let cov = wrap(x.clone())
        .covariance(y.clone(), VarianceKind::Unbiased)
        .value();
    assert_eq!(cov, Value::from(5.0));

    let r = wrap(x).correlation(y).value().as_f64().unwrap();
    assert_relative_eq!(r, 1.0, epsilon = 1e-12);
}

#[test]
fn test_deferred_large_random_matches_immediate() {
    let mut rng = SmallRng::seed_from_u64(42);
    let x = random_vec(&mut rng, 10_000, -1e3, 1e3);
    let w = random_vec(&mut rng, 10_000, 0.5, 2.0);
    let shift = rng.random_range(1.0..10.0);

    let batched = wrap(x.clone())
        .aggregate()
        .multiply(w.clone())
        .subtract(shift)
        .divide(3)
        .sum(w.clone())
        .value();
    let immediate = wrap(x)
        .multiply(w.clone())
        .subtract(shift)
        .divide(3)
        .sum(w)
        .value();
    assert_eq!(batched, immediate);
}

#[test]
fn test_deferred_then_statistics() {
    let mut rng = SmallRng::seed_from_u64(7);
    let x = random_vec(&mut rng, 1_000, 0.0, 100.0);
    let expected = mean(&Value::from(x.clone()), None) * 2.0 + 1.0;
    let m = wrap(x)
        .aggregate()
        .multiply(2)
        .sum(1)
        .mean()
        .value()
        .as_f64()
        .unwrap();
    assert_relative_eq!(m, expected, epsilon = 1e-9);
}

#[test]
fn test_copy_isolation_and_aliasing() {
    let price = wrap(vec![10.0, 30.0, 80.0]);

    let copied = price.copy().multiply(1.1).round(2);
    assert_eq!(copied.value(), seq(&[11.0, 33.0, 88.0]));
    assert_eq!(price.value(), seq(&[10.0, 30.0, 80.0]));

    let aliased = price.share().multiply(1.1).round(2);
    assert_eq!(aliased.value(), seq(&[11.0, 33.0, 88.0]));
    assert_eq!(price.value(), seq(&[11.0, 33.0, 88.0]));
}

#[test]
fn test_strict_mode_from_json_config() {
    let cfg = Config::from_json(r#"{"mode": "strict", "precision": 2}"#).unwrap();
    assert_eq!(cfg.mode, Mode::Strict);

    let ok = Pipeline::with_config(vec![1.234, 5.678], cfg)
        .sum(vec![1.0, 1.0])
        .round_default()
        .try_value();
    assert_eq!(ok, Ok(seq(&[2.23, 6.68])));

    let err = Pipeline::with_config(vec![1.0, 2.0], cfg)
        .divide(vec![1.0])
        .try_value();
    assert_eq!(err, Err(BroadcastError::LengthMismatch { left: 2, right: 1 }));
}

// ============================================================================
// Memoization
// ============================================================================

#[test]
fn test_memoized_fibonacci() {
    let mut fib = memoize_recursive(|me, n: &u64, _: ()| {
        if *n < 2 {
            *n
        } else {
            me.call(n - 1, ()) + me.call(n - 2, ())
        }
    });
    assert_eq!(fib.call(80, ()), 23_416_728_348_467_685);
    assert_eq!(fib.cache().len(), 81);
}
