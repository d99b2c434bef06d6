//! Score normalization: engine scores to win probabilities, and repair of
//! win/draw/loss pairs that drifted out of their feasible region.

use log::warn;

/// Steepness for `%eval` scores, which are given in pawns.
pub const EVAL_SIGMOID_K: f64 = 0.4;

/// Steepness for the static evaluator, which scores in centipawns.
pub const STATIC_EVAL_SIGMOID_K: f64 = 0.004;

/// Tolerated numerical drift before a correction is reported.
const ALLOWED_EPS: f32 = 0.000_001;

/// `2 / (1 + e^(-k·score)) - 1`, mapped into `[-1, 1]`.
pub fn win_probability(score: f64, k: f64) -> f32 {
    (2.0 / (1.0 + (-k * score).exp()) - 1.0) as f32
}

pub fn eval_to_win_probability(pawns: f32) -> f32 {
    win_probability(f64::from(pawns), EVAL_SIGMOID_K)
}

pub fn static_eval_to_win_probability(centipawns: i32) -> f32 {
    win_probability(f64::from(centipawns), STATIC_EVAL_SIGMOID_K)
}

/// Clamp `q` into `[-1, 1]` and `d` into `[0, 1]`, then shrink `d` until the
/// implied win and loss probabilities are both non-negative. `q` is preserved.
pub fn drift_correct(mut q: f32, mut d: f32) -> (f32, f32) {
    if q > 1.0 {
        if q > 1.0 + ALLOWED_EPS {
            warn!("Unexpectedly large drift in q {q}");
        }
        q = 1.0;
    }
    if q < -1.0 {
        if q < -1.0 - ALLOWED_EPS {
            warn!("Unexpectedly large drift in q {q}");
        }
        q = -1.0;
    }
    if d > 1.0 {
        if d > 1.0 + ALLOWED_EPS {
            warn!("Unexpectedly large drift in d {d}");
        }
        d = 1.0;
    }
    if d < 0.0 {
        if d < -ALLOWED_EPS {
            warn!("Unexpectedly large drift in d {d}");
        }
        d = 0.0;
    }

    let (w, _, l) = wdl(q, d);
    if w < 0.0 || l < 0.0 {
        let drift = 2.0 * w.min(l);
        if drift < -ALLOWED_EPS {
            warn!("Unexpectedly large drift correction for d based on q: {drift}");
        }
        d = (d + drift).max(0.0);
    }

    (q, d)
}

/// Split a value/draw pair into `(win, draw, loss)`.
pub fn wdl(q: f32, d: f32) -> (f32, f32, f32) {
    let w = (1.0 - d + q) / 2.0;
    (w, d, w - q)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_win_probability_zero_is_zero() {
        assert_eq!(eval_to_win_probability(0.0), 0.0);
        assert_eq!(static_eval_to_win_probability(0), 0.0);
    }

    #[test]
    fn test_win_probability_is_monotonic_and_bounded() {
        let mut previous = -1.0f32;
        let mut score = -200.0f32;
        while score <= 200.0 {
            let v = eval_to_win_probability(score);
            assert!(v >= previous, "not monotonic at {score}");
            assert!((-1.0..=1.0).contains(&v));
            previous = v;
            score += 0.25;
        }

        for score in [-5.0f32, -0.5, 0.5, 5.0] {
            let v = eval_to_win_probability(score);
            assert!(v > -1.0 && v < 1.0);
        }
    }

    #[test]
    fn test_win_probability_is_odd() {
        for score in [0.1f32, 0.45, 1.5, 3.0, 10.0] {
            let a = eval_to_win_probability(score);
            let b = eval_to_win_probability(-score);
            assert!((a + b).abs() < EPS);
        }
    }

    #[test]
    fn test_sigmoid_constants_are_not_conflated() {
        // One pawn in %eval units equals 100 centipawns for the static scale.
        let pawn = eval_to_win_probability(1.0);
        let centipawns = static_eval_to_win_probability(100);
        assert!((pawn - 0.197_375_32).abs() < EPS);
        assert!((centipawns - 0.197_375_32).abs() < EPS);
        assert!(static_eval_to_win_probability(1) < eval_to_win_probability(1.0));
    }

    #[test]
    fn test_drift_correct_leaves_feasible_pairs_alone() {
        assert_eq!(drift_correct(0.3, 0.2), (0.3, 0.2));
        assert_eq!(drift_correct(-1.0, 0.0), (-1.0, 0.0));
        assert_eq!(drift_correct(0.0, 1.0), (0.0, 1.0));
    }

    #[test]
    fn test_drift_correct_clamps_ranges() {
        assert_eq!(drift_correct(1.5, 0.0), (1.0, 0.0));
        assert_eq!(drift_correct(-1.5, 0.0), (-1.0, 0.0));
        assert_eq!(drift_correct(0.0, 1.5), (0.0, 1.0));
        assert_eq!(drift_correct(0.0, -0.5), (0.0, 0.0));
    }

    #[test]
    fn test_drift_correct_repairs_infeasible_draw() {
        // q = 0.8 with d = 0.5 implies a negative loss probability
        let (q, d) = drift_correct(0.8, 0.5);
        assert_eq!(q, 0.8);
        let (w, _, l) = wdl(q, d);
        assert!(w >= 0.0 && l >= -EPS);
        assert!((w - l - q).abs() < EPS);
        assert!(w + l <= 1.0 + EPS);
        assert!((d - 0.2).abs() < EPS);
    }

    #[test]
    fn test_drift_correct_is_idempotent() {
        let mut q = -1.0f32;
        while q <= 1.0 {
            let mut d = 0.0f32;
            while d <= 1.0 {
                let once = drift_correct(q, d);
                let twice = drift_correct(once.0, once.1);
                assert!((once.0 - twice.0).abs() < EPS, "q={q} d={d}");
                assert!((once.1 - twice.1).abs() < EPS, "q={q} d={d}");
                d += 0.05;
            }
            q += 0.05;
        }
    }
}
