//! Bounded Levenberg–Marquardt fit of the logistic growth curve
//! `f(t) = K / (1 + exp(-r (t - t_m)))`.
//!
//! Parameters are kept inside a box by projecting every trial step onto the
//! bounds; a parameter sitting on a bound whose gradient points outward is
//! frozen for that iteration. Damping is Marquardt-scaled by the diagonal of
//! `JᵀJ`, which matters here because `K`, `t_m` and `r` live on very
//! different scales (hundreds, thousands and tenths).

use crate::domain::model::{sigmoid, LogisticModel};
use crate::utils::error::{Result, ScurveError};

/// Model evaluations allowed before the fit is declared divergent.
pub const DEFAULT_MAX_EVALUATIONS: usize = 20_000;

const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: [f64; 3],
    pub upper: [f64; 3],
}

impl Bounds {
    /// `0 ≤ K < ∞`, `0 ≤ t_m < ∞`, `0 ≤ r ≤ 1`
    pub fn logistic() -> Self {
        Self {
            lower: [0.0, 0.0, 0.0],
            upper: [f64::INFINITY, f64::INFINITY, 1.0],
        }
    }

    fn project(&self, p: [f64; 3]) -> [f64; 3] {
        let mut out = p;
        for (i, value) in out.iter_mut().enumerate() {
            *value = value.clamp(self.lower[i], self.upper[i]);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub max_evaluations: usize,
    /// Relative reduction of the cost below which the fit stops.
    pub ftol: f64,
    /// Relative step size below which the fit stops.
    pub xtol: f64,
    pub bounds: Bounds,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            ftol: 1e-10,
            xtol: 1e-10,
            bounds: Bounds::logistic(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub model: LogisticModel,
    /// Half the sum of squared residuals at the solution.
    pub cost: f64,
    pub evaluations: usize,
}

fn to_model(p: [f64; 3]) -> LogisticModel {
    LogisticModel {
        k: p[0],
        t_m: p[1],
        r: p[2],
    }
}

fn cost_at(ts: &[f64], ys: &[f64], p: [f64; 3]) -> f64 {
    let model = to_model(p);
    0.5 * ts
        .iter()
        .zip(ys)
        .map(|(t, y)| {
            let residual = y - model.evaluate(*t);
            residual * residual
        })
        .sum::<f64>()
}

/// Returns `(JᵀJ, Jᵀr)` with `r = y - f`.
fn normal_equations(ts: &[f64], ys: &[f64], p: [f64; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let [k, t_m, r] = p;
    let mut jtj = [[0.0; 3]; 3];
    let mut jtr = [0.0; 3];

    for (t, y) in ts.iter().zip(ys) {
        let s = sigmoid(r * (t - t_m));
        let ds = s * (1.0 - s);
        let grad = [s, -k * r * ds, k * (t - t_m) * ds];
        let residual = y - k * s;

        for i in 0..3 {
            jtr[i] += grad[i] * residual;
            for j in 0..3 {
                jtj[i][j] += grad[i] * grad[j];
            }
        }
    }

    (jtj, jtr)
}

/// Gaussian elimination with partial pivoting; `None` when singular.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn divergence(message: impl Into<String>) -> ScurveError {
    ScurveError::FitDivergence {
        message: message.into(),
    }
}

/// Least-squares fit of the logistic curve to `(ts, ys)` starting from
/// `initial`.
pub fn fit_logistic(
    ts: &[f64],
    ys: &[f64],
    initial: LogisticModel,
    options: &FitOptions,
) -> Result<FitReport> {
    if ts.len() != ys.len() {
        return Err(ScurveError::invalid_request(format!(
            "mismatched sample lengths: {} years, {} counts",
            ts.len(),
            ys.len()
        )));
    }

    let bounds = options.bounds;
    let mut p = bounds.project([initial.k, initial.t_m, initial.r]);
    let mut cost = cost_at(ts, ys, p);
    let mut evaluations = 1;
    if !cost.is_finite() {
        return Err(divergence("initial guess produced a non-finite residual"));
    }

    let mut lambda = LAMBDA_INITIAL;

    loop {
        if evaluations >= options.max_evaluations {
            return Err(divergence(format!(
                "no convergence within {} evaluations",
                options.max_evaluations
            )));
        }

        let (jtj, jtr) = normal_equations(ts, ys, p);
        evaluations += 1;

        let free: [bool; 3] = std::array::from_fn(|i| {
            let pinned_low = p[i] <= bounds.lower[i] && jtr[i] < 0.0;
            let pinned_high = p[i] >= bounds.upper[i] && jtr[i] > 0.0;
            !(pinned_low || pinned_high)
        });
        let gradient_norm = (0..3)
            .filter(|&i| free[i])
            .map(|i| jtr[i].abs())
            .fold(0.0, f64::max);
        if gradient_norm == 0.0 {
            return Ok(FitReport {
                model: to_model(p),
                cost,
                evaluations,
            });
        }

        // Inner loop: raise damping until a step lowers the cost.
        loop {
            let mut a = jtj;
            let mut b = jtr;
            for i in 0..3 {
                if free[i] {
                    a[i][i] += lambda * jtj[i][i].max(f64::MIN_POSITIVE);
                } else {
                    for j in 0..3 {
                        a[i][j] = 0.0;
                        a[j][i] = 0.0;
                    }
                    a[i][i] = 1.0;
                    b[i] = 0.0;
                }
            }

            let candidate = solve3(a, b).map(|step| {
                bounds.project([p[0] + step[0], p[1] + step[1], p[2] + step[2]])
            });

            if let Some(next) = candidate {
                let next_cost = cost_at(ts, ys, next);
                evaluations += 1;

                if next_cost.is_finite() && next_cost < cost {
                    let reduction = cost - next_cost;
                    let small_step = (0..3)
                        .all(|i| (next[i] - p[i]).abs() <= options.xtol * (options.xtol + p[i].abs()));
                    let small_reduction = reduction <= options.ftol * cost;

                    p = next;
                    cost = next_cost;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    if small_step || small_reduction {
                        tracing::debug!(
                            "Logistic fit converged after {} evaluations (cost {:.6e})",
                            evaluations,
                            cost
                        );
                        return Ok(FitReport {
                            model: to_model(p),
                            cost,
                            evaluations,
                        });
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No direction lowers the cost any further: stationary point.
                tracing::debug!(
                    "Logistic fit stalled at a stationary point after {} evaluations",
                    evaluations
                );
                return Ok(FitReport {
                    model: to_model(p),
                    cost,
                    evaluations,
                });
            }
            if evaluations >= options.max_evaluations {
                return Err(divergence(format!(
                    "no convergence within {} evaluations",
                    options.max_evaluations
                )));
            }
        }
    }
}
