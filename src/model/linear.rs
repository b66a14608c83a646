//! Multi-predictor linear model via normal equations
//!
//! Builds a design matrix with a leading intercept column, forms the
//! (k+1)×(k+1) normal-equations system and solves it by Gauss–Jordan
//! elimination with partial pivoting, producing the coefficient vector
//! and the inverse in one pass. A pivot below [`PIVOT_EPS`] signals a
//! singular (or numerically unusable) design and yields no result.
//! Every derived quantity is a deterministic closed form; p-values go
//! through the regularized incomplete beta function.

use statrs::function::beta::beta_reg;

use crate::table::Table;
use crate::{FrameError, Result};

/// Pivot magnitude below which the normal equations are treated as
/// singular. Large enough to refuse a duplicated predictor after
/// floating-point noise, small enough to accept ill-scaled systems.
const PIVOT_EPS: f64 = 1e-10;

/// Fitted linear model with inferential statistics.
///
/// Coefficient order is intercept first, then predictors in call order
/// (`terms` carries the matching names).
#[derive(Debug, Clone)]
pub struct LinearModel {
    pub terms: Vec<String>,
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub p_values: Vec<f64>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub rss: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_std_error: f64,
    pub df_residual: usize,
    /// None for the intercept-only model
    pub f_statistic: Option<f64>,
    pub f_p_value: Option<f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Hat-matrix diagonal
    pub leverage: Vec<f64>,
    pub cooks_distance: Vec<f64>,
    pub std_residuals: Vec<f64>,
}

/// Fit `response ~ predictors` by ordinary least squares.
///
/// Input problems (unknown/non-numeric column, missing cells) are typed
/// errors; numerical failure (singular design, too few observations) is
/// `Ok(None)`.
pub fn fit_linear(
    table: &Table,
    response: &str,
    predictors: &[&str],
) -> Result<Option<LinearModel>> {
    let y = extract_numeric(table, response)?;
    let xs: Vec<Vec<f64>> = predictors
        .iter()
        .map(|&name| extract_numeric(table, name))
        .collect::<Result<_>>()?;

    let n = y.len();
    let k = predictors.len();
    let p = k + 1;
    // At least one residual degree of freedom
    if n <= p {
        return Ok(None);
    }

    // Row i of the design matrix: [1, x_1[i], .., x_k[i]]
    let design_cell = |row: usize, col: usize| -> f64 {
        if col == 0 {
            1.0
        } else {
            xs[col - 1][row]
        }
    };

    // Normal equations: A = X'X, b = X'y
    let mut a = vec![vec![0.0f64; p]; p];
    let mut b = vec![0.0f64; p];
    for row in 0..n {
        for i in 0..p {
            let xi = design_cell(row, i);
            b[i] += xi * y[row];
            for j in i..p {
                a[i][j] += xi * design_cell(row, j);
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            a[i][j] = a[j][i];
        }
    }

    let Some((coefficients, inverse)) = solve_with_inverse(a, b) else {
        return Ok(None);
    };

    let fitted: Vec<f64> = (0..n)
        .map(|row| {
            (0..p)
                .map(|j| coefficients[j] * design_cell(row, j))
                .sum()
        })
        .collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(yi, fi)| yi - fi).collect();
    let rss: f64 = residuals.iter().map(|e| e * e).sum();

    let ybar = y.iter().sum::<f64>() / n as f64;
    let tss: f64 = y.iter().map(|yi| (yi - ybar).powi(2)).sum();

    let df_residual = n - p;
    let sigma2 = rss / df_residual as f64;
    let residual_std_error = sigma2.sqrt();

    let (r_squared, adj_r_squared) = if tss > 0.0 {
        let r2 = 1.0 - rss / tss;
        let adj = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / df_residual as f64;
        (r2, adj)
    } else {
        // Degenerate zero-variance response
        (f64::NAN, f64::NAN)
    };

    let std_errors: Vec<f64> = (0..p).map(|j| (sigma2 * inverse[j][j]).sqrt()).collect();
    let t_values: Vec<f64> = coefficients
        .iter()
        .zip(&std_errors)
        .map(|(c, se)| if *se > 0.0 { c / se } else { c.signum() * f64::INFINITY })
        .collect();
    let p_values: Vec<f64> = t_values
        .iter()
        .map(|&t| t_two_tailed(t, df_residual as f64))
        .collect();

    let (f_statistic, f_p_value) = if k > 0 {
        let f = if sigma2 > 0.0 {
            ((tss - rss) / k as f64) / sigma2
        } else {
            f64::INFINITY
        };
        (
            Some(f),
            Some(f_upper_tail(f, k as f64, df_residual as f64)),
        )
    } else {
        (None, None)
    };

    // Gaussian log-likelihood at the MLE variance rss/n; the parameter
    // count for AIC/BIC includes the variance.
    let log_likelihood =
        -0.5 * n as f64 * ((2.0 * std::f64::consts::PI).ln() + (rss / n as f64).ln() + 1.0);
    let npar = (p + 1) as f64;
    let aic = 2.0 * npar - 2.0 * log_likelihood;
    let bic = (n as f64).ln() * npar - 2.0 * log_likelihood;

    // h_i = x_i' (X'X)^-1 x_i
    let leverage: Vec<f64> = (0..n)
        .map(|row| {
            let mut h = 0.0;
            for i in 0..p {
                for j in 0..p {
                    h += design_cell(row, i) * inverse[i][j] * design_cell(row, j);
                }
            }
            h
        })
        .collect();

    let cooks_distance: Vec<f64> = residuals
        .iter()
        .zip(&leverage)
        .map(|(&e, &h)| {
            if e == 0.0 {
                0.0
            } else {
                let denom = p as f64 * sigma2 * (1.0 - h).powi(2);
                if denom > 0.0 {
                    e * e * h / denom
                } else {
                    f64::INFINITY
                }
            }
        })
        .collect();

    let std_residuals: Vec<f64> = residuals
        .iter()
        .zip(&leverage)
        .map(|(&e, &h)| {
            if e == 0.0 {
                0.0
            } else {
                let denom = residual_std_error * (1.0 - h).sqrt();
                if denom > 0.0 {
                    e / denom
                } else {
                    e.signum() * f64::INFINITY
                }
            }
        })
        .collect();

    let mut terms = Vec::with_capacity(p);
    terms.push("(intercept)".to_string());
    terms.extend(predictors.iter().map(|&s| s.to_string()));

    Ok(Some(LinearModel {
        terms,
        coefficients,
        std_errors,
        t_values,
        p_values,
        fitted,
        residuals,
        rss,
        r_squared,
        adj_r_squared,
        residual_std_error,
        df_residual,
        f_statistic,
        f_p_value,
        log_likelihood,
        aic,
        bic,
        leverage,
        cooks_distance,
        std_residuals,
    }))
}

/// Extract one numeric column as f64, fail-closed on missing cells.
/// Uses the zero-copy view on native-backed tables where possible.
fn extract_numeric(table: &Table, name: &str) -> Result<Vec<f64>> {
    if let Some(view) = table.float64_view(name)? {
        if view.null_count() > 0 {
            return Err(FrameError::MissingValue(name.to_string()));
        }
        return Ok(view.as_slice().to_vec());
    }
    if let Some(view) = table.int64_view(name)? {
        if view.null_count() > 0 {
            return Err(FrameError::MissingValue(name.to_string()));
        }
        return Ok(view.as_slice().iter().map(|&v| v as f64).collect());
    }

    let data = table.column_data(name)?;
    if !data.data_type().is_numeric() {
        return Err(FrameError::TypeMismatch(format!(
            "model fitting requires a numeric column, '{}' is {}",
            name,
            data.data_type().name()
        )));
    }
    (0..data.len())
        .map(|i| {
            data.as_f64(i)
                .ok_or_else(|| FrameError::MissingValue(name.to_string()))
        })
        .collect()
}

/// Gauss–Jordan elimination with partial pivoting on `[A | b | I]`,
/// returning the solution and the inverse of `A`. `None` when a pivot
/// falls below [`PIVOT_EPS`].
fn solve_with_inverse(a: Vec<Vec<f64>>, b: Vec<f64>) -> Option<(Vec<f64>, Vec<Vec<f64>>)> {
    let p = b.len();
    let width = p + 1 + p;
    let mut m = vec![vec![0.0f64; width]; p];
    for i in 0..p {
        m[i][..p].copy_from_slice(&a[i]);
        m[i][p] = b[i];
        m[i][p + 1 + i] = 1.0;
    }

    for col in 0..p {
        // Partial pivot: largest magnitude in this column at or below
        // the diagonal.
        let pivot_row = (col..p)
            .max_by(|&r1, &r2| m[r1][col].abs().total_cmp(&m[r2][col].abs()))?;
        if m[pivot_row][col].abs() < PIVOT_EPS {
            return None;
        }
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        for j in 0..width {
            m[col][j] /= pivot;
        }
        for row in 0..p {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor != 0.0 {
                for j in 0..width {
                    m[row][j] -= factor * m[col][j];
                }
            }
        }
    }

    let solution: Vec<f64> = (0..p).map(|i| m[i][p]).collect();
    let inverse: Vec<Vec<f64>> = (0..p).map(|i| m[i][p + 1..].to_vec()).collect();
    Some((solution, inverse))
}

/// Two-tailed Student-t p-value via the regularized incomplete beta:
/// `P(|T| > |t|) = I_{df/(df+t^2)}(df/2, 1/2)`
fn t_two_tailed(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    beta_reg(df / 2.0, 0.5, df / (df + t * t))
}

/// Upper-tail F p-value: `P(F > f) = I_{df2/(df2+df1*f)}(df2/2, df1/2)`
fn f_upper_tail(f: f64, df1: f64, df2: f64) -> f64 {
    if !f.is_finite() {
        return 0.0;
    }
    beta_reg(df2 / 2.0, df1 / 2.0, df2 / (df2 + df1 * f))
}
