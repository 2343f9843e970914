//! Reporting utilities: residuals, identified equations and evidence tables.
//!
//! Formatting code lives in one place so the fitting code stays clean and
//! output changes are localized.

use nalgebra::DMatrix;

use crate::domain::Power;
use crate::error::{IdentError, Result};
use crate::fit::selection::PowerSetRanking;
use crate::models::predict_state;

/// Root-mean-square residual of column `state` of `coefficients` against `(x, y)`.
pub fn residual_rms(coefficients: &DMatrix<f64>, state: usize, x: &[f64], y: &[f64]) -> Result<f64> {
    if state >= coefficients.ncols() {
        return Err(IdentError::invalid(format!(
            "state {state} out of range ({} states)",
            coefficients.ncols()
        )));
    }
    if x.is_empty() || x.len() != y.len() {
        return Err(IdentError::invalid("x and y must be non-empty and equal length."));
    }
    let fitted = predict_state(coefficients, state, x);
    let sse: f64 = fitted.iter().zip(y).map(|(f, o)| (o - f).powi(2)).sum();
    let rms = (sse / x.len() as f64).sqrt();
    if !rms.is_finite() {
        return Err(IdentError::invalid("Non-finite model prediction during residual computation."));
    }
    Ok(rms)
}

/// Render one ascending-power coefficient column, e.g. `dx/dt = 2.000 x + 0.500 x^2`.
///
/// Exact zeros are omitted; an all-zero column renders as `dx/dt = 0`.
pub fn format_equation(coefficients: &[f64], var: &str) -> String {
    let mut rhs = String::new();
    for (p, &c) in coefficients.iter().enumerate() {
        if c == 0.0 {
            continue;
        }
        let term = match p {
            0 => format!("{:.3}", c.abs()),
            1 => format!("{:.3} {var}", c.abs()),
            _ => format!("{:.3} {var}^{p}", c.abs()),
        };
        if rhs.is_empty() {
            if c < 0.0 {
                rhs.push('-');
            }
        } else {
            rhs.push_str(if c < 0.0 { " - " } else { " + " });
        }
        rhs.push_str(&term);
    }
    if rhs.is_empty() {
        rhs.push('0');
    }
    format!("d{var}/dt = {rhs}")
}

/// One line per state column of `coefficients`.
pub fn format_model(coefficients: &DMatrix<f64>, var: &str) -> String {
    let mut out = String::new();
    for (k, column) in coefficients.column_iter().enumerate() {
        let column: Vec<f64> = column.iter().copied().collect();
        out.push_str(&format!("[{k}] {}\n", format_equation(&column, var)));
    }
    out
}

/// Evidence table: rank, powers, log evidence and log Bayes factor against the best.
pub fn format_rankings(ranking: &PowerSetRanking) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<5} {:<20} {:>14} {:>10}\n", "rank", "powers", "log_evidence", "ln_BF").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<5} {:-<20} {:-<14} {:-<10}\n", "", "", "", "").trim_end());
    out.push('\n');

    for (i, r) in ranking.ranked.iter().enumerate() {
        let bf = ranking.log_bayes_factor(i).unwrap_or(0.0);
        out.push_str(&format!(
            "{:<5} {:<20} {:>14.3} {:>10.3}\n",
            i + 1,
            truncate(&fmt_powers(&r.powers), 20),
            r.log_evidence,
            bf
        ));
    }
    for (powers, reason) in &ranking.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", fmt_powers(powers)));
    }

    out
}

fn fmt_powers(powers: &[Power]) -> String {
    let parts: Vec<String> = powers.iter().map(|p| p.to_string()).collect();
    format!("{{{}}}", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
