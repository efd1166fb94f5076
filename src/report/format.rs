//! Terminal output for each stage of a run.
//!
//! Formatting lives here so the selection/fitting code stays free of
//! presentation details.

use crate::domain::{FitResult, StationarityGuide};
use crate::fit::AggregateForecast;
use crate::select::GrangerMatrix;

/// Guide table: one row per variable.
pub fn format_guide(guide: &StationarityGuide) -> String {
    let mut out = String::new();
    out.push_str(&format!("Stationarity guide ({} variables):\n", guide.len()));
    push_line(
        &mut out,
        format!("{:<24} {:>8} {:>10} {:>7} {:>8}", "variable", "loggable", "norm", "ndiffs", "periods"),
    );
    push_line(&mut out, format!("{:-<24} {:-<8} {:-<10} {:-<7} {:-<8}", "", "", "", "", ""));
    for e in guide.entries() {
        push_line(
            &mut out,
            format!(
                "{:<24} {:>8} {:>10} {:>7} {:>8}",
                truncate(&e.variable, 24),
                if e.loggable { "yes" } else { "no" },
                fmt_norm(e.norm),
                e.ndiffs,
                e.periods
            ),
        );
    }
    out
}

/// Granger p-values; row = target, column = driver.
pub fn format_grangers(matrix: &GrangerMatrix) -> String {
    const W: usize = 10;
    let vars = matrix.variables();
    let mut out = String::new();
    out.push_str("Granger p-values (row = target, column = driver):\n");

    let mut header = format!("{:<W$}", "");
    for v in vars {
        header.push_str(&format!(" {:>W$}", truncate(v, W)));
    }
    push_line(&mut out, header);

    for target in vars {
        let mut line = format!("{:<W$}", truncate(target, W));
        for driver in vars {
            let cell = match matrix.p_value(target, driver) {
                Some(p) if p.is_finite() => format!("{p:.4}"),
                _ => "-".to_string(),
            };
            line.push_str(&format!(" {cell:>W$}"));
        }
        push_line(&mut out, line);
    }
    out
}

/// Pairwise correlations of the scaled features.
pub fn format_correlations(names: &[String], corr: &[Vec<f64>]) -> String {
    const W: usize = 10;
    let mut out = String::new();
    out.push_str("Correlations (scaled features):\n");
    let mut header = format!("{:<W$}", "");
    for v in names {
        header.push_str(&format!(" {:>W$}", truncate(v, W)));
    }
    push_line(&mut out, header);
    for (name, row) in names.iter().zip(corr) {
        let mut line = format!("{:<W$}", truncate(name, W));
        for c in row {
            if c.is_finite() {
                line.push_str(&format!(" {c:>W$.3}"));
            } else {
                line.push_str(&format!(" {:>W$}", "-"));
            }
        }
        push_line(&mut out, line);
    }
    out
}

/// Best `top` candidates with their walk-forward scores.
pub fn format_ranking(fits: &[FitResult], top: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Ranked candidates (showing {} of {}):\n",
        top.min(fits.len()),
        fits.len()
    ));
    push_line(
        &mut out,
        format!("{:>4} {:>9} {:>5} {:>8} {:<8} {:<30} {}", "rank", "mape", "order", "max_fit", "quarters", "endog", "exog"),
    );
    push_line(&mut out, format!("{:->4} {:->9} {:->5} {:->8} {:-<8} {:-<30} {:-<4}", "", "", "", "", "", "", ""));
    for (i, fit) in fits.iter().take(top).enumerate() {
        let c = &fit.candidate;
        let exog: Vec<&str> = c.exog_cols.iter().map(String::as_str).collect();
        push_line(
            &mut out,
            format!(
                "{:>4} {:>8.3}% {:>5} {:>8} {:<8} {:<30} {}",
                i + 1,
                fit.target_mape * 100.0,
                c.order,
                fmt_quarter(c.max_fit_date),
                if c.model_quarters { "yes" } else { "no" },
                truncate(&c.endog_cols.join(","), 30),
                if exog.is_empty() { "-".to_string() } else { exog.join(",") }
            ),
        );
    }
    out
}

/// Fiscal-year totals: the average followed by each candidate.
pub fn format_aggregate(agg: &AggregateForecast) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} forecast by fiscal year (average of {} candidate{}):\n",
        agg.variable,
        agg.candidates.len(),
        if agg.candidates.len() == 1 { "" } else { "s" }
    ));

    let mut header = format!("{:<6} {:>14}", "FY", "average");
    for i in 1..=agg.per_candidate.len() {
        header.push_str(&format!(" {:>14}", format!("#{i}")));
    }
    push_line(&mut out, header);

    for (fy, avg) in &agg.average {
        let mut line = format!("{fy:<6} {avg:>14.2}");
        for series in &agg.per_candidate {
            match series.get(fy) {
                Some(v) => line.push_str(&format!(" {v:>14.2}")),
                None => line.push_str(&format!(" {:>14}", "-")),
            }
        }
        push_line(&mut out, line);
    }

    out.push_str("\nCandidates used:\n");
    for (i, c) in agg.candidates.iter().enumerate() {
        out.push_str(&format!("#{} {}\n", i + 1, c.label()));
    }
    out
}

/// Companion endog suggestions for a base.
pub fn format_endog_suggestions(base: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return format!("No two-way Granger companions for {base}.\n");
    }
    format!("Two-way Granger companions for {base}: {}\n", suggestions.join(", "))
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn fmt_norm(norm: f64) -> String {
    if (1e-3..1e6).contains(&norm) {
        format!("{norm}")
    } else {
        format!("{norm:e}")
    }
}

fn fmt_quarter(q: crate::domain::Quarter) -> String {
    format!("{}Q{}", q.year(), q.quarter())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
