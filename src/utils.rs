/// Formats an optional f64 to `decimals` places, or returns "—" if None or non-finite.
pub fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.decimals$}"),
        _ => "—".to_owned(),
    }
}

/// Left-aligns `s` in exactly `width` characters, truncating longer input.
pub fn fit_width(s: &str, width: usize) -> String {
    format!("{s:<width$.width$}")
}
