use num_complex::Complex64;
use std::fs;
use std::path::Path;

/// Shortest round-trippable scientific rendering, e.g. `1.5e-3`.
pub fn format_scientific_f64(value: f64) -> String {
    format!("{value:e}")
}

/// One `<frequency> <re> <im>` row of a response artifact.
pub fn format_response_row(frequency: f64, value: Complex64) -> String {
    format!(
        "{} {} {}",
        format_scientific_f64(frequency),
        format_scientific_f64(value.re),
        format_scientific_f64(value.im)
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}
