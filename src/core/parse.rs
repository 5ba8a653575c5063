//! Parsing of numbers scraped from pt-BR formatted pages.

/// Parses a pt-BR formatted number such as `"1.234,56"` or `"12,5%"`.
///
/// `.` is treated as a thousands separator and `,` as the decimal separator.
/// Scraped cells are often empty or hold placeholders like `"-"`, so any
/// value that does not parse yields `0.0` instead of an error.
pub fn parse_locale_number(text: &str) -> f64 {
    let normalized = text
        .trim()
        .replace('%', "")
        .replace('.', "")
        .replace(',', ".");
    normalized.trim().parse().unwrap_or(0.0)
}
