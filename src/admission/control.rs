//! Quota control page.
//!
//! A single HTML fragment showing the current quota and a one-field form
//! posting a new value back to the same path.

use std::fmt::Write as _;
use std::num::ParseIntError;

/// Rejected control form input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quota value {raw:?}: {source}")]
pub struct QuotaInputError {
    pub raw: String,
    #[source]
    pub source: ParseIntError,
}

/// Parse a submitted quota value as a base-10 integer.
///
/// Surrounding whitespace is not trimmed; `" 3"` is rejected.
pub fn parse_quota(raw: &str) -> Result<i64, QuotaInputError> {
    raw.parse::<i64>().map_err(|source| QuotaInputError {
        raw: raw.to_string(),
        source,
    })
}

/// Render the control page for the given quota.
pub fn render_page(
    quota: i64,
    problem: Option<&QuotaInputError>,
    action: &str,
    field: &str,
) -> String {
    let mut page = String::new();

    // Writing to a String cannot fail.
    if quota < 0 {
        let _ = write!(page, "<h1>Quota: {quota} (unlimited)</h1>");
    } else {
        let _ = write!(page, "<h1>Quota: {quota}</h1>");
    }
    if let Some(problem) = problem {
        let _ = write!(page, "<h2>Problem: {}</h2>", escape_html(&problem.to_string()));
    }
    let _ = write!(
        page,
        r#"<form method="post" action="{}"><input name="{}" value="" placeholder="new value"><input type="submit"></form>"#,
        escape_html(action),
        escape_html(field),
    );

    page
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_signed_decimal() {
        assert_eq!(parse_quota("3"), Ok(3));
        assert_eq!(parse_quota("+3"), Ok(3));
        assert_eq!(parse_quota("-1"), Ok(-1));
        assert_eq!(parse_quota("0"), Ok(0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in ["", "abc", "1.5", " 3", "0x10", "99999999999999999999"] {
            let err = parse_quota(raw).unwrap_err();
            assert_eq!(err.raw, raw);
        }
    }

    #[test]
    fn test_error_mentions_input() {
        let err = parse_quota("abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid quota value \"abc\": invalid digit found in string"
        );
    }

    #[test]
    fn test_render_limited() {
        let page = render_page(5, None, "/", "c");
        assert!(page.starts_with("<h1>Quota: 5</h1>"));
        assert!(!page.contains("unlimited"));
        assert!(!page.contains("Problem"));
        assert!(page.contains(r#"<form method="post" action="/"><input name="c""#));
    }

    #[test]
    fn test_render_unlimited() {
        let page = render_page(-1, None, "/", "c");
        assert!(page.starts_with("<h1>Quota: -1 (unlimited)</h1>"));
    }

    #[test]
    fn test_render_problem_is_escaped() {
        let err = parse_quota("<script>").unwrap_err();
        let page = render_page(0, Some(&err), "/", "c");
        assert!(page.contains("<h1>Quota: 0</h1>"));
        assert!(page.contains("<h2>Problem: invalid quota value &quot;&lt;script&gt;&quot;"));
        assert!(!page.contains("<script>"));
    }
}
