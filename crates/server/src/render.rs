//! Minimal HTML pages for the search surface.

use std::fmt::Write;

use catalog::SimilarityResult;

pub(crate) const SEARCH_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><title>Movie Recommendations</title></head>
<body>
<h1>Find similar movies</h1>
<form action="/search" method="get">
<input type="text" name="query" placeholder="Movie title" autofocus>
<button type="submit">Search</button>
</form>
</body>
</html>
"#;

/// Escape text for interpolation into HTML element content or attributes.
pub(crate) fn escape_html(text: &str) -> String {
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

pub(crate) fn results_page(query: &str, results: &[SimilarityResult]) -> String {
    let mut items = String::new();
    for result in results {
        // Writing to a String cannot fail
        let _ = writeln!(items, "<li>{}</li>", escape_html(&result.title));
    }
    page(
        &format!("Movies similar to {}", escape_html(query)),
        &format!("<ol>\n{items}</ol>"),
    )
}

pub(crate) fn error_page(heading: &str, message: &str) -> String {
    page(&escape_html(heading), &format!("<p>{}</p>", escape_html(message)))
}

fn page(heading: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{heading}</title></head>\n<body>\n\
         <h1>{heading}</h1>\n{body}\n<p><a href=\"/\">New search</a></p>\n</body>\n</html>\n"
    )
}
