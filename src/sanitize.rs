use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip characters that are unsafe to pass through to the provider or to
/// echo back into rendered output, then normalize whitespace.
///
/// Removes `<`, `>`, `"` and `'`. Operator syntax such as `site:a.com`,
/// `filetype:pdf` and `-exclude` is left alone. Note that exact-phrase
/// quoting (`"two words"`) does not survive: the quotes are removed along
/// with the other characters.
pub fn sanitize_query(query: &str) -> String {
    let stripped: String = query
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
        .collect();
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}
