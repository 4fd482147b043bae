//! Text utilities shared by the planner, scorer, providers, and enricher.
//!
//! Tokenization is deliberately simple: lowercase, keep ASCII alphanumerics,
//! hyphens, and CJK ideographs, split on whitespace, and drop tokens shorter
//! than two characters. Every scoring formula in the crate runs over this
//! token stream, so it must stay stable.

/// Words too generic to carry topic meaning when computing topic coverage.
const TOPIC_STOPWORDS: &[&str] = &[
    "best",
    "practice",
    "practices",
    "code",
    "coding",
    "api",
    "apis",
    "design",
    "architecture",
    "implementation",
    "guide",
    "guideline",
    "js",
    "ts",
];

fn is_token_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || is_cjk(c)
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Lowercase and split `text` into tokens of length >= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if is_token_char(c) || c.is_whitespace() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Drop tokens from the fixed topic-stopword set.
pub fn filter_meaningful_tokens(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .filter(|t| !TOPIC_STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Order-preserving dedupe that also drops empty strings.
pub fn unique_values(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Variables available to query templates.
pub struct TemplateVars<'a> {
    pub topic: &'a str,
    pub stack: &'a str,
    pub objective: &'a str,
    pub keyword: &'a str,
}

/// Render a `{{topic}}`/`{{stack}}`/`{{objective}}`/`{{keyword}}` template,
/// collapsing runs of whitespace left by empty substitutions.
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    let rendered = template
        .replace("{{topic}}", vars.topic)
        .replace("{{ topic }}", vars.topic)
        .replace("{{stack}}", vars.stack)
        .replace("{{ stack }}", vars.stack)
        .replace("{{objective}}", vars.objective)
        .replace("{{ objective }}", vars.objective)
        .replace("{{keyword}}", vars.keyword)
        .replace("{{ keyword }}", vars.keyword);

    collapse_whitespace(&rendered)
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip markup tags from a snippet (no entity decoding).
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

const ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&nbsp;", " "),
];

fn decode_entities(text: &str) -> String {
    let mut out = text.to_string();
    for (entity, replacement) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}

/// Reduce an HTML page to plain text: drop script/style blocks, strip tags,
/// decode the small fixed entity table, collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_scripts = remove_blocks(html, "<script", "</script>");
    let without_styles = remove_blocks(&without_scripts, "<style", "</style>");
    decode_entities(&strip_tags(&without_styles))
}

/// Remove `open ... close` blocks (case-insensitive), including the markers.
/// ASCII lowercasing keeps byte offsets aligned with the original text.
fn remove_blocks(html: &str, open: &str, close: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(rel_start) = lower[pos..].find(open) {
        let start = pos + rel_start;
        out.push_str(&html[pos..start]);
        match lower[start..].find(close) {
            Some(rel_end) => pos = start + rel_end + close.len(),
            None => {
                // Unterminated block: drop the rest of the document.
                return out;
            }
        }
    }
    out.push_str(&html[pos..]);
    out
}

/// Minimum sentence length (in chars) for evidence extraction.
pub const MIN_SENTENCE_CHARS: usize = 36;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Split plain text into sentences on terminal punctuation followed by
/// whitespace, keeping only sentences of at least [`MIN_SENTENCE_CHARS`].
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) {
            if chars.peek().map(|n| n.is_whitespace()).unwrap_or(true) {
                push_sentence(&mut sentences, &mut current);
                // Consume the separating whitespace run.
                while chars.peek().map(|n| n.is_whitespace()).unwrap_or(false) {
                    chars.next();
                }
            }
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.chars().count() >= MIN_SENTENCE_CHARS {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Truncate to `max_chars`, replacing the tail with an ellipsis when cut.
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_short_tokens() {
        let tokens = tokenize("Node.js Error-Handling: a B99!");
        assert_eq!(tokens, vec!["node", "js", "error-handling", "b99"]);
    }

    #[test]
    fn tokenize_keeps_cjk() {
        let tokens = tokenize("错误处理 best practices");
        assert_eq!(tokens, vec!["错误处理", "best", "practices"]);
    }

    #[test]
    fn stopwords_are_filtered() {
        let tokens = filter_meaningful_tokens(tokenize("node error handling best practices guide"));
        assert_eq!(tokens, vec!["node", "error", "handling"]);
    }

    #[test]
    fn unique_values_preserves_order() {
        let values = vec![
            "a".to_string(),
            "".to_string(),
            "b".to_string(),
            "a".to_string(),
        ];
        assert_eq!(unique_values(values), vec!["a", "b"]);
    }

    #[test]
    fn render_template_substitutes_and_collapses() {
        let vars = TemplateVars {
            topic: "error handling",
            stack: "",
            objective: "ship it",
            keyword: "",
        };
        let out = render_template("{{topic}} {{stack}} best practices", &vars);
        assert_eq!(out, "error handling best practices");
    }

    #[test]
    fn strip_html_removes_scripts_and_entities() {
        let html = "<html><script>var x = 1;</script><p>Use &lt;Result&gt; &amp; propagate.</p></html>";
        assert_eq!(strip_html(html), "Use <Result> & propagate.");
    }

    #[test]
    fn strip_html_drops_unterminated_script() {
        let html = "<p>keep</p><script>never closed";
        assert_eq!(strip_html(html), "keep");
    }

    #[test]
    fn split_sentences_enforces_minimum_length() {
        let text = "Short one. This sentence is comfortably longer than thirty-six characters. Tiny!";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 1);
        assert!(sentences[0].starts_with("This sentence"));
    }

    #[test]
    fn split_sentences_requires_whitespace_after_terminator() {
        let text = "Version 1.2 of the library handles configuration merging gracefully today. Done!";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 1);
        assert!(sentences[0].contains("Version 1.2"));
    }

    #[test]
    fn ellipsize_marks_truncation() {
        assert_eq!(ellipsize("abcdef", 10), "abcdef");
        let cut = ellipsize("abcdefghij", 5);
        assert_eq!(cut, "abcd…");
    }
}
