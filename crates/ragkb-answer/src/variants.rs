//! Query reformulations sent to the retriever alongside the raw question.

use regex::Regex;
use std::sync::LazyLock;

static STOPWORDS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(le|la|les|un|une|des|de|du|dans|sur|pour|avec|et|ou|à|au|aux|en)\b").ok()
});

static SYNONYMS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\brelancer\b", "redémarrer"),
        (r"(?i)\brestart\b", "redémarrer"),
        (r"(?i)\bservice\b", "daemon"),
        (r"(?i)\bconf(ig)?\b", "configuration"),
    ]
    .into_iter()
    .filter_map(|(pattern, rep)| Regex::new(pattern).ok().map(|re| (re, rep)))
    .collect()
});

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Up to `n` distinct phrasings of `question`.
///
/// The first is always the trimmed question. The second drops common French
/// function words and the third rewrites a few operations vocabulary synonyms.
pub fn make_variants(question: &str, n: usize) -> Vec<String> {
    let question = question.trim();
    let mut out = vec![question.to_string()];
    if n >= 2 {
        if let Some(re) = STOPWORDS.as_ref() {
            out.push(collapse_ws(&re.replace_all(question, " ")));
        }
    }
    if n >= 3 {
        let mut v = question.to_string();
        for (re, rep) in SYNONYMS.iter() {
            v = re.replace_all(&v, *rep).into_owned();
        }
        out.push(v.trim().to_string());
    }

    let mut unique: Vec<String> = Vec::with_capacity(out.len());
    for v in out {
        if !v.is_empty() && !unique.contains(&v) {
            unique.push(v);
        }
    }
    unique.truncate(n.max(1));
    unique
}
