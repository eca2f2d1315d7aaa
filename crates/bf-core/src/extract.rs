//! Base-layout link extraction from free text (video descriptions).

use std::sync::OnceLock;

use regex::Regex;

/// Default number of links taken from a single text blob.
pub const DEFAULT_LINKS_PER_SOURCE: usize = 2;

const LINK_PATTERN: &str = r"https://link\.clashofclans\.com/[a-z]{2}/?\?action=OpenLayout&id=TH[0-9]{1,2}%3A[A-Z]+%3A[0-9A-Za-z_\-]+";

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LINK_PATTERN).expect("valid link regex"))
}

/// Returns true when `candidate` is exactly one well-formed layout link.
pub fn is_valid_link(candidate: &str) -> bool {
    link_re()
        .find(candidate)
        .is_some_and(|m| m.start() == 0 && m.end() == candidate.len())
}

/// The encoded level marker a link must carry, e.g. `id=TH15%3A`.
pub fn level_marker(level: &str) -> String {
    format!("id={level}%3A")
}

/// Extract layout links from `text`.
///
/// With `level` set, only links whose encoded level segment equals it are kept.
/// At most `cap` distinct links are returned, in order of appearance, so one
/// description cannot dominate a result set.
pub fn extract_links(text: &str, level: Option<&str>, cap: usize) -> Vec<String> {
    let marker = level.map(level_marker);
    let mut out: Vec<String> = Vec::new();

    for m in link_re().find_iter(text) {
        if out.len() >= cap {
            break;
        }
        let link = m.as_str();
        if let Some(marker) = &marker {
            if !link.contains(marker.as_str()) {
                continue;
            }
        }
        if out.iter().any(|l| l == link) {
            continue;
        }
        out.push(link.to_string());
    }

    out
}
