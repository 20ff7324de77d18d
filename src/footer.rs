//! Footer extraction.
//!
//! The monitored service stamps every page with a footer such as
//! `9.14.7-i068 | 3 ms`: service version, serving node, and page
//! generation time. Markup around the footer changes from time to time, so
//! extraction runs an ordered list of matchers from strict to loose and
//! keeps whatever the first hit yields.

use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::OnceLock;

/// Which matcher produced a [`Footer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchTier {
    /// Version, node and response time.
    Full,
    /// Version and node.
    Partial,
    /// Node only.
    NodeOnly,
}

/// Fields pulled out of a page footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Footer {
    pub version: Option<String>,
    /// Always lowercase.
    pub node_short_id: String,
    pub response_time_ms: Option<u64>,
    pub tier: MatchTier,
}

struct Matcher {
    tier: MatchTier,
    pattern: Regex,
    extract: fn(MatchTier, &Captures<'_>) -> Option<Footer>,
}

impl Matcher {
    fn apply(&self, text: &str) -> Option<Footer> {
        let caps = self.pattern.captures(text)?;
        (self.extract)(self.tier, &caps)
    }
}

// ASCII digits only: regex's `\d` also matches other scripts' decimals.
const VERSION: &str = r"([0-9]+\.[0-9]+\.[0-9]+(?:\.[0-9]+)?)";
const DASH_NODE: &str = r"\s*[-–]\s*(i[0-9]{3})";

fn matchers() -> &'static [Matcher] {
    static MATCHERS: OnceLock<Vec<Matcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        vec![
            Matcher {
                tier: MatchTier::Full,
                pattern: compile(&format!(r"(?i){VERSION}{DASH_NODE}\s*\|\s*([0-9]+)\s*ms")),
                extract: |tier, caps| {
                    // An absurd number that overflows u64 falls through to the
                    // partial matcher rather than being dropped entirely.
                    let ms = caps[3].parse().ok()?;
                    Some(footer(tier, Some(&caps[1]), &caps[2], Some(ms)))
                },
            },
            Matcher {
                tier: MatchTier::Partial,
                pattern: compile(&format!(r"(?i){VERSION}{DASH_NODE}")),
                extract: |tier, caps| Some(footer(tier, Some(&caps[1]), &caps[2], None)),
            },
            Matcher {
                tier: MatchTier::NodeOnly,
                pattern: compile(r"(?i)\b(i0(?:67|68|69))\b"),
                extract: |tier, caps| Some(footer(tier, None, &caps[1], None)),
            },
        ]
    })
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("footer patterns are valid")
}

fn footer(tier: MatchTier, version: Option<&str>, node: &str, ms: Option<u64>) -> Footer {
    Footer {
        version: version.map(str::to_string),
        node_short_id: node.to_lowercase(),
        response_time_ms: ms,
        tier,
    }
}

/// Extract the footer from raw page markup.
///
/// Returns `None` when no matcher fires; callers record that as a parse
/// failure.
pub fn parse_footer(html: &str) -> Option<Footer> {
    let text = normalize(html);
    matchers().iter().find_map(|m| m.apply(&text))
}

/// Strip tags, decode the handful of entities that show up in footers, and
/// collapse whitespace.
pub fn normalize(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static NBSP: OnceLock<Regex> = OnceLock::new();
    static AMP: OnceLock<Regex> = OnceLock::new();
    static NUMERIC: OnceLock<Regex> = OnceLock::new();

    let tag = TAG.get_or_init(|| compile(r"<[^>]+>"));
    let nbsp = NBSP.get_or_init(|| compile(r"(?i)&nbsp;"));
    let amp = AMP.get_or_init(|| compile(r"(?i)&amp;"));
    let numeric = NUMERIC.get_or_init(|| compile(r"&#(?:([0-9]+)|[xX]([0-9a-fA-F]+));"));

    let text = tag.replace_all(html, " ");
    let text = nbsp.replace_all(&text, " ");
    let text = amp.replace_all(&text, "&");
    let text = numeric.replace_all(&text, |caps: &Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(dec), _) => dec.as_str().parse::<u32>().ok(),
            (None, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| " ".to_string())
    });

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_footer() {
        let html = r#"<footer><span class="v">9.14.7-i068</span> | <b>3</b> ms</footer>"#;
        let f = parse_footer(html).unwrap();
        assert_eq!(f.version.as_deref(), Some("9.14.7"));
        assert_eq!(f.node_short_id, "i068");
        assert_eq!(f.response_time_ms, Some(3));
        assert_eq!(f.tier, MatchTier::Full);
    }

    #[test]
    fn test_full_footer_four_component_version_and_en_dash() {
        let f = parse_footer("build 10.2.0.1 – I069 | 142 ms").unwrap();
        assert_eq!(f.version.as_deref(), Some("10.2.0.1"));
        assert_eq!(f.node_short_id, "i069");
        assert_eq!(f.response_time_ms, Some(142));
    }

    #[test]
    fn test_numeric_entity_dash_is_decoded() {
        let f = parse_footer("9.14.7&#8211;i067&nbsp;|&nbsp;12&nbsp;ms").unwrap();
        assert_eq!(f.tier, MatchTier::Full);
        assert_eq!(f.node_short_id, "i067");
        assert_eq!(f.response_time_ms, Some(12));

        let f = parse_footer("9.14.7&#x2013;i067").unwrap();
        assert_eq!(f.tier, MatchTier::Partial);
    }

    #[test]
    fn test_partial_footer() {
        let f = parse_footer("<p>Version 9.14.6-i067</p>").unwrap();
        assert_eq!(f.version.as_deref(), Some("9.14.6"));
        assert_eq!(f.node_short_id, "i067");
        assert_eq!(f.response_time_ms, None);
        assert_eq!(f.tier, MatchTier::Partial);
    }

    #[test]
    fn test_node_only_fallback() {
        let f = parse_footer("<div>served by I068</div>").unwrap();
        assert_eq!(f.version, None);
        assert_eq!(f.node_short_id, "i068");
        assert_eq!(f.response_time_ms, None);
        assert_eq!(f.tier, MatchTier::NodeOnly);
    }

    #[test]
    fn test_fallback_ignores_unknown_and_embedded_tokens() {
        assert!(parse_footer("node i070 is up").is_none());
        assert!(parse_footer("xi068y").is_none());
    }

    #[test]
    fn test_no_match() {
        assert!(parse_footer("").is_none());
        assert!(parse_footer("<html><body>Welcome</body></html>").is_none());
    }

    #[test]
    fn test_full_wins_over_earlier_fallback_token() {
        let f = parse_footer("i067 mentioned first ... 9.14.7-i069 | 5 ms").unwrap();
        assert_eq!(f.node_short_id, "i069");
        assert_eq!(f.tier, MatchTier::Full);
    }

    #[test]
    fn test_overflowing_response_time_degrades_to_partial() {
        let f = parse_footer("9.14.7-i068 | 99999999999999999999999 ms").unwrap();
        assert_eq!(f.tier, MatchTier::Partial);
        assert_eq!(f.response_time_ms, None);
    }

    #[test]
    fn test_non_ascii_digits_are_not_matched() {
        // Arabic-Indic digits in the node id: nothing usable.
        assert!(parse_footer("9.14.7-i\u{0660}\u{0666}\u{0668} | 3 ms").is_none());

        // In the version: only the bare node id survives.
        let f = parse_footer("\u{0669}.\u{0661}\u{0664}.\u{0667}-i068 | 3 ms").unwrap();
        assert_eq!(f.version, None);
        assert_eq!(f.node_short_id, "i068");
        assert_eq!(f.tier, MatchTier::NodeOnly);

        // In the response time: version and node without latency.
        let f = parse_footer("9.14.7-i068 | \u{0663} ms").unwrap();
        assert_eq!(f.tier, MatchTier::Partial);
        assert_eq!(f.version.as_deref(), Some("9.14.7"));
        assert_eq!(f.response_time_ms, None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("<p>a&nbsp;&amp;\n\n  b</p><br/>&#65;"),
            "a & b A"
        );
        // Out-of-range code point becomes a space.
        assert_eq!(normalize("x&#1114112;y"), "x y");
    }
}
