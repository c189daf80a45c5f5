//! Referrer classification tables and the click-identifier table.
//!
//! Hostname patterns are compiled once on first use. Table order is part of
//! the contract: the first matching entry wins, so reordering changes results.
//! Patterns are kept exactly as deployed, including the yandex alternation
//! that also accepts any hostname ending in `ru`.

use once_cell::sync::Lazy;
use regex::Regex;

/// One hostname rule: platform label plus the pattern that recognizes it.
pub struct HostRule {
    pub platform: &'static str,
    pub pattern: Regex,
}

/// A named group of rules. The group name becomes the record's `medium`.
pub struct RuleGroup {
    pub medium: &'static str,
    pub rules: Vec<HostRule>,
}

fn rule(platform: &'static str, pattern: &str) -> HostRule {
    HostRule {
        platform,
        pattern: Regex::new(pattern).unwrap(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Referrer Rules
// ═══════════════════════════════════════════════════════════════════════════════

pub static REFERRER_RULES: Lazy<Vec<RuleGroup>> = Lazy::new(|| {
    vec![
        RuleGroup {
            medium: "organic",
            rules: vec![
                rule("google", r"^www\.(google)\.[a-z]{2,3}(?:\.[a-z]{2})?$"),
                rule("bing", r"^www\.(bing)\.com$"),
                rule("duckduckgo", r"^(duckduckgo)\.com$"),
                rule("yahoo", r"^(?:www|m)?\.?(yahoo)\.(?:com|cn)$"),
                rule("ecosia", r"^www\.(ecosia)\.org$"),
                rule("ask", r"^www\.(ask)\.com$"),
                rule("aol", r"^(?:search\.)?(aol)\.com$"),
                rule("baidu", r"^www\.(baidu)\.com$"),
                rule("yandex", r"^(?:www\.)?(yandex)\.com|ru$"),
            ],
        },
        RuleGroup {
            medium: "social",
            rules: vec![
                rule("linkedin", r"^www\.(linkedin)\.com$"),
                rule("facebook", r"^www\.(facebook)\.com$"),
                rule("twitter", r"^t\.co$"),
                rule("instagram", r"^l\.(instagram)\.com$"),
                rule("pinterest", r"^www\.(pinterest)\.com$"),
                rule("youtube", r"^www\.(youtube)\.com$"),
            ],
        },
    ]
});

// ═══════════════════════════════════════════════════════════════════════════════
// Click Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Ad platform → click-id query parameters, evaluated top to bottom.
pub const CLICK_ID_TABLE: &[(&str, &[&str])] = &[
    (
        "google",
        &["gclid", "gclsrc", "dclid", "wbraid", "gbraid", "gad_source"],
    ),
    ("meta", &["fbclid"]),
    ("bing", &["msclkid"]),
    ("linkedin", &["li_fat_id"]),
    ("tiktok", &["ttclid"]),
    ("twitter", &["twclid"]),
];

/// First `(platform, medium)` whose pattern accepts the hostname.
pub fn classify_host(hostname: &str) -> Option<(&'static str, &'static str)> {
    REFERRER_RULES.iter().find_map(|group| {
        group
            .rules
            .iter()
            .find(|rule| rule.pattern.is_match(hostname))
            .map(|rule| (rule.platform, group.medium))
    })
}
