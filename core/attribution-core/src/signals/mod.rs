//! Attribution signal extraction.
//!
//! Turns the current navigation (page URL + referrer) into partial records.
//!
//! # Precedence
//!
//! ```text
//! utm_* parameters ─┐
//!                   ├─ parameter signal ──(non-empty?)── wins
//! click ids ────────┘                          │
//!                                              └─(empty)── referrer signal
//! ```
//!
//! Referrer classification only runs when the query string carries nothing.
//! That decision lives in the resolver; this module just extracts.
//!
//! # Module Structure
//!
//! - [`patterns`]: ordered hostname rules and the click-id table

pub mod patterns;

use tracing::debug;
use url::Url;

use crate::error::{AttributionError, Result};
use crate::record::{Signals, UtmField, MEDIUM_PAID, MEDIUM_REFERRAL};

use patterns::{classify_host, CLICK_ID_TABLE};

/// Where the visitor is and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    page_url: Url,
    referrer: String,
}

impl Navigation {
    /// `referrer` is the raw referrer string; pass `""` or `None` when absent.
    pub fn new(page_url: &str, referrer: Option<&str>) -> Result<Self> {
        let parsed =
            Url::parse(page_url).map_err(|e| AttributionError::invalid_url(page_url, e))?;
        Ok(Navigation {
            page_url: parsed,
            referrer: referrer.unwrap_or_default().to_string(),
        })
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    pub fn hostname(&self) -> &str {
        self.page_url.host_str().unwrap_or_default()
    }

    pub fn extract_parameters(&self) -> Signals {
        extract_parameters(&self.page_url)
    }

    pub fn extract_referrer(&self) -> Signals {
        extract_referrer(&self.page_url, &self.referrer)
    }
}

/// Reads UTM parameters, falling back to ad-platform click identifiers.
///
/// Empty UTM values are skipped. The click-id fallback runs only when neither
/// `utm_source` nor `utm_medium` is present as a key at all.
pub fn extract_parameters(page_url: &Url) -> Signals {
    let pairs: Vec<(String, String)> = page_url.query_pairs().into_owned().collect();
    let has = |name: &str| pairs.iter().any(|(key, _)| key == name);
    let first = |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let mut signals = Signals::default();
    for field in UtmField::ALL {
        if let Some(value) = first(field.param()).filter(|v| !v.is_empty()) {
            signals.set(field, value);
        }
    }

    if !has(UtmField::Source.param()) && !has(UtmField::Medium.param()) {
        let matched = CLICK_ID_TABLE
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| has(id)));
        if let Some((platform, _)) = matched {
            debug!(platform, "Click identifier found");
            signals.set(UtmField::Source, *platform);
            signals.set(UtmField::Medium, MEDIUM_PAID);
        }
    }

    signals
}

/// Classifies an external referrer. Same-host and missing referrers yield
/// an empty signal.
pub fn extract_referrer(page_url: &Url, referrer: &str) -> Signals {
    if referrer.is_empty() {
        return Signals::default();
    }

    let parsed = match Url::parse(referrer) {
        Ok(url) => url,
        Err(err) => {
            debug!(referrer, error = %err, "Ignoring unparseable referrer");
            return Signals::default();
        }
    };

    let Some(hostname) = parsed.host_str() else {
        return Signals::default();
    };

    if Some(hostname) == page_url.host_str() {
        return Signals::default();
    }

    match classify_host(hostname) {
        Some((platform, medium)) => Signals::new(platform, medium),
        None => Signals::new(hostname, MEDIUM_REFERRAL),
    }
}
