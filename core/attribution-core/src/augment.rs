//! Embed URL rewriting.
//!
//! Discovered embed URLs get the resolved campaign fields appended so the
//! widget can attribute sign-ups even before the handshake completes. URLs
//! that already carry attribution from the markup are left exactly as they
//! were written.

use url::Url;

use crate::error::{AttributionError, Result};
use crate::record::{AttributionRecord, UtmField};

pub const REFERRER_PARAM: &str = "referrer";

/// Any of these on an embed URL means upstream markup already decided.
pub const EXPLICIT_ATTRIBUTION_PARAMS: [&str; 4] =
    ["utm_source", "utm_medium", "utm_campaign", REFERRER_PARAM];

const FORWARDED_FIELDS: [UtmField; 3] = [UtmField::Source, UtmField::Medium, UtmField::Campaign];

pub fn has_explicit_attribution(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| EXPLICIT_ATTRIBUTION_PARAMS.contains(&&*key))
}

/// Returns `embed_url` with attribution parameters added, or unchanged when
/// it already carries any of [`EXPLICIT_ATTRIBUTION_PARAMS`].
///
/// `referrer` is the percent-encoded page URL, which the query serializer
/// then encodes a second time.
pub fn augment(embed_url: &str, record: &AttributionRecord, page_url: &Url) -> Result<String> {
    let mut url = Url::parse(embed_url).map_err(|e| AttributionError::invalid_url(embed_url, e))?;
    if has_explicit_attribution(&url) {
        return Ok(embed_url.to_string());
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for field in FORWARDED_FIELDS {
        if let Some(value) = record.field(field).filter(|v| !v.is_empty()) {
            pairs.push((field.param().to_string(), value.to_string()));
        }
    }
    pairs.push((
        REFERRER_PARAM.to_string(),
        urlencoding::encode(page_url.as_str()).into_owned(),
    ));

    url.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(url.to_string())
}

/// Applies [`augment`] to every embed URL, failing on the first invalid one.
pub fn augment_all<I, T>(
    embed_urls: I,
    record: &AttributionRecord,
    page_url: &Url,
) -> Result<Vec<String>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    embed_urls
        .into_iter()
        .map(|embed_url| augment(embed_url.as_ref(), record, page_url))
        .collect()
}
