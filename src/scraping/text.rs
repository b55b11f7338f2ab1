//! Pure text extractors applied to the visible text of a product card.

use regex::Regex;
use std::sync::OnceLock;

/// Returned by [`extract_price`] when the text carries no currency token.
pub const NO_PRICE: &str = "N/A";
/// Returned by [`extract_title`] when no line qualifies as a title.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// UI affordances that show up as whole lines inside product cards.
const TITLE_DENYLIST: &[&str] = &["SHOP", "BUY NOW", "VIEW PRODUCTS", "VIEW PRODUCT", "SHOP NOW"];

const MIN_TITLE_CHARS: usize = 8;

static RUPEE_RE: OnceLock<Regex> = OnceLock::new();
static OTHER_CURRENCY_RE: OnceLock<Regex> = OnceLock::new();

fn rupee_re() -> &'static Regex {
    RUPEE_RE.get_or_init(|| Regex::new(r"₹\s*[\d,.]+(?:\.\d+)?").expect("valid rupee regex"))
}

fn other_currency_re() -> &'static Regex {
    OTHER_CURRENCY_RE
        .get_or_init(|| Regex::new(r"[$€£]\s?[\d,.]+").expect("valid currency regex"))
}

/// First currency-prefixed amount in `text`, verbatim (symbol, any spacing,
/// digits). Rupee amounts win over `$`/`€`/`£`; no normalisation is applied.
pub fn extract_price(text: &str) -> String {
    rupee_re()
        .find(text)
        .or_else(|| other_currency_re().find(text))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| NO_PRICE.to_string())
}

/// `true` when [`extract_price`] found an amount.
pub fn has_price(price: &str) -> bool {
    price != NO_PRICE
}

/// Longest line of the card that carries no rupee amount, is not a button
/// label and is long enough to be a product name.
pub fn extract_title(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| is_title_candidate(l))
        .fold(None::<&str>, |best, line| match best {
            Some(b) if b.chars().count() >= line.chars().count() => Some(b),
            _ => Some(line),
        })
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}

fn is_title_candidate(line: &str) -> bool {
    if line.contains('₹') {
        return false;
    }
    let upper = line.to_uppercase();
    if TITLE_DENYLIST.contains(&upper.as_str()) || upper.starts_with("LEARN MORE") {
        return false;
    }
    line.chars().count() >= MIN_TITLE_CHARS
}
