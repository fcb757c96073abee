// Ad-hoc text extraction shared by every board profile: prices, shipping
// fees, store tags and counter cells, all scraped out of free-form titles.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Price;

// Plausible won-price window. Anything outside is assumed to be a model
// number or date fragment, not a price.
const MIN_WON: i64 = 100;
const MAX_WON: i64 = 100_000_000;
const MIN_BARE_WON: i64 = 1_000;

static MAN_WON: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+\.?[0-9]*)\s*만\s*원").unwrap());
static WON_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[￦₩]\s*([0-9][0-9,]*)").unwrap());
static COMMA_WON: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9][0-9,]*)\s*원").unwrap());
static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9,])([0-9]{4,})(?:[^0-9,]|$)").unwrap());

static DOLLAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s*[0-9][0-9,]*(?:\.[0-9]{1,2})?|[0-9][0-9,]*(?:\.[0-9]{1,2})?\s*(?:달러|USD)")
        .unwrap()
});
static YEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)¥\s*[0-9][0-9,]*|[0-9][0-9,]*\s*(?:엔|JPY)").unwrap());
static EURO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)€\s*[0-9][0-9,]*(?:\.[0-9]{1,2})?|[0-9][0-9,]*(?:\.[0-9]{1,2})?\s*(?:유로|EUR)")
        .unwrap()
});

static SHIPPING_FEE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"배송\s*비?\s*[:：]?\s*([0-9][0-9,]*)\s*원?").unwrap());

static TRAILING_BRACKET_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\[(](\d+)[\])]\s*$").unwrap());
static DIGIT_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9][0-9,]*").unwrap());
static LEADING_STORE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(.+?)\]").unwrap());

/// Pulls a price out of a posting title.
///
/// Won amounts come back as [`Price::Won`] in plain won:
/// "12.3만원" → 123000, "￦69,920" → 69920, "8,910원" → 8910, a bare
/// "69920" → 69920. Foreign-currency mentions ($ / ¥ / €, and their
/// spelled-out forms) are kept as the matched text. Giveaway keywords
/// ("무료", "나눔") yield no price at all.
pub fn extract_price(text: &str) -> Option<Price> {
    if text.is_empty() {
        return None;
    }

    // "12.3만원", "5만원"
    if let Some(caps) = MAN_WON.captures(text) {
        if let Ok(man) = caps[1].parse::<f64>() {
            let won = (man * 10_000.0).round() as i64;
            if (MIN_WON..=MAX_WON).contains(&won) {
                return Some(Price::Won(won));
            }
        }
    }

    // "￦69920", "₩99,000"
    if let Some(won) = captured_won(&WON_SYMBOL, text, MIN_WON) {
        return Some(Price::Won(won));
    }

    // "8,910원", "139,000원"
    if let Some(won) = captured_won(&COMMA_WON, text, MIN_WON) {
        return Some(Price::Won(won));
    }

    // Bare digit run of 4+: "69920". Held to a tighter minimum since there
    // is no currency marker backing it up.
    if let Some(won) = captured_won(&BARE_NUMBER, text, MIN_BARE_WON) {
        return Some(Price::Won(won));
    }

    // Foreign currencies stay free-form.
    for pattern in [&*DOLLAR, &*YEN, &*EURO] {
        if let Some(m) = pattern.find(text) {
            return Some(Price::Foreign(m.as_str().trim().to_string()));
        }
    }

    None
}

fn captured_won(pattern: &Regex, text: &str, min: i64) -> Option<i64> {
    let caps = pattern.captures(text)?;
    let won: i64 = caps[1].replace(',', "").parse().ok()?;
    if (min..=MAX_WON).contains(&won) {
        Some(won)
    } else {
        None
    }
}

/// Extracts a shipping fee marker from a title: free-shipping keywords map
/// to the "무료" marker, explicit fees ("배송비 2,500원") are re-rendered
/// with digit grouping.
pub fn extract_shipping_fee(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = SHIPPING_FEE.captures(text) {
        if let Ok(fee) = caps[1].replace(',', "").parse::<i64>() {
            if fee == 0 {
                return Some("무료".to_string());
            }
            return Some(format!("{}원", group_digits(fee)));
        }
    }

    const FREE_KEYWORDS: [&str; 4] = ["무료배송", "배송비무료", "무배", "무료"];
    if FREE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return Some("무료".to_string());
    }

    None
}

/// Strips a trailing "[12]" / "(12)" comment counter off a title.
pub fn clean_title(title: &str) -> String {
    TRAILING_BRACKET_COUNT.replace(title, "").trim().to_string()
}

/// Reads the comment counter a board appends to its titles, if any.
pub fn comment_count_in_title(title: &str) -> Option<u32> {
    let caps = TRAILING_BRACKET_COUNT.captures(title)?;
    caps[1].parse().ok()
}

/// Parses a counter cell ("17", "[1,203]", "(8)") into a number.
/// Anything without a digit group is 0.
pub fn extract_count(text: &str) -> u32 {
    DIGIT_GROUP
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .unwrap_or(0)
}

/// Store name from a leading "[판매처]" tag, bracket noise stripped.
pub fn extract_store(title: &str) -> Option<String> {
    let caps = LEADING_STORE_TAG.captures(title)?;
    let store: String = caps[1]
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')' | '{' | '}'))
        .collect();
    let store = store.trim();
    if store.is_empty() {
        None
    } else {
        Some(store.to_string())
    }
}

fn group_digits(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 { format!("-{grouped}") } else { grouped }
}
