// Generic board-list HTML parsing, driven entirely by a BoardProfile.
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use tracing::debug;

use crate::config::BoardProfile;
use crate::extract;
use crate::model::{FetchError, RAW_TIME_KEY, RawItem};

/// Parses one board list page into raw item records.
///
/// The timestamp cell is carried over untouched; interpreting it is the
/// normalizer's job, not the parser's. Rows missing a title anchor or an
/// href are skipped; a malformed row never fails the whole page.
pub fn parse_board(html: &str, profile: &BoardProfile) -> Result<Vec<RawItem>, FetchError> {
    let document = Html::parse_document(html);

    let row_sel = selector(&profile.row)?;
    let title_sel = selector(&profile.title)?;
    let time_sel = selector(&profile.time)?;
    let reply_sel = optional_selector(profile.reply.as_deref())?;
    let like_sel = optional_selector(profile.like.as_deref())?;
    let store_sel = optional_selector(profile.store.as_deref())?;
    let image_sel = optional_selector(profile.image.as_deref())?;

    let mut items = Vec::new();

    for row in document.select(&row_sel) {
        let Some(title_node) = row.select(&title_sel).next() else {
            debug!("row without title anchor, skipping");
            continue;
        };
        let raw_title = text_of(title_node);
        let Some(href) = title_node.value().attr("href") else {
            debug!("title anchor without href, skipping");
            continue;
        };
        if raw_title.is_empty() || href.is_empty() {
            continue;
        }

        let mut item = RawItem::new();
        item.insert("title".to_string(), json!(extract::clean_title(&raw_title)));
        item.insert(
            "productUrl".to_string(),
            json!(absolutize(&profile.base_url, href)),
        );

        let time_text = row.select(&time_sel).next().map(text_of).unwrap_or_default();
        item.insert(RAW_TIME_KEY.to_string(), json!(time_text));

        if let Some(price) = extract::extract_price(&raw_title) {
            if let Ok(value) = serde_json::to_value(&price) {
                item.insert("price".to_string(), value);
            }
        }
        if let Some(fee) = extract::extract_shipping_fee(&raw_title) {
            item.insert("shippingFee".to_string(), json!(fee));
        }

        // Dedicated store cell wins over the bracket tag in the title.
        let store = store_sel
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .map(text_of)
            .filter(|s| !s.is_empty())
            .or_else(|| extract::extract_store(&raw_title));
        if let Some(store) = store {
            item.insert("storeName".to_string(), json!(store));
        }

        let replies = counter(&row, &reply_sel)
            .or_else(|| extract::comment_count_in_title(&raw_title));
        if let Some(n) = replies {
            item.insert("replyCount".to_string(), json!(n));
        }
        if let Some(n) = counter(&row, &like_sel) {
            item.insert("likeCount".to_string(), json!(n));
        }

        if let Some(src) = image_sel
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .and_then(|img| img.value().attr("src"))
        {
            item.insert(
                "imageUrl".to_string(),
                json!(absolutize(&profile.base_url, src)),
            );
        }

        items.push(item);
    }

    Ok(items)
}

fn selector(source: &str) -> Result<Selector, FetchError> {
    Selector::parse(source).map_err(|e| FetchError::Selector(e.to_string()))
}

fn optional_selector(source: Option<&str>) -> Result<Option<Selector>, FetchError> {
    source.map(selector).transpose()
}

/// Flattens an element's text, collapsing the whitespace noise nested board
/// markup tends to leave behind.
fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn counter(row: &ElementRef<'_>, sel: &Option<Selector>) -> Option<u32> {
    let cell = sel.as_ref()?;
    let text = row.select(cell).next().map(text_of)?;
    if text.is_empty() {
        None
    } else {
        Some(extract::extract_count(&text))
    }
}

fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn profile() -> BoardProfile {
        BoardProfile {
            base_url: "https://board.example.com".to_string(),
            page_url: "https://board.example.com/deals?page={page}".to_string(),
            row: "tr.deal-row".to_string(),
            title: "a.deal-title".to_string(),
            time: "td.deal-time".to_string(),
            reply: Some("span.reply".to_string()),
            like: Some("td.rec".to_string()),
            store: None,
            image: Some("img.thumb".to_string()),
        }
    }

    const PAGE: &str = r#"
        <table><tbody>
          <tr class="deal-row">
            <td><img class="thumb" src="/img/1.jpg"></td>
            <td>
              <a class="deal-title" href="/view.php?no=1">[G마켓] 물티슈 10팩 8,910원 (무배) [15]</a>
              <span class="reply">[15]</span>
            </td>
            <td class="deal-time">22:31:00</td>
            <td class="rec">7</td>
          </tr>
          <tr class="deal-row">
            <td>
              <a class="deal-title" href="https://other.example.com/deal/2">해외직구 $899</a>
            </td>
            <td class="deal-time">5분 전</td>
          </tr>
          <tr class="deal-row">
            <td>공지: 링크 없는 행</td>
          </tr>
        </tbody></table>
    "#;

    #[test]
    fn parses_rows_into_raw_items() {
        let items = parse_board(PAGE, &profile()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first["title"], Value::from("[G마켓] 물티슈 10팩 8,910원 (무배)"));
        assert_eq!(
            first["productUrl"],
            Value::from("https://board.example.com/view.php?no=1")
        );
        assert_eq!(first[RAW_TIME_KEY], Value::from("22:31:00"));
        assert_eq!(first["price"], Value::from(8910));
        assert_eq!(first["shippingFee"], Value::from("무료"));
        assert_eq!(first["storeName"], Value::from("G마켓"));
        assert_eq!(first["replyCount"], Value::from(15));
        assert_eq!(first["likeCount"], Value::from(7));
        assert_eq!(
            first["imageUrl"],
            Value::from("https://board.example.com/img/1.jpg")
        );
    }

    #[test]
    fn absolute_href_is_kept() {
        let items = parse_board(PAGE, &profile()).unwrap();
        assert_eq!(
            items[1]["productUrl"],
            Value::from("https://other.example.com/deal/2")
        );
        assert_eq!(items[1]["price"], Value::from("$899"));
        assert!(items[1].get("replyCount").is_none());
    }

    #[test]
    fn raw_timestamp_is_not_interpreted() {
        let items = parse_board(PAGE, &profile()).unwrap();
        // "5분 전" goes through verbatim; the normalizer owns it.
        assert_eq!(items[1][RAW_TIME_KEY], Value::from("5분 전"));
    }

    #[test]
    fn bad_selector_is_reported() {
        let mut bad = profile();
        bad.row = ":::".to_string();
        assert!(matches!(
            parse_board(PAGE, &bad),
            Err(FetchError::Selector(_))
        ));
    }
}
