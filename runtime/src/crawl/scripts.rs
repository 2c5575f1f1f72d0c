//! In-page script snippets used to drive and measure listing pages.

use crate::config::SiteProfile;

/// Attribute used to tag the load-more control found by `find_load_more`.
pub const LOAD_MORE_ATTR: &str = "data-shelfcrawl-more";

/// Selector matching the tagged load-more control.
pub const LOAD_MORE_SELECTOR: &str = "[data-shelfcrawl-more]";

pub const SCROLL_HEIGHT: &str = "document.body.scrollHeight";

pub const SCROLL_TO_BOTTOM: &str = "(() => { window.scrollTo(0, document.body.scrollHeight); return true; })()";

/// Script-level click on the tagged control, bypassing input events.
pub const SCRIPT_CLICK: &str = "(() => { const el = document.querySelector('[data-shelfcrawl-more]'); if (!el) return false; el.click(); return true; })()";

/// Number of product cards currently attached to the document.
pub fn count_items(profile: &SiteProfile) -> String {
    format!(
        "document.querySelectorAll({}).length",
        js_string(&profile.card_selector)
    )
}

/// Look for a load-more control by text or class marker. Returns a boolean
/// and tags the match with `LOAD_MORE_ATTR`.
///
/// Anchors that navigate elsewhere only match on the class marker; a "ver
/// más" link to another listing is not a load-more control.
pub fn find_load_more(profile: &SiteProfile) -> String {
    let patterns: Vec<String> = profile
        .load_more_texts
        .iter()
        .map(|p| p.to_lowercase())
        .collect();
    let patterns = serde_json::to_string(&patterns).unwrap_or_else(|_| "[]".into());
    let marker = js_string(&profile.load_more_class);

    format!(
        r#"(() => {{
  const patterns = {patterns};
  const marker = {marker};
  document.querySelectorAll('[{attr}]').forEach(el => el.removeAttribute('{attr}'));
  const found = Array.from(document.querySelectorAll('button, a, [role="button"]')).find(el => {{
    if (el.disabled) return false;
    const cls = typeof el.className === 'string' ? el.className : '';
    if (marker.length > 0 && cls.includes(marker)) return true;
    if (el.tagName === 'A') {{
      const href = (el.getAttribute('href') || '').trim();
      const navigates = href !== '' && href !== '#' && !href.toLowerCase().startsWith('javascript:');
      if (navigates) return false;
    }}
    const text = (el.innerText || el.textContent || '').toLowerCase();
    return patterns.some(p => text.includes(p));
  }});
  if (!found) return false;
  found.setAttribute('{attr}', '1');
  found.scrollIntoView({{ block: 'center' }});
  return true;
}})()"#,
        attr = LOAD_MORE_ATTR,
    )
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".into())
}
