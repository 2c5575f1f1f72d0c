//! Image URL normalisation toward high-resolution variants.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use url::Url;

/// Default edge length requested when upgrading thumbnails.
pub const DEFAULT_HIRES_SIZE: u32 = 1000;

const SIZE_QUERY_PARAMS: &[&str] = &["width", "height", "w", "h"];

fn vtex_ids_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "/ids/155620-500-500/" style segments
    RE.get_or_init(|| Regex::new(r"/ids/(\d+)-(\d{2,4})-(\d{2,4})").expect("ids regex is valid"))
}

fn wxh_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(^|[^\d])(\d{2,4})x(\d{2,4})([^\d]|$)").expect("WxH regex is valid")
    })
}

/// Rewrite known thumbnail size tokens to `size` and drop sizing query
/// parameters. Tokens already at or above `size` are left alone.
///
/// Unparsable (e.g. relative) URLs only get the path rewrite.
pub fn upgrade_image_url(raw: &str, size: u32) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let Ok(mut url) = Url::parse(raw) else {
        return rewrite_size_tokens(raw, size);
    };

    let path = rewrite_size_tokens(url.path(), size);
    url.set_path(&path);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| {
                !SIZE_QUERY_PARAMS
                    .iter()
                    .any(|p| k.eq_ignore_ascii_case(p))
            })
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.to_string()
}

fn rewrite_size_tokens(path: &str, size: u32) -> String {
    let smaller = |w: &str, h: &str| {
        let w: u32 = w.parse().unwrap_or(u32::MAX);
        let h: u32 = h.parse().unwrap_or(u32::MAX);
        w < size || h < size
    };

    let path = vtex_ids_re().replace_all(path, |caps: &Captures<'_>| {
        if smaller(&caps[2], &caps[3]) {
            format!("/ids/{}-{size}-{size}", &caps[1])
        } else {
            caps[0].to_string()
        }
    });

    wxh_re()
        .replace_all(&path, |caps: &Captures<'_>| {
            if smaller(&caps[2], &caps[3]) {
                format!("{}{size}x{size}{}", &caps[1], &caps[4])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vtex_ids_segment() {
        let url = "https://metro.vteximg.com.br/arquivos/ids/155620-500-500/gaseosa.jpg?v=6378";
        assert_eq!(
            upgrade_image_url(url, 1000),
            "https://metro.vteximg.com.br/arquivos/ids/155620-1000-1000/gaseosa.jpg?v=6378"
        );
    }

    #[test]
    fn test_wxh_token_and_size_params() {
        let url = "https://cdn.test/img/300x300/leche.png?width=300&height=300&v=2";
        assert_eq!(
            upgrade_image_url(url, 1000),
            "https://cdn.test/img/1000x1000/leche.png?v=2"
        );
    }

    #[test]
    fn test_only_size_params_drops_query() {
        let url = "https://cdn.test/img/leche.png?w=120&h=120";
        assert_eq!(upgrade_image_url(url, 1000), "https://cdn.test/img/leche.png");
    }

    #[test]
    fn test_large_images_untouched() {
        let url = "https://cdn.test/img/1200x1200/leche.png";
        assert_eq!(upgrade_image_url(url, 1000), url);
    }

    #[test]
    fn test_empty_and_relative() {
        assert_eq!(upgrade_image_url("  ", 1000), "");
        assert_eq!(
            upgrade_image_url("/arquivos/ids/42-250-250/x.jpg", 1000),
            "/arquivos/ids/42-1000-1000/x.jpg"
        );
    }
}
