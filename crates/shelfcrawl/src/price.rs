//! Locale-tolerant price parsing.
//!
//! Storefront prices arrive as display text (`S/ 12.50`, `1.234,56`, `S/. 3,90`).
//! Only digits and `,`/`.` separators survive; the last separator is the
//! decimal point unless it is clearly a thousands separator.

/// Parse display text into a positive price.
///
/// Returns `None` for text without digits, negative values, zero, and anything
/// that does not parse to a finite number.
pub fn parse_price(text: &str) -> Option<f64> {
    let kept: Vec<char> = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let first = kept.iter().position(|c| c.is_ascii_digit())?;
    let last = kept.iter().rposition(|c| c.is_ascii_digit())?;

    if first > 0 && kept[first - 1] == '-' {
        return None;
    }

    let core = &kept[first..=last];
    if core.contains(&'-') {
        return None;
    }

    let normalized = normalize_separators(core);
    let value: f64 = normalized.parse().ok()?;
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

fn normalize_separators(core: &[char]) -> String {
    let is_sep = |c: &char| matches!(c, ',' | '.');
    let Some(last_sep) = core.iter().rposition(is_sep) else {
        return core.iter().collect();
    };

    let sep = core[last_sep];
    let commas = core.iter().filter(|&&c| c == ',').count();
    let dots = core.iter().filter(|&&c| c == '.').count();
    let same_kind = if sep == ',' { commas } else { dots };
    let mixed = commas > 0 && dots > 0;
    let digits_after = core.len() - last_sep - 1;

    let is_decimal = if mixed {
        true
    } else if same_kind > 1 {
        false
    } else {
        digits_after != 3
    };

    core.iter()
        .enumerate()
        .filter_map(|(i, c)| {
            if c.is_ascii_digit() {
                Some(*c)
            } else if i == last_sep && is_decimal {
                Some('.')
            } else {
                None
            }
        })
        .collect()
}
