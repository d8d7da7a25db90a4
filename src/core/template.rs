//! Output name templates.
//!
//! Supported placeholders: `[hash]`, `[hash:N]`, `[contenthash]` and
//! `[contenthash:N]`, where `N` keeps the first N characters of the hash.
//! Anything else in brackets is copied through unchanged.

/// Substitute hash placeholders in `template`
pub fn render_asset_path(template: &str, hash: &str) -> String {
    let mut out = String::with_capacity(template.len() + hash.len());
    let mut rest = template;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        let Some(close) = after_open.find(']') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let placeholder = &after_open[..close];
        match resolve_placeholder(placeholder, hash) {
            Some(value) => out.push_str(value),
            None => {
                out.push('[');
                out.push_str(placeholder);
                out.push(']');
            }
        }
        rest = &after_open[close + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve_placeholder<'a>(placeholder: &str, hash: &'a str) -> Option<&'a str> {
    let (name, length) = match placeholder.split_once(':') {
        Some((name, length)) => (name, Some(length.parse::<usize>().ok()?)),
        None => (placeholder, None),
    };

    if name != "hash" && name != "contenthash" {
        return None;
    }

    match length {
        Some(0) => None,
        Some(n) => Some(&hash[..n.min(hash.len())]),
        None => Some(hash),
    }
}
