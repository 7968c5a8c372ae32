use std::sync::LazyLock;

use regex::Regex;

static SCHEME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[inline]
pub fn capture_group_1_owned(re: &Regex, input: &str) -> Option<String> {
    capture_group_1(re, input).map(ToOwned::to_owned)
}

/// Resolve `href` against `origin` unless it already carries a scheme.
/// Protocol-relative references are upgraded to `https`.
pub fn absolutize(origin: &str, href: &str) -> String {
    let href = href.trim();
    if SCHEME_REGEX.is_match(href) {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize() {
        let origin = "https://videos.test";
        assert_eq!(
            absolutize(origin, "/watch/abc"),
            "https://videos.test/watch/abc"
        );
        assert_eq!(
            absolutize(origin, "https://other.example/x"),
            "https://other.example/x"
        );
        assert_eq!(
            absolutize("https://videos.test/", "watch/abc"),
            "https://videos.test/watch/abc"
        );
        assert_eq!(
            absolutize(origin, "//cdn.test/a.jpg"),
            "https://cdn.test/a.jpg"
        );
    }
}
