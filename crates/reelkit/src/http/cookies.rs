//! Cookie map helpers.
//!
//! Sessions keep cookies as a plain name/value map; these functions move
//! values between that map and the `Set-Cookie` / `Cookie` header forms.

use rustc_hash::FxHashMap;
use tracing::debug;

pub type CookieMap = FxHashMap<String, String>;

/// Name of the cookie carrying the anti-forgery value mirrored in `X-XSRF-TOKEN`.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Parse the `name=value` part of each `Set-Cookie` value. Later occurrences of a
/// name overwrite earlier ones. Empty values are kept; they mark a cleared cookie.
pub fn parse_set_cookies<'a, I>(values: I) -> CookieMap
where
    I: IntoIterator<Item = &'a str>,
{
    let mut cookies = CookieMap::default();
    for cookie_str in values {
        let Some(cookie_part) = cookie_str.split(';').next() else {
            continue;
        };
        let Some((name, value)) = cookie_part.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            continue;
        }
        debug!("Storing cookie: {}", name);
        cookies.insert(name.to_owned(), value.to_owned());
    }
    cookies
}

/// Fill in `fallback` values for any key `cookies` does not have.
pub fn apply_fallback(cookies: &mut CookieMap, fallback: &CookieMap) {
    for (name, value) in fallback {
        cookies
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Additive merge: `updates` overwrite matching keys, unseen keys are kept.
/// An empty update value removes the key.
pub fn merge(cookies: &mut CookieMap, updates: &CookieMap) {
    for (name, value) in updates {
        if value.is_empty() {
            cookies.remove(name);
        } else {
            cookies.insert(name.clone(), value.clone());
        }
    }
}

/// Build a `Cookie` header value from the non-empty cookies. Names are emitted
/// in sorted order so the header is stable across calls.
pub fn build_cookie_header(cookies: &CookieMap) -> Option<String> {
    let mut pairs: Vec<(&String, &String)> =
        cookies.iter().filter(|(_, v)| !v.is_empty()).collect();
    if pairs.is_empty() {
        return None;
    }
    pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut cookie_string =
        String::with_capacity(pairs.iter().map(|(k, v)| k.len() + 1 + v.len() + 2).sum());
    for (name, value) in pairs {
        if !cookie_string.is_empty() {
            cookie_string.push_str("; ");
        }
        cookie_string.push_str(name);
        cookie_string.push('=');
        cookie_string.push_str(value);
    }
    Some(cookie_string)
}

/// URL-decoded value of the XSRF cookie, if present.
pub fn decoded_xsrf(cookies: &CookieMap) -> Option<String> {
    let raw = cookies.get(XSRF_COOKIE).filter(|raw| !raw.is_empty())?;
    match urlencoding::decode(raw) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(e) => {
            debug!(error = %e, "XSRF cookie is not valid percent-encoding; using raw value");
            Some(raw.clone())
        }
    }
}
