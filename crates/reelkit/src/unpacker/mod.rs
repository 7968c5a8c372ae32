//! Unpacker for the `eval(function(p,a,c,k,e,d){...})` JavaScript packer.
//!
//! Packed sources look like
//!
//! ```javascript
//! eval(function(p,a,c,k,e,d){...}('<payload>', <radix>, <count>, '<dictionary>'.split('|'), 0, {}))
//! ```
//!
//! where every word of the original source was replaced by its index in the
//! dictionary, written in the packer's own base-`radix` alphabet (see
//! [`Encoder`]). Unpacking walks the dictionary from the highest index down and
//! substitutes each encoded token back, matching whole words only.

mod encoder;

pub use encoder::Encoder;

use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::trace;

use crate::error::{Result, ScrapeError};

static PACKED_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eval\s*\(\s*function\s*\(\s*p\s*,\s*a\s*,\s*c\s*,\s*k\s*,\s*e\s*,\s*[dr]\s*\)")
        .unwrap()
});

static PACKED_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\}\s*\(\s*'((?:[^'\\]|\\.)*)'\s*,\s*(\d+|\[\])\s*,\s*(\d+)\s*,\s*'((?:[^'\\]|\\.)*)'\s*\.split\(\s*'\|'\s*\)",
    )
    .unwrap()
});

/// The four arguments of a packed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArgs {
    pub payload: String,
    pub radix: u32,
    pub count: usize,
    pub dictionary: Vec<String>,
}

/// Whether `source` contains a packed invocation.
#[inline]
pub fn detect(source: &str) -> bool {
    PACKED_SIGNATURE.is_match(source)
}

/// Locate the packed invocation in `source` and capture its arguments.
pub fn parse_args(source: &str) -> Result<PackedArgs> {
    let start = PACKED_SIGNATURE
        .find(source)
        .ok_or_else(|| ScrapeError::deobfuscation("packed signature not found"))?
        .start();

    let caps = PACKED_ARGS
        .captures(&source[start..])
        .ok_or_else(|| ScrapeError::deobfuscation("packed arguments not found"))?;

    let radix = match &caps[2] {
        "[]" => 62,
        radix => radix
            .parse()
            .map_err(|_| ScrapeError::deobfuscation(format!("invalid radix {radix}")))?,
    };
    let count = caps[3]
        .parse()
        .map_err(|_| ScrapeError::deobfuscation(format!("invalid count {}", &caps[3])))?;
    let dictionary = unescape_js(&caps[4])
        .split('|')
        .map(String::from)
        .collect();

    Ok(PackedArgs {
        payload: unescape_js(&caps[1]),
        radix,
        count,
        dictionary,
    })
}

/// Unpack the first packed invocation found in `source` and return the
/// recovered source text.
pub fn unpack(source: &str) -> Result<String> {
    let args = parse_args(source)?;
    trace!(
        radix = args.radix,
        count = args.count,
        words = args.dictionary.len(),
        "unpacking payload"
    );
    let encoder = Encoder::new(args.radix)?;
    substitute(&args.payload, &encoder, args.count, &args.dictionary)
}

/// Unpack every packed invocation in `source`, in order. Blocks that fail to
/// unpack are skipped.
pub fn unpack_all(source: &str) -> Vec<String> {
    let starts: Vec<usize> = PACKED_SIGNATURE
        .find_iter(source)
        .map(|m| m.start())
        .collect();
    starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            // Each block ends where the next one begins.
            let end = starts.get(i + 1).copied().unwrap_or(source.len());
            match unpack(&source[start..end]) {
                Ok(text) => Some(text),
                Err(e) => {
                    trace!(offset = start, error = %e, "skipping packed block");
                    None
                }
            }
        })
        .collect()
}

/// Replace every whole-word occurrence of `encode(i)` with `dictionary[i]`,
/// for `i` from `count - 1` down to `0`, skipping empty entries.
pub fn substitute(
    payload: &str,
    encoder: &Encoder,
    count: usize,
    dictionary: &[String],
) -> Result<String> {
    let mut text = payload.to_owned();
    // Indices past the dictionary have no replacement.
    for index in (0..count.min(dictionary.len())).rev() {
        let Some(word) = dictionary.get(index).filter(|word| !word.is_empty()) else {
            continue;
        };
        let token = encoder.encode(index as u64);
        if !text.contains(&token) {
            continue;
        }
        // ASCII word boundaries, as in the JavaScript `\b` the packer relies on.
        let pattern = Regex::new(&format!(r"(?-u:\b){}(?-u:\b)", regex::escape(&token)))?;
        text = pattern.replace_all(&text, NoExpand(word)).into_owned();
    }
    Ok(text)
}

/// Decode the escapes of a single-quoted JavaScript string literal body.
fn unescape_js(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('x') => push_hex_escape(&mut out, &mut chars, 2, 'x'),
            Some('u') => push_hex_escape(&mut out, &mut chars, 4, 'u'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_hex_escape(out: &mut String, chars: &mut std::str::Chars<'_>, len: usize, marker: char) {
    let digits: String = chars.clone().take(len).collect();
    let decoded = (digits.len() == len)
        .then(|| u32::from_str_radix(&digits, 16).ok())
        .flatten()
        .and_then(char::from_u32);
    match decoded {
        Some(c) => {
            out.push(c);
            for _ in 0..len {
                chars.next();
            }
        }
        None => out.push(marker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "e=function(c){return(c<a?'':e(parseInt(c/a)))+((c=c%a)>35?String.fromCharCode(c+29):c.toString(36))};if(!''.replace(/^/,String)){while(c--){d[e(c)]=k[c]||e(c)}k=[function(e){return d[e]}];e=function(){return'\\\\w+'};c=1};while(c--){if(k[c]){p=p.replace(new RegExp('\\\\b'+e(c)+'\\\\b','g'),k[c])}}return p";

    /// Minimal packer: every `\w+` word becomes the encoding of its first-seen index.
    fn pack(source: &str, radix: u32) -> String {
        let encoder = Encoder::new(radix).unwrap();
        let word_re = Regex::new(r"\b\w+\b").unwrap();
        let mut words: Vec<String> = Vec::new();
        for m in word_re.find_iter(source) {
            if !words.iter().any(|w| w == m.as_str()) {
                words.push(m.as_str().to_string());
            }
        }
        let payload = word_re.replace_all(source, |caps: &regex::Captures| {
            let index = words.iter().position(|w| w == &caps[0]).unwrap();
            encoder.encode(index as u64)
        });
        let escaped = payload.replace('\\', "\\\\").replace('\'', "\\'");
        format!(
            "eval(function(p,a,c,k,e,d){{{BODY}}}('{escaped}',{radix},{},'{}'.split('|'),0,{{}}))",
            words.len(),
            words.join("|")
        )
    }

    fn token_source(n: usize) -> String {
        (0..n)
            .map(|i| format!("t{i}=t{}('x'+t{});", (i * 7) % n, (i * 13) % n))
            .collect()
    }

    #[test]
    fn test_detect() {
        assert!(detect("eval(function(p,a,c,k,e,d){}"));
        assert!(detect("eval ( function(p, a, c, k, e, r) {}"));
        assert!(!detect("var a = b;"));
        assert!(!detect(""));
    }

    #[test]
    fn test_unpack_simple() {
        let packed = "eval(function(p,a,c,k,e,r){return p}('0 2=1',62,3,'var||a'.split('|'),0,{}))";
        assert_eq!(unpack(packed).unwrap(), "var a=1");
    }

    #[test]
    fn test_unpack_radix_twelve() {
        let packed = "eval(function(p,a,c,k,e,d){return p}('2 0=\"4 3!\";2 1=0.5(/b/6);a.9(\"8\").7=1;',12,12,'str|n|var|W3Schools|Visit|search|i|innerHTML|demo|getElementById|document|w3Schools'.split('|'),0,{}))";
        assert_eq!(
            unpack(packed).unwrap(),
            r#"var str="Visit W3Schools!";var n=str.search(/w3Schools/i);document.getElementById("demo").innerHTML=n;"#
        );
    }

    #[test]
    fn test_round_trip_with_packer_fixture() {
        for (n, radix) in [(10, 10), (50, 36), (200, 62), (90, 40)] {
            let source = token_source(n);
            let packed = pack(&source, radix);
            assert!(detect(&packed));
            assert_eq!(unpack(&packed).unwrap(), source, "radix {radix}");
        }
    }

    #[test]
    fn test_round_trip_keeps_escaped_quotes() {
        let source = "t0('it\\'s');t1=\"t2\";";
        let packed = pack(source, 36);
        assert_eq!(unpack(&packed).unwrap(), source);
    }

    #[test]
    fn test_word_boundaries_between_overlapping_tokens() {
        // `a` is index 10 and `ab` is index 631 in base 62.
        let mut dictionary = vec![String::new(); 632];
        dictionary[10] = "short".to_string();
        dictionary[631] = "long".to_string();
        let encoder = Encoder::new(62).unwrap();
        let text = substitute("a ab ba a.ab", &encoder, 632, &dictionary).unwrap();
        assert_eq!(text, "short long ba short.long");

        let packed = "eval(function(p,a,c,k,e,d){return p}('0(1,0+1)',62,2,'a|ab'.split('|'),0,{}))";
        assert_eq!(unpack(packed).unwrap(), "a(ab,a+ab)");
    }

    #[test]
    fn test_count_beyond_dictionary() {
        let encoder = Encoder::new(36).unwrap();
        let dictionary = vec!["x".to_string(), "y".to_string()];
        let text = substitute("0 1 2", &encoder, usize::MAX, &dictionary).unwrap();
        assert_eq!(text, "x y 2");

        let packed = "eval(function(p,a,c,k,e,d){return p}('0=1',36,4000000000,'a|b'.split('|'),0,{}))";
        assert_eq!(unpack(packed).unwrap(), "a=b");
    }

    #[test]
    fn test_dictionary_dollar_signs_are_literal() {
        let packed = "eval(function(p,a,c,k,e,d){return p}('0(1)',10,2,'$|$1'.split('|'),0,{}))";
        assert_eq!(unpack(packed).unwrap(), "$($1)");
    }

    #[test]
    fn test_unpack_all_skips_broken_blocks() {
        let first = pack("t0(t1);", 36);
        let second = pack("t2=t3;", 62);
        let source = format!(
            "<script>{first}</script><script>eval(function(p,a,c,k,e,d){{}}(nope))</script><script>{second}</script>"
        );
        assert_eq!(unpack_all(&source), ["t0(t1);", "t2=t3;"]);
    }

    #[test]
    fn test_missing_pieces_are_errors() {
        assert!(unpack("var a = 1;").is_err());
        assert!(unpack("eval(function(p,a,c,k,e,d){return p}(broken))").is_err());
    }

    #[test]
    fn test_unescape_js() {
        assert_eq!(unescape_js(r"a\'b\\c\x41\u0042\n"), "a'b\\cAB\n");
        assert_eq!(unescape_js(r"\xZZ"), "xZZ");
    }
}
