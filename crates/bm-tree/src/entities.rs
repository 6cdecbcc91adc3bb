//! HTML character reference decoding.
//!
//! Markdown authors write HTML entities in inline markup that the XML reader
//! does not know about. References are decoded to Unicode before they reach
//! the tree so text nodes always hold plain characters.

use std::sync::LazyLock;

use regex::Regex;

/// Named, decimal and hexadecimal character references.
static ENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z][a-zA-Z0-9]{1,31});")
        .expect("invalid entity regex")
});

/// Decode every known character reference in `text`.
///
/// Unknown references are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    ENTITY_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

/// Decode a single reference body (the part between `&` and `;`).
pub fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        // NUL and out-of-range references map to the replacement character
        let ch = code
            .filter(|&c| c != 0)
            .and_then(char::from_u32)
            .unwrap_or('\u{fffd}');
        return Some(ch.to_string());
    }
    named_entity(name).map(String::from)
}

fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",

        "nbsp" => "\u{00a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwj" => "\u{200d}",
        "zwnj" => "\u{200c}",
        "shy" => "\u{00ad}",

        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "laquo" => "\u{00ab}",
        "raquo" => "\u{00bb}",
        "bull" => "\u{2022}",
        "hellip" => "\u{2026}",
        "middot" => "\u{00b7}",

        "rarr" => "\u{2192}",
        "larr" => "\u{2190}",
        "harr" => "\u{2194}",
        "uarr" => "\u{2191}",
        "darr" => "\u{2193}",
        "rArr" => "\u{21d2}",
        "lArr" => "\u{21d0}",
        "hArr" => "\u{21d4}",

        "le" => "\u{2264}",
        "ge" => "\u{2265}",
        "ne" => "\u{2260}",
        "asymp" => "\u{2248}",
        "infin" => "\u{221e}",
        "plusmn" => "\u{00b1}",
        "times" => "\u{00d7}",
        "divide" => "\u{00f7}",
        "minus" => "\u{2212}",
        "sum" => "\u{2211}",
        "radic" => "\u{221a}",

        "alpha" => "\u{03b1}",
        "beta" => "\u{03b2}",
        "gamma" => "\u{03b3}",
        "delta" => "\u{03b4}",
        "pi" => "\u{03c0}",
        "sigma" => "\u{03c3}",
        "lambda" => "\u{03bb}",
        "mu" => "\u{03bc}",
        "Omega" => "\u{03a9}",

        "copy" => "\u{00a9}",
        "reg" => "\u{00ae}",
        "trade" => "\u{2122}",

        "euro" => "\u{20ac}",
        "pound" => "\u{00a3}",
        "yen" => "\u{00a5}",
        "cent" => "\u{00a2}",

        "deg" => "\u{00b0}",
        "para" => "\u{00b6}",
        "sect" => "\u{00a7}",
        "dagger" => "\u{2020}",
        "Dagger" => "\u{2021}",
        "iexcl" => "\u{00a1}",
        "iquest" => "\u{00bf}",
        "frac14" => "\u{00bc}",
        "frac12" => "\u{00bd}",
        "frac34" => "\u{00be}",
        "sup1" => "\u{00b9}",
        "sup2" => "\u{00b2}",
        "sup3" => "\u{00b3}",
        "micro" => "\u{00b5}",
        "check" => "\u{2713}",

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named() {
        assert_eq!(decode_entities("a&nbsp;b&mdash;c"), "a\u{00a0}b\u{2014}c");
    }

    #[test]
    fn test_decode_xml_entities() {
        assert_eq!(decode_entities("&amp;&lt;&gt;&quot;"), "&<>\"");
    }

    #[test]
    fn test_decode_numeric() {
        assert_eq!(decode_entities("&#65;&#x42;&#X43;"), "ABC");
    }

    #[test]
    fn test_invalid_numeric_becomes_replacement() {
        assert_eq!(decode_entities("&#0;"), "\u{fffd}");
        assert_eq!(decode_entities("&#xD800;"), "\u{fffd}");
    }

    #[test]
    fn test_preserve_unknown() {
        assert_eq!(decode_entities("&bogus; & plain"), "&bogus; & plain");
    }
}
