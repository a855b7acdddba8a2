// File: ./src/text.rs
// Plain-text cleanup shared by adapters and the normalizer.
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
            .expect("static regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"))
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("static regex"))
}

fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "hellip" => "\u{2026}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "eacute" => "\u{e9}",
        _ => return None,
    })
}

/// Replaces HTML character references. Unknown named entities are kept.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    entity_re()
        .replace_all(input, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body).and_then(|s| s.chars().next())
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Collapses every run of whitespace into one space and trims the ends.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converts an HTML fragment to plain text with collapsed whitespace.
pub fn strip_html(input: &str) -> String {
    let without_scripts = script_re().replace_all(input, " ");
    let without_tags = tag_re().replace_all(&without_scripts, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

/// Trims an optional string, turning blank values into `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| collapse_whitespace(&v))
        .filter(|v| !v.is_empty())
}

/// Uppercases the first character of every space separated word.
pub fn capitalize_words(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_drops_markup_and_scripts() {
        let html = "<div><p>Live <b>jazz</b>&nbsp;on the\n\n square</p><script>var x = '<p>';</script></div>";
        assert_eq!(strip_html(html), "Live jazz on the square");
    }

    #[test]
    fn test_decode_entities_numeric_and_named() {
        assert_eq!(decode_entities("Tom &amp; Jerry&#39;s &#x2014; &bogus;"), "Tom & Jerry's \u{2014} &bogus;");
    }

    #[test]
    fn test_clean_blank_is_none() {
        assert_eq!(clean(Some("   \n ".to_string())), None);
        assert_eq!(clean(Some("  a   b ".to_string())), Some("a b".to_string()));
        assert_eq!(clean(None), None);
    }

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize_words("seatgeek oxford"), "Seatgeek Oxford");
    }
}
