//! URL, query-string and JSON helpers shared by the flows and the popup broker.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde_json::Value;

use super::types::Params;

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Characters `encodeURI` leaves untouched: the component set plus URI delimiters.
const URI_SET: &AsciiSet = &URI_COMPONENT_SET
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

/// Percent-encodes a single query component.
///
/// # Example
/// ```
/// use starberry_auth::auth_core::utilities::encode_uri_component;
/// assert_eq!(encode_uri_component("openid a b"), "openid%20a%20b");
/// ```
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT_SET).to_string()
}

/// Percent-encodes a whole URL, keeping its structural delimiters.
pub fn encode_uri(input: &str) -> String {
    utf8_percent_encode(input, URI_SET).to_string()
}

/// Decodes a percent-encoded component. Invalid UTF-8 is replaced, never rejected.
pub fn decode_uri_component(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Lenient query-string parser.
///
/// Pairs are split on `&` then `=`; both sides are unescaped. A key without `=`
/// maps to boolean `true`. A single trailing `/` is ignored.
pub fn parse_query_string(input: &str) -> Params {
    let input = input.strip_suffix('/').unwrap_or(input);
    let mut params = Params::new();
    for pair in input.split('&').filter(|pair| !pair.is_empty()) {
        let mut parts = pair.split('=');
        let key = decode_uri_component(parts.next().unwrap_or_default());
        let value = match parts.next() {
            Some(value) => Value::String(decode_uri_component(value)),
            None => Value::Bool(true),
        };
        params.insert(key, value);
    }
    params
}

/// Parses the query and fragment of a redirect and merges them; fragment keys win.
pub fn merge_redirect_params(query: &str, fragment: &str) -> Params {
    let mut params = parse_query_string(query);
    params.extend(parse_query_string(fragment));
    params
}

/// Serializes a JSON object as `key=value` pairs, both sides component-encoded.
/// Anything other than an object yields an empty string.
pub fn build_query_string(object: &Value) -> String {
    object
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(key, value)| {
                    format!(
                        "{}={}",
                        encode_uri_component(key),
                        encode_uri_component(&value_to_string(value))
                    )
                })
                .collect::<Vec<_>>()
                .join("&")
        })
        .unwrap_or_default()
}

/// Converts `snake_case`, `kebab-case` and `colon:case` names to camelCase.
/// A separator run at the very start is dropped without upper-casing.
pub fn camel_case(name: &str) -> String {
    let is_separator = |c: char| matches!(c, ':' | '-' | '_');
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        if !is_separator(chars[i]) {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && is_separator(chars[i]) {
            i += 1;
        }
        match chars.get(i) {
            Some(letter) if start == 0 => out.push(*letter),
            Some(letter) => out.extend(letter.to_uppercase()),
            None => out.extend(&chars[start..]),
        }
        i += 1;
    }
    out
}

/// Joins a base URL and a path. Absolute (`scheme://` or `//`) URLs are returned as-is.
pub fn join_url(base_url: &str, url: &str) -> String {
    if is_absolute_url(url) {
        return url.to_string();
    }
    let joined = format!("{}/{}", base_url, url);
    let mut collapsed = String::with_capacity(joined.len());
    let mut previous_slash = false;
    for c in joined.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }
    collapsed
        .replace("/?", "?")
        .replace("/#", "#")
        .replace(":/", "://")
}

fn is_absolute_url(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    match url.find("://") {
        Some(idx) => idx > 0 && url[..idx].chars().all(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}

/// String form of a JSON value: strings unquoted, everything else as JSON text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose truthiness: null, false, 0, "" are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_pairs_and_bare_keys() {
        let params = parse_query_string("code=a%20b&flag&state=S/");
        assert_eq!(params.get("code"), Some(&json!("a b")));
        assert_eq!(params.get("flag"), Some(&json!(true)));
        assert_eq!(params.get("state"), Some(&json!("S")));
    }

    #[test]
    fn fragment_wins_on_collision() {
        let params = merge_redirect_params("state=query&code=1", "state=hash&access_token=t");
        assert_eq!(params.get("state"), Some(&json!("hash")));
        assert_eq!(params.get("code"), Some(&json!("1")));
        assert_eq!(params.get("access_token"), Some(&json!("t")));
    }

    #[test]
    fn empty_segments_are_skipped() {
        assert!(parse_query_string("").is_empty());
        assert_eq!(parse_query_string("&&a=1&").len(), 1);
    }

    #[test]
    fn camel_cases_param_names() {
        assert_eq!(camel_case("response_type"), "responseType");
        assert_eq!(camel_case("redirect-uri"), "redirectUri");
        assert_eq!(camel_case("_private"), "private");
        assert_eq!(camel_case("scope"), "scope");
    }

    #[test]
    fn joins_relative_and_keeps_absolute() {
        assert_eq!(join_url("/", "/auth/login"), "/auth/login");
        assert_eq!(join_url("http://api.test", "auth/me"), "http://api.test/auth/me");
        assert_eq!(join_url("http://api.test/", "/auth/?x=1"), "http://api.test/auth?x=1");
        assert_eq!(join_url("/", "https://other.test/auth"), "https://other.test/auth");
        assert_eq!(join_url("/", "//cdn.test/x"), "//cdn.test/x");
    }

    #[test]
    fn builds_encoded_query_from_object() {
        let query = build_query_string(&json!({ "oauth_token": "a b", "n": 1 }));
        assert!(query.contains("oauth_token=a%20b"));
        assert!(query.contains("n=1"));
        assert_eq!(build_query_string(&json!(null)), "");
    }

    #[test]
    fn encode_uri_keeps_structure() {
        assert_eq!(
            encode_uri("https://app.test/a b?x=1#y"),
            "https://app.test/a%20b?x=1#y"
        );
    }
}
