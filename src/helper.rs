use std::{collections::BTreeMap, time::Duration};

/// Replaces every `${token}` in `value` with its entry in `properties`.
///
/// Tokens with no entry are left as literal `${token}` text.  An unterminated `${` is copied
/// through unchanged.
pub fn format_value(value: &str, properties: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = match after.find('}') {
            Some(end) => end,
            None => break,
        };

        out.push_str(&rest[..start]);
        let token = &after[..end];
        match properties.get(token) {
            Some(replacement) => out.push_str(replacement),
            None => {
                out.push_str("${");
                out.push_str(token);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Parses durations of the form `250ms`, `10s`, `5m` or `1h`.  A bare number is milliseconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or_else(|| raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().ok()?;

    match unit.trim() {
        "" | "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount * 60)),
        "h" => Some(Duration::from_secs(amount * 3600)),
        _ => None,
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{format_value, parse_bool, parse_duration};
    use std::{collections::BTreeMap, time::Duration};

    #[test]
    fn test_format_value() {
        let mut props = BTreeMap::new();
        props.insert("host".to_owned(), "web01".to_owned());
        props.insert("dc".to_owned(), "east".to_owned());

        assert_eq!(format_value("plain", &props), "plain");
        assert_eq!(format_value("${host}", &props), "web01");
        assert_eq!(format_value("${host}.${dc}-x", &props), "web01.east-x");
        assert_eq!(format_value("a${missing}b", &props), "a${missing}b");
        assert_eq!(format_value("open ${host", &props), "open ${host");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("40"), Some(Duration::from_millis(40)));
        assert_eq!(parse_duration("ten"), None);
        assert_eq!(parse_duration("5d"), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" no "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
