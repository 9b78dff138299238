use reqwest::header::HeaderMap;

use crate::models::{SubscriptionInfo, DEFAULT_EXPIRE_SECS};

/// `upload=..; download=..; total=..; expire=..`
pub const SUBSCRIPTION_USERINFO: &str = "subscription-userinfo";
pub const PROFILE_WEB_PAGE_URL: &str = "profile-web-page-url";

/// Extracts usage, quota, expiry and website from a subscription response.
///
/// Missing or unparseable fields keep their defaults: no traffic used, a quota
/// of 1 byte (never 0) and an expiry 30 days after `now`. Unknown keys are
/// ignored. Upload and download are summed into a single used-traffic figure.
pub fn parse_subscription_info(headers: &HeaderMap, now: i64) -> SubscriptionInfo {
    let mut used_traffic: i64 = 0;
    let mut total_traffic: i64 = 1;
    let mut expire_time = now + DEFAULT_EXPIRE_SECS;

    if let Some(userinfo) = header_str(headers, SUBSCRIPTION_USERINFO) {
        for token in userinfo.split(';') {
            let mut parts = token.splitn(2, '=');
            let key = parts.next().unwrap_or("").trim();
            let value = parts.next().unwrap_or("").trim();

            match key.to_ascii_lowercase().as_str() {
                "upload" | "download" => {
                    used_traffic = used_traffic.saturating_add(parse_int(value).unwrap_or(0).max(0));
                }
                "total" => {
                    total_traffic = parse_int(value).filter(|total| *total > 0).unwrap_or(1);
                }
                "expire" => {
                    if let Some(expire) = parse_int(value).filter(|expire| *expire != 0) {
                        expire_time = expire;
                    }
                }
                _ => {}
            }
        }
    }

    let official_website = header_str(headers, PROFILE_WEB_PAGE_URL)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    SubscriptionInfo {
        used_traffic,
        total_traffic,
        expire_time,
        official_website,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Parses the leading integer of `value`, so `1073741824.0` reads as
/// `1073741824`. Returns `None` when there are no leading digits.
fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let digits_end = value
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..digits_end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    const NOW: i64 = 1_700_000_000;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn parses_full_userinfo() {
        let info = parse_subscription_info(
            &headers(&[(
                "subscription-userinfo",
                "upload=100; download=50; total=1000; expire=1999999999",
            )]),
            NOW,
        );
        assert_eq!(info.used_traffic, 150);
        assert_eq!(info.total_traffic, 1000);
        assert_eq!(info.expire_time, 1_999_999_999);
        assert_eq!(info.official_website, None);
    }

    #[test]
    fn absent_header_keeps_defaults() {
        let info = parse_subscription_info(&HeaderMap::new(), NOW);
        assert_eq!(info.used_traffic, 0);
        assert_eq!(info.total_traffic, 1);
        assert_eq!(info.expire_time, NOW + DEFAULT_EXPIRE_SECS);
        assert_eq!(info.official_website, None);
    }

    #[test]
    fn malformed_or_zero_total_falls_back_to_one() {
        for raw in ["total=abc", "total=0", "total=", "total", "total=-5"] {
            let map = headers(&[("subscription-userinfo", raw)]);
            assert_eq!(parse_subscription_info(&map, NOW).total_traffic, 1, "{raw}");
        }
    }

    #[test]
    fn malformed_expire_keeps_default() {
        let map = headers(&[("subscription-userinfo", "upload=1; expire=never")]);
        let info = parse_subscription_info(&map, NOW);
        assert_eq!(info.expire_time, NOW + DEFAULT_EXPIRE_SECS);
        assert_eq!(info.used_traffic, 1);
    }

    #[test]
    fn tolerates_spacing_unknown_keys_and_missing_fields() {
        let map = headers(&[(
            "subscription-userinfo",
            " upload = 7 ;download=oops; plan=gold;; total = 2048.0 ",
        )]);
        let info = parse_subscription_info(&map, NOW);
        assert_eq!(info.used_traffic, 7);
        assert_eq!(info.total_traffic, 2048);
        assert_eq!(info.expire_time, NOW + DEFAULT_EXPIRE_SECS);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_bytes(b"Subscription-Userinfo").unwrap(),
            HeaderValue::from_static("upload=1; download=2; total=3"),
        );
        map.insert(
            HeaderName::from_bytes(b"Profile-Web-Page-Url").unwrap(),
            HeaderValue::from_static("https://a.example"),
        );
        let info = parse_subscription_info(&map, NOW);
        assert_eq!(info.used_traffic, 3);
        assert_eq!(info.total_traffic, 3);
        assert_eq!(info.official_website.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn blank_website_means_no_new_value() {
        let map = headers(&[("profile-web-page-url", "   ")]);
        assert_eq!(parse_subscription_info(&map, NOW).official_website, None);
    }

    #[test]
    fn parse_int_reads_leading_digits() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("42abc"), Some(42));
        assert_eq!(parse_int("-3"), Some(-3));
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int(""), None);
    }
}
