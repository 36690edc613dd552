//! URL helpers for building provider endpoints and logging them safely

use url::Url;

/// Query parameters whose values never reach the logs
const SENSITIVE_PARAMS: &[&str] = &["api_key", "apikey", "token", "access_token", "password"];

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Append `path` to `base` with exactly one slash between them.
    ///
    /// Unlike [`Url::join`] this never replaces the last segment of the base,
    /// so `https://host/gw` + `search` stays under `/gw`.
    ///
    /// ```rust
    /// use stream_resolver::utils::url::UrlUtils;
    ///
    /// assert_eq!(UrlUtils::endpoint("https://host/gw/", "/search"), "https://host/gw/search");
    /// ```
    pub fn endpoint(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim().trim_end_matches('/'),
            path.trim().trim_start_matches('/')
        )
    }

    /// Render `url` with its query pairs, percent-encoded
    pub fn with_query(url: &str, query: &[(String, String)]) -> String {
        if query.is_empty() {
            return url.to_string();
        }
        match Url::parse_with_params(url, query.iter().map(|(k, v)| (k.as_str(), v.as_str()))) {
            Ok(parsed) => parsed.to_string(),
            Err(_) => url.to_string(),
        }
    }

    /// Mask credentials in a URL before it is logged.
    ///
    /// ```rust
    /// use stream_resolver::utils::url::UrlUtils;
    ///
    /// let masked = UrlUtils::obfuscate_credentials("https://api.example/find?api_key=secret&q=1");
    /// assert_eq!(masked, "https://api.example/find?api_key=****&q=1");
    /// ```
    pub fn obfuscate_credentials(url: &str) -> String {
        use regex::Regex;

        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url)
            && (!parsed.username().is_empty() || parsed.password().is_some())
        {
            let mut new_url = parsed.clone();
            let _ = new_url.set_username("****");
            let _ = new_url.set_password(Some("****"));
            obfuscated = new_url.to_string();
        }

        for param in SENSITIVE_PARAMS {
            let pattern = format!(r"(?i)([?&]{}=)[^&]*", regex::escape(param));
            if let Ok(re) = Regex::new(&pattern) {
                obfuscated = re.replace_all(&obfuscated, "${1}****").to_string();
            }
        }

        obfuscated
    }
}
