//! Root-domain extraction and cache keys.
//!
//! Every lookup in the extension is keyed by the page's root domain: the remote
//! shortcut file, the plugin registry and the storage entry. The extraction is a
//! string heuristic, not a public-suffix lookup.

use std::fmt;

/// Hostname portion of a URL: scheme, path, port and query removed.
///
/// With a `://` the host is the third `/`-separated token, otherwise the first.
/// No validation is done; garbage in, garbage out.
pub fn extract_hostname(url: &str) -> &str {
    let candidate = if url.contains("://") {
        url.split('/').nth(2).unwrap_or("")
    } else {
        url.split('/').next().unwrap_or("")
    };

    let without_port = candidate.split(':').next().unwrap_or(candidate);
    without_port.split('?').next().unwrap_or(without_port)
}

/// Country-code compound TLDs such as `co.uk` or `me.uk`: both trailing labels
/// are two characters long. Characters, not bytes, so IDN labels count too.
fn is_country_code_pair(second_level: &str, top_level: &str) -> bool {
    second_level.chars().count() == 2 && top_level.chars().count() == 2
}

/// Registrable root domain of `url`.
///
/// ```
/// use macro_shortcuts_lib::domain::root_domain;
///
/// assert_eq!(root_domain("https://www.example.com/path?x=1"), "example.com");
/// assert_eq!(root_domain("sub.example.co.uk"), "example.co.uk");
/// ```
pub fn root_domain(url: &str) -> String {
    let hostname = extract_hostname(url);
    let labels: Vec<&str> = hostname.split('.').collect();
    let len = labels.len();

    let domain = if len > 2 {
        let top_level = labels[len - 1];
        let second_level = labels[len - 2];
        if is_country_code_pair(second_level, top_level) {
            format!("{}.{second_level}.{top_level}", labels[len - 3])
        } else {
            format!("{second_level}.{top_level}")
        }
    } else {
        hostname.to_string()
    };

    match domain.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => domain,
    }
}

/// Cache and lookup key for one root domain: `<base><domain><extension>`.
///
/// The key doubles as the remote URL of the domain's shortcut file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainKey(String);

impl DomainKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds [`DomainKey`]s from a fixed base URL and file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    base_url: String,
    extension: String,
}

impl KeyScheme {
    pub fn new(base_url: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            extension: extension.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Key for the root domain of `url`.
    pub fn key_for_url(&self, url: &str) -> DomainKey {
        self.key_for_domain(&root_domain(url))
    }

    /// Key for an already extracted root domain.
    pub fn key_for_domain(&self, domain: &str) -> DomainKey {
        DomainKey(format!("{}{domain}{}", self.base_url, self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- hostname --

    #[test]
    fn hostname_strips_scheme_path_and_query() {
        assert_eq!(
            extract_hostname("https://www.example.com/path?x=1"),
            "www.example.com"
        );
    }

    #[test]
    fn hostname_strips_port() {
        assert_eq!(extract_hostname("http://localhost:8080/index"), "localhost");
    }

    #[test]
    fn hostname_without_scheme() {
        assert_eq!(extract_hostname("docs.rs/serde"), "docs.rs");
        assert_eq!(extract_hostname("example.com?q=1"), "example.com");
    }

    #[test]
    fn hostname_of_bare_scheme_is_empty() {
        assert_eq!(extract_hostname("https://"), "");
    }

    // -- root domain --

    #[test]
    fn root_domain_of_full_url() {
        assert_eq!(root_domain("https://www.example.com/path?x=1"), "example.com");
    }

    #[test]
    fn root_domain_collapses_subdomains() {
        assert_eq!(root_domain("https://mail.google.com/mail/u/0/"), "google.com");
        assert_eq!(root_domain("a.b.c.example.org"), "example.org");
    }

    #[test]
    fn root_domain_keeps_compound_country_code_tld() {
        assert_eq!(root_domain("sub.example.co.uk"), "example.co.uk");
        assert_eq!(root_domain("https://www.bbc.co.uk/news"), "bbc.co.uk");
    }

    #[test]
    fn root_domain_two_letter_tld_alone_is_not_compound() {
        assert_eq!(root_domain("mail.google.de"), "google.de");
        assert_eq!(root_domain("https://api.github.io/"), "github.io");
    }

    #[test]
    fn root_domain_counts_characters_in_unicode_labels() {
        assert_eq!(root_domain("www.shop.例子.香港"), "shop.例子.香港");
        assert_eq!(root_domain("https://mail.例子.中国/"), "mail.例子.中国");
        assert_eq!(root_domain("a.b.例子.com"), "例子.com");
    }

    #[test]
    fn root_domain_strips_leading_www() {
        assert_eq!(root_domain("www.reddit.com"), "reddit.com");
        assert_eq!(root_domain("http://www.example.com:3000"), "example.com");
    }

    #[test]
    fn root_domain_short_inputs_pass_through() {
        assert_eq!(root_domain("localhost"), "localhost");
        assert_eq!(root_domain("http://localhost:8080/"), "localhost");
        assert_eq!(root_domain("example.com"), "example.com");
        assert_eq!(root_domain(""), "");
    }

    #[test]
    fn root_domain_is_idempotent() {
        let inputs = [
            "https://www.example.com/path?x=1",
            "sub.example.co.uk",
            "https://mail.google.de",
            "www.co.uk",
            "x.www.de",
            "localhost",
            "https://docs.rs/tokio/latest",
            "",
        ];
        for input in inputs {
            let once = root_domain(input);
            assert_eq!(root_domain(&once), once, "not idempotent for {input}");
        }
    }

    // -- keys --

    #[test]
    fn domain_key_joins_base_domain_and_extension() {
        let scheme = KeyScheme::new("https://cdn.example.net/configs/", ".json");
        let key = scheme.key_for_url("https://www.github.com/rust-lang/rust");
        assert_eq!(key.as_str(), "https://cdn.example.net/configs/github.com.json");
        assert_eq!(key.to_string(), key.as_str());
    }

    #[test]
    fn urls_on_the_same_root_domain_share_a_key() {
        let scheme = KeyScheme::new("https://cdn.example.net/", ".json");
        assert_eq!(
            scheme.key_for_url("https://gist.github.com/"),
            scheme.key_for_url("https://github.com/notifications")
        );
    }
}
