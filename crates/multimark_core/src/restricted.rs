use url::Url;

const RESTRICTED_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "chrome-search",
    "chrome-devtools",
    "about",
    "edge",
];

const STORE_HOSTS: &[(&str, &str)] = &[
    ("chrome.google.com", "/webstore"),
    ("chromewebstore.google.com", "/"),
];

/// Pages that must never receive injection or messages.
///
/// Unparsable URLs are treated as restricted.
pub fn is_restricted_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return true;
    };
    let scheme = url.scheme();
    if RESTRICTED_SCHEMES
        .iter()
        .any(|restricted| scheme.eq_ignore_ascii_case(restricted))
    {
        return true;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    STORE_HOSTS.iter().any(|(store_host, path_prefix)| {
        host.eq_ignore_ascii_case(store_host) && url.path().starts_with(path_prefix)
    })
}
