use once_cell::sync::Lazy;
use regex::Regex;

use crate::provider::ProviderKind;

static VERSION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/v\d+(?:alpha|beta)?\d*(?:/[a-z]+)?$").unwrap());

/// Normalises a base URL override. A trailing `#` means "use as given";
/// otherwise `/<version>` is appended unless the URL already carries one.
pub fn normalize_base_url(input: &str, version: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if trimmed.ends_with('#') {
        return trimmed.trim_end_matches('#').trim_end_matches('/').to_string();
    }

    let without_slash = trimmed.trim_end_matches('/');
    if VERSION_SUFFIX_RE.is_match(without_slash) {
        without_slash.to_string()
    } else {
        format!("{without_slash}/{version}")
    }
}

pub fn resolve_base_url(provider: ProviderKind, override_url: Option<&str>) -> String {
    match override_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => normalize_base_url(url, provider.api_version()),
        None => provider.default_base_url().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_version_when_missing() {
        assert_eq!(
            normalize_base_url("https://example.com/", "v1"),
            "https://example.com/v1"
        );
    }

    #[test]
    fn keeps_existing_version() {
        assert_eq!(
            normalize_base_url("https://example.com/v2", "v1"),
            "https://example.com/v2"
        );
        assert_eq!(
            normalize_base_url("https://api.deepinfra.com/v1/openai", "v1"),
            "https://api.deepinfra.com/v1/openai"
        );
        assert_eq!(
            normalize_base_url("https://proxy.local/v1beta", "v1beta"),
            "https://proxy.local/v1beta"
        );
    }

    #[test]
    fn hash_suffix_is_taken_verbatim() {
        assert_eq!(
            normalize_base_url("http://localhost:8080/raw#", "v1"),
            "http://localhost:8080/raw"
        );
    }

    #[test]
    fn falls_back_to_provider_default() {
        assert_eq!(
            resolve_base_url(ProviderKind::Xai, Some("  ")),
            "https://api.x.ai/v1"
        );
        assert_eq!(
            resolve_base_url(ProviderKind::Gemini, Some("http://127.0.0.1:9000")),
            "http://127.0.0.1:9000/v1beta"
        );
    }
}
