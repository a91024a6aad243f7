//! URL helpers shared by the REST backends.

use reqwest::Url;

pub(crate) const USER_AGENT: &str = concat!("rustyvec/", env!("CARGO_PKG_VERSION"));

/// Parse `url` and strip any trailing slash from its path.
pub(crate) fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = Url::parse(url.trim()).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

pub(crate) fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
