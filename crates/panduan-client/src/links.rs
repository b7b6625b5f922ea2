use panduan_core::error::AppError;
use scraper::Html;
use url::Url;

/// Collect article links from a listing page.
///
/// Keeps every `<a href>` whose raw value starts with `prefix`, resolved
/// against `listing_url`, in page order. Repeats keep their first position;
/// links containing any of the `exclude` substrings are dropped.
pub fn discover_links(
    listing_html: &str,
    listing_url: &str,
    prefix: &str,
    exclude: &[String],
) -> Result<Vec<String>, AppError> {
    let base = Url::parse(listing_url)
        .map_err(|e| AppError::ConfigError(format!("Invalid listing URL '{listing_url}': {e}")))?;
    let document = Html::parse_document(listing_html);

    let mut links: Vec<String> = Vec::new();
    for anchor in document.root_element().descendent_elements() {
        if anchor.value().name() != "a" {
            continue;
        }
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if !href.starts_with(prefix) {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else {
            tracing::debug!(%href, "Skipping unresolvable link");
            continue;
        };
        resolved.set_fragment(None);
        let link = resolved.to_string();

        if exclude.iter().any(|pattern| link.contains(pattern.as_str())) {
            continue;
        }
        if !links.contains(&link) {
            links.push(link);
        }
    }

    tracing::info!(listing = %listing_url, found = links.len(), "Discovered article links");
    Ok(links)
}
