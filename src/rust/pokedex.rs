//! Scrapes the monster names listed on pokedex.org. Unrelated to classification.

use log::{error, info};
use scraper::{Html, Selector};

pub const POKEDEX_URL: &str = "https://pokedex.org/";
const NAME_SELECTOR: &str = "#monsters-list li span";

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid selector: {0}")]
    Selector(String),
}

/// Extracts the names from a pokedex page, in document order.
pub fn extract_names(html: &str) -> Result<Vec<String>, ScrapeError> {
    let selector = Selector::parse(NAME_SELECTOR).map_err(|e| ScrapeError::Selector(e.to_string()))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, reqwest::Error> {
    client.get(url).send().await?.error_for_status()?.text().await
}

/// Downloads `url` and extracts the names on it.
pub async fn fetch_names(client: &reqwest::Client, url: &str) -> Result<Vec<String>, ScrapeError> {
    let html = fetch_page(client, url).await.map_err(|e| {
        error!("crawl failed: {}", e);
        ScrapeError::from(e)
    })?;

    let names = extract_names(&html)?;
    info!("Scraped {} names from {}", names.len(), url);
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_names_in_order() -> Result<(), ScrapeError> {
        let html = r#"
            <html><body>
              <ul id="monsters-list">
                <li><span> Bulbasaur </span></li>
                <li><span>Ivysaur</span></li>
                <li><button>not a name</button></li>
                <li><span><b>Venu</b>saur</span></li>
              </ul>
              <ul id="other"><li><span>Pikachu</span></li></ul>
            </body></html>
        "#;
        assert_eq!(extract_names(html)?, vec!["Bulbasaur", "Ivysaur", "Venusaur"]);
        Ok(())
    }

    #[test]
    fn test_page_without_list_yields_nothing() -> Result<(), ScrapeError> {
        assert!(extract_names("<p>maintenance</p>")?.is_empty());
        Ok(())
    }
}
