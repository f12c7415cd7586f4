use scraper::{Html, Selector};

use crate::error::AppError;
use crate::traits::Fetcher;

/// Names matched by `selector` in `html`, trimmed, in page order.
///
/// Empty names are dropped; duplicates are kept.
pub fn names_from_html(html: &str, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Fetch the directory page and list the entity names on it.
///
/// Returns [`AppError::EmptyResult`] when the page has no names.
pub async fn discover<F: Fetcher>(
    fetcher: &F,
    directory_url: &str,
    selector: &Selector,
) -> Result<Vec<String>, AppError> {
    tracing::info!("Fetching directory {}", directory_url);
    let html = fetcher.fetch(directory_url).await?;

    let names = names_from_html(&html, selector);
    if names.is_empty() {
        return Err(AppError::EmptyResult(format!(
            "no entity names found at {directory_url}"
        )));
    }
    tracing::info!(count = names.len(), "Discovered entities");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages;
    use crate::testutil::{MockFetcher, directory_html};

    #[test]
    fn names_keep_page_order_and_duplicates() {
        let html = directory_html(&["Sales Manager", "Engineer", "Sales Manager"]);
        let names = names_from_html(&html, &pages::directory_names().unwrap());
        assert_eq!(names, vec!["Sales Manager", "Engineer", "Sales Manager"]);
    }

    #[test]
    fn links_outside_the_list_are_ignored() {
        let html = "<div class='job-list-box'><a>Header</a>\
                    <div class='j-work-detail-list'><a> 会计 </a></div></div>\
                    <div class='j-work-detail-list'><a>Elsewhere</a></div>";
        let names = names_from_html(html, &pages::directory_names().unwrap());
        assert_eq!(names, vec!["会计"]);
    }

    #[tokio::test]
    async fn discover_returns_names() {
        let fetcher = MockFetcher::new().page("/job", directory_html(&["Engineer"]));
        let names = discover(
            &fetcher,
            "http://jobui.test/job",
            &pages::directory_names().unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(names, vec!["Engineer"]);
    }

    #[tokio::test]
    async fn discover_empty_page_is_empty_result() {
        let fetcher = MockFetcher::new().page("/job", "<html><body></body></html>");
        let err = discover(
            &fetcher,
            "http://jobui.test/job",
            &pages::directory_names().unwrap(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn discover_propagates_fetch_error() {
        let fetcher = MockFetcher::new().status("/job", 500);
        let err = discover(
            &fetcher,
            "http://jobui.test/job",
            &pages::directory_names().unwrap(),
        )
        .await
        .unwrap_err();
        assert!(err.is_fetch_error());
    }
}
