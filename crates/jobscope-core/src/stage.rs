use std::fmt;

use url::form_urlencoded;

use crate::error::AppError;
use crate::extract::PageExtractor;
use crate::store::AggregateStore;
use crate::traits::Fetcher;

/// The two detail-page families crawled per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Salary,
    Trends,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Salary => "salary",
            StageKind::Trends => "trends",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detail-page URL template with a `{key}` placeholder.
///
/// The key is `"<region>-<name>"`, form-urlencoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    region: String,
}

impl UrlTemplate {
    pub const PLACEHOLDER: &'static str = "{key}";

    pub fn new(template: &str, region: &str) -> Result<Self, AppError> {
        if !template.contains(Self::PLACEHOLDER) {
            return Err(AppError::ConfigError(format!(
                "URL template '{template}' has no {} placeholder",
                Self::PLACEHOLDER
            )));
        }
        Ok(Self {
            template: template.to_string(),
            region: region.to_string(),
        })
    }

    pub fn render(&self, name: &str) -> String {
        let key = format!("{}-{}", self.region, name);
        let escaped: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
        self.template.replace(Self::PLACEHOLDER, &escaped)
    }
}

/// What happened when a stage ran for one entity.
#[derive(Debug)]
pub enum StageOutcome {
    /// The page was fetched and its fields were merged into the store.
    Merged {
        present: usize,
        absent: usize,
        page_name: Option<String>,
    },
    /// The page could not be fetched; the store was not touched.
    Failed(AppError),
}

impl StageOutcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, StageOutcome::Merged { .. })
    }
}

/// One fetch-and-extract unit: a URL template plus the extraction routine
/// for the page family it points at.
pub struct CrawlStage<F: Fetcher> {
    kind: StageKind,
    template: UrlTemplate,
    page: PageExtractor,
    fetcher: F,
}

impl<F: Fetcher> CrawlStage<F> {
    pub fn new(
        kind: StageKind,
        template: UrlTemplate,
        page: PageExtractor,
        fetcher: F,
    ) -> Self {
        Self {
            kind,
            template,
            page,
            fetcher,
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn url_for(&self, entity: &str) -> String {
        self.template.render(entity)
    }

    /// Fetch `entity`'s page, extract it, and merge the fields this stage
    /// owns into `store` under `entity`.
    ///
    /// On fetch failure the store is left untouched. Deadlines belong to
    /// the fetcher, see [`PoliteFetcher::with_timeout`].
    ///
    /// [`PoliteFetcher::with_timeout`]: crate::throttle::PoliteFetcher::with_timeout
    pub async fn run(&self, entity: &str, store: &AggregateStore) -> StageOutcome {
        let url = self.url_for(entity);
        tracing::debug!(stage = %self.kind, %entity, %url, "Fetching detail page");

        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => return StageOutcome::Failed(e),
        };

        let extract = self.page.extract_html(&html);
        if let Some(page_name) = &extract.page_name
            && page_name != entity
        {
            tracing::warn!(
                stage = %self.kind,
                %entity,
                %page_name,
                "Page names a different entity; merging under the requested name"
            );
        }

        let present = extract.fields.values().filter(|v| v.is_present()).count();
        let absent = extract.fields.len() - present;
        store.merge(entity, extract.fields);

        StageOutcome::Merged {
            present,
            absent,
            page_name: extract.page_name,
        }
    }
}
