//! Test utilities: mock capabilities and HTML fixtures.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::traits::{Fetcher, RowSink};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Canned response for URLs containing a pattern.
#[derive(Debug, Clone)]
enum Route {
    Html(String),
    Status(u16),
    Stall(Duration),
}

/// Mock fetcher routing by URL substring. The first matching route wins;
/// unmatched URLs answer HTTP 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<Vec<(String, Route)>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(self, pattern: &str, route: Route) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), route));
        self
    }

    /// Serve `html` for URLs containing `pattern`.
    pub fn page(self, pattern: &str, html: impl Into<String>) -> Self {
        self.route(pattern, Route::Html(html.into()))
    }

    /// Answer with a non-success HTTP status.
    pub fn status(self, pattern: &str, status: u16) -> Self {
        self.route(pattern, Route::Status(status))
    }

    /// Sleep for `duration`, then answer with an empty page.
    pub fn stall(self, pattern: &str, duration: Duration) -> Self {
        self.route(pattern, Route::Stall(duration))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let route = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, route)| route.clone());

        match route {
            Some(Route::Html(html)) => Ok(html),
            Some(Route::Status(status)) => {
                Err(AppError::HttpError(format!("HTTP {status} for {url}")))
            }
            Some(Route::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(String::new())
            }
            None => Err(AppError::HttpError(format!("HTTP 404 for {url}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Row sink that records rows in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<Vec<String>>>>,
    /// Number of appends to accept before failing every later one.
    fail_after: Option<usize>,
    attempts: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` rows (the header included), then fail.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }
}

impl RowSink for MemorySink {
    fn append(&mut self, cells: &[String]) -> Result<(), AppError> {
        let mut attempts = self.attempts.lock().unwrap();
        *attempts += 1;
        if self.fail_after.is_some_and(|n| *attempts > n) {
            return Err(AppError::PersistError("disk full".into()));
        }
        self.rows.lock().unwrap().push(cells.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTML fixtures
// ---------------------------------------------------------------------------

/// Directory page listing `names`.
pub fn directory_html(names: &[&str]) -> String {
    let links: String = names
        .iter()
        .map(|name| format!("<a href=\"/job/{name}\">{name}</a>"))
        .collect();
    format!(
        "<html><body><div class=\"job-list-box\">\
         <div class=\"j-work-detail-list\">{links}<a href=\"#\"> </a></div>\
         </div></body></html>"
    )
}

/// Salary page for `name`.
pub fn salary_html(name: &str, avg: &str, tenure: &str, cities: &[(&str, &str)]) -> String {
    let cities: String = cities
        .iter()
        .map(|(city, money)| {
            format!(
                "<li><span class=\"areaCont\"> {city} </span>\
                 <div class=\"cfix\"><span class=\"money\">{money}</span></div></li>"
            )
        })
        .collect();
    format!(
        "<html><body>\
         <input id=\"jobKw\" value=\"{name}\">\
         <div class=\"salary-avger\"> {avg} </div>\
         <p id=\"workLen-dataInfoss\">{tenure}</p>\
         <div class=\"fl\"><ul><li><span class=\"industry-sample\">互联网</span>\
         <div class=\"cfix\"><span class=\"money\">1</span></div></li></ul></div>\
         <div class=\"fr\"><ul>{cities}</ul></div>\
         </body></html>"
    )
}

/// Trends page for `name`.
pub fn trends_html(
    name: &str,
    education: &[(&str, &str)],
    experience: &[(&str, &str)],
    cities: &[(&str, &str)],
) -> String {
    let block = |title: &str, items: &[(&str, &str)]| {
        let items: String = items
            .iter()
            .map(|(key, share)| {
                format!("<li><dfn title=\"{key}\"></dfn><em>12</em><em>{share}</em></li>")
            })
            .collect();
        format!("<div class=\"hori3p1\"><h3>{title}</h3><ul>{items}</ul></div>")
    };
    let cities: String = cities
        .iter()
        .map(|(city, share)| {
            format!(
                "<li><div class=\"barlist-title\"><a href=\"#\">{city}</a></div>\
                 <div class=\"barlist-value\"><em>{share}</em></div></li>"
            )
        })
        .collect();
    format!(
        "<html><body>\
         <input id=\"sweeper\" value=\"{name}\">\
         {}{}\
         <div class=\"modBar\"><div class=\"br\"><ol>{cities}</ol></div></div>\
         </body></html>",
        block("学历要求", education),
        block("经验要求", experience),
    )
}
