pub mod fetcher;
pub mod sink;

pub use fetcher::ReqwestFetcher;
pub use sink::CsvSink;
