pub mod http;
pub mod offline;

pub use http::HttpPracticeApi;
pub use offline::OfflinePracticeApi;
