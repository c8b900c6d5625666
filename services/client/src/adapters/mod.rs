pub mod clock;
pub mod http;

pub use clock::SystemClock;
pub use http::HttpModelTestAdapter;
