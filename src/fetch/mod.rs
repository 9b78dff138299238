mod fetcher;
mod headers;

pub use fetcher::{Fetch, HttpFetcher};
#[cfg(test)]
pub use fetcher::FetchedSubscription;
pub use headers::parse_subscription_info;
