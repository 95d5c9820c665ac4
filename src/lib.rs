pub mod config;
pub mod dates;
pub mod error;
pub mod event_docs;
pub mod executor;
pub mod feed_fetch;
pub mod html;
pub mod http_client;
pub mod logging;
pub mod match_fetch;
pub mod normalize;
pub mod odds_normalize;
pub mod partition;
pub mod primary_fetch;
pub mod queued_sink;
pub mod ratings_fetch;
pub mod reconcile;
pub mod records;
pub mod secondary_fetch;
pub mod sink;
pub mod stats_normalize;
pub mod store;
pub mod tabular_sink;
