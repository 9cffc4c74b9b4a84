pub mod analytics;
pub mod batch;
pub mod channel_resolver;
pub mod classifier;
pub mod extractor;
pub mod ingestion;
pub mod pacing;
pub mod pagination;
pub mod transport;

#[cfg(test)]
pub mod testing;
