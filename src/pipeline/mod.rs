pub mod manifest_writer;
pub mod queue_drainer;
pub mod quote_fetcher;
pub mod quote_persister;
