pub mod quote_source;
