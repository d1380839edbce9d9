pub mod manifest;
pub mod queue_message;
pub mod stock_quote;
