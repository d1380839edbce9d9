pub mod chart_response;
pub mod yahoo_client;
