pub mod backends;
pub mod scenario;
