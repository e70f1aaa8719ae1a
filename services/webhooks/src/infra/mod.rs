pub mod db;
pub mod processor;
pub mod rate_limit;
pub mod signature;
