pub mod audit;
pub mod events;
pub mod executor;
pub mod intake;
pub mod rate_limit;
pub mod retry;
