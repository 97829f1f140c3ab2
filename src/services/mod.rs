pub mod classifier;
pub mod credentials;
pub mod gmail;
pub mod monitor;
pub mod rate_limit;
pub mod reload;
pub mod security;
pub mod state;
