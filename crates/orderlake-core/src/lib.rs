pub mod bronze;
pub mod config;
pub mod dates;
pub mod error;
pub mod export;
pub mod gold;
pub mod legacy;
pub mod pipeline;
pub mod report;
pub mod silver;
pub mod status;
pub mod store;
