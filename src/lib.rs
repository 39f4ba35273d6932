pub mod cli;
pub mod collector;
pub mod company;
pub mod config;
pub mod evidence;
pub mod export;
pub mod fetcher;
pub mod labeled_field;
pub mod logger;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod rate_limit;
pub mod seed;

pub use company::{Company, Evidence, EvidenceStatus, Origin, RawCompany};
pub use config::AppConfig;
pub use pipeline::{run_pipeline, Interrupted, RunInput};
