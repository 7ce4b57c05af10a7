pub mod cli;
pub mod dicts;
pub mod fetch;
pub mod merge;
pub mod metrics;
pub mod options;
pub mod output;
pub mod permute;
pub mod probe;
pub mod scanner;
pub mod state;
pub mod validate;
