pub mod cli;
pub mod report;
pub mod utils;
