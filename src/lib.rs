pub mod analysis;
pub mod catalog;
pub mod chart;
pub mod cli;
pub mod heuristics;
pub mod report;
pub mod util;
