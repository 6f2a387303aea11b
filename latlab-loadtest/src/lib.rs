pub mod report;
pub mod series;
pub mod simulator;
