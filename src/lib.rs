pub mod analyze;
pub mod github;
pub mod identity;
pub mod model;
pub mod report;
pub mod telemetry;
pub mod utils;
