mod aggregate;
mod client;
mod integrate;
mod record;

pub use aggregate::{aggregate, Aggregates, TelemetryAggregate};
pub use client::{TelemetrySource, UsageClient};
pub use integrate::{enrich, integrate, TelemetryOutcome, TelemetrySettings};
pub use record::*;
