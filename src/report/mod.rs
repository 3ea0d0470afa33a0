pub mod csv;
pub mod flatten;
pub mod markdown;
pub mod markdown_csv;
pub mod telemetry_csv;

pub use csv::CsvTable;
pub use flatten::{build_csv, is_reported, FlattenOptions};
pub use markdown::MarkdownReport;
pub use markdown_csv::{markdown_to_csv, MarkdownCsv};
pub use telemetry_csv::build_raw_csv;
