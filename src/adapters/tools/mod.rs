//! External-format tools. CSV export of analysis history.

pub mod csv_export;

pub use csv_export::{history_to_csv, write_history};
