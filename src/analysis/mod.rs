//! Demo analysis: the parser seam and the invoker that turns parser output
//! into files.
//!
//! - [`DemoParser`] is implemented by whatever actually understands demos;
//!   [`CommandParser`] shells out to a configured analyzer.
//! - [`AnalysisInvoker`] writes tables as CSV and records as JSON, one file per
//!   category, isolating failures per category.

mod category;
mod command;
mod data;
mod invoker;
mod parser;

pub use category::{Category, UnknownCategory};
pub use command::{decode_output, AnalyzerConfig, CommandParser};
pub use data::{write_record_json, CategoryData, DemoData, Record, SerializeError, Table};
pub use invoker::{AnalysisInvoker, InvokeError, OutputFile, OutputFileSet, OutputKind};
pub use parser::{AnalysisError, DemoParser};
