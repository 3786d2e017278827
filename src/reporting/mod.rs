pub mod catalog;
pub mod names;
pub mod writer;

pub use catalog::ReportCatalog;
pub use writer::ReportWriter;
