pub mod history;
pub mod records;
pub mod report;
pub mod scan_result;
pub mod status;

pub use history::QaHistoryEntry;
pub use records::*;
pub use report::*;
pub use scan_result::*;
pub use status::ToggleStatus;
