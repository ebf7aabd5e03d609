//! File exports built from the read model
//!
//! - [`excel`]: two-sheet incident history workbook
//! - [`report`]: static HTML dashboard report

pub mod excel;
pub mod report;

pub use excel::{export_workbook, EXCEL_PREFIX};
pub use report::{ReportData, TemplateEngine, REPORT_PREFIX};
