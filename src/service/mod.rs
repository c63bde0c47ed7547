pub mod allocator;
pub mod categorizer;
pub mod engine;
pub mod inventory;
pub mod matcher;
pub mod normalizer;
pub mod report;
pub mod resolver;

pub use engine::{Analysis, ReconciliationEngine};
pub use inventory::InventoryIndex;
pub use report::{ReportBuilder, RunReport, Workbook};
