pub mod catalog;
pub mod decision;
pub mod matching;
pub mod order;
pub mod outcome;
pub mod sheet;

pub use catalog::{
    Batch, Catalog, CatalogBuilder, CatalogEntry, EntryId, MerchantEntry, ReferenceData,
    UNLIMITED_STOCK,
};
pub use decision::{
    Candidate, DecisionKind, DecisionQuery, DecisionSet, QueryKind, ResolutionDecision,
};
pub use matching::{LineMatch, MatchKind, MatchResult, MerchantField, MerchantMatch};
pub use order::{OrderLine, OrderSheet};
pub use outcome::{
    AllocationRecord, Category, LineIssue, LineOutcome, ReasonCount, ResolutionState,
    RunSummary, SheetInfo,
};
pub use sheet::Sheet;
