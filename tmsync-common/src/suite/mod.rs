//! Robot Framework suite files: parsing, test lookup and in-place renaming.

pub mod discover;
pub mod model;
pub mod rewriter;

pub use discover::{collect_tests, find_suite_files, suite_title_from_path};
pub use model::{Block, SectionKind, SuiteModel, TestCaseBlock};
pub use rewriter::{AssignOutcome, SuiteFile};
