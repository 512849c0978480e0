//! Quality scorers over project fact sheets.
//!
//! Each scorer has a filesystem entry point (`score_*`, which collects the enclosing
//! project) and a pure `*_of` function over already-collected [`ProjectFacts`], so the
//! health aggregator can share one extraction pass between scorers.

pub mod complexity;
pub mod docs;
pub mod file_size;
pub mod similarity;

pub use complexity::{ComplexityOptions, ComplexityResult, score_complexity};
pub use docs::{DocsResult, score_docs};
pub use file_size::{FileSizeResult, score_file_sizes};
pub use similarity::{SimilarityOptions, SimilarityResult, score_similarity};
