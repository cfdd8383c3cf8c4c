//! Test support utilities for profile-qa.
//!
//! Provides synthetic image builders and mocks for the expression classifier
//! and the core ports.
//!
//! # Example
//!
//! ```
//! use profile_qa_test_support::{MockClassifier, SyntheticImageBuilder};
//!
//! let sharp = SyntheticImageBuilder::png(&SyntheticImageBuilder::checkerboard(300, 300));
//! let flat = SyntheticImageBuilder::mid_gray();
//! let classifier = MockClassifier::smiling();
//! # let _ = (sharp, flat, classifier);
//! ```

mod builders;
mod mocks;

pub use builders::SyntheticImageBuilder;
pub use mocks::{
    FailingClassifier, MockByteSource, MockClassifier, MockProgressSink, MockReportSink,
    PanickingClassifier, RecordedResult,
};
