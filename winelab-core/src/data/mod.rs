//! Dataset acquisition, parsing, validation and partitioning

pub mod archive;
pub mod download;
pub mod schema;
pub mod split;
pub mod table;

pub use archive::{extract_archive, has_zip_signature, ZIP_MAGIC};
pub use download::{ensure_archive, Fetcher, HttpFetcher, IngestError};
pub use schema::{
    infer_dtypes, validate_columns, validate_dataset, StatusFile, ValidationError,
    ValidationIssue, ValidationReport, STATUS_PREFIX,
};
pub use split::{train_test_split, write_partition, SplitError};
pub use table::{CompleteRows, NumericFrame, ParseError, Table, TargetKind};
