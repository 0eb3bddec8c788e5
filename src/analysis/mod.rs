//! Source code analysis module for deplens.
//!
//! Scans JavaScript/TypeScript sources for the npm packages they import,
//! so declared-but-never-imported dependencies can be reported.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use deplens::analysis::scan_imports;
//!
//! let usage = scan_imports(Path::new("./web"))?;
//! for (package, files) in &usage.packages {
//!     println!("{} imported by {} file(s)", package, files.len());
//! }
//! # Ok::<(), deplens::analysis::AnalysisError>(())
//! ```

pub mod imports;

pub use imports::{
    scan_imports, AnalysisError, AnalysisResult, Import, ImportKind, ImportScanner, PackageUsage, SourceLanguage,
};
