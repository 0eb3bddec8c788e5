//! Import scanning for JavaScript/TypeScript sources using tree-sitter.
//!
//! Collects the npm package names a source tree actually imports, through
//! ES module `import`/`export ... from`, CommonJS `require()` and dynamic
//! `import()`. The result feeds unused-declaration detection.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Tree};
use walkdir::WalkDir;

use crate::diagnostics::Warning;

/// Errors that can occur during import analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse file: {path}")]
    ParseError { path: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Tree-sitter language initialization failed")]
    LanguageInit,
}

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// How a module was pulled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import ... from 'module'` or `import 'module'`
    Static,
    /// `export ... from 'module'`
    ReExport,
    /// `require('module')`
    Require,
    /// `import('module')`
    Dynamic,
}

/// A single module reference found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// The module specifier as written (`react`, `./utils`, `@scope/pkg/sub`)
    pub source: String,
    pub kind: ImportKind,
    /// Line number in the source file (1-indexed)
    pub line: usize,
}

impl Import {
    /// The npm package a specifier refers to, or `None` for relative paths,
    /// absolute paths, URLs and `node:` builtins.
    ///
    /// ```
    /// use deplens::analysis::{Import, ImportKind};
    ///
    /// let import = Import { source: "@babel/core/lib/parse".into(), kind: ImportKind::Static, line: 1 };
    /// assert_eq!(import.package_name(), Some("@babel/core"));
    /// ```
    pub fn package_name(&self) -> Option<&str> {
        let source = self.source.as_str();
        if source.is_empty()
            || source.starts_with(['.', '/', '#'])
            || source.starts_with("node:")
            || source.contains("://")
        {
            return None;
        }

        let mut segments = source.splitn(3, '/');
        let first = segments.next()?;
        if first.starts_with('@') {
            let second = segments.next().filter(|s| !s.is_empty())?;
            Some(&source[..first.len() + 1 + second.len()])
        } else {
            Some(first)
        }
    }
}

/// Source language, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    JavaScript,
    TypeScript,
    Tsx,
}

impl SourceLanguage {
    /// Determine language from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Some(SourceLanguage::JavaScript),
            "ts" | "mts" | "cts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            _ => None,
        }
    }

    fn grammar(&self) -> Language {
        match self {
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Extracts imports from JavaScript/TypeScript sources.
///
/// Holds one parser per grammar; reuse it across files.
pub struct ImportScanner {
    js: Parser,
    ts: Parser,
    tsx: Parser,
}

fn parser_for(language: SourceLanguage) -> AnalysisResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|_| AnalysisError::LanguageInit)?;
    Ok(parser)
}

impl ImportScanner {
    pub fn new() -> AnalysisResult<Self> {
        Ok(Self {
            js: parser_for(SourceLanguage::JavaScript)?,
            ts: parser_for(SourceLanguage::TypeScript)?,
            tsx: parser_for(SourceLanguage::Tsx)?,
        })
    }

    /// Reads and scans one file.
    pub fn scan_file(&mut self, path: &Path) -> AnalysisResult<Vec<Import>> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let language =
            SourceLanguage::from_extension(ext).ok_or_else(|| AnalysisError::UnsupportedFileType(ext.to_string()))?;
        let content = fs::read_to_string(path)?;
        self.scan_source(&content, language, path)
    }

    /// Scans source text; `path` is only used in errors.
    pub fn scan_source(&mut self, source: &str, language: SourceLanguage, path: &Path) -> AnalysisResult<Vec<Import>> {
        let parser = match language {
            SourceLanguage::JavaScript => &mut self.js,
            SourceLanguage::TypeScript => &mut self.ts,
            SourceLanguage::Tsx => &mut self.tsx,
        };
        let tree = parser.parse(source, None).ok_or_else(|| AnalysisError::ParseError {
            path: path.display().to_string(),
        })?;
        Ok(collect_imports(&tree, source))
    }
}

/// Walks the syntax tree with a cursor (no recursion).
fn collect_imports(tree: &Tree, source: &str) -> Vec<Import> {
    let mut imports = Vec::new();
    let mut cursor = tree.walk();

    loop {
        let node = cursor.node();
        let found = match node.kind() {
            "import_statement" => module_of(&node, source).map(|m| (m, ImportKind::Static)),
            "export_statement" => module_of(&node, source).map(|m| (m, ImportKind::ReExport)),
            "call_expression" => call_import(&node, source),
            _ => None,
        };
        if let Some((module, kind)) = found {
            imports.push(Import {
                source: module,
                kind,
                line: node.start_position().row + 1,
            });
        }

        if cursor.goto_first_child() || cursor.goto_next_sibling() {
            continue;
        }
        loop {
            if !cursor.goto_parent() {
                return imports;
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

/// The `source` string of an import or re-export statement.
fn module_of(node: &Node, source: &str) -> Option<String> {
    node.child_by_field_name("source")
        .and_then(|s| string_value(&s, source))
}

/// `require('x')` and `import('x')` with a literal argument.
fn call_import(node: &Node, source: &str) -> Option<(String, ImportKind)> {
    let function = node.child_by_field_name("function")?;
    let kind = match source.get(function.byte_range())? {
        "require" => ImportKind::Require,
        "import" => ImportKind::Dynamic,
        _ => return None,
    };
    let arguments = node.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let first = arguments.named_children(&mut cursor).next()?;
    if first.kind() != "string" {
        return None;
    }
    string_value(&first, source).map(|m| (m, kind))
}

/// Text of a string literal without its quotes.
fn string_value(node: &Node, source: &str) -> Option<String> {
    let text = source.get(node.byte_range())?;
    let trimmed = text
        .trim_start_matches(['"', '\'', '`'])
        .trim_end_matches(['"', '\'', '`']);
    Some(trimmed.to_string())
}

/// Check if a directory should be ignored during traversal.
fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    matches!(
        name.as_ref(),
        "node_modules" | ".git" | "dist" | "build" | ".next" | "coverage" | ".turbo" | "target"
    )
}

/// Packages imported anywhere under a directory.
#[derive(Debug, Default)]
pub struct PackageUsage {
    /// Package name → files importing it
    pub packages: BTreeMap<String, BTreeSet<PathBuf>>,
    /// Number of source files scanned
    pub files_scanned: usize,
    /// Files that could not be scanned
    pub failures: Vec<(PathBuf, String)>,
}

impl PackageUsage {
    pub fn add_file(&mut self, path: &Path, imports: &[Import]) {
        self.files_scanned += 1;
        for import in imports {
            if let Some(name) = import.package_name() {
                self.packages
                    .entry(name.to_string())
                    .or_default()
                    .insert(path.to_path_buf());
            }
        }
    }

    /// Names of every imported package.
    pub fn names(&self) -> HashSet<String> {
        self.packages.keys().cloned().collect()
    }

    /// Scan failures as warnings.
    pub fn failure_warnings(&self) -> Vec<Warning> {
        self.failures
            .iter()
            .map(|(path, message)| Warning::Parse {
                path: path.clone(),
                message: message.clone(),
            })
            .collect()
    }
}

/// Scans every JavaScript/TypeScript file under `root`.
///
/// Unreadable or unparseable files are recorded in
/// [`PackageUsage::failures`] and do not stop the scan.
pub fn scan_imports(root: &Path) -> AnalysisResult<PackageUsage> {
    let mut scanner = ImportScanner::new()?;
    let mut usage = PackageUsage::default();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if SourceLanguage::from_extension(ext).is_none() {
            continue;
        }
        match scanner.scan_file(path) {
            Ok(imports) => usage.add_file(path, &imports),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to scan imports");
                usage.failures.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    tracing::debug!(
        files = usage.files_scanned,
        packages = usage.packages.len(),
        "scanned imports"
    );
    Ok(usage)
}
