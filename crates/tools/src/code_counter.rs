// Line counting over a folder of source files

use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use toolhost_core::{
    ArgumentMap, ParamSpec, ParamType, Tool, ToolDescriptor, ToolError, ToolOutput, ToolResult,
};
use walkdir::WalkDir;

/// Line prefixes treated as comments when counting code lines
const COMMENT_PREFIXES: &[&str] = &["//", "#", "/*", "*", "<!--"];

const NO_EXTENSION: &str = "(none)";
const MAX_PATH_WIDTH: usize = 47;

/// Counts total, non-empty and code lines of matching files
pub struct CodeCounterTool;

/// Line counts of one file or a set of files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub total: usize,
    pub non_empty: usize,
    pub code: usize,
}

impl LineCounts {
    pub fn of(text: &str) -> Self {
        let mut counts = Self::default();
        for line in text.lines() {
            counts.total += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            counts.non_empty += 1;
            let is_comment =
                trimmed == "*/" || COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p));
            if !is_comment {
                counts.code += 1;
            }
        }
        counts
    }

    fn add(&mut self, other: &LineCounts) {
        self.total += other.total;
        self.non_empty += other.non_empty;
        self.code += other.code;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortBy {
    Name,
    Size,
    Unsorted,
}

impl SortBy {
    fn parse(value: &str) -> ToolResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "size" => Ok(Self::Size),
            "none" => Ok(Self::Unsorted),
            other => Err(ToolError::validation(
                "sort_by",
                format!("expected one of name, size, none, got {}", other),
            )),
        }
    }
}

struct CountOptions {
    folder: PathBuf,
    pattern: Regex,
    recursive: bool,
    exclude_empty: bool,
    show_details: bool,
    sort_by: SortBy,
}

impl CountOptions {
    fn from_args(args: &ArgumentMap) -> ToolResult<Self> {
        let pattern_text = args.get_str("pattern").unwrap_or(".*");
        let pattern = RegexBuilder::new(pattern_text)
            .case_insensitive(true)
            .build()
            .map_err(|e| ToolError::validation("pattern", format!("invalid regex: {}", e)))?;

        Ok(Self {
            folder: PathBuf::from(args.require_str("folder")?),
            pattern,
            recursive: args.get_bool("recursive").unwrap_or(true),
            exclude_empty: args.get_bool("exclude_empty").unwrap_or(false),
            show_details: args.get_bool("show_details").unwrap_or(true),
            sort_by: SortBy::parse(args.get_str("sort_by").unwrap_or("name"))?,
        })
    }

    /// Lines reported per file: non-empty lines when blank lines are excluded
    fn reported(&self, counts: &LineCounts) -> usize {
        if self.exclude_empty {
            counts.non_empty
        } else {
            counts.total
        }
    }
}

#[derive(Debug)]
struct FileStats {
    relative_path: String,
    extension: String,
    counts: LineCounts,
    size: u64,
}

#[derive(Debug, Default)]
struct CountReport {
    files: Vec<FileStats>,
    totals: LineCounts,
    total_size: u64,
}

impl CodeCounterTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodeCounterTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for CodeCounterTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "code_counter",
            "Count lines of code in a folder, with regex file matching and recursive scanning",
        )
        .param(ParamSpec::required("folder", ParamType::String, "Folder to scan"))
        .param(ParamSpec::optional(
            "pattern",
            ParamType::String,
            ".*",
            "Regex matched against file names, case-insensitive (e.g. \\.rs$|\\.py$)",
        ))
        .param(ParamSpec::optional("recursive", ParamType::Bool, true, "Descend into subfolders"))
        .param(ParamSpec::optional(
            "exclude_empty",
            ParamType::Bool,
            false,
            "Report non-empty lines instead of total lines",
        ))
        .param(ParamSpec::optional("show_details", ParamType::Bool, true, "Show a row per file"))
        .param(ParamSpec::optional(
            "sort_by",
            ParamType::String,
            "name",
            "File order: name, size (line count) or none",
        ))
    }

    async fn execute(&self, args: ArgumentMap) -> ToolResult<ToolOutput> {
        let args = args.conform(&self.describe().parameters)?;
        let options = CountOptions::from_args(&args)?;

        tokio::task::spawn_blocking(move || {
            let report = count(&options)?;
            Ok(ToolOutput::text(render(&options, &report)))
        })
        .await
        .map_err(|e| ToolError::execution(format!("line count aborted: {}", e)))?
    }
}

fn scan(options: &CountOptions) -> ToolResult<Vec<PathBuf>> {
    if !options.folder.exists() {
        return Err(ToolError::execution(format!(
            "folder does not exist: {}",
            options.folder.display()
        )));
    }
    if !options.folder.is_dir() {
        return Err(ToolError::execution(format!(
            "not a folder: {}",
            options.folder.display()
        )));
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let files = WalkDir::new(&options.folder)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| options.pattern.is_match(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();

    Ok(files)
}

fn count(options: &CountOptions) -> ToolResult<CountReport> {
    let mut report = CountReport::default();

    for path in scan(options)? {
        let counts = match std::fs::read(&path) {
            Ok(bytes) => LineCounts::of(&String::from_utf8_lossy(&bytes)),
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", path.display(), e);
                LineCounts::default()
            }
        };
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        report.totals.add(&counts);
        report.total_size += size;
        report.files.push(FileStats {
            relative_path: relative(&path, &options.folder),
            extension: extension(&path),
            counts,
            size,
        });
    }

    match options.sort_by {
        SortBy::Name => report.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path)),
        SortBy::Size => report
            .files
            .sort_by(|a, b| options.reported(&b.counts).cmp(&options.reported(&a.counts))),
        SortBy::Unsorted => {}
    }

    Ok(report)
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_else(|| NO_EXTENSION.to_string())
}

fn render(options: &CountOptions, report: &CountReport) -> String {
    if report.files.is_empty() {
        return format!(
            "No files matching '{}' found in '{}'",
            options.pattern.as_str(),
            options.folder.display()
        );
    }

    let folder = options
        .folder
        .canonicalize()
        .unwrap_or_else(|_| options.folder.clone());

    let mut out = String::new();
    let _ = writeln!(out, "Code Line Count Report");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Folder: {}", folder.display());
    let _ = writeln!(out, "Pattern: {}", options.pattern.as_str());
    let _ = writeln!(out, "Recursive: {}", yes_no(options.recursive));
    let _ = writeln!(out, "Exclude empty lines: {}", yes_no(options.exclude_empty));

    if options.show_details {
        let _ = writeln!(out);
        let _ = writeln!(out, "Files:");
        let _ = writeln!(out, "{}", "-".repeat(80));
        let _ = writeln!(
            out,
            "{:<50} {:<8} {:<9} {:<8} {:<10}",
            "Path", "Lines", "Non-empty", "Code", "Size"
        );
        let _ = writeln!(out, "{}", "-".repeat(80));
        for file in &report.files {
            let _ = writeln!(
                out,
                "{:<50} {:<8} {:<9} {:<8} {:<10}",
                shorten(&file.relative_path),
                options.reported(&file.counts),
                file.counts.non_empty,
                file.counts.code,
                format_size(file.size)
            );
        }
        let _ = writeln!(out, "{}", "-".repeat(80));
    }

    let file_count = report.files.len();
    let lines = options.reported(&report.totals);
    let _ = writeln!(out);
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  Files: {}", file_count);
    let _ = writeln!(out, "  Lines: {}", group_thousands(lines));
    let _ = writeln!(out, "  Non-empty lines: {}", group_thousands(report.totals.non_empty));
    let _ = writeln!(out, "  Code lines: {}", group_thousands(report.totals.code));
    let _ = writeln!(out, "  Total size: {}", format_size(report.total_size));
    let _ = write!(out, "  Average lines per file: {:.1}", lines as f64 / file_count as f64);

    let mut by_extension: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for file in &report.files {
        let entry = by_extension.entry(file.extension.as_str()).or_default();
        entry.0 += 1;
        entry.1 += options.reported(&file.counts);
    }
    if by_extension.len() > 1 {
        let _ = write!(out, "\n\nBy extension:");
        for (ext, (files, lines)) in by_extension {
            let _ = write!(out, "\n  {}: {} files, {} lines", ext, files, group_thousands(lines));
        }
    }

    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn shorten(path: &str) -> String {
    let chars: Vec<char> = path.chars().collect();
    if chars.len() > MAX_PATH_WIDTH {
        let tail: String = chars[chars.len() - (MAX_PATH_WIDTH - 3)..].iter().collect();
        format!("...{}", tail)
    } else {
        path.to_string()
    }
}

fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1}{}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1}TB", size)
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.rs"), "// entry\nfn main() {\n\n    run();\n}\n").unwrap();
        std::fs::write(dir.path().join("build.py"), "# build\nprint('x')\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/lib.rs"), "pub fn run() {}\n").unwrap();
        dir
    }

    fn args(folder: &Path) -> ArgumentMap {
        ArgumentMap::new().with("folder", folder.to_string_lossy().into_owned())
    }

    #[test]
    fn test_line_counts() {
        let counts = LineCounts::of("// c\nlet x = 1;\n\n/* a\n * b\n */\n<!-- h -->\nfoo\n");
        assert_eq!(
            counts,
            LineCounts {
                total: 8,
                non_empty: 7,
                code: 2
            }
        );
    }

    #[test]
    fn test_group_thousands_and_sizes() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(format_size(512), "512.0B");
        assert_eq!(format_size(2048), "2.0KB");
    }

    #[tokio::test]
    async fn test_counts_folder_recursively() {
        let dir = fixture();
        let output = CodeCounterTool.execute(args(dir.path())).await.unwrap().to_string();

        assert!(output.contains("Files: 3"), "{}", output);
        assert!(output.contains("Lines: 8"));
        assert!(output.contains("Code lines: 5"));
        assert!(output.contains(".rs: 2 files, 6 lines"));
        let main_at = output.find("main.rs").unwrap();
        let nested_at = output.find("nested").unwrap();
        assert!(main_at < nested_at);
    }

    #[tokio::test]
    async fn test_pattern_and_non_recursive() {
        let dir = fixture();
        let output = CodeCounterTool
            .execute(args(dir.path()).with("pattern", "\\.RS$").with("recursive", false))
            .await
            .unwrap()
            .to_string();

        assert!(output.contains("Files: 1"), "{}", output);
        assert!(!output.contains("lib.rs"));
        assert!(!output.contains("By extension"));
    }

    #[tokio::test]
    async fn test_exclude_empty_and_summary_only() {
        let dir = fixture();
        let output = CodeCounterTool
            .execute(args(dir.path()).with("exclude_empty", true).with("show_details", false))
            .await
            .unwrap()
            .to_string();

        assert!(output.contains("Lines: 7"), "{}", output);
        assert!(!output.contains("Files:\n"));
    }

    #[tokio::test]
    async fn test_no_matches() {
        let dir = fixture();
        let output = CodeCounterTool
            .execute(args(dir.path()).with("pattern", "\\.go$"))
            .await
            .unwrap()
            .to_string();
        assert!(output.starts_with("No files matching"));
    }

    #[tokio::test]
    async fn test_errors() {
        let dir = fixture();

        let err = CodeCounterTool
            .execute(args(&dir.path().join("missing")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("folder does not exist"));

        let err = CodeCounterTool
            .execute(args(dir.path()).with("pattern", "("))
            .await
            .unwrap_err();
        assert_eq!(err.parameter(), Some("pattern"));

        let err = CodeCounterTool
            .execute(args(dir.path()).with("sort_by", "age"))
            .await
            .unwrap_err();
        assert_eq!(err.parameter(), Some("sort_by"));

        let err = CodeCounterTool.execute(ArgumentMap::new()).await.unwrap_err();
        assert_eq!(err.parameter(), Some("folder"));
    }
}
