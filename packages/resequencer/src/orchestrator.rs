//! Sequencing of the pipeline over one workbook and over a batch of files.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use walkdir::WalkDir;

use crate::config::{ResequenceConfig, WORKBOOK_EXTENSIONS};
use crate::error::Result;
use crate::matching::GreedyBestMatch;
use crate::plan::WorkbookPlan;
use crate::renamer::SheetRenamer;
use crate::report::{write_report, BatchReport, FileOutcome, RunStats};
use crate::rewriter::IndexRewriter;
use crate::splitter::SheetSplitter;
use crate::workbook::{read_workbook, write_workbook, SheetId, Workbook};

/// File name of the consolidated batch report.
pub const BATCH_REPORT_STEM: &str = "batch_report";

/// Compute the read-only plan for a workbook.
pub fn plan_workbook(workbook: &Workbook, config: &ResequenceConfig) -> Result<WorkbookPlan> {
    WorkbookPlan::build(workbook, config, GreedyBestMatch)
}

/// Re-sequence a workbook in memory.
///
/// The plan is computed completely before the first mutation.
pub fn process_workbook(workbook: &mut Workbook, config: &ResequenceConfig) -> Result<RunStats> {
    let sheets_before = workbook.len();
    let plan = plan_workbook(workbook, config)?;

    let split = SheetSplitter::new(config).apply(workbook, &plan)?;

    let assignments: Vec<(SheetId, String)> = plan
        .index
        .entries
        .iter()
        .filter_map(|entry| {
            let sheet = split.sheet_for_entry.get(&entry.seq)?;
            let mapping = plan.mapping_for(entry.seq)?;
            Some((*sheet, mapping.new_sheet_name.clone()))
        })
        .collect();
    let renamed = SheetRenamer::apply(workbook, &assignments)?;

    IndexRewriter::apply(workbook, &plan, &split, &renamed, sheets_before)
}

/// Output workbook and report paths for `input`.
#[must_use]
pub fn output_paths(
    input: &Path,
    output_dir: &Path,
    config: &ResequenceConfig,
) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    let workbook = output_dir.join(format!("{stem}{}.xlsx", config.output_suffix));
    let report = output_dir.join(format!(
        "{stem}_report.{}",
        config.report_format.extension()
    ));
    (workbook, report)
}

/// Files written for one processed input.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub output: PathBuf,
    pub report: PathBuf,
    pub stats: RunStats,
}

/// Read, re-sequence and write one workbook plus its report.
pub fn process_file(
    input: &Path,
    output_dir: &Path,
    config: &ResequenceConfig,
) -> Result<ProcessedFile> {
    let _span = tracing::info_span!("workbook", file = %input.display()).entered();

    let mut workbook = read_workbook(input)?;
    let stats = process_workbook(&mut workbook, config)?;

    fs::create_dir_all(output_dir)?;
    let (output, report) = output_paths(input, output_dir, config);
    write_workbook(&workbook, &output)?;
    write_report(&stats, &report, config.report_format)?;

    tracing::info!(
        output = %output.display(),
        sheets_before = stats.sheets_before,
        sheets_after = stats.sheets_after,
        warnings = stats.warnings.len(),
        "processed workbook"
    );
    Ok(ProcessedFile {
        output,
        report,
        stats,
    })
}

/// Expand directories into the workbook files they contain, sorted.
///
/// Files given explicitly are kept whatever their extension.
#[must_use]
pub fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| p.is_file() && is_workbook_file(p))
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

/// Whether the path has a workbook extension and is not an office lock file.
fn is_workbook_file(path: &Path) -> bool {
    let is_lock = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with("~$"));
    let has_extension = path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        WORKBOOK_EXTENSIONS.contains(&ext.as_str())
    });
    has_extension && !is_lock
}

/// Process `inputs` in parallel, one worker per file.
///
/// A failing file never stops the batch; `on_done` is called once per file
/// as soon as it finishes. Outcomes keep the order of `inputs`.
pub fn process_batch<F>(
    inputs: &[PathBuf],
    output_dir: &Path,
    config: &ResequenceConfig,
    on_done: F,
) -> Result<BatchReport>
where
    F: Fn(&FileOutcome) + Sync,
{
    let pool = ThreadPoolBuilder::new().num_threads(config.jobs).build()?;

    let outcomes: Vec<FileOutcome> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                let outcome = match process_file(input, output_dir, config) {
                    Ok(done) => FileOutcome::Success {
                        input: input.clone(),
                        output: done.output,
                        report: done.report,
                        stats: done.stats,
                    },
                    Err(e) => {
                        if e.is_workbook_read_error() {
                            tracing::warn!(
                                file = %input.display(),
                                error = %e,
                                "skipping unreadable workbook"
                            );
                        } else {
                            tracing::error!(
                                file = %input.display(),
                                error = %e,
                                "failed to process workbook"
                            );
                        }
                        FileOutcome::Failed {
                            input: input.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                on_done(&outcome);
                outcome
            })
            .collect()
    });

    Ok(BatchReport::new(outcomes))
}

/// Write the batch report into `output_dir`.
pub fn write_batch_report(
    report: &BatchReport,
    output_dir: &Path,
    config: &ResequenceConfig,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!(
        "{BATCH_REPORT_STEM}.{}",
        config.report_format.extension()
    ));
    write_report(report, &path, config.report_format)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportFormat;
    use crate::workbook::{CellValue, Grid};
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        )
    }

    #[test]
    fn test_output_paths() {
        let config = ResequenceConfig::default().with_report_format(ReportFormat::Yaml);
        let (workbook, report) =
            output_paths(Path::new("in/annual.xlsx"), Path::new("out"), &config);
        assert_eq!(workbook, PathBuf::from("out/annual_resequenced.xlsx"));
        assert_eq!(report, PathBuf::from("out/annual_report.yaml"));
    }

    #[test]
    fn test_process_workbook_in_memory() {
        let mut wb = Workbook::new();
        wb.add_sheet(
            "Index",
            grid(&[
                &["Section", "Table Title", "Table_ID", "Link"],
                &["S", "A", "", "→ 1"],
                &["S", "B", "", "→ 1"],
            ]),
        )
        .unwrap();
        wb.add_sheet(
            "1",
            grid(&[
                &["Table Title: A"],
                &["Source: s"],
                &["x"],
                &[""],
                &["Table Title: B"],
                &["Source: s"],
                &["y"],
            ]),
        )
        .unwrap();

        let stats = process_workbook(&mut wb, &ResequenceConfig::default()).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Index", "1", "2"]);
        assert_eq!(stats.sheets_created, 1);
        assert!(stats.warnings.is_empty());
    }

    #[test]
    fn test_collect_inputs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.xlsx", "a.XLSX", "notes.txt", "~$a.xlsx", "nested/c.xlsm"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = collect_inputs(&[dir.path().to_path_buf()]);
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.XLSX", "b.xlsx", "nested/c.xlsm"]);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.xlsx");
        let garbage = dir.path().join("garbage.xlsx");
        fs::write(&garbage, b"not a workbook").unwrap();

        let config = ResequenceConfig::default().with_jobs(2);
        let report = process_batch(
            &[missing.clone(), garbage.clone()],
            &dir.path().join("out"),
            &config,
            |_| {},
        )
        .unwrap();

        assert_eq!(report.totals.files, 2);
        assert_eq!(report.totals.failed, 2);
        assert_eq!(report.files[0].input(), missing.as_path());
        assert_eq!(report.files[1].input(), garbage.as_path());
    }
}
