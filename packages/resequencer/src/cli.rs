//! Command-line interface for the resequencer.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{ReportFormat, ResequenceConfig};
use crate::error::{ResequenceError, Result};
use crate::orchestrator::{collect_inputs, plan_workbook, process_batch, write_batch_report};
use crate::plan::WorkbookPlan;
use crate::report::{render_report, FileOutcome};
use crate::workbook::read_workbook;

/// Sheet Resequencer - recover one-table-per-sheet structure from extracted workbooks.
#[derive(Parser)]
#[command(name = "sheet-resequencer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log progress at info level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-sequence workbooks and write the results with their reports.
    Run {
        /// Workbook files or directories to search for workbooks
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "resequenced")]
        output: PathBuf,

        /// Worker threads (default: one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Report format
        #[arg(long, value_enum)]
        report_format: Option<ReportFormat>,

        /// Name of the index sheet (default: Index)
        #[arg(long)]
        index_sheet: Option<String>,
    },

    /// Show the plan for one workbook without changing anything.
    Inspect {
        /// Workbook file
        file: PathBuf,

        /// Print the plan as JSON or YAML instead of a summary
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,

        /// Name of the index sheet (default: Index)
        #[arg(long)]
        index_sheet: Option<String>,
    },
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            inputs,
            output,
            jobs,
            report_format,
            index_sheet,
        } => {
            let mut config = ResequenceConfig::from_env()?;
            if let Some(jobs) = jobs {
                config = config.with_jobs(jobs);
            }
            if let Some(format) = report_format {
                config = config.with_report_format(format);
            }
            if let Some(name) = index_sheet {
                config = config.with_index_sheet(name);
            }
            config.validate()?;
            run_command(&inputs, &output, &config)
        }
        Commands::Inspect {
            file,
            format,
            index_sheet,
        } => {
            let mut config = ResequenceConfig::from_env()?;
            if let Some(name) = index_sheet {
                config = config.with_index_sheet(name);
            }
            config.validate()?;
            inspect_command(&file, format, &config)
        }
    }
}

/// Execute the run command.
fn run_command(inputs: &[PathBuf], output: &Path, config: &ResequenceConfig) -> Result<()> {
    let files = collect_inputs(inputs);
    if files.is_empty() {
        return Err(ResequenceError::NoInputs);
    }

    println!(
        "{} {} workbook(s) into {}",
        style("Resequencing").bold(),
        style(files.len()).cyan(),
        style(output.display()).green()
    );
    println!();

    let pb = ProgressBar::new(files.len() as u64);
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("=> "),
    );

    let report = process_batch(&files, output, config, |outcome| {
        pb.set_message(file_label(outcome.input()));
        pb.inc(1);
    });
    pb.finish_and_clear();
    let report = report?;

    for outcome in &report.files {
        match outcome {
            FileOutcome::Success { input, stats, .. } => {
                let warnings = if stats.warnings.is_empty() {
                    String::new()
                } else {
                    format!(
                        ", {}",
                        style(format!("{} warning(s)", stats.warnings.len())).yellow()
                    )
                };
                println!(
                    "  {} {} ({} → {} sheets{warnings})",
                    style("✓").green(),
                    file_label(input),
                    stats.sheets_before,
                    stats.sheets_after
                );
            }
            FileOutcome::Failed { input, error } => {
                println!(
                    "  {} {}: {}",
                    style("✗").red(),
                    file_label(input),
                    style(error).red()
                );
            }
        }
    }

    let summary = write_batch_report(&report, output, config)?;
    let totals = &report.totals;

    println!();
    println!(
        "{} {} succeeded, {} failed, {} sheets created, {} rename conflict(s)",
        style("Done:").green().bold(),
        totals.succeeded,
        totals.failed,
        totals.sheets_created,
        totals.rename_conflicts
    );
    println!("{} {}", style("Report:").bold(), summary.display());

    if !report.files.iter().any(FileOutcome::is_success) {
        return Err(ResequenceError::AllFilesFailed(totals.failed));
    }
    Ok(())
}

/// Execute the inspect command.
fn inspect_command(
    file: &Path,
    format: Option<ReportFormat>,
    config: &ResequenceConfig,
) -> Result<()> {
    let workbook = read_workbook(file)?;
    let plan = plan_workbook(&workbook, config)?;

    match format {
        Some(format) => println!("{}", render_report(&plan, format)?),
        None => print_plan(&plan),
    }
    Ok(())
}

fn print_plan(plan: &WorkbookPlan) {
    let index = &plan.index;
    println!(
        "{} {} ({} entries, {} unresolved)",
        style("Index:").bold(),
        style(&index.sheet_name).cyan(),
        index.entries.len(),
        index.unresolved_count()
    );

    for sheet in &plan.sheets {
        println!();
        println!(
            "{} {} ({} block(s), {} entr(y/ies))",
            style("Sheet").bold(),
            style(&sheet.name).cyan(),
            sheet.blocks.len(),
            sheet.mappings.len()
        );
        for m in &sheet.mappings {
            let title = m.block.title_text().unwrap_or("-");
            println!(
                "  rows {:>9}  {:<30} → {} ({:?})",
                m.block.data.to_string(),
                title,
                style(&m.new_sheet_name).green(),
                m.kind
            );
        }
        for orphan in &sheet.orphans {
            println!(
                "  rows {:>9}  {:<30} {}",
                orphan.data.to_string(),
                orphan.title_text().unwrap_or("-"),
                style("(no entry, kept with preceding table)").yellow()
            );
        }
    }

    if !plan.warnings.is_empty() {
        println!();
        println!(
            "{} {}",
            style("Warnings:").yellow().bold(),
            plan.warnings.len()
        );
        for w in &plan.warnings {
            println!(
                "  [{}] {}{}",
                w.kind.as_str(),
                w.sheet
                    .as_deref()
                    .map(|s| format!("{s}: "))
                    .unwrap_or_default(),
                w.message
            );
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["sheet-resequencer", "run", "a.xlsx", "dir"]);

        let Commands::Run {
            inputs,
            output,
            jobs,
            report_format,
            index_sheet,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(inputs, vec![PathBuf::from("a.xlsx"), PathBuf::from("dir")]);
        assert_eq!(output, PathBuf::from("resequenced"));
        assert!(jobs.is_none());
        assert!(report_format.is_none());
        assert!(index_sheet.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_run_with_options() {
        let cli = Cli::parse_from([
            "sheet-resequencer",
            "-v",
            "run",
            "a.xlsx",
            "-o",
            "out",
            "-j",
            "4",
            "--report-format",
            "yaml",
            "--index-sheet",
            "Contents",
        ]);

        assert!(cli.verbose);
        let Commands::Run {
            output,
            jobs,
            report_format,
            index_sheet,
            ..
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(output, PathBuf::from("out"));
        assert_eq!(jobs, Some(4));
        assert_eq!(report_format, Some(ReportFormat::Yaml));
        assert_eq!(index_sheet.as_deref(), Some("Contents"));
    }

    #[test]
    fn test_cli_parse_inspect() {
        let cli = Cli::parse_from(["sheet-resequencer", "inspect", "a.xlsx", "--format", "json"]);

        let Commands::Inspect { file, format, .. } = cli.command else {
            panic!("expected inspect command");
        };
        assert_eq!(file, PathBuf::from("a.xlsx"));
        assert_eq!(format, Some(ReportFormat::Json));
    }

    #[test]
    fn test_cli_run_requires_inputs() {
        assert!(Cli::try_parse_from(["sheet-resequencer", "run"]).is_err());
    }
}
