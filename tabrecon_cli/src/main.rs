use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tabrecon_common::{load_config, AppConfig, ChangeCategory, MergeOptions};
use tabrecon_core::tabular::{write_report_csvs, TableFormat};
use tabrecon_core::{
    describe_change, read_dataset, write_dataset, DiffEngine, DiffReport, DiffResult, DiffSummary,
    KeyedDataset, MergeEngine, MergeStats, TabularOptions,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabrecon")]
#[command(author = "TabRecon Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compare and merge keyed translation exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Baseline (live) export
    baseline: PathBuf,

    /// Candidate (modified) export
    candidate: PathBuf,

    /// Encoding used when an input is not UTF-8 (e.g. euc-kr, cp949, windows-1252)
    #[arg(long)]
    encoding: Option<String>,

    /// CSV field delimiter
    #[arg(long)]
    delimiter: Option<char>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the differences between two exports
    Compare {
        #[command(flatten)]
        input: InputArgs,

        /// Write an Excel report (summary sheet plus one sheet per category)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write the summary and one CSV per category into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Maximum number of changes listed in text output
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Disable ANSI colors in output
        #[arg(long)]
        no_color: bool,
    },

    /// Build a merged export ready for re-import
    Merge {
        #[command(flatten)]
        input: InputArgs,

        /// Merged output file (.csv, .tsv or .xlsx)
        #[arg(short, long)]
        output: PathBuf,

        /// Drop records that only exist in the baseline
        #[arg(long)]
        skip_baseline_only: bool,

        /// Keep records that only exist in the baseline, even if the config file skips them
        #[arg(long, conflicts_with = "skip_baseline_only")]
        include_baseline_only: bool,

        /// Do not add records that only exist in the candidate
        #[arg(long)]
        skip_candidate_only: bool,

        /// Add records that only exist in the candidate, even if the config file skips them
        #[arg(long, conflicts_with = "skip_candidate_only")]
        include_candidate_only: bool,

        /// Keep the baseline's source text for source changes
        /// (either source flag replaces the config file's source choice)
        #[arg(long)]
        source_from_baseline: bool,

        /// Take the candidate's source text for source changes
        #[arg(long)]
        source_from_candidate: bool,

        /// Keep baseline translations instead of applying translation changes
        #[arg(long)]
        skip_translation_changes: bool,

        /// Apply translation changes, even if the config file skips them
        #[arg(long, conflicts_with = "skip_translation_changes")]
        include_translation_changes: bool,

        /// Keep baseline rows where both source and translation changed
        #[arg(long)]
        skip_both_changes: bool,

        /// Apply rows where both fields changed, even if the config file skips them
        #[arg(long, conflicts_with = "skip_both_changes")]
        include_both_changes: bool,

        /// Output merge statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Initialize tracing to stderr (so JSON output can go cleanly to stdout)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare {
            input,
            report,
            report_dir,
            limit,
            json,
            no_color,
        } => run_compare(input, report, report_dir, limit, json, no_color),
        Commands::Merge {
            input,
            output,
            skip_baseline_only,
            include_baseline_only,
            skip_candidate_only,
            include_candidate_only,
            source_from_baseline,
            source_from_candidate,
            skip_translation_changes,
            include_translation_changes,
            skip_both_changes,
            include_both_changes,
            json,
        } => {
            let flags = MergeFlags {
                only_baseline: Toggle::from_flags(include_baseline_only, skip_baseline_only),
                only_candidate: Toggle::from_flags(include_candidate_only, skip_candidate_only),
                source_from_baseline,
                source_from_candidate,
                translation_changes: Toggle::from_flags(
                    include_translation_changes,
                    skip_translation_changes,
                ),
                both_changes: Toggle::from_flags(include_both_changes, skip_both_changes),
            };
            run_merge(input, output, flags, json)
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// An `--include-*` / `--skip-*` pair; `Unset` keeps the config file value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Toggle {
    #[default]
    Unset,
    Include,
    Skip,
}

impl Toggle {
    fn from_flags(include: bool, skip: bool) -> Self {
        match (include, skip) {
            (_, true) => Toggle::Skip,
            (true, false) => Toggle::Include,
            (false, false) => Toggle::Unset,
        }
    }

    fn over(self, configured: bool) -> bool {
        match self {
            Toggle::Unset => configured,
            Toggle::Include => true,
            Toggle::Skip => false,
        }
    }
}

/// Merge switches given on the command line
#[derive(Debug, Clone, Copy, Default)]
struct MergeFlags {
    only_baseline: Toggle,
    only_candidate: Toggle,
    source_from_baseline: bool,
    source_from_candidate: bool,
    translation_changes: Toggle,
    both_changes: Toggle,
}

impl MergeFlags {
    /// Layer the flags over the configured defaults. Any source flag replaces
    /// both configured source options.
    fn apply(&self, defaults: MergeOptions) -> MergeOptions {
        let (source_from_baseline, source_from_candidate) =
            if self.source_from_baseline || self.source_from_candidate {
                (self.source_from_baseline, self.source_from_candidate)
            } else {
                (defaults.source_from_baseline, defaults.source_from_candidate)
            };

        MergeOptions {
            include_only_baseline: self.only_baseline.over(defaults.include_only_baseline),
            include_only_candidate: self.only_candidate.over(defaults.include_only_candidate),
            source_from_baseline,
            source_from_candidate,
            include_translation_changes: self
                .translation_changes
                .over(defaults.include_translation_changes),
            include_both_changes: self.both_changes.over(defaults.include_both_changes),
        }
    }
}

type LoadedInputs = (AppConfig, TabularOptions, KeyedDataset, KeyedDataset);

fn load_inputs(input: &InputArgs) -> anyhow::Result<LoadedInputs> {
    for path in [&input.baseline, &input.candidate] {
        if !path.exists() {
            anyhow::bail!("Input file does not exist: {}", path.display());
        }
    }

    let mut config = load_config(false)?.config;
    if let Some(encoding) = &input.encoding {
        config.fallback_encoding = encoding.clone();
    }
    if let Some(delimiter) = input.delimiter {
        config.delimiter = delimiter;
    }
    let options = TabularOptions::from_config(&config)?;

    info!("Comparing:");
    info!("  Baseline:  {}", input.baseline.display());
    info!("  Candidate: {}", input.candidate.display());

    let baseline = read_dataset(&input.baseline, &options)
        .with_context(|| format!("Failed to load baseline {}", input.baseline.display()))?;
    let candidate = read_dataset(&input.candidate, &options)
        .with_context(|| format!("Failed to load candidate {}", input.candidate.display()))?;

    Ok((config, options, baseline, candidate))
}

fn run_compare(
    input: InputArgs,
    report_path: Option<PathBuf>,
    report_dir: Option<PathBuf>,
    limit: usize,
    json: bool,
    no_color: bool,
) -> anyhow::Result<()> {
    let (_, options, baseline, candidate) = load_inputs(&input)?;
    let diff = DiffEngine::new().compare(&baseline, &candidate);
    let report = DiffReport::build(&diff, baseline.schema(), candidate.schema());

    if let Some(path) = &report_path {
        write_report_workbook(path, &report)?;
    }
    if let Some(dir) = &report_dir {
        write_report_csvs(dir, &report, &options)?;
    }

    if json {
        let output = build_json_compare_report(&input.baseline, &input.candidate, &diff);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let use_color = !no_color && std::io::stdout().is_terminal();
    print_changes(&diff, &baseline, limit, use_color);
    print_summary(&report.summary, use_color);
    Ok(())
}

fn write_report_workbook(path: &Path, report: &DiffReport) -> anyhow::Result<()> {
    if TableFormat::detect(path) != Some(TableFormat::Excel) {
        anyhow::bail!("Report file must be an Excel workbook (.xlsx): {}", path.display());
    }
    tabrecon_core::tabular::write_report_workbook(path, report)?;
    Ok(())
}

fn run_merge(
    input: InputArgs,
    output: PathBuf,
    flags: MergeFlags,
    json: bool,
) -> anyhow::Result<()> {
    let (config, options, baseline, candidate) = load_inputs(&input)?;
    let merge_options = flags.apply(config.merge);

    let diff = DiffEngine::new().compare(&baseline, &candidate);
    let merged = MergeEngine::new()
        .merge(&baseline, &candidate, &diff, &merge_options)
        .context("Merge failed")?;

    write_dataset(&output, &merged.schema, &merged.records, &options)?;

    if merged.stats.source_changes_pending_review > 0 {
        warn!(
            "{} source changes were skipped (manual review required)",
            merged.stats.source_changes_pending_review
        );
    }

    if json {
        let report = JsonMergeReport {
            output: output.to_string_lossy().to_string(),
            records: merged.len(),
            stats: merged.stats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_merge_stats(&merged.stats, merged.len(), &output);
    Ok(())
}

#[derive(Serialize)]
struct JsonCompareReport<'a> {
    baseline: String,
    candidate: String,
    summary: DiffSummary,
    result: &'a DiffResult,
}

#[derive(Serialize)]
struct JsonMergeReport {
    output: String,
    records: usize,
    stats: MergeStats,
}

fn build_json_compare_report<'a>(
    baseline: &Path,
    candidate: &Path,
    diff: &'a DiffResult,
) -> JsonCompareReport<'a> {
    JsonCompareReport {
        baseline: baseline.to_string_lossy().to_string(),
        candidate: candidate.to_string_lossy().to_string(),
        summary: DiffSummary::from_diff(diff),
        result: diff,
    }
}

fn category_mark(category: ChangeCategory) -> (&'static str, &'static str) {
    match category {
        ChangeCategory::OnlyInBaseline => ("<<", "\x1b[33m"),     // Yellow
        ChangeCategory::OnlyInCandidate => (">>", "\x1b[34m"),    // Blue
        ChangeCategory::SourceChanged => ("S~", "\x1b[31m"),      // Red
        ChangeCategory::TranslationChanged => ("T~", "\x1b[36m"), // Cyan
        ChangeCategory::BothChanged => ("!=", "\x1b[35m"),        // Magenta
        ChangeCategory::Unchanged => ("==", "\x1b[32m"),          // Green
    }
}

fn colored(category: ChangeCategory, use_color: bool) -> String {
    let (symbol, color) = category_mark(category);
    if use_color {
        format!("{}({}){}", color, symbol, "\x1b[0m")
    } else {
        format!("({})", symbol)
    }
}

fn print_changes(diff: &DiffResult, baseline: &KeyedDataset, limit: usize, use_color: bool) {
    println!("\n{}", "=".repeat(80));
    println!("Comparison Results");
    println!("{}", "=".repeat(80));

    let mut shown = 0;
    for record in &diff.only_in_baseline {
        if shown < limit {
            println!("{} {}", colored(ChangeCategory::OnlyInBaseline, use_color), record.key());
        }
        shown += 1;
    }
    for record in &diff.only_in_candidate {
        if shown < limit {
            println!("{} {}", colored(ChangeCategory::OnlyInCandidate, use_color), record.key());
        }
        shown += 1;
    }
    for change in diff.all_changes() {
        if shown < limit {
            println!(
                "{} {}  {}",
                colored(change.category(), use_color),
                change.key,
                describe_change(change, baseline.schema())
            );
        }
        shown += 1;
    }

    if shown > limit {
        println!("... {} more (use --limit to show more)", shown - limit);
    }
}

fn print_summary(summary: &DiffSummary, use_color: bool) {
    println!("\n{}", "=".repeat(80));
    println!("Summary:");
    println!(
        "  Only in baseline:     {} {}",
        summary.only_in_baseline,
        colored(ChangeCategory::OnlyInBaseline, use_color)
    );
    println!(
        "  Only in candidate:    {} {}",
        summary.only_in_candidate,
        colored(ChangeCategory::OnlyInCandidate, use_color)
    );
    println!(
        "  Source changed:       {} {}",
        summary.source_changed,
        colored(ChangeCategory::SourceChanged, use_color)
    );
    println!(
        "  Translation changed:  {} {}",
        summary.translation_changed,
        colored(ChangeCategory::TranslationChanged, use_color)
    );
    println!(
        "  Both changed:         {} {}",
        summary.both_changed,
        colored(ChangeCategory::BothChanged, use_color)
    );
    println!(
        "  Unchanged:            {} {}",
        summary.unchanged,
        colored(ChangeCategory::Unchanged, use_color)
    );
    println!("  Total modified:       {}", summary.total_modified);
    println!("{}", "=".repeat(80));
}

fn print_merge_stats(stats: &MergeStats, total: usize, output: &Path) {
    println!("\n{}", "=".repeat(80));
    println!("Merged {} records into {}", total, output.display());
    println!("{}", "=".repeat(80));
    println!("  Kept from baseline only:   {}", stats.only_in_baseline);
    println!("  Added from candidate:      {}", stats.only_in_candidate);
    println!("  Source changes applied:    {}", stats.source_changes);
    println!("  Translation changes:       {}", stats.translation_changes);
    println!("  Both changed:              {}", stats.both_changes);
    println!("  Unchanged baseline rows:   {}", stats.kept_from_baseline);
    if stats.source_changes_pending_review > 0 {
        println!(
            "  Pending source review:     {}",
            stats.source_changes_pending_review
        );
    }
    println!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: &[[&str; 4]]) -> KeyedDataset {
        KeyedDataset::build(
            ["ID", "Name", "Source", "Translation"].iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_flags_default_keep_config() {
        let defaults = MergeOptions::default();
        assert_eq!(MergeFlags::default().apply(defaults), defaults);
    }

    #[test]
    fn test_skip_flags_turn_categories_off() {
        let flags = MergeFlags {
            only_baseline: Toggle::Skip,
            both_changes: Toggle::Skip,
            ..MergeFlags::default()
        };
        let options = flags.apply(MergeOptions::default());
        assert!(!options.include_only_baseline);
        assert!(options.include_only_candidate);
        assert!(options.include_translation_changes);
        assert!(!options.include_both_changes);
    }

    #[test]
    fn test_include_flags_override_config() {
        let defaults = MergeOptions {
            include_only_baseline: false,
            include_only_candidate: false,
            include_translation_changes: false,
            include_both_changes: false,
            ..MergeOptions::default()
        };
        let flags = MergeFlags {
            only_baseline: Toggle::Include,
            translation_changes: Toggle::Include,
            ..MergeFlags::default()
        };

        let options = flags.apply(defaults);
        assert!(options.include_only_baseline);
        assert!(!options.include_only_candidate);
        assert!(options.include_translation_changes);
        assert!(!options.include_both_changes);
    }

    #[test]
    fn test_toggle_from_flags() {
        assert_eq!(Toggle::from_flags(false, false), Toggle::Unset);
        assert_eq!(Toggle::from_flags(true, false), Toggle::Include);
        assert_eq!(Toggle::from_flags(false, true), Toggle::Skip);
        assert!(Toggle::Unset.over(true));
        assert!(!Toggle::Unset.over(false));
    }

    #[test]
    fn test_source_flag_replaces_config_choice() {
        let defaults = MergeOptions {
            source_from_baseline: true,
            ..MergeOptions::default()
        };
        let flags = MergeFlags {
            source_from_candidate: true,
            ..MergeFlags::default()
        };
        let options = flags.apply(defaults);
        assert!(!options.source_from_baseline);
        assert!(options.source_from_candidate);
        assert!(options.resolve().is_ok());

        // No source flag keeps the configured choice
        assert!(MergeFlags::default().apply(defaults).source_from_baseline);
    }

    #[test]
    fn test_both_source_flags_still_rejected() {
        let flags = MergeFlags {
            source_from_baseline: true,
            source_from_candidate: true,
            ..MergeFlags::default()
        };
        assert!(flags.apply(MergeOptions::default()).resolve().is_err());
    }

    #[test]
    fn test_cli_parses_include_flags() {
        let cli = Cli::try_parse_from([
            "tabrecon",
            "merge",
            "live.csv",
            "edit.csv",
            "-o",
            "out.csv",
            "--include-baseline-only",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Merge {
                include_baseline_only: true,
                skip_baseline_only: false,
                ..
            }
        ));

        let conflict = Cli::try_parse_from([
            "tabrecon",
            "merge",
            "live.csv",
            "edit.csv",
            "-o",
            "out.csv",
            "--include-baseline-only",
            "--skip-baseline-only",
        ]);
        assert!(conflict.is_err());
    }

    #[test]
    fn test_build_json_compare_report() {
        let baseline = dataset(&[["1", "a", "hello", "bonjour"], ["2", "b", "bye", "au revoir"]]);
        let candidate = dataset(&[["1", "a", "hello", "salut"], ["3", "c", "new", "nouveau"]]);
        let diff = DiffEngine::new().compare(&baseline, &candidate);

        let report =
            build_json_compare_report(Path::new("/live.csv"), Path::new("/edit.csv"), &diff);
        assert_eq!(report.baseline, "/live.csv");
        assert_eq!(report.summary.translation_changed, 1);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["summary"]["only_in_baseline"], 1);
        assert_eq!(value["result"]["only_in_candidate"][0][0], "3");
        assert_eq!(
            value["result"]["translation_changes"][0]["translation"]["changed"]["after"],
            "salut"
        );
        assert_eq!(
            value["result"]["translation_changes"][0]["source"]["unchanged"],
            "hello"
        );
    }

    #[test]
    fn test_colored_marks() {
        assert_eq!(colored(ChangeCategory::OnlyInBaseline, false), "(<<)");
        assert_eq!(colored(ChangeCategory::BothChanged, false), "(!=)");
        assert!(colored(ChangeCategory::Unchanged, true).starts_with("\x1b[32m"));
    }
}
