//! termscope: risk analysis for terms of service and privacy policies.
//!
//! Results go to stdout (JSON by default); logs go to stderr. With
//! `--history-dir` analyses persist between runs and can be listed with
//! `history` or reprinted with `show`.

mod telemetry;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;

use termscope_core::{
    AnalysisRecord, Category, ComparisonResult, Dimension, EngineError, Fingerprint,
    RiskTolerance, SourceKind, UserProfile,
};
use termscope_runtime::history::DEFAULT_LIST_LIMIT;
use termscope_runtime::{
    AnalysisOutcome, AnalysisPipeline, CsvDirectory, EngineConfig, SourceSpec,
};

#[derive(Parser, Debug)]
#[command(
    name = "termscope",
    about = "Score the privacy and termination risk of terms-of-service documents",
    version
)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "TERMSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    format: OutputFormat,

    /// Directory that keeps analyses between runs (overrides history.path)
    #[arg(long, global = true, env = "TERMSCOPE_HISTORY_DIR")]
    history_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one document from a file or URL
    Analyze(AnalyzeArgs),
    /// Analyze a company's terms, resolved through a directory CSV
    Company(CompanyArgs),
    /// Compare two to four documents
    Compare(CompareArgs),
    /// List recent analyses, newest first
    History(HistoryArgs),
    /// Print a stored analysis by content fingerprint
    Show(ShowArgs),
    /// List the companies in a directory CSV
    Companies(CompaniesArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Plain-text document on disk
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    file: Option<PathBuf>,

    /// Web page to fetch
    #[arg(long)]
    url: Option<String>,

    #[command(flatten)]
    profile: ProfileArgs,

    /// Recompute even when the text was analyzed before
    #[arg(long)]
    force_refresh: bool,
}

#[derive(Args, Debug)]
struct CompanyArgs {
    /// Company name, matched exactly first and then partially
    name: String,

    /// Directory CSV with "Company Name" and "Terms & Conditions" columns
    #[arg(long, env = "TERMSCOPE_DIRECTORY")]
    directory: PathBuf,

    #[command(flatten)]
    profile: ProfileArgs,

    #[arg(long)]
    force_refresh: bool,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Files or http(s) URLs, two to four
    #[arg(required = true, num_args = 2..)]
    sources: Vec<String>,

    /// Restrict insights to these dimensions
    #[arg(long = "metric", value_parser = parse_dimension)]
    metrics: Vec<Dimension>,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// Records to list, 1 to 100
    #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
    limit: usize,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Full 64-character fingerprint
    #[arg(value_parser = parse_fingerprint)]
    fingerprint: Fingerprint,

    #[command(flatten)]
    profile: ProfileArgs,
}

#[derive(Args, Debug)]
struct CompaniesArgs {
    #[arg(long, env = "TERMSCOPE_DIRECTORY")]
    directory: PathBuf,
}

#[derive(Args, Debug, Default)]
struct ProfileArgs {
    /// Risk tolerance for the profile view (low, medium, high)
    #[arg(long, value_parser = parse_tolerance)]
    tolerance: Option<RiskTolerance>,

    /// Category the user cares about, repeatable (e.g. data_sharing)
    #[arg(long = "concern", value_parser = parse_category)]
    concerns: Vec<Category>,

    /// Jurisdiction code, e.g. DE or US-CA
    #[arg(long)]
    location: Option<String>,
}

impl ProfileArgs {
    fn profile(&self) -> Option<UserProfile> {
        if self.tolerance.is_none() && self.concerns.is_empty() && self.location.is_none() {
            return None;
        }
        Some(UserProfile {
            risk_tolerance: self.tolerance.unwrap_or_default(),
            data_concerns: self.concerns.iter().copied().collect::<BTreeSet<_>>(),
            location: self.location.clone(),
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

fn parse_tolerance(raw: &str) -> Result<RiskTolerance, String> {
    RiskTolerance::parse(raw).ok_or_else(|| format!("unknown risk tolerance '{raw}' (low, medium, high)"))
}

fn parse_category(raw: &str) -> Result<Category, String> {
    Category::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown category '{raw}' ({})", known.join(", "))
    })
}

fn parse_fingerprint(raw: &str) -> Result<Fingerprint, String> {
    Fingerprint::parse(raw).ok_or_else(|| format!("'{raw}' is not a 64-character hex fingerprint"))
}

fn parse_dimension(raw: &str) -> Result<Dimension, String> {
    Dimension::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = Dimension::ORDER.iter().map(|d| d.as_str()).collect();
        format!("unknown dimension '{raw}' ({})", known.join(", "))
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(err) = run(cli).await {
        match (format, err.downcast_ref::<EngineError>()) {
            (OutputFormat::Json, Some(engine_err)) => {
                println!("{}", json!({ "error": engine_err.report() }));
            }
            _ => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    telemetry::init(&config.telemetry, cli.verbose)?;
    if let Some(path) = &cli.history_dir {
        config.history.path = Some(path.clone());
    }

    if let Command::Companies(args) = &cli.command {
        let directory = CsvDirectory::from_path(&args.directory)
            .with_context(|| format!("loading company directory {}", args.directory.display()))?;
        print_companies(directory.names(), cli.format)?;
        return Ok(());
    }

    let persistent = config.history.path.is_some();
    let mut builder = AnalysisPipeline::builder().config(config);
    if let Command::Company(args) = &cli.command {
        let directory = CsvDirectory::from_path(&args.directory)
            .with_context(|| format!("loading company directory {}", args.directory.display()))?;
        tracing::info!(companies = directory.len(), "Company directory loaded");
        builder = builder.directory(Arc::new(directory));
    }
    let pipeline = builder.build()?;

    match cli.command {
        Command::Analyze(args) => {
            let (kind, source_ref) = match (&args.file, &args.url) {
                (Some(path), _) => (SourceKind::Text, path.display().to_string()),
                (None, Some(url)) => (SourceKind::Url, url.clone()),
                (None, None) => anyhow::bail!("one of --file or --url is required"),
            };
            let outcome = pipeline
                .analyze_source(kind, &source_ref, args.force_refresh)
                .await?;
            print_outcome(&pipeline, &outcome, args.profile.profile(), cli.format)?;
        }
        Command::Company(args) => {
            let outcome = pipeline.analyze_company(&args.name, args.force_refresh).await?;
            print_outcome(&pipeline, &outcome, args.profile.profile(), cli.format)?;
        }
        Command::Compare(args) => {
            let specs: Vec<SourceSpec> = args.sources.into_iter().map(SourceSpec::infer).collect();
            let metrics = (!args.metrics.is_empty()).then_some(args.metrics.as_slice());
            let result = pipeline.compare_sources(specs, metrics).await?;
            print_comparison(&result, cli.format)?;
        }
        Command::History(args) => {
            if !persistent {
                tracing::warn!("No history directory configured; nothing persists between runs");
            }
            let records = pipeline.recent(args.limit).await?;
            print_history(&records, cli.format)?;
        }
        Command::Show(args) => {
            let record = pipeline
                .get_by_fingerprint(&args.fingerprint)
                .await?
                .with_context(|| format!("no stored analysis for {}", args.fingerprint))?;
            let view = args.profile.profile().map(|p| pipeline.view(&record, &p));
            match cli.format {
                OutputFormat::Json => {
                    let body = json!({ "record": &*record, "profile_view": view });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                OutputFormat::Text => print_record(&record),
            }
        }
        Command::Companies(_) => {}
    }

    let usage = pipeline.usage();
    if usage.llm_calls > 0 {
        tracing::info!(
            llm_calls = usage.llm_calls,
            total_tokens = usage.total_tokens,
            estimated_cost = usage.estimated_cost,
            "Model usage"
        );
    }
    Ok(())
}

fn print_outcome(
    pipeline: &AnalysisPipeline,
    outcome: &AnalysisOutcome,
    profile: Option<UserProfile>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let view = profile.map(|p| pipeline.view(&outcome.record, &p));

    match format {
        OutputFormat::Json => {
            let body = json!({
                "record": &*outcome.record,
                "profile_view": view,
                "from_history": outcome.from_history,
                "elapsed_ms": outcome.elapsed_ms,
                "llm_usage": outcome.llm_usage,
                "fallback_reason": outcome.fallback_reason,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            print_record(&outcome.record);
            if let Some(view) = view {
                println!();
                println!(
                    "For your profile: {} risk ({:.1})",
                    view.risk_level, view.overall_risk
                );
                for category in &view.concerns_present {
                    println!("  concern present: {}", category.label());
                }
                for note in &view.jurisdiction_notes {
                    println!("  {}", note);
                }
            }
        }
    }
    Ok(())
}

fn print_record(record: &AnalysisRecord) {
    let scores = &record.scores;
    println!("{}", record.provenance.source_ref);
    println!(
        "Overall: {} risk ({:.1}/10){}",
        record.risk_level,
        scores.overall_risk(),
        if record.partial_signal { " [partial signal]" } else { "" }
    );
    for dimension in Dimension::ORDER.into_iter().skip(1) {
        println!(
            "  {:<17} {:>4.1}  {}",
            dimension.label(),
            scores.get(dimension),
            scores.level(dimension)
        );
    }

    println!();
    println!("{}", record.summary);
    print_list("Data collection", &record.data_collection_findings);
    print_list("Your rights", &record.user_rights_findings);
    print_list("Recommendations", &record.recommendations);
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}

fn print_history(records: &[Arc<AnalysisRecord>], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = records
                .iter()
                .map(|r| {
                    json!({
                        "content_fingerprint": r.content_fingerprint,
                        "source_ref": r.provenance.source_ref,
                        "risk_level": r.risk_level,
                        "overall_risk": r.scores.overall_risk(),
                        "generated_at": r.generated_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            for r in records {
                println!(
                    "{}  {}  {:>6} ({:.1})  {}",
                    r.content_fingerprint.short(),
                    r.generated_at.format("%Y-%m-%d %H:%M"),
                    r.risk_level.as_str(),
                    r.scores.overall_risk(),
                    r.provenance.source_ref
                );
            }
        }
    }
    Ok(())
}

fn print_companies<'a>(names: impl Iterator<Item = &'a str>, format: OutputFormat) -> anyhow::Result<()> {
    let mut names: Vec<&str> = names.collect();
    names.sort_unstable_by_key(|n| n.to_lowercase());
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Text => {
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

fn print_comparison(result: &ComparisonResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            for entry in &result.entries {
                match &entry.error {
                    Some(report) => println!("{:<30} failed: {}", entry.label, report.reason),
                    None => println!(
                        "{:<30} {:>6} risk ({:.1}/10)",
                        entry.label,
                        entry.risk_level.as_str(),
                        entry.scores.overall_risk()
                    ),
                }
            }
            if !result.insights.is_empty() {
                println!();
                for insight in &result.insights {
                    println!("- {}", insight);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze_with_profile() {
        let cli = Cli::try_parse_from([
            "termscope",
            "analyze",
            "--file",
            "terms.txt",
            "--tolerance",
            "low",
            "--concern",
            "data-sharing",
            "--concern",
            "cookies",
            "--location",
            "DE",
        ])
        .unwrap();

        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        let profile = args.profile.profile().unwrap();
        assert_eq!(profile.risk_tolerance, RiskTolerance::Low);
        assert!(profile.data_concerns.contains(&Category::DataSharing));
        assert!(profile.data_concerns.contains(&Category::Cookies));
        assert_eq!(profile.location.as_deref(), Some("DE"));
    }

    #[test]
    fn test_no_profile_flags_means_no_view() {
        let cli = Cli::try_parse_from(["termscope", "analyze", "--url", "https://example.com/tos"]).unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert!(args.profile.profile().is_none());
    }

    #[test]
    fn test_analyze_requires_a_source() {
        assert!(Cli::try_parse_from(["termscope", "analyze"]).is_err());
        assert!(Cli::try_parse_from([
            "termscope", "analyze", "--file", "a.txt", "--url", "https://example.com"
        ])
        .is_err());
    }

    #[test]
    fn test_compare_needs_two_sources() {
        assert!(Cli::try_parse_from(["termscope", "compare", "a.txt"]).is_err());
        let cli = Cli::try_parse_from([
            "termscope", "compare", "a.txt", "b.txt", "--metric", "data_risk",
        ])
        .unwrap();
        let Command::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.metrics, vec![Dimension::DataRisk]);
    }

    #[test]
    fn test_parse_history_and_show() {
        let cli = Cli::try_parse_from(["termscope", "history", "--limit", "5", "--history-dir", "/tmp/ts"]).unwrap();
        assert_eq!(cli.history_dir, Some(PathBuf::from("/tmp/ts")));
        let Command::History(args) = cli.command else {
            panic!("expected history");
        };
        assert_eq!(args.limit, 5);

        let fingerprint = Fingerprint::of("We collect your email address.");
        let cli = Cli::try_parse_from(["termscope", "show", fingerprint.as_str()]).unwrap();
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.fingerprint, fingerprint);

        assert!(Cli::try_parse_from(["termscope", "show", "abc123"]).is_err());
    }

    #[test]
    fn test_parse_companies() {
        let cli = Cli::try_parse_from(["termscope", "companies", "--directory", "companies.csv"]).unwrap();
        let Command::Companies(args) = cli.command else {
            panic!("expected companies");
        };
        assert_eq!(args.directory, PathBuf::from("companies.csv"));
    }

    #[test]
    fn test_rejects_unknown_values() {
        assert!(parse_tolerance("reckless").is_err());
        assert!(parse_category("weather").is_err());
        assert!(parse_dimension("vibes").is_err());
    }
}
