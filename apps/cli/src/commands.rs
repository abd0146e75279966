//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use pagegraph_core::{
    DocumentDiff, Pipeline, PipelineResult, ProgressReporter, diff_documents, parse_documents,
    parse_graph, parse_pages, parse_records,
};
use pagegraph_documents::DocumentBuilder;
use pagegraph_extract::{DisclosureMap, parse_html_page};
use pagegraph_graph::{Graph, Normalizer};
use pagegraph_shared::{AppConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PageGraph — turn scraped product pages into a knowledge graph and
/// embedding-ready documents.
#[derive(Parser)]
#[command(
    name = "pagegraph",
    version,
    about = "Turn scraped page trees into a deduplicated knowledge graph and embedding documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.pagegraph/pagegraph.toml).
    #[arg(long, global = true, env = "PAGEGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract semantic records from raw page trees (JSON Lines out).
    Extract {
        /// Page input: JSON object, array, or JSON Lines.
        #[arg(short, long)]
        input: PathBuf,

        /// Disclosure map: `{id: text}` JSON.
        #[arg(short, long)]
        disclosures: Option<PathBuf>,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Fold semantic records into a graph.
    Normalize {
        /// Records written by `extract`.
        #[arg(short, long)]
        input: PathBuf,

        /// Previously written graph to merge into.
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Output file for the graph (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write the merge report (conflicts, fallbacks) here.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Build embedding documents from a graph (JSON Lines out).
    Documents {
        /// Graph written by `normalize` or `run`.
        #[arg(short, long)]
        graph: PathBuf,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run extraction, normalization and document building in one go.
    Run {
        /// Page input: JSON object, array, or JSON Lines.
        #[arg(short, long)]
        input: PathBuf,

        /// Disclosure map: `{id: text}` JSON.
        #[arg(short, long)]
        disclosures: Option<PathBuf>,

        /// Previously written graph to merge into.
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Previously written documents; prints what changed.
        #[arg(long)]
        previous_documents: Option<PathBuf>,

        /// Output directory.
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
    },

    /// Compare two document sets by id and content hash.
    Diff {
        /// Older documents (JSON Lines).
        old: PathBuf,
        /// Newer documents (JSON Lines).
        new: PathBuf,
    },

    /// Convert an HTML file into the raw page JSON shape.
    IngestHtml {
        /// HTML file to read.
        file: PathBuf,

        /// URL the HTML was fetched from.
        #[arg(short, long)]
        url: String,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so JSON output
/// on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pagegraph=info",
        1 => "pagegraph=debug",
        _ => "pagegraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Extract {
            input,
            disclosures,
            out,
        } => cmd_extract(
            &resolve_config(config_path.as_deref())?,
            &input,
            disclosures.as_deref(),
            out.as_deref(),
        ),
        Command::Normalize {
            input,
            prior,
            out,
            report,
        } => cmd_normalize(
            &resolve_config(config_path.as_deref())?,
            &input,
            prior.as_deref(),
            out.as_deref(),
            report.as_deref(),
        ),
        Command::Documents { graph, out } => {
            cmd_documents(&resolve_config(config_path.as_deref())?, &graph, out.as_deref())
        }
        Command::Run {
            input,
            disclosures,
            prior,
            previous_documents,
            out_dir,
        } => cmd_run(
            &resolve_config(config_path.as_deref())?,
            &input,
            disclosures.as_deref(),
            prior.as_deref(),
            previous_documents.as_deref(),
            &out_dir,
        ),
        Command::Diff { old, new } => cmd_diff(&old, &new),
        Command::IngestHtml { file, url, out } => cmd_ingest_html(
            &resolve_config(config_path.as_deref())?,
            &file,
            &url,
            out.as_deref(),
        ),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read '{}'", path.display()))
}

fn read_disclosures(path: Option<&Path>) -> Result<DisclosureMap> {
    match path {
        Some(p) => Ok(DisclosureMap::from_json(&read_file(p)?)?),
        None => Ok(DisclosureMap::new()),
    }
}

fn read_prior(path: Option<&Path>) -> Result<Option<Graph>> {
    match path {
        Some(p) => Ok(Some(parse_graph(&read_file(p)?)?)),
        None => Ok(None),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("failed to create '{}'", parent.display()))?;
            }
            let file = std::fs::File::create(p)
                .wrap_err_with(|| format!("failed to create '{}'", p.display()))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let mut out = open_output(path)?;
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn write_json_lines<T: Serialize>(path: Option<&Path>, items: &[T]) -> Result<()> {
    let mut out = open_output(path)?;
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_extract(
    config: &AppConfig,
    input: &Path,
    disclosures: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let pages = parse_pages(&read_file(input)?)?;
    let disclosures = read_disclosures(disclosures)?;
    info!(pages = pages.len(), disclosures = disclosures.len(), "extracting");

    let pipeline = Pipeline::new(config)?;
    let reporter = CliProgress::new();
    let records = pipeline.extract(&pages, &disclosures, &reporter)?;
    reporter.finish();

    write_json_lines(out, &records)
}

fn cmd_normalize(
    config: &AppConfig,
    input: &Path,
    prior: Option<&Path>,
    out: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let records = parse_records(&read_file(input)?)?;
    let prior = read_prior(prior)?;
    info!(records = records.len(), prior = prior.is_some(), "normalizing");

    let normalizer = Normalizer::new(config.normalize.clone())?;
    let (graph, report) = normalizer.normalize(&records, prior);

    write_json(out, &graph)?;
    if let Some(path) = report_path {
        write_json(Some(path), &report)?;
    }
    if !report.conflicts.is_empty() {
        eprintln!("  {} price conflict(s) resolved, see the merge report", report.conflicts.len());
    }
    Ok(())
}

fn cmd_documents(config: &AppConfig, graph: &Path, out: Option<&Path>) -> Result<()> {
    let graph = parse_graph(&read_file(graph)?)?;
    let builder = DocumentBuilder::new(config.documents.clone())?;
    let documents = builder.build(&graph);
    write_json_lines(out, &documents)
}

fn cmd_run(
    config: &AppConfig,
    input: &Path,
    disclosures: Option<&Path>,
    prior: Option<&Path>,
    previous_documents: Option<&Path>,
    out_dir: &Path,
) -> Result<()> {
    let pages = parse_pages(&read_file(input)?)?;
    if pages.is_empty() {
        return Err(eyre!("no pages found in '{}'", input.display()));
    }
    let disclosures = read_disclosures(disclosures)?;
    let prior = read_prior(prior)?;
    let previous = match previous_documents {
        Some(p) => Some(parse_documents(&read_file(p)?)?),
        None => None,
    };

    info!(
        pages = pages.len(),
        out_dir = %out_dir.display(),
        "running pipeline"
    );

    let pipeline = Pipeline::new(config)?;
    let reporter = CliProgress::new();
    let result = pipeline.run(&pages, &disclosures, prior, &reporter)?;

    write_json_lines(Some(&out_dir.join("records.jsonl")), &result.records)?;
    write_json(Some(&out_dir.join("graph.json")), &result.graph)?;
    write_json(Some(&out_dir.join("report.json")), &result.report)?;
    write_json_lines(Some(&out_dir.join("documents.jsonl")), &result.documents)?;

    let diff = previous.map(|old| diff_documents(&old, &result.documents));
    if let Some(diff) = &diff {
        write_json(Some(&out_dir.join("diff.json")), diff)?;
    }

    print_summary(&result, out_dir, diff.as_ref());
    Ok(())
}

fn cmd_diff(old: &Path, new: &Path) -> Result<()> {
    let old = parse_documents(&read_file(old)?)?;
    let new = parse_documents(&read_file(new)?)?;
    let diff = diff_documents(&old, &new);
    write_json(None, &diff)
}

fn cmd_ingest_html(config: &AppConfig, file: &Path, url: &str, out: Option<&Path>) -> Result<()> {
    let html = read_file(file)?;
    let page = parse_html_page(&html, url, &config.extract.html)?;
    info!(
        url,
        navbar = page.navbar.len(),
        main = page.main_body_content.len(),
        footer = page.footer.len(),
        "converted html"
    );
    write_json(out, &page)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(result: &PipelineResult, out_dir: &Path, diff: Option<&DocumentDiff>) {
    let graph = &result.graph;
    eprintln!();
    eprintln!("  Pipeline complete");
    eprintln!("  Pages:       {}", result.records.len());
    eprintln!("  Models:      {}", graph.models.len());
    eprintln!("  Sections:    {}", graph.sections.len());
    eprintln!("  Prices:      {}", graph.prices.len());
    eprintln!("  Disclosures: {}", graph.disclosures.len());
    eprintln!("  Conflicts:   {}", result.report.conflicts.len());
    eprintln!("  Documents:   {}", result.documents.len());
    if let Some(diff) = diff {
        eprintln!(
            "  Changes:     +{} ~{} -{} ({} unchanged)",
            diff.added.len(),
            diff.changed.len(),
            diff.removed.len(),
            diff.unchanged.len()
        );
    }
    eprintln!("  Output:      {}", out_dir.display());
    eprintln!("  Time:        {:.1}s", result.elapsed.as_secs_f64());
    eprintln!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar over pages.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn page_extracted(&self, url: &str, current: usize, total: usize) {
        self.bar.set_message(format!("Extracting [{current}/{total}] {url}"));
    }

    fn done(&self, _result: &PipelineResult) {
        self.finish();
    }
}
