use anyhow::Context;
use quarry::cli::output::Output;
use quarry::cli::report::ReportWriter;
use quarry::cli::{Cli, Commands, ResearchArgs};
use quarry::utils::toml_config::{ConfigError, DEFAULT_CONFIG_FILE};
use quarry::{Orchestrator, QuarryConfig};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    let config = load_config(&cli.config, output)?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Research(args) => research(args, config, output).await,
        Commands::Config { validate } => show_config(&cli.config, config, validate, output),
    }
}

/// Load the config file, falling back to defaults when the implicit
/// `quarry.toml` is absent. An explicitly named file must exist.
fn load_config(path: &Path, output: &Output) -> anyhow::Result<QuarryConfig> {
    match QuarryConfig::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) if path == Path::new(DEFAULT_CONFIG_FILE) => {
            output.info(&format!(
                "{} not found, using built-in defaults",
                DEFAULT_CONFIG_FILE
            ));
            Ok(QuarryConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("loading {}", path.display())),
    }
}

fn init_tracing(config: &QuarryConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let layer = if config.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init();
}

async fn research(args: ResearchArgs, config: QuarryConfig, output: &Output) -> anyhow::Result<()> {
    output.banner();

    let topic = args.topic()?;
    let llm = config.llm_provider()?;
    let search = config.search_provider()?;

    let mut settings = config.pipeline.settings();
    if let Some(top_k) = args.max_sources {
        settings.top_k = top_k.max(1);
    }
    let deadline = args
        .deadline_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.pipeline.deadline());

    output.header("Research");
    output.kv("Topic", topic.subject());
    output.kv("Depth", &topic.depth().to_string());
    output.kv("LLM", &format!("{} ({})", llm.name(), llm.model()));
    output.kv("Search", search.name());
    output.kv("Deadline", &format!("{}s", deadline.as_secs()));

    let orchestrator = Orchestrator::new(llm.create_client()?, search.create_client()?, settings);
    let report = orchestrator.run(topic, deadline).await?;

    output.run_summary(&report);

    let dir = args.output_dir.unwrap_or(config.output.dir);
    let files = ReportWriter::new(&dir, config.output.format)
        .with_citations(!args.no_citations)
        .write(&report, &ReportWriter::timestamp())
        .with_context(|| format!("writing reports to {}", dir.display()))?;

    output.header("Reports");
    output.created("keywords", &files.keyword_analysis.display().to_string());
    output.created("search", &files.search_analysis.display().to_string());
    output.created("recommendations", &files.recommendations.display().to_string());
    output.complete("Research complete");

    Ok(())
}

fn show_config(
    path: &Path,
    config: QuarryConfig,
    validate: bool,
    output: &Output,
) -> anyhow::Result<()> {
    output.header("Configuration");
    output.kv("File", &path.display().to_string());

    if validate {
        config.validate_env()?;
        output.success("Configuration and referenced environment variables are valid");
    }

    println!("\n{}", config.to_toml()?);
    Ok(())
}
