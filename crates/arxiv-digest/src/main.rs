use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use shared::{
    ArxivClient, Config, ConsoleNotifier, FilterLevel, ListingFetcher, OpenAiClient, Pipeline,
    RunOptions, WebhookClient,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arxiv-digest")]
#[command(about = "Summarize new arXiv papers with an LLM and post the digest to a webhook")]
struct Args {
    /// arXiv category to fetch new submissions for
    #[arg(default_value = shared::config::DEFAULT_CATEGORY)]
    category: String,

    /// Maximum number of papers to send in a single webhook message
    #[arg(
        long,
        alias = "max_papers_split",
        default_value_t = shared::config::DEFAULT_MAX_PAPERS_SPLIT as u32,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_papers_split: u32,

    /// Your area(s) of interest for relevance evaluation, e.g. "speech enhancement, codecs".
    /// Without it every paper is kept and no relevance is shown.
    #[arg(long, alias = "user_interest")]
    user_interest: Option<String>,

    /// Only summarize papers at or above this relevance: low (>=0), mid (>=1), high (>=2)
    #[arg(
        long,
        alias = "filter_level",
        default_value = "none",
        value_parser = ["low", "mid", "high", "none"]
    )]
    filter_level: String,

    /// Print the digest to stdout instead of posting it
    #[arg(long)]
    dry_run: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env().context("Configuration error")?;
    let filter_level: FilterLevel = args.filter_level.parse()?;

    let options = RunOptions {
        category: args.category,
        max_papers_split: args.max_papers_split as usize,
        user_interest: args.user_interest,
        filter_level,
    };

    let listing = ListingFetcher::new()?;
    let metadata = ArxivClient::new()?;
    let model = OpenAiClient::new(&config)?;
    info!(model = model.model(), language = %config.summary_language, "LLM client ready");

    let pipeline = Pipeline::new(
        &listing,
        &metadata,
        &model,
        &config.summary_language,
        options,
    );
    let today = Local::now().date_naive();

    let delivered = if args.dry_run {
        pipeline.run_and_dispatch(Some(&ConsoleNotifier), today).await?
    } else if let Some(url) = &config.webhook_url {
        let webhook = WebhookClient::new(url.as_str())?;
        pipeline.run_and_dispatch(Some(&webhook), today).await?
    } else {
        pipeline
            .run_and_dispatch::<WebhookClient>(None, today)
            .await?
    };

    info!(batches = delivered, "Done");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_logging();

    if let Err(e) = run(args).await {
        error!("An unrecoverable error occurred: {:#}", e);
        std::process::exit(1);
    }
}
