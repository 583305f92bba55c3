use std::{path::PathBuf, process, sync::Arc};

use audiosieve::{
    BufferSink, DiagnosticSink, DiagnosticStyle, FlacFileSink, LinkPolicy, RunOutcome,
    SieveOptions, SievePipeline, TeeSink,
};
use clap::{Parser, error::ErrorKind};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CLI_AFTER_HELP: &str = "Examples:\n  audiosieve broadcast.ts\n  audiosieve udp://239.0.0.1:1234 --json\n  audiosieve movie.mkv --output-dir tracks --verbose";

#[derive(Debug, Parser)]
#[command(
    name = "audiosieve",
    version,
    about = "Decode the audio of a media file or stream, skip the video, and transcode every audio track to FLAC",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input media path or URI.
    input: String,

    /// Print buffer diagnostics as JSON lines.
    #[arg(long)]
    json: bool,

    /// Also write each audio branch to <DIR>/branch-<N>.flac.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Log link failures instead of aborting the branch.
    #[arg(long)]
    permissive_links: bool,

    /// Leave MPEG-TS demuxer timestamps untouched.
    #[arg(long)]
    no_preserve_timestamps: bool,

    /// Deliver buffers in step with the pipeline clock.
    #[arg(long)]
    realtime: bool,

    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> SieveOptions {
        let policy = if self.permissive_links {
            LinkPolicy::Permissive
        } else {
            LinkPolicy::FailFast
        };
        SieveOptions::new()
            .with_preserve_mpegts_timestamps(!self.no_preserve_timestamps)
            .with_link_policy(policy)
            .with_realtime(self.realtime)
    }

    fn sink(&self) -> Result<Arc<dyn BufferSink>, Box<dyn std::error::Error>> {
        let style = if self.json {
            DiagnosticStyle::Json
        } else {
            DiagnosticStyle::Text
        };
        let diagnostics: Arc<dyn BufferSink> = Arc::new(DiagnosticSink::stdout(style));

        let Some(directory) = &self.output_dir else {
            return Ok(diagnostics);
        };
        let files = FlacFileSink::new(directory)?;
        Ok(Arc::new(
            TeeSink::new()
                .with_sink(diagnostics)
                .with_sink(Arc::new(files)),
        ))
    }
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = error.print();
            process::exit(code);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = SievePipeline::new(&cli.input, cli.options(), cli.sink()?)?;

    match pipeline.run()? {
        RunOutcome::Completed => println!("{}", RunOutcome::Completed),
        outcome @ RunOutcome::Failed { .. } => eprintln!("{outcome}"),
        RunOutcome::Interrupted => {
            eprintln!("{} {}", "warning:".yellow().bold(), "interrupted".yellow());
        }
    }

    let stats = pipeline.stats();
    log::debug!(
        "{} chain(s), {} discarded pad(s), {} buffer(s), {} finished branch(es)",
        stats.transcode_chains(),
        stats.discard_sinks(),
        stats.buffers(),
        stats.finished_branches()
    );

    if let Err(error) = pipeline.shutdown() {
        eprintln!("{} {error}", "warning:".yellow().bold());
    }
    Ok(())
}

fn main() {
    let cli = parse_cli();
    init_logging(cli.verbose);

    if let Err(error) = run(&cli) {
        eprintln!("{} {error}", "error:".red().bold());
        process::exit(1);
    }
}
