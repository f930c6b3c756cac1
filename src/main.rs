// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use subtool::app_config::{self, Config};
use subtool::app_controller::Controller;
use subtool::file_utils::FileManager;
use subtool::transcription::RunOutcome;

/// Exit code used when the user interrupts a run
const EXIT_ABORTED: i32 = 130;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate subtitles for a video or audio file with Gemini
    Transcribe(TranscribeArgs),

    /// Split long subtitles of an existing SRT file
    Balance(BalanceArgs),

    /// Generate shell completions for subtool
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranscribeArgs {
    /// Input video or audio file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output subtitle file (default: <input stem>.srt next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Google Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum words to display per screen
    #[arg(short = 'w', long)]
    max_words_per_screen: Option<usize>,

    /// Minimum time a subtitle stays on screen, in milliseconds
    #[arg(short = 'd', long)]
    min_duration: Option<u64>,

    /// Maximum audio segment length in seconds
    #[arg(long)]
    segment_length: Option<u64>,

    /// Number of segments transcribed concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Also save the merged transcript as JSON next to the subtitle
    #[arg(long)]
    save_json: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "subtool.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct BalanceArgs {
    /// Input SRT file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output subtitle file (default: overwrite the input, keeping a .bak)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum words to display per screen
    #[arg(short = 'w', long)]
    max_words_per_screen: Option<usize>,

    /// Minimum time a subtitle stays on screen, in milliseconds
    #[arg(short = 'd', long)]
    min_duration: Option<u64>,

    /// Only report subtitles over the word budget
    #[arg(long)]
    analyze: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "subtool.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// subtool - subtitles from audio with Google Gemini
#[derive(Parser, Debug)]
#[command(name = "subtool")]
#[command(version)]
#[command(about = "AI-powered subtitle generation tool")]
#[command(long_about = "subtool extracts the audio of a video, has Gemini transcribe it and writes a balanced SRT file.

EXAMPLES:
    subtool transcribe movie.mkv                  # Writes movie.srt next to the video
    subtool transcribe -w 8 -d 1500 talk.mp3      # Shorter, longer lasting subtitles
    subtool transcribe --workers 2 movie.mkv      # Fewer concurrent requests
    subtool transcribe --save-json movie.mkv      # Also writes movie.json
    subtool balance -w 10 movie.srt               # Rebalance an existing file
    subtool balance --analyze movie.srt           # Report subtitles over the budget
    subtool completions bash > subtool.bash       # Generate bash completions

CONFIGURATION:
    Configuration is stored in subtool.json by default. If the file doesn't
    exist, a default one is created. The API key is read from GEMINI_API_KEY
    when --api-key is not given.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subtool", &mut std::io::stdout());
            Ok(())
        }
        Commands::Transcribe(args) => run_transcribe(args).await,
        Commands::Balance(args) => run_balance(args),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Load the config and apply the log level, CLI first
fn load_config(config_path: &str, log_level: Option<CliLogLevel>) -> Result<Config> {
    if let Some(level) = &log_level {
        log::set_max_level(app_config::LogLevel::from(level.clone()).to_level_filter());
    }

    let mut config = Config::load_or_create(Path::new(config_path))?;
    if let Some(level) = log_level {
        config.log_level = level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

async fn run_transcribe(args: TranscribeArgs) -> Result<()> {
    let mut config = load_config(&args.config_path, args.log_level)?;

    if let Some(api_key) = args.api_key {
        config.provider.api_key = api_key;
    }
    if let Some(model) = args.model {
        config.provider.model = model;
    }
    if let Some(max_words) = args.max_words_per_screen {
        config.balance.max_words_per_screen = max_words;
    }
    if let Some(min_duration) = args.min_duration {
        config.balance.min_duration_ms = min_duration;
    }
    if let Some(segment_length) = args.segment_length {
        config.pipeline.segment_length_secs = segment_length;
    }
    if let Some(workers) = args.workers {
        config.pipeline.concurrent_requests = workers;
    }
    if args.save_json {
        config.pipeline.save_transcript_json = true;
    }

    let controller = Controller::with_config(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    match controller.run_transcription(&args.input, args.output, &cancel).await? {
        RunOutcome::Completed(_) => Ok(()),
        RunOutcome::Aborted => {
            error!("Aborted by user");
            std::process::exit(EXIT_ABORTED);
        }
    }
}

fn run_balance(args: BalanceArgs) -> Result<()> {
    let mut config = load_config(&args.config_path, args.log_level)?;

    if let Some(max_words) = args.max_words_per_screen {
        config.balance.max_words_per_screen = max_words;
    }
    if let Some(min_duration) = args.min_duration {
        config.balance.min_duration_ms = min_duration;
    }

    let controller = Controller::with_config(config)?;

    if !FileManager::file_exists(&args.input) {
        return Err(anyhow!("Input file does not exist: {:?}", args.input));
    }

    if args.analyze {
        let report = controller.analyze_file(&args.input)?;
        info!(
            "{} subtitles, {:.1} words on average, {} at most",
            report.total_entries, report.average_words, report.max_words
        );
        if report.over_budget.is_empty() {
            info!("All subtitles fit in {} words", controller.config().balance.max_words_per_screen);
        }
        for entry in &report.over_budget {
            info!("#{}: {} words: {}", entry.seq_num, entry.word_count, entry.preview);
        }
        return Ok(());
    }

    let output = controller.balance_file(&args.input, args.output)?;
    info!("Balanced subtitle saved at {}", output.display());
    Ok(())
}
