mod commands;
mod console;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use migdb_config::logging::{
    default_log_file_path, ensure_log_dir, rotate_log_files, DEFAULT_MAX_LOG_FILES,
    DEFAULT_MAX_LOG_SIZE,
};
use migdb_config::{default_config_dir, load_config, load_file, Config};
use migdb_session::{launch, LaunchOptions, SessionOptions};

const USAGE: &str = "usage: migdb [-c CONFIG] [--] [PROGRAM [ARGS...]]";

/// Command-line arguments.
#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<PathBuf>,
    program: Option<String>,
    args: Vec<String>,
}

/// Parse arguments (without the executable name). `Ok(None)` means help
/// was requested.
fn parse_args<I>(args: I) -> Result<Option<CliArgs>>
where
    I: IntoIterator<Item = String>,
{
    let mut cli = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--config" => {
                let path = args.next().context("-c needs a file")?;
                cli.config = Some(PathBuf::from(path));
            }
            "--" => {
                cli.program = args.next();
                cli.args = args.collect();
                break;
            }
            flag if flag.starts_with('-') => bail!("unknown option {flag}\n{USAGE}"),
            _ => {
                cli.program = Some(arg);
                cli.args = args.collect();
                break;
            }
        }
    }
    Ok(Some(cli))
}

fn load(cli: &CliArgs) -> Result<Config> {
    if let Some(path) = &cli.config {
        return load_file(path).with_context(|| format!("loading {}", path.display()));
    }
    let Some(config_dir) = default_config_dir() else {
        return Ok(Config::default());
    };
    let project_dir = env::current_dir().ok();
    Ok(
        load_config(&config_dir, project_dir.as_deref()).unwrap_or_else(|e| {
            eprintln!("migdb: config load failed, using defaults: {e}");
            Config::default()
        }),
    )
}

fn init_logging(config: &Config) -> Result<()> {
    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(default_log_file_path);
    ensure_log_dir(&log_path).ok();
    rotate_log_files(&log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES).ok();

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(config.log.level.as_filter()))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_env_filter(env_filter)
        .init();
    Ok(())
}

fn session_options(config: &Config) -> SessionOptions {
    SessionOptions {
        command_timeout: Duration::from_millis(config.session.command_timeout_ms),
        first_token: config.session.first_token,
        auto_update_vars: config.session.auto_update_vars,
        max_container_elements: config.watch.max_container_elements,
    }
}

fn launch_options(config: &Config) -> LaunchOptions {
    LaunchOptions {
        program: config.debugger.program.clone(),
        args: config.debugger.args.clone(),
        use_tty: config.debugger.use_tty,
        session: session_options(config),
    }
}

async fn run_debugger(cli: CliArgs, config: Config) -> Result<()> {
    let options = launch_options(&config);
    let session = launch(options)
        .await
        .with_context(|| format!("failed to start {}", config.debugger.program))?;
    info!("migdb started, debugger {}", config.debugger.program);

    if let Some(program) = &cli.program {
        if let Err(e) = session.file(program, &cli.args).await {
            warn!("loading {} failed: {}", program, e);
            println!("error: loading {program}: {e}");
        }
    }

    console::run(session).await
}

fn run() -> Result<()> {
    let Some(cli) = parse_args(env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };
    let config = load(&cli)?;
    init_logging(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    runtime.block_on(run_debugger(cli, config))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("migdb: {:#}", e);
        std::process::exit(1);
    }
}
