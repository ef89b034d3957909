#[cfg(all(target_env = "musl", target_arch = "x86_64"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context as _, Error};
use camino::Utf8PathBuf as PathBuf;
use clap::builder::{PossibleValuesParser, TypedValueParser as _};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use wincrt_fetch::util::ProgressTarget;
use wincrt_fetch::{Architecture, Channel, ProgressSink, Variant};

const ARCHES: &[&str] = &["x86", "x86_64", "aarch", "aarch64", "all"];
const VARIANTS: &[&str] = &["desktop", "onecore", "store", "all"];
const CHANNELS: &[&str] = &["stable", "pre", "release", "insiders"];

fn setup_logger(json: bool, log_level: LevelFilter) -> Result<(), Error> {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();

    // A user-specified log level only pertains to this crate; RUST_LOG
    // still controls everything else.
    env_filter = env_filter.add_directive(format!("wincrt_fetch={log_level}").parse()?);

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(subscriber.json().finish())
            .context("failed to set default subscriber")?;
    } else {
        tracing::subscriber::set_global_default(subscriber.finish())
            .context("failed to set default subscriber")?;
    }

    Ok(())
}

/// `ProgressSink` backed by `indicatif`, one bar per in-flight download,
/// mirroring `xwin::main`'s `MultiProgress::with_draw_target(...)` setup.
struct IndicatifProgress {
    multi: indicatif::MultiProgress,
    style: indicatif::ProgressStyle,
}

impl IndicatifProgress {
    fn new(target: ProgressTarget) -> Self {
        Self {
            multi: indicatif::MultiProgress::with_draw_target(target.into()),
            style: indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix:.bold} [{elapsed}] {wide_bar:.green} {bytes}/{total_bytes} {msg}")
                .expect("static progress template is valid")
                .progress_chars("█▇▆▅▄▃▂▁  "),
        }
    }
}

impl ProgressSink for IndicatifProgress {
    fn stage(&self, name: &str) {
        tracing::info!(stage = name, "pipeline stage");
    }

    fn payload_count(&self, count: usize) {
        tracing::info!(count, "payloads selected");
    }

    fn download_bar(&self, filename: &str, total_bytes: u64) -> Box<dyn FnMut(u64) + Send> {
        let bar = self.multi.add(
            indicatif::ProgressBar::new(total_bytes)
                .with_prefix(filename.to_string())
                .with_style(self.style.clone()),
        );

        Box::new(move |delta| bar.inc(delta))
    }
}

#[derive(Parser)]
#[command(name = "wincrt", version, about = "Acquires the MSVC CRT, ATL, and Windows SDK without the Visual Studio Installer")]
struct Args {
    /// The log level to use for the wincrt-fetch crate specifically.
    #[arg(short = 'L', long, default_value = "info")]
    level: LevelFilter,
    /// Output log messages as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Downloads, extracts, and reduces the selected CRT/ATL/SDK packages.
    Download(DownloadArgs),
    /// Deletes the cache directory and everything under it.
    CleanCache {
        /// Cache directory to delete. Defaults to the platform-standard location.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Parser)]
struct DownloadArgs {
    /// Accepts the Microsoft EULA without an interactive prompt.
    #[arg(long, env = "PYXWIN_ACCEPT_LICENSE")]
    accept_license: bool,
    /// Uses a local channel manifest file instead of downloading one.
    #[arg(long)]
    manifest_path: Option<PathBuf>,
    /// Root of all downloaded/extracted/reduced artifacts.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// The VS manifest major version to retrieve.
    #[arg(long, default_value_t = 18)]
    manifest_version: u32,
    /// The distribution channel to use.
    #[arg(
        long,
        value_parser = PossibleValuesParser::new(CHANNELS).map(|s| s.parse::<Channel>().unwrap()),
        default_value = "stable",
    )]
    channel: Channel,
    /// Target architecture(s).
    #[arg(
        short, long,
        value_parser = PossibleValuesParser::new(ARCHES).map(|s| s.parse::<Architecture>().unwrap()),
        value_delimiter = ',',
        default_values_t = vec![Architecture::X86_64],
    )]
    arch: Vec<Architecture>,
    /// Windows variant(s) to include.
    #[arg(
        short, long,
        value_parser = PossibleValuesParser::new(VARIANTS).map(|s| s.parse::<Variant>().unwrap()),
        value_delimiter = ',',
        default_values_t = vec![Variant::Desktop],
    )]
    variant: Vec<Variant>,
    /// Pins the CRT version instead of using the latest available.
    #[arg(long)]
    crt_version: Option<String>,
    /// Pins the SDK version instead of using the latest available.
    #[arg(long)]
    sdk_version: Option<String>,
    /// Also downloads the Active Template Library (ATL) headers and libs.
    #[arg(long)]
    include_atl: bool,
    /// Also downloads Spectre-hardened variants of the CRT/ATL libs.
    #[arg(long)]
    include_spectre: bool,
    /// An HTTPS proxy to use for all requests.
    #[arg(long, env = "HTTPS_PROXY")]
    https_proxy: Option<String>,
    /// Timeout for a single request.
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    timeout: Duration,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    let unit = &s[digits.len()..];
    let n: u64 = digits.parse().map_err(|_| format!("invalid duration '{s}'"))?;
    match unit {
        "s" | "" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        other => Err(format!("unknown duration unit '{other}'")),
    }
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    setup_logger(args.json, args.level)?;

    match args.cmd {
        Command::Download(download_args) => run_download(download_args),
        Command::CleanCache { cache_dir, yes } => run_clean_cache(cache_dir, yes),
    }
}

fn run_download(args: DownloadArgs) -> Result<(), Error> {
    if !args.accept_license {
        println!("Do you accept the license at https://go.microsoft.com/fwlink/?LinkId=2086102 (yes | no)?");
        let mut accept = String::new();
        std::io::stdin().read_line(&mut accept)?;
        match accept.trim() {
            "yes" => println!("license accepted!"),
            "no" => anyhow::bail!("license not accepted"),
            other => anyhow::bail!("unknown response to license request {other}"),
        }
    }

    if !args.channel.is_legal_for(args.manifest_version) {
        anyhow::bail!(
            "channel '{}' is not a legal combination with manifest_version {}",
            args.channel,
            args.manifest_version
        );
    }

    let mut builder = wincrt_fetch::ConfigurationBuilder::new()
        .manifest_version(args.manifest_version)
        .channel(args.channel)
        .arch(args.arch)
        .variant(args.variant)
        .include_atl(args.include_atl)
        .include_spectre(args.include_spectre);

    if let Some(path) = args.manifest_path {
        builder = builder.channel_manifest_path(path);
    }
    if let Some(dir) = args.cache_dir {
        builder = builder.cache_dir(dir);
    }
    if let Some(crt) = args.crt_version {
        builder = builder.crt_version(crt);
    }
    if let Some(sdk) = args.sdk_version {
        builder = builder.sdk_version(sdk);
    }

    let cfg = builder.build()?;
    let agent = wincrt_fetch::http::build_agent(args.timeout, args.https_proxy.as_deref())?;

    let progress = IndicatifProgress::new(ProgressTarget::Stderr);
    let reduced = wincrt_fetch::pipeline::run(&agent, &cfg, &progress)?;
    tracing::info!(packages = ?reduced, reduced_dir = %cfg.reduced_dir(), "download complete");

    Ok(())
}

fn run_clean_cache(cache_dir: Option<PathBuf>, yes: bool) -> Result<(), Error> {
    let cfg = {
        let mut builder = wincrt_fetch::ConfigurationBuilder::new();
        if let Some(dir) = cache_dir {
            builder = builder.cache_dir(dir);
        }
        builder.build()?
    };

    if !cfg.cache_dir.exists() {
        println!("cache directory {} does not exist, nothing to do", cfg.cache_dir);
        return Ok(());
    }

    if !yes {
        println!("delete {} and everything under it? (yes | no)", cfg.cache_dir);
        let mut accept = String::new();
        std::io::stdin().read_line(&mut accept)?;
        if accept.trim() != "yes" {
            anyhow::bail!("clean-cache not confirmed");
        }
    }

    std::fs::remove_dir_all(&cfg.cache_dir)
        .with_context(|| format!("failed to remove cache directory {}", cfg.cache_dir))?;
    println!("removed {}", cfg.cache_dir);
    Ok(())
}
