use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use gvm::config::{self, CatalogConfig, CatalogKind, Config};
use gvm::manager::{Manager, ManagerError};
use gvm::version::GoVersion;

#[derive(Parser)]
#[command(name = "gvm")]
#[command(version, about = "Go version manager")]
struct Cli {
    /// gvm home directory [default: ~/.gvm]
    #[arg(long, env = "GVM_HOME", global = true)]
    home: Option<PathBuf>,

    /// Target OS in Go naming
    #[arg(long, env = "GVM_OS", global = true)]
    os: Option<String>,

    /// Target architecture in Go naming
    #[arg(long, env = "GVM_ARCH", global = true)]
    arch: Option<String>,

    /// Shape of the binary catalog
    #[arg(long, value_enum, env = "GVM_CATALOG_KIND", global = true)]
    catalog_kind: Option<CatalogKind>,

    /// Binary catalog URL
    #[arg(long, env = "GVM_CATALOG_URL", global = true)]
    catalog_url: Option<String>,

    /// Git remote of the Go source
    #[arg(long, env = "GVM_SOURCE_URL", global = true)]
    source_url: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, env = "GVM_HTTP_TIMEOUT", global = true)]
    http_timeout: Option<u64>,

    /// Proxy URL for catalog requests and downloads
    #[arg(long, env = "GVM_PROXY", global = true)]
    proxy: Option<String>,

    /// Also print debug logs to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install a Go version (binary if available, else from source)
    Install { version: String },
    /// Build a Go version from source
    Build { version: String },
    /// List versions available to install
    Available,
    /// List installed versions
    List,
    /// Remove installed versions
    Remove {
        #[arg(required = true)]
        versions: Vec<String>,
    },
    /// Remove all but the newest stable and newest unstable version
    Purge,
    /// Create the home directory and clone or update the source cache
    Init,
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let home = self.home.clone().unwrap_or_else(config::home_dir);
        let mut config = Config::load(&home)?;

        if let Some(os) = &self.os {
            config.os = os.clone();
        }
        if let Some(arch) = &self.arch {
            config.arch = arch.clone();
        }
        match self.catalog_kind {
            Some(CatalogKind::Listing) => {
                config.catalog = CatalogConfig::listing(self.catalog_url.as_deref());
            }
            Some(CatalogKind::Json) | None => {
                if let Some(url) = &self.catalog_url {
                    config.catalog.url = url.clone();
                }
            }
        }
        if let Some(url) = &self.source_url {
            config.source_url = url.clone();
        }
        if let Some(secs) = self.http_timeout {
            config.http_timeout_secs = secs;
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        Ok(config)
    }
}

fn init_logging(config: &Config, debug: bool) -> anyhow::Result<WorkerGuard> {
    let logs_dir = config.logs_dir();
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create {:?}", logs_dir))?;

    let appender = tracing_appender::rolling::never(&logs_dir, config::LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(EnvFilter::try_from_env("GVM_LOG").unwrap_or_else(|_| EnvFilter::new("info")));
    let stderr_layer = debug.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(EnvFilter::new("debug"))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(guard)
}

fn parse_version(raw: &str) -> anyhow::Result<GoVersion> {
    GoVersion::parse(raw).with_context(|| format!("Invalid version {:?}", raw))
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let manager = Manager::new(config)?;
    manager.init().await?;

    match cli.command {
        Command::Install { version } => {
            let version = parse_version(&version)?;
            if !version.is_tip() && manager.has_version(&version) {
                println!("Version {} already installed", version);
                return Ok(());
            }
            println!("Installing go{}. Please wait...", version);
            let root = manager.install(&version).await?;
            println!("{}", root.display());
        }
        Command::Build { version } => {
            let version = parse_version(&version)?;
            let root = manager.build(&version).await?;
            println!("{}", root.display());
        }
        Command::Available => {
            for available in manager.available().await? {
                println!("{}", available);
            }
        }
        Command::List => {
            for version in manager.installed().await? {
                println!("{}", version);
            }
        }
        Command::Remove { versions } => {
            for raw in versions {
                let version = parse_version(&raw)?;
                match manager.remove(&version).await {
                    Ok(root) => println!("Removed {}", root.display()),
                    Err(ManagerError::NotInstalled(_)) => {
                        println!("Version {} not installed", version)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Command::Purge => {
            let removed = manager.purge().await?;
            if removed.is_empty() {
                println!("No versions to remove");
            }
            for version in removed {
                println!("Removed {}", version);
            }
        }
        Command::Init => {
            manager.update_cache().await?;
            println!("Initialized {}", manager.config().home.display());
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;
    let _guard = init_logging(&config, cli.debug)?;
    tracing::debug!("Logging to {:?}", config.log_path());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli, config))
}
