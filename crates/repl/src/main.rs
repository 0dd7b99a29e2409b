use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use color_eyre::eyre::{self, Context};
use config::Config;
use debugger::{ClientOptions, Discovery, RemoteDebugger, WebSocketDialer};
use server::{Browser, DEFAULT_DEBUGGING_PORT};
use tracing_subscriber::filter::EnvFilter;

/// Connect to a browser's remote debugging endpoint, show what it offers
/// and print the events it sends.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Command line that starts the browser
    #[clap(long)]
    cmd: Option<String>,

    /// Start the first Chrome or Chromium found on PATH
    #[clap(long, conflicts_with = "cmd")]
    launch: bool,

    /// Discovery endpoint of the browser (host:port)
    #[clap(long)]
    port: Option<String>,

    /// Only list targets of this kind
    #[clap(long)]
    filter: Option<String>,

    /// Page to load
    #[clap(long)]
    page: Option<String>,

    /// Configuration file to use instead of the default one
    #[clap(long)]
    config: Option<PathBuf>,

    /// Seconds to print events for before disconnecting
    #[clap(long)]
    watch: Option<u64>,

    /// Write logs to this file instead of stderr
    #[clap(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Command line flags win over the configuration file
    fn apply(&self, mut config: Config) -> Config {
        if let Some(cmd) = &self.cmd {
            config.command = Some(cmd.clone());
        }
        if let Some(port) = &self.port {
            config.address = port.clone();
        }
        if let Some(filter) = &self.filter {
            config.filter = filter.clone();
        }
        if let Some(page) = &self.page {
            config.page = page.clone();
        }
        if let Some(watch) = self.watch {
            config.watch_secs = watch;
        }
        config
    }
}

fn init_logging(log_file: Option<&Path>) -> eyre::Result<()> {
    let subscriber = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    match log_file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            subscriber.with_writer(Mutex::new(log_file)).init();
        }
        None => subscriber.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Port part of a `host:port` address
fn debugging_port(address: &str) -> u16 {
    address
        .rsplit_once(':')
        .and_then(|(_, port)| port.trim_end_matches('/').parse().ok())
        .unwrap_or(DEFAULT_DEBUGGING_PORT)
}

fn start_browser(config: &Config, launch: bool) -> eyre::Result<Option<Browser>> {
    match config.command.as_deref() {
        Some(cmd) if !cmd.trim().is_empty() => Browser::from_command_line(cmd)
            .context("starting browser")
            .map(Some),
        _ if launch => Browser::chrome_on_port(debugging_port(&config.address))
            .context("starting browser")
            .map(Some),
        _ => Ok(None),
    }
}

fn print_result(result: debugger::Result<serde_json::Value>) {
    match result {
        Ok(value) => println!("  {value}"),
        Err(e) => println!("  {e}"),
    }
}

async fn enable_events(remote: &RemoteDebugger) {
    for domain in ["Page", "DOM", "Runtime", "Network"] {
        if let Err(e) = remote.set_domain_events(domain, true).await {
            tracing::warn!(domain, error = %e, "could not enable events");
        }
    }
}

async fn watch_events(remote: &RemoteDebugger, config: &Config) {
    let mut events = remote.events().await;
    let watch = config.watch();

    let print_events = async {
        while let Some(event) = events.recv().await {
            println!("EVENT {} {}", event.method, event.params);
        }
        tracing::debug!("event feed ended");
    };

    tokio::select! {
        _ = print_events => {}
        _ = tokio::time::sleep(watch) => {
            tracing::debug!(?watch, "watch period over");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("interrupted");
        }
    }
}

async fn run(config: Config, launch: bool) -> eyre::Result<()> {
    let browser = start_browser(&config, launch)?;

    let discovery = Discovery::new(&config.address);
    if browser.is_some() {
        discovery
            .wait_until_ready(config.startup_timeout())
            .await
            .context("waiting for browser to start")?;
    }

    let options = ClientOptions {
        call_timeout: config.call_timeout(),
        max_message_size: config.max_message_size,
    };
    let remote = debugger::connect_with(&discovery, &WebSocketDialer, options)
        .await
        .context("connecting to browser")?;

    println!();
    println!("Version:");
    match discovery.version().await {
        Ok(version) => println!("{version}"),
        Err(e) => println!("{e}"),
    }

    println!();
    let tabs = discovery
        .tabs(Some(&config.filter))
        .await
        .context("cannot get list of tabs")?;
    for tab in &tabs {
        println!("{tab}");
    }

    println!();
    print_result(remote.get_domains().await);

    enable_events(&remote).await;

    if let Some(tab) = tabs.last() {
        if let Err(e) = discovery.activate(tab).await {
            tracing::warn!(id = %tab.id, error = %e, "could not activate tab");
        }

        println!();
        print_result(remote.navigate(&config.page).await);
    }

    watch_events(&remote, &config).await;

    remote.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install().context("installing color_eyre")?;

    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;
    let config = args.apply(config);
    tracing::debug!(?config, "effective configuration");

    run(config, args.launch).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::try_parse_from([
            "godet",
            "--port",
            "127.0.0.1:9333",
            "--filter",
            "",
            "--watch",
            "5",
        ])
        .unwrap();

        let config = args.apply(Config {
            page: "http://example.com".to_string(),
            ..Default::default()
        });

        assert_eq!(config.address, "127.0.0.1:9333");
        assert_eq!(config.filter, "");
        assert_eq!(config.watch_secs, 5);
        assert_eq!(config.page, "http://example.com");
        assert_eq!(config.command, None);
    }

    #[test]
    fn launch_conflicts_with_cmd() {
        assert!(Args::try_parse_from(["godet", "--launch", "--cmd", "chromium"]).is_err());
    }

    #[test]
    fn port_from_address() {
        assert_eq!(debugging_port("localhost:9333"), 9333);
        assert_eq!(debugging_port("http://127.0.0.1:9444/"), 9444);
        assert_eq!(debugging_port("localhost"), DEFAULT_DEBUGGING_PORT);
    }

    #[test]
    fn no_browser_without_command_or_launch() {
        assert!(start_browser(&Config::default(), false).unwrap().is_none());
    }
}
