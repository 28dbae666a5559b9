use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tinysched_client::{
    ApiClient, ConnectOptions, InformerConfig, ObservedCluster, SnapshotInformer,
};
use tinysched_scheduler::{
    default_filters, AssumeCacheConfig, EqualScore, LeastAllocated, Scheduler, SchedulerConfig,
    ScorePlugin,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tinysched", about = "Tinysched pod scheduler")]
struct Cli {
    /// Pods whose schedulerName matches are placed by this instance
    #[arg(long, env = "TINYSCHED_NAME", default_value = "tiny-scheduler")]
    scheduler_name: String,

    /// Kubeconfig file. Defaults to KUBECONFIG, ~/.kube/config, then the in-cluster service account
    #[arg(long, env = "TINYSCHED_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Override the API server URL. Without --kubeconfig this connects unauthenticated
    #[arg(long, env = "TINYSCHED_API_URL")]
    api_url: Option<String>,

    /// Pause between scheduling cycles
    #[arg(long, default_value_t = 1000)]
    schedule_interval_ms: u64,

    /// Interval between cluster listings
    #[arg(long, default_value_t = 1000)]
    sync_interval_ms: u64,

    /// Upper bound for each list and bind call
    #[arg(long, default_value_t = 5)]
    api_timeout_secs: u64,

    /// How long a bound pod is remembered before the listing must show it
    #[arg(long, default_value_t = 10)]
    assume_ttl_secs: u64,

    #[arg(long, default_value_t = 5)]
    sweep_interval_secs: u64,

    /// How long to wait for the first cluster listing at startup
    #[arg(long, default_value_t = 30)]
    sync_timeout_secs: u64,

    /// Score plugins to run, comma separated
    #[arg(long, value_enum, value_delimiter = ',', default_value = "equal")]
    score_plugins: Vec<ScorePluginKind>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScorePluginKind {
    Equal,
    LeastAllocated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            scheduler_name: self.scheduler_name.clone(),
            schedule_interval: Duration::from_millis(self.schedule_interval_ms),
            api_timeout: Duration::from_secs(self.api_timeout_secs),
            assume_cache: AssumeCacheConfig {
                ttl: Duration::from_secs(self.assume_ttl_secs),
                sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            },
        }
    }

    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            kubeconfig: self.kubeconfig.clone(),
            api_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.api_timeout_secs),
        }
    }

    fn informer_config(&self) -> InformerConfig {
        InformerConfig {
            sync_interval: Duration::from_millis(self.sync_interval_ms),
        }
    }

    fn score_plugins(&self) -> Vec<Arc<dyn ScorePlugin>> {
        self.score_plugins
            .iter()
            .map(|kind| -> Arc<dyn ScorePlugin> {
                match kind {
                    ScorePluginKind::Equal => Arc::new(EqualScore),
                    ScorePluginKind::LeastAllocated => Arc::new(LeastAllocated),
                }
            })
            .collect()
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    run(cli).await
}

async fn run(cli: Cli) -> miette::Result<()> {
    info!("Starting tinysched '{}'", cli.scheduler_name);

    // 1. Start observing the cluster
    let api_client = ApiClient::connect(&cli.connect_options())
        .await
        .map_err(|e| miette::miette!("Failed to connect to the API server: {}", e))?;
    let api_url = api_client.base_url().to_string();
    let api_client = Arc::new(api_client);

    let token = CancellationToken::new();
    let informer = Arc::new(SnapshotInformer::new(api_client, cli.informer_config()));
    let informer_token = token.clone();
    let informer_handle = {
        let informer = informer.clone();
        tokio::spawn(async move {
            if let Err(e) = informer.run(informer_token).await {
                error!("Informer error: {}", e);
            }
        })
    };

    // 2. The scheduler must not start on an empty view of the cluster
    let sync_timeout = Duration::from_secs(cli.sync_timeout_secs);
    if let Err(e) = informer.wait_for_sync(sync_timeout).await {
        token.cancel();
        let _ = informer_handle.await;
        return Err(miette::miette!(
            "Failed to sync cluster state from {} within {:?}: {}",
            api_url,
            sync_timeout,
            e
        ));
    }
    info!("Cluster snapshot synced");

    // 3. Spawn the scheduler
    let mut scheduler = Scheduler::new(
        Arc::new(ObservedCluster::new(informer)),
        cli.scheduler_config(),
    )
    .with_filters(default_filters())
    .with_scorers(cli.score_plugins());

    let scheduler_token = token.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_token).await {
            error!("Scheduler error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;

    info!("Shutting down gracefully...");
    token.cancel();

    let shutdown_timeout = Duration::from_secs(5);
    let _ = tokio::time::timeout(shutdown_timeout, async {
        let _ = tokio::join!(informer_handle, scheduler_handle);
    })
    .await;

    info!("Shutdown complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tinysched"]).unwrap();
        let config = cli.scheduler_config();

        assert_eq!(config.schedule_interval, Duration::from_secs(1));
        assert_eq!(config.api_timeout, Duration::from_secs(5));
        assert_eq!(config.assume_cache.ttl, Duration::from_secs(10));
        assert_eq!(config.assume_cache.sweep_interval, Duration::from_secs(5));
        assert_eq!(cli.informer_config().sync_interval, Duration::from_secs(1));
        assert_eq!(cli.score_plugins, vec![ScorePluginKind::Equal]);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_connect_options() {
        let cli = Cli::try_parse_from([
            "tinysched",
            "--kubeconfig",
            "/etc/tinysched/kubeconfig",
            "--api-url",
            "https://10.0.0.1:6443",
            "--api-timeout-secs",
            "2",
        ])
        .unwrap();

        let options = cli.connect_options();
        assert_eq!(
            options.kubeconfig,
            Some(PathBuf::from("/etc/tinysched/kubeconfig"))
        );
        assert_eq!(options.api_url.as_deref(), Some("https://10.0.0.1:6443"));
        assert_eq!(options.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_score_plugin_list() {
        let cli = Cli::try_parse_from([
            "tinysched",
            "--score-plugins",
            "equal,least-allocated",
            "--log-format",
            "json",
        ])
        .unwrap();

        let names: Vec<String> = cli
            .score_plugins()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["EqualScore", "LeastAllocated"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_plugin() {
        assert!(Cli::try_parse_from(["tinysched", "--score-plugins", "random"]).is_err());
    }
}
