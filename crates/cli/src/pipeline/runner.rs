//! Pipeline runner - builds the dispatcher and feed client from an
//! [`AppConfig`] and drives them until shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{AppConfig, IndexConfig};
use dispatcher::{create_dispatcher, Dispatcher, MemoryNotificationIndex};
use feed_sync::{FeedSyncClient, TcpLineTransport};
use tokio::sync::watch;
use tracing::info;

use super::PipelineStats;
use crate::error::CliError;

const DISPATCHER_NAME: &str = "pdl-notify";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded application configuration
    pub app: AppConfig,

    /// Stop after this long (None = run until shutdown)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses or the feed ends
    ///
    /// Listeners are stopped and the cursor persisted before returning.
    pub async fn run<S>(self, shutdown: S) -> Result<PipelineStats, CliError>
    where
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let PipelineConfig {
            app,
            timeout,
            metrics_port,
        } = self.config;

        if let Some(port) = metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let dispatcher = Arc::new(create_dispatcher(
            DISPATCHER_NAME,
            &app.notifier,
            &app.listeners,
        )?);
        info!(listeners = ?dispatcher.listener_names(), "Listeners registered");

        let replayed = start_dispatcher(&dispatcher, app.index.as_ref()).await?;

        let mut client = FeedSyncClient::new(app.feed.clone(), Arc::clone(&dispatcher)).await?;
        let mut transport = TcpLineTransport::from_config(&app.feed);
        let (stop_tx, stop_rx) = watch::channel(false);

        let feed_result = {
            let feed = client.run(&mut transport, stop_rx);
            tokio::pin!(feed);

            tokio::select! {
                result = &mut feed => result,
                _ = stop_requested(shutdown, timeout) => {
                    let _ = stop_tx.send(true);
                    feed.await
                }
            }
        };

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            mode: client.mode(),
            cursor: client.cursor(),
            replayed,
            totals: dispatcher.delivery_totals(),
            listeners: dispatcher.metrics(),
        };

        dispatcher.shutdown().await;
        feed_result?;

        Ok(stats)
    }
}

/// Start housekeeping and, with an index configured, replay it to the
/// listeners that use it
async fn start_dispatcher(
    dispatcher: &Dispatcher,
    index: Option<&IndexConfig>,
) -> Result<usize, CliError> {
    let Some(index_config) = index else {
        dispatcher.start_housekeeping();
        return Ok(0);
    };

    let index = match &index_config.seed_file {
        Some(path) => MemoryNotificationIndex::load_json_lines(&index_config.name, path)
            .await
            .map_err(|e| CliError::index(&index_config.name, e))?,
        None => MemoryNotificationIndex::new(&index_config.name),
    };
    info!(index = %index_config.name, notifications = index.len(), "Notification index ready");

    Ok(dispatcher.startup(&index).await?)
}

async fn stop_requested<S>(shutdown: S, timeout: Option<Duration>)
where
    S: Future<Output = ()>,
{
    match timeout {
        Some(timeout) => {
            tokio::select! {
                _ = shutdown => info!("Shutdown requested"),
                _ = tokio::time::sleep(timeout) => {
                    info!(timeout_secs = timeout.as_secs(), "Run timeout reached");
                }
            }
        }
        None => {
            shutdown.await;
            info!("Shutdown requested");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ListenerConfig, ListenerType, ProductFilter};
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn app_config(url: String, dir: &TempDir) -> AppConfig {
        let text = format!(
            r#"
[feed]
url = "{url}"
cluster_id = "test-cluster"
subject = "anss.pdl.realtime"
tracking_file = "{tracking}"
connect_attempts = 1
"#,
            tracking = dir.path().join("tracking.json").display()
        );
        let mut config =
            config_loader::ConfigLoader::load_from_str(&text, config_loader::ConfigFormat::Toml)
                .unwrap();
        config.listeners.push(ListenerConfig {
            name: "log".to_string(),
            listener_type: ListenerType::Log,
            max_tries: 1,
            retry_delay_ms: 10,
            use_index: false,
            filter: ProductFilter::default(),
            params: HashMap::new(),
        });
        config
    }

    #[tokio::test]
    async fn test_run_until_shutdown_persists_cursor() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = server.local_addr().unwrap().to_string();
        let dir = TempDir::new().unwrap();

        let accept = tokio::spawn(async move {
            let (socket, _) = server.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            // First frame is the catch-up request; the connection stays
            // open until the task is joined
            let request = lines.next_line().await.unwrap();
            (request, lines, server)
        });

        let pipeline = Pipeline::new(PipelineConfig {
            app: app_config(url, &dir),
            timeout: Some(Duration::from_millis(300)),
            metrics_port: None,
        });
        let stats = pipeline.run(std::future::pending()).await.unwrap();

        let (request, _lines, _server) = accept.await.unwrap();
        let request = request.unwrap();
        assert!(request.contains("products_created_after"));
        assert_eq!(stats.replayed, 0);
        assert_eq!(stats.listeners.len(), 1);
        assert!(dir.path().join("tracking.json").exists());
    }

    #[tokio::test]
    async fn test_missing_index_seed_fails() {
        let dir = TempDir::new().unwrap();
        let mut app = app_config("127.0.0.1:1".to_string(), &dir);
        app.index = Some(IndexConfig {
            name: "seed".to_string(),
            seed_file: Some(dir.path().join("missing.jsonl")),
        });

        let err = Pipeline::new(PipelineConfig {
            app,
            timeout: None,
            metrics_port: None,
        })
        .run(std::future::pending())
        .await
        .unwrap_err();

        assert!(matches!(err, CliError::Index { .. }));
    }
}
