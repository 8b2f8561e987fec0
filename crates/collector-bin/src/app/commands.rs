//! Subcommand bodies.

use super::inflight::InflightSender;
use clap::Args;
use collector_config_and_utils::{Config, Paths};
use collector_database::{DatabasePool, EventStore, PoolConfig};
use collector_outbox::{DrainReport, DrainWorker, DrainWorkerConfig, HttpBatchSender, SenderConfig};
use collector_producer::{Producer, RequestInfo};
use std::sync::Arc;
use tracing::{info, warn};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Request details for `collector record`.
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Request path and query, e.g. /blog/?p=1
    #[arg(long)]
    pub uri: String,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Mark the request as administrative
    #[arg(long)]
    pub admin: bool,

    /// User-Agent request header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Client-IP request header
    #[arg(long)]
    pub client_ip: Option<String>,

    /// X-Forwarded-For request header
    #[arg(long)]
    pub forwarded_for: Option<String>,

    /// Address of the connected peer
    #[arg(long)]
    pub peer_addr: Option<String>,

    /// Visitor session token
    #[arg(long)]
    pub session: Option<String>,

    /// Content-Type of the response
    #[arg(long)]
    pub content_type: Option<String>,
}

impl From<RecordArgs> for RequestInfo {
    fn from(args: RecordArgs) -> Self {
        Self {
            method: args.method,
            is_admin: args.admin,
            request_uri: args.uri,
            user_agent: args.user_agent,
            client_ip_header: args.client_ip,
            forwarded_for: args.forwarded_for,
            peer_addr: args.peer_addr,
            session_token: args.session,
            response_headers: args
                .content_type
                .map(|value| vec![("Content-Type".to_string(), value)])
                .unwrap_or_default(),
        }
    }
}

fn open_store(paths: &Paths) -> Result<Arc<DatabasePool>, Box<dyn std::error::Error>> {
    let pool = DatabasePool::open(&paths.database_file(), PoolConfig::default())?;
    Ok(Arc::new(pool))
}

fn sender_config(config: &Config) -> SenderConfig {
    SenderConfig {
        endpoint: config.collect_endpoint.clone(),
        timeout: config.send_timeout(),
        max_redirects: config.max_redirects,
    }
}

fn worker_config(config: &Config) -> DrainWorkerConfig {
    DrainWorkerConfig {
        batch_size: config.batch_size,
        interval: config.drain_interval(),
    }
}

/// Build a worker around `store` plus the sender it dispatches through.
fn build_worker(
    config: &Config,
    store: Arc<DatabasePool>,
) -> Result<(Arc<DrainWorker>, Arc<InflightSender>), Box<dyn std::error::Error>> {
    let sender = Arc::new(InflightSender::new(HttpBatchSender::new(sender_config(config))?));
    let worker = Arc::new(DrainWorker::new(worker_config(config), store, sender.clone()));
    Ok((worker, sender))
}

fn print_report(report: &DrainReport) {
    println!(
        "Drained {} event(s) in {} batch(es), {} dropped",
        report.claimed, report.batches, report.dropped
    );
}

/// Create the pending-event table.
pub fn provision(paths: &Paths) -> CommandResult {
    paths.ensure_dirs()?;
    let store = open_store(paths)?;
    store.provision()?;
    println!("Event store ready at {}", store.path());
    Ok(())
}

/// Flush once, then drop the pending-event table.
pub async fn teardown(config: &Config, paths: &Paths) -> CommandResult {
    let store = open_store(paths)?;
    if !store.is_ready() {
        println!("Event store is not provisioned, nothing to tear down");
        return Ok(());
    }

    let (worker, sender) = build_worker(config, store.clone())?;
    let report = worker.flush_and_stop().await;
    sender.settle(config.send_timeout()).await;
    print_report(&report);

    store.teardown()?;
    println!("Event store removed");
    Ok(())
}

/// Run one request through the producer.
pub fn record(config: &Config, paths: &Paths, args: RecordArgs) -> CommandResult {
    let store = open_store(paths)?;
    let producer = Producer::from_config(store.clone(), config);

    let request = RequestInfo::from(args);
    producer.on_request_complete(&request);

    if store.is_ready() {
        println!("Pending events: {}", store.pending_count()?);
    } else {
        println!("Event store is not provisioned, request was not recorded");
    }
    Ok(())
}

/// One drain cycle.
pub async fn drain(config: &Config, paths: &Paths) -> CommandResult {
    let store = open_store(paths)?;
    let (worker, sender) = build_worker(config, store)?;

    let report = worker.run().await;
    sender.settle(config.send_timeout()).await;
    print_report(&report);
    Ok(())
}

/// Drain on the configured interval until Ctrl-C.
pub async fn run(config: &Config, paths: &Paths) -> CommandResult {
    let store = open_store(paths)?;
    if !store.is_ready() {
        warn!("Event store is not provisioned, drain cycles will be skipped until it is");
    }

    let (worker, sender) = build_worker(config, store)?;
    worker.schedule().await;
    info!(
        interval_secs = config.drain_interval_secs,
        batch_size = config.batch_size,
        "Collector running"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, flushing pending events");

    let report = worker.flush_and_stop().await;
    sender.settle(config.send_timeout()).await;
    print_report(&report);
    Ok(())
}

/// Store readiness and pending count.
pub fn status(paths: &Paths) -> CommandResult {
    let store = open_store(paths)?;
    println!("Database: {}", store.path());

    if store.is_ready() {
        println!("Event store is ready");
        println!("  Pending: {}", store.pending_count()?);
    } else {
        println!("Event store is not provisioned");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(dir: &tempfile::TempDir) -> Paths {
        Paths::with_base_dir(dir.path().to_path_buf())
    }

    fn record_args(uri: &str) -> RecordArgs {
        RecordArgs {
            uri: uri.to_string(),
            method: "GET".to_string(),
            admin: false,
            user_agent: Some("curl/8.0".to_string()),
            client_ip: None,
            forwarded_for: None,
            peer_addr: Some("203.0.113.10".to_string()),
            session: None,
            content_type: Some("text/html".to_string()),
        }
    }

    fn identified_config() -> Config {
        Config {
            project_id: Some("proj".to_string()),
            site_id: Some("site".to_string()),
            // Nothing listens on the discard port
            collect_endpoint: "http://127.0.0.1:9/collect".to_string(),
            send_timeout_ms: 200,
            ..Config::default()
        }
    }

    #[test]
    fn record_args_map_to_request() {
        let request = RequestInfo::from(record_args("/blog"));
        assert_eq!(request.method, "GET");
        assert_eq!(request.request_uri, "/blog");
        assert_eq!(request.peer_addr.as_deref(), Some("203.0.113.10"));
        assert_eq!(request.response_content_type(), "text/html");
    }

    #[test]
    fn provision_record_status() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        let config = identified_config();

        // Recording before provisioning is a silent no-op
        record(&config, &paths, record_args("/early")).unwrap();

        provision(&paths).unwrap();
        record(&config, &paths, record_args("/a")).unwrap();
        record(&config, &paths, record_args("/b")).unwrap();
        status(&paths).unwrap();

        let store = open_store(&paths).unwrap();
        assert_eq!(store.pending_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn drain_empties_store() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        let config = identified_config();

        provision(&paths).unwrap();
        for n in 0..3 {
            record(&config, &paths, record_args(&format!("/{}", n))).unwrap();
        }

        drain(&config, &paths).await.unwrap();
        assert_eq!(open_store(&paths).unwrap().pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn teardown_flushes_then_drops_table() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        let config = identified_config();

        provision(&paths).unwrap();
        record(&config, &paths, record_args("/x")).unwrap();

        teardown(&config, &paths).await.unwrap();
        assert!(!open_store(&paths).unwrap().is_ready());

        // A second teardown finds nothing to do
        teardown(&config, &paths).await.unwrap();
    }
}
