//! Wires every crate in the workspace into one running node: parses
//! `Opt`, builds a [`pdp_core::PdpService`], registers the commP task
//! queue and the chain scheduler's listeners, sweeps stash orphans left
//! behind by a prior crash, and serves the `pdp-http` router.

use alloy_primitives::Address;
use anyhow::Context;
use pdp_chain::{
    AddRootsCoordinators, ChainScheduler, HttpSigningService, ReceiptWatcher, RpcChainProvider,
    TransactionSender,
};
use pdp_core::{
    AddRootsService, AddRootsValidator, CommpJobHandler, CoreAddRootsSubmitter, PdpService, PieceService,
    ProofSetService, RegistrationService, COMMP_QUEUE,
};
use pdp_db::{establish_pool, run_migrations, PdpDb};
use pdp_resolver::{CommpPipeline, PieceResolver};
use pdp_store::{Blobstore, Stash};
use pdp_tasks::handler::QueueOptions;
use pdp_tasks::TaskEngine;
use pdp_types::{ServiceConfig, MAX_MEMTREE_UNPADDED_SIZE};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How long `ProofSetService`'s synchronous status helpers wait for a
/// submitted transaction to confirm before giving up.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(180);
/// FVM calibration testnet chain id, used unless `--chain-id` overrides it.
const DEFAULT_CHAIN_ID: u64 = 314159;

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_database_url() -> String {
    "postgres://localhost/pdp".to_string()
}
fn default_database_pool_size() -> u32 {
    10
}
fn default_stash_dir() -> PathBuf {
    PathBuf::from("./data/stash")
}
fn default_blobstore_root() -> PathBuf {
    PathBuf::from("./data/blobstore")
}
fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}
fn default_address_zero() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}
fn default_signing_service_url() -> String {
    "http://localhost:9000".to_string()
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_task_workers_per_queue() -> usize {
    4
}
fn default_max_body_size_bytes() -> usize {
    1 << 30
}
fn default_max_concurrency() -> usize {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_node_type() -> String {
    pdp_types::config::DEFAULT_NODE_TYPE.to_string()
}

/// Command-line / environment configuration. Kept separate from
/// [`ServiceConfig`] so nothing below `pdp-host` needs to know about
/// `clap` or environment variables - `Opt` is what a human fills in,
/// `ServiceConfig` is what the rest of the workspace is handed.
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "pdp-storage-provider", about = "Filecoin PDP storage provider node", long_about = None)]
pub struct Opt {
    #[arg(long, require_equals = true, default_value = "0.0.0.0:8080")]
    pub address: String,

    #[arg(long, require_equals = true, env = "DATABASE_URL", default_value = "postgres://localhost/pdp")]
    pub database_url: String,

    #[arg(long, require_equals = true, default_value = "10")]
    pub database_pool_size: u32,

    #[arg(long, require_equals = true, default_value = "./data/stash")]
    pub stash_dir: PathBuf,

    #[arg(long, require_equals = true, default_value = "./data/blobstore")]
    pub blobstore_root: PathBuf,

    #[arg(long, require_equals = true, env = "PDP_RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    #[arg(long, require_equals = true, default_value = "0x0000000000000000000000000000000000000000")]
    pub verifier_address: String,

    #[arg(long, require_equals = true, default_value = "0x0000000000000000000000000000000000000000")]
    pub service_view_address: String,

    #[arg(long, require_equals = true, default_value = "0x0000000000000000000000000000000000000000")]
    pub registry_address: String,

    #[arg(long, require_equals = true, env = "PDP_SIGNING_SERVICE_URL", default_value = "http://localhost:9000")]
    pub signing_service_url: String,

    #[arg(long, require_equals = true, default_value = "10")]
    pub chain_poll_interval_secs: u64,

    /// Hex-encoded secp256k1 key the transaction sender signs submissions
    /// with. Never logged; kept off `ServiceConfig` so it can't end up in
    /// a debug-printed config dump.
    #[arg(long, require_equals = true, env = "PDP_SIGNER_PRIVATE_KEY", default_value = "")]
    pub signer_private_key: String,

    #[arg(long, require_equals = true, env = "PDP_CHAIN_ID", default_value = "314159")]
    pub chain_id: u64,

    #[arg(long, require_equals = true, default_value = "4")]
    pub task_workers_per_queue: usize,

    #[arg(long, require_equals = true, default_value = "1073741824")]
    pub max_body_size_bytes: usize,

    #[arg(long, require_equals = true, default_value = "64")]
    pub max_concurrent_downloads: usize,

    #[arg(long, require_equals = true, default_value = "64")]
    pub max_concurrent_uploads: usize,

    #[arg(long, require_equals = true, default_value = "pdp-storage-provider")]
    pub node_type: String,

    #[arg(long, require_equals = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, require_equals = true)]
    pub log_path: Option<PathBuf>,

    #[arg(long, require_equals = true, default_value = "7")]
    pub max_log: usize,
}

impl Default for Opt {
    fn default() -> Self {
        Self {
            address: default_address(),
            database_url: default_database_url(),
            database_pool_size: default_database_pool_size(),
            stash_dir: default_stash_dir(),
            blobstore_root: default_blobstore_root(),
            rpc_url: default_rpc_url(),
            verifier_address: default_address_zero(),
            service_view_address: default_address_zero(),
            registry_address: default_address_zero(),
            signing_service_url: default_signing_service_url(),
            chain_poll_interval_secs: default_poll_interval_secs(),
            signer_private_key: String::new(),
            chain_id: DEFAULT_CHAIN_ID,
            task_workers_per_queue: default_task_workers_per_queue(),
            max_body_size_bytes: default_max_body_size_bytes(),
            max_concurrent_downloads: default_max_concurrency(),
            max_concurrent_uploads: default_max_concurrency(),
            node_type: default_node_type(),
            log_level: default_log_level(),
            log_path: None,
            max_log: 7,
        }
    }
}

pub fn parse_opts() -> Opt {
    use clap::Parser;
    Opt::parse()
}

pub fn config_from_opts(opt: &Opt) -> ServiceConfig {
    ServiceConfig {
        node_type: opt.node_type.clone(),
        stash_dir: opt.stash_dir.clone(),
        blobstore_root: opt.blobstore_root.clone(),
        database_url: opt.database_url.clone(),
        database_pool_size: opt.database_pool_size,
        chain: pdp_types::config::ChainConfig {
            rpc_url: opt.rpc_url.clone(),
            verifier_address: opt.verifier_address.clone(),
            service_view_address: opt.service_view_address.clone(),
            registry_address: opt.registry_address.clone(),
            signing_service_url: opt.signing_service_url.clone(),
            poll_interval_secs: opt.chain_poll_interval_secs,
        },
        task_workers_per_queue: opt.task_workers_per_queue,
        max_body_size_bytes: opt.max_body_size_bytes,
        max_concurrent_downloads: opt.max_concurrent_downloads,
        max_concurrent_uploads: opt.max_concurrent_uploads,
    }
}

/// Everything `run` needs to serve traffic and shut down cleanly.
pub struct Node {
    pub service: Arc<PdpService>,
    pub config: ServiceConfig,
    scheduler_shutdown: CancellationToken,
    scheduler_task: tokio::task::JoinHandle<()>,
}

impl Node {
    /// Drains in-flight HTTP work, stops the chain scheduler, then stops
    /// the task engine - in that order, so a commP job enqueued by an
    /// upload that's still finishing isn't lost mid-shutdown.
    pub async fn shutdown(self, timeout: Duration) {
        self.service.stop(timeout).await;
        self.scheduler_shutdown.cancel();
        let _ = self.scheduler_task.await;
    }
}

/// Builds every component and wires them into a running [`PdpService`]
/// plus a background chain-scheduler task. Does not bind a listener or
/// serve HTTP - that's [`serve`]'s job, so tests can build a `Node`
/// without opening a socket.
pub async fn build_node(opt: &Opt) -> anyhow::Result<Node> {
    let config = config_from_opts(opt);

    let pool = establish_pool(&config.database_url, config.database_pool_size).context("failed to connect to postgres")?;
    run_migrations(&pool).context("failed to run pending migrations")?;
    let db = PdpDb::new(pool);

    let store = Arc::new(Blobstore::new(config.blobstore_root.clone()));
    let stash = Stash::new(config.stash_dir.clone());
    stash.ensure_dir().await.context("failed to create stash dir")?;

    let referenced: HashSet<String> = db.list_referenced_data_urls().await.context("failed to list referenced data urls")?.into_iter().collect();
    let orphans = stash.sweep_orphans(&referenced).await.context("failed to sweep stash orphans")?;
    if !orphans.is_empty() {
        info!(count = orphans.len(), "swept orphaned stash files left behind by a prior crash");
    }

    let resolver = Arc::new(PieceResolver::new(db.clone()));
    let commp_pipeline = CommpPipeline::new(db.clone(), store.clone());

    let tasks = TaskEngine::new(db.clone());
    tasks.register_queue(
        COMMP_QUEUE,
        Arc::new(CommpJobHandler::new(db.clone(), commp_pipeline.clone())),
        QueueOptions { max_workers: config.task_workers_per_queue, ..Default::default() },
    );

    let verifier_address = Address::from_str(&config.chain.verifier_address).context("invalid verifier address")?;
    let service_view_address = Address::from_str(&config.chain.service_view_address).context("invalid service view address")?;
    let registry_address = Address::from_str(&config.chain.registry_address).context("invalid registry address")?;

    let provider = Arc::new(RpcChainProvider::new(&config).context("failed to build chain provider")?);
    let verifier: Arc<dyn pdp_chain::Verifier> = provider.clone();
    let service_view: Arc<dyn pdp_chain::ServiceView> = provider.clone();
    let registry: Arc<dyn pdp_chain::Registry> = provider.clone();
    let signing: Arc<dyn pdp_chain::SigningService> = Arc::new(HttpSigningService::new(config.chain.signing_service_url.clone()));

    if opt.signer_private_key.is_empty() {
        anyhow::bail!("no signer private key configured (--signer-private-key / PDP_SIGNER_PRIVATE_KEY)");
    }
    let sender = Arc::new(
        TransactionSender::new(provider.clone(), &opt.signer_private_key, opt.chain_id)
            .context("failed to construct transaction sender")?,
    );

    let registration = Arc::new(RegistrationService::new(db.clone(), sender.clone(), registry, signing.clone(), registry_address));

    let proof_sets = ProofSetService::new(
        db.clone(),
        sender.clone(),
        verifier.clone(),
        service_view.clone(),
        registration.clone(),
        signing.clone(),
        verifier_address,
        service_view_address,
        CONFIRM_TIMEOUT,
    );

    let add_roots = AddRootsService::new(db.clone(), sender.clone(), verifier.clone(), service_view.clone(), registration.clone(), signing.clone(), verifier_address);

    let add_roots_validator = AddRootsValidator::new(db.clone());
    let add_roots_submitter = Arc::new(CoreAddRootsSubmitter::new(db.clone(), service_view.clone(), signing.clone(), sender.clone(), verifier_address));
    let add_roots_coordinators = Arc::new(AddRootsCoordinators::new(
        verifier.clone(),
        add_roots_submitter.clone() as Arc<dyn pdp_chain::AddRootsSubmitter>,
    ));

    let pieces = PieceService::new(db.clone(), store.clone(), stash.clone(), tasks.clone(), MAX_MEMTREE_UNPADDED_SIZE);

    let service = Arc::new(PdpService::new(
        config.clone(),
        store,
        stash,
        resolver,
        commp_pipeline,
        tasks.clone(),
        pieces,
        proof_sets,
        add_roots,
        registration,
        add_roots_validator,
        add_roots_submitter,
        add_roots_coordinators,
    ));

    let mut scheduler = ChainScheduler::new(provider.clone(), Duration::from_secs(config.chain.poll_interval_secs));
    scheduler.register(Arc::new(ReceiptWatcher::new(db.clone(), provider.clone())) as Arc<dyn pdp_chain::ChainListener>);
    let scheduler_shutdown = CancellationToken::new();
    let scheduler_task = {
        let shutdown = scheduler_shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    Ok(Node { service, config, scheduler_shutdown, scheduler_task })
}

/// Binds a listener and serves the `pdp-http` router until ctrl-c, then
/// drains in-flight work and shuts every background component down.
pub async fn serve(opt: Opt) -> anyhow::Result<()> {
    let node = build_node(&opt).await?;
    let addr: SocketAddr = node.config.address.parse().context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind listener")?;
    info!(address = %addr, node_type = %node.config.node_type, "listening");

    let router = pdp_http::create_router(node.service.clone(), node.config.max_body_size_bytes);

    let serve_result = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await;

    debug!("shutting down: draining in-flight uploads/downloads");
    node.shutdown(Duration::from_secs(30)).await;
    serve_result.context("server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Builds the `tracing-subscriber` registry: an env-filtered stdout layer
/// plus, if `log_path` is set, a JSON-formatted rolling file layer for an
/// access/audit log.
pub fn subscribe_log(log_path: &Option<PathBuf>, log_level: &str, max_log: usize) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let stdout_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_filter(stdout_filter);

    match log_path {
        Some(dir) => {
            let appender = tracing_appender::rolling::Builder::new()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix("pdp-storage-provider.log")
                .max_log_files(max_log)
                .build(dir)
                .expect("initializing rolling file appender failed");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().json().with_writer(non_blocking).with_ansi(false);

            tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stdout_layer).init();
            None
        }
    }
}
