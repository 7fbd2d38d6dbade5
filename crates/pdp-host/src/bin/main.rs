use pdp_host::{parse_opts, serve, subscribe_log};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let opts = parse_opts();
    let _guard = subscribe_log(&opts.log_path, &opts.log_level, opts.max_log);

    debug!(address = %opts.address, "starting with args");
    info!("PDP storage provider node starting");

    serve(opts).await
}
