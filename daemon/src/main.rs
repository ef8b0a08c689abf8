use anyhow::Result;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use webmond::daemon::{Daemon, DaemonPaths};

#[tokio::main]
async fn main() -> Result<()> {
    let paths = DaemonPaths::from_env();

    std::fs::create_dir_all(&paths.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "webmond.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("webmond=info".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("lettre=warn".parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("Starting webmond monitoring daemon");

    let daemon = Daemon::new(paths).await?;
    daemon.run().await
}
