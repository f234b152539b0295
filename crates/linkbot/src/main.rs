use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use linkbot_core::{
    config::Config,
    consumer::{Consumer, ConsumerConfig},
    domain::Cursor,
    messaging::{
        port::ReplySink,
        throttled::{ThrottleConfig, ThrottledSink},
    },
    processor::Processor,
    storage::FileStorage,
};
use linkbot_telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<(), linkbot_core::Error> {
    linkbot_core::logging::init("linkbot")?;

    let cfg = Config::load()?;

    let telegram = Arc::new(
        TelegramClient::connect(&cfg)
            .await
            .map_err(|e| linkbot_core::Error::External(format!("telegram setup failed: {e:#}")))?,
    );

    let raw_replies: Arc<dyn ReplySink> = telegram.clone();
    let replies: Arc<dyn ReplySink> =
        Arc::new(ThrottledSink::new(raw_replies, ThrottleConfig::from(&cfg)));
    let storage = Arc::new(FileStorage::new(cfg.storage_path.clone()));
    let processor = Arc::new(Processor::new(storage, replies));

    let consumer = Consumer::new(telegram, processor, ConsumerConfig::from(&cfg));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => error!(error = %e, "can't listen for shutdown signal"),
            }
        });
    }

    info!(storage = %cfg.storage_path.display(), batch_size = cfg.batch_size, "service started");

    match consumer.run(Cursor::default(), shutdown).await {
        Ok(cursor) => {
            info!(cursor = cursor.0, "service stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "service stopped");
            Err(e)
        }
    }
}
