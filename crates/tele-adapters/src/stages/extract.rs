use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;
use tele_core::{ExecutionContext, StageDefinition, StageError, StageKind, StageReport, StageRunResult};
use tele_domain::ChannelScraper;

use super::RAW_FILES;
use crate::lake::DataLake;

#[derive(Debug, Default, Serialize)]
pub struct ExtractSummary {
    pub channels_ok: usize,
    pub channels_failed: usize,
    pub messages_written: usize,
    pub files: Vec<String>,
}

/// Extracción: un archivo por canal en la partición del día del run.
///
/// Sin scraper configurado sólo asegura el layout del lake (los archivos
/// pueden llegar por otro proceso).
pub struct ExtractStage {
    lake: DataLake,
    channels: Vec<String>,
    limit: usize,
    scraper: Option<Arc<dyn ChannelScraper>>,
}

impl ExtractStage {
    pub fn new(lake: DataLake, channels: Vec<String>, limit: usize, scraper: Option<Arc<dyn ChannelScraper>>) -> Self {
        Self { lake,
               channels,
               limit,
               scraper }
    }
}

impl StageDefinition for ExtractStage {
    fn id(&self) -> &str {
        RAW_FILES
    }

    fn kind(&self) -> StageKind {
        StageKind::Extraction
    }

    fn run(&self, ctx: &ExecutionContext) -> StageRunResult {
        self.lake
            .ensure_dirs()
            .map_err(|e| StageError::failed(format!("cannot prepare data lake {}: {e}", self.lake.root().display())))?;
        let Some(scraper) = &self.scraper else {
            warn!("no scraper configured; expecting files under {}", self.lake.messages_dir().display());
            return Ok(StageReport::new(serde_json::json!({ "scraper": "none" })));
        };
        if self.channels.is_empty() {
            return Err(StageError::Misconfigured("a scraper is configured but the channel list is empty".into()));
        }

        let partition = ctx.requested_at.date_naive();
        let images_dir = self.lake.images_dir();
        let mut summary = ExtractSummary::default();
        for channel in &self.channels {
            ctx.check_cancelled()?;
            let written = scraper.scrape(channel, self.limit, &images_dir)
                                 .map_err(|e| e.to_string())
                                 .and_then(|messages| {
                                     self.lake
                                         .write_partition(partition, channel, &messages)
                                         .map(|path| (path, messages.len()))
                                         .map_err(|e| format!("cannot write partition for '{channel}': {e}"))
                                 });
            match written {
                Ok((path, n)) => {
                    info!("saved {n} messages from '{channel}' to {}", path.display());
                    summary.channels_ok += 1;
                    summary.messages_written += n;
                    summary.files.push(path.display().to_string());
                }
                Err(reason) => {
                    error!("could not scrape channel '{channel}': {reason}");
                    summary.channels_failed += 1;
                }
            }
        }
        if summary.channels_ok == 0 && summary.channels_failed > 0 {
            return Err(StageError::failed(format!("all {} channels failed to scrape", summary.channels_failed)));
        }
        Ok(StageReport::from_serialize(&summary))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};
    use tele_domain::ScrapeError;

    use super::*;

    #[derive(Default)]
    struct CountingScraper {
        calls: AtomicUsize,
    }

    impl ChannelScraper for CountingScraper {
        fn scrape(&self, channel: &str, _limit: usize, _images_dir: &Path) -> Result<Vec<Value>, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![json!({ "id": 1, "channel": channel })])
        }
    }

    #[test]
    fn scraper_without_channels_is_a_misconfiguration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scraper = Arc::new(CountingScraper::default());
        let stage = ExtractStage::new(DataLake::new(dir.path()), vec![], 10, Some(scraper.clone()));

        let err = stage.run(&ExecutionContext::detached(RAW_FILES)).unwrap_err();

        assert!(matches!(err, StageError::Misconfigured(_)), "{err:?}");
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn each_channel_lands_in_the_run_partition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lake = DataLake::new(dir.path());
        let stage = ExtractStage::new(lake.clone(), vec!["a".into(), "b".into()], 10, Some(Arc::new(CountingScraper::default())));
        let ctx = ExecutionContext::detached(RAW_FILES);

        let report = stage.run(&ctx).expect("run");

        assert_eq!(report.summary["channels_ok"], 2);
        assert!(lake.partition_file(ctx.requested_at.date_naive(), "a").exists());
        assert!(lake.partition_file(ctx.requested_at.date_naive(), "b").exists());
    }
}
