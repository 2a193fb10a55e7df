//! 抽出 → 差分判定 → 保存・インデックス → CSV/Sheets 出力 の一連の処理

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::export::{export_snapshot_csv, sheet_rows};
use crate::index::{documents_from_table, VectorIndex};
use crate::snapshot::{changed, SnapshotStore};
use crate::table::TableRecord;
use crate::traits::{Embedder, RowSink, TableExtractor};

/// 1回の実行結果
#[derive(Debug)]
pub struct RunReport {
    pub url: String,
    pub record: Option<TableRecord>,
    pub changed: bool,
    pub snapshot_written: bool,
    pub indexed_documents: usize,
    /// CSVを書き出した場合のパス
    pub csv_path: Option<PathBuf>,
    pub appended_rows: usize,
    /// 変化があった場合に作り直したインデックス
    pub index: Option<VectorIndex>,
}

pub struct Pipeline {
    extractor: Arc<dyn TableExtractor>,
    store: SnapshotStore,
    csv_path: PathBuf,
    sink: Option<Box<dyn RowSink>>,
    embedder: Option<Box<dyn Embedder>>,
}

impl Pipeline {
    pub fn new(config: &ScraperConfig, extractor: Arc<dyn TableExtractor>) -> Self {
        Self {
            extractor,
            store: SnapshotStore::new(&config.snapshot_path),
            csv_path: config.csv_path.clone(),
            sink: None,
            embedder: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn RowSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// 差分検出から出力まで一括で実行
    pub async fn run(&self, url: &str) -> Result<RunReport, ScraperError> {
        let mut report = self.detect(url).await?;
        self.export(&mut report).await?;
        Ok(report)
    }

    /// 抽出・差分判定・保存・インデックス作成（出力はしない）
    pub async fn detect(&self, url: &str) -> Result<RunReport, ScraperError> {
        let record = self.extractor.extract(url).await?;

        let mut report = RunReport {
            url: url.to_string(),
            record: None,
            changed: false,
            snapshot_written: false,
            indexed_documents: 0,
            csv_path: None,
            appended_rows: 0,
            index: None,
        };

        match &record {
            Some(record) => {
                let previous = self.store.load()?;
                report.changed = changed(record, previous.as_ref());

                if report.changed {
                    info!("The table data has changed!");
                    self.store.save(record)?;
                    report.snapshot_written = true;

                    if let Some(embedder) = &self.embedder {
                        let documents = documents_from_table(record);
                        let index =
                            VectorIndex::from_documents(documents, embedder.as_ref()).await?;
                        report.indexed_documents = index.len();
                        report.index = Some(index);
                    }
                } else {
                    info!("No changes in the table data.");
                }
            }
            None => warn!("テーブルが無いため差分判定をスキップ: {}", url),
        }
        report.record = record;
        Ok(report)
    }

    /// 保存済みスナップショットを読み直して CSV / Sheets に出力
    pub async fn export(&self, report: &mut RunReport) -> Result<(), ScraperError> {
        if export_snapshot_csv(&self.store, &self.csv_path)?.is_none() {
            warn!("スナップショットが無いため出力をスキップ");
            return Ok(());
        }
        report.csv_path = Some(self.csv_path.clone());

        if let Some(sink) = &self.sink {
            if let Some(snapshot) = self.store.load()? {
                report.appended_rows = sink.append_rows(sheet_rows(&snapshot)).await?;
            }
        }
        Ok(())
    }
}
