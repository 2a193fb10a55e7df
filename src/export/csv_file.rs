//! スナップショットJSON → CSV 変換

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::ScraperError;
use crate::snapshot::SnapshotStore;
use crate::table::TableRecord;

/// ヘッダー行 + データ行をヘッダー順で書き出し、データ行数を返す
pub fn write_csv(record: &TableRecord, csv_path: &Path) -> Result<usize, ScraperError> {
    if let Some(parent) = csv_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(csv_path)?;
    writer.write_record(record.headers())?;
    for row in record.rows() {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;

    info!("CSV出力完了: {:?} ({}行)", csv_path, record.len());
    Ok(record.len())
}

/// 保存済みスナップショットを読み直してCSVに変換
///
/// スナップショットが無い（またはテーブル無し）場合は None。
pub fn export_snapshot_csv(
    store: &SnapshotStore,
    csv_path: &Path,
) -> Result<Option<usize>, ScraperError> {
    match store.load()? {
        Some(record) => write_csv(&record, csv_path).map(Some),
        None => Ok(None),
    }
}
