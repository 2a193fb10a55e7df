//! スナップショット（前回の抽出結果）の保存・読み込みと差分判定

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ScraperError;
use crate::table::TableRecord;

/// 前回の抽出結果と比べて変化があるか
///
/// 前回の結果が無い（初回実行）場合は常に true。
pub fn changed(new: &TableRecord, old: Option<&TableRecord>) -> bool {
    match old {
        None => true,
        Some(old) => new != old,
    }
}

/// JSONファイルに保存されたスナップショット
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ファイルが無ければ None。壊れたJSONはエラーにする。
    ///
    /// 中身が `null` のファイル（テーブル無しで保存されたもの）も None として扱う。
    pub fn load(&self) -> Result<Option<TableRecord>, ScraperError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("スナップショットなし: {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice::<Option<TableRecord>>(&content).map_err(|source| {
            ScraperError::CorruptSnapshot {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// 一時ファイルに書いてからリネームで置き換える
    pub fn save(&self, record: &TableRecord) -> Result<(), ScraperError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&to_pretty_json(record)?)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        info!("Table data saved to {}", self.path.display());
        Ok(())
    }
}

/// インデント4スペースの整形JSON（非ASCII文字はそのまま）
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ScraperError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableRecord {
        TableRecord::new(
            vec!["銘柄".to_string(), "終値".to_string()],
            vec![
                vec!["トヨタ".to_string(), "2,870".to_string()],
                vec!["ソニー".to_string()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_changed_is_reflexive_false() {
        let record = sample();
        assert!(!changed(&record, Some(&record.clone())));
    }

    #[test]
    fn test_changed_without_previous() {
        assert!(changed(&sample(), None));
        assert!(changed(&TableRecord::default(), None));
    }

    #[test]
    fn test_changed_detects_row_order() {
        let a = TableRecord::new(
            vec!["A".to_string()],
            vec![vec!["1".to_string()], vec!["2".to_string()]],
        )
        .unwrap();
        let b = TableRecord::new(
            vec!["A".to_string()],
            vec![vec!["2".to_string()], vec!["1".to_string()]],
        )
        .unwrap();
        assert!(changed(&a, Some(&b)));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested/table_data.json"));
        let record = sample();

        store.save(&record).unwrap();
        assert_eq!(store.load().unwrap(), Some(record));
    }

    #[test]
    fn test_saved_file_is_pretty_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("table_data.json"));
        store.save(&sample()).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\"トヨタ\""));
        assert!(content.contains("\n    \"headers\": ["));
        // 行のキーはヘッダー順
        let pos_name = content.find("\"銘柄\": \"トヨタ\"").unwrap();
        let pos_price = content.find("\"終値\": \"2,870\"").unwrap();
        assert!(pos_name < pos_price);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_null_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table_data.json");
        fs::write(&path, "null").unwrap();
        assert!(SnapshotStore::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table_data.json");
        fs::write(&path, "{\"headers\": [").unwrap();

        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ScraperError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_non_utf8_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table_data.json");
        fs::write(&path, [0xff, 0xfe, b'{', 0x80]).unwrap();

        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ScraperError::CorruptSnapshot { .. }));
    }
}
