//! テーブル関連の型定義

use std::collections::{HashMap, HashSet};

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ScraperError;

/// 抽出済みテーブル（ヘッダー + 行）
///
/// 各行はヘッダーと同じ数のセルを位置で対応付けて保持する。
/// JSON では `{"headers": [...], "rows": [{"ヘッダー": "値", ...}, ...]}` の形になる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "TableRecordWire")]
pub struct TableRecord {
    headers: Vec<String>,
    rows: Vec<Row>,
}

/// 1行分のセル（ヘッダー順）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    cells: Vec<String>,
}

impl Row {
    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

impl TableRecord {
    /// 位置指定のセル列から構築する
    ///
    /// ヘッダー名の重複、ヘッダー数を超える行はエラー。短い行は空文字で埋める。
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, ScraperError> {
        check_unique(&headers)?;

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut cells)| {
                if cells.len() > headers.len() {
                    return Err(ScraperError::InvalidRecord(format!(
                        "{}行目のセル数({})がヘッダー数({})を超えています",
                        i + 1,
                        cells.len(),
                        headers.len()
                    )));
                }
                cells.resize(headers.len(), String::new());
                Ok(Row { cells })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers, rows })
    }

    /// ヘッダー名をキーにしたマップ列から構築する（欠けたセルは空文字）
    pub fn from_maps(
        headers: Vec<String>,
        rows: Vec<HashMap<String, String>>,
    ) -> Result<Self, ScraperError> {
        check_unique(&headers)?;

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut map)| {
                let cells: Vec<String> = headers
                    .iter()
                    .map(|h| map.remove(h).unwrap_or_default())
                    .collect();
                if let Some(unknown) = map.keys().next() {
                    return Err(ScraperError::InvalidRecord(format!(
                        "{}行目に未知の列があります: {}",
                        i + 1,
                        unknown
                    )));
                }
                Ok(Row { cells })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 指定行・指定ヘッダーのセル
    pub fn cell(&self, row: usize, header: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == header)?;
        self.rows.get(row).map(|r| r.cells[col].as_str())
    }

    /// 行を (ヘッダー, 値) の組で列挙する
    pub fn entries<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.headers
            .iter()
            .zip(row.cells.iter())
            .map(|(h, c)| (h.as_str(), c.as_str()))
    }
}

fn check_unique(headers: &[String]) -> Result<(), ScraperError> {
    let mut seen = HashSet::new();
    for h in headers {
        if !seen.insert(h.as_str()) {
            return Err(ScraperError::InvalidRecord(format!(
                "ヘッダー名が重複しています: {}",
                h
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct TableRecordWire {
    headers: Vec<String>,
    rows: Vec<HashMap<String, String>>,
}

impl TryFrom<TableRecordWire> for TableRecord {
    type Error = ScraperError;

    fn try_from(wire: TableRecordWire) -> Result<Self, Self::Error> {
        TableRecord::from_maps(wire.headers, wire.rows)
    }
}

impl Serialize for TableRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TableRecord", 2)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field(
            "rows",
            &RowsView {
                headers: &self.headers,
                rows: &self.rows,
            },
        )?;
        state.end()
    }
}

struct RowsView<'a> {
    headers: &'a [String],
    rows: &'a [Row],
}

impl Serialize for RowsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.iter().map(|row| RowView {
            headers: self.headers,
            row,
        }))
    }
}

struct RowView<'a> {
    headers: &'a [String],
    row: &'a Row,
}

// キーはヘッダー順で書き出す
impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (h, c) in self.headers.iter().zip(self.row.cells.iter()) {
            map.serialize_entry(h, c)?;
        }
        map.end()
    }
}

/// ヘッダー推定前の生テーブル
///
/// `explicit_headers` は thead がある場合のみ `Some`。
/// `rows` は tbody があればその行、なければテーブル内の全行。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub explicit_headers: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// ヘッダーを推定して TableRecord に変換
    ///
    /// thead が無い場合は先頭行をヘッダーとし、データ行からは除外する。
    pub fn into_record(self) -> Result<TableRecord, ScraperError> {
        let (headers, data_rows) = match self.explicit_headers {
            Some(headers) => (headers, self.rows),
            None => {
                let mut rows = self.rows;
                match rows.first() {
                    Some(first) if !first.is_empty() => {
                        let headers = rows.remove(0);
                        (headers, rows)
                    }
                    _ => (Vec::new(), rows),
                }
            }
        };

        let headers = dedupe_headers(headers);
        let width = headers.len();
        let rows = data_rows
            .into_iter()
            .map(|mut cells| {
                cells.truncate(width);
                cells
            })
            .collect();

        TableRecord::new(headers, rows)
    }
}

/// 重複したヘッダー名に " (2)", " (3)" ... を付けて一意にする
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .map(|h| {
            if seen.insert(h.clone()) {
                return h;
            }
            let mut n = 2;
            loop {
                let candidate = format!("{} ({})", h, n);
                if seen.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_explicit_headers_keep_all_body_rows() {
        let raw = RawTable {
            explicit_headers: Some(s(&["Name", "Price"])),
            rows: vec![s(&["Apple", "100"]), s(&["Banana", "80"])],
        };
        let record = raw.into_record().unwrap();

        assert_eq!(record.headers(), &s(&["Name", "Price"])[..]);
        assert_eq!(record.len(), 2);
        assert_eq!(record.cell(0, "Name"), Some("Apple"));
        assert_eq!(record.cell(1, "Price"), Some("80"));
    }

    #[test]
    fn test_first_row_becomes_headers() {
        let raw = RawTable {
            explicit_headers: None,
            rows: vec![s(&["A", "B"]), s(&["1", "2"])],
        };
        let record = raw.into_record().unwrap();

        assert_eq!(record.headers(), &s(&["A", "B"])[..]);
        assert_eq!(record.len(), 1);
        assert_eq!(record.rows()[0].cells(), &s(&["1", "2"])[..]);
    }

    #[test]
    fn test_empty_first_row_is_not_consumed() {
        let raw = RawTable {
            explicit_headers: None,
            rows: vec![vec![], s(&["1"])],
        };
        let record = raw.into_record().unwrap();

        assert!(record.headers().is_empty());
        assert_eq!(record.len(), 2);
        assert!(record.rows().iter().all(|r| r.cells().is_empty()));
    }

    #[test]
    fn test_short_rows_are_padded_and_long_rows_truncated() {
        let raw = RawTable {
            explicit_headers: Some(s(&["A", "B", "C"])),
            rows: vec![s(&["1"]), s(&["1", "2", "3", "4"])],
        };
        let record = raw.into_record().unwrap();

        assert_eq!(record.rows()[0].cells(), &s(&["1", "", ""])[..]);
        assert_eq!(record.rows()[1].cells(), &s(&["1", "2", "3"])[..]);
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let raw = RawTable {
            explicit_headers: Some(s(&["Date", "Value", "Value", "Value (2)"])),
            rows: vec![],
        };
        let record = raw.into_record().unwrap();
        assert_eq!(
            record.headers(),
            &s(&["Date", "Value", "Value (2)", "Value (2) (2)"])[..]
        );
    }

    #[test]
    fn test_new_rejects_duplicate_headers_and_wide_rows() {
        assert!(TableRecord::new(s(&["A", "A"]), vec![]).is_err());
        assert!(TableRecord::new(s(&["A"]), vec![s(&["1", "2"])]).is_err());
    }

    #[test]
    fn test_json_shape_keeps_header_order() {
        let record = TableRecord::new(s(&["Zeta", "Alpha"]), vec![s(&["z", "a"])]).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"headers":["Zeta","Alpha"],"rows":[{"Zeta":"z","Alpha":"a"}]}"#
        );
    }

    #[test]
    fn test_deserialize_fills_missing_cells() {
        let record: TableRecord =
            serde_json::from_str(r#"{"headers":["A","B"],"rows":[{"A":"1"}]}"#).unwrap();
        assert_eq!(record.cell(0, "B"), Some(""));
    }

    #[test]
    fn test_deserialize_rejects_unknown_columns() {
        let result: Result<TableRecord, _> =
            serde_json::from_str(r#"{"headers":["A"],"rows":[{"A":"1","C":"3"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_entries_pairs_headers_with_cells() {
        let record = TableRecord::new(s(&["A", "B"]), vec![s(&["1", "2"])]).unwrap();
        let pairs: Vec<_> = record.entries(&record.rows()[0]).collect();
        assert_eq!(pairs, vec![("A", "1"), ("B", "2")]);
    }
}
