//! テーブルデータモジュール
//!
//! 抽出結果の型 (TableRecord) と、ヘッダー推定・HTML解析

mod parse;
mod types;

pub use parse::parse_first_table;
pub use types::{RawTable, Row, TableRecord};
