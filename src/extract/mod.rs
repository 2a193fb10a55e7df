//! テーブル抽出モジュール
//!
//! - BrowserExtractor: ヘッドレスChromeでページを描画してから抽出
//! - HttpExtractor: 静的HTMLを取得して抽出

mod browser;
mod http;

pub use browser::BrowserExtractor;
pub use http::HttpExtractor;
