//! HTML文字列から最初のテーブルを取り出す

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ScraperError;

use super::types::RawTable;

fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::Config(format!("セレクタ {}: {:?}", css, e)))
}

/// 最初の `<table>` を RawTable に変換する。テーブルが無ければ `None`。
///
/// ブラウザ側の抽出スクリプトと同じ規則で、thead があればその行のセルを
/// ヘッダー候補にし、tbody があればその行だけをデータ行とする。
pub fn parse_first_table(html: &str) -> Result<Option<RawTable>, ScraperError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let thead_sel = selector("thead")?;
    let tbody_sel = selector("tbody")?;
    let tr_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let Some(table) = document.select(&table_sel).next() else {
        return Ok(None);
    };

    let cells_of = |row: ElementRef<'_>| -> Vec<String> {
        row.select(&cell_sel).map(|cell| cell_text(&cell)).collect()
    };

    let explicit_headers = table.select(&thead_sel).next().map(|thead| {
        thead
            .select(&tr_sel)
            .flat_map(cells_of)
            .collect::<Vec<_>>()
    });

    let rows = match table.select(&tbody_sel).next() {
        Some(tbody) => tbody.select(&tr_sel).map(cells_of).collect(),
        None => table.select(&tr_sel).map(cells_of).collect(),
    };

    Ok(Some(RawTable {
        explicit_headers,
        rows,
    }))
}

/// 前後に改行が入る要素
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// ブロック境界の目印（連続しても改行1つにまとめる）
const BLOCK_BREAK: char = '\u{1}';

/// セル内テキスト（ブラウザの innerText 相当）
///
/// 連続する空白は1つに畳み、`<br>` とブロック要素の境界は改行にする。
fn cell_text(cell: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(*cell, &mut raw);

    let mut text = String::new();
    let mut line = String::new();
    let mut pending_break = false;
    for ch in raw.chars() {
        match ch {
            BLOCK_BREAK => {
                flush_line(&mut text, &mut line, &mut pending_break);
                pending_break = !text.is_empty();
            }
            '\n' => {
                flush_line(&mut text, &mut line, &mut pending_break);
                text.push('\n');
            }
            _ => line.push(ch),
        }
    }
    flush_line(&mut text, &mut line, &mut pending_break);

    text.trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_collapsed(out, text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                match name {
                    "br" => out.push('\n'),
                    "script" | "style" | "template" => {}
                    _ if BLOCK_ELEMENTS.contains(&name) => {
                        out.push(BLOCK_BREAK);
                        collect_text(child, out);
                        out.push(BLOCK_BREAK);
                    }
                    _ => collect_text(child, out),
                }
            }
            _ => {}
        }
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    let mut prev_space = out.ends_with(' ');
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
}

fn flush_line(text: &mut String, line: &mut String, pending_break: &mut bool) {
    let trimmed = line.trim();
    if !trimmed.is_empty() {
        if *pending_break && !text.ends_with('\n') {
            text.push('\n');
        }
        *pending_break = false;
        text.push_str(trimmed);
    }
    line.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_of(html: &str) -> crate::table::TableRecord {
        parse_first_table(html)
            .unwrap()
            .expect("table present")
            .into_record()
            .unwrap()
    }

    #[test]
    fn test_th_first_row_without_thead() {
        let record = record_of(
            "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>",
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"headers": ["A", "B"], "rows": [{"A": "1", "B": "2"}]})
        );
    }

    #[test]
    fn test_thead_keeps_every_body_row() {
        let record = record_of(
            r#"<table>
                 <thead><tr><th> Code </th><th>Name</th></tr></thead>
                 <tbody>
                   <tr><td>7203</td><td>Toyota</td></tr>
                   <tr><td>6758</td><td>Sony</td></tr>
                 </tbody>
               </table>"#,
        );
        assert_eq!(record.headers(), &["Code".to_string(), "Name".to_string()][..]);
        assert_eq!(record.len(), 2);
        assert_eq!(record.cell(1, "Name"), Some("Sony"));
    }

    #[test]
    fn test_short_row_gets_empty_cells() {
        let record = record_of(
            "<table><tr><td>A</td><td>B</td><td>C</td></tr><tr><td>1</td></tr></table>",
        );
        assert_eq!(record.cell(0, "A"), Some("1"));
        assert_eq!(record.cell(0, "B"), Some(""));
        assert_eq!(record.cell(0, "C"), Some(""));
    }

    #[test]
    fn test_only_first_table_is_used() {
        let record = record_of(
            "<table><tr><th>First</th></tr><tr><td>x</td></tr></table>\
             <table><tr><th>Second</th></tr></table>",
        );
        assert_eq!(record.headers(), &["First".to_string()][..]);
    }

    #[test]
    fn test_no_table_yields_none() {
        let raw = parse_first_table("<html><body><p>nothing here</p></body></html>").unwrap();
        assert!(raw.is_none());
    }

    #[test]
    fn test_line_breaks_follow_inner_text() {
        let record = record_of(
            "<table><tr><th>Note</th><th>Detail</th></tr>\
             <tr><td>x<br>y</td><td><div>foo</div><div>bar</div></td></tr>\
             <tr><td> <p>one</p> <p></p> <p>two</p> </td><td>a<br><br>b</td></tr></table>",
        );
        assert_eq!(record.cell(0, "Note"), Some("x\ny"));
        assert_eq!(record.cell(0, "Detail"), Some("foo\nbar"));
        assert_eq!(record.cell(1, "Note"), Some("one\ntwo"));
        assert_eq!(record.cell(1, "Detail"), Some("a\n\nb"));
    }

    #[test]
    fn test_cell_whitespace_is_collapsed() {
        let record = record_of(
            "<table><tr><th>Long\n   Header</th></tr><tr><td>  a  <b>b</b> </td></tr></table>",
        );
        assert_eq!(record.headers(), &["Long Header".to_string()][..]);
        assert_eq!(record.cell(0, "Long Header"), Some("a b"));
    }
}
