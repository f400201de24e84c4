// src/files/mod.rs
// Spreadsheet reading: validation, analysis, and text summaries.
//
// The conversation core never sees cell structure; it consumes only the
// text output of `summarize`/`extract_sheet`.

pub mod generate;

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};

use crate::config::server::UploadConfig;
use crate::error::{ExcellyError, ExcellyResult};

/// Rows shown per sheet in previews and summaries.
const PREVIEW_ROWS: usize = 5;
/// Hard cap on rows dumped by `extract_sheet`; beyond this the dump is
/// truncated with a notice. Keeps prompts bounded.
const EXTRACT_ROW_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetPreview {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    /// First rows rendered as strings, header first.
    pub preview: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub sheet_names: Vec<String>,
    pub sheets: Vec<SheetPreview>,
}

/// Reject bad uploads before touching the session.
pub fn validate_upload(config: &UploadConfig, filename: &str, size: usize) -> ExcellyResult<()> {
    if !config.extension_allowed(filename) {
        return Err(ExcellyError::validation(format!(
            "지원하지 않는 파일 형식입니다: {} (.xlsx, .xls, .csv만 가능합니다)",
            filename
        )));
    }
    if size > config.max_file_size {
        return Err(ExcellyError::validation(format!(
            "파일이 너무 큽니다: {}MB (최대 {}MB)",
            size / (1024 * 1024),
            config.max_file_size / (1024 * 1024)
        )));
    }
    if size == 0 {
        return Err(ExcellyError::validation("빈 파일입니다.".to_string()));
    }
    Ok(())
}

/// Sheet names plus a small preview per sheet.
pub fn analyze(bytes: &[u8], filename: &str) -> ExcellyResult<FileAnalysis> {
    let grids = read_grids(bytes, filename)?;
    let sheets: Vec<SheetPreview> = grids
        .into_iter()
        .map(|(name, grid)| {
            let rows = grid.len();
            let cols = grid.iter().map(Vec::len).max().unwrap_or(0);
            SheetPreview {
                name,
                rows,
                cols,
                preview: grid.into_iter().take(PREVIEW_ROWS).collect(),
            }
        })
        .collect();

    Ok(FileAnalysis {
        sheet_names: sheets.iter().map(|s| s.name.clone()).collect(),
        sheets,
    })
}

/// Text summary of the file (or one sheet of it) for prompting.
pub fn summarize(bytes: &[u8], filename: &str, sheet: Option<&str>) -> ExcellyResult<String> {
    let analysis = analyze(bytes, filename)?;
    let mut out = format!("파일: {}\n시트 수: {}\n", filename, analysis.sheet_names.len());

    for preview in &analysis.sheets {
        if let Some(wanted) = sheet {
            if preview.name != wanted {
                continue;
            }
        }
        out.push_str(&format!(
            "\n[시트: {}] {}행 x {}열\n",
            preview.name, preview.rows, preview.cols
        ));
        for row in &preview.preview {
            out.push_str(&row.join(" | "));
            out.push('\n');
        }
    }
    Ok(out)
}

/// Full text dump of one sheet for prompting, row-limited.
pub fn extract_sheet(bytes: &[u8], sheet_name: &str, filename: &str) -> ExcellyResult<String> {
    let grids = read_grids(bytes, filename)?;
    let (name, grid) = grids
        .into_iter()
        .find(|(name, _)| name == sheet_name)
        .ok_or_else(|| {
            ExcellyError::validation(format!("'{}' 시트를 찾을 수 없습니다.", sheet_name))
        })?;

    let total = grid.len();
    let mut out = format!("[시트: {}] {}행\n", name, total);
    for row in grid.iter().take(EXTRACT_ROW_LIMIT) {
        out.push_str(&row.join(" | "));
        out.push('\n');
    }
    if total > EXTRACT_ROW_LIMIT {
        out.push_str(&format!("... ({}행 중 {}행까지 표시)\n", total, EXTRACT_ROW_LIMIT));
    }
    Ok(out)
}

/// One-line-per-sheet overview for the "select a sheet" prompt.
pub fn sheet_overview(analysis: &FileAnalysis) -> String {
    analysis
        .sheets
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} ({}행 x {}열)", i + 1, s.name, s.rows, s.cols))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read all sheets into string grids. CSV is parsed as a single sheet;
/// everything else goes through calamine.
fn read_grids(bytes: &[u8], filename: &str) -> ExcellyResult<Vec<(String, Vec<Vec<String>>)>> {
    if filename.to_lowercase().ends_with(".csv") {
        return Ok(vec![("Sheet1".to_string(), parse_csv(bytes))]);
    }

    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| ExcellyError::parsing(format!("파일을 읽을 수 없습니다: {e}")))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(ExcellyError::parsing("시트가 없는 파일입니다.".to_string()));
    }

    let mut grids = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExcellyError::parsing(format!("'{}' 시트 읽기 실패: {e}", name)))?;
        let grid: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(render_cell).collect())
            .collect();
        grids.push((name, grid));
    }
    Ok(grids)
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Minimal CSV split: comma-separated, quotes respected, UTF-8 lossy.
fn parse_csv(bytes: &[u8]) -> Vec<Vec<String>> {
    let text = String::from_utf8_lossy(bytes);
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = Vec::new();
            let mut field = String::new();
            let mut in_quotes = false;
            for c in line.chars() {
                match c {
                    '"' => in_quotes = !in_quotes,
                    ',' if !in_quotes => {
                        fields.push(std::mem::take(&mut field));
                    }
                    _ => field.push(c),
                }
            }
            fields.push(field);
            fields
        })
        .collect()
}
