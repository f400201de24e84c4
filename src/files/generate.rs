// src/files/generate.rs
// Output workbook generation: original data plus an analysis sheet

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExcellyError, ExcellyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub file_id: String,
    pub download_path: String,
}

/// Writes result workbooks into one output directory, addressed by a
/// generated file id.
pub struct FileGenerator {
    output_dir: PathBuf,
}

impl FileGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> ExcellyResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Build the output workbook: the selected sheet's data (when the
    /// original is readable) plus an "AI 분석" sheet carrying the answer.
    pub fn generate(
        &self,
        original_bytes: &[u8],
        original_filename: &str,
        answer_text: &str,
        selected_sheet: Option<&str>,
    ) -> ExcellyResult<GeneratedFile> {
        let mut workbook = Workbook::new();

        let sheet_text = selected_sheet
            .map(|sheet| super::extract_sheet(original_bytes, sheet, original_filename))
            .transpose()?;

        if let Some(sheet_text) = sheet_text {
            let worksheet = workbook
                .add_worksheet()
                .set_name(selected_sheet.unwrap_or("데이터"))
                .map_err(|e| ExcellyError::parsing(format!("시트 생성 실패: {e}")))?;
            // First line of the dump is the sheet header, skip it.
            for (row_idx, line) in sheet_text.lines().skip(1).enumerate() {
                for (col_idx, value) in line.split(" | ").enumerate() {
                    worksheet
                        .write_string(row_idx as u32, col_idx as u16, value)
                        .map_err(|e| ExcellyError::parsing(format!("셀 쓰기 실패: {e}")))?;
                }
            }
        }

        let analysis = workbook
            .add_worksheet()
            .set_name("AI 분석")
            .map_err(|e| ExcellyError::parsing(format!("시트 생성 실패: {e}")))?;

        let title_format = Format::new().set_bold();
        analysis
            .write_string_with_format(0, 0, "AI 분석 결과", &title_format)
            .map_err(|e| ExcellyError::parsing(format!("셀 쓰기 실패: {e}")))?;
        for (i, line) in answer_text.lines().enumerate() {
            analysis
                .write_string(i as u32 + 2, 0, line)
                .map_err(|e| ExcellyError::parsing(format!("셀 쓰기 실패: {e}")))?;
        }

        let file_id = uuid::Uuid::new_v4().to_string();
        let path = self.output_dir.join(format!("{file_id}.xlsx"));
        workbook
            .save(&path)
            .map_err(|e| ExcellyError::parsing(format!("파일 저장 실패: {e}")))?;

        info!(file_id = %file_id, "generated output workbook");
        Ok(GeneratedFile {
            download_path: format!("/api/chat/download/{file_id}"),
            file_id,
        })
    }

    /// Resolve a file id to its on-disk path. Ids are validated as
    /// UUIDs so a crafted id cannot escape the output directory.
    pub fn resolve(&self, file_id: &str) -> Option<PathBuf> {
        uuid::Uuid::parse_str(file_id).ok()?;
        let path = self.output_dir.join(format!("{file_id}.xlsx"));
        path.exists().then_some(path)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileGenerator::new(dir.path()).unwrap();

        let csv = b"name,amount\nkim,100\n";
        let file = generator
            .generate(csv, "sales.csv", "합계는 100입니다.", Some("Sheet1"))
            .unwrap();

        assert!(file.download_path.ends_with(&file.file_id));
        let path = generator.resolve(&file.file_id).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_resolve_rejects_non_uuid_ids() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileGenerator::new(dir.path()).unwrap();
        assert!(generator.resolve("../../etc/passwd").is_none());
        assert!(generator.resolve("not-a-uuid").is_none());
    }

    #[test]
    fn test_generate_without_selected_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FileGenerator::new(dir.path()).unwrap();
        let file = generator.generate(b"", "x.csv", "답변", None).unwrap();
        assert!(generator.resolve(&file.file_id).is_some());
    }
}
