use crate::error::Result;
use crate::models::{RunSummary, Sheet};
use crate::service::Workbook;
use csv::Writer;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "summary.json";

/// 输出文件名：表名中的路径分隔符替换为 `_`
pub fn sheet_file_name(sheet: &str) -> String {
    let safe: String = sheet
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{}.csv", safe)
}

pub fn write_sheet(sheet: &Sheet, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(sheet_file_name(&sheet.name));
    let mut writer = Writer::from_path(&path)?;
    writer.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// 写出工作簿：每张表一个 CSV，外加 summary.json
pub fn write_workbook(workbook: &Workbook, summary: &RunSummary, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(workbook.sheets.len() + 1);
    for sheet in &workbook.sheets {
        written.push(write_sheet(sheet, dir)?);
    }

    let summary_path = dir.join(SUMMARY_FILE);
    let file = BufWriter::new(File::create(&summary_path)?);
    serde_json::to_writer_pretty(file, summary)?;
    written.push(summary_path);

    tracing::info!("输出 {} 个文件到 {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_each_sheet_and_summary() {
        let dir = TempDir::new().unwrap();
        let mut sheet = Sheet::new("Error Rows", vec!["order_id".into(), "error_message".into()]);
        sheet.push_row(vec!["INV-1".into(), "Merchant not matched, Merchant match 95%".into()]);
        let workbook = Workbook {
            sheets: vec![sheet],
        };

        let files = write_workbook(&workbook, &RunSummary::default(), dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let text = fs::read_to_string(dir.path().join("Error Rows.csv")).unwrap();
        assert!(text.starts_with("order_id,error_message"));
        assert!(text.contains("\"Merchant not matched, Merchant match 95%\""));
        assert!(dir.path().join(SUMMARY_FILE).exists());
    }

    #[test]
    fn file_names_are_path_safe() {
        assert_eq!(sheet_file_name("a/b"), "a_b.csv");
        assert_eq!(sheet_file_name("Sale Order Demo 2"), "Sale Order Demo 2.csv");
    }
}
