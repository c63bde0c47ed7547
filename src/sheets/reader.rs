use crate::error::ParseError;
use crate::models::Sheet;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use std::path::Path;

/// 读取一张表
///
/// - `.xlsx` / `.xls` / `.xlsm`：按名称取工作表，`sheet` 为空时取第一张
/// - `.csv`：整个文件即一张表
/// - 目录：读取目录下的 `<sheet>.csv`
///
/// `header_row` 为表头起始行 (0 起)，`header_depth` 为表头行数，多行表头逐列合并
pub fn read_table(
    path: &Path,
    sheet: Option<&str>,
    header_row: usize,
    header_depth: usize,
) -> Result<Sheet, ParseError> {
    let (name, grid) = read_grid(path, sheet)?;
    table_from_grid(name, grid, header_row, header_depth)
}

/// 读取原始单元格网格 (行号与源文件一致)
fn read_grid(path: &Path, sheet: Option<&str>) -> Result<(String, Vec<Vec<String>>), ParseError> {
    if path.is_dir() {
        let wanted = sheet.ok_or_else(|| {
            ParseError::UnsupportedFormat(format!("{} (directory needs a sheet name)", path.display()))
        })?;
        let file = path.join(format!("{}.csv", wanted));
        if !file.exists() {
            return Err(ParseError::MissingSheet(wanted.to_string()));
        }
        return Ok((wanted.to_string(), read_csv_grid(&file)?));
    }

    if !path.exists() {
        return Err(ParseError::FileNotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => {
            let name = sheet.map(|s| s.to_string()).unwrap_or_else(|| file_stem(path));
            Ok((name, read_csv_grid(path)?))
        }
        "xlsx" | "xls" | "xlsm" => read_excel_grid(path, sheet),
        _ => Err(ParseError::UnsupportedFormat(ext)),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sheet")
        .to_string()
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<String>>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // 允许行长度不一致
        .from_path(path)
        .map_err(|e| ParseError::Workbook(e.to_string()))?;

    let mut grid = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ParseError::Workbook(e.to_string()))?;
        grid.push(
            record
                .iter()
                .map(|v| v.trim_start_matches('\u{feff}').trim().to_string())
                .collect(),
        );
    }
    Ok(grid)
}

fn read_excel_grid(
    path: &Path,
    sheet: Option<&str>,
) -> Result<(String, Vec<Vec<String>>), ParseError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ParseError::Workbook(e.to_string()))?;

    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.trim() == wanted)
            .or_else(|| names.iter().find(|n| n.trim().eq_ignore_ascii_case(wanted)))
            .cloned()
            .ok_or_else(|| ParseError::MissingSheet(wanted.to_string()))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| ParseError::EmptySheet(path.display().to_string()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| ParseError::Workbook(e.to_string()))?;

    // Range 从第一个非空单元格开始，补齐前导行列以保持绝对行号
    let (row0, col0) = range.start().unwrap_or((0, 0));
    let mut grid: Vec<Vec<String>> = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); col0 as usize];
        cells.extend(row.iter().map(cell_to_string));
        grid.push(cells);
    }

    tracing::debug!("读取工作表 '{}': {} 行", name, grid.len());
    Ok((name, grid))
}

/// 单元格转字符串：整数型浮点去掉 `.0`，日期序列号转为 `YYYY-MM-DD`
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_to_string(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
    }
}

fn float_to_string(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Excel 日期序列号 (1900 日期系统)
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// 多行表头逐列合并：去重后的非空单元格以空格连接
pub fn combine_headers(rows: &[Vec<String>]) -> Vec<String> {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    (0..width)
        .map(|col| {
            let mut parts: Vec<&str> = Vec::new();
            for row in rows {
                let value = row.get(col).map(|s| s.trim()).unwrap_or("");
                if !value.is_empty() && !parts.contains(&value) {
                    parts.push(value);
                }
            }
            parts.join(" ")
        })
        .collect()
}

/// 网格 -> 表；表头之后的全空行跳过
pub fn table_from_grid(
    name: String,
    grid: Vec<Vec<String>>,
    header_row: usize,
    header_depth: usize,
) -> Result<Sheet, ParseError> {
    let depth = header_depth.max(1);
    if grid.len() < header_row + depth {
        return Err(ParseError::EmptySheet(name));
    }

    let headers = combine_headers(&grid[header_row..header_row + depth]);
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::EmptySheet(name));
    }
    let width = grid.iter().map(|r| r.len()).max().unwrap_or(0).max(headers.len());
    let mut headers = headers;
    headers.resize(width, String::new());

    let mut sheet = Sheet::new(name, headers);
    for mut row in grid.into_iter().skip(header_row + depth) {
        if row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        row.resize(width, String::new());
        sheet.push_row(row);
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, TempDir};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn csv_table_skips_blank_rows() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Bill Number,Units").unwrap();
        writeln!(file, "INV1, 5 ").unwrap();
        writeln!(file, ",").unwrap();
        writeln!(file, "INV2,3").unwrap();

        let sheet = read_table(file.path(), None, 0, 1).unwrap();
        assert_eq!(sheet.headers, vec!["Bill Number", "Units"]);
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.cell(0, 1), "5");
    }

    #[test]
    fn directory_reads_named_csv() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("merchant_data.csv"), "shop_name,merchant_name\nA,B\n")
            .unwrap();
        let sheet = read_table(dir.path(), Some("merchant_data"), 0, 1).unwrap();
        assert_eq!(sheet.name, "merchant_data");
        assert_eq!(sheet.len(), 1);

        let missing = read_table(dir.path(), Some("Product Details"), 0, 1);
        assert!(matches!(missing, Err(ParseError::MissingSheet(_))));
    }

    #[test]
    fn missing_file_and_bad_extension() {
        assert!(matches!(
            read_table(Path::new("nope.xlsx"), None, 0, 1),
            Err(ParseError::FileNotFound(_))
        ));
        let file = Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            read_table(file.path(), None, 0, 1),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn multi_row_headers_are_merged() {
        let grid = vec![
            row(&["Report"]),
            row(&["Invoice", "Invoice", "Retailer"]),
            row(&["Number", "Date", ""]),
            row(&["", "", "Name"]),
            row(&["I-1", "2024-01-02", "Shop"]),
        ];
        let sheet = table_from_grid("orders".into(), grid, 1, 3).unwrap();
        assert_eq!(
            sheet.headers,
            vec!["Invoice Number", "Invoice Date", "Retailer Name"]
        );
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn too_short_grid_is_empty_sheet() {
        let err = table_from_grid("x".into(), vec![row(&["a"])], 6, 3).unwrap_err();
        assert!(matches!(err, ParseError::EmptySheet(_)));
    }

    #[test]
    fn cell_rendering() {
        assert_eq!(cell_to_string(&Data::Float(12.0)), "12");
        assert_eq!(cell_to_string(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_to_string(&Data::String(" Vim ".into())), "Vim");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(
            excel_serial_to_date(45292.0),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }
}
