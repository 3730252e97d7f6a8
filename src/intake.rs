//! upload intake - parse spreadsheet bytes into a raw table and check the schema
//!
//! the expected sheet layout is one header row followed by one row per loan
//! operation. both `.xlsx` (first sheet) and `.csv` uploads are accepted.
//! schema problems are reported here, before any model fitting starts, so a
//! misnamed column turns into a typed error instead of a failure halfway
//! through feature encoding.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};
use tracing::debug;

use crate::error::{Result, SurvivalError};

/// Columns every upload must carry. `NoOperacion` is an identifier and is
/// never used as a predictor.
pub const EXPECTED_COLUMNS: [&str; 7] = [
    "NoOperacion",
    "PorcentajeDesembolsado",
    "Meses",
    "Años",
    "Sector",
    "SubSectorNombre",
    "Pais",
];

/// Upload format, decided from the uploaded filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xlsx,
    Csv,
}

impl FileFormat {
    /// guess the format from a filename extension
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// one parsed spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    /// numeric view of the cell. text cells are re-parsed, so a column that
    /// arrives as strings ("12.5") still coerces; anything unparseable is None.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty => None,
        }
    }

    /// categorical view of the cell. empty cells have no label.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Empty => None,
        }
    }

    /// how the cell shows up in the preview table
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::Empty => String::new(),
        }
    }
}

/// render a float the way a spreadsheet user wrote it - integers without the
/// trailing ".0"
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Raw record table: one row per loan operation, exactly as uploaded.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// parse uploaded bytes into a table
    pub fn parse(bytes: &[u8], format: FileFormat) -> Result<Self> {
        let mut table = match format {
            FileFormat::Xlsx => Self::parse_xlsx(bytes)?,
            FileFormat::Csv => Self::parse_csv(bytes)?,
        };
        // normalize ragged rows so column access can index directly
        let width = table.headers.len();
        for row in &mut table.rows {
            row.resize(width, Cell::Empty);
        }
        debug!(
            rows = table.n_rows(),
            columns = width,
            "parsed uploaded table"
        );
        Ok(table)
    }

    fn parse_xlsx(bytes: &[u8]) -> Result<Self> {
        let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| SurvivalError::parse(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SurvivalError::parse("workbook contains no sheets"))?
            .map_err(|e| SurvivalError::parse(e.to_string()))?;

        let mut rows_iter = range.rows();
        let headers = match rows_iter.next() {
            Some(row) => row.iter().map(|c| convert_cell(c).display()).collect(),
            None => return Err(SurvivalError::parse("sheet is empty, no header row")),
        };

        let rows = rows_iter
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();

        Ok(Self { headers, rows })
    }

    fn parse_csv(bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| SurvivalError::parse(e.to_string()))?
            .iter()
            .map(String::from)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| SurvivalError::parse(e.to_string()))?;
            rows.push(record.iter().map(parse_csv_field).collect());
        }

        Ok(Self { headers, rows })
    }

    /// check that all expected columns are present; call once at intake
    pub fn check_schema(&self) -> Result<()> {
        for column in EXPECTED_COLUMNS {
            if self.column_index(column).is_none() {
                return Err(SurvivalError::missing_column(column));
            }
        }
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// first `n` rows, for the preview table
    pub fn head(&self, n: usize) -> &[Vec<Cell>] {
        &self.rows[..self.rows.len().min(n)]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// all cells of a named column, top to bottom
    pub fn column(&self, name: &str) -> Result<Vec<&Cell>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| SurvivalError::missing_column(name))?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::Error(_) => Cell::Empty,
        other => match other.as_f64() {
            Some(f) => Cell::Number(f),
            None => Cell::Text(other.to_string()),
        },
    }
}

fn parse_csv_field(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Empty;
    }
    match field.parse::<f64>() {
        Ok(n) => Cell::Number(n),
        Err(_) => Cell::Text(field.to_string()),
    }
}
