use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use super::errors::{DomainError, DomainResult};
use super::value::Value;

/// Column letters allowed in a coordinate (`A` through `ZZZ`).
const MAX_COLUMN_LETTERS: usize = 3;

/// Highest row number a coordinate may name.
pub const MAX_ROWS: usize = 1_048_576;

/// Zero-based grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn column_label(col: usize) -> String {
        let mut result = String::new();
        let mut c = col;
        loop {
            result.insert(0, char::from(b'A' + (c % 26) as u8));
            if c < 26 {
                break;
            }
            c = c / 26 - 1;
        }
        result
    }

    /// Parses an `A1`-style coordinate, case-insensitively.
    pub fn parse(coord: &str) -> Option<Self> {
        let split = coord.find(|c: char| !c.is_ascii_alphabetic())?;
        let (letters, digits) = coord.split_at(split);

        if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
            return None;
        }
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let col = Self::column_str_to_index(letters)?;
        let row = digits.parse::<usize>().ok().filter(|&r| r <= MAX_ROWS)?.checked_sub(1)?;
        Some(Self { row, col })
    }

    fn column_str_to_index(col_str: &str) -> Option<usize> {
        let mut result = 0usize;
        for ch in col_str.chars() {
            if !ch.is_ascii_alphabetic() {
                return None;
            }
            let digit = ch.to_ascii_uppercase() as usize - 'A' as usize + 1;
            result = result * 26 + digit;
        }
        result.checked_sub(1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_label(self.col), self.row + 1)
    }
}

/// A sheet-qualified cell, written `Sheet!A1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub sheet: String,
    pub address: CellAddress,
}

impl CellRef {
    pub fn new(sheet: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            sheet: sheet.into(),
            address: CellAddress::new(row, col),
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.address)
    }
}

impl FromStr for CellRef {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        let (sheet, coord) = s
            .rsplit_once('!')
            .ok_or_else(|| DomainError::InvalidCellReference(s.to_string()))?;
        let address = CellAddress::parse(coord)
            .ok_or_else(|| DomainError::InvalidCellReference(s.to_string()))?;
        if sheet.is_empty() {
            return Err(DomainError::InvalidCellReference(s.to_string()));
        }
        Ok(Self {
            sheet: sheet.to_string(),
            address,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    pub value: String,
    pub formula: Option<String>,
}

impl CellData {
    /// The text the user typed: the formula if there is one, else the value.
    pub fn input(&self) -> &str {
        self.formula.as_deref().unwrap_or(&self.value)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(serialize_with = "serialize_cells", deserialize_with = "deserialize_cells")]
    pub cells: HashMap<(usize, usize), CellData>,
    pub rows: usize,
    pub cols: usize,
    pub column_widths: HashMap<usize, usize>,
    pub default_column_width: usize,
    #[serde(skip)]
    computed: HashMap<(usize, usize), Value>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: usize, cols: usize, default_column_width: usize) -> Self {
        Self {
            name: name.into(),
            cells: HashMap::new(),
            rows,
            cols,
            column_widths: HashMap::new(),
            default_column_width,
            computed: HashMap::new(),
        }
    }

    pub fn get_cell(&self, row: usize, col: usize) -> CellData {
        self.cells.get(&(row, col)).cloned().unwrap_or_default()
    }

    pub fn set_cell(&mut self, row: usize, col: usize, data: CellData) {
        let content_width = data
            .value
            .len()
            .max(data.formula.as_ref().map(|f| f.len()).unwrap_or(0));
        self.cells.insert((row, col), data);
        self.rows = self.rows.max(row + 1);
        self.cols = self.cols.max(col + 1);

        let current_width = self.get_column_width(col);
        let header_width = CellAddress::column_label(col).len();
        let needed_width = content_width.max(header_width).clamp(3, 50);
        if needed_width > current_width {
            self.set_column_width(col, needed_width);
        }
    }

    pub fn clear_cell(&mut self, row: usize, col: usize) -> Option<CellData> {
        self.computed.remove(&(row, col));
        self.cells.remove(&(row, col))
    }

    /// Value as seen by formulas: the cached result for formula cells,
    /// the classified literal otherwise.
    pub fn value_at(&self, row: usize, col: usize) -> Value {
        match self.cells.get(&(row, col)) {
            None => Value::Empty,
            Some(cell) if cell.formula.is_some() => {
                self.computed.get(&(row, col)).cloned().unwrap_or_default()
            }
            Some(cell) => Value::from_input(&cell.value),
        }
    }

    pub(crate) fn store_computed(&mut self, row: usize, col: usize, value: Value, places: i64) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.value = value.display(places);
        }
        self.computed.insert((row, col), value);
    }

    /// Bounds of the used area as (rows, cols), or `None` for an empty sheet.
    pub fn used_extent(&self) -> Option<(usize, usize)> {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(&(row, col), _)| (row + 1, col + 1))
            .reduce(|a, b| (a.0.max(b.0), a.1.max(b.1)))
    }

    pub fn formula_cells(&self) -> impl Iterator<Item = (CellAddress, &str)> {
        self.cells.iter().filter_map(|(&(row, col), cell)| {
            cell.formula
                .as_deref()
                .map(|formula| (CellAddress::new(row, col), formula))
        })
    }

    pub fn get_column_width(&self, col: usize) -> usize {
        self.column_widths.get(&col).copied().unwrap_or(self.default_column_width)
    }

    pub fn set_column_width(&mut self, col: usize, width: usize) {
        self.column_widths.insert(col, width);
    }

    pub fn auto_resize_column(&mut self, col: usize) {
        let current_width = self.get_column_width(col);
        let mut max_width = CellAddress::column_label(col).len().max(current_width);

        for (&(_, c), cell) in &self.cells {
            if c != col {
                continue;
            }
            let formula_width = cell.formula.as_ref().map(|f| f.len()).unwrap_or(0);
            max_width = max_width.max(cell.value.len().max(formula_width));
        }

        let max_width = max_width.clamp(3, 50);
        if max_width > current_width {
            self.set_column_width(col, max_width);
        }
    }

    pub fn auto_resize_all_columns(&mut self) {
        for col in 0..self.cols {
            self.auto_resize_column(col);
        }
    }
}

/// An ordered collection of uniquely named sheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self {
            sheets: vec![Sheet::new("Sheet1", 100, 26, 8)],
        }
    }
}

impl Workbook {
    pub fn with_sheet(sheet: Sheet) -> Self {
        Self { sheets: vec![sheet] }
    }

    /// Builds a workbook through [`Workbook::add_sheet`], so every name is
    /// checked. No sheets gives the default workbook.
    pub fn from_sheets(sheets: Vec<Sheet>) -> DomainResult<Self> {
        if sheets.is_empty() {
            return Ok(Self::default());
        }
        let mut workbook = Self { sheets: Vec::with_capacity(sheets.len()) };
        for sheet in sheets {
            workbook.add_sheet(sheet)?;
        }
        Ok(workbook)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Appends a sheet, returning its index.
    pub fn add_sheet(&mut self, sheet: Sheet) -> DomainResult<usize> {
        let name = sheet.name.trim();
        if name.is_empty() || name.contains('!') || name.contains('\'') {
            return Err(DomainError::InvalidSheetName(sheet.name.clone()));
        }
        if self.sheet(&sheet.name).is_some() {
            return Err(DomainError::InvalidSheetName(format!(
                "{} already exists",
                sheet.name
            )));
        }
        self.sheets.push(sheet);
        Ok(self.sheets.len() - 1)
    }

    pub fn get_cell(&self, cell: &CellRef) -> Option<CellData> {
        self.sheet(&cell.sheet)
            .map(|s| s.get_cell(cell.address.row, cell.address.col))
    }

    /// Value of a cell as seen by formulas. Unknown sheets yield `#REF!`.
    pub fn value_at(&self, cell: &CellRef) -> Value {
        match self.sheet(&cell.sheet) {
            Some(sheet) => sheet.value_at(cell.address.row, cell.address.col),
            None => Value::Error(super::value::CellError::Ref),
        }
    }
}

fn serialize_cells<S>(cells: &HashMap<(usize, usize), CellData>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut entries: Vec<_> = cells.iter().collect();
    entries.sort_by_key(|(key, _)| **key);

    let mut seq = serializer.serialize_seq(Some(entries.len()))?;
    for (key, value) in entries {
        seq.serialize_element(&(key.0, key.1, value))?;
    }
    seq.end()
}

fn deserialize_cells<'de, D>(deserializer: D) -> Result<HashMap<(usize, usize), CellData>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};

    struct CellsVisitor;

    impl<'de> Visitor<'de> for CellsVisitor {
        type Value = HashMap<(usize, usize), CellData>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of cell data")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut cells = HashMap::new();
            while let Some((row, col, data)) = seq.next_element::<(usize, usize, CellData)>()? {
                cells.insert((row, col), data);
            }
            Ok(cells)
        }
    }

    deserializer.deserialize_seq(CellsVisitor)
}
