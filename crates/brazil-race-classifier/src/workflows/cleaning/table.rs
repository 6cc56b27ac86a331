use std::fmt;

/// Field values read as missing, on top of the empty field.
pub const NA_MARKERS: [&str; 6] = ["NA", "N/A", "NULL", "NaN", "nan", "#N/A"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() || NA_MARKERS.contains(&field) {
            Cell::Missing
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Text(value) => f.write_str(value),
            Cell::Int(value) => write!(f, "{value}"),
            Cell::Float(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 => {
                write!(f, "{value:.1}")
            }
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Bool(true) => f.write_str("True"),
            Cell::Bool(false) => f.write_str("False"),
        }
    }
}

/// Header plus rows; every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from columns of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<Cell>)>) -> Self {
        let height = columns.first().map(|(_, cells)| cells.len()).unwrap_or(0);
        let mut rows: Vec<Vec<Cell>> = (0..height)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        let mut names = Vec::with_capacity(columns.len());
        for (name, cells) in columns {
            names.push(name);
            let mut cells = cells.into_iter();
            for row in rows.iter_mut() {
                row.push(cells.next().unwrap_or(Cell::Missing));
            }
        }
        Self {
            columns: names,
            rows,
        }
    }

    /// Parses comma-separated text with a header row. Short rows are padded
    /// with missing cells; extra fields are dropped.
    pub fn from_csv_text(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<Cell> = record.iter().take(width).map(Cell::from_field).collect();
            row.resize(width, Cell::Missing);
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn to_csv_string(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(Cell::to_string))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
    }

    pub fn retain_rows<F>(&mut self, column: usize, mut keep: F)
    where
        F: FnMut(&Cell) -> bool,
    {
        self.rows.retain(|row| keep(&row[column]));
    }

    /// Appends `other` below `self`, aligning by column name. Columns only
    /// one side has are filled with missing cells on the other.
    pub fn append(&mut self, other: Table) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }

        for column in &other.columns {
            if self.column_index(column).is_none() {
                self.columns.push(column.clone());
                for row in self.rows.iter_mut() {
                    row.push(Cell::Missing);
                }
            }
        }

        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|column| other.column_index(column))
            .collect();
        for mut row in other.rows {
            let aligned = mapping
                .iter()
                .map(|source| match source {
                    Some(index) => std::mem::replace(&mut row[*index], Cell::Missing),
                    None => Cell::Missing,
                })
                .collect();
            self.rows.push(aligned);
        }
    }
}
