use std::fmt;

// ---------------------------------------------------------------------------
// Cell – a single value in a loaded column
// ---------------------------------------------------------------------------

/// A dynamically-typed table cell mirroring common Pandas dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::String(s) => write!(f, "{s}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Null => write!(f, "<null>"),
        }
    }
}

impl Cell {
    /// Interpret the value as an `f64` feature or target.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Integer(i) => Some(*i as f64),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Text form used for identifier columns such as `Sequence`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Guess the type of a textual cell (CSV input).
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Cell::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Cell::Float(f);
        }
        if s == "true" || s == "false" {
            return Cell::Bool(s == "true");
        }
        Cell::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Column / Frame – the loaded table before any modelling interpretation
// ---------------------------------------------------------------------------

/// One named column of cells.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// A rectangular table of named columns, in file order.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub columns: Vec<Column>,
}

impl Frame {
    /// Build a frame from row-oriented records sharing a header.
    ///
    /// Rows shorter than the header are padded with [`Cell::Null`].
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column {
                name,
                cells: Vec::with_capacity(rows.len()),
            })
            .collect();
        for row in rows {
            let mut row = row.into_iter();
            for col in &mut columns {
                col.cells.push(row.next().unwrap_or(Cell::Null));
            }
        }
        Frame { columns }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names in file order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}
