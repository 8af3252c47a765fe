use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Cell, Frame};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a peptide feature table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – flat Parquet file, one scalar column per feature
/// * `.json`    – `[{ "Sequence": "...", "Fraction": 3, ...features }, ...]`
/// * `.csv`     – header row with column names
pub fn load_file(path: &Path) -> Result<Frame> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let frame = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    info!(
        "loaded {} rows x {} columns from {}",
        frame.len(),
        frame.columns.len(),
        path.display()
    );
    Ok(frame)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Sequence": "PEPTIDE", "Fraction": 3, "length": 7, "hydro": 0.41 },
///   ...
/// ]
/// ```
///
/// Columns are ordered by first appearance; missing keys become nulls.
fn load_json(path: &Path) -> Result<Frame> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut header: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            header
                .iter()
                .map(|key| obj.get(key).map_or(Cell::Null, json_to_cell))
                .collect()
        })
        .collect();

    Ok(Frame::from_rows(header, rows))
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::String(s) => Cell::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Null,
        other => Cell::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Frame> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let header: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != header.len() {
            bail!(
                "CSV row {row_no}: expected {} fields, found {}",
                header.len(),
                record.len()
            );
        }
        rows.push(record.iter().map(Cell::parse).collect());
    }

    Ok(Frame::from_rows(header, rows))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet table (strings, ints, floats, bools).
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Frame> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let header: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = (0..batch.num_columns())
                .map(|col_idx| {
                    extract_cell(batch.column(col_idx), row).with_context(|| {
                        format!("Row {row}: failed to read '{}'", header[col_idx])
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(cells);
        }
    }

    Ok(Frame::from_rows(header, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Result<Cell> {
    if col.is_null(row) {
        return Ok(Cell::Null);
    }
    let cell = match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            Cell::String(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => Cell::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            Cell::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            Cell::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            Cell::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            Cell::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("expected BooleanArray")?;
            Cell::Bool(arr.value(row))
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_round_trips_into_frame() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Sequence,Fraction,length").unwrap();
        writeln!(file, "PEPTIDE,3,7").unwrap();
        writeln!(file, "AAK,1,3").unwrap();

        let frame = load_file(file.path()).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column_names(), vec!["Sequence", "Fraction", "length"]);
        assert_eq!(frame.column("Fraction").unwrap().cells[0], Cell::Integer(3));
    }

    #[test]
    fn json_records_fill_missing_keys_with_null() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"Sequence":"AAK","Fraction":1,"x":0.5}},{{"Sequence":"GGR","Fraction":2}}]"#
        )
        .unwrap();

        let frame = load_file(file.path()).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("x").unwrap().cells[1], Cell::Null);
    }

    #[test]
    fn parquet_columns_are_read_by_type() {
        use arrow::array::{ArrayRef, LargeStringArray};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        use crate::data::PeptideTable;

        let schema = Arc::new(Schema::new(vec![
            Field::new("Sequence", DataType::LargeUtf8, false),
            Field::new("Fraction", DataType::Int32, false),
            Field::new("Score", DataType::Float64, true),
            Field::new("hydro", DataType::Float32, false),
            Field::new("length", DataType::Int64, false),
            Field::new("acidic", DataType::Boolean, false),
            Field::new("Modified sequence", DataType::Utf8, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(LargeStringArray::from(vec!["AAK", "LLLR", "GPEK"])),
            Arc::new(Int32Array::from(vec![1, 4, 2])),
            Arc::new(Float64Array::from(vec![Some(1.0), None, Some(3.0)])),
            Arc::new(Float32Array::from(vec![0.5, 1.5, -0.25])),
            Arc::new(Int64Array::from(vec![3, 4, 4])),
            Arc::new(BooleanArray::from(vec![false, false, true])),
            Arc::new(StringArray::from(vec![Some("_AAK_"), None, Some("_GPEK_")])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let frame = load_file(file.path()).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column("Sequence").unwrap().cells[1], Cell::String("LLLR".into()));
        assert_eq!(frame.column("Fraction").unwrap().cells[1], Cell::Integer(4));
        assert_eq!(frame.column("Score").unwrap().cells[1], Cell::Null);
        assert_eq!(frame.column("hydro").unwrap().cells[2], Cell::Float(-0.25));
        assert_eq!(frame.column("acidic").unwrap().cells[2], Cell::Bool(true));
        assert_eq!(frame.column("Modified sequence").unwrap().cells[1], Cell::Null);

        let table = PeptideTable::from_frame(&frame).unwrap();
        assert_eq!(table.sequences, vec!["AAK", "LLLR", "GPEK"]);
        assert_eq!(table.fractions, vec![1.0, 4.0, 2.0]);
        assert_eq!(table.feature_names, vec!["hydro", "length", "acidic"]);
        assert_eq!(table.features[[2, 2]], 1.0);
        assert!(table.scores.unwrap()[1].is_nan());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        assert!(load_file(file.path()).is_err());
    }
}
