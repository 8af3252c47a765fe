/// Data layer: cell model, loading, the peptide table and target encoding.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Frame
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ PeptideTable │  strip identifier columns → sequences, fractions, features
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  encode  │  label codes / one-hot targets, feature scaling
///   └──────────┘
/// ```

pub mod encode;
pub mod loader;
pub mod model;
pub mod table;

pub use encode::{argmax_rows, one_hot, LabelEncoder, StandardScaler};
pub use model::{Cell, Column, Frame};
pub use table::PeptideTable;
