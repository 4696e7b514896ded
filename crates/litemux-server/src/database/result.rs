//! Statement results and cell value coercion.

use rusqlite::types::ValueRef;

/// A wire-level cell value.
///
/// The MySQL result encoder works with a small closed set of value kinds,
/// while SQLite cells are dynamically typed; every scanned cell is coerced
/// into one of these four shapes before it leaves the session.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL.
    Null,
    /// Any integer, widened to 64 bits.
    Int(i64),
    /// Any floating-point value, widened to 64 bits.
    Float(f64),
    /// Text, or a byte sequence reinterpreted as text.
    Text(String),
}

impl CellValue {
    /// Coerces one scanned SQLite cell into its wire-level kind.
    ///
    /// The mapping is total over the driver's value union: null stays
    /// null, integers and reals widen to 64 bits, blobs are reinterpreted
    /// as text (lossy UTF-8), and text is the terminal arm.
    pub fn coerce(value: ValueRef<'_>) -> CellValue {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(n) => CellValue::Int(n),
            ValueRef::Real(f) => CellValue::Float(f),
            ValueRef::Blob(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Rows produced by the read path.
///
/// Every row holds exactly `fields.len()` cells, aligned with `fields`.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Column names, in the order projected by the statement.
    pub fields: Vec<String>,
    /// Coerced rows, in scan order.
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows were produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of executing one statement.
#[derive(Debug)]
pub enum StatementReply {
    /// Write-path (or synthetic) success.
    Ok {
        /// Rows changed by the statement; zero for synthetic successes.
        rows_affected: u64,
        /// Rowid generated by the most recent insert on this handle.
        last_insert_id: u64,
    },
    /// Read-path result rows.
    Rows(ResultSet),
}

impl StatementReply {
    /// Creates a write-path success reply.
    pub fn ok(rows_affected: u64, last_insert_id: u64) -> Self {
        StatementReply::Ok {
            rows_affected,
            last_insert_id,
        }
    }

    /// Returns the affected-row count for write-path replies.
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            StatementReply::Ok { rows_affected, .. } => Some(*rows_affected),
            StatementReply::Rows(_) => None,
        }
    }

    /// Returns the result set for read-path replies.
    pub fn as_rows(&self) -> Option<&ResultSet> {
        match self {
            StatementReply::Rows(result_set) => Some(result_set),
            StatementReply::Ok { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_null() {
        assert_eq!(CellValue::coerce(ValueRef::Null), CellValue::Null);
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(CellValue::coerce(ValueRef::Integer(42)), CellValue::Int(42));
        assert_eq!(
            CellValue::coerce(ValueRef::Integer(i64::MIN)),
            CellValue::Int(i64::MIN)
        );
    }

    #[test]
    fn test_coerce_real() {
        assert_eq!(
            CellValue::coerce(ValueRef::Real(0.25)),
            CellValue::Float(0.25)
        );
    }

    #[test]
    fn test_coerce_text_and_blob() {
        assert_eq!(
            CellValue::coerce(ValueRef::Text(b"hello")),
            CellValue::Text("hello".to_string())
        );
        // Byte sequences come back as textual blobs.
        assert_eq!(
            CellValue::coerce(ValueRef::Blob(&[0x68, 0x69])),
            CellValue::Text("hi".to_string())
        );
    }

    #[test]
    fn test_reply_accessors() {
        let ok = StatementReply::ok(3, 7);
        assert_eq!(ok.rows_affected(), Some(3));
        assert!(ok.as_rows().is_none());

        let rows = StatementReply::Rows(ResultSet {
            fields: vec!["a".to_string()],
            rows: vec![vec![CellValue::Int(1)]],
        });
        assert_eq!(rows.rows_affected(), None);
        assert_eq!(rows.as_rows().unwrap().row_count(), 1);
    }
}
