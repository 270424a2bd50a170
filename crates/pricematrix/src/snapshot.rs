//! Serializable session state
//!
//! A snapshot holds raw text only: values are recomputed on load. Cells are
//! listed row-major, so serializing the same state always yields the same
//! bytes. Formulas rejected for closing a cycle are listed too, so a reload
//! rejects the same cells.

use pricematrix_core::{Error, Matrix, MatrixLimits, Result};
use pricematrix_formula::CellKey;
use serde::{Deserialize, Serialize};

/// One stored cell, by 0-based row and column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub row: u32,
    pub col: u16,
    /// Raw input text; empty means the cell is absent
    pub raw: String,
}

/// Raw contents and dimensions of one matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSnapshot {
    pub name: String,
    pub rows: u32,
    pub cols: u16,
    #[serde(default)]
    pub cells: Vec<CellSnapshot>,
    /// Circular formula cells as (row, col), row-major
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub circular: Vec<(u32, u16)>,
}

impl MatrixSnapshot {
    /// Capture a matrix and the cells it keeps rejected as circular
    pub fn capture(matrix: &Matrix, circular: &[CellKey]) -> Self {
        let (rows, cols) = matrix.dimensions();
        Self {
            name: matrix.name().to_string(),
            rows,
            cols,
            cells: matrix
                .iter()
                .map(|(row, col, cell)| CellSnapshot {
                    row,
                    col,
                    raw: cell.raw.clone(),
                })
                .collect(),
            circular: circular.iter().map(|key| (key.row, key.col)).collect(),
        }
    }

    pub fn circular_keys(&self) -> Vec<CellKey> {
        self.circular
            .iter()
            .map(|&(row, col)| CellKey::new(row, col))
            .collect()
    }

    /// Build a matrix holding this snapshot's raw text
    ///
    /// Formula cells come back pending; the caller parses and evaluates them.
    pub fn to_matrix(&self, limits: MatrixLimits) -> Result<Matrix> {
        let invalid = |e: Error| Error::InvalidSnapshot(format!("matrix {:?}: {}", self.name, e));

        let mut matrix = Matrix::new(self.name.clone(), limits).map_err(invalid)?;
        for cell in &self.cells {
            matrix.set_raw(cell.row, cell.col, &cell.raw).map_err(invalid)?;
        }
        matrix.set_dimensions(self.rows, self.cols).map_err(invalid)?;
        Ok(matrix)
    }
}

/// Every matrix of a session, in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub matrices: Vec<MatrixSnapshot>,
}

impl SessionSnapshot {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::other(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Find a matrix by name
    pub fn matrix(&self, name: &str) -> Option<&MatrixSnapshot> {
        self.matrices.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pricematrix_core::CellValue;

    #[test]
    fn test_capture_is_row_major() {
        let mut matrix = Matrix::new("Prices", MatrixLimits::default()).unwrap();
        matrix.set_raw(1, 0, "=A1*2").unwrap();
        matrix.set_raw(0, 2, "x").unwrap();
        matrix.set_raw(0, 0, "4").unwrap();

        let snapshot = MatrixSnapshot::capture(&matrix, &[]);
        let order: Vec<(u32, u16)> = snapshot.cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(order, vec![(0, 0), (0, 2), (1, 0)]);
        assert_eq!((snapshot.rows, snapshot.cols), (2, 3));
    }

    #[test]
    fn test_to_matrix_restores_literals_and_dimensions() {
        let snapshot = MatrixSnapshot {
            name: "Tiers".into(),
            rows: 10,
            cols: 4,
            cells: vec![CellSnapshot {
                row: 2,
                col: 1,
                raw: "TRUE".into(),
            }],
            circular: Vec::new(),
        };
        let matrix = snapshot.to_matrix(MatrixLimits::default()).unwrap();
        assert_eq!(matrix.value(2, 1), &CellValue::Boolean(true));
        assert_eq!(matrix.dimensions(), (10, 4));
    }

    #[test]
    fn test_to_matrix_rejects_cells_outside_limits() {
        let snapshot = MatrixSnapshot {
            name: "Tiers".into(),
            rows: 1,
            cols: 1,
            cells: vec![CellSnapshot {
                row: 0,
                col: 9,
                raw: "1".into(),
            }],
            circular: Vec::new(),
        };
        let err = snapshot.to_matrix(MatrixLimits::new(5, 5)).unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }

    #[test]
    fn test_circular_cells_are_optional_in_json() {
        let mut matrix = Matrix::new("Prices", MatrixLimits::default()).unwrap();
        matrix.set_raw(0, 0, "=A1").unwrap();

        let plain = MatrixSnapshot::capture(&matrix, &[]);
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("circular"));
        let parsed: MatrixSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, plain);

        let flagged = MatrixSnapshot::capture(&matrix, &[CellKey::new(0, 0)]);
        let json = serde_json::to_string(&flagged).unwrap();
        let parsed: MatrixSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.circular_keys(), vec![CellKey::new(0, 0)]);
    }

    #[test]
    fn test_from_json_reports_invalid_snapshot() {
        assert!(matches!(
            SessionSnapshot::from_json("{\"matrices\": 3}"),
            Err(Error::InvalidSnapshot(_))
        ));
    }
}
