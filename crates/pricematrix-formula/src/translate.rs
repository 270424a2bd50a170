//! Reference rewriting for row and column insertion and deletion
//!
//! References are rewritten on the AST and the caller re-renders the text.
//! `$` markers are preserved but do not change how a reference moves.

use pricematrix_core::{CellAddress, CellError, CellRange, MAX_COLS, MAX_ROWS};

use crate::ast::FormulaExpr;
use crate::dependency::CellKey;

/// A row or column insertion or deletion at a 0-based index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralEdit {
    InsertRow(u32),
    DeleteRow(u32),
    InsertColumn(u16),
    DeleteColumn(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Column,
}

impl Axis {
    fn get(self, addr: &CellAddress) -> u32 {
        match self {
            Axis::Row => addr.row,
            Axis::Column => addr.col as u32,
        }
    }

    /// `addr` with this coordinate replaced; `None` past the A1 maximum
    fn set(self, addr: &CellAddress, value: u32) -> Option<CellAddress> {
        match self {
            Axis::Row if value < MAX_ROWS => Some(addr.moved_to(value, addr.col)),
            Axis::Column if value < MAX_COLS as u32 => {
                Some(addr.moved_to(addr.row, value as u16))
            }
            _ => None,
        }
    }
}

impl StructuralEdit {
    fn axis(&self) -> Axis {
        match self {
            StructuralEdit::InsertRow(_) | StructuralEdit::DeleteRow(_) => Axis::Row,
            StructuralEdit::InsertColumn(_) | StructuralEdit::DeleteColumn(_) => Axis::Column,
        }
    }

    /// The affected index
    pub fn index(&self) -> u32 {
        match *self {
            StructuralEdit::InsertRow(i) | StructuralEdit::DeleteRow(i) => i,
            StructuralEdit::InsertColumn(i) | StructuralEdit::DeleteColumn(i) => i as u32,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(
            self,
            StructuralEdit::InsertRow(_) | StructuralEdit::InsertColumn(_)
        )
    }

    /// Short label for logs and undo descriptions
    pub fn describe(&self) -> String {
        match *self {
            StructuralEdit::InsertRow(i) => format!("insert row {}", i + 1),
            StructuralEdit::DeleteRow(i) => format!("delete row {}", i + 1),
            StructuralEdit::InsertColumn(i) => {
                format!("insert column {}", CellAddress::column_to_letters(i))
            }
            StructuralEdit::DeleteColumn(i) => {
                format!("delete column {}", CellAddress::column_to_letters(i))
            }
        }
    }

    /// Where the cell stored at `key` ends up; `None` when its line is deleted
    pub fn move_key(&self, key: CellKey) -> Option<CellKey> {
        self.move_cell(&CellAddress::new(key.row, key.col))
            .map(|addr| CellKey::new(addr.row, addr.col))
    }

    /// Where a single reference ends up; `None` when it is broken
    fn move_cell(&self, addr: &CellAddress) -> Option<CellAddress> {
        let axis = self.axis();
        let k = self.index();
        let c = axis.get(addr);

        if self.is_insert() {
            if c >= k {
                axis.set(addr, c + 1)
            } else {
                Some(*addr)
            }
        } else if c == k {
            None
        } else if c > k {
            axis.set(addr, c - 1)
        } else {
            Some(*addr)
        }
    }

    /// Where a range ends up; `None` when nothing of it survives
    ///
    /// A deletion inside or on the edge of the range shrinks it by one.
    fn move_range(&self, range: &CellRange) -> Option<CellRange> {
        if self.is_insert() {
            let start = self.move_cell(&range.start)?;
            let end = self.move_cell(&range.end)?;
            return Some(CellRange::new(start, end));
        }

        let axis = self.axis();
        let k = self.index();
        let s = axis.get(&range.start);
        let e = axis.get(&range.end);

        if s == k && e == k {
            return None;
        }
        let start = if s > k {
            axis.set(&range.start, s - 1)?
        } else {
            range.start
        };
        let end = if e >= k {
            axis.set(&range.end, e - 1)?
        } else {
            range.end
        };
        Some(CellRange::new(start, end))
    }
}

/// Rewrite every reference in `expr` for a structural edit
///
/// Returns `None` when no reference moves, so callers can keep the
/// original formula text.
pub fn translate_references(expr: &FormulaExpr, edit: StructuralEdit) -> Option<FormulaExpr> {
    let mut changed = false;
    let rewritten = rewrite(expr, edit, &mut changed);
    changed.then_some(rewritten)
}

fn rewrite(expr: &FormulaExpr, edit: StructuralEdit, changed: &mut bool) -> FormulaExpr {
    match expr {
        FormulaExpr::CellRef(addr) => {
            let moved = edit.move_cell(addr);
            if moved != Some(*addr) {
                *changed = true;
            }
            moved
                .map(FormulaExpr::CellRef)
                .unwrap_or(FormulaExpr::Error(CellError::BrokenReference))
        }
        FormulaExpr::RangeRef(range) => {
            let moved = edit.move_range(range);
            if moved != Some(*range) {
                *changed = true;
            }
            moved
                .map(FormulaExpr::RangeRef)
                .unwrap_or(FormulaExpr::Error(CellError::BrokenReference))
        }
        FormulaExpr::BinaryOp { op, left, right } => FormulaExpr::BinaryOp {
            op: *op,
            left: Box::new(rewrite(left, edit, changed)),
            right: Box::new(rewrite(right, edit, changed)),
        },
        FormulaExpr::UnaryOp { op, operand } => FormulaExpr::UnaryOp {
            op: *op,
            operand: Box::new(rewrite(operand, edit, changed)),
        },
        FormulaExpr::Function { name, args } => FormulaExpr::Function {
            name: name.clone(),
            args: args.iter().map(|a| rewrite(a, edit, changed)).collect(),
        },
        FormulaExpr::Number(_)
        | FormulaExpr::String(_)
        | FormulaExpr::Boolean(_)
        | FormulaExpr::Error(_) => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    fn translated(formula: &str, edit: StructuralEdit) -> Option<String> {
        let expr = parse_formula(formula).unwrap();
        translate_references(&expr, edit).map(|e| e.to_formula_string())
    }

    #[test]
    fn test_insert_column_shifts_references_at_or_after() {
        assert_eq!(
            translated("=B1+1", StructuralEdit::InsertColumn(0)),
            Some("=C1+1".into())
        );
        assert_eq!(
            translated("=A1+C1", StructuralEdit::InsertColumn(1)),
            Some("=A1+D1".into())
        );
        assert_eq!(translated("=A1*2", StructuralEdit::InsertColumn(1)), None);
    }

    #[test]
    fn test_insert_row_keeps_absolute_markers() {
        assert_eq!(
            translated("=$B$2+B$2+$B2", StructuralEdit::InsertRow(0)),
            Some("=$B$3+B$3+$B3".into())
        );
    }

    #[test]
    fn test_insert_row_grows_spanning_range() {
        assert_eq!(
            translated("=SUM(A1:A10)", StructuralEdit::InsertRow(4)),
            Some("=SUM(A1:A11)".into())
        );
        assert_eq!(
            translated("=SUM(A1:A10)", StructuralEdit::InsertRow(0)),
            Some("=SUM(A2:A11)".into())
        );
    }

    #[test]
    fn test_insert_past_last_row_breaks_reference() {
        let last = format!("=A{}", MAX_ROWS);
        assert_eq!(
            translated(&last, StructuralEdit::InsertRow(0)),
            Some("=#REF!".into())
        );
    }

    #[test]
    fn test_delete_row_breaks_exact_reference() {
        assert_eq!(
            translated("=A1+A2", StructuralEdit::DeleteRow(0)),
            Some("=#REF!+A1".into())
        );
        assert_eq!(
            translated("=A3-A1", StructuralEdit::DeleteRow(1)),
            Some("=A2-A1".into())
        );
    }

    #[test]
    fn test_delete_column_breaks_exact_reference() {
        assert_eq!(
            translated("=IF(B1>0,C1,D1)", StructuralEdit::DeleteColumn(2)),
            Some("=IF(B1>0,#REF!,C1)".into())
        );
    }

    #[test]
    fn test_delete_shrinks_ranges() {
        assert_eq!(
            translated("=SUM(A1:A10)", StructuralEdit::DeleteRow(4)),
            Some("=SUM(A1:A9)".into())
        );
        assert_eq!(
            translated("=SUM(A1:A10)", StructuralEdit::DeleteRow(0)),
            Some("=SUM(A1:A9)".into())
        );
        assert_eq!(
            translated("=SUM(A1:A10)", StructuralEdit::DeleteRow(9)),
            Some("=SUM(A1:A9)".into())
        );
        assert_eq!(
            translated("=SUM(B3:D3)", StructuralEdit::DeleteRow(2)),
            Some("=SUM(#REF!)".into())
        );
        assert_eq!(
            translated("=SUM(A1:A10)", StructuralEdit::DeleteRow(20)),
            None
        );
    }

    #[test]
    fn test_translated_formula_reparses() {
        let expr = parse_formula("=VLOOKUP(A1,$B$1:$D$20,3,FALSE)").unwrap();
        let moved = translate_references(&expr, StructuralEdit::DeleteColumn(0)).unwrap();
        let text = moved.to_formula_string();
        assert_eq!(text, "=VLOOKUP(#REF!,$A$1:$C$20,3,FALSE)");
        assert_eq!(parse_formula(&text).unwrap(), moved);
    }

    #[test]
    fn test_move_key_follows_stored_cells() {
        let c3 = CellKey::new(2, 2);
        assert_eq!(StructuralEdit::InsertRow(0).move_key(c3), Some(CellKey::new(3, 2)));
        assert_eq!(StructuralEdit::InsertRow(5).move_key(c3), Some(c3));
        assert_eq!(StructuralEdit::DeleteColumn(0).move_key(c3), Some(CellKey::new(2, 1)));
        assert_eq!(StructuralEdit::DeleteColumn(2).move_key(c3), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(StructuralEdit::InsertRow(0).describe(), "insert row 1");
        assert_eq!(StructuralEdit::DeleteColumn(27).describe(), "delete column AB");
    }
}
