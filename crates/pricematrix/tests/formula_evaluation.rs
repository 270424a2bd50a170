//! Formula evaluation through a session: recalculation on write, errors as
//! values and circular references

use pretty_assertions::assert_eq;
use pricematrix::prelude::*;

fn session() -> Session {
    let mut session = Session::default();
    session.add_matrix("Prices").unwrap();
    session
}

fn value(session: &Session, a1: &str) -> CellValue {
    session.get_cell_a1("Prices", a1).unwrap().value
}

fn display(session: &Session, a1: &str) -> String {
    session.get_cell_a1("Prices", a1).unwrap().display_value
}

/// A write is recalculated before it returns
#[test]
fn test_dependents_follow_their_precedents() {
    let mut s = session();
    s.set_cell("Prices", 0, 0, "5").unwrap();
    s.set_cell("Prices", 0, 1, "=A1*2").unwrap();
    let result = s.set_cell("Prices", 0, 0, "10").unwrap();

    assert_eq!(result.stats.cells_evaluated, 1);
    let b1 = s.get_cell("Prices", 0, 1).unwrap();
    assert_eq!(b1.display_value, "20");
    assert_eq!(b1.value_type, ValueType::Number);
    assert!(!b1.pending);
}

#[test]
fn test_division_by_zero_is_trapped_by_iferror() {
    let mut s = session();
    let a1 = s.set_cell("Prices", 0, 0, "=1/0").unwrap();
    assert_eq!(a1.cell.error, Some(CellError::DivideByZero));
    assert_eq!(a1.cell.display_value, "#DIV/0!");

    let b1 = s.set_cell("Prices", 0, 1, "=IFERROR(A1,99)").unwrap();
    assert_eq!(b1.cell.display_value, "99");
    assert_eq!(b1.cell.error, None);
}

#[test]
fn test_count_skips_text_and_blanks() {
    let mut s = session();
    s.set_cells(
        "Prices",
        &[(0, 0, "1"), (1, 0, "x"), (3, 0, "2"), (0, 1, "=COUNT(A1:A4)")],
    )
    .unwrap();
    assert_eq!(value(&s, "B1"), CellValue::Number(2.0));
}

#[test]
fn test_price_table_lookups() {
    let mut s = session();
    s.set_cells(
        "Prices",
        &[
            (0, 0, "Basic"),
            (0, 1, "10"),
            (1, 0, "Pro"),
            (1, 1, "25"),
            (2, 0, "Team"),
            (2, 1, "40"),
            // Quantity breaks and unit prices
            (0, 2, "1"),
            (0, 3, "5"),
            (1, 2, "10"),
            (1, 3, "4.5"),
            (2, 2, "100"),
            (2, 3, "4"),
        ],
    )
    .unwrap();

    s.set_cell("Prices", 4, 0, "=VLOOKUP(\"pro\",A1:B3,2)").unwrap();
    s.set_cell("Prices", 4, 1, "=VLOOKUP(25,C1:D3,2,TRUE)").unwrap();
    s.set_cell("Prices", 4, 2, "=MATCH(25,C1:C3)").unwrap();
    s.set_cell("Prices", 4, 3, "=INDEX(D1:D3,3)").unwrap();
    s.set_cell("Prices", 4, 4, "=VLOOKUP(\"Enterprise\",A1:B3,2)").unwrap();
    s.set_cell("Prices", 4, 5, "=VLOOKUP(\"Pro\",A1:B3,3)").unwrap();

    assert_eq!(value(&s, "A5"), CellValue::Number(25.0));
    assert_eq!(value(&s, "B5"), CellValue::Number(4.5));
    assert_eq!(value(&s, "C5"), CellValue::Number(2.0));
    assert_eq!(value(&s, "D5"), CellValue::Number(4.0));
    assert_eq!(display(&s, "E5"), "#N/A");
    assert_eq!(display(&s, "F5"), "#REF!");

    // Repricing a tier flows through the lookup
    s.set_cell("Prices", 1, 1, "27").unwrap();
    assert_eq!(value(&s, "A5"), CellValue::Number(27.0));
}

#[test]
fn test_parse_error_keeps_text_and_propagates() {
    let mut s = session();
    let a1 = s.set_cell("Prices", 0, 0, "=1+").unwrap().cell;
    assert_eq!(a1.raw_text, "=1+");
    assert_eq!(a1.error, Some(CellError::Parse));
    assert!(a1.diagnostic.is_some());

    s.set_cell("Prices", 0, 1, "=A1+1").unwrap();
    assert_eq!(display(&s, "B1"), "#ERROR!");

    s.set_cell("Prices", 0, 0, "=1+1").unwrap();
    assert_eq!(value(&s, "B1"), CellValue::Number(3.0));
    assert_eq!(s.get_cell_a1("Prices", "A1").unwrap().diagnostic, None);
}

#[test]
fn test_unknown_function_is_name_error() {
    let mut s = session();
    let cell = s.set_cell("Prices", 0, 0, "=MARKUP(10)").unwrap().cell;
    assert_eq!(cell.error, Some(CellError::UnknownFunction));
    assert_eq!(cell.display_value, "#NAME?");
    assert_eq!(cell.raw_text, "=MARKUP(10)");
}

#[test]
fn test_text_coercion() {
    let mut s = session();
    s.set_cell("Prices", 0, 0, "abc").unwrap();
    s.set_cell("Prices", 0, 1, "=A1*2").unwrap();
    s.set_cell("Prices", 0, 2, "=\"3\"*2").unwrap();
    s.set_cell("Prices", 0, 3, "=UPPER(LEFT(\"widget\",3))&LEN(\"abc\")").unwrap();

    assert_eq!(display(&s, "B1"), "#VALUE!");
    assert_eq!(value(&s, "C1"), CellValue::Number(6.0));
    assert_eq!(value(&s, "D1"), CellValue::text("WID3"));
}

#[test]
fn test_round_uses_decimal_arithmetic() {
    let mut s = session();
    s.set_cell("Prices", 0, 0, "=ROUND(2.675,2)").unwrap();
    s.set_cell("Prices", 0, 1, "=ROUND(1234.5,-2)").unwrap();
    assert_eq!(value(&s, "A1"), CellValue::Number(2.68));
    assert_eq!(value(&s, "B1"), CellValue::Number(1200.0));
}

#[test]
fn test_date_functions() {
    let mut s = session();
    s.set_cell("Prices", 0, 0, "=DATE(2024,1,31)").unwrap();
    s.set_cell("Prices", 0, 1, "=EDATE(A1,1)").unwrap();
    s.set_cell("Prices", 0, 2, "=DAY(B1)").unwrap();
    s.set_cell("Prices", 0, 3, "=DAYS(DATE(2024,3,1),DATE(2024,2,1))").unwrap();
    s.set_cell("Prices", 0, 4, "=DATE(1900,3,1)").unwrap();

    assert_eq!(value(&s, "C1"), CellValue::Number(29.0));
    assert_eq!(value(&s, "D1"), CellValue::Number(29.0));
    assert_eq!(value(&s, "E1"), CellValue::Number(61.0));
}

#[test]
fn test_self_reference_is_circular() {
    let mut s = session();
    let cell = s.set_cell("Prices", 0, 0, "=A1").unwrap().cell;
    assert_eq!(cell.error, Some(CellError::CircularReference));
    assert_eq!(cell.raw_text, "=A1");
    assert!(s.sheet("Prices").unwrap().is_circular(0, 0));
}

#[test]
fn test_cycle_leaves_unrelated_cells_alone() {
    let mut s = session();
    s.set_cell("Prices", 2, 0, "7").unwrap();
    s.set_cell("Prices", 2, 1, "=A3*2").unwrap();
    s.set_cell("Prices", 0, 0, "=B1").unwrap();
    let b1 = s.set_cell("Prices", 0, 1, "=A1+1").unwrap();

    assert_eq!(b1.cell.error, Some(CellError::CircularReference));
    assert_eq!(display(&s, "A1"), "#CIRC!");
    assert_eq!(value(&s, "B3"), CellValue::Number(14.0));
    assert!(s.sheet("Prices").unwrap().graph().check_consistency());
}

#[test]
fn test_breaking_a_cycle_heals_blocked_cell() {
    let mut s = session();
    s.set_cell("Prices", 0, 0, "=B1").unwrap();
    s.set_cell("Prices", 0, 1, "=A1+1").unwrap();
    assert_eq!(display(&s, "B1"), "#CIRC!");

    s.set_cell("Prices", 0, 0, "5").unwrap();
    let b1 = s.get_cell_a1("Prices", "B1").unwrap();
    assert_eq!(b1.value, CellValue::Number(6.0));
    assert_eq!(b1.diagnostic, None);
    assert!(!s.sheet("Prices").unwrap().is_circular(0, 1));
}

#[test]
fn test_full_recalculation_is_idempotent() {
    let mut s = session();
    s.set_cells(
        "Prices",
        &[
            (0, 0, "3"),
            (1, 0, "=A1*A1"),
            (2, 0, "=SUM(A1:A2)"),
            (3, 0, "=IF(A3>10,\"big\",\"small\")"),
        ],
    )
    .unwrap();
    let before = s.serialize();

    let first = s.recalculate("Prices").unwrap();
    let values: Vec<CellValue> = ["A2", "A3", "A4"].iter().map(|a| value(&s, a)).collect();
    let second = s.recalculate("Prices").unwrap();
    let again: Vec<CellValue> = ["A2", "A3", "A4"].iter().map(|a| value(&s, a)).collect();

    assert_eq!(first, second);
    assert_eq!(first.cells_evaluated, 3);
    assert_eq!(values, again);
    assert_eq!(values[2], CellValue::text("big"));
    assert_eq!(s.serialize(), before);
}

#[test]
fn test_cancelled_write_reports_pending_cells() {
    let mut s = session();
    s.set_cell("Prices", 0, 0, "1").unwrap();
    s.set_cell("Prices", 0, 1, "=A1+1").unwrap();
    s.set_cell("Prices", 0, 2, "=B1+1").unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let result = s.set_cell_with("Prices", 0, 0, "10", &token).unwrap();
    assert!(result.stats.cancelled);
    assert_eq!(result.stats.remaining, 2);

    let c1 = s.get_cell_a1("Prices", "C1").unwrap();
    assert!(c1.pending);
    assert_eq!(c1.value, CellValue::Number(12.0));

    s.recalculate("Prices").unwrap();
    assert!(!s.get_cell_a1("Prices", "C1").unwrap().pending);
}

#[test]
fn test_bounds_and_lookup_errors() {
    let mut s = Session::new(EngineOptions::default().with_limits(MatrixLimits::new(10, 5)));
    s.add_matrix("Prices").unwrap();

    let err = s.set_cell("Prices", 10, 0, "1").unwrap_err();
    assert!(err.is_out_of_range());
    let err = s.set_cell("Prices", 0, 5, "1").unwrap_err();
    assert!(matches!(err, Error::ColumnOutOfRange { index: 5, max: 5 }));
    assert!(!s.can_undo());

    assert!(matches!(
        s.get_cell("Tiers", 0, 0),
        Err(Error::MatrixNotFound(_))
    ));
    assert!(matches!(
        s.get_cell_a1("Prices", "1A"),
        Err(Error::InvalidAddress(_))
    ));
    assert!(matches!(
        s.add_matrix("Prices"),
        Err(Error::DuplicateMatrixName(_))
    ));

    let blank = s.get_cell("Prices", 3, 3).unwrap();
    assert!(blank.is_blank());
    assert_eq!(blank.value_type, ValueType::Empty);
    assert_eq!(s.sheet("Prices").unwrap().matrix().cell_count(), 0);
}

#[test]
fn test_clear_cell_recalculates_dependents() {
    let mut s = session();
    s.set_cell("Prices", 0, 0, "4").unwrap();
    s.set_cell("Prices", 0, 1, "=A1*2").unwrap();
    s.clear_cell("Prices", 0, 0).unwrap();

    assert!(s.get_cell_a1("Prices", "A1").unwrap().is_blank());
    assert_eq!(value(&s, "B1"), CellValue::Number(0.0));
}

#[test]
fn test_reload_keeps_the_same_circular_cell() {
    let mut s = session();
    s.set_cell("Prices", 0, 1, "=A1").unwrap();
    s.set_cell("Prices", 0, 0, "=IFERROR(B1,5)").unwrap();

    let snapshot = s.serialize();
    assert_eq!(snapshot.matrix("Prices").unwrap().circular, vec![(0, 0)]);

    let reloaded = Session::from_snapshot(&snapshot, EngineOptions::default()).unwrap();
    assert!(reloaded.sheet("Prices").unwrap().is_circular(0, 0));
    assert_eq!(
        reloaded.get_cell_a1("Prices", "A1").unwrap().display_value,
        "#CIRC!"
    );
    assert_eq!(reloaded.serialize(), snapshot);
}

#[test]
fn test_whole_sheet_range_is_cut_at_limits() {
    let mut s = Session::new(EngineOptions::default().with_limits(MatrixLimits::new(50, 10)));
    s.add_matrix("Prices").unwrap();
    s.set_cell("Prices", 0, 0, "4").unwrap();
    s.set_cell("Prices", 49, 9, "6").unwrap();

    let total = s.set_cell("Prices", 1, 1, "=SUM(C1:XFD1048576)").unwrap();
    assert_eq!(total.cell.value, CellValue::Number(6.0));
    assert_eq!(s.sheet("Prices").unwrap().graph().edge_count(), 50 * 8);

    s.set_cell("Prices", 49, 9, "10").unwrap();
    assert_eq!(value(&s, "B2"), CellValue::Number(10.0));
}
