//! Tabulation of heterogeneous experiment records

use exp_core::{CellValue, ExperimentRecord, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Table with a unified column set; every row has a cell for every column
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TabulatedResult {
    /// Column names in first-seen order
    columns: Vec<String>,

    /// Row cells aligned with `columns`
    rows: Vec<Vec<CellValue>>,
}

/// Build a table from `records`, filling absent cells with `fill_value`
pub fn tabulate(records: Vec<ExperimentRecord>, fill_value: CellValue) -> TabulatedResult {
    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .into_iter()
        .map(|mut record| {
            columns
                .iter()
                .map(|column| record.remove(column).unwrap_or_else(|| fill_value.clone()))
                .collect()
        })
        .collect();

    TabulatedResult { columns, rows }
}

impl TabulatedResult {
    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Convert back to one mapping per row
    ///
    /// Records are keyed by column name, so keys iterate lexically; use
    /// [`columns`](Self::columns) or [`to_json`](Self::to_json) for table order.
    pub fn to_records(&self) -> Vec<ExperimentRecord> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// JSON array of row objects, keys in column order
    pub fn to_json(&self) -> Result<String> {
        let rows: Vec<RowView<'_>> = self
            .rows
            .iter()
            .map(|cells| RowView {
                columns: &self.columns,
                cells,
            })
            .collect();
        Ok(serde_json::to_string(&rows)?)
    }
}

/// One row serialized as an object in table column order
struct RowView<'a> {
    columns: &'a [String],
    cells: &'a [CellValue],
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exp_core::RichText;
    use proptest::prelude::*;

    fn record(cells: &[(&str, CellValue)]) -> ExperimentRecord {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_fills_missing_cells() {
        let records = vec![
            record(&[("a", CellValue::Rich(RichText::plain("1.5"))), ("b", CellValue::Int(2))]),
            record(&[("a", CellValue::Rich(RichText::plain("x")))]),
        ];

        let table = tabulate(records, CellValue::Null);
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column("b").unwrap(),
            vec![&CellValue::Int(2), &CellValue::Null]
        );

        let rows = table.to_records();
        assert_eq!(rows[1]["b"], CellValue::Null);
    }

    #[test]
    fn test_custom_fill_value() {
        let records = vec![record(&[("x", CellValue::Int(1))]), record(&[("y", CellValue::Int(2))])];
        let table = tabulate(records, CellValue::from("-"));
        let rows = table.to_records();
        assert_eq!(rows[0]["y"], CellValue::from("-"));
        assert_eq!(rows[1]["x"], CellValue::from("-"));
    }

    #[test]
    fn test_empty_input() {
        let table = tabulate(Vec::new(), CellValue::Null);
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
        assert_eq!(table.to_json().unwrap(), "[]");
    }

    #[test]
    fn test_to_json() {
        let table = tabulate(
            vec![record(&[("acc", CellValue::Float(0.9))]), record(&[])],
            CellValue::Null,
        );
        assert_eq!(table.to_json().unwrap(), r#"[{"acc":0.9},{"acc":null}]"#);
    }

    #[test]
    fn test_json_keeps_column_order() {
        let records = vec![
            record(&[("zeta", CellValue::Int(1))]),
            record(&[("alpha", CellValue::Int(2)), ("zeta", CellValue::Int(3))]),
        ];
        let table = tabulate(records, CellValue::Null);
        assert_eq!(table.columns(), &["zeta".to_string(), "alpha".to_string()]);
        assert_eq!(
            table.to_json().unwrap(),
            r#"[{"zeta":1,"alpha":null},{"zeta":3,"alpha":2}]"#
        );
    }

    fn arb_record() -> impl Strategy<Value = ExperimentRecord> {
        proptest::collection::btree_map("[a-e]", (0i64..100).prop_map(CellValue::Int), 0..5)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: every row carries exactly the union of all columns
        #[test]
        fn prop_rows_share_column_set(records in proptest::collection::vec(arb_record(), 0..8)) {
            let mut union: Vec<String> = records.iter().flat_map(|r| r.keys().cloned()).collect();
            union.sort();
            union.dedup();

            let table = tabulate(records.clone(), CellValue::Null);
            let rows = table.to_records();
            prop_assert_eq!(rows.len(), records.len());

            for (row, original) in rows.iter().zip(records.iter()) {
                let keys: Vec<String> = row.keys().cloned().collect();
                prop_assert_eq!(&keys, &union);
                for (key, value) in row {
                    match original.get(key) {
                        Some(v) => prop_assert_eq!(value, v),
                        None => prop_assert_eq!(value, &CellValue::Null),
                    }
                }
            }
        }
    }
}
