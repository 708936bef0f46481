/// A single cell; `None` is a null (empty field on disk).
pub type Cell = Option<String>;

/// All records of one source file, held column-ordered in memory.
///
/// Rows are kept at exactly `columns.len()` cells once the batch has been aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Batch {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Raw rows with no column names yet; widths may differ row to row.
    pub fn from_raw_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
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

    /// Widest raw row
    pub fn raw_width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Name the columns positionally, keeping min(raw width, names) columns.
    ///
    /// Short rows are padded with nulls. Returns the number of non-null cells that
    /// fell beyond the kept width.
    pub fn assign_columns(&mut self, names: &[String]) -> usize {
        let width = self.raw_width().min(names.len());
        let mut dropped = 0;
        for row in &mut self.rows {
            if row.len() > width {
                dropped += row[width..].iter().filter(|c| c.is_some()).count();
                row.truncate(width);
            } else {
                row.resize(width, None);
            }
        }
        self.columns = names[..width].to_vec();
        dropped
    }

    /// Remove columns whose name is empty, returning the non-null cells removed.
    pub fn drop_unnamed_columns(&mut self) -> usize {
        let keep: Vec<bool> = self.columns.iter().map(|c| !c.is_empty()).collect();
        if keep.iter().all(|&k| k) {
            return 0;
        }
        let mut dropped = 0;
        for row in &mut self.rows {
            let mut idx = 0;
            row.retain(|cell| {
                let kept = keep[idx];
                idx += 1;
                if !kept && cell.is_some() {
                    dropped += 1;
                }
                kept
            });
        }
        self.columns.retain(|c| !c.is_empty());
        dropped
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column, if present
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Replace a column's values, appending the column if it is new.
    ///
    /// # Panics
    /// If `values` does not have one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        assert_eq!(values.len(), self.rows.len(), "column {name} length mismatch");
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Set one value on every row
    pub fn fill_column(&mut self, name: &str, value: &str) {
        let values = vec![Some(value.to_string()); self.rows.len()];
        self.set_column(name, values);
    }

    /// Reorder rows by a permutation of row indices
    pub fn reorder(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.rows.len());
        let mut taken: Vec<Option<Vec<Cell>>> = self.rows.drain(..).map(Some).collect();
        self.rows = order.iter().filter_map(|&i| taken[i].take()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_assign_columns_truncates_to_shorter_side() {
        let mut batch = Batch::from_raw_rows(vec![cells(&["a", "b", "c"]), cells(&["d", "e", "f"])]);
        let dropped = batch.assign_columns(&names(&["x", "y"]));
        assert_eq!(batch.columns(), &["x", "y"]);
        assert_eq!(dropped, 2);
        assert_eq!(batch.get(1, "y"), Some("e"));

        let mut batch = Batch::from_raw_rows(vec![cells(&["a", "b"])]);
        let dropped = batch.assign_columns(&names(&["x", "y", "z", "w"]));
        assert_eq!(batch.columns(), &["x", "y"]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_unnamed_columns_are_dropped_in_place() {
        let mut batch = Batch::from_raw_rows(vec![cells(&["a1", "gap", "b1"]), cells(&["a2", "", "b2"])]);
        batch.assign_columns(&["a".to_string(), String::new(), "b".to_string()]);
        assert_eq!(batch.drop_unnamed_columns(), 1);
        assert_eq!(batch.columns(), ["a", "b"]);
        assert_eq!(batch.column("b").unwrap(), vec![Some("b1"), Some("b2")]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut batch = Batch::from_raw_rows(vec![cells(&["a", "b", "c"]), cells(&["d"])]);
        batch.assign_columns(&names(&["x", "y", "z"]));
        assert_eq!(batch.rows()[1], vec![Some("d".to_string()), None, None]);
    }

    #[test]
    fn test_set_column_appends_then_replaces() {
        let mut batch = Batch::new(names(&["x"]), vec![cells(&["1"]), cells(&["2"])]);
        batch.fill_column("year", "2024");
        assert_eq!(batch.columns(), &["x", "year"]);
        batch.set_column("x", vec![Some("9".into()), None]);
        assert_eq!(batch.get(0, "x"), Some("9"));
        assert_eq!(batch.get(1, "x"), None);
        assert_eq!(batch.get(1, "year"), Some("2024"));
    }

    #[test]
    fn test_reorder_rows() {
        let mut batch = Batch::new(names(&["x"]), vec![cells(&["a"]), cells(&["b"]), cells(&["c"])]);
        batch.reorder(&[2, 0, 1]);
        assert_eq!(batch.column("x").unwrap(), vec![Some("c"), Some("a"), Some("b")]);
    }
}
