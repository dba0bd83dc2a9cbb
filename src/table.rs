//! Direct, model-free answers over tabular uploads.
//!
//! A question mentioning `count` or `total` gets the record count. Otherwise
//! the first column whose name appears in the question gets its non-empty
//! values listed. Anything else falls through to document retrieval.

use std::fmt;

use serde::Serialize;

/// A header row plus string cells. Rows may be ragged; a missing cell reads
/// as empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A direct answer computed from a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableAnswer {
    RecordCount {
        records: usize,
    },
    ColumnValues {
        column: String,
        values: Vec<String>,
        /// How many of `values` to render.
        listed: usize,
    },
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Non-empty cells of column `idx`, in row order.
    pub fn column_values(&self, idx: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(idx))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Try to answer `question` from this table.
    ///
    /// `max_values` caps how many values a column answer lists.
    pub fn lookup(&self, question: &str, max_values: usize) -> Option<TableAnswer> {
        let q = question.to_lowercase();

        if q.contains("count") || q.contains("total") {
            return Some(TableAnswer::RecordCount {
                records: self.row_count(),
            });
        }

        self.columns
            .iter()
            .enumerate()
            .find(|(_, name)| {
                let name = name.trim().to_lowercase();
                !name.is_empty() && q.contains(&name)
            })
            .map(|(idx, name)| {
                let values = self.column_values(idx);
                TableAnswer::ColumnValues {
                    column: name.clone(),
                    listed: values.len().min(max_values),
                    values,
                }
            })
    }
}

impl fmt::Display for TableAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableAnswer::RecordCount { records } => {
                write!(f, "Total number of records: **{}**", records)
            }
            TableAnswer::ColumnValues {
                column,
                values,
                listed,
            } => {
                write!(f, "Column `{}` has **{}** values:\n\n", column, values.len())?;
                let lines: Vec<String> = values
                    .iter()
                    .take(*listed)
                    .map(|v| format!("- {}", v))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> Table {
        Table::new(
            vec!["Name".into(), "Department".into(), "City".into()],
            vec![
                vec!["Ada".into(), "Engineering".into(), "London".into()],
                vec!["Grace".into(), "".into(), "Arlington".into()],
                vec!["Linus".into(), "Kernel".into()],
            ],
        )
    }

    #[test]
    fn test_count_question() {
        let answer = staff().lookup("How many rows in total?", 200).unwrap();
        assert_eq!(answer, TableAnswer::RecordCount { records: 3 });
        assert_eq!(answer.to_string(), "Total number of records: **3**");
    }

    #[test]
    fn test_count_wins_over_column_match() {
        let answer = staff().lookup("count the departments", 200).unwrap();
        assert!(matches!(answer, TableAnswer::RecordCount { .. }));
    }

    #[test]
    fn test_column_question_skips_empty_cells() {
        let answer = staff()
            .lookup("Which DEPARTMENT does everyone work in?", 200)
            .unwrap();
        assert_eq!(
            answer,
            TableAnswer::ColumnValues {
                column: "Department".into(),
                values: vec!["Engineering".into(), "Kernel".into()],
                listed: 2,
            }
        );
        assert_eq!(
            answer.to_string(),
            "Column `Department` has **2** values:\n\n- Engineering\n- Kernel"
        );
    }

    #[test]
    fn test_ragged_row_reads_as_empty() {
        let answer = staff().lookup("list each city", 200).unwrap();
        match answer {
            TableAnswer::ColumnValues { values, .. } => {
                assert_eq!(values, vec!["London", "Arlington"]);
            }
            other => panic!("unexpected answer: {:?}", other),
        }
    }

    #[test]
    fn test_first_matching_column_in_header_order() {
        let answer = staff().lookup("city and name please", 200).unwrap();
        match answer {
            TableAnswer::ColumnValues { column, .. } => assert_eq!(column, "Name"),
            other => panic!("unexpected answer: {:?}", other),
        }
    }

    #[test]
    fn test_listing_is_capped_but_count_is_not() {
        let rows = (0..10).map(|i| vec![format!("v{}", i)]).collect();
        let table = Table::new(vec!["id".into()], rows);
        let answer = table.lookup("show every id", 3).unwrap();
        let rendered = answer.to_string();
        assert!(rendered.starts_with("Column `id` has **10** values:"));
        assert_eq!(rendered.matches("\n- ").count(), 3);
    }

    #[test]
    fn test_no_match_falls_through() {
        assert!(staff().lookup("What is the weather like?", 200).is_none());
    }
}
