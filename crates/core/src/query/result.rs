use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::query::service::ResultPage;

/// One data row keyed by column label, in column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultRow {
    cells: Vec<(String, String)>,
}

impl ResultRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.iter().find(|(name, _)| name == column).map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ResultRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { cells: iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect() }
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    /// The engine had more rows than the single page that was fetched.
    pub truncated: bool,
}

impl QueryResult {
    /// Shapes a raw page into rows. The first row is the engine's header echo
    /// and is always dropped; absent or short cells become empty strings.
    pub fn from_page(page: ResultPage) -> Self {
        let ResultPage { columns, rows, next_token } = page;

        let rows = rows
            .into_iter()
            .skip(1)
            .map(|raw| {
                let mut raw = raw.into_iter();
                columns
                    .iter()
                    .map(|column| (column.clone(), raw.next().flatten().unwrap_or_default()))
                    .collect::<ResultRow>()
            })
            .collect();

        Self { columns, rows, truncated: next_token.is_some() }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::QueryResult;
    use crate::query::service::ResultPage;

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|value| value.map(str::to_string)).collect()
    }

    #[test]
    fn header_row_is_dropped_and_rows_keyed_by_column() {
        let page = ResultPage {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![
                cells(&[Some("a"), Some("b")]),
                cells(&[Some("1"), Some("2")]),
                cells(&[Some("3"), Some("4")]),
            ],
            next_token: None,
        };

        let result = QueryResult::from_page(page);

        assert_eq!(result.row_count(), 2);
        assert_eq!(
            serde_json::to_value(&result.rows).expect("serialize"),
            json!([{ "a": "1", "b": "2" }, { "a": "3", "b": "4" }])
        );
        assert!(!result.truncated);
    }

    #[test]
    fn missing_cells_become_empty_strings_not_absent_keys() {
        let page = ResultPage {
            columns: vec!["id".to_string(), "name".to_string(), "region".to_string()],
            rows: vec![
                cells(&[Some("id"), Some("name"), Some("region")]),
                cells(&[Some("7"), None]),
            ],
            next_token: None,
        };

        let result = QueryResult::from_page(page);
        let row = &result.rows[0];

        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name", "region"]);
        assert_eq!(row.get("id"), Some("7"));
        assert_eq!(row.get("name"), Some(""));
        assert_eq!(row.get("region"), Some(""));
    }

    #[test]
    fn header_only_page_yields_no_rows() {
        let page = ResultPage {
            columns: vec!["a".to_string()],
            rows: vec![cells(&[Some("a")])],
            next_token: None,
        };

        let result = QueryResult::from_page(page);
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.columns, vec!["a".to_string()]);
    }

    #[test]
    fn continuation_token_marks_result_truncated() {
        let page = ResultPage {
            columns: vec!["a".to_string()],
            rows: vec![cells(&[Some("a")]), cells(&[Some("1")])],
            next_token: Some("token-2".to_string()),
        };

        assert!(QueryResult::from_page(page).truncated);
    }

    #[test]
    fn rows_serialize_in_column_order() {
        let page = ResultPage {
            columns: vec!["zeta".to_string(), "alpha".to_string()],
            rows: vec![cells(&[Some("zeta"), Some("alpha")]), cells(&[Some("z"), Some("a")])],
            next_token: None,
        };

        let encoded = serde_json::to_string(&QueryResult::from_page(page).rows).expect("json");
        assert_eq!(encoded, r#"[{"zeta":"z","alpha":"a"}]"#);
    }
}
