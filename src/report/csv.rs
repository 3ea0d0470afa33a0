use std::fmt;

/// A comma-separated table. Values are written as is, without quoting, so
/// they are expected to be free of commas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Cell of the row whose first column is `key`.
    pub fn value(&self, key: &str, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|header| header == column)?;
        let row = self.rows.iter().find(|row| row.first().is_some_and(|k| k == key))?;
        row.get(index).map(String::as_str)
    }

    pub fn render(&self) -> String {
        std::iter::once(&self.headers)
            .chain(&self.rows)
            .map(|row| row.join(","))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for CsvTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_header_then_rows() {
        let mut table = CsvTable::new(vec!["user".into(), "opened".into()]);
        table.push_row(vec!["alice".into(), "3".into()]);
        table.push_row(vec!["bob".into(), "0".into()]);
        assert_eq!(table.render(), "user,opened\nalice,3\nbob,0");
        assert_eq!(table.value("bob", "opened"), Some("0"));
        assert_eq!(table.value("carol", "opened"), None);
    }
}
