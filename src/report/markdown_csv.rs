use crate::model::Result;
use crate::report::CsvTable;
use crate::telemetry::AnnotatedRecord;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::collections::HashMap;

/// A combined header cell and the column names it stands for.
struct SplitRule {
    pattern: Regex,
    names: &'static [&'static str],
    /// Whether text in front of the combined part prefixes every name.
    prefixed: bool,
}

impl SplitRule {
    fn new(pattern: &str, names: &'static [&'static str], prefixed: bool) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            names,
            prefixed,
        })
    }

    fn expand(&self, cell: &str) -> Option<Vec<String>> {
        let found = self.pattern.find(cell)?;
        let prefix = cell[..found.start()].trim();
        Some(
            self.names
                .iter()
                .map(|name| match self.prefixed {
                    true => format!("{prefix} {name}").trim().to_string(),
                    false => name.to_string(),
                })
                .collect(),
        )
    }
}

/// Columns of the table being read, and how many columns each split header
/// cell (by its original position) expanded to.
struct Table {
    columns: Vec<String>,
    splits: HashMap<usize, usize>,
    /// Set after the header row: the next row is its alignment row.
    awaiting_alignment: bool,
}

impl Table {
    fn expand_row(&self, cells: Vec<String>) -> Vec<String> {
        let mut expanded = Vec::with_capacity(self.columns.len());
        for (index, cell) in cells.into_iter().enumerate() {
            match self.splits.get(&index) {
                Some(&count) => {
                    let mut parts: Vec<String> =
                        cell.split('/').map(|part| part.trim().to_string()).collect();
                    parts.resize(count.max(parts.len()), String::new());
                    expanded.extend(parts.into_iter().take(count));
                }
                None => expanded.push(cell),
            }
        }
        expanded
    }
}

#[derive(Default)]
struct ParseState {
    records: IndexMap<String, IndexMap<String, String>>,
    headers: IndexSet<String>,
    section: String,
    table: Option<Table>,
}

impl ParseState {
    fn record(&mut self, user: &str) -> &mut IndexMap<String, String> {
        self.records.entry(user.to_string()).or_default()
    }
}

/// Reads a rendered markdown report back into one flat CSV row per user.
pub struct MarkdownCsv {
    rules: Vec<SplitRule>,
    heading: Regex,
    alignment: Regex,
}

impl MarkdownCsv {
    pub fn new() -> Result<Self> {
        Ok(Self {
            rules: vec![
                SplitRule::new(r"(?i)additions\s*/\s*deletions", &["Additions", "Deletions"], true)?,
                SplitRule::new(
                    r"(?i)cursor lines added\s*/\s*deleted",
                    &["Cursor lines added", "Cursor lines deleted"],
                    false,
                )?,
                SplitRule::new(
                    r"(?i)cursor accepted lines added\s*/\s*deleted",
                    &["Cursor accepted lines added", "Cursor accepted lines deleted"],
                    false,
                )?,
                SplitRule::new(
                    r"(?i)agreed\s*/\s*disagreed\s*/\s*total discussions received",
                    &[
                        "Agreed discussions received",
                        "Disagreed discussions received",
                        "Total discussions received",
                    ],
                    true,
                )?,
                SplitRule::new(
                    r"(?i)agreed\s*/\s*disagreed\s*/\s*total discussions conducted",
                    &[
                        "Agreed discussions conducted",
                        "Disagreed discussions conducted",
                        "Total discussions conducted",
                    ],
                    true,
                )?,
                SplitRule::new(
                    r"(?i)changes requested\s*/\s*commented\s*/\s*approved",
                    &["Changes requested", "Commented", "Approved"],
                    true,
                )?,
            ],
            heading: Regex::new(r"^#{1,6}\s+(.*)$")?,
            alignment: Regex::new(r"^:?-+:?$")?,
        })
    }

    /// Never fails on unexpected input: lines that are neither headings nor
    /// table rows only end the current table.
    pub fn parse(&self, markdown: &str, telemetry: &[AnnotatedRecord]) -> CsvTable {
        let mut state = ParseState::default();
        for line in markdown.lines() {
            self.parse_line(line.trim(), &mut state);
        }

        for row in telemetry {
            let Some(user) = row.owner() else {
                continue;
            };
            for (key, value) in row.text_fields() {
                state.headers.insert(key.clone());
                state.record(&user).insert(key, value);
            }
        }

        let headers = ["user".to_string()]
            .into_iter()
            .chain(state.headers.iter().cloned())
            .collect();
        let mut table = CsvTable::new(headers);
        for (user, values) in &state.records {
            let row = [user.clone()]
                .into_iter()
                .chain(
                    state
                        .headers
                        .iter()
                        .map(|header| values.get(header).cloned().unwrap_or_default()),
                )
                .collect();
            table.push_row(row);
        }
        table
    }

    fn parse_line(&self, line: &str, state: &mut ParseState) {
        if let Some(captures) = self.heading.captures(line) {
            state.section = section_initials(captures[1].trim());
            state.table = None;
            return;
        }
        if !line.starts_with('|') {
            state.table = None;
            return;
        }

        let cells = split_cells(line);
        let is_alignment = cells.iter().all(|cell| self.alignment.is_match(cell));
        if state.table.is_none() {
            if !is_alignment {
                let table = self.header(&cells, state);
                state.table = Some(table);
            }
            return;
        }
        let Some(table) = state.table.as_mut() else {
            return;
        };
        if table.awaiting_alignment {
            table.awaiting_alignment = false;
            return;
        }
        if is_alignment {
            return;
        }
        let row = table.expand_row(cells);
        let columns = table.columns.clone();
        store_row(state, &columns, row);
    }

    fn header(&self, cells: &[String], state: &mut ParseState) -> Table {
        let mut columns = Vec::new();
        let mut splits = HashMap::new();
        for (index, cell) in cells.iter().enumerate() {
            match self.rules.iter().find_map(|rule| rule.expand(cell)) {
                Some(names) => {
                    splits.insert(index, names.len());
                    columns.extend(names);
                }
                None => columns.push(cell.clone()),
            }
        }
        for column in columns.iter_mut().skip(1) {
            if state.headers.contains(column.as_str()) {
                *column = format!("{} {column}", state.section).trim().to_string();
            }
            state.headers.insert(column.clone());
        }
        Table {
            columns,
            splits,
            awaiting_alignment: true,
        }
    }
}

fn store_row(state: &mut ParseState, columns: &[String], row: Vec<String>) {
    let Some(user) = row.first().map(|cell| cell.trim_matches('*').trim().to_string()) else {
        return;
    };
    if user.is_empty() {
        return;
    }
    for (index, column) in columns.iter().enumerate().skip(1) {
        state.headers.insert(column.clone());
        let value = row.get(index).cloned().unwrap_or_default();
        if !value.is_empty() {
            state.record(&user).entry(column.clone()).or_insert(value);
        }
    }
    state.record(&user);
}

fn split_cells(line: &str) -> Vec<String> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Short label of a report section, used to tell apart columns that share a
/// name across sections.
pub fn section_initials(title: &str) -> String {
    let lower = title.to_lowercase();
    if lower.contains("pull request quality") {
        "PR".to_string()
    } else if lower.contains("code review engagement") {
        "review".to_string()
    } else {
        title
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// Converts a rendered report, plus optional raw telemetry rows, to CSV.
pub fn markdown_to_csv(markdown: &str, telemetry: &[AnnotatedRecord]) -> Result<CsvTable> {
    Ok(MarkdownCsv::new()?.parse(markdown, telemetry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryRecord;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn convert(markdown: &str) -> CsvTable {
        markdown_to_csv(markdown, &[]).unwrap()
    }

    #[test]
    fn combined_header_splits_data_cells() {
        let table = convert(indoc! {"
            ### Contribution stats
            | user | Opened | Additions/Deletions |
            | :--- | :---: | :---: |
            | **alice** | 3 | 5/2 |
        "});
        assert_eq!(table.headers(), ["user", "Opened", "Additions", "Deletions"]);
        assert_eq!(table.value("alice", "Additions"), Some("5"));
        assert_eq!(table.value("alice", "Deletions"), Some("2"));
    }

    #[test]
    fn repeated_header_is_prefixed_with_section_initials() {
        let table = convert(indoc! {"
            ### Contribution stats
            | user | Total |
            |------|-------|
            | alice | 4 |

            ### Code review engagement
            | user | Total |
            |------|-------|
            | alice | 9 |
        "});
        assert_eq!(table.headers(), ["user", "Total", "review Total"]);
        assert_eq!(table.value("alice", "Total"), Some("4"));
        assert_eq!(table.value("alice", "review Total"), Some("9"));
    }

    #[test]
    fn unknown_heading_uses_first_letters() {
        assert_eq!(section_initials("Pull Request Quality (team web)"), "PR");
        assert_eq!(section_initials("Response time summary"), "RTS");
        assert_eq!(section_initials(""), "");
    }

    #[test]
    fn short_cells_are_padded_and_prefixes_kept() {
        let table = convert(indoc! {"
            ## Code review engagement
            | user | Changes requested/Commented/Approved | Merged Additions/Deletions |
            |---|---|---|
            | bob | 1/4 | 10 |
        "});
        assert_eq!(
            table.headers(),
            [
                "user",
                "Changes requested",
                "Commented",
                "Approved",
                "Merged Additions",
                "Merged Deletions"
            ]
        );
        assert_eq!(table.value("bob", "Changes requested"), Some("1"));
        assert_eq!(table.value("bob", "Commented"), Some("4"));
        assert_eq!(table.value("bob", "Approved"), Some(""));
        assert_eq!(table.value("bob", "Merged Additions"), Some("10"));
    }

    #[test]
    fn unknown_combined_header_is_left_alone() {
        let table = convert(indoc! {"
            | user | Wins/Losses |
            |---|---|
            | carol | 1/2 |
        "});
        assert_eq!(table.headers(), ["user", "Wins/Losses"]);
        assert_eq!(table.value("carol", "Wins/Losses"), Some("1/2"));
    }

    #[test]
    fn first_non_empty_value_is_kept() {
        let table = convert(indoc! {"
            | user | Opened | Note |
            |---|---|---|
            | alice | | |
            | alice | 2 | first |
            | alice | 7 | |
        "});
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.value("alice", "Opened"), Some("2"));
        assert_eq!(table.value("alice", "Note"), Some("first"));
    }

    #[test]
    fn prose_resets_table_and_never_fails() {
        let table = convert(indoc! {"
            # Report
            Some words about the week.
            | user | Opened |
            |---|---|
            | alice | 1 |
            A stray paragraph | with a pipe.
            | user | Merged |
            |---|---|
            | alice | 2 |
            |
            | --- |
        "});
        assert_eq!(table.headers(), ["user", "Opened", "Merged"]);
        assert_eq!(table.value("alice", "Merged"), Some("2"));
    }

    #[test]
    fn row_after_header_is_taken_as_its_alignment_row() {
        let table = convert(indoc! {"
            | user | Merged |
            | bob | 2 |
            | alice | 3 |
            | :-: | :--: |
            | carol | 4 |
        "});
        let users: Vec<_> = table.rows().iter().map(|row| row[0].as_str()).collect();
        assert_eq!(users, vec!["alice", "carol"]);
        assert_eq!(table.value("alice", "Merged"), Some("3"));
    }

    #[test]
    fn telemetry_rows_overwrite_and_add_users() {
        let mut record = TelemetryRecord {
            date: 5,
            email: Some("dave@corp.com".to_string()),
            ..Default::default()
        };
        record.counters.insert("chatRequests".to_string(), 3);
        let telemetry = vec![
            AnnotatedRecord {
                display_login: "alice".to_string(),
                record: TelemetryRecord {
                    date: 7,
                    ..Default::default()
                },
            },
            AnnotatedRecord {
                display_login: String::new(),
                record,
            },
        ];
        let markdown = indoc! {"
            | user | date |
            |---|---|
            | alice | yesterday |
        "};

        let table = markdown_to_csv(markdown, &telemetry).unwrap();

        assert_eq!(table.value("alice", "date"), Some("7"));
        assert_eq!(table.value("dave", "chatRequests"), Some("3"));
        assert_eq!(table.value("dave", "email"), Some("dave@corp.com"));
        assert_eq!(table.value("alice", "email"), Some(""));
        assert!(!table.headers().iter().any(|h| h == "githubUser"));
    }
}
