use crate::model::{
    Collection, CollectionMap, Error, Result, TIME_FROM_OPEN_TO_RESPONSE, TIME_TO_APPROVE,
    TIME_TO_MERGE, TIME_TO_REVIEW, TOTAL_KEY,
};
use markdown_builder::Markdown;
use markdown_table::{Heading, HeadingAlignment, MarkdownTable};
use std::fmt;

pub const CONTRIBUTION_SECTION: &str = "Contribution stats";
pub const QUALITY_SECTION: &str = "Pull request quality";
pub const ENGAGEMENT_SECTION: &str = "Code review engagement";
pub const TIMELINE_SECTION: &str = "Timeline";

type Cell = fn(&Collection, &str, &CollectionMap, &str) -> String;

struct Column {
    title: &'static str,
    cell: Cell,
}

/// Rendered table text, written out as is. Paragraphs would re-wrap the rows.
#[derive(Debug, Clone)]
struct TableBlock(String);

impl fmt::Display for TableBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait MarkdownReport {
    /// Renders the per-user snapshots at `snapshot_key` plus a closing
    /// `total` row.
    fn report_render(&self, title: &str, users: &[String], snapshot_key: &str) -> Result<String>;
}

impl MarkdownReport for CollectionMap {
    fn report_render(&self, title: &str, users: &[String], snapshot_key: &str) -> Result<String> {
        let mut doc = Markdown::new();
        doc.header1(title);

        let rows: Vec<String> = users
            .iter()
            .cloned()
            .chain([TOTAL_KEY.to_string()])
            .collect();
        for (section, columns) in sections() {
            doc.add_section(section, &columns, self, &rows, snapshot_key)?;
        }
        Ok(doc.render())
    }
}

trait MarkdownExt {
    fn add_section(
        &mut self,
        section: &str,
        columns: &[Column],
        data: &CollectionMap,
        users: &[String],
        snapshot_key: &str,
    ) -> Result<()>;
}

impl MarkdownExt for Markdown {
    fn add_section(
        &mut self,
        section: &str,
        columns: &[Column],
        data: &CollectionMap,
        users: &[String],
        snapshot_key: &str,
    ) -> Result<()> {
        self.header2(section);

        let header = [Heading::new("user".to_string(), None)]
            .into_iter()
            .chain(columns.iter().map(|column| {
                Heading::new(column.title.to_string(), Some(HeadingAlignment::Center))
            }))
            .collect::<Vec<_>>();

        let table = users
            .iter()
            .map(|user| {
                let col = data.snapshot(user, snapshot_key);
                [format!("**{user}**")]
                    .into_iter()
                    .chain(columns.iter().map(|column| (column.cell)(&col, user, data, snapshot_key)))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut md_table = MarkdownTable::new(table);
        md_table.with_headings(header);
        let rendered = md_table
            .as_markdown()
            .map_err(|_| Error::Render(format!("table of section `{section}`")))?;
        self.elements.push(TableBlock(rendered).into());
        Ok(())
    }
}

fn sections() -> [(&'static str, Vec<Column>); 4] {
    [
        (
            CONTRIBUTION_SECTION,
            vec![
                Column { title: "Opened", cell: |c, _, _, _| c.opened.to_string() },
                Column { title: "Closed", cell: |c, _, _, _| c.closed.to_string() },
                Column { title: "Merged", cell: |c, _, _, _| c.merged.to_string() },
                Column { title: "Reverted", cell: |c, _, _, _| c.reverted.to_string() },
                Column {
                    title: "Merged to default",
                    cell: |c, _, _, _| c.merged_to_default.to_string(),
                },
                Column {
                    title: "Additions/Deletions",
                    cell: |c, _, _, _| format!("{}/{}", c.additions, c.deletions),
                },
                Column {
                    title: "Default branch additions/deletions",
                    cell: |c, _, _, _| {
                        format!("{}/{}", c.additions_to_default, c.deletions_to_default)
                    },
                },
                Column { title: "PR sizes", cell: |c, _, _, _| c.size_summary() },
                Column {
                    title: "Cursor lines added/deleted",
                    cell: |_, user, data, _| {
                        let total = data.snapshot(user, TOTAL_KEY);
                        format!(
                            "{}/{}",
                            total.cursor_total_lines_added, total.cursor_total_lines_deleted
                        )
                    },
                },
                Column {
                    title: "Cursor accepted lines added/deleted",
                    cell: |_, user, data, _| {
                        let total = data.snapshot(user, TOTAL_KEY);
                        format!(
                            "{}/{}",
                            total.cursor_accepted_lines_added, total.cursor_accepted_lines_deleted
                        )
                    },
                },
            ],
        ),
        (
            QUALITY_SECTION,
            vec![
                Column { title: "Unreviewed", cell: |c, _, _, _| c.unreviewed.to_string() },
                Column { title: "Unapproved", cell: |c, _, _, _| c.unapproved.to_string() },
                Column {
                    title: "Changes requested received",
                    cell: |_, user, data, key| {
                        data.snapshot(TOTAL_KEY, key)
                            .reviews_with(user)
                            .changes_requested
                            .to_string()
                    },
                },
                Column {
                    title: "Agreed/Disagreed/Total discussions received",
                    cell: |c, _, _, _| {
                        let received = &c.discussions.received;
                        format!("{}/{}/{}", received.agreed, received.disagreed, received.total)
                    },
                },
                Column { title: "Comments received", cell: |c, _, _, _| c.review_comments.to_string() },
                Column { title: "Conversation comments", cell: |c, _, _, _| c.comments.to_string() },
            ],
        ),
        (
            ENGAGEMENT_SECTION,
            vec![
                Column {
                    title: "Reviews conducted",
                    cell: |c, _, _, _| c.total_reviews().total.to_string(),
                },
                Column {
                    title: "Changes requested/Commented/Approved",
                    cell: |c, _, _, _| {
                        let reviews = c.total_reviews();
                        format!(
                            "{}/{}/{}",
                            reviews.changes_requested, reviews.commented, reviews.approved
                        )
                    },
                },
                Column {
                    title: "Agreed/Disagreed/Total discussions conducted",
                    cell: |c, _, _, _| {
                        let conducted = &c.discussions.conducted;
                        format!("{}/{}/{}", conducted.agreed, conducted.disagreed, conducted.total)
                    },
                },
                Column {
                    title: "Comments conducted",
                    cell: |c, _, _, _| c.comments_conducted.to_string(),
                },
            ],
        ),
        (
            TIMELINE_SECTION,
            vec![
                Column { title: "Time to review", cell: |c, _, _, _| duration(c.timing(TIME_TO_REVIEW)) },
                Column { title: "Time to approve", cell: |c, _, _, _| duration(c.timing(TIME_TO_APPROVE)) },
                Column { title: "Time to merge", cell: |c, _, _, _| duration(c.timing(TIME_TO_MERGE)) },
                Column {
                    title: "Time to first response",
                    cell: |c, _, _, _| duration(c.median_of(TIME_FROM_OPEN_TO_RESPONSE)),
                },
            ],
        ),
    ]
}

/// Minutes as `Xh Ym`; empty when nothing was measured.
fn duration(minutes: f64) -> String {
    if minutes <= 0.0 {
        return String::new();
    }
    let minutes = minutes.round() as u64;
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}
