use std::fmt::Write as _;

use console::style;

use crate::engine::ExecutionResult;

pub const TABLE_COLUMN_WIDTH: usize = 60;
pub const UNIFIED_CONTEXT: usize = 3;

/// Identical means same merged output, same exit code and same error text.
pub fn are_outputs_identical(left: &ExecutionResult, right: &ExecutionResult) -> bool {
    left.exit_code == right.exit_code
        && left.error == right.error
        && left.merged_output() == right.merged_output()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    Same,
    /// Present on the right only.
    Added,
    /// Present on the left only.
    Removed,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub line: usize,
    pub left: String,
    pub right: String,
    pub change: LineChange,
}

/// Pair lines by position. Rows blank on both sides are dropped and each
/// side is cut to `width` characters.
pub fn table_rows(left: &str, right: &str, width: usize) -> Vec<TableRow> {
    let left_lines: Vec<&str> = left.lines().collect();
    let right_lines: Vec<&str> = right.lines().collect();
    let count = left_lines.len().max(right_lines.len());

    (0..count)
        .filter_map(|index| {
            let l = left_lines.get(index).copied().unwrap_or("");
            let r = right_lines.get(index).copied().unwrap_or("");
            if l.trim().is_empty() && r.trim().is_empty() {
                return None;
            }

            let change = match (l.trim().is_empty(), r.trim().is_empty()) {
                _ if l == r => LineChange::Same,
                (true, false) => LineChange::Added,
                (false, true) => LineChange::Removed,
                _ => LineChange::Modified,
            };

            Some(TableRow {
                line: index + 1,
                left: clip(l, width),
                right: clip(r, width),
                change,
            })
        })
        .collect()
}

fn clip(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let kept: String = line.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn render_table(left: &ExecutionResult, right: &ExecutionResult, width: usize) -> String {
    let mut out = String::new();
    let left_title = format!("{} (exit {})", left.version, left.exit_code);
    let right_title = format!("{} (exit {})", right.version, right.exit_code);
    let _ = writeln!(
        out,
        "{:>4}  {}{} | {}",
        "",
        style(&left_title).bold(),
        " ".repeat(width.saturating_sub(left_title.chars().count())),
        style(&right_title).bold(),
    );
    let _ = writeln!(out, "{}", "-".repeat(width * 2 + 9));

    for row in table_rows(&left.merged_output(), &right.merged_output(), width) {
        let pad = width.saturating_sub(row.left.chars().count());
        let (l, r) = match row.change {
            LineChange::Same => (style(row.left).dim(), style(row.right).dim()),
            LineChange::Added => (style(row.left), style(row.right).green()),
            LineChange::Removed => (style(row.left).red(), style(row.right)),
            LineChange::Modified => (style(row.left).red(), style(row.right).green()),
        };
        let _ = writeln!(out, "{:>4}  {l}{} | {r}", row.line, " ".repeat(pad));
    }

    for result in [left, right] {
        if let Some(error) = &result.error {
            let _ = writeln!(out, "{} {}: {error}", style("error").red(), result.version);
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifiedLine {
    Context(String),
    Removed(String),
    Added(String),
    /// Marks skipped unchanged lines between hunks.
    Gap,
}

/// Positional line diff: line `i` on the left is compared with line `i` on
/// the right. Unchanged lines are kept only within `context` lines of a
/// change.
pub fn unified_diff(left: &str, right: &str, context: usize) -> Vec<UnifiedLine> {
    let left_lines: Vec<&str> = left.lines().collect();
    let right_lines: Vec<&str> = right.lines().collect();
    let count = left_lines.len().max(right_lines.len());

    let changed: Vec<usize> = (0..count)
        .filter(|&i| left_lines.get(i) != right_lines.get(i))
        .collect();
    let near_change = |i: usize| changed.iter().any(|&c| c.abs_diff(i) <= context);

    let mut lines = Vec::new();
    let mut skipped = false;
    for i in 0..count {
        match (left_lines.get(i), right_lines.get(i)) {
            (Some(l), Some(r)) if l == r => {
                if near_change(i) {
                    if skipped && !lines.is_empty() {
                        lines.push(UnifiedLine::Gap);
                    }
                    skipped = false;
                    lines.push(UnifiedLine::Context((*l).to_string()));
                } else {
                    skipped = true;
                }
            }
            (l, r) => {
                if skipped && !lines.is_empty() {
                    lines.push(UnifiedLine::Gap);
                }
                skipped = false;
                if let Some(l) = l {
                    lines.push(UnifiedLine::Removed((*l).to_string()));
                }
                if let Some(r) = r {
                    lines.push(UnifiedLine::Added((*r).to_string()));
                }
            }
        }
    }

    lines
}

pub fn render_unified(left: &ExecutionResult, right: &ExecutionResult, context: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        style(format!("--- {} (exit {})", left.version, left.exit_code)).red()
    );
    let _ = writeln!(
        out,
        "{}",
        style(format!("+++ {} (exit {})", right.version, right.exit_code)).green()
    );

    for line in unified_diff(&left.merged_output(), &right.merged_output(), context) {
        let _ = match line {
            UnifiedLine::Context(text) => writeln!(out, " {text}"),
            UnifiedLine::Removed(text) => writeln!(out, "{}", style(format!("-{text}")).red()),
            UnifiedLine::Added(text) => writeln!(out, "{}", style(format!("+{text}")).green()),
            UnifiedLine::Gap => writeln!(out, "{}", style("@@").cyan()),
        };
    }

    if left.error != right.error {
        for result in [left, right] {
            if let Some(error) = &result.error {
                let _ = writeln!(out, "{} {}: {error}", style("error").red(), result.version);
            }
        }
    }

    out
}
