use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    Context,
    Removed,
    Added,
}

/// One line of a hunk. Line numbers are 1-based; a removed line has no
/// current number and an added line has no golden number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub golden_line: Option<usize>,
    pub current_line: Option<usize>,
    pub text: String,
}

impl DiffLine {
    pub fn is_change(&self) -> bool {
        self.tag != DiffTag::Context
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub golden_start: usize,
    pub golden_len: usize,
    pub current_start: usize,
    pub current_len: usize,
    pub lines: Vec<DiffLine>,
}

/// Line-level diff from a golden artifact to the current output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    pub hunks: Vec<DiffHunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize, usize),
    Removed(usize),
    Added(usize),
}

/// Largest LCS table (golden lines × current lines) built for one diff.
/// Bigger differing regions are reported as one replaced block.
const MAX_LCS_CELLS: usize = 4 * 1024 * 1024;

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

/// Edit script via longest common subsequence over the region left after
/// trimming the common prefix and suffix.
fn edit_script(golden: &[&str], current: &[&str]) -> Vec<Op> {
    let prefix = golden
        .iter()
        .zip(current)
        .take_while(|(g, c)| g == c)
        .count();
    let suffix = golden[prefix..]
        .iter()
        .rev()
        .zip(current[prefix..].iter().rev())
        .take_while(|(g, c)| g == c)
        .count();

    let g = &golden[prefix..golden.len() - suffix];
    let c = &current[prefix..current.len() - suffix];

    let mut ops: Vec<Op> = (0..prefix).map(|k| Op::Equal(k, k)).collect();
    let golden_tail = golden.len() - suffix;
    let current_tail = current.len() - suffix;

    if g.len().saturating_mul(c.len()) > MAX_LCS_CELLS {
        warn!(
            golden_lines = g.len(),
            current_lines = c.len(),
            "Differing region too large for a line-level diff, reporting it as replaced"
        );
        ops.extend((0..g.len()).map(|k| Op::Removed(prefix + k)));
        ops.extend((0..c.len()).map(|k| Op::Added(prefix + k)));
        ops.extend((0..suffix).map(|k| Op::Equal(golden_tail + k, current_tail + k)));
        return ops;
    }

    // lcs[i][j] = LCS length of g[i..] and c[j..]
    let width = c.len() + 1;
    let mut lcs = vec![0u32; (g.len() + 1) * width];
    for i in (0..g.len()).rev() {
        for j in (0..c.len()).rev() {
            lcs[i * width + j] = if g[i] == c[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < g.len() && j < c.len() {
        if g[i] == c[j] {
            ops.push(Op::Equal(prefix + i, prefix + j));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            ops.push(Op::Removed(prefix + i));
            i += 1;
        } else {
            ops.push(Op::Added(prefix + j));
            j += 1;
        }
    }
    ops.extend((i..g.len()).map(|k| Op::Removed(prefix + k)));
    ops.extend((j..c.len()).map(|k| Op::Added(prefix + k)));
    ops.extend((0..suffix).map(|k| Op::Equal(golden_tail + k, current_tail + k)));
    ops
}

impl LineDiff {
    pub fn compute(golden: &str, current: &str, context: usize) -> Self {
        let golden_lines = split_lines(golden);
        let current_lines = split_lines(current);
        let ops = edit_script(&golden_lines, &current_lines);

        let changes: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| !matches!(op, Op::Equal(..)))
            .map(|(idx, _)| idx)
            .collect();

        // Group changes whose context windows touch into one hunk.
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for idx in changes {
            let start = idx.saturating_sub(context);
            let end = (idx + context + 1).min(ops.len());
            match ranges.last_mut() {
                Some(last) if start <= last.1 => last.1 = end,
                _ => ranges.push((start, end)),
            }
        }

        let hunks = ranges
            .into_iter()
            .map(|(start, end)| {
                let lines: Vec<DiffLine> = ops[start..end]
                    .iter()
                    .map(|op| match *op {
                        Op::Equal(g, c) => DiffLine {
                            tag: DiffTag::Context,
                            golden_line: Some(g + 1),
                            current_line: Some(c + 1),
                            text: golden_lines[g].to_string(),
                        },
                        Op::Removed(g) => DiffLine {
                            tag: DiffTag::Removed,
                            golden_line: Some(g + 1),
                            current_line: None,
                            text: golden_lines[g].to_string(),
                        },
                        Op::Added(c) => DiffLine {
                            tag: DiffTag::Added,
                            golden_line: None,
                            current_line: Some(c + 1),
                            text: current_lines[c].to_string(),
                        },
                    })
                    .collect();

                let golden_before = ops[..start]
                    .iter()
                    .filter(|op| !matches!(op, Op::Added(_)))
                    .count();
                let current_before = ops[..start]
                    .iter()
                    .filter(|op| !matches!(op, Op::Removed(_)))
                    .count();
                let golden_len = lines.iter().filter(|l| l.golden_line.is_some()).count();
                let current_len = lines.iter().filter(|l| l.current_line.is_some()).count();

                DiffHunk {
                    golden_start: if golden_len > 0 { golden_before + 1 } else { golden_before },
                    golden_len,
                    current_start: if current_len > 0 { current_before + 1 } else { current_before },
                    current_len,
                    lines,
                }
            })
            .collect();

        Self { hunks }
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Removed and added lines across every hunk.
    pub fn changed_lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .filter(|l| l.is_change())
    }
}

impl fmt::Display for LineDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hunk in &self.hunks {
            writeln!(
                f,
                "@@ -{},{} +{},{} @@",
                hunk.golden_start, hunk.golden_len, hunk.current_start, hunk.current_len
            )?;
            for line in &hunk.lines {
                let marker = match line.tag {
                    DiffTag::Context => ' ',
                    DiffTag::Removed => '-',
                    DiffTag::Added => '+',
                };
                writeln!(f, "{}{}", marker, line.text)?;
            }
        }
        Ok(())
    }
}
