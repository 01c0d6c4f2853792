//! Myers O(ND) difference algorithm and unified-diff rendering.
//!
//! Works on any hashable slice, so the same code diffs lines and, inside
//! changed blocks, words. Common prefixes and suffixes are stripped before
//! the search, and the search is capped at [`MAX_EDIT_COST`]. Past the cap
//! the section is split on lines that occur exactly once on each side
//! (the longest increasing run of such pairs) and each piece is diffed on
//! its own. Only a piece with no such anchor is reported as a full
//! replacement. The result is always a valid edit script and deterministic.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::Hash;

/// Edit distance beyond which the search gives up on minimality.
pub const MAX_EDIT_COST: usize = 4_096;

/// How many times an over-budget section may be split on unique anchors.
const MAX_ANCHOR_DEPTH: usize = 8;

/// Default number of context lines around each hunk.
pub const DEFAULT_CONTEXT: usize = 3;

/// One step of an edit script. Indices point into the original slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Equal { old: usize, new: usize },
    Delete { old: usize },
    Insert { new: usize },
}

impl Edit {
    pub fn is_change(&self) -> bool {
        !matches!(self, Edit::Equal { .. })
    }
}

/// Compute an edit script turning `old` into `new`.
pub fn diff<T: Eq + Hash>(old: &[T], new: &[T]) -> Vec<Edit> {
    let mut edits = Vec::with_capacity(old.len().max(new.len()));
    diff_section(old, new, 0, 0, MAX_EDIT_COST, 0, &mut edits);
    edits
}

/// Diff `old` against `new`, appending edits offset by the section's
/// position in the full inputs.
fn diff_section<T: Eq + Hash>(
    old: &[T],
    new: &[T],
    old_at: usize,
    new_at: usize,
    max_cost: usize,
    depth: usize,
    out: &mut Vec<Edit>,
) {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];

    out.extend((0..prefix).map(|i| Edit::Equal {
        old: old_at + i,
        new: new_at + i,
    }));

    let (mid_old, mid_new) = (old_at + prefix, new_at + prefix);
    match shortest_edit_script(a, b, max_cost) {
        Some(middle) => out.extend(middle.into_iter().map(|e| shift(e, mid_old, mid_new))),
        None => {
            let anchors = if depth < MAX_ANCHOR_DEPTH {
                unique_anchors(a, b)
            } else {
                Vec::new()
            };
            if anchors.is_empty() {
                out.extend((0..a.len()).map(|i| Edit::Delete { old: mid_old + i }));
                out.extend((0..b.len()).map(|j| Edit::Insert { new: mid_new + j }));
            } else {
                let (mut i0, mut j0) = (0, 0);
                for (i, j) in anchors {
                    diff_section(&a[i0..i], &b[j0..j], mid_old + i0, mid_new + j0, max_cost, depth + 1, out);
                    out.push(Edit::Equal {
                        old: mid_old + i,
                        new: mid_new + j,
                    });
                    (i0, j0) = (i + 1, j + 1);
                }
                diff_section(&a[i0..], &b[j0..], mid_old + i0, mid_new + j0, max_cost, depth + 1, out);
            }
        }
    }

    let old_tail = old_at + old.len() - suffix;
    let new_tail = new_at + new.len() - suffix;
    out.extend((0..suffix).map(|i| Edit::Equal {
        old: old_tail + i,
        new: new_tail + i,
    }));
}

fn shift(edit: Edit, old_by: usize, new_by: usize) -> Edit {
    match edit {
        Edit::Equal { old, new } => Edit::Equal {
            old: old + old_by,
            new: new + new_by,
        },
        Edit::Delete { old } => Edit::Delete { old: old + old_by },
        Edit::Insert { new } => Edit::Insert { new: new + new_by },
    }
}

#[derive(Default)]
struct Occurrence {
    in_old: usize,
    old_at: usize,
    in_new: usize,
    new_at: usize,
}

/// Pairs `(i, j)` with `a[i] == b[j]` where the item occurs once in each
/// slice, reduced to the longest run increasing on both sides.
fn unique_anchors<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let mut table: HashMap<&T, Occurrence> = HashMap::new();
    for (i, item) in a.iter().enumerate() {
        let entry = table.entry(item).or_default();
        entry.in_old += 1;
        entry.old_at = i;
    }
    for (j, item) in b.iter().enumerate() {
        if let Some(entry) = table.get_mut(item) {
            entry.in_new += 1;
            entry.new_at = j;
        }
    }

    let mut pairs: Vec<(usize, usize)> = table
        .values()
        .filter(|o| o.in_old == 1 && o.in_new == 1)
        .map(|o| (o.old_at, o.new_at))
        .collect();
    pairs.sort_unstable();
    longest_increasing(&pairs)
}

/// Longest subsequence of `pairs` (sorted by `.0`) strictly increasing in `.1`.
fn longest_increasing(pairs: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; pairs.len()];
    for (idx, &(_, j)) in pairs.iter().enumerate() {
        let pos = tails.partition_point(|&t| pairs[t].1 < j);
        if pos > 0 {
            prev[idx] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(idx);
        } else {
            tails[pos] = idx;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        run.push(pairs[idx]);
        cursor = prev[idx];
    }
    run.reverse();
    run
}

/// Greedy forward Myers search with a compact trace for backtracking.
///
/// `trace[d]` holds the furthest-reaching x for diagonals `-d..=d` as they
/// stood before round `d`, indexed by `k + d`.
fn shortest_edit_script<T: PartialEq>(a: &[T], b: &[T], max_cost: usize) -> Option<Vec<Edit>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 {
        return Some((0..b.len()).map(|j| Edit::Insert { new: j }).collect());
    }
    if m == 0 {
        return Some((0..a.len()).map(|i| Edit::Delete { old: i }).collect());
    }

    let max = (n + m) as usize;
    let offset = max as isize + 1;
    let mut v = vec![0isize; 2 * max + 3];
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut found = None;

    'search: for d in 0..=(max.min(max_cost) as isize) {
        let lo = (offset - d) as usize;
        let hi = (offset + d) as usize;
        trace.push(v[lo..=hi].to_vec());

        for k in (-d..=d).step_by(2) {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                found = Some(d);
                break 'search;
            }
        }
    }

    let found = found?;
    let mut script = Vec::with_capacity(found as usize + a.len().max(b.len()));
    let (mut x, mut y) = (n, m);

    for d in (0..=found).rev() {
        if d == 0 {
            while x > 0 && y > 0 {
                x -= 1;
                y -= 1;
                script.push(Edit::Equal {
                    old: x as usize,
                    new: y as usize,
                });
            }
            break;
        }

        let round = &trace[d as usize];
        let at = |k: isize| round[(k + d) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            script.push(Edit::Equal {
                old: x as usize,
                new: y as usize,
            });
        }
        if x == prev_x {
            script.push(Edit::Insert {
                new: prev_y as usize,
            });
        } else {
            script.push(Edit::Delete {
                old: prev_x as usize,
            });
        }
        x = prev_x;
        y = prev_y;
    }

    script.reverse();
    Some(script)
}

// ---------------------------------------------------------------------------
// Change blocks
// ---------------------------------------------------------------------------

/// A maximal run of non-equal edits: what was taken out and what went in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeBlock {
    pub removed: Vec<usize>,
    pub added: Vec<usize>,
}

/// Group an edit script into change blocks, in script order.
pub fn change_blocks(edits: &[Edit]) -> Vec<ChangeBlock> {
    let mut blocks = Vec::new();
    let mut current = ChangeBlock::default();
    for edit in edits {
        match *edit {
            Edit::Equal { .. } => {
                if !current.removed.is_empty() || !current.added.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
            }
            Edit::Delete { old } => current.removed.push(old),
            Edit::Insert { new } => current.added.push(new),
        }
    }
    if !current.removed.is_empty() || !current.added.is_empty() {
        blocks.push(current);
    }
    blocks
}

// ---------------------------------------------------------------------------
// Unified rendering
// ---------------------------------------------------------------------------

/// Render an edit script over lines as a unified diff.
///
/// Returns an empty string when nothing changed.
pub fn render_unified(
    old_lines: &[&str],
    new_lines: &[&str],
    edits: &[Edit],
    old_label: &str,
    new_label: &str,
    context: usize,
) -> String {
    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_change())
        .map(|(i, _)| i)
        .collect();
    if changes.is_empty() {
        return String::new();
    }

    // Old/new line positions *before* each edit.
    let mut positions = Vec::with_capacity(edits.len());
    let (mut old_pos, mut new_pos) = (0usize, 0usize);
    for edit in edits {
        positions.push((old_pos, new_pos));
        match edit {
            Edit::Equal { .. } => {
                old_pos += 1;
                new_pos += 1;
            }
            Edit::Delete { .. } => old_pos += 1,
            Edit::Insert { .. } => new_pos += 1,
        }
    }

    // Merge changes whose separating context would overlap.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for &c in &changes {
        match groups.last_mut() {
            Some((_, last)) if c - *last - 1 <= 2 * context => *last = c,
            _ => groups.push((c, c)),
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "--- {old_label}");
    let _ = writeln!(out, "+++ {new_label}");

    for (first, last) in groups {
        let start = first.saturating_sub(context);
        let end = (last + 1 + context).min(edits.len());
        let hunk = &edits[start..end];

        let old_count = hunk.iter().filter(|e| !matches!(e, Edit::Insert { .. })).count();
        let new_count = hunk.iter().filter(|e| !matches!(e, Edit::Delete { .. })).count();
        let (old_before, new_before) = positions[start];

        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            hunk_range(old_before, old_count),
            hunk_range(new_before, new_count)
        );
        for edit in hunk {
            match *edit {
                Edit::Equal { old, .. } => {
                    let _ = writeln!(out, " {}", old_lines[old]);
                }
                Edit::Delete { old } => {
                    let _ = writeln!(out, "-{}", old_lines[old]);
                }
                Edit::Insert { new } => {
                    let _ = writeln!(out, "+{}", new_lines[new]);
                }
            }
        }
    }
    out
}

/// GNU-style range: `start,count`, `start` alone when count is 1, and the
/// preceding line number when the range is empty.
fn hunk_range(before: usize, count: usize) -> String {
    match count {
        0 => format!("{before},0"),
        1 => format!("{}", before + 1),
        n => format!("{},{n}", before + 1),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    /// Replays an edit script and checks it reproduces `new` from `old`.
    fn apply<'a>(old: &[&'a str], new: &[&'a str], edits: &[Edit]) -> Vec<&'a str> {
        let mut out = Vec::new();
        let (mut oi, mut ni) = (0, 0);
        for e in edits {
            match *e {
                Edit::Equal { old: o, new: n } => {
                    assert_eq!(o, oi);
                    assert_eq!(n, ni);
                    assert_eq!(old[o], new[n]);
                    out.push(old[o]);
                    oi += 1;
                    ni += 1;
                }
                Edit::Delete { old: o } => {
                    assert_eq!(o, oi);
                    oi += 1;
                }
                Edit::Insert { new: n } => {
                    assert_eq!(n, ni);
                    out.push(new[n]);
                    ni += 1;
                }
            }
        }
        assert_eq!(oi, old.len());
        assert_eq!(ni, new.len());
        out
    }

    fn cost(edits: &[Edit]) -> usize {
        edits.iter().filter(|e| e.is_change()).count()
    }

    // -- diff ----------------------------------------------------------------

    #[test]
    fn identical_inputs_are_all_equal() {
        let a = lines("one\ntwo\nthree");
        let edits = diff(&a, &a);
        assert_eq!(edits.len(), 3);
        assert_eq!(cost(&edits), 0);
    }

    #[test]
    fn empty_inputs() {
        let empty: Vec<&str> = Vec::new();
        assert!(diff(&empty, &empty).is_empty());

        let b = lines("x\ny");
        let edits = diff(&empty, &b);
        assert_eq!(edits, vec![Edit::Insert { new: 0 }, Edit::Insert { new: 1 }]);

        let edits = diff(&b, &empty);
        assert_eq!(edits, vec![Edit::Delete { old: 0 }, Edit::Delete { old: 1 }]);
    }

    #[test]
    fn classic_myers_example_is_minimal() {
        let a: Vec<char> = "ABCABBA".chars().collect();
        let b: Vec<char> = "CBABAC".chars().collect();
        let edits = diff(&a, &b);
        assert_eq!(cost(&edits), 5);
    }

    #[test]
    fn script_reproduces_target() {
        let a = lines("alpha\nbeta\ngamma\ndelta\nepsilon");
        let b = lines("alpha\ngamma\ndelta\nzeta\nepsilon\neta");
        let edits = diff(&a, &b);
        assert_eq!(apply(&a, &b, &edits), b);
        assert_eq!(cost(&edits), 3);
    }

    #[test]
    fn disjoint_inputs_replace_everything() {
        let a = lines("a\nb");
        let b = lines("c\nd\ne");
        let edits = diff(&a, &b);
        assert_eq!(apply(&a, &b, &edits), b);
        assert_eq!(cost(&edits), 5);
    }

    #[test]
    fn capped_search_still_produces_valid_script() {
        let a: Vec<u32> = (0..50).collect();
        let b: Vec<u32> = (0..50).rev().collect();
        let script = shortest_edit_script(&a, &b, 3);
        assert!(script.is_none());

        let edits = diff(&a, &b);
        let mut rebuilt = Vec::new();
        for e in &edits {
            match *e {
                Edit::Equal { old, .. } => rebuilt.push(a[old]),
                Edit::Insert { new } => rebuilt.push(b[new]),
                Edit::Delete { .. } => {}
            }
        }
        assert_eq!(rebuilt, b);
    }

    #[test]
    fn over_budget_sections_split_on_unique_lines() {
        let a: Vec<String> = (0..100)
            .flat_map(|i| [format!("keep {i}"), format!("old {i}")])
            .collect();
        let b: Vec<String> = (0..100)
            .flat_map(|i| [format!("keep {i}"), format!("new {i}")])
            .collect();
        let a_ref: Vec<&str> = a.iter().map(String::as_str).collect();
        let b_ref: Vec<&str> = b.iter().map(String::as_str).collect();
        assert!(shortest_edit_script(&a_ref, &b_ref, 10).is_none());

        let mut edits = Vec::new();
        diff_section(&a_ref, &b_ref, 0, 0, 10, 0, &mut edits);
        assert_eq!(apply(&a_ref, &b_ref, &edits), b_ref);
        assert_eq!(cost(&edits), 200);
        assert_eq!(change_blocks(&edits).len(), 100);
    }

    #[test]
    fn sections_without_anchors_are_replaced() {
        let a = lines("x\nx\ny\ny");
        let b = lines("y\ny\nx\nx");
        assert!(unique_anchors(&a, &b).is_empty());

        let mut edits = Vec::new();
        diff_section(&a, &b, 0, 0, 1, 0, &mut edits);
        assert_eq!(apply(&a, &b, &edits), b);
        assert_eq!(cost(&edits), 8);
    }

    #[test]
    fn anchors_follow_the_longest_increasing_run() {
        let a = lines("a\nb\nc\nd");
        let b = lines("b\nd\na\nc");
        assert_eq!(unique_anchors(&a, &b), vec![(1, 0), (3, 1)]);
    }

    #[test]
    fn diff_is_deterministic() {
        let a = lines("x\ny\nz\nx\ny\nz");
        let b = lines("y\nx\nz\nz\ny\nx");
        assert_eq!(diff(&a, &b), diff(&a, &b));
    }

    // -- change blocks -------------------------------------------------------

    #[test]
    fn change_blocks_split_on_equal_runs() {
        let a = lines("keep\nold1\nkeep2\nold2");
        let b = lines("keep\nnew1\nkeep2\nnew2\nnew3");
        let blocks = change_blocks(&diff(&a, &b));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].removed.len(), 1);
        assert_eq!(blocks[0].added.len(), 1);
        assert_eq!(blocks[1].removed.len(), 1);
        assert_eq!(blocks[1].added.len(), 2);
    }

    // -- unified rendering ---------------------------------------------------

    #[test]
    fn unified_empty_when_unchanged() {
        let a = lines("same");
        let edits = diff(&a, &a);
        assert_eq!(render_unified(&a, &a, &edits, "v1", "v2", 3), "");
    }

    #[test]
    fn unified_single_replacement() {
        let a = lines("A");
        let b = lines("A B");
        let edits = diff(&a, &b);
        let text = render_unified(&a, &b, &edits, "version 1", "version 2", 3);
        assert_eq!(text, "--- version 1\n+++ version 2\n@@ -1 +1 @@\n-A\n+A B\n");
    }

    #[test]
    fn unified_insertion_into_empty() {
        let a: Vec<&str> = Vec::new();
        let b = lines("first\nsecond");
        let edits = diff(&a, &b);
        let text = render_unified(&a, &b, &edits, "a", "b", 3);
        assert!(text.contains("@@ -0,0 +1,2 @@"), "{text}");
    }

    #[test]
    fn unified_separates_distant_hunks() {
        let a: Vec<String> = (1..=20).map(|i| format!("line {i}")).collect();
        let mut b = a.clone();
        b[1] = "changed 2".into();
        b[18] = "changed 19".into();
        let a_ref: Vec<&str> = a.iter().map(String::as_str).collect();
        let b_ref: Vec<&str> = b.iter().map(String::as_str).collect();
        let edits = diff(&a_ref, &b_ref);
        let text = render_unified(&a_ref, &b_ref, &edits, "a", "b", 3);
        assert_eq!(text.matches("@@ -").count(), 2, "{text}");
        assert!(text.contains("@@ -1,5 +1,5 @@"), "{text}");
        assert!(text.contains("@@ -16,5 +16,5 @@"), "{text}");
    }

    #[test]
    fn unified_merges_nearby_hunks() {
        let a: Vec<String> = (1..=10).map(|i| format!("line {i}")).collect();
        let mut b = a.clone();
        b[2] = "changed 3".into();
        b[6] = "changed 7".into();
        let a_ref: Vec<&str> = a.iter().map(String::as_str).collect();
        let b_ref: Vec<&str> = b.iter().map(String::as_str).collect();
        let edits = diff(&a_ref, &b_ref);
        let text = render_unified(&a_ref, &b_ref, &edits, "a", "b", 3);
        assert_eq!(text.matches("@@ -").count(), 1, "{text}");
        assert!(text.contains("@@ -1,10 +1,10 @@"), "{text}");
    }
}
