//! Character-level text diff (Myers' O(ND) longest common subsequence)
//!
//! The common prefix and suffix are trimmed first, so a local edit in a
//! large file only diffs the changed middle. If the middle needs more than
//! [`MAX_EDIT_DISTANCE`] insertions plus deletions, the whole middle is
//! replaced instead of searching further.

use super::EditKind;

/// Largest edit distance searched before falling back to a full replace
pub const MAX_EDIT_DISTANCE: usize = 1000;

/// A maximal run of one kind of change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: EditKind,
    pub text: String,
}

/// Diff two texts into alternating equal/delete/insert chunks
pub fn diff(old: &str, new: &str) -> Vec<Chunk> {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let middle_a = &a[prefix..a.len() - suffix];
    let middle_b = &b[prefix..b.len() - suffix];

    let mut chunks = Vec::new();
    push(&mut chunks, EditKind::Equal, &a[..prefix]);
    match shortest_edit(middle_a, middle_b) {
        Some(steps) => {
            for (kind, c) in steps {
                push(&mut chunks, kind, &[c]);
            }
        }
        None => {
            push(&mut chunks, EditKind::Delete, middle_a);
            push(&mut chunks, EditKind::Insert, middle_b);
        }
    }
    push(&mut chunks, EditKind::Equal, &a[a.len() - suffix..]);
    chunks
}

fn push(chunks: &mut Vec<Chunk>, kind: EditKind, chars: &[char]) {
    if chars.is_empty() {
        return;
    }
    match chunks.last_mut() {
        Some(last) if last.kind == kind => last.text.extend(chars),
        _ => chunks.push(Chunk { kind, text: chars.iter().collect() }),
    }
}

/// Myers' greedy forward search with a per-round trace for backtracking.
///
/// Returns `None` when the edit distance exceeds [`MAX_EDIT_DISTANCE`].
fn shortest_edit(a: &[char], b: &[char]) -> Option<Vec<(EditKind, char)>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let limit = (a.len() + b.len()).min(MAX_EDIT_DISTANCE) as isize;
    let width = limit + 2;
    let mut v = vec![0isize; (2 * width + 1) as usize];
    // trace[d] holds V for diagonals -(d+1)..=(d+1) as it was before round d
    let mut trace: Vec<Vec<isize>> = Vec::new();

    for d in 0..=limit {
        trace.push(v[(width - d - 1) as usize..=(width + d + 1) as usize].to_vec());
        let mut k = -d;
        while k <= d {
            let i = (width + k) as usize;
            let mut x = if k == -d || (k != d && v[i - 1] < v[i + 1]) {
                v[i + 1]
            } else {
                v[i - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[i] = x;
            if x >= n && y >= m {
                return Some(backtrack(a, b, &trace));
            }
            k += 2;
        }
    }
    None
}

fn backtrack(a: &[char], b: &[char], trace: &[Vec<isize>]) -> Vec<(EditKind, char)> {
    let mut x = a.len() as isize;
    let mut y = b.len() as isize;
    let mut steps = Vec::with_capacity(a.len() + b.len());

    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let at = |k: isize| v[(k + d + 1) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) { k + 1 } else { k - 1 };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            steps.push((EditKind::Equal, a[x as usize]));
        }
        if d > 0 {
            if x == prev_x {
                steps.push((EditKind::Insert, b[prev_y as usize]));
            } else {
                steps.push((EditKind::Delete, a[prev_x as usize]));
            }
        }
        x = prev_x;
        y = prev_y;
    }

    steps.reverse();
    steps
}
