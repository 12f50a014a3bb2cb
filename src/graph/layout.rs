use crate::git::types::Commit;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Number of lane colors a renderer is expected to cycle through
pub const DEFAULT_PALETTE_SIZE: usize = 8;

/// Where a commit sits in the drawn graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitPosition {
    pub hash: String,
    pub column: usize,
    pub parents: Vec<String>,
    /// Columns with an unresolved lane after this commit's row
    pub active_columns: BTreeSet<usize>,
}

/// Assign columns to a newest-first commit page in a single forward pass.
///
/// Lanes are keyed by the hash they are waiting for. A commit takes the
/// lane expecting it (or the lowest free column), hands that lane to its
/// first parent and opens new lanes for any other parents nobody is
/// waiting for yet. Parents outside the page simply leave their lane open.
pub fn layout(commits: &[Commit]) -> HashMap<String, CommitPosition> {
    let mut expected: BTreeMap<usize, String> = BTreeMap::new();
    let mut positions = HashMap::with_capacity(commits.len());

    for commit in commits {
        let column =
            column_expecting(&expected, &commit.hash).unwrap_or_else(|| lowest_free(&expected));
        expected.retain(|_, hash| *hash != commit.hash);

        let mut parents = commit.parent_hashes.iter();
        if let Some(first) = parents.next() {
            match column_expecting(&expected, first) {
                // Converges into a lane to the left; this column is released
                Some(other) if other < column => {}
                Some(other) => {
                    expected.remove(&other);
                    expected.insert(column, first.clone());
                }
                None => {
                    expected.insert(column, first.clone());
                }
            }
        }
        for parent in parents {
            if column_expecting(&expected, parent).is_none() {
                let free = lowest_free(&expected);
                expected.insert(free, parent.clone());
            }
        }

        positions.insert(
            commit.hash.clone(),
            CommitPosition {
                hash: commit.hash.clone(),
                column,
                parents: commit.parent_hashes.clone(),
                active_columns: expected.keys().copied().collect(),
            },
        );
    }

    positions
}

/// Palette index for a column; reused columns may change color
pub fn lane_color(column: usize, palette_size: usize) -> usize {
    if palette_size == 0 {
        return 0;
    }
    column % palette_size
}

/// One-line ASCII rendering of a row: `*` for the commit, `|` for open lanes
pub fn lane_markers(position: &CommitPosition) -> String {
    let width = position
        .active_columns
        .iter()
        .copied()
        .chain(std::iter::once(position.column))
        .max()
        .map_or(0, |max| max + 1);

    (0..width)
        .map(|column| {
            if column == position.column {
                '*'
            } else if position.active_columns.contains(&column) {
                '|'
            } else {
                ' '
            }
        })
        .collect()
}

fn column_expecting(expected: &BTreeMap<usize, String>, hash: &str) -> Option<usize> {
    expected
        .iter()
        .find(|(_, waiting_for)| waiting_for.as_str() == hash)
        .map(|(column, _)| *column)
}

fn lowest_free(expected: &BTreeMap<usize, String>) -> usize {
    (0..expected.len())
        .find(|column| !expected.contains_key(column))
        .unwrap_or(expected.len())
}
