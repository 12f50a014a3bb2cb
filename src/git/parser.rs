use crate::git::types::{Branch, Commit, CommitStats, FileDiff, GitStatus, Remote};
use chrono::DateTime;
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Field separator used in the `git log` format string
pub const LOG_FIELD_SEPARATOR: char = '\x1f';

/// `git log --format` argument matching [`parse_log`]
pub const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%an%x1f%ad%x1f%s%x1f%D";

/// `git branch --format` argument matching [`parse_branch_list`]
pub const BRANCH_FORMAT: &str = "--format=%(HEAD)%00%(refname)";

/// One parsed line of `git status --porcelain=v1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Absolute path of the file, built from the repository root
    pub path: PathBuf,
    pub status: GitStatus,
    /// True when the change is recorded in the index
    pub staged: bool,
}

/// Parse `git status --porcelain=v1` output into entries rooted at `root`.
///
/// Lines that cannot be understood are skipped with a warning; they never
/// abort the rest of the parse.
pub fn parse_status_porcelain_v1(root: &Path, output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_status_line(line) {
            Ok((status, staged, relative)) => entries.push(StatusEntry {
                path: repo_path(root, &relative),
                status,
                staged,
            }),
            Err(reason) => warn!("Skipping status line {:?}: {}", line, reason),
        }
    }

    entries
}

fn parse_status_line(line: &str) -> Result<(GitStatus, bool, String), &'static str> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 {
        return Err("line too short");
    }
    if !bytes[0].is_ascii() || !bytes[1].is_ascii() {
        return Err("non-ASCII status code");
    }

    let index = bytes[0] as char;
    let worktree = bytes[1] as char;
    let status = resolve_status(index, worktree).ok_or("unknown status code")?;

    let rest = line[2..].trim_start_matches(' ');
    let raw_path = if index == 'R' || index == 'C' || worktree == 'R' {
        rename_target(rest)
    } else {
        rest
    };
    let path = unquote_path(raw_path);
    if path.is_empty() {
        return Err("empty path");
    }

    let staged = !matches!(index, ' ' | '?');
    Ok((status, staged, path))
}

/// Map the two porcelain status columns onto a single status.
///
/// The index column wins; the worktree column is only consulted when the
/// index is unchanged. `??` is always untracked.
pub fn resolve_status(index: char, worktree: char) -> Option<GitStatus> {
    if index == '?' && worktree == '?' {
        return Some(GitStatus::Untracked);
    }

    match index {
        'A' => Some(GitStatus::Added),
        'M' => Some(GitStatus::Modified),
        'D' => Some(GitStatus::Deleted),
        'R' => Some(GitStatus::Renamed),
        'U' => Some(GitStatus::Conflicted),
        'T' => Some(GitStatus::Typechange),
        ' ' | '?' => match worktree {
            'M' => Some(GitStatus::WdModified),
            'D' => Some(GitStatus::WdDeleted),
            'A' => Some(GitStatus::Added),
            'T' => Some(GitStatus::WdTypechange),
            'R' => Some(GitStatus::WdRenamed),
            _ => None,
        },
        _ => None,
    }
}

/// For `old -> new`, keep only `new`
fn rename_target(rest: &str) -> &str {
    if let Some(quoted) = rest.strip_prefix('"') {
        let mut escaped = false;
        for (i, c) in quoted.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    if let Some(target) = quoted[i + 1..].strip_prefix(" -> ") {
                        return target;
                    }
                    break;
                }
                _ => escaped = false,
            }
        }
    }

    match rest.split_once(" -> ") {
        Some((_, target)) => target,
        None => rest,
    }
}

/// Undo git's C-style quoting of unusual paths (`"caf\303\251.txt"`)
pub fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(next) => {
                            value = value * 8 + next;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Join a git-relative path (always `/`-separated) onto `root` as an
/// OS-native map key
pub fn repo_path(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in relative.split('/').filter(|c| !c.is_empty()) {
        path.push(component);
    }
    normalize_key(path)
}

#[cfg(windows)]
fn normalize_key(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('/', "\\").to_lowercase())
}

#[cfg(not(windows))]
fn normalize_key(path: PathBuf) -> PathBuf {
    path
}

/// Parse `git branch -a` output produced with [`BRANCH_FORMAT`]
pub fn parse_branch_list(output: &str) -> Vec<Branch> {
    let mut branches = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let Some((head, refname)) = line.split_once('\0') else {
            warn!("Skipping branch line {:?}: missing separator", line);
            continue;
        };
        let current = head.trim() == "*";

        if let Some(name) = refname.strip_prefix("refs/heads/") {
            branches.push(Branch {
                name: name.to_string(),
                current,
                remote: None,
            });
        } else if let Some(name) = refname.strip_prefix("refs/remotes/") {
            let Some((remote, branch)) = name.split_once('/') else {
                continue;
            };
            if branch == "HEAD" {
                continue;
            }
            branches.push(Branch {
                name: name.to_string(),
                current,
                remote: Some(remote.to_string()),
            });
        } else {
            // Detached HEAD shows up as a pseudo-entry
            debug!("Ignoring non-branch ref {:?}", refname);
        }
    }

    branches
}

/// Parse `git log` output produced with [`LOG_FORMAT`] and `--date=iso-strict`
pub fn parse_log(output: &str) -> Vec<Commit> {
    let mut commits = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(LOG_FIELD_SEPARATOR).collect();
        if parts.len() < 5 {
            warn!("Skipping log line {:?}: expected at least 5 fields", line);
            continue;
        }

        let date = match DateTime::parse_from_rfc3339(parts[3].trim()) {
            Ok(date) => date,
            Err(e) => {
                warn!("Skipping commit {}: bad date {:?}: {}", parts[0], parts[3], e);
                continue;
            }
        };

        commits.push(Commit {
            hash: parts[0].trim().to_string(),
            parent_hashes: parts[1].split_whitespace().map(str::to_string).collect(),
            author: parts[2].to_string(),
            date,
            message: parts[4].to_string(),
            branch: branch_from_decorations(parts.get(5).copied().unwrap_or("")),
            file_changes: None,
        });
    }

    commits
}

/// Pick a display branch name from `%D` decorations.
///
/// Prefers a local branch, then an `origin/` branch with the prefix
/// stripped, then falls back to `HEAD`.
pub fn branch_from_decorations(refs: &str) -> String {
    let names: Vec<&str> = refs
        .split(',')
        .map(|r| r.trim())
        .map(|r| r.strip_prefix("HEAD -> ").unwrap_or(r))
        .filter(|r| !r.is_empty())
        .collect();

    let local = names.iter().find(|r| {
        !r.contains("HEAD") && !r.contains("origin/") && !r.starts_with("tag:")
    });
    if let Some(local) = local {
        return local.to_string();
    }

    names
        .iter()
        .find_map(|r| r.strip_prefix("origin/").filter(|b| *b != "HEAD"))
        .map(str::to_string)
        .unwrap_or_else(|| "HEAD".to_string())
}

/// Parse `git show --numstat --format=` output into commit totals.
///
/// Binary files (`-` counts) are listed but add no lines.
pub fn parse_numstat(output: &str) -> Option<CommitStats> {
    let mut stats = CommitStats::default();

    for line in output.lines() {
        let mut fields = line.splitn(3, '\t');
        let (Some(added), Some(deleted), Some(file)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        stats.additions += added.parse::<usize>().unwrap_or(0);
        stats.deletions += deleted.parse::<usize>().unwrap_or(0);
        stats.files.push(file.to_string());
    }

    if stats.files.is_empty() {
        None
    } else {
        Some(stats)
    }
}

/// Count added and removed lines inside the hunks of a unified diff
pub fn count_diff_lines(diff: &str) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    let mut in_hunk = false;

    for line in diff.lines() {
        if line.starts_with("diff --git") {
            in_hunk = false;
        } else if line.starts_with("@@") {
            in_hunk = true;
        } else if in_hunk {
            if line.starts_with('+') {
                additions += 1;
            } else if line.starts_with('-') {
                deletions += 1;
            }
        }
    }

    (additions, deletions)
}

/// Build a unified diff that adds `content` as a new file
pub fn synthesize_new_file_diff(relative: &str, content: &str) -> FileDiff {
    let lines: Vec<&str> = content.lines().collect();

    let mut changes = format!(
        "diff --git a/{path} b/{path}\nnew file mode 100644\n--- /dev/null\n+++ b/{path}\n@@ -0,0 +1,{count} @@\n",
        path = relative,
        count = lines.len()
    );
    for line in &lines {
        changes.push('+');
        changes.push_str(line);
        changes.push('\n');
    }

    FileDiff {
        additions: lines.len(),
        deletions: 0,
        changes,
    }
}

/// Parse `git remote -v`, keeping one entry per remote (the fetch URL)
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();

    for line in output.lines() {
        let Some((name, rest)) = line.split_once('\t') else {
            continue;
        };
        let (url, kind) = rest.rsplit_once(' ').unwrap_or((rest, ""));
        if kind == "(push)" || remotes.iter().any(|r| r.name == name) {
            continue;
        }

        remotes.push(Remote {
            name: name.to_string(),
            url: url.to_string(),
        });
    }

    remotes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/repo")
    }

    fn single(line: &str) -> StatusEntry {
        let entries = parse_status_porcelain_v1(&root(), line);
        assert_eq!(entries.len(), 1, "expected one entry for {:?}", line);
        entries.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_status_table() {
        let staged = single("M  src/a.ts");
        assert_eq!(staged.status, GitStatus::Modified);
        assert!(staged.staged);

        let unstaged = single(" M src/b.ts");
        assert_eq!(unstaged.status, GitStatus::WdModified);
        assert!(!unstaged.staged);

        let untracked = single("?? src/c.ts");
        assert_eq!(untracked.status, GitStatus::Untracked);
        assert!(!untracked.staged);

        let added_then_modified = single("AM src/d.ts");
        assert_eq!(added_then_modified.status, GitStatus::Added);
        assert!(added_then_modified.staged);
    }

    #[test]
    fn test_parse_status_paths_are_absolute() {
        let entry = single(" M src/nested/b.ts");
        assert_eq!(entry.path, root().join("src").join("nested").join("b.ts"));
        assert!(entry.path.is_absolute());
    }

    #[test]
    fn test_leading_space_on_first_line_is_kept() {
        let entries = parse_status_porcelain_v1(&root(), " M first.rs\n D second.rs\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, GitStatus::WdModified);
        assert_eq!(entries[1].status, GitStatus::WdDeleted);
    }

    #[test]
    fn test_index_codes() {
        assert_eq!(resolve_status('A', ' '), Some(GitStatus::Added));
        assert_eq!(resolve_status('D', ' '), Some(GitStatus::Deleted));
        assert_eq!(resolve_status('R', 'M'), Some(GitStatus::Renamed));
        assert_eq!(resolve_status('U', 'U'), Some(GitStatus::Conflicted));
        assert_eq!(resolve_status('T', ' '), Some(GitStatus::Typechange));
        assert_eq!(resolve_status(' ', 'A'), Some(GitStatus::Added));
        assert_eq!(resolve_status(' ', 'T'), Some(GitStatus::WdTypechange));
        assert_eq!(resolve_status('!', '!'), None);
        assert_eq!(resolve_status('C', ' '), None);
    }

    #[test]
    fn test_rename_keeps_new_path() {
        let entry = single("R  old/name.rs -> new/name.rs");
        assert_eq!(entry.status, GitStatus::Renamed);
        assert_eq!(entry.path, root().join("new").join("name.rs"));
    }

    #[test]
    fn test_rename_with_quoted_paths() {
        let entry = single("R  \"old -> odd.rs\" -> \"new file.rs\"");
        assert_eq!(entry.path, root().join("new file.rs"));
    }

    #[test]
    fn test_quoted_path_is_unquoted() {
        let entry = single("?? \"caf\\303\\251 menu.txt\"");
        assert_eq!(entry.path, root().join("café menu.txt"));
    }

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote_path("plain.txt"), "plain.txt");
        assert_eq!(unquote_path("\"tab\\there\""), "tab\there");
        assert_eq!(unquote_path("\"quote\\\"d\""), "quote\"d");
        assert_eq!(unquote_path("\"back\\\\slash\""), "back\\slash");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let output = "M\n!! ignored.txt\nXY what.txt\n?? \n M good.rs\n";
        let entries = parse_status_porcelain_v1(&root(), output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, root().join("good.rs"));
    }

    #[test]
    fn test_parse_branch_list() {
        let output = "*\0refs/heads/main\n \0refs/heads/feature/x\n \0refs/remotes/origin/HEAD\n \0refs/remotes/origin/main\n";
        let branches = parse_branch_list(output);

        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0].name, "main");
        assert!(branches[0].current);
        assert_eq!(branches[0].remote, None);
        assert_eq!(branches[1].name, "feature/x");
        assert!(!branches[1].current);
        assert_eq!(branches[2].name, "origin/main");
        assert_eq!(branches[2].remote.as_deref(), Some("origin"));
    }

    #[test]
    fn test_parse_branch_list_detached() {
        let output = "*\0(HEAD detached at 1a2b3c4)\n \0refs/heads/main\n";
        let branches = parse_branch_list(output);
        assert_eq!(branches.len(), 1);
        assert!(!branches[0].current);
    }

    #[test]
    fn test_parse_log() {
        let output = "aaa\x1fbbb ccc\x1fAda\x1f2024-03-01T10:00:00+01:00\x1fMerge feature\x1fHEAD -> main, origin/main\n\
                      bbb\x1fddd\x1fBob\x1f2024-02-28T09:30:00Z\x1fAdd README\x1f\n";
        let commits = parse_log(output);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "aaa");
        assert_eq!(commits[0].parent_hashes, vec!["bbb", "ccc"]);
        assert_eq!(commits[0].author, "Ada");
        assert_eq!(commits[0].message, "Merge feature");
        assert_eq!(commits[0].branch, "main");
        assert_eq!(commits[0].date.to_rfc3339(), "2024-03-01T10:00:00+01:00");
        assert_eq!(commits[1].parent_hashes, vec!["ddd"]);
        assert_eq!(commits[1].branch, "HEAD");
    }

    #[test]
    fn test_parse_log_root_commit_and_bad_lines() {
        let output = "abc\x1f\x1fAda\x1f2024-01-01T00:00:00Z\x1fInitial\n\
                      short\x1fline\n\
                      def\x1fabc\x1fAda\x1fyesterday\x1fBad date\n";
        let commits = parse_log(output);

        assert_eq!(commits.len(), 1);
        assert!(commits[0].parent_hashes.is_empty());
        assert_eq!(commits[0].branch, "HEAD");
    }

    #[test]
    fn test_branch_from_decorations() {
        assert_eq!(branch_from_decorations(""), "HEAD");
        assert_eq!(branch_from_decorations("tag: v1.0, feature"), "feature");
        assert_eq!(branch_from_decorations("origin/release"), "release");
        assert_eq!(branch_from_decorations("HEAD"), "HEAD");
        assert_eq!(branch_from_decorations("origin/HEAD, origin/main"), "main");
    }

    #[test]
    fn test_parse_numstat() {
        let output = "10\t2\tsrc/lib.rs\n-\t-\tassets/logo.png\n3\t0\tREADME.md\n";
        let stats = parse_numstat(output).unwrap();

        assert_eq!(stats.additions, 13);
        assert_eq!(stats.deletions, 2);
        assert_eq!(stats.files, vec!["src/lib.rs", "assets/logo.png", "README.md"]);
        assert!(parse_numstat("").is_none());
    }

    #[test]
    fn test_count_diff_lines_ignores_headers() {
        let diff = "diff --git a/x b/x\nindex 1..2 100644\n--- a/x\n+++ b/x\n@@ -1,2 +1,2 @@\n-old\n--- looks like a header\n+new\n context\n";
        assert_eq!(count_diff_lines(diff), (1, 2));
    }

    #[test]
    fn test_synthesize_new_file_diff() {
        let diff = synthesize_new_file_diff("notes.txt", "one\ntwo\n");
        assert_eq!(diff.additions, 2);
        assert_eq!(diff.deletions, 0);
        assert!(diff.changes.contains("@@ -0,0 +1,2 @@"));
        assert!(diff.changes.ends_with("+one\n+two\n"));
        assert_eq!(count_diff_lines(&diff.changes), (2, 0));
    }

    #[test]
    fn test_parse_remotes() {
        let output = "origin\thttps://example.com/a.git (fetch)\norigin\thttps://example.com/a.git (push)\nupstream\tgit@example.com:b.git (fetch)\nupstream\tgit@example.com:b.git (push)\n";
        let remotes = parse_remotes(output);

        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].name, "origin");
        assert_eq!(remotes[0].url, "https://example.com/a.git");
        assert_eq!(remotes[1].name, "upstream");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_status_porcelain_v1(&root(), "").is_empty());
        assert!(parse_log("").is_empty());
        assert!(parse_branch_list("").is_empty());
        assert!(parse_remotes("").is_empty());
    }
}
