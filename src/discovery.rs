//! Candidate file discovery.
//!
//! Walks a stream's folder hierarchy one level per folder template and
//! collects the files whose names resolve to a timestamp. All timestamps
//! here live in the stream's naming clock; callers shift windows with
//! [`CompiledConvention::to_local`] before searching.
//!
//! The layout is assumed to be coarse-to-fine (`2019/2019-12/2019-12-31_12-00-00.dat`
//! is fine, `2019/12/...` is not) with files only in the innermost folders.

use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use time::PrimitiveDateTime;

use crate::cancel::CancellationToken;
use crate::convention::CompiledConvention;
use crate::matcher::{resolve_file_begin, NameMatcher, Specificity};
use crate::Result;

/// What a discovery pass is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchWindow {
    /// Files that may hold data in `[begin, end)` (naming clock).
    Range {
        begin: PrimitiveDateTime,
        end: PrimitiveDateTime,
    },
    /// Only the branch holding the earliest folder at every level.
    Earliest,
    /// Only the branch holding the latest folder at every level.
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    /// Begin of the file's data in the naming clock.
    pub begin: PrimitiveDateTime,
    pub specificity: Specificity,
}

#[derive(Debug, Clone)]
struct Folder {
    path: PathBuf,
    name: String,
    date: Option<PrimitiveDateTime>,
    parsed: bool,
}

/// Collect the files of `root` that fall into `window`, ordered by begin.
///
/// In range mode only files beginning inside `[begin, end)` are returned.
/// Sentinel modes return every file of the single followed branch.
pub fn candidate_files(
    root: &Path,
    convention: &CompiledConvention,
    window: SearchWindow,
    cancel: &CancellationToken,
) -> Result<Vec<CandidateFile>> {
    cancel.check()?;

    if !root.is_dir() {
        debug!("root {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let folders = if convention.folder_matchers().is_empty() {
        vec![Folder {
            path: root.to_path_buf(),
            name: String::new(),
            date: None,
            parsed: false,
        }]
    } else {
        candidate_folders(root, None, window, convention.folder_matchers(), cancel)?
    };

    let mut files = Vec::new();
    for folder in folders {
        cancel.check()?;
        for (path, name) in list_entries(&folder.path, EntryKind::File)? {
            let Some(found) = convention.file_matcher().match_name(&name) else {
                continue;
            };
            let Some((begin, specificity)) = resolve_file_begin(found, folder.date) else {
                continue;
            };
            if let SearchWindow::Range {
                begin: from,
                end: to,
            } = window
            {
                if begin < from || begin >= to {
                    continue;
                }
            }
            files.push(CandidateFile {
                path,
                begin,
                specificity,
            });
        }
    }

    files.sort_by(|a, b| a.begin.cmp(&b.begin).then_with(|| a.path.cmp(&b.path)));
    debug!(
        "{} candidate files under {} for {:?}",
        files.len(),
        root.display(),
        window
    );
    Ok(files)
}

fn candidate_folders(
    dir: &Path,
    parent_date: Option<PrimitiveDateTime>,
    window: SearchWindow,
    matchers: &[NameMatcher],
    cancel: &CancellationToken,
) -> Result<Vec<Folder>> {
    cancel.check()?;

    let Some((matcher, deeper)) = matchers.split_first() else {
        return Ok(Vec::new());
    };
    let template = matcher.template();

    let folders: Vec<Folder> = list_entries(dir, EntryKind::Dir)?
        .into_iter()
        .map(|(path, name)| {
            let resolved = if template.is_literal() {
                None
            } else {
                matcher
                    .match_name(&name)
                    .and_then(|found| resolve_file_begin(found, parent_date))
            };
            match resolved {
                Some((date, _)) => Folder {
                    path,
                    name,
                    date: Some(date),
                    parsed: true,
                },
                None => Folder {
                    path,
                    name,
                    date: parent_date,
                    parsed: false,
                },
            }
        })
        .collect();

    let date_aware = folders.iter().any(|folder| folder.parsed);
    let expected_name = match window {
        SearchWindow::Range { begin, .. } => template.format(begin),
        SearchWindow::Earliest => template.format(PrimitiveDateTime::MIN),
        SearchWindow::Latest => template.format(PrimitiveDateTime::MAX),
    };

    let retained: Vec<Folder> = if !date_aware {
        folders
            .into_iter()
            .filter(|folder| folder.name == expected_name)
            .collect()
    } else {
        match window {
            SearchWindow::Earliest => extreme_folder(folders, Ordering::Less)
                .into_iter()
                .collect(),
            SearchWindow::Latest => extreme_folder(folders, Ordering::Greater)
                .into_iter()
                .collect(),
            SearchWindow::Range { begin, end } => folders
                .into_iter()
                .filter(|folder| {
                    let inside = folder.parsed
                        && folder.date.is_some_and(|date| begin <= date && date < end);
                    inside || folder.name == expected_name
                })
                .collect(),
        }
    };

    debug!(
        "level '{}' under {}: {} folder(s) retained (date aware: {})",
        template.pattern(),
        dir.display(),
        retained.len(),
        date_aware
    );

    if deeper.is_empty() {
        return Ok(retained);
    }

    let mut found = Vec::new();
    for folder in retained {
        found.extend(candidate_folders(
            &folder.path,
            folder.date,
            window,
            deeper,
            cancel,
        )?);
    }
    Ok(found)
}

// Sibling folders are assumed to sort like the data they contain, so only one
// branch per level is followed.
fn extreme_folder(folders: Vec<Folder>, wanted: Ordering) -> Option<Folder> {
    folders
        .into_iter()
        .filter(|folder| folder.parsed)
        .reduce(|best, next| {
            let order = next
                .date
                .cmp(&best.date)
                .then_with(|| next.name.cmp(&best.name));
            if order == wanted {
                next
            } else {
                best
            }
        })
}

/// Recover the naming-clock begin of a file from its path alone.
///
/// The innermost folders of `path` are matched against the folder templates
/// (deepest template to deepest folder) so time-only and constant file names
/// resolve the same way they do during discovery.
pub fn resolve_path_begin(
    convention: &CompiledConvention,
    path: &Path,
) -> Option<(PrimitiveDateTime, Specificity)> {
    let file_name = path.file_name()?.to_str()?;
    let matchers = convention.folder_matchers();

    let folder_names: Vec<&str> = path
        .ancestors()
        .skip(1)
        .take(matchers.len())
        .filter_map(|ancestor| ancestor.file_name().and_then(|name| name.to_str()))
        .collect();

    let mut folder_date = None;
    let offset = matchers.len().saturating_sub(folder_names.len());
    for (matcher, name) in matchers[offset..].iter().zip(folder_names.iter().rev()) {
        if matcher.template().is_literal() {
            continue;
        }
        if let Some((date, _)) = matcher
            .match_name(name)
            .and_then(|found| resolve_file_begin(found, folder_date))
        {
            folder_date = Some(date);
        }
    }

    let found = convention.file_matcher().match_name(file_name)?;
    resolve_file_begin(found, folder_date)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Dir,
    File,
}

/// List the entries of one kind, sorted by name. A missing directory is empty.
pub(crate) fn list_entries(dir: &Path, kind: EntryKind) -> Result<Vec<(PathBuf, String)>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        let path = entry.path();
        let wanted = match kind {
            EntryKind::Dir => path.is_dir(),
            EntryKind::File => path.is_file(),
        };
        if !wanted {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => entries.push((path, name)),
            Err(name) => warn!("skipping non UTF-8 entry {:?} in {}", name, dir.display()),
        }
    }

    entries.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(entries)
}
