//! Default file location for the read path.

use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;
use time::OffsetDateTime;

use crate::convention::CompiledConvention;
use crate::discovery::{list_entries, EntryKind};
use crate::{Error, Result};

/// Files responsible for one nominal file period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundFiles {
    /// Candidate paths, in the order their data is applied (later wins).
    pub paths: Vec<PathBuf>,
    /// UTC begin of the file period, when the finder knows it.
    pub file_begin: Option<OffsetDateTime>,
}

/// Build the expected path for the file period containing `begin`.
///
/// `begin` is rounded down to a file period boundary in the naming clock,
/// every folder template and the file template are formatted with it, and a
/// file name containing `*` or `?` is expanded against the folder listing.
/// The period begin is always reported, even when no file exists.
pub fn find_file_paths(
    root: &Path,
    convention: &CompiledConvention,
    begin: OffsetDateTime,
) -> Result<FoundFiles> {
    let local = convention.round_down(convention.to_local(begin));

    let mut folder = root.to_path_buf();
    for matcher in convention.folder_matchers() {
        folder.push(matcher.template().format(local));
    }
    let file_name = convention.file_template().format(local);

    let paths = if file_name.contains(|c: char| c == '*' || c == '?') {
        let pattern = wildcard_regex(&file_name)?;
        list_entries(&folder, EntryKind::File)?
            .into_iter()
            .filter(|(_, name)| pattern.is_match(name))
            .map(|(path, _)| path)
            .collect()
    } else {
        let path = folder.join(&file_name);
        if path.is_file() {
            vec![path]
        } else {
            Vec::new()
        }
    };

    debug!(
        "located {} file(s) for {} as {}",
        paths.len(),
        local,
        folder.join(&file_name).display()
    );

    Ok(FoundFiles {
        paths,
        file_begin: Some(convention.to_utc(local)),
    })
}

fn wildcard_regex(name: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(name.len() + 8);
    pattern.push('^');
    let mut buf = [0u8; 4];
    for c in name.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
        .map_err(|err| Error::config(format!("invalid file wildcard '{name}': {err}")))
}
