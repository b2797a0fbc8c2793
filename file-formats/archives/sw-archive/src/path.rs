//! Entry path utilities
//!
//! Zip entries always use forward slashes, but the descriptors handed to the
//! patcher come from a Windows tool and usually carry backslashes. Every
//! lookup goes through [`normalize_entry_path`] so both spellings address the
//! same entry.
//!
//! # Path Separator Handling
//!
//! - **Looking up entries**: both separators are accepted
//! - **Writing entries**: names are stored with forward slashes
//! - **Extracting entries**: folder structure is flattened to the file name

/// Normalize an entry path for storage and comparison
///
/// # Examples
///
/// ```
/// use sw_archive::path::normalize_entry_path;
///
/// assert_eq!(normalize_entry_path("data\\tb_item.res"), "data/tb_item.res");
/// assert_eq!(normalize_entry_path("/data/tb_item.res"), "data/tb_item.res");
/// ```
pub fn normalize_entry_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// File name component of an entry path, used when flattening folders
///
/// # Examples
///
/// ```
/// use sw_archive::path::flattened_name;
///
/// assert_eq!(flattened_name("a\\b/c.txt"), "c.txt");
/// assert_eq!(flattened_name("c.txt"), "c.txt");
/// ```
pub fn flattened_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Join a destination directory and an entry name
///
/// An empty directory places the entry at the archive root.
pub fn join_entry_path(directory: &str, name: &str) -> String {
    let directory = normalize_entry_path(directory);
    let directory = directory.trim_end_matches('/');
    if directory.is_empty() {
        name.to_string()
    } else {
        format!("{directory}/{name}")
    }
}

/// Compare two entry paths regardless of separator style
pub fn same_entry(a: &str, b: &str) -> bool {
    normalize_entry_path(a) == normalize_entry_path(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_entry_path() {
        assert_eq!(normalize_entry_path("path/to/file.res"), "path/to/file.res");
        assert_eq!(normalize_entry_path("path\\to\\file.res"), "path/to/file.res");
        assert_eq!(normalize_entry_path("path/to\\file.res"), "path/to/file.res");
        assert_eq!(normalize_entry_path(""), "");
        assert_eq!(normalize_entry_path("file.res"), "file.res");
    }

    #[test]
    fn test_flattened_name() {
        assert_eq!(flattened_name("deep/path/to/file.res"), "file.res");
        assert_eq!(flattened_name("deep\\file.res"), "file.res");
        assert_eq!(flattened_name(""), "");
    }

    #[test]
    fn test_join_entry_path() {
        assert_eq!(join_entry_path("dir", "a.txt"), "dir/a.txt");
        assert_eq!(join_entry_path("dir\\sub\\", "a.txt"), "dir/sub/a.txt");
        assert_eq!(join_entry_path("", "a.txt"), "a.txt");
    }

    #[test]
    fn test_same_entry() {
        assert!(same_entry("dir\\a.txt", "dir/a.txt"));
        assert!(!same_entry("dir/a.txt", "dir/b.txt"));
    }
}
