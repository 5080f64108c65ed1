//! Utility functions for path manipulation.

use std::path::PathBuf;

/// Joins a directory path with a file or subdirectory name.
///
/// Non UTF-8 components are replaced lossily.
///
/// # Examples
///
/// ```
/// # use boti::utils::get_path;
/// let path = get_path("/home/user", "leaderboard");
/// assert_eq!(path, "/home/user/leaderboard");
/// ```
pub fn get_path(dir_path: &str, subdir_path: &str) -> String {
    let path_buf: PathBuf = [dir_path, subdir_path].iter().collect();
    path_buf.to_string_lossy().into_owned()
}
