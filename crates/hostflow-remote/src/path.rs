/// Effective remote path for an upload of `file_name` to `remote_path`.
///
/// Surrounding whitespace is dropped and backslashes become forward slashes
/// first, so a Windows-style trailing `\` also names a directory. Then an
/// empty path means `/tmp/<file>`, and a trailing `/` names a directory that
/// receives the file under its own name.
pub fn normalize_remote_path(remote_path: &str, file_name: &str) -> String {
    let path = remote_path.trim().replace('\\', "/");
    if path.is_empty() {
        format!("/tmp/{}", file_name)
    } else if path.ends_with('/') {
        format!("{}{}", path, file_name)
    } else {
        path
    }
}
