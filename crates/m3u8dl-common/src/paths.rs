//! Path utilities for naming transcoder output.

/// Extension carried by media playlists.
pub const PLAYLIST_EXTENSION: &str = ".m3u8";

/// Default extension for transcoder output (MPEG transport stream).
pub const DEFAULT_OUTPUT_EXTENSION: &str = "ts";

/// Derive the output filename for a playlist URL.
///
/// The basename of the URL's path is used with its playlist extension
/// stripped and `extension` appended. Query strings and fragments are
/// ignored. An empty basename falls back to `output`.
///
/// # Examples
///
/// ```
/// use m3u8dl_common::paths::output_name;
///
/// assert_eq!(output_name("http://cdn.example/v/index.m3u8", "ts"), "index.ts");
/// assert_eq!(output_name("http://cdn.example/v/index.m3u8?sig=1", "mp4"), "index.mp4");
/// assert_eq!(output_name("http://cdn.example/", "ts"), "output.ts");
/// ```
pub fn output_name(url: &str, extension: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let basename = path.rsplit('/').next().unwrap_or(path);
    let stem = basename.strip_suffix(PLAYLIST_EXTENSION).unwrap_or(basename);
    let stem = if stem.is_empty() { "output" } else { stem };
    let extension = extension.trim_start_matches('.');
    format!("{stem}.{extension}")
}

/// Whether `operand` looks like a remote playlist URL rather than a path.
///
/// # Examples
///
/// ```
/// use m3u8dl_common::paths::is_remote_url;
///
/// assert!(is_remote_url("http://example.com/a.m3u8"));
/// assert!(is_remote_url("https://example.com/a.m3u8"));
/// assert!(!is_remote_url("queue.txt"));
/// ```
pub fn is_remote_url(operand: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| operand.len() > scheme.len() && operand.starts_with(scheme))
}
