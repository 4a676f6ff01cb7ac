use std::path::PathBuf;

/// Output path for a preview of `source_url` when none is given:
/// `<stem>.preview.mp4` in the current directory.
pub fn default_output_path(source_url: &str) -> PathBuf {
    let stem = reqwest::Url::parse(source_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|segment| {
            let name = object_file_name(&segment);
            match name.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => name.to_string(),
            }
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "preview".to_string());

    PathBuf::from(format!("{}.preview.mp4", stem))
}

/// Last component of a Firebase-style object name, whose folders are
/// percent-encoded as `%2F` (either hex case).
fn object_file_name(segment: &str) -> &str {
    // ASCII upper-casing keeps byte offsets intact
    match segment.to_ascii_uppercase().rfind("%2F") {
        Some(idx) => &segment[idx + 3..],
        None => segment,
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
