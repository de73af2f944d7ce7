use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub const DEFAULT_MAX_UPLOAD_MB: i64 = 5;

/// Validate an upload before any store interaction: extension allowlist,
/// size cap, then a header sniff to confirm the bytes are actually an image.
pub fn validate_upload(
    bytes: &[u8],
    ext: &str,
    allowed_types: &str,
    max_bytes: usize,
) -> Result<(), String> {
    let ext = ext.to_lowercase();
    let allowed = allowed_types
        .split(',')
        .map(str::trim)
        .any(|a| a.eq_ignore_ascii_case(&ext));
    if !allowed {
        return Err(format!("Unsupported image type: {}", ext));
    }

    if bytes.len() > max_bytes {
        return Err(format!(
            "Image must be less than {} MB",
            max_bytes / 1_048_576
        ));
    }

    image::guess_format(bytes).map_err(|_| "File is not a valid image".to_string())?;
    Ok(())
}

/// Inline image bytes as a self-contained data URI (local-store mode).
pub fn data_uri(bytes: &[u8], ext: &str) -> String {
    format!("data:{};base64,{}", mime_for(ext), STANDARD.encode(bytes))
}

/// Object name for the remote store, derived from the block id and the
/// current timestamp to avoid collisions across re-uploads.
pub fn object_name(block_id: &str, ext: &str) -> String {
    format!(
        "{}_{}.{}",
        block_id,
        chrono::Utc::now().timestamp_millis(),
        ext.to_lowercase()
    )
}

fn mime_for(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
