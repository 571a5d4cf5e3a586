//! Common utility functions used across the application

/// Sanitize a word into a filename stem that is safe on all operating systems.
/// Converts to lowercase and replaces separator/special characters with
/// underscores; Danish letters (æ, ø, å) pass through untouched.
///
/// # Arguments
/// * `input` - The word or phrase to sanitize
///
/// # Returns
/// * A sanitized filename stem (lowercase with special characters replaced)
pub fn sanitize_filename(input: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' ', '\t'];
    let mut result = input.to_lowercase();
    for c in invalid_chars {
        result = result.replace(c, "_");
    }
    result
}

/// Filename (stem + extension) for a word's audio file. The primary output
/// directory and the Anki mirror use the same name so `[sound:...]`
/// references stay valid after the copy.
pub fn audio_file_name(word_key: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_filename(word_key), extension)
}
