/// Maximum length for a sanitized path component
const MAX_COMPONENT_LENGTH: usize = 100;

/// Check if a character is allowed in filenames (whitelist approach)
fn is_valid_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')
}

/// Sanitize a title for use as a path component using whitelist approach
pub fn sanitize_component(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if is_valid_filename_char(c) { c } else { '-' })
        .collect();

    let collapsed = collapse_separators(&sanitized);

    let trimmed = collapsed.trim_matches(|c: char| c == '-' || c.is_whitespace());

    if trimmed.len() > MAX_COMPONENT_LENGTH {
        truncate_at_boundary(trimmed, MAX_COMPONENT_LENGTH)
    } else if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Directory name for one episode: "YYYY-MM-DD - sanitized-title"
pub fn episode_dir_name(date: &str, title: &str) -> String {
    format!("{} - {}", date, sanitize_component(title))
}

/// Media file name: "sanitized-title - scope.ext"
pub fn media_file_name(title: &str, scope: &str, extension: &str) -> String {
    format!("{} - {}.{}", sanitize_component(title), scope, extension)
}

/// Audio file extension taken from the media URL path, defaulting to "mp3"
pub fn media_extension(url: &str) -> String {
    extension_from_url(url)
        .filter(|ext| is_valid_audio_extension(ext))
        .unwrap_or_else(|| "mp3".to_string())
}

/// Image file extension taken from the image URL path, defaulting to "jpg"
pub fn image_extension(url: &str) -> String {
    extension_from_url(url)
        .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif" | "webp"))
        .unwrap_or_else(|| "jpg".to_string())
}

fn extension_from_url(url: &str) -> Option<String> {
    let path = url::Url::parse(url).ok()?;
    let filename = path
        .path_segments()
        .and_then(|mut segments| segments.next_back())?
        .to_string();
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Collapse multiple spaces and dashes into single dashes
fn collapse_separators(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_separator = false;

    for c in s.chars() {
        if c == '-' || c.is_whitespace() {
            if !last_was_separator {
                result.push('-');
                last_was_separator = true;
            }
        } else {
            result.push(c);
            last_was_separator = false;
        }
    }

    result
}

/// Truncate string at a word boundary
fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let truncated: String = s.chars().take(max_len).collect();
    if let Some(pos) = truncated.rfind('-')
        && pos > max_len / 2
    {
        return truncated[..pos].to_string();
    }

    truncated.trim_end_matches('-').to_string()
}

fn is_valid_audio_extension(ext: &str) -> bool {
    matches!(
        ext,
        "mp3" | "m4a" | "mp4" | "aac" | "ogg" | "opus" | "wav" | "flac"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_preserves_alphanumeric() {
        assert_eq!(sanitize_component("Hello123World"), "Hello123World");
    }

    #[test]
    fn sanitize_preserves_underscores_and_dots() {
        assert_eq!(sanitize_component("hello_world.test"), "hello_world.test");
    }

    #[test]
    fn sanitize_replaces_special_chars_with_dash() {
        assert_eq!(sanitize_component("a:b/c\\d"), "a-b-c-d");
    }

    #[test]
    fn sanitize_replaces_quotes_and_brackets() {
        assert_eq!(
            sanitize_component("\"quoted\" <angle> [square]"),
            "quoted-angle-square"
        );
    }

    #[test]
    fn sanitize_handles_unicode_chars() {
        assert_eq!(sanitize_component("Café résumé"), "Caf-r-sum");
    }

    #[test]
    fn sanitize_collapses_consecutive_invalid_chars() {
        assert_eq!(sanitize_component("a:::b///c"), "a-b-c");
    }

    #[test]
    fn sanitize_trims_leading_trailing_separators() {
        assert_eq!(sanitize_component("  --hello--  "), "hello");
    }

    #[test]
    fn sanitize_falls_back_for_empty_titles() {
        assert_eq!(sanitize_component(""), "untitled");
        assert_eq!(sanitize_component(":::///"), "untitled");
    }

    #[test]
    fn sanitize_handles_newlines_and_tabs() {
        assert_eq!(sanitize_component("line1\nline2\ttab"), "line1-line2-tab");
    }

    #[test]
    fn truncates_long_titles() {
        let long_title = "A".repeat(200);
        let result = sanitize_component(&long_title);
        assert!(result.len() <= MAX_COMPONENT_LENGTH);
    }

    #[test]
    fn truncate_cuts_at_word_boundary() {
        let long = "word1-word2-word3-word4-word5";
        let result = truncate_at_boundary(long, 20);
        assert!(result.len() <= 20);
        assert!(!result.ends_with('-'));
    }

    #[test]
    fn episode_dir_combines_date_and_title() {
        assert_eq!(
            episode_dir_name("2024-01-15", "My Episode: Part 2"),
            "2024-01-15 - My-Episode-Part-2"
        );
    }

    #[test]
    fn media_file_name_includes_scope_and_extension() {
        assert_eq!(
            media_file_name("Episode 1", "my_podcast", "mp3"),
            "Episode-1 - my_podcast.mp3"
        );
    }

    #[test]
    fn media_extension_from_url() {
        assert_eq!(media_extension("https://example.com/ep.m4a"), "m4a");
        assert_eq!(media_extension("https://example.com/ep.MP3"), "mp3");
    }

    #[test]
    fn media_extension_ignores_query_params() {
        assert_eq!(
            media_extension("https://example.com/episode.mp3?token=abc"),
            "mp3"
        );
    }

    #[test]
    fn media_extension_defaults_to_mp3() {
        assert_eq!(media_extension("https://example.com/episode"), "mp3");
        assert_eq!(media_extension("https://example.com/episode.html"), "mp3");
    }

    #[test]
    fn image_extension_from_url() {
        assert_eq!(image_extension("https://example.com/cover.png"), "png");
        assert_eq!(image_extension("https://example.com/cover.webp"), "webp");
    }

    #[test]
    fn image_extension_defaults_to_jpg() {
        assert_eq!(image_extension("https://example.com/cover"), "jpg");
        assert_eq!(image_extension("https://example.com/cover.tiff"), "jpg");
    }

    #[test]
    fn valid_char_rejects_path_separators() {
        assert!(!is_valid_filename_char('/'));
        assert!(!is_valid_filename_char('\\'));
        assert!(!is_valid_filename_char(':'));
        assert!(!is_valid_filename_char('*'));
        assert!(!is_valid_filename_char('|'));
    }
}
