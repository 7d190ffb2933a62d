//! Filename normalization.
//!
//! Mapping policy, applied in order:
//! 1. lower-case the whole input (Unicode-aware);
//! 2. NFKD-decompose and drop combining marks, so accented letters become
//!    their base ASCII letter (`ü` → `u`);
//! 3. transliterate the few letters with no decomposition (`ß` → `ss`,
//!    `æ` → `ae`, `ø` → `o`, ...);
//! 4. keep `[a-z0-9.-]`; every other run of characters (spaces, punctuation,
//!    path separators, `_`, unknown scripts) becomes a single `_`;
//! 5. no `_` at either end or next to `.`/`-`, no leading `.`, no `..`.
//!
//! An input with nothing left to keep becomes `file`.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const MAX_FILENAME_LENGTH: usize = 255;
const FALLBACK_FILENAME: &str = "file";

fn transliterate(c: char) -> Option<&'static str> {
    match c {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ø' => Some("o"),
        'ł' => Some("l"),
        'đ' | 'ð' => Some("d"),
        'þ' => Some("th"),
        'ı' => Some("i"),
        _ => None,
    }
}

fn push_kept(out: &mut String, pending_separator: &mut bool, c: char) {
    let last = out.chars().last();
    match c {
        '.' => {
            if last.is_some() && last != Some('.') {
                out.push('.');
            }
        }
        '-' => out.push('-'),
        c => {
            if *pending_separator && !matches!(last, None | Some('.') | Some('-')) {
                out.push('_');
            }
            out.push(c);
        }
    }
    *pending_separator = false;
}

pub fn normalize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.to_lowercase().nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' {
            push_kept(&mut out, &mut pending_separator, c);
        } else if let Some(ascii) = transliterate(c) {
            for t in ascii.chars() {
                push_kept(&mut out, &mut pending_separator, t);
            }
        } else {
            pending_separator = true;
        }
    }

    let truncated: String = out.chars().take(MAX_FILENAME_LENGTH).collect();
    let normalized = truncated.trim_end_matches(['_', '.']);

    if normalized.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(name: &str) {
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.-".contains(c)));
        assert!(!name.contains("__"));
        assert!(!name.starts_with('_') && !name.ends_with('_'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn test_accented_mixed_case_with_punctuation() {
        assert_eq!(normalize_filename("Ünïcode Pic (2).PNG"), "unicode_pic_2.png");
    }

    #[test]
    fn test_spaces_and_symbols_collapse() {
        assert_eq!(normalize_filename("My  Holiday   Video!!.mp4"), "my_holiday_video.mp4");
        assert_eq!(normalize_filename("__already__snake__.txt"), "already_snake.txt");
        assert_eq!(normalize_filename("a - b.txt"), "a-b.txt");
    }

    #[test]
    fn test_transliteration() {
        assert_eq!(normalize_filename("Straße Ærø.jpg"), "strasse_aero.jpg");
        assert_eq!(normalize_filename("Crème Brûlée.JPEG"), "creme_brulee.jpeg");
    }

    #[test]
    fn test_path_components_flattened() {
        assert_eq!(normalize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(normalize_filename("folder/sub dir/clip.mov"), "folder_sub_dir_clip.mov");
    }

    #[test]
    fn test_nothing_left_falls_back() {
        assert_eq!(normalize_filename(""), "file");
        assert_eq!(normalize_filename("..."), "file");
        assert_eq!(normalize_filename("日本語"), "file");
    }

    #[test]
    fn test_idempotent_and_well_formed() {
        for input in [
            "Ünïcode Pic (2).PNG",
            "  spaced out  .md",
            "ÀÉÎÕÜ ñ ç.wav",
            "report (final) [v2].pdf",
            ".hidden file",
            "tabs\tand\nnewlines.txt",
        ] {
            let once = normalize_filename(input);
            assert_well_formed(&once);
            assert_eq!(normalize_filename(&once), once);
        }
    }
}
