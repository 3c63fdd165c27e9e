//! Upload name sanitizing
//!
//! The name a caller supplies is untrusted: it ends up in a blob path and is
//! echoed back on download, so it is reduced to a flat ASCII name first.

use unicode_normalization::UnicodeNormalization;

/// Reduce an untrusted file name to `[A-Za-z0-9._-]`.
///
/// The name is NFKD-decomposed so accented letters keep their ASCII base.
/// Path separators become spaces, runs of whitespace collapse to `_`, any
/// other character is dropped, and leading/trailing `.`/`_` are stripped so
/// the result can never be `..` or a hidden file. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let decomposed: String = name.nfkd().collect();
    let flattened = decomposed.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(secure_filename("report-2024.pdf"), "report-2024.pdf");
    }

    #[test]
    fn whitespace_becomes_underscore() {
        assert_eq!(secure_filename("my  holiday photo.jpg"), "my_holiday_photo.jpg");
    }

    #[test]
    fn traversal_is_flattened() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\a.txt"), "C_Users_me_a.txt");
    }

    #[test]
    fn accents_fold_to_ascii() {
        assert_eq!(secure_filename("résumé.txt"), "resume.txt");
        assert_eq!(secure_filename("Ångström ﬁle.pdf"), "Angstrom_file.pdf");
    }

    #[test]
    fn non_latin_letters_are_dropped() {
        assert_eq!(secure_filename("日本.txt"), "txt");
        assert_eq!(secure_filename("日本"), "");
    }

    #[test]
    fn dots_only_is_empty() {
        assert_eq!(secure_filename(".."), "");
        assert_eq!(secure_filename("   "), "");
        assert_eq!(secure_filename(".bashrc"), "bashrc");
    }
}
