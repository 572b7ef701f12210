//! Canonicalization of titles, authors and ISBNs for duplicate detection.
//!
//! Matching between book requests and catalog entries is done on these
//! normalized forms only, so every caller must go through this module —
//! two sites normalizing differently would silently stop matching.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::error::{AppError, AppResult};

/// Canonical comparison form of a free-text field (title, author).
///
/// Unicode-decomposes, strips diacritics, lowercases, and collapses every
/// run of characters outside `[a-z0-9]` into a single space.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;

    for c in input.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        for lc in c.to_lowercase() {
            if lc.is_ascii_alphanumeric() {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(lc);
            } else {
                pending_space = true;
            }
        }
    }

    out
}

/// Canonical comparison form of an ISBN: digits and the check character X,
/// uppercased, everything else stripped.
pub fn normalize_isbn(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Derived identity of a book request, used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKey {
    pub normalized_isbn: Option<String>,
    pub normalized_title: Option<String>,
    pub normalized_author: Option<String>,
    pub request_key: String,
}

/// Derive the dedup key for a book request.
///
/// An ISBN alone is sufficient; without one, both title and author are
/// required. Fields that normalize to the empty string count as absent.
pub fn create_request_key(
    isbn: Option<&str>,
    title: Option<&str>,
    author: Option<&str>,
) -> AppResult<RequestKey> {
    let normalized_isbn = isbn.map(normalize_isbn).filter(|s| !s.is_empty());
    let normalized_title = title.map(normalize_text).filter(|s| !s.is_empty());
    let normalized_author = author.map(normalize_text).filter(|s| !s.is_empty());

    let request_key = if let Some(ref i) = normalized_isbn {
        format!("isbn:{}", i)
    } else {
        match (&normalized_title, &normalized_author) {
            (Some(t), Some(a)) => format!("title_author:{}|{}", t, a),
            _ => {
                return Err(AppError::Validation(
                    "A book request needs an ISBN, or both a title and an author".to_string(),
                ))
            }
        }
    };

    Ok(RequestKey {
        normalized_isbn,
        normalized_title,
        normalized_author,
        request_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_strips_diacritics_and_punctuation() {
        assert_eq!(normalize_text("  Cien años de soledad!  "), "cien anos de soledad");
        assert_eq!(normalize_text("J.R.R. Tolkien"), "j r r tolkien");
        assert_eq!(normalize_text("The  Hobbit"), "the hobbit");
        assert_eq!(normalize_text("Ça c'est ÉTÉ"), "ca c est ete");
    }

    #[test]
    fn text_on_only_punctuation_is_empty() {
        assert_eq!(normalize_text("!?-—"), "");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn isbn_keeps_digits_and_check_character() {
        assert_eq!(normalize_isbn("ISBN 978-0-1234-5678-x"), "978012345678X");
        assert_eq!(normalize_isbn("978-1-4028-9462-6"), "9781402894626");
        assert_eq!(normalize_isbn("no digits here"), "");
    }

    #[test]
    fn key_prefers_isbn() {
        let key = create_request_key(Some("978-1-4028-9462-6"), None, None).unwrap();
        assert_eq!(key.request_key, "isbn:9781402894626");
        assert_eq!(key.normalized_title, None);
        assert_eq!(key.normalized_author, None);

        // ISBN wins even when title and author are supplied
        let key =
            create_request_key(Some("978-1-4028-9462-6"), Some("The Hobbit"), Some("Tolkien"))
                .unwrap();
        assert_eq!(key.request_key, "isbn:9781402894626");
        assert_eq!(key.normalized_title.as_deref(), Some("the hobbit"));
    }

    #[test]
    fn key_falls_back_to_title_author() {
        let key = create_request_key(None, Some("The Hobbit"), Some("J.R.R. Tolkien")).unwrap();
        assert_eq!(key.request_key, "title_author:the hobbit|j r r tolkien");
    }

    #[test]
    fn key_requires_isbn_or_complete_pair() {
        assert!(create_request_key(None, Some("Only title"), None).is_err());
        assert!(create_request_key(None, None, Some("Only author")).is_err());
        assert!(create_request_key(None, None, None).is_err());
        // whitespace-only ISBN normalizes to empty, so the pair rule applies
        assert!(create_request_key(Some("  "), Some("Only title"), None).is_err());
    }
}
