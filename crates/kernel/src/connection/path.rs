//! Path component checks and joining for deployer paths.
//!
//! Every fragment that originates from user input is checked before it is
//! joined into a deployer path. Offending values fail the operation; they are
//! never rewritten.

use super::ConnectionError;

/// Values rejected when they make up the whole component.
const ILLEGAL_VALUES: &[&str] = &["."];

/// Substrings rejected anywhere in a component.
const ILLEGAL_SUBSTRINGS: &[&str] = &["..", "\\", "/", "*"];

/// Check a user-supplied value that will become part of a deployer path.
pub fn path_component_check(name: &str, value: &str) -> Result<(), ConnectionError> {
    if let Some(v) = ILLEGAL_VALUES.iter().find(|v| value == **v) {
        return Err(ConnectionError::IllegalPathComponent {
            name: name.to_string(),
            reason: format!("cannot be \"{v}\""),
        });
    }

    if let Some(c) = ILLEGAL_SUBSTRINGS.iter().find(|c| value.contains(**c)) {
        return Err(ConnectionError::IllegalPathComponent {
            name: name.to_string(),
            reason: format!("cannot contain \"{c}\""),
        });
    }

    Ok(())
}

/// Join path segments with `/`, collapsing duplicate separators.
///
/// A leading `/` on the first non-empty segment is kept so absolute roots
/// stay absolute. A trailing separator is dropped.
pub fn join_path(segments: &[&str]) -> String {
    let absolute = segments
        .iter()
        .find(|s| !s.is_empty())
        .is_some_and(|s| s.starts_with('/'));

    let joined = segments
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Last segment of a `/`-separated path.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Name of the folder directly containing `path`.
pub fn parent_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => basename(&trimmed[..idx]),
        None => "",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_components() {
        for value in ["abc", "en", "nl-be", ".json", "photo.jpg", "a.b.c", ""] {
            assert!(path_component_check("id", value).is_ok(), "{value:?}");
        }
    }

    #[test]
    fn rejects_single_dot() {
        let err = path_component_check("id", ".").unwrap_err();
        assert_eq!(err.to_string(), "The value of \"id\" cannot be \".\"");
    }

    #[test]
    fn rejects_traversal_vectors() {
        for value in ["..", "../etc", "a/b", "a\\b", "*", "x*", "...", "/abs"] {
            let err = path_component_check("language", value).unwrap_err();
            assert!(err.is_validation(), "{value:?}");
        }
    }

    #[test]
    fn reports_the_offending_substring() {
        let err = path_component_check("name", "a/b").unwrap_err();
        assert_eq!(err.to_string(), "The value of \"name\" cannot contain \"/\"");
    }

    #[test]
    fn joins_segments() {
        assert_eq!(join_path(&["", "content", "en/abc.json"]), "content/en/abc.json");
        assert_eq!(join_path(&["/srv/site/", "media", "a/"]), "/srv/site/media/a");
        assert_eq!(join_path(&["media", ""]), "media");
        assert_eq!(join_path(&[]), "");
    }

    #[test]
    fn splits_names() {
        assert_eq!(basename("media/a/photo.jpg"), "photo.jpg");
        assert_eq!(basename("photo.jpg"), "photo.jpg");
        assert_eq!(parent_name("media/a/photo.jpg"), "a");
        assert_eq!(parent_name("https://cdn.test/media/b/x.png"), "b");
        assert_eq!(parent_name("x.png"), "");
    }
}
