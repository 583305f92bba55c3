//! Input resolution.
//!
//! The decoder wants a URI. Command line users pass either a URI
//! (`file:///...`, `http://...`, `udp://...`) or a plain path;
//! [`resolve_input`] accepts both and returns a canonical URI.

use std::path::Path;

use url::Url;

use crate::error::SieveError;

/// `true` if `input` starts with a URI scheme followed by `:`.
///
/// A scheme is an ASCII letter followed by letters, digits, `+`, `-` or
/// `.`. Single-letter schemes are rejected so Windows drive letters
/// (`C:\music.flac`) are treated as paths.
pub fn is_uri(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    scheme.len() > 1
        && first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Turn a path or URI into the URI handed to the decoder.
///
/// URIs are returned unchanged. Paths must exist; they are made absolute
/// and converted to a percent-encoded `file://` URI.
///
/// # Errors
///
/// Returns [`SieveError::InvalidInput`] if `input` is empty, is not a URI
/// and does not name an existing file, or cannot be expressed as a file URI.
///
/// # Example
///
/// ```
/// use audiosieve::resolve_input;
///
/// let uri = resolve_input("http://example.com/live.ts")?;
/// assert_eq!(uri, "http://example.com/live.ts");
/// assert!(resolve_input("no/such/file.ts").is_err());
/// # Ok::<(), audiosieve::SieveError>(())
/// ```
pub fn resolve_input(input: &str) -> Result<String, SieveError> {
    if input.trim().is_empty() {
        return Err(SieveError::InvalidInput {
            input: input.to_string(),
            reason: "input is empty".to_string(),
        });
    }

    if is_uri(input) {
        log::debug!("Using {input} as URI");
        return Ok(input.to_string());
    }

    let path = Path::new(input);
    let absolute = path.canonicalize().map_err(|error| SieveError::InvalidInput {
        input: input.to_string(),
        reason: format!("not a URI and not an accessible path ({error})"),
    })?;

    let uri = Url::from_file_path(&absolute).map_err(|()| SieveError::InvalidInput {
        input: input.to_string(),
        reason: format!("{} cannot be expressed as a file URI", absolute.display()),
    })?;

    log::debug!("Resolved {input} to {uri}");
    Ok(uri.to_string())
}

#[cfg(test)]
mod tests {
    use super::is_uri;

    #[test]
    fn recognises_schemes() {
        assert!(is_uri("file:///tmp/a.ts"));
        assert!(is_uri("http://example.com/a.ts"));
        assert!(is_uri("udp://239.0.0.1:1234"));
        assert!(is_uri("svn+ssh://host/repo"));
    }

    #[test]
    fn rejects_paths() {
        assert!(!is_uri("music.flac"));
        assert!(!is_uri("/tmp/a.ts"));
        assert!(!is_uri("C:\\music.flac"));
        assert!(!is_uri(":nothing"));
        assert!(!is_uri("1http://x"));
        assert!(!is_uri("dir with space:/x"));
    }
}
