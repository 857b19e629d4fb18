//! Composite resource IDs (`bucket,owner`, `template,repository`)

use crate::error::{ProviderError, Result};

pub const DEFAULT_SEPARATOR: &str = ",";

/// Joins ID parts with `sep`. Empty trailing parts are dropped when
/// `allow_empty_trailing` is set, so `("bucket", "")` becomes `"bucket"`.
pub fn create_resource_id(parts: &[&str], sep: &str, allow_empty_trailing: bool) -> Result<String> {
    let mut parts = parts.to_vec();
    if allow_empty_trailing {
        while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
            parts.pop();
        }
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::InvalidId {
            id: parts.join(sep),
            expected: format!("all parts to be non-empty, separated by \"{sep}\""),
        });
    }
    Ok(parts.join(sep))
}

/// Splits an ID into exactly `count` non-empty parts.
///
/// With `allow_fewer` set, trailing parts may be missing and come back as
/// empty strings.
pub fn parse_resource_id(id: &str, count: usize, sep: &str, allow_fewer: bool) -> Result<Vec<String>> {
    let parts: Vec<String> = id.split(sep).map(str::to_string).collect();
    let valid = if allow_fewer {
        (1..=count).contains(&parts.len()) && !parts.iter().any(String::is_empty)
    } else {
        parts.len() == count && !parts.iter().any(String::is_empty)
    };
    if !valid {
        let placeholders: Vec<String> = (1..=count).map(|i| format!("part{i}")).collect();
        return Err(ProviderError::InvalidId {
            id: id.to_string(),
            expected: placeholders.join(sep),
        });
    }
    let mut parts = parts;
    parts.resize(count, String::new());
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resource_id() {
        assert_eq!(create_resource_id(&["b", "123"], ",", true).unwrap(), "b,123");
        assert_eq!(create_resource_id(&["b", ""], ",", true).unwrap(), "b");
        assert!(create_resource_id(&["b", ""], ",", false).is_err());
        assert!(create_resource_id(&["", "repo"], ",", true).is_err());
    }

    #[test]
    fn test_parse_resource_id() {
        assert_eq!(
            parse_resource_id("tmpl,repo", 2, ",", false).unwrap(),
            vec!["tmpl", "repo"]
        );
        assert_eq!(
            parse_resource_id("bucket", 2, ",", true).unwrap(),
            vec!["bucket", ""]
        );

        let err = parse_resource_id("tmpl", 2, ",", false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid resource ID (tmpl), expected part1,part2"
        );
        assert!(parse_resource_id("a,b,c", 2, ",", true).is_err());
        assert!(parse_resource_id(",repo", 2, ",", false).is_err());
    }
}
