//! Identifier → output file name mapping.

/// Characters that would be interpreted as path or drive separators.
const SEPARATORS: [char; 3] = ['/', '\\', ':'];

/// Replaces path and drive separators in `identifier` with `_`.
///
/// No other normalization happens: case, whitespace and Unicode are kept
/// as is, so identifiers that differ only in a separator character map to
/// the same name (see [`crate::store::find_collisions`]).
pub fn sanitize(identifier: &str) -> String {
    identifier.replace(SEPARATORS, "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_separator() {
        assert_eq!(sanitize("a/b:c"), "a_b_c");
        assert_eq!(sanitize(r"dir\file"), "dir_file");
        assert_eq!(sanitize("::"), "__");
    }

    #[test]
    fn deterministic_and_free_of_separators() {
        let input = r"CVE-2024:1/x\y";
        let first = sanitize(input);
        assert_eq!(first, sanitize(input));
        assert!(!first.contains(SEPARATORS));
    }

    #[test]
    fn leaves_everything_else_alone() {
        assert_eq!(sanitize("Mixed Case.id-ü"), "Mixed Case.id-ü");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn separator_only_differences_collide() {
        assert_eq!(sanitize("a/b"), sanitize("a:b"));
    }
}
