/// Canonicalize a human-entered subject or assignment label for lookups.
///
/// Lowercases the input and collapses each run of whitespace into a single
/// hyphen. Two labels resolve to the same index key iff they are equal
/// ignoring case and whitespace-run differences. The builder and the index
/// service must both key through this function; anything else silently
/// breaks lookups.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut in_whitespace = false;
    for c in label.chars() {
        if c.is_whitespace() {
            in_whitespace = true;
            continue;
        }
        if in_whitespace {
            out.push('-');
            in_whitespace = false;
        }
        for lower in c.to_lowercase() {
            out.push(lower);
        }
    }
    if in_whitespace {
        out.push('-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(normalize_label("Basic Math Test"), "basic-math-test");
        assert_eq!(normalize_label("Mathematics"), "mathematics");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize_label("Basic   Math \t Test"), "basic-math-test");
        assert_eq!(normalize_label("BASIC  MATH  TEST"), "basic-math-test");
    }

    #[test]
    fn case_and_run_variants_normalize_equal() {
        let variants = ["Basic Math Test", "basic math test", "BASIC  MATH\tTEST"];
        for a in variants {
            for b in variants {
                assert_eq!(normalize_label(a), normalize_label(b));
            }
        }
    }

    #[test]
    fn preserves_leading_and_trailing_runs_as_hyphens() {
        // Mirrors the original replace-all semantics: edge whitespace is a run too.
        assert_eq!(normalize_label(" Science "), "-science-");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_label(""), "");
    }
}
