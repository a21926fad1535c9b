/// Canonical form of an order identifier: the leading run of `#` and
/// whitespace is removed, then trailing whitespace.
///
/// `"#1001"`, `" # 1001 "` and `"1001"` all normalize to `"1001"`. A fixed
/// point: normalizing twice yields the same key as normalizing once.
pub fn normalize(raw: &str) -> String {
    raw.trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .trim_end()
        .to_string()
}
