//! Placeholder substitution of participant attributes into prompt text.

pub const NAME_TAG: &str = "[NAME]";
pub const GENDER_TAG: &str = "[GENDER]";

/// Replaces every `[NAME]` and `[GENDER]` in each line. An absent or
/// empty value leaves the placeholder as is. Line count and order are
/// preserved.
pub fn replace_tags(lines: &[String], name: Option<&str>, gender: Option<&str>) -> Vec<String> {
    let name = name.filter(|v| !v.is_empty()).unwrap_or(NAME_TAG);
    let gender = gender.filter(|v| !v.is_empty()).unwrap_or(GENDER_TAG);
    lines
        .iter()
        .map(|line| line.replace(NAME_TAG, name).replace(GENDER_TAG, gender))
        .collect()
}
