//! Conversion between label-pair lists and the `key=value` string form
//! used for storage in the `tags Array(String)` column.

/// One name/value label pair. The reserved name `__name__` carries the
/// metric name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Extracts the metric name from a label set's `__name__` entry, if present.
pub fn metric_name(labels: &[Label]) -> Option<&str> {
    labels
        .iter()
        .find(|l| l.name == "__name__")
        .map(|l| l.value.as_str())
}

/// Builds `"name=value"` tag strings for every label, then sorts them
/// lexicographically. Matches the reference's `tags` column contract.
pub fn to_tag_strings(labels: &[Label]) -> Vec<String> {
    let mut tags: Vec<String> = labels
        .iter()
        .map(|l| format!("{}={}", l.name, l.value))
        .collect();
    tags.sort();
    tags
}

/// Reconstructs labels from `"name=value"` tag strings.
///
/// Splits on the first `=`. A pair whose value half is empty is dropped,
/// matching the reference's `makeLabels` behavior.
pub fn from_tag_strings(tags: &[String]) -> Vec<Label> {
    tags.iter()
        .filter_map(|tag| {
            let (name, value) = tag.split_once('=')?;
            if value.is_empty() {
                None
            } else {
                Some(Label::new(name, value))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_modulo_empty_values() {
        let labels = vec![
            Label::new("__name__", "up"),
            Label::new("job", "api"),
            Label::new("empty", ""),
        ];
        let tags = to_tag_strings(&labels);
        let back = from_tag_strings(&tags);

        let mut expected: Vec<Label> = labels
            .into_iter()
            .filter(|l| !l.value.is_empty())
            .collect();
        expected.sort_by(|a, b| a.name.cmp(&b.name));

        let mut actual = back;
        actual.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(expected, actual);
    }

    #[test]
    fn tags_are_sorted() {
        let labels = vec![Label::new("z", "1"), Label::new("a", "2")];
        let tags = to_tag_strings(&labels);
        assert_eq!(tags, vec!["a=2".to_string(), "z=1".to_string()]);
    }

    #[test]
    fn metric_name_extracted_from_reserved_label() {
        let labels = vec![Label::new("job", "api"), Label::new("__name__", "up")];
        assert_eq!(metric_name(&labels), Some("up"));
    }
}
