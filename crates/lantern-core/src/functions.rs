//! Small helper functions for query result post-processing

/// Delimiter used by [`join_default`]
pub const DEFAULT_DELIMITER: &str = ",";

/// Join `strings` with `delimiter`
///
/// Returns `None` when either argument is `None`.
pub fn join<S: AsRef<str>>(strings: Option<&[S]>, delimiter: Option<&str>) -> Option<String> {
    let strings = strings?;
    let delimiter = delimiter?;

    let mut out = String::new();
    for (i, s) in strings.iter().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        out.push_str(s.as_ref());
    }
    Some(out)
}

/// Join `strings` with [`DEFAULT_DELIMITER`]
pub fn join_default<S: AsRef<str>>(strings: Option<&[S]>) -> Option<String> {
    join(strings, Some(DEFAULT_DELIMITER))
}

/// Aggregation keeping the last non-null value seen
#[derive(Debug, Clone, PartialEq)]
pub struct Last<T> {
    value: Option<T>,
}

impl<T> Default for Last<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> Last<T> {
    /// An empty aggregation
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one row; nulls are skipped
    pub fn aggregate(&mut self, value: Option<T>) {
        if value.is_some() {
            self.value = value;
        }
    }

    /// Last non-null value, if any
    pub fn result(self) -> Option<T> {
        self.value
    }

    /// Peek at the current value
    pub fn current(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> Extend<Option<T>> for Last<T> {
    fn extend<It: IntoIterator<Item = Option<T>>>(&mut self, iter: It) {
        for value in iter {
            self.aggregate(value);
        }
    }
}

impl<T> FromIterator<Option<T>> for Last<T> {
    fn from_iter<It: IntoIterator<Item = Option<T>>>(iter: It) -> Self {
        let mut last = Self::new();
        last.extend(iter);
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_with_delimiter() {
        assert_eq!(join(Some(&["a", "b", "c"][..]), Some("-")), Some("a-b-c".to_string()));
    }

    #[test]
    fn test_join_default_delimiter() {
        let parts = vec!["Hello".to_string(), "World".to_string()];
        assert_eq!(join_default(Some(&parts[..])), Some("Hello,World".to_string()));
    }

    #[test]
    fn test_join_null_inputs() {
        assert_eq!(join::<&str>(None, Some(",")), None);
        assert_eq!(join(Some(&["a"][..]), None), None);
    }

    #[test]
    fn test_join_empty_list() {
        let empty: [&str; 0] = [];
        assert_eq!(join(Some(&empty[..]), Some(",")), Some(String::new()));
    }

    #[test]
    fn test_last_skips_nulls() {
        let last: Last<&str> = vec![Some("Keanu Reeves"), Some("Carrie-Anne Moss"), None]
            .into_iter()
            .collect();
        assert_eq!(last.result(), Some("Carrie-Anne Moss"));
    }

    #[test]
    fn test_last_all_nulls() {
        let mut last = Last::<i64>::new();
        last.aggregate(None);
        last.aggregate(None);
        assert_eq!(last.current(), None);
        assert_eq!(last.result(), None);
    }
}
