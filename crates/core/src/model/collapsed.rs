use std::collections::BTreeMap;
use std::collections::btree_map;

/// Collapsed stacks: call path (root first) → accumulated self-time.
///
/// Keys are whole label sequences, so two paths are the same entry exactly
/// when every label matches. Iteration is in lexicographic path order,
/// which keeps paths sharing a prefix adjacent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollapsedStacks {
    stacks: BTreeMap<Vec<String>, f64>,
}

impl CollapsedStacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the entry for `path`, creating it if needed.
    pub fn add<I, S>(&mut self, path: I, value: f64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key: Vec<String> = path.into_iter().map(Into::into).collect();
        *self.stacks.entry(key).or_insert(0.0) += value;
    }

    pub fn get(&self, path: &[String]) -> Option<f64> {
        self.stacks.get(path).copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Vec<String>, f64> {
        self.stacks.iter()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.stacks.values().sum()
    }

    pub fn merge(&mut self, other: CollapsedStacks) {
        for (path, value) in other.stacks {
            *self.stacks.entry(path).or_insert(0.0) += value;
        }
    }

    /// Brendan Gregg's folded format: `a;b;c 12.5`, one line per path.
    pub fn to_folded(&self) -> String {
        let mut out = String::new();
        for (path, value) in &self.stacks {
            out.push_str(&path.join(";"));
            out.push(' ');
            out.push_str(&format!("{value:.1}"));
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for &'a CollapsedStacks {
    type Item = (&'a Vec<String>, &'a f64);
    type IntoIter = btree_map::Iter<'a, Vec<String>, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.stacks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn equal_sequences_share_an_entry() {
        let mut stacks = CollapsedStacks::new();
        stacks.add(["main", "parse"], 10.0);
        stacks.add(vec!["main".to_string(), "parse".to_string()], 5.0);
        stacks.add(["main"], 1.0);
        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks.get(&path(&["main", "parse"])), Some(15.0));
        assert_eq!(stacks.total(), 16.0);
    }

    #[test]
    fn labels_with_separators_stay_distinct() {
        let mut stacks = CollapsedStacks::new();
        stacks.add(["a;b"], 1.0);
        stacks.add(["a", "b"], 2.0);
        assert_eq!(stacks.len(), 2);
    }

    #[test]
    fn folded_output_is_sorted() {
        let mut stacks = CollapsedStacks::new();
        stacks.add(["b"], 2.0);
        stacks.add(["a", "c"], 1.0);
        assert_eq!(stacks.to_folded(), "a;c 1.0\nb 2.0\n");
    }

    #[test]
    fn merge_adds_values() {
        let mut a = CollapsedStacks::new();
        a.add(["x"], 1.0);
        let mut b = CollapsedStacks::new();
        b.add(["x"], 2.0);
        b.add(["y"], 3.0);
        a.merge(b);
        assert_eq!(a.get(&path(&["x"])), Some(3.0));
        assert_eq!(a.len(), 2);
    }
}
