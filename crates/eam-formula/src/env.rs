//! Insertion-ordered binding environment.

use std::collections::HashMap;

/// Name → vector lookup, preserving first-insertion order.
///
/// Order matters downstream: the final snapshot of a resolution pass becomes
/// a table row whose column order is the insertion order. Re-binding an
/// existing name replaces the value in place (shadowing keeps the original
/// column position).
#[derive(Debug, Clone, Default)]
pub struct Env {
    names: Vec<String>,
    values: HashMap<String, Vec<f64>>,
}

impl Env {
    /// Empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Vec<f64>)>) -> Self {
        let mut env = Self::new();
        for (name, value) in pairs {
            env.insert(name, value);
        }
        env
    }

    /// Look up a name.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// First element of a name's vector, if bound and non-empty.
    pub fn get_scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.first().copied())
    }

    /// Bind or re-bind a name.
    pub fn insert(&mut self, name: impl Into<String>, value: Vec<f64>) {
        let name = name.into();
        if !self.values.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.values.insert(name, value);
    }

    /// Whether a name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bound names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the environment is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(name, value)` iteration in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names.iter().map(move |n| (n.as_str(), self.values[n].as_slice()))
    }

    /// Project the `row`-th element of every binding into a scalar-valued
    /// environment (length-1 vectors recycle).
    pub fn row(&self, row: usize) -> Env {
        let mut out = Env::new();
        for (name, values) in self.iter() {
            let x = match values.len() {
                0 => f64::NAN,
                1 => values[0],
                k => values[row % k],
            };
            out.insert(name, vec![x]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_preserved_under_shadowing() {
        let mut env = Env::new();
        env.insert("a", vec![1.0]);
        env.insert("b", vec![2.0]);
        env.insert("a", vec![3.0]);
        assert_eq!(env.names(), ["a".to_string(), "b".to_string()]);
        assert_eq!(env.get("a").unwrap(), &[3.0]);
    }

    #[test]
    fn row_projection_recycles_scalars() {
        let env = Env::from_pairs([
            ("v".to_string(), vec![1.0, 2.0, 3.0]),
            ("a".to_string(), vec![9.0]),
        ]);
        let r1 = env.row(1);
        assert_eq!(r1.get("v").unwrap(), &[2.0]);
        assert_eq!(r1.get("a").unwrap(), &[9.0]);
    }
}
