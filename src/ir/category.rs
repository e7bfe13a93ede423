//! Object categories (class labels).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::color::RgbColor;

/// Shared handle to a category. Every shape of one category holds a clone of
/// the same `Arc`.
pub type CategoryRef = Arc<ObjectCategory>;

/// A named, colored label assignable to shapes.
///
/// Two categories are equal iff their names are equal (case-sensitive); the
/// color does not take part in equality or hashing.
#[derive(Clone, Debug)]
pub struct ObjectCategory {
    name: String,
    color: RgbColor,
}

impl ObjectCategory {
    pub fn new(name: impl Into<String>, color: RgbColor) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> RgbColor {
        self.color
    }

    pub fn into_ref(self) -> CategoryRef {
        Arc::new(self)
    }
}

impl PartialEq for ObjectCategory {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ObjectCategory {}

impl Hash for ObjectCategory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_color() {
        let a = ObjectCategory::new("dog", RgbColor::rgb(1, 2, 3));
        let b = ObjectCategory::new("dog", RgbColor::rgb(9, 9, 9));
        let c = ObjectCategory::new("Dog", RgbColor::rgb(1, 2, 3));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
