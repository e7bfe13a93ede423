//! Category registry and the concurrent reconciler used during imports.
//!
//! [`CategoryRegistry`] is the caller-owned state: the ordered category list
//! and how many shapes use each category. An import never mutates it while
//! workers are running. Instead the batch runner builds a
//! [`CategoryReconciler`] from a snapshot, lets every worker resolve names
//! through it, and publishes the result back once all workers have joined.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::category::{CategoryRef, ObjectCategory};
use super::color::RgbColor;
use super::shape::BoundingShapeData;

/// Ordered categories plus per-category shape counts.
#[derive(Clone, Debug, Default)]
pub struct CategoryRegistry {
    categories: Vec<CategoryRef>,
    shape_counts: BTreeMap<String, usize>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from categories the caller already knows about.
    ///
    /// Later duplicates of a name are ignored.
    pub fn from_categories(categories: impl IntoIterator<Item = ObjectCategory>) -> Self {
        let mut registry = Self::new();
        for category in categories {
            registry.add(category);
        }
        registry
    }

    /// Adds a category, keeping its color.
    ///
    /// Returns `None` if a category with the same name already exists.
    pub fn add(&mut self, category: ObjectCategory) -> Option<CategoryRef> {
        if self.contains(category.name()) {
            return None;
        }
        let category = category.into_ref();
        self.categories.push(Arc::clone(&category));
        Some(category)
    }

    /// Removes a category and its shape count. Other entries are untouched.
    pub fn remove(&mut self, name: &str) -> Option<CategoryRef> {
        let idx = self.categories.iter().position(|c| c.name() == name)?;
        self.shape_counts.remove(name);
        Some(self.categories.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&CategoryRef> {
        self.categories.iter().find(|c| c.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn categories(&self) -> &[CategoryRef] {
        &self.categories
    }

    /// Number of shapes (nested parts included) assigned to `name`.
    pub fn shape_count(&self, name: &str) -> usize {
        self.shape_counts.get(name).copied().unwrap_or(0)
    }

    pub fn shape_counts(&self) -> &BTreeMap<String, usize> {
        &self.shape_counts
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Publishes the outcome of an import.
    ///
    /// New categories are appended in discovery order and the shape counts
    /// are replaced by the reconciled totals (which were seeded from this
    /// registry).
    pub fn publish(&mut self, reconciled: ReconciledCategories) {
        for category in reconciled.new_categories {
            if !self.contains(category.name()) {
                self.categories.push(category);
            }
        }
        self.shape_counts = reconciled.shape_counts;
    }
}

/// Result of a finished reconciliation, ready to be published.
#[derive(Clone, Debug, Default)]
pub struct ReconciledCategories {
    /// Categories first seen during the import, in discovery order.
    pub new_categories: Vec<CategoryRef>,
    /// Shape counts for every category, including the seeded ones.
    pub shape_counts: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct Slot {
    category: CategoryRef,
    // None for categories that came from the registry snapshot.
    discovered_at: Option<usize>,
}

/// Thread-safe name -> category resolution with shape counting.
///
/// Both maps are `DashMap`s: creating a missing category and bumping a count
/// each happen under a single shard lock, so no two workers can create two
/// different categories for one name.
#[derive(Debug, Default)]
pub struct CategoryReconciler {
    categories: DashMap<String, Slot>,
    shape_counts: DashMap<String, usize>,
    next_discovery: AtomicUsize,
}

impl CategoryReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the registry's categories and counts.
    pub fn from_registry(registry: &CategoryRegistry) -> Self {
        let reconciler = Self::new();
        for category in registry.categories() {
            reconciler.categories.insert(
                category.name().to_string(),
                Slot {
                    category: Arc::clone(category),
                    discovered_at: None,
                },
            );
        }
        for (name, count) in registry.shape_counts() {
            reconciler.shape_counts.insert(name.clone(), *count);
        }
        reconciler
    }

    /// Returns the canonical category for `name` and counts one more shape
    /// for it.
    ///
    /// A missing category is created with `color`, or a random color when
    /// none is given. An existing category keeps the color it already has.
    pub fn resolve(&self, name: &str, color: Option<RgbColor>) -> CategoryRef {
        let category = self.register(name, color);
        *self.shape_counts.entry(name.to_string()).or_insert(0) += 1;
        category
    }

    /// Like [`resolve`](Self::resolve) but without counting a shape.
    pub fn register(&self, name: &str, color: Option<RgbColor>) -> CategoryRef {
        if let Some(slot) = self.categories.get(name) {
            return Arc::clone(&slot.category);
        }

        let slot = self.categories.entry(name.to_string()).or_insert_with(|| {
            let order = self.next_discovery.fetch_add(1, Ordering::Relaxed);
            log::debug!("registering new category '{name}'");
            Slot {
                category: ObjectCategory::new(name, color.unwrap_or_else(RgbColor::random))
                    .into_ref(),
                discovered_at: Some(order),
            }
        });
        Arc::clone(&slot.category)
    }

    pub fn get(&self, name: &str) -> Option<CategoryRef> {
        self.categories
            .get(name)
            .map(|slot| Arc::clone(&slot.category))
    }

    pub fn shape_count(&self, name: &str) -> usize {
        self.shape_counts.get(name).map(|c| *c).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Takes back the counts of a shape (and its parts) that was resolved
    /// but is not kept.
    pub fn release(&self, shape: &BoundingShapeData) {
        shape.for_each_shape(&mut |shape| {
            if let Some(mut count) = self.shape_counts.get_mut(shape.category_name()) {
                *count = count.saturating_sub(1);
            }
        });
    }

    /// Consumes the reconciler once every worker is done with it.
    ///
    /// Categories discovered during the import are only kept if at least one
    /// shape still counts towards them.
    pub fn finish(self) -> ReconciledCategories {
        let shape_counts: BTreeMap<String, usize> = self
            .shape_counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .collect();

        let mut discovered: Vec<(usize, CategoryRef)> = self
            .categories
            .into_iter()
            .filter(|(name, _)| shape_counts.contains_key(name))
            .filter_map(|(_, slot)| slot.discovered_at.map(|order| (order, slot.category)))
            .collect();
        discovered.sort_by_key(|(order, _)| *order);

        ReconciledCategories {
            new_categories: discovered.into_iter().map(|(_, c)| c).collect(),
            shape_counts,
        }
    }
}
