//! Quadtree Spatial Index
//!
//! Broad-phase index over shape bounding boxes. Each shape lives in the
//! deepest node whose bound fully encloses its AABB; a leaf splits into four
//! children once it directly holds more than `capacity` shapes and its depth
//! is below `max_depth`. Splits are one-way.
//!
//! ## Node Layout
//!
//! ```text
//!   ┌─────────┬─────────┐
//!   │    1    │    0    │     children are half the parent
//!   │ top-lft │ top-rgt │     plus SPLIT_MARGIN, so a shape
//!   ├────────═╪═────────┤     sitting on a split line still
//!   │    2    │    3    │     fits inside one child
//!   │ bot-lft │ bot-rgt │
//!   └─────────┴─────────┘
//! ```
//!
//! The index keeps a snapshot of each shape as it was inserted, keyed by
//! the owner's id. Callers remove with the same pose they inserted, then
//! reinsert the new pose.

use std::fmt::Debug;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::numeric::SPLIT_MARGIN;
use crate::geometry::{collides, AaRect, Collidable, Shape};

/// Quadtree tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadTreeConfig {
    /// Shapes a leaf may hold directly before it splits
    pub capacity: usize,
    /// Depth below which no further splits happen
    pub max_depth: u32,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            max_depth: 8,
        }
    }
}

/// Index invariant violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// The shape was not held by the node its bounding box leads to
    #[error("shape {key} not found in spatial index (index and world out of sync)")]
    NotFound {
        /// Debug rendering of the missing key
        key: String,
    },
}

// =============================================================================
// NODE
// =============================================================================

#[derive(Clone, Debug)]
struct QuadNode<K> {
    depth: u32,
    bound: AaRect,
    entries: Vec<(K, Shape)>,
    children: Option<Box<[QuadNode<K>; 4]>>,
    /// Shapes held by this node and every descendant
    count: usize,
}

impl<K: Copy + Eq + Debug> QuadNode<K> {
    fn new(depth: u32, bound: AaRect) -> Self {
        Self {
            depth,
            bound,
            entries: Vec::new(),
            children: None,
            count: 0,
        }
    }

    fn child_for(&self, rect: &AaRect) -> Option<usize> {
        self.children
            .as_ref()
            .and_then(|c| c.iter().position(|child| child.bound.encloses(rect)))
    }

    fn insert(&mut self, key: K, shape: Shape, rect: AaRect, config: &QuadTreeConfig) {
        self.count += 1;

        if let Some(i) = self.child_for(&rect) {
            if let Some(children) = self.children.as_mut() {
                children[i].insert(key, shape, rect, config);
                return;
            }
        }

        self.entries.push((key, shape));

        if self.children.is_none()
            && self.entries.len() > config.capacity
            && self.depth < config.max_depth
        {
            self.split(config);
        }
    }

    fn split(&mut self, config: &QuadTreeConfig) {
        let depth = self.depth + 1;
        let quads = self.bound.quadrants(SPLIT_MARGIN);
        self.children = Some(Box::new(quads.map(|b| QuadNode::new(depth, b))));

        // Re-home directly held shapes; straddlers stay here
        let held = std::mem::take(&mut self.entries);
        for (key, shape) in held {
            let rect = shape.bounding_rect();
            match (self.child_for(&rect), self.children.as_mut()) {
                (Some(i), Some(children)) => children[i].insert(key, shape, rect, config),
                _ => self.entries.push((key, shape)),
            }
        }
    }

    fn remove(&mut self, key: &K, rect: &AaRect) -> bool {
        let removed = match (self.child_for(rect), self.children.as_mut()) {
            (Some(i), Some(children)) => children[i].remove(key, rect),
            _ => match self.entries.iter().position(|(k, _)| k == key) {
                Some(pos) => {
                    self.entries.remove(pos);
                    true
                }
                None => false,
            },
        };
        if removed {
            self.count -= 1;
        }
        removed
    }

    fn holding_bound(&self, key: &K, rect: &AaRect) -> Option<AaRect> {
        match (self.child_for(rect), self.children.as_ref()) {
            (Some(i), Some(children)) => children[i].holding_bound(key, rect),
            _ => self
                .entries
                .iter()
                .any(|(k, _)| k == key)
                .then_some(self.bound),
        }
    }

    fn collect_candidates<'a>(&'a self, rect: &AaRect, out: &mut Vec<(K, &'a Shape)>) {
        out.extend(self.entries.iter().map(|(k, s)| (*k, s)));
        if let Some(children) = self.children.as_ref() {
            match children.iter().find(|c| c.bound.encloses(rect)) {
                Some(child) => child.collect_candidates(rect, out),
                None => children.iter().for_each(|c| c.collect_all(out)),
            }
        }
    }

    fn collect_all<'a>(&'a self, out: &mut Vec<(K, &'a Shape)>) {
        out.extend(self.entries.iter().map(|(k, s)| (*k, s)));
        if let Some(children) = self.children.as_ref() {
            children.iter().for_each(|c| c.collect_all(out));
        }
    }

    fn collect_bounds(&self, out: &mut Vec<AaRect>) {
        out.push(self.bound);
        if let Some(children) = self.children.as_ref() {
            children.iter().for_each(|c| c.collect_bounds(out));
        }
    }

    fn deepest(&self) -> u32 {
        self.children
            .as_ref()
            .map(|c| c.iter().map(|n| n.deepest()).max().unwrap_or(self.depth))
            .unwrap_or(self.depth)
    }
}

// =============================================================================
// QUADTREE
// =============================================================================

/// Quadtree keyed by the owner id of each shape.
#[derive(Clone, Debug)]
pub struct QuadTree<K> {
    root: QuadNode<K>,
    config: QuadTreeConfig,
}

impl<K: Copy + Eq + Debug> QuadTree<K> {
    /// Empty tree over `bound` with default tuning.
    pub fn new(bound: AaRect) -> Self {
        Self::with_config(bound, QuadTreeConfig::default())
    }

    /// Empty tree over `bound`.
    pub fn with_config(bound: AaRect, config: QuadTreeConfig) -> Self {
        Self {
            root: QuadNode::new(0, bound),
            config,
        }
    }

    /// Root bound.
    #[inline]
    pub fn bound(&self) -> AaRect {
        self.root.bound
    }

    /// Tuning in use.
    pub fn config(&self) -> &QuadTreeConfig {
        &self.config
    }

    /// Number of indexed shapes.
    #[inline]
    pub fn len(&self) -> usize {
        self.root.count
    }

    /// No shapes indexed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.count == 0
    }

    /// Drop every shape and every split.
    pub fn clear(&mut self) {
        self.root = QuadNode::new(0, self.root.bound);
    }

    /// Index `shape` under `key`.
    ///
    /// Returns false, leaving the tree untouched, if the root bound does not
    /// enclose the shape's bounding box.
    pub fn insert(&mut self, key: K, shape: Shape) -> bool {
        let rect = shape.bounding_rect();
        if !self.root.bound.encloses(&rect) {
            return false;
        }
        self.root.insert(key, shape, rect, &self.config);
        true
    }

    /// Remove the entry for `key`, descending by `shape`'s bounding box.
    ///
    /// `shape` must be the pose that was inserted. A miss means the index
    /// and its owner disagree and is reported, never retried.
    pub fn remove(&mut self, key: &K, shape: &Shape) -> Result<(), IndexError> {
        let rect = shape.bounding_rect();
        if self.root.remove(key, &rect) {
            Ok(())
        } else {
            Err(IndexError::NotFound {
                key: format!("{:?}", key),
            })
        }
    }

    /// Bound of the node holding `key` (located through `shape`).
    pub fn holding_bound(&self, key: &K, shape: &Shape) -> Option<AaRect> {
        self.root.holding_bound(key, &shape.bounding_rect())
    }

    /// Overinclusive candidate set for `shape`.
    ///
    /// Everything held along the descent path, plus the whole subtree below
    /// the point where no single child encloses the query.
    pub fn possible_collisions(&self, shape: &Shape) -> Vec<(K, &Shape)> {
        let mut out = Vec::new();
        self.root.collect_candidates(&shape.bounding_rect(), &mut out);
        out
    }

    /// Keys of indexed shapes that truly collide with `shape`, skipping
    /// `exclude`.
    pub fn collided_objects(&self, shape: &Shape, exclude: Option<&K>) -> Vec<K> {
        self.possible_collisions(shape)
            .into_iter()
            .filter(|(k, _)| Some(k) != exclude)
            .filter(|(_, s)| collides(*s, shape))
            .map(|(k, _)| k)
            .collect()
    }

    /// Every indexed entry, parents before children.
    pub fn entries(&self) -> Vec<(K, &Shape)> {
        let mut out = Vec::with_capacity(self.len());
        self.root.collect_all(&mut out);
        out
    }

    /// Bound of every node, parents before children.
    pub fn partition_bounds(&self) -> Vec<AaRect> {
        let mut out = Vec::new();
        self.root.collect_bounds(&mut out);
        out
    }

    /// Deepest node depth currently present.
    pub fn depth(&self) -> u32 {
        self.root.deepest()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::geometry::Polygon;
    use proptest::prelude::*;

    fn world() -> AaRect {
        AaRect::new(Vec2::ZERO, Vec2::new(100.0, 100.0))
    }

    fn unit_square(x: f64, y: f64) -> Shape {
        Polygon::rect_from_bottom_left(Vec2::new(x, y), 1.0, 1.0).into()
    }

    impl<K: Copy + Eq + Debug> QuadNode<K> {
        fn check(&self, config: &QuadTreeConfig) -> usize {
            for (_, s) in &self.entries {
                assert!(self.bound.encloses(&s.bounding_rect()));
            }
            let below: usize = self
                .children
                .as_ref()
                .map(|c| c.iter().map(|n| n.check(config)).sum())
                .unwrap_or(0);
            assert_eq!(self.count, self.entries.len() + below);
            self.count
        }

        fn max_direct(&self) -> usize {
            let below = self
                .children
                .as_ref()
                .map(|c| c.iter().map(|n| n.max_direct()).max().unwrap_or(0))
                .unwrap_or(0);
            self.entries.len().max(below)
        }
    }

    #[test]
    fn test_insert_outside_root_fails() {
        let mut tree: QuadTree<u32> = QuadTree::new(world());
        assert!(!tree.insert(1, unit_square(99.5, 50.0)));
        assert!(!tree.insert(2, unit_square(-3.0, -3.0)));
        assert!(tree.is_empty());
        assert!(tree.insert(3, unit_square(99.0, 99.0)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_split_threshold() {
        let mut tree: QuadTree<u32> = QuadTree::new(world());
        let spots = [(10.0, 10.0), (80.0, 10.0), (10.0, 80.0), (80.0, 80.0)];
        for (i, (x, y)) in spots.iter().enumerate() {
            assert!(tree.insert(i as u32, unit_square(*x, *y)));
        }
        assert_eq!(tree.partition_bounds().len(), 1);

        assert!(tree.insert(4, unit_square(30.0, 30.0)));
        // exactly one split: root plus four children
        assert_eq!(tree.partition_bounds().len(), 5);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.len(), 5);
        assert!(tree.root.max_direct() <= 4);
        tree.root.check(&tree.config);
    }

    #[test]
    fn test_straddler_stays_at_parent() {
        let mut tree: QuadTree<u32> = QuadTree::new(world());
        let center: Shape = Polygon::rect(Vec2::new(50.0, 50.0), 4.0, 4.0).into();
        tree.insert(0, center.clone());
        for i in 1..5 {
            tree.insert(i, unit_square(5.0 * i as f64, 5.0));
        }
        assert_eq!(tree.holding_bound(&0, &center), Some(world()));
        let child = tree.holding_bound(&1, &unit_square(5.0, 5.0)).unwrap();
        assert!(child.width() < 60.0);
    }

    #[test]
    fn test_remove_missing_is_error() {
        let mut tree: QuadTree<u32> = QuadTree::new(world());
        tree.insert(1, unit_square(1.0, 1.0));
        let err = tree.remove(&2, &unit_square(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
        assert_eq!(tree.len(), 1);

        tree.remove(&1, &unit_square(1.0, 1.0)).unwrap();
        assert!(tree.is_empty());
        assert!(tree.remove(&1, &unit_square(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_insert_remove_round_trip() {
        let mut tree: QuadTree<u32> = QuadTree::new(world());
        for i in 0..6 {
            tree.insert(i, unit_square(12.0 * i as f64 + 1.0, 7.0 * i as f64 + 1.0));
        }
        let bounds_before = tree.partition_bounds();
        let keys_before: Vec<u32> = tree.entries().iter().map(|(k, _)| *k).collect();

        let probe = unit_square(60.0, 20.0);
        assert!(tree.insert(99, probe.clone()));
        tree.remove(&99, &probe).unwrap();

        assert_eq!(tree.partition_bounds(), bounds_before);
        let keys_after: Vec<u32> = tree.entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys_after, keys_before);
        assert_eq!(tree.len(), 6);
        tree.root.check(&tree.config);
    }

    #[test]
    fn test_collided_objects_excludes_self() {
        let mut tree: QuadTree<u32> = QuadTree::new(world());
        let a = unit_square(10.0, 10.0);
        let b = unit_square(10.5, 10.5);
        let far = unit_square(70.0, 70.0);
        tree.insert(1, a.clone());
        tree.insert(2, b);
        tree.insert(3, far);

        assert_eq!(tree.collided_objects(&a, Some(&1)), vec![2]);
        let mut both = tree.collided_objects(&a, None);
        both.sort();
        assert_eq!(both, vec![1, 2]);
    }

    #[test]
    fn test_clear() {
        let mut tree: QuadTree<u32> = QuadTree::new(world());
        for i in 0..10 {
            tree.insert(i, unit_square(9.0 * i as f64, 9.0 * i as f64));
        }
        assert!(tree.partition_bounds().len() > 1);
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.partition_bounds(), vec![world()]);
    }

    #[test]
    fn test_max_depth_stops_splitting() {
        let config = QuadTreeConfig { capacity: 1, max_depth: 2 };
        let mut tree: QuadTree<u32> = QuadTree::with_config(world(), config);
        for i in 0..8 {
            tree.insert(i, unit_square(1.0 + 0.1 * i as f64, 1.0));
        }
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.len(), 8);
        tree.root.check(&tree.config);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(f64, f64, f64),
        Remove(usize),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0.0..110.0f64, 0.0..110.0f64, 0.1..20.0f64)
                .prop_map(|(x, y, s)| Op::Insert(x, y, s)),
            1 => (0usize..64).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_index_conservation(ops in prop::collection::vec(arb_op(), 1..80)) {
            let mut tree: QuadTree<u32> = QuadTree::new(world());
            let mut live: Vec<(u32, Shape)> = Vec::new();
            let mut next = 0u32;

            for op in ops {
                match op {
                    Op::Insert(x, y, s) => {
                        let shape: Shape =
                            Polygon::rect_from_bottom_left(Vec2::new(x, y), s, s).into();
                        if tree.insert(next, shape.clone()) {
                            live.push((next, shape));
                        }
                        next += 1;
                    }
                    Op::Remove(i) if !live.is_empty() => {
                        let (key, shape) = live.remove(i % live.len());
                        prop_assert!(tree.remove(&key, &shape).is_ok());
                    }
                    Op::Remove(_) => {}
                }
            }

            prop_assert_eq!(tree.len(), live.len());
            prop_assert_eq!(tree.root.check(&tree.config), live.len());
            for (key, shape) in &live {
                let bound = tree.holding_bound(key, shape);
                prop_assert!(bound.is_some());
                prop_assert!(bound.unwrap().encloses(&shape.bounding_rect()));
            }
        }

        #[test]
        fn prop_possible_is_superset(
            squares in prop::collection::vec((0.0..90.0f64, 0.0..90.0f64, 0.5..10.0f64), 1..40),
            qx in 0.0..90.0f64,
            qy in 0.0..90.0f64,
            qs in 0.5..10.0f64,
        ) {
            let mut tree: QuadTree<usize> = QuadTree::new(world());
            for (i, (x, y, s)) in squares.iter().enumerate() {
                tree.insert(i, Polygon::rect_from_bottom_left(Vec2::new(*x, *y), *s, *s).into());
            }
            let query: Shape = Polygon::rect_from_bottom_left(Vec2::new(qx, qy), qs, qs).into();

            let possible: Vec<usize> =
                tree.possible_collisions(&query).iter().map(|(k, _)| *k).collect();
            for hit in tree.collided_objects(&query, None) {
                prop_assert!(possible.contains(&hit));
            }
        }
    }
}
