//! Game Map
//!
//! The world: an arena of elements keyed by [`ElementId`], the block grid,
//! and the quadtree that indexes every element's shape under its id.
//!
//! ## Coordinates
//!
//! ```text
//!   y ▲
//!     │ ┌───┬───┬───┐   grid cell (x, y) covers
//!   2 │ │   │   │   │   [x, x+1] × [y, y+1]
//!     │ ├───┼───┼───┤
//!   1 │ │   │ ■ │   │   ■ = block at cell (1, 1)
//!     │ ├───┼───┼───┤
//!   0 │ │   │   │   │
//!     └─┴───┴───┴───┴──▶ x
//!         0   1   2
//! ```
//!
//! File parsing is not handled here; maps are built from an in-memory grid.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::collision::{resolve_collision, CollisionOutcome};
use crate::game::element::{ElementId, GameElement, CELL_SIZE};
use crate::geometry::{AaRect, Collidable, GeometryError, Shape};
use crate::index::{IndexError, QuadTree, QuadTreeConfig};

/// Attempts made by [`GameMap::unoccupied_random_position`].
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 1000;

/// Map errors.
#[derive(Debug, Error)]
pub enum MapError {
    /// Element's shape is not inside the world bound
    #[error("element {0} lies outside the map")]
    OutOfBounds(ElementId),
    /// Id already present
    #[error("element {0} already exists")]
    Duplicate(ElementId),
    /// No element with this id
    #[error("element {0} not found")]
    NotFound(ElementId),
    /// Grid rows of differing length or empty grid
    #[error("invalid block grid: {0}")]
    InvalidGrid(String),
    /// Index out of sync with the element arena
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Shape replacement failed
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Static layout written into the world-init event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    /// Grid width in cells
    pub x_len: usize,
    /// Grid height in cells
    pub y_len: usize,
    /// Occupied cells as `[x, y]`
    pub blocks: Vec<[i64; 2]>,
}

/// The world.
#[derive(Debug)]
pub struct GameMap {
    x_len: usize,
    y_len: usize,
    /// Block id per cell, column-major (`x * y_len + y`)
    cells: Vec<Option<ElementId>>,
    elements: BTreeMap<ElementId, GameElement>,
    index: QuadTree<ElementId>,
    next_id: u64,
}

impl GameMap {
    /// Empty map of `x_len × y_len` cells.
    pub fn new(x_len: usize, y_len: usize) -> Self {
        Self::with_index_config(x_len, y_len, QuadTreeConfig::default())
    }

    /// Empty map with explicit quadtree tuning.
    pub fn with_index_config(x_len: usize, y_len: usize, config: QuadTreeConfig) -> Self {
        let bound = AaRect::new(
            Vec2::ZERO,
            Vec2::new(x_len as f64 * CELL_SIZE, y_len as f64 * CELL_SIZE),
        );
        Self {
            x_len,
            y_len,
            cells: vec![None; x_len * y_len],
            elements: BTreeMap::new(),
            index: QuadTree::with_config(bound, config),
            next_id: 1,
        }
    }

    /// Map from a block grid indexed `grid[x][y]`, `true` meaning a block.
    pub fn from_grid(grid: &[Vec<bool>]) -> Result<Self, MapError> {
        let x_len = grid.len();
        let y_len = grid.first().map(|col| col.len()).unwrap_or(0);
        if x_len == 0 || y_len == 0 {
            return Err(MapError::InvalidGrid("grid is empty".into()));
        }
        if grid.iter().any(|col| col.len() != y_len) {
            return Err(MapError::InvalidGrid("columns differ in length".into()));
        }

        let mut map = Self::new(x_len, y_len);
        for (x, col) in grid.iter().enumerate() {
            for (y, &solid) in col.iter().enumerate() {
                if solid {
                    map.add_block(x as i64, y as i64)?;
                }
            }
        }
        debug!("Built {}x{} map with {} blocks", x_len, y_len, map.elements.len());
        Ok(map)
    }

    /// Open arena enclosed by a one-cell wall.
    pub fn bordered(x_len: usize, y_len: usize) -> Result<Self, MapError> {
        let grid: Vec<Vec<bool>> = (0..x_len)
            .map(|x| {
                (0..y_len)
                    .map(|y| x == 0 || y == 0 || x + 1 == x_len || y + 1 == y_len)
                    .collect()
            })
            .collect();
        Self::from_grid(&grid)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Grid width in cells.
    #[inline]
    pub fn x_len(&self) -> usize {
        self.x_len
    }

    /// Grid height in cells.
    #[inline]
    pub fn y_len(&self) -> usize {
        self.y_len
    }

    /// World bound.
    pub fn bound(&self) -> AaRect {
        self.index.bound()
    }

    /// The spatial index.
    pub fn index(&self) -> &QuadTree<ElementId> {
        &self.index
    }

    /// Element by id.
    pub fn get(&self, id: ElementId) -> Option<&GameElement> {
        self.elements.get(&id)
    }

    /// Mutable element by id.
    ///
    /// The shape must not be changed through this reference; use
    /// [`GameMap::move_element`] so the index follows.
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut GameElement> {
        self.elements.get_mut(&id)
    }

    /// All elements in id order.
    pub fn elements(&self) -> impl Iterator<Item = &GameElement> {
        self.elements.values()
    }

    /// All tanks in id order.
    pub fn tanks(&self) -> impl Iterator<Item = &GameElement> {
        self.elements.values().filter(|e| e.is_tank())
    }

    /// All bullets in id order.
    pub fn bullets(&self) -> impl Iterator<Item = &GameElement> {
        self.elements.values().filter(|e| e.is_bullet())
    }

    /// Ids of elements updated every tick, in id order.
    pub fn time_updatable_ids(&self) -> Vec<ElementId> {
        self.elements
            .values()
            .filter(|e| e.is_time_updatable())
            .map(|e| e.id)
            .collect()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// No elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Block occupying cell `(x, y)`, if any.
    pub fn block_at(&self, x: i64, y: i64) -> Option<&GameElement> {
        self.cell_index(x, y)
            .and_then(|i| self.cells[i])
            .and_then(|id| self.elements.get(&id))
    }

    /// Static layout for the world-init event.
    pub fn snapshot(&self) -> MapSnapshot {
        let mut blocks = Vec::new();
        for x in 0..self.x_len {
            for y in 0..self.y_len {
                if self.cells[x * self.y_len + y].is_some() {
                    blocks.push([x as i64, y as i64]);
                }
            }
        }
        MapSnapshot {
            x_len: self.x_len,
            y_len: self.y_len,
            blocks,
        }
    }

    fn cell_index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.x_len || y as usize >= self.y_len {
            return None;
        }
        Some(x as usize * self.y_len + y as usize)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Reserve a fresh element id.
    pub fn next_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert an element and index its shape.
    pub fn add_element(&mut self, element: GameElement) -> Result<ElementId, MapError> {
        let id = element.id;
        if self.elements.contains_key(&id) {
            return Err(MapError::Duplicate(id));
        }
        if !self.index.insert(id, element.shape.clone()) {
            return Err(MapError::OutOfBounds(id));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.elements.insert(id, element);
        Ok(id)
    }

    fn add_block(&mut self, x: i64, y: i64) -> Result<ElementId, MapError> {
        let id = self.next_id();
        let added = self.add_element(GameElement::block(id, x, y))?;
        if let Some(i) = self.cell_index(x, y) {
            self.cells[i] = Some(added);
        }
        Ok(added)
    }

    /// Remove an element from the arena, the index and the grid.
    pub fn remove_element(&mut self, id: ElementId) -> Result<GameElement, MapError> {
        let element = self.elements.remove(&id).ok_or(MapError::NotFound(id))?;
        self.index.remove(&id, &element.shape)?;
        for cell in self.cells.iter_mut().filter(|c| **c == Some(id)) {
            *cell = None;
        }
        Ok(element)
    }

    /// Replace an element's shape, keeping the index in step.
    ///
    /// Returns `Ok(false)` without changing anything when the new shape
    /// would leave the world bound.
    pub fn move_element(&mut self, id: ElementId, shape: Shape) -> Result<bool, MapError> {
        if !self.index.bound().encloses(&shape.bounding_rect()) {
            return Ok(false);
        }
        let element = self.elements.get_mut(&id).ok_or(MapError::NotFound(id))?;
        self.index.remove(&id, &element.shape)?;
        element.shape.become_equivalent_to(&shape)?;
        if !self.index.insert(id, shape) {
            return Err(MapError::OutOfBounds(id));
        }
        Ok(true)
    }

    /// Apply pairwise collision effects between two elements.
    pub fn resolve_collision(&mut self, first: ElementId, second: ElementId) -> CollisionOutcome {
        resolve_collision(&mut self.elements, first, second)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Ids of elements colliding with `shape`, skipping `owner`.
    pub fn collided_with(&self, owner: ElementId, shape: &Shape) -> Vec<ElementId> {
        self.index.collided_objects(shape, Some(&owner))
    }

    /// Random position where `footprint`, centered there, fits inside the
    /// world without touching anything. `None` after
    /// [`MAX_PLACEMENT_ATTEMPTS`] misses.
    pub fn unoccupied_random_position(
        &self,
        footprint: &Shape,
        rng: &mut DeterministicRng,
    ) -> Option<Vec2> {
        let bound = self.bound();
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let candidate = rng.random_point_in(bound.min, bound.max);
            let placed = footprint.shift_to(candidate);
            if !bound.encloses(&placed.bounding_rect()) {
                continue;
            }
            if self.index.collided_objects(&placed, None).is_empty() {
                return Some(candidate);
            }
        }
        None
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::element::{BulletConfig, TankConfig, WeaponConfig};

    fn tank_at(map: &mut GameMap, center: Vec2) -> GameElement {
        let id = map.next_id();
        GameElement::tank(
            id,
            "tester",
            center,
            &TankConfig::default(),
            &WeaponConfig::default(),
            &BulletConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_bordered_map() {
        let map = GameMap::bordered(5, 4).unwrap();
        // 2 * 5 + 2 * (4 - 2) wall cells
        assert_eq!(map.len(), 14);
        assert_eq!(map.index().len(), 14);
        assert!(map.block_at(0, 0).is_some());
        assert!(map.block_at(2, 2).is_none());
        assert!(map.block_at(4, 3).is_some());
        assert!(map.block_at(5, 0).is_none());
        assert!(map.block_at(-1, 0).is_none());
        assert_eq!(map.snapshot().blocks.len(), 14);
    }

    #[test]
    fn test_from_grid_validation() {
        assert!(matches!(GameMap::from_grid(&[]), Err(MapError::InvalidGrid(_))));
        let ragged = vec![vec![false, false], vec![false]];
        assert!(matches!(GameMap::from_grid(&ragged), Err(MapError::InvalidGrid(_))));
    }

    #[test]
    fn test_add_and_remove() {
        let mut map = GameMap::new(10, 10);
        let tank = tank_at(&mut map, Vec2::new(5.0, 5.0));
        let id = map.add_element(tank).unwrap();
        assert_eq!(map.tanks().count(), 1);
        assert_eq!(map.time_updatable_ids(), vec![id]);

        let removed = map.remove_element(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(map.is_empty());
        assert!(map.index().is_empty());
        assert!(matches!(map.remove_element(id), Err(MapError::NotFound(_))));
    }

    #[test]
    fn test_add_out_of_bounds() {
        let mut map = GameMap::new(3, 3);
        let tank = tank_at(&mut map, Vec2::new(0.1, 0.1));
        assert!(matches!(map.add_element(tank), Err(MapError::OutOfBounds(_))));
        assert!(map.is_empty());
    }

    #[test]
    fn test_move_element_updates_index() {
        let mut map = GameMap::new(10, 10);
        let tank = tank_at(&mut map, Vec2::new(2.0, 2.0));
        let id = map.add_element(tank).unwrap();

        let moved = map.get(id).unwrap().shape.shift(Vec2::new(4.0, 4.0));
        assert!(map.move_element(id, moved.clone()).unwrap());
        assert!(map.get(id).unwrap().position().approx_eq(Vec2::new(6.0, 6.0)));
        assert!(map.index().holding_bound(&id, &moved).is_some());

        // leaving the world is refused, nothing changes
        let outside = moved.shift(Vec2::new(20.0, 0.0));
        assert!(!map.move_element(id, outside).unwrap());
        assert!(map.get(id).unwrap().position().approx_eq(Vec2::new(6.0, 6.0)));
        assert_eq!(map.index().len(), 1);
    }

    #[test]
    fn test_unoccupied_random_position() {
        let map = GameMap::bordered(12, 12).unwrap();
        let mut scratch = GameMap::new(1, 1);
        let footprint = tank_at(&mut scratch, Vec2::ZERO).shape;
        let mut rng = DeterministicRng::new(42);

        for _ in 0..20 {
            let pos = map.unoccupied_random_position(&footprint, &mut rng).unwrap();
            let placed = footprint.shift_to(pos);
            assert!(map.collided_with(ElementId(0), &placed).is_empty());
        }
    }

    #[test]
    fn test_no_room_returns_none() {
        let grid = vec![vec![true; 3]; 3];
        let map = GameMap::from_grid(&grid).unwrap();
        let mut scratch = GameMap::new(1, 1);
        let footprint = tank_at(&mut scratch, Vec2::ZERO).shape;
        let mut rng = DeterministicRng::new(1);
        assert_eq!(map.unoccupied_random_position(&footprint, &mut rng), None);
    }
}
