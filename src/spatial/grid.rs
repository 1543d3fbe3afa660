//! Terrain grid - the tile map workers walk on and items lie on

use serde::{Deserialize, Serialize};

use crate::core::types::{Coord, ItemId, NodeId};

/// Kind of ground on a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    Grass,
    Dirt,
    Road,
    Sand,
    Forest,
    Rock,
    Marsh,
    /// Forest or scrub that has been picked clean
    Clearing,
}

impl TerrainKind {
    /// Multiplier applied to the cost of stepping onto this terrain
    pub fn walk_lag(&self) -> f32 {
        match self {
            TerrainKind::Road => 0.7,
            TerrainKind::Grass | TerrainKind::Dirt | TerrainKind::Clearing => 1.0,
            TerrainKind::Rock => 1.2,
            TerrainKind::Sand => 1.5,
            TerrainKind::Forest => 1.8,
            TerrainKind::Marsh => 2.5,
        }
    }
}

/// One grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: Coord,
    /// Terrain the tile was generated with
    pub base: TerrainKind,
    /// Terrain currently in effect, if something changed it (harvesting, paving)
    pub overridden: Option<TerrainKind>,
    /// Items lying on the tile, in drop order
    pub items: Vec<ItemId>,
    /// Production node built on the tile
    pub node: Option<NodeId>,
}

impl Tile {
    pub fn new(coord: Coord, base: TerrainKind) -> Self {
        Self {
            coord,
            base,
            overridden: None,
            items: Vec::new(),
            node: None,
        }
    }

    /// Terrain in effect
    pub fn terrain(&self) -> TerrainKind {
        self.overridden.unwrap_or(self.base)
    }
}

/// Row-major tile map. Index order is ascending y, then x, which is also the
/// deterministic scan order used by every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGrid {
    pub width: u32,
    pub height: u32,
    tiles: Vec<Tile>,
}

impl TerrainGrid {
    pub fn new(width: u32, height: u32, base: TerrainKind) -> Self {
        let mut tiles = Vec::with_capacity((width * height) as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                tiles.push(Tile::new(Coord::new(x, y), base));
            }
        }
        Self { width, height, tiles }
    }

    #[inline]
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && (c.x as u32) < self.width && (c.y as u32) < self.height
    }

    #[inline]
    fn index(&self, c: Coord) -> Option<usize> {
        if self.in_bounds(c) {
            Some(c.y as usize * self.width as usize + c.x as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn get(&self, c: Coord) -> Option<&Tile> {
        self.index(c).map(|i| &self.tiles[i])
    }

    #[inline]
    pub fn get_mut(&mut self, c: Coord) -> Option<&mut Tile> {
        self.index(c).map(move |i| &mut self.tiles[i])
    }

    /// Set the base terrain of a tile, clearing any override
    pub fn set_base(&mut self, c: Coord, terrain: TerrainKind) {
        if let Some(tile) = self.get_mut(c) {
            tile.base = terrain;
            tile.overridden = None;
        }
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Tiles within `radius` (Manhattan) of `center`, in scan order
    pub fn within_radius(&self, center: Coord, radius: u32) -> impl Iterator<Item = &Tile> + '_ {
        let r = radius as i32;
        let y0 = (center.y - r).max(0);
        let y1 = (center.y + r).min(self.height as i32 - 1);
        let x0 = (center.x - r).max(0);
        let x1 = (center.x + r).min(self.width as i32 - 1);
        (y0..=y1)
            .flat_map(move |y| (x0..=x1).map(move |x| Coord::new(x, y)))
            .filter(move |c| c.manhattan(&center) <= radius)
            .filter_map(move |c| self.get(c))
    }

    /// Cost in ticks of stepping from `from` onto the adjacent `to`
    pub fn step_cost(&self, to: Coord, diagonal: bool, orthogonal: f32, diagonal_cost: f32) -> f32 {
        let base = if diagonal { diagonal_cost } else { orthogonal };
        let lag = self.get(to).map(|t| t.terrain().walk_lag()).unwrap_or(1.0);
        base * lag
    }
}
