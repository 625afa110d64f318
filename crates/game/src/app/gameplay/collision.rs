use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{write_text_atomic_with_retry, Rect, Vec2};
use thiserror::Error;
use tracing::{debug, info};

pub(crate) const GRID_SIZE: f32 = 32.0;
const GRID_SIZE_PX: i32 = 32;

/// One grid cell; the block occupying it spans `[col*32, col*32+32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Cell {
    pub(crate) row: i32,
    pub(crate) col: i32,
}

impl Cell {
    pub(crate) fn containing(point: Vec2) -> Self {
        Self {
            col: (point.x / GRID_SIZE).floor() as i32,
            row: (point.y / GRID_SIZE).floor() as i32,
        }
    }

    pub(crate) fn origin_px(self) -> (i32, i32) {
        (self.col * GRID_SIZE_PX, self.row * GRID_SIZE_PX)
    }

    pub(crate) fn rect(self) -> Rect {
        let (x, y) = self.origin_px();
        Rect::new(x as f32, y as f32, GRID_SIZE, GRID_SIZE)
    }
}

#[derive(Debug, Error)]
pub(crate) enum BlockFileError {
    #[error("failed to read block file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("block file {path} line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("failed to write block file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Grid-aligned blockers over a fixed-size world. Cells are kept ordered so
/// serialization is stable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CollisionWorld {
    width: f32,
    height: f32,
    cells: BTreeSet<Cell>,
}

impl CollisionWorld {
    pub(crate) fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            cells: BTreeSet::new(),
        }
    }

    pub(crate) fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    pub(crate) fn block_rects(&self) -> impl Iterator<Item = Rect> + '_ {
        self.cells.iter().map(|cell| cell.rect())
    }

    fn cell_in_bounds(&self, cell: Cell) -> bool {
        cell.col >= 0 && cell.row >= 0 && cell.rect().is_within(&self.bounds())
    }

    fn insert_cell(&mut self, cell: Cell) -> bool {
        self.cell_in_bounds(cell) && self.cells.insert(cell)
    }

    /// Snaps `point` to its cell. Returns false for duplicates and cells
    /// outside the world.
    pub(crate) fn add_block(&mut self, point: Vec2) -> bool {
        self.insert_cell(Cell::containing(point))
    }

    pub(crate) fn remove_block(&mut self, point: Vec2) -> bool {
        self.cells.remove(&Cell::containing(point))
    }

    /// Adds every cell between the cells containing `a` and `b`, both
    /// inclusive. Returns the cells that were new.
    pub(crate) fn add_cells_between(&mut self, a: Vec2, b: Vec2) -> Vec<Cell> {
        let first = Cell::containing(a);
        let second = Cell::containing(b);
        let mut added = Vec::new();
        for row in first.row.min(second.row)..=first.row.max(second.row) {
            for col in first.col.min(second.col)..=first.col.max(second.col) {
                let cell = Cell { row, col };
                if self.insert_cell(cell) {
                    added.push(cell);
                }
            }
        }
        added
    }

    /// True when any block overlaps `rect` (shared edges do not count).
    pub(crate) fn overlaps_block(&self, rect: &Rect) -> bool {
        if self.cells.is_empty() || rect.w <= 0.0 || rect.h <= 0.0 {
            return false;
        }
        let first = Cell::containing(Vec2::new(rect.x, rect.y));
        let last = Cell {
            col: (rect.right() / GRID_SIZE).ceil() as i32 - 1,
            row: (rect.bottom() / GRID_SIZE).ceil() as i32 - 1,
        };
        (first.row..=last.row).any(|row| {
            (first.col..=last.col).any(|col| {
                let cell = Cell { row, col };
                self.cells.contains(&cell) && cell.rect().intersects(rect)
            })
        })
    }

    /// False when a body of `size` placed at `candidate` would leave the world
    /// or overlap a block.
    pub(crate) fn can_move(&self, size: Vec2, candidate: Vec2) -> bool {
        let rect = Rect::at(candidate, size);
        rect.is_within(&self.bounds()) && !self.overlaps_block(&rect)
    }

    /// One `x,y,w,h` record per line, sorted by row then column.
    pub(crate) fn to_file_text(&self) -> String {
        self.cells
            .iter()
            .map(|cell| {
                let (x, y) = cell.origin_px();
                format!("{x},{y},{GRID_SIZE_PX},{GRID_SIZE_PX}\n")
            })
            .collect()
    }

    /// Replaces the block set with the records in `text`. Records covering
    /// several cells add all of them; records outside the world are dropped.
    pub(crate) fn load_file_text(
        &mut self,
        text: &str,
        path: &Path,
    ) -> Result<usize, BlockFileError> {
        let mut cells = BTreeSet::new();
        let mut duplicates = 0_usize;
        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            let rect = parse_record(line).map_err(|reason| BlockFileError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            })?;
            let Some(rect) = rect.clip_to(&self.bounds()) else {
                continue;
            };
            let first = Cell::containing(Vec2::new(rect.x, rect.y));
            let last = Cell::containing(Vec2::new(rect.right() - 1.0, rect.bottom() - 1.0));
            for row in first.row..=last.row {
                for col in first.col..=last.col {
                    let cell = Cell { row, col };
                    if self.cell_in_bounds(cell) && !cells.insert(cell) {
                        duplicates += 1;
                    }
                }
            }
        }
        if duplicates > 0 {
            debug!(path = %path.display(), duplicates, "block_file_duplicates_merged");
        }
        self.cells = cells;
        Ok(self.cells.len())
    }
}

fn parse_record(line: &str) -> Result<Rect, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 comma-separated integers, found {}", fields.len()));
    }
    let mut values = [0_i32; 4];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .parse::<i32>()
            .map_err(|error| format!("invalid integer '{field}': {error}"))?;
    }
    let [x, y, w, h] = values;
    if w <= 0 || h <= 0 {
        return Err(format!("block size must be positive, got {w}x{h}"));
    }
    Ok(Rect::new(x as f32, y as f32, w as f32, h as f32))
}

/// Block file for one level under the data directory.
#[derive(Debug, Clone)]
pub(crate) struct BlockStore {
    path: PathBuf,
}

impl BlockStore {
    pub(crate) fn for_level(data_dir: &Path, level: u32) -> Self {
        Self {
            path: data_dir.join(format!("collision_data_level{level}.txt")),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty level, not an error.
    pub(crate) fn load_into(&self, world: &mut CollisionWorld) -> Result<usize, BlockFileError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(BlockFileError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let count = world.load_file_text(&text, &self.path)?;
        info!(path = %self.path.display(), blocks = count, "block_file_loaded");
        Ok(count)
    }

    pub(crate) fn save(&self, world: &CollisionWorld) -> Result<(), BlockFileError> {
        write_text_atomic_with_retry(&self.path, &world.to_file_text()).map_err(|source| {
            BlockFileError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        debug!(path = %self.path.display(), blocks = world.len(), "block_file_saved");
        Ok(())
    }
}

/// Result of one click or drag in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Placement {
    pub(crate) kept: usize,
    /// New cells taken back because `keep` rejected them.
    pub(crate) rejected: usize,
}

/// Paused placement mode. Pointer positions are world coordinates.
#[derive(Debug, Default, Clone)]
pub(crate) struct CollisionEditor {
    active: bool,
    drag_anchor: Option<Vec2>,
    placed_this_session: u32,
}

impl CollisionEditor {
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the new state. Leaving the editor drops any unfinished drag.
    pub(crate) fn toggle(&mut self) -> bool {
        self.active = !self.active;
        self.drag_anchor = None;
        self.active
    }

    pub(crate) fn drag_anchor(&self) -> Option<Vec2> {
        self.drag_anchor
    }

    pub(crate) fn pointer_pressed(&mut self, point: Vec2) {
        if self.active {
            self.drag_anchor = Some(point);
        }
    }

    /// Completes a click or drag. Cells new to `world` that fail `keep` are
    /// removed again; only the kept ones count toward the session total. A
    /// release with no matching press adds nothing.
    pub(crate) fn pointer_released(
        &mut self,
        point: Vec2,
        world: &mut CollisionWorld,
        keep: impl Fn(&Rect) -> bool,
    ) -> Placement {
        if !self.active {
            return Placement::default();
        }
        let Some(anchor) = self.drag_anchor.take() else {
            return Placement::default();
        };
        let added = if Cell::containing(anchor) == Cell::containing(point) {
            let cell = Cell::containing(point);
            if world.add_block(point) {
                vec![cell]
            } else {
                Vec::new()
            }
        } else {
            world.add_cells_between(anchor, point)
        };
        let mut placement = Placement::default();
        for cell in added {
            if keep(&cell.rect()) {
                placement.kept += 1;
            } else {
                world.cells.remove(&cell);
                placement.rejected += 1;
            }
        }
        self.placed_this_session = self
            .placed_this_session
            .saturating_add(placement.kept as u32);
        placement
    }

    pub(crate) fn delete_at(&mut self, point: Vec2, world: &mut CollisionWorld) -> bool {
        self.active && world.remove_block(point)
    }

    pub(crate) fn placed_this_session(&self) -> u32 {
        self.placed_this_session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> CollisionWorld {
        CollisionWorld::new(640.0, 480.0)
    }

    #[test]
    fn add_block_snaps_and_rejects_duplicates() {
        let mut world = world();
        assert!(world.add_block(Vec2::new(40.0, 70.0)));
        assert!(!world.add_block(Vec2::new(63.0, 95.0)));
        assert!(world.contains(Cell { row: 2, col: 1 }));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn cells_outside_world_are_rejected() {
        let mut world = world();
        assert!(!world.add_block(Vec2::new(-1.0, 10.0)));
        assert!(!world.add_block(Vec2::new(639.0, 480.0)));
        assert!(world.add_block(Vec2::new(639.0, 479.0)));
    }

    #[test]
    fn can_move_checks_blocks_and_bounds() {
        let mut world = world();
        world.add_block(Vec2::new(100.0, 100.0));
        let size = Vec2::new(64.0, 64.0);
        assert!(!world.can_move(size, Vec2::new(60.0, 60.0)));
        assert!(world.can_move(size, Vec2::new(32.0, 32.0)));
        assert!(world.can_move(size, Vec2::new(128.0, 96.0)));
        assert!(!world.can_move(size, Vec2::new(-1.0, 0.0)));
        assert!(!world.can_move(size, Vec2::new(600.0, 0.0)));
    }

    #[test]
    fn file_text_round_trips_through_load() {
        let mut world = world();
        world.add_cells_between(Vec2::new(0.0, 0.0), Vec2::new(70.0, 40.0));
        let text = world.to_file_text();
        assert_eq!(text.lines().next(), Some("0,0,32,32"));

        let mut reloaded = CollisionWorld::new(640.0, 480.0);
        reloaded
            .load_file_text(&text, Path::new("blocks.txt"))
            .expect("parse");
        assert_eq!(reloaded, world);
        assert_eq!(reloaded.to_file_text(), text);
    }

    #[test]
    fn load_merges_duplicates_and_spans_large_records() {
        let mut world = world();
        let count = world
            .load_file_text("0,0,32,32\n0,0,32,32\n\n64,0,64,32\n", Path::new("b.txt"))
            .expect("parse");
        assert_eq!(count, 3);
    }

    #[test]
    fn malformed_record_reports_line() {
        let mut world = world();
        let error = world
            .load_file_text("0,0,32,32\n1,2,three,4\n", Path::new("b.txt"))
            .expect_err("bad record");
        match error {
            BlockFileError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn store_saves_and_loads_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = BlockStore::for_level(temp.path(), 1);
        let mut world = world();
        world.add_block(Vec2::new(10.0, 10.0));
        world.add_block(Vec2::new(300.0, 200.0));
        store.save(&world).expect("save");
        assert!(store.path().ends_with("collision_data_level1.txt"));

        let mut reloaded = CollisionWorld::new(640.0, 480.0);
        assert_eq!(store.load_into(&mut reloaded).expect("load"), 2);
        assert_eq!(reloaded, world);
    }

    #[test]
    fn missing_store_file_loads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = BlockStore::for_level(temp.path(), 2);
        let mut world = world();
        assert_eq!(store.load_into(&mut world).expect("load"), 0);
        assert!(world.is_empty());
    }

    #[test]
    fn editor_single_click_adds_one_cell() {
        let mut world = world();
        let mut editor = CollisionEditor::default();
        editor.pointer_pressed(Vec2::new(50.0, 50.0));
        let placement = editor.pointer_released(Vec2::new(50.0, 50.0), &mut world, |_| true);
        assert_eq!(placement.kept, 0);

        assert!(editor.toggle());
        editor.pointer_pressed(Vec2::new(50.0, 50.0));
        let placement = editor.pointer_released(Vec2::new(55.0, 60.0), &mut world, |_| true);
        assert_eq!(placement.kept, 1);
        assert_eq!(editor.placed_this_session(), 1);
    }

    #[test]
    fn rejected_cells_are_removed_and_not_counted() {
        let mut world = world();
        world.add_block(Vec2::new(10.0, 10.0));
        let mut editor = CollisionEditor::default();
        editor.toggle();
        let actor = Rect::new(40.0, 0.0, 64.0, 64.0);
        editor.pointer_pressed(Vec2::new(0.0, 0.0));
        let placement = editor.pointer_released(Vec2::new(200.0, 20.0), &mut world, |cell| {
            !cell.intersects(&actor)
        });

        // Row 0 spans cols 0..=6; cols 1..=3 overlap the actor. Col 0 was
        // already there and is neither new nor taken back.
        assert_eq!(placement, Placement { kept: 3, rejected: 3 });
        assert_eq!(editor.placed_this_session(), 3);
        assert!(world.contains(Cell { row: 0, col: 0 }));
        assert!(!world.contains(Cell { row: 0, col: 2 }));
        assert_eq!(world.len(), 4);
    }

    #[test]
    fn oversized_record_is_clipped_to_the_world() {
        let mut world = world();
        let count = world
            .load_file_text("-64,448,2147483000,2147483000\n", Path::new("b.txt"))
            .expect("parse");
        assert_eq!(count, 20);
        assert!(world.contains(Cell { row: 14, col: 0 }));
        assert!(world.contains(Cell { row: 14, col: 19 }));
    }

    #[test]
    fn editor_delete_only_while_active() {
        let mut world = world();
        world.add_block(Vec2::new(10.0, 10.0));
        let mut editor = CollisionEditor::default();
        assert!(!editor.delete_at(Vec2::new(10.0, 10.0), &mut world));
        editor.toggle();
        assert!(editor.delete_at(Vec2::new(10.0, 10.0), &mut world));
        assert!(!editor.delete_at(Vec2::new(10.0, 10.0), &mut world));
        assert!(world.is_empty());
    }
}
