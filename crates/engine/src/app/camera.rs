use super::{Rect, Vec2};

/// Top-left anchored camera over a fixed-size world. `position` is the world
/// coordinate of the viewport's top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    view_width: f32,
    view_height: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl Camera2D {
    pub fn new(view_width: u32, view_height: u32) -> Self {
        Self {
            position: Vec2::ZERO,
            view_width: view_width as f32,
            view_height: view_height as f32,
        }
    }

    pub fn set_view_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.view_width = width as f32;
        self.view_height = height as f32;
    }

    pub fn view_rect(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.view_width,
            self.view_height,
        )
    }

    /// Blends toward centring `target`, then clamps to the world.
    /// `alpha <= 0` leaves the camera where it is (fixed camera).
    pub fn follow(&mut self, target: Vec2, alpha: f32, world_width: f32, world_height: f32) {
        if alpha > 0.0 {
            let desired = self.centered_position(target);
            let alpha = alpha.min(1.0);
            self.position.x += (desired.x - self.position.x) * alpha;
            self.position.y += (desired.y - self.position.y) * alpha;
        }
        self.clamp_to_world(world_width, world_height);
    }

    pub fn center_on(&mut self, target: Vec2, world_width: f32, world_height: f32) {
        self.position = self.centered_position(target);
        self.clamp_to_world(world_width, world_height);
    }

    /// A viewport wider than the world is pinned to the origin on that axis.
    pub fn clamp_to_world(&mut self, world_width: f32, world_height: f32) {
        let max_x = (world_width - self.view_width).max(0.0);
        let max_y = (world_height - self.view_height).max(0.0);
        self.position.x = self.position.x.clamp(0.0, max_x);
        self.position.y = self.position.y.clamp(0.0, max_y);
    }

    fn centered_position(&self, target: Vec2) -> Vec2 {
        Vec2::new(
            target.x - self.view_width * 0.5,
            target.y - self.view_height * 0.5,
        )
    }
}
