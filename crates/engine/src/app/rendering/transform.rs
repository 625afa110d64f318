use crate::app::{Camera2D, Vec2};

/// World units map 1:1 to window pixels; only the camera offset differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

pub fn world_to_screen_px(world: Vec2, camera: &Camera2D) -> (i32, i32) {
    let x = world.x - camera.position.x;
    let y = world.y - camera.position.y;
    (x.round() as i32, y.round() as i32)
}

pub fn screen_to_world_px(screen: Vec2, camera: &Camera2D) -> Vec2 {
    Vec2 {
        x: screen.x + camera.position.x,
        y: screen.y + camera.position.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_camera_is_identity() {
        let camera = Camera2D::new(800, 600);
        assert_eq!(world_to_screen_px(Vec2::new(12.4, 30.6), &camera), (12, 31));
    }

    #[test]
    fn camera_offset_round_trips() {
        let mut camera = Camera2D::new(800, 600);
        camera.position = Vec2::new(250.0, 100.0);
        let world = screen_to_world_px(Vec2::new(100.0, 200.0), &camera);
        assert_eq!(world, Vec2::new(350.0, 300.0));
        assert_eq!(world_to_screen_px(world, &camera), (100, 200));
    }
}
