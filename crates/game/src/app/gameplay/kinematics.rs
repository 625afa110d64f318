use engine::{Rect, Vec2};

use super::collision::CollisionWorld;
use super::types::{Facing, HeroName, BODY_SIZE, TICK_SECONDS};

const WALK_PHASE_PER_TICK: f32 = 0.15;

/// Position is the top-left corner of the body; y grows downward.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Body {
    pub(crate) position: Vec2,
    pub(crate) size: Vec2,
    pub(crate) facing: Facing,
    pub(crate) velocity: Vec2,
    anim_phase: f32,
}

impl Body {
    pub(crate) fn new(position: Vec2) -> Self {
        Self::with_size(position, Vec2::new(BODY_SIZE, BODY_SIZE))
    }

    pub(crate) fn with_size(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            size,
            facing: Facing::Down,
            velocity: Vec2::ZERO,
            anim_phase: 0.0,
        }
    }

    pub(crate) fn rect(&self) -> Rect {
        Rect::at(self.position, self.size)
    }

    pub(crate) fn center(&self) -> Vec2 {
        self.rect().center()
    }

    pub(crate) fn anim_phase(&self) -> f32 {
        self.anim_phase
    }

    pub(crate) fn is_moving(&self) -> bool {
        !self.velocity.is_zero()
    }

    pub(crate) fn face(&mut self, facing: Facing) {
        self.facing = facing;
    }

    /// Applies one tick of intended motion. `intent` is a direction; its
    /// length is ignored. Returns true when the body actually moved.
    pub(crate) fn step(&mut self, intent: Vec2, speed: f32, world: &CollisionWorld) -> bool {
        let direction = intent.normalized_or_zero();
        let Some(facing) = Facing::from_delta(direction) else {
            self.velocity = Vec2::ZERO;
            self.anim_phase = 0.0;
            return false;
        };
        self.facing = facing;
        let before = self.position;
        self.translate(direction * (speed * TICK_SECONDS), world);
        self.velocity = (self.position - before) * (1.0 / TICK_SECONDS);
        self.anim_phase += WALK_PHASE_PER_TICK;
        self.position != before
    }

    /// Displacement not driven by intent (knockback). Facing and animation
    /// are left alone.
    pub(crate) fn push(&mut self, delta: Vec2, world: &CollisionWorld) {
        self.translate(delta, world);
    }

    pub(crate) fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
        self.anim_phase = 0.0;
    }

    /// Axis-separated move so a blocked axis does not cancel sliding along
    /// the other one. World edges clamp instead of rejecting the step.
    fn translate(&mut self, delta: Vec2, world: &CollisionWorld) {
        let bounds = world.bounds();
        let max_x = (bounds.right() - self.size.x).max(0.0);
        let max_y = (bounds.bottom() - self.size.y).max(0.0);

        if delta.x != 0.0 {
            let x = (self.position.x + delta.x).clamp(0.0, max_x);
            let candidate = Vec2::new(x, self.position.y);
            if world.can_move(self.size, candidate) {
                self.position = candidate;
            }
        }
        if delta.y != 0.0 {
            let y = (self.position.y + delta.y).clamp(0.0, max_y);
            let candidate = Vec2::new(self.position.x, y);
            if world.can_move(self.size, candidate) {
                self.position = candidate;
            }
        }
    }
}

/// Facing used to pick Juan's animation sequences. His sheets are drawn with
/// both axes inverted, so the selector flips while physics keeps the real
/// direction.
pub(crate) fn display_facing(hero: HeroName, facing: Facing) -> Facing {
    match hero {
        HeroName::Juan => facing.mirrored(),
        HeroName::Adan => facing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_moves_and_faces_dominant_axis() {
        let world = CollisionWorld::new(640.0, 480.0);
        let mut body = Body::new(Vec2::new(100.0, 100.0));
        assert!(body.step(Vec2::new(-1.0, 0.2), 120.0, &world));
        assert_eq!(body.facing, Facing::Left);
        assert!(body.position.x < 100.0);
        assert!(body.anim_phase() > 0.0);
    }

    #[test]
    fn idle_resets_animation_phase() {
        let world = CollisionWorld::new(640.0, 480.0);
        let mut body = Body::new(Vec2::new(100.0, 100.0));
        body.step(Vec2::new(0.0, 1.0), 120.0, &world);
        body.step(Vec2::new(0.0, 1.0), 120.0, &world);
        assert!(!body.step(Vec2::ZERO, 120.0, &world));
        assert_eq!(body.anim_phase(), 0.0);
        assert_eq!(body.facing, Facing::Down);
        assert!(!body.is_moving());
    }

    #[test]
    fn blocked_axis_still_slides_on_the_other() {
        let mut world = CollisionWorld::new(640.0, 480.0);
        world.add_block(Vec2::new(170.0, 110.0));
        let mut body = Body::new(Vec2::new(96.0, 96.0));
        body.step(Vec2::new(1.0, 1.0), 600.0, &world);
        assert_eq!(body.position.x, 96.0);
        assert!(body.position.y > 96.0);
    }

    #[test]
    fn world_edges_clamp_motion() {
        let world = CollisionWorld::new(640.0, 480.0);
        let mut body = Body::new(Vec2::new(2.0, 10.0));
        body.step(Vec2::new(-1.0, 0.0), 600.0, &world);
        assert_eq!(body.position.x, 0.0);
        body.push(Vec2::new(0.0, 1000.0), &world);
        assert_eq!(body.position.y, 480.0 - BODY_SIZE);
    }

    #[test]
    fn juan_display_is_mirrored_but_physics_is_not() {
        let world = CollisionWorld::new(640.0, 480.0);
        let mut body = Body::new(Vec2::new(100.0, 100.0));
        body.step(Vec2::new(1.0, 0.0), 120.0, &world);
        assert_eq!(body.facing, Facing::Right);
        assert!(body.position.x > 100.0);
        assert_eq!(display_facing(HeroName::Juan, body.facing), Facing::Left);
        assert_eq!(display_facing(HeroName::Juan, Facing::Up), Facing::Down);
        assert_eq!(display_facing(HeroName::Adan, body.facing), Facing::Right);
    }
}
