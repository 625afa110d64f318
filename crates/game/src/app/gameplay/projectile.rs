use engine::{Rect, Vec2};

use super::types::{ticks_from_secs, Tick, TargetView, TICK_SECONDS};

pub(crate) const PROJECTILE_HARD_EXPIRY_SECONDS: f32 = 3.0;
pub(crate) const PROJECTILE_RADIUS: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProjectileSpec {
    pub(crate) speed: f32,
    pub(crate) damage: u32,
    pub(crate) max_range: f32,
    pub(crate) radius: f32,
    pub(crate) special: bool,
}

/// Straight-line shot integrated with explicit Euler at the fixed tick.
/// `position` is the centre of its square hitbox.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Projectile {
    position: Vec2,
    velocity: Vec2,
    damage: u32,
    max_range: f32,
    traveled: f32,
    radius: f32,
    special: bool,
    spawned_at: Tick,
    active: bool,
}

impl Projectile {
    /// A zero direction yields an already inactive projectile.
    pub(crate) fn launch(origin: Vec2, direction: Vec2, spec: ProjectileSpec, now: Tick) -> Self {
        let direction = direction.normalized_or_zero();
        Self {
            position: origin,
            velocity: direction * spec.speed,
            damage: spec.damage,
            max_range: spec.max_range,
            traveled: 0.0,
            radius: spec.radius,
            special: spec.special,
            spawned_at: now,
            active: !direction.is_zero() && spec.speed > 0.0,
        }
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    pub(crate) fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub(crate) fn damage(&self) -> u32 {
        self.damage
    }

    pub(crate) fn max_range(&self) -> f32 {
        self.max_range
    }

    #[cfg(test)]
    pub(crate) fn traveled(&self) -> f32 {
        self.traveled
    }

    pub(crate) fn is_special(&self) -> bool {
        self.special
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn spawned_at(&self) -> Tick {
        self.spawned_at
    }

    pub(crate) fn rect(&self) -> Rect {
        Rect::new(
            self.position.x - self.radius,
            self.position.y - self.radius,
            self.radius * 2.0,
            self.radius * 2.0,
        )
    }

    /// Advances one tick and tests the end-of-step hitbox against `targets`
    /// in order. Returns the first alive target hit; the projectile is spent
    /// on that hit, on reaching its range, or at hard expiry.
    pub(crate) fn step<Id: Copy>(&mut self, now: Tick, targets: &[TargetView<Id>]) -> Option<Id> {
        if !self.active {
            return None;
        }
        self.position += self.velocity * TICK_SECONDS;
        self.traveled += self.velocity.length() * TICK_SECONDS;

        let hitbox = self.rect();
        if let Some(target) = targets
            .iter()
            .find(|target| target.alive && target.rect.intersects(&hitbox))
        {
            self.active = false;
            return Some(target.id);
        }

        let expired =
            now.saturating_sub(self.spawned_at) >= ticks_from_secs(PROJECTILE_HARD_EXPIRY_SECONDS);
        if self.traveled >= self.max_range || expired {
            self.active = false;
        }
        None
    }
}
