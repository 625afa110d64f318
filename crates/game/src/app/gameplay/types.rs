use engine::{Rect, Vec2};

pub(crate) const TICKS_PER_SECOND: u64 = 60;
pub(crate) const TICK_SECONDS: f32 = 1.0 / TICKS_PER_SECOND as f32;
pub(crate) const BODY_SIZE: f32 = 64.0;
pub(crate) const BODY_HALF: f32 = BODY_SIZE * 0.5;

/// Simulation time in fixed ticks. Cooldowns are compared in ticks so that
/// "interval >= cooldown" never depends on float accumulation.
pub(crate) type Tick = u64;

pub(crate) fn ticks_from_secs(seconds: f32) -> Tick {
    (seconds * TICKS_PER_SECOND as f32).round().max(0.0) as Tick
}

/// True once at least `cooldown` ticks have passed since `last`; an action
/// that never happened is always ready.
pub(crate) fn cooldown_elapsed(now: Tick, last: Option<Tick>, cooldown: Tick) -> bool {
    match last {
        Some(last) => now.saturating_sub(last) >= cooldown,
        None => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Facing {
    pub(crate) const ALL: [Facing; 4] = [Facing::Up, Facing::Down, Facing::Left, Facing::Right];

    /// Dominant axis of a motion request; ties go to the vertical axis.
    pub(crate) fn from_delta(delta: Vec2) -> Option<Facing> {
        if delta.is_zero() {
            return None;
        }
        if delta.x.abs() > delta.y.abs() {
            Some(if delta.x < 0.0 { Facing::Left } else { Facing::Right })
        } else {
            Some(if delta.y < 0.0 { Facing::Up } else { Facing::Down })
        }
    }

    pub(crate) fn toward(from: Vec2, to: Vec2) -> Facing {
        Self::from_delta(to - from).unwrap_or_default()
    }

    pub(crate) fn as_token(self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }

    /// Angle from +x in degrees, y pointing down.
    pub(crate) fn angle_degrees(self) -> f32 {
        match self {
            Facing::Right => 0.0,
            Facing::Down => 90.0,
            Facing::Left => 180.0,
            Facing::Up => 270.0,
        }
    }

    pub(crate) fn mirrored(self) -> Facing {
        match self {
            Facing::Up => Facing::Down,
            Facing::Down => Facing::Up,
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Health {
    current: u32,
    max: u32,
}

impl Health {
    pub(crate) fn new(max: u32) -> Self {
        let max = max.max(1);
        Self { current: max, max }
    }

    pub(crate) fn with_current(max: u32, current: u32) -> Self {
        let max = max.max(1);
        Self {
            current: current.min(max),
            max,
        }
    }

    pub(crate) fn current(&self) -> u32 {
        self.current
    }

    pub(crate) fn max(&self) -> u32 {
        self.max
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub(crate) fn fraction(&self) -> f32 {
        self.current as f32 / self.max as f32
    }

    /// Returns the amount actually removed.
    pub(crate) fn apply_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.current);
        self.current -= dealt;
        dealt
    }

    #[cfg(test)]
    pub(crate) fn heal(&mut self, amount: u32) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }

    pub(crate) fn restore_full(&mut self) {
        self.current = self.max;
    }

    /// Raising the cap heals by the same amount.
    pub(crate) fn raise_max(&mut self, amount: u32) {
        self.max = self.max.saturating_add(amount);
        self.current = self.current.saturating_add(amount).min(self.max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum HeroName {
    Juan,
    Adan,
}

impl HeroName {
    pub(crate) const BOTH: [HeroName; 2] = [HeroName::Juan, HeroName::Adan];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            HeroName::Juan => "Juan",
            HeroName::Adan => "Adán",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<HeroName> {
        match name {
            "Juan" => Some(HeroName::Juan),
            "Adán" | "Adan" => Some(HeroName::Adan),
            _ => None,
        }
    }

    pub(crate) fn sprite_kind(self) -> &'static str {
        match self {
            HeroName::Juan => "juan",
            HeroName::Adan => "adan",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            HeroName::Juan => 0,
            HeroName::Adan => 1,
        }
    }

    pub(crate) fn other(self) -> HeroName {
        match self {
            HeroName::Juan => HeroName::Adan,
            HeroName::Adan => HeroName::Juan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EnemyId(pub(crate) u32);

/// Start-of-tick view of something that can be hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TargetView<Id> {
    pub(crate) id: Id,
    pub(crate) rect: Rect,
    pub(crate) alive: bool,
}

impl<Id> TargetView<Id> {
    pub(crate) fn center(&self) -> Vec2 {
        self.rect.center()
    }
}

pub(crate) type EnemyView = TargetView<EnemyId>;
pub(crate) type HeroView = TargetView<HeroName>;

pub(crate) fn nearest_alive<Id: Copy>(
    from: Vec2,
    targets: &[TargetView<Id>],
) -> Option<(TargetView<Id>, f32)> {
    targets
        .iter()
        .filter(|target| target.alive)
        .map(|target| (*target, from.distance(target.center())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_follows_dominant_axis() {
        assert_eq!(Facing::from_delta(Vec2::new(-3.0, 1.0)), Some(Facing::Left));
        assert_eq!(Facing::from_delta(Vec2::new(1.0, 1.0)), Some(Facing::Down));
        assert_eq!(Facing::from_delta(Vec2::new(0.5, -2.0)), Some(Facing::Up));
        assert_eq!(Facing::from_delta(Vec2::ZERO), None);
    }

    #[test]
    fn health_stays_within_bounds() {
        let mut health = Health::new(40);
        assert_eq!(health.apply_damage(25), 25);
        assert_eq!(health.apply_damage(25), 15);
        assert_eq!(health.current(), 0);
        assert!(!health.is_alive());
        health.heal(500);
        assert_eq!(health.current(), 40);
        health.raise_max(20);
        assert_eq!((health.current(), health.max()), (60, 60));
        assert_eq!(Health::with_current(10, 99).current(), 10);
    }

    #[test]
    fn cooldown_is_inclusive() {
        assert!(cooldown_elapsed(27, Some(0), 27));
        assert!(!cooldown_elapsed(26, Some(0), 27));
        assert!(cooldown_elapsed(0, None, 27));
        assert_eq!(ticks_from_secs(0.45), 27);
    }

    #[test]
    fn hero_names_round_trip() {
        for hero in HeroName::BOTH {
            assert_eq!(HeroName::from_name(hero.as_str()), Some(hero));
        }
        assert_eq!(HeroName::Juan.other(), HeroName::Adan);
    }

    #[test]
    fn nearest_alive_skips_dead_targets() {
        let targets = [
            HeroView {
                id: HeroName::Juan,
                rect: Rect::new(10.0, 0.0, 64.0, 64.0),
                alive: false,
            },
            HeroView {
                id: HeroName::Adan,
                rect: Rect::new(300.0, 0.0, 64.0, 64.0),
                alive: true,
            },
        ];
        let (nearest, _) = nearest_alive(Vec2::ZERO, &targets).expect("one alive");
        assert_eq!(nearest.id, HeroName::Adan);
    }
}
