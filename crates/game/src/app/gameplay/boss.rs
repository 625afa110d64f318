use engine::Vec2;

use super::kinematics::Body;
use super::projectile::{Projectile, ProjectileSpec, PROJECTILE_RADIUS};
use super::types::{
    cooldown_elapsed, nearest_alive, ticks_from_secs, EnemyId, EnemyView, Facing, Health,
    HeroName, HeroView, Tick, TICK_SECONDS,
};

const BASIC_SPREAD_DEGREES: [f32; 3] = [0.0, -60.0, 60.0];
const SPECIAL_SHOTS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BossTuning {
    pub(crate) max_health: u32,
    pub(crate) speed: f32,
    pub(crate) size: f32,
    pub(crate) detection_range: f32,
    pub(crate) attack_range: f32,
    pub(crate) decision_interval: Tick,
    pub(crate) basic: ProjectileSpec,
    pub(crate) basic_cooldown: Tick,
    pub(crate) special: ProjectileSpec,
    pub(crate) special_cooldown: Tick,
    /// Basic casts needed before a special may follow.
    pub(crate) special_after: u32,
    pub(crate) summon_cap: usize,
    pub(crate) summon_cooldown: Tick,
    pub(crate) summon_distance: f32,
}

impl Default for BossTuning {
    fn default() -> Self {
        let basic = ProjectileSpec {
            speed: 260.0,
            damage: 25,
            max_range: 350.0,
            radius: PROJECTILE_RADIUS,
            special: false,
        };
        Self {
            max_health: 600,
            speed: 80.0,
            size: 96.0,
            detection_range: 900.0,
            attack_range: 350.0,
            decision_interval: ticks_from_secs(1.0),
            basic,
            basic_cooldown: ticks_from_secs(1.5),
            special: ProjectileSpec {
                damage: 45,
                max_range: basic.max_range * 1.5,
                radius: basic.radius * 2.0,
                special: true,
                ..basic
            },
            special_cooldown: ticks_from_secs(6.0),
            special_after: 2,
            summon_cap: 4,
            summon_cooldown: ticks_from_secs(10.0),
            summon_distance: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BossState {
    Idle,
    Moving,
    AttackingBasic,
    AttackingSpecial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BossCast {
    Basic,
    Special,
}

/// Expanding, fading ring drawn for bursts and hits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AreaEffect {
    pub(crate) center: Vec2,
    pub(crate) radius: f32,
    pub(crate) alpha: f32,
    growth: f32,
    fade: f32,
}

impl AreaEffect {
    pub(crate) fn burst(center: Vec2) -> Self {
        Self {
            center,
            radius: 24.0,
            alpha: 1.0,
            growth: 240.0,
            fade: 1.5,
        }
    }

    pub(crate) fn impact(center: Vec2) -> Self {
        Self {
            center,
            radius: 8.0,
            alpha: 0.8,
            growth: 90.0,
            fade: 2.4,
        }
    }

    fn advance(&mut self) -> bool {
        self.radius += self.growth * TICK_SECONDS;
        self.alpha -= self.fade * TICK_SECONDS;
        self.alpha > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct BossIntent {
    pub(crate) movement: Vec2,
    pub(crate) cast: Option<BossCast>,
    pub(crate) summon_at: Option<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BossHit {
    pub(crate) target: HeroName,
    pub(crate) amount: u32,
}

/// The Shaman. Re-decides on a fixed interval and keeps its own shots,
/// effects and minion roster.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Boss {
    pub(crate) id: EnemyId,
    pub(crate) body: Body,
    health: Health,
    tuning: BossTuning,
    state: BossState,
    target: Option<HeroName>,
    last_decision: Option<Tick>,
    last_basic: Option<Tick>,
    last_special: Option<Tick>,
    last_summon: Option<Tick>,
    consecutive_attacks: u32,
    minions: Vec<EnemyId>,
    projectiles: Vec<Projectile>,
    effects: Vec<AreaEffect>,
}

impl Boss {
    /// The first summon waits a full cooldown from `now`.
    pub(crate) fn new(id: EnemyId, position: Vec2, tuning: BossTuning, now: Tick) -> Self {
        Self {
            id,
            body: Body::with_size(position, Vec2::new(tuning.size, tuning.size)),
            health: Health::new(tuning.max_health),
            tuning,
            state: BossState::Idle,
            target: None,
            last_decision: None,
            last_basic: None,
            last_special: None,
            last_summon: Some(now),
            consecutive_attacks: 0,
            minions: Vec::new(),
            projectiles: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> BossState {
        self.state
    }

    pub(crate) fn health(&self) -> Health {
        self.health
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    #[cfg(test)]
    pub(crate) fn target(&self) -> Option<HeroName> {
        self.target
    }

    pub(crate) fn speed(&self) -> f32 {
        self.tuning.speed
    }

    pub(crate) fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub(crate) fn effects(&self) -> &[AreaEffect] {
        &self.effects
    }

    #[cfg(test)]
    pub(crate) fn minions(&self) -> &[EnemyId] {
        &self.minions
    }

    pub(crate) fn view(&self) -> EnemyView {
        EnemyView {
            id: self.id,
            rect: self.body.rect(),
            alive: self.is_alive(),
        }
    }

    pub(crate) fn think(&mut self, now: Tick, heroes: &[HeroView]) -> BossIntent {
        if !self.is_alive() {
            return BossIntent::default();
        }
        let center = self.body.center();
        let mut intent = BossIntent::default();

        if cooldown_elapsed(now, self.last_decision, self.tuning.decision_interval) {
            self.last_decision = Some(now);
            intent.cast = self.decide(now, center, heroes);
            intent.summon_at = self.decide_summon(now, center);
        }

        if self.state == BossState::Moving {
            if let Some(target) = self
                .target
                .and_then(|name| heroes.iter().find(|hero| hero.id == name && hero.alive))
            {
                intent.movement = target.center() - center;
            }
        }
        intent
    }

    fn decide(&mut self, now: Tick, center: Vec2, heroes: &[HeroView]) -> Option<BossCast> {
        let Some((target, distance)) = nearest_alive(center, heroes)
            .filter(|(_, distance)| *distance <= self.tuning.detection_range)
        else {
            self.state = BossState::Idle;
            self.target = None;
            return None;
        };
        self.target = Some(target.id);
        if distance > self.tuning.attack_range {
            self.state = BossState::Moving;
            return None;
        }

        let base = Facing::toward(center, target.center()).angle_degrees();
        if self.consecutive_attacks >= self.tuning.special_after
            && cooldown_elapsed(now, self.last_special, self.tuning.special_cooldown)
        {
            self.cast_special(now, center);
            return Some(BossCast::Special);
        }
        if cooldown_elapsed(now, self.last_basic, self.tuning.basic_cooldown) {
            self.cast_basic(now, center, base);
            return Some(BossCast::Basic);
        }
        self.state = BossState::Idle;
        None
    }

    fn cast_basic(&mut self, now: Tick, center: Vec2, base_degrees: f32) {
        for offset in BASIC_SPREAD_DEGREES {
            let direction = Vec2::from_angle_degrees(base_degrees + offset);
            self.projectiles
                .push(Projectile::launch(center, direction, self.tuning.basic, now));
        }
        self.last_basic = Some(now);
        self.consecutive_attacks += 1;
        self.state = BossState::AttackingBasic;
    }

    fn cast_special(&mut self, now: Tick, center: Vec2) {
        let step = 360.0 / SPECIAL_SHOTS as f32;
        for index in 0..SPECIAL_SHOTS {
            let direction = Vec2::from_angle_degrees(step * index as f32);
            self.projectiles
                .push(Projectile::launch(center, direction, self.tuning.special, now));
        }
        self.effects.push(AreaEffect::burst(center));
        self.last_special = Some(now);
        self.consecutive_attacks = 0;
        self.state = BossState::AttackingSpecial;
    }

    fn decide_summon(&mut self, now: Tick, center: Vec2) -> Option<Vec2> {
        if self.minions.len() >= self.tuning.summon_cap
            || !cooldown_elapsed(now, self.last_summon, self.tuning.summon_cooldown)
        {
            return None;
        }
        self.last_summon = Some(now);
        let angle = 90.0 * self.minions.len() as f32 + 45.0;
        Some(center + Vec2::from_angle_degrees(angle) * self.tuning.summon_distance)
    }

    pub(crate) fn register_minion(&mut self, id: EnemyId) {
        if self.minions.len() < self.tuning.summon_cap {
            self.minions.push(id);
        }
    }

    /// Forgets minions that are no longer alive, freeing summon slots.
    pub(crate) fn retain_minions(&mut self, is_alive: impl Fn(EnemyId) -> bool) {
        self.minions.retain(|id| is_alive(*id));
    }

    pub(crate) fn step_projectiles(&mut self, now: Tick, heroes: &[HeroView]) -> Vec<BossHit> {
        let mut hits = Vec::new();
        for shot in &mut self.projectiles {
            if let Some(target) = shot.step(now, heroes) {
                hits.push(BossHit {
                    target,
                    amount: shot.damage(),
                });
                self.effects.push(AreaEffect::impact(shot.position()));
            }
        }
        self.projectiles.retain(Projectile::is_active);
        hits
    }

    pub(crate) fn tick_effects(&mut self) {
        self.effects.retain_mut(AreaEffect::advance);
    }

    /// Returns `(dealt, killed)`; `killed` is true only on the lethal hit.
    pub(crate) fn take_damage(&mut self, amount: u32) -> (u32, bool) {
        if !self.is_alive() {
            return (0, false);
        }
        let dealt = self.health.apply_damage(amount);
        self.effects.push(AreaEffect::impact(self.body.center()));
        if !self.is_alive() {
            self.projectiles.clear();
            self.state = BossState::Idle;
            return (dealt, true);
        }
        (dealt, false)
    }
}

#[cfg(test)]
mod tests {
    use engine::Rect;

    use super::*;

    fn hero(id: HeroName, x: f32, y: f32) -> HeroView {
        HeroView {
            id,
            rect: Rect::new(x, y, 64.0, 64.0),
            alive: true,
        }
    }

    fn angle_of(velocity: Vec2) -> f32 {
        velocity.y.atan2(velocity.x).to_degrees()
    }

    #[test]
    fn picks_closest_alive_hero() {
        let mut boss = Boss::new(EnemyId(0), Vec2::new(600.0, 300.0), BossTuning::default(), 0);
        let mut far = hero(HeroName::Juan, 700.0, 300.0);
        far.alive = false;
        let heroes = [far, hero(HeroName::Adan, 300.0, 300.0)];
        boss.think(0, &heroes);
        assert_eq!(boss.target(), Some(HeroName::Adan));
    }

    #[test]
    fn basic_cast_is_a_three_way_spread() {
        let mut boss = Boss::new(EnemyId(0), Vec2::new(960.0, 200.0), BossTuning::default(), 0);
        let intent = boss.think(0, &[hero(HeroName::Juan, 1150.0, 220.0)]);
        assert_eq!(intent.cast, Some(BossCast::Basic));
        assert_eq!(boss.state(), BossState::AttackingBasic);
        let angles: Vec<f32> = boss.projectiles().iter().map(|p| angle_of(p.velocity())).collect();
        assert_eq!(angles.len(), 3);
        for (actual, expected) in angles.iter().zip([0.0, -60.0, 60.0]) {
            assert!((actual - expected).abs() < 1e-3, "{actual} vs {expected}");
        }
        for shot in boss.projectiles() {
            assert!((shot.velocity().length() - 260.0).abs() < 1e-3);
            assert_eq!(shot.max_range(), 350.0);
            assert_eq!(shot.damage(), 25);
        }
    }

    #[test]
    fn decisions_wait_for_the_interval() {
        let mut boss = Boss::new(EnemyId(0), Vec2::new(960.0, 200.0), BossTuning::default(), 0);
        let heroes = [hero(HeroName::Juan, 1150.0, 220.0)];
        assert!(boss.think(0, &heroes).cast.is_some());
        assert!(boss.think(30, &heroes).cast.is_none());
        // Basic cooldown (90) has not elapsed at the next decision.
        assert!(boss.think(60, &heroes).cast.is_none());
        assert_eq!(boss.state(), BossState::Idle);
        assert_eq!(boss.think(120, &heroes).cast, Some(BossCast::Basic));
    }

    #[test]
    fn special_follows_two_basics_in_eight_directions() {
        let mut boss = Boss::new(EnemyId(0), Vec2::new(960.0, 200.0), BossTuning::default(), 0);
        let heroes = [hero(HeroName::Juan, 1150.0, 220.0)];
        assert_eq!(boss.think(0, &heroes).cast, Some(BossCast::Basic));
        assert_eq!(boss.think(120, &heroes).cast, Some(BossCast::Basic));
        assert_eq!(boss.think(360, &heroes).cast, Some(BossCast::Special));
        let specials: Vec<&Projectile> =
            boss.projectiles().iter().filter(|shot| shot.is_special()).collect();
        assert_eq!(specials.len(), 8);
        assert!(specials.iter().all(|shot| shot.damage() == 45 && shot.max_range() == 525.0));
        assert!(!boss.effects().is_empty());
    }

    #[test]
    fn out_of_range_target_makes_boss_move() {
        let mut boss = Boss::new(EnemyId(0), Vec2::new(100.0, 100.0), BossTuning::default(), 0);
        let intent = boss.think(0, &[hero(HeroName::Adan, 800.0, 100.0)]);
        assert_eq!(boss.state(), BossState::Moving);
        assert!(intent.movement.x > 0.0);
        assert!(intent.cast.is_none());
    }

    #[test]
    fn summons_are_capped_and_rate_limited() {
        let tuning = BossTuning {
            summon_cap: 2,
            ..BossTuning::default()
        };
        let mut boss = Boss::new(EnemyId(0), Vec2::new(600.0, 300.0), tuning, 0);
        let mut now = 0;
        let mut summoned = 0;
        for _ in 0..60 {
            now += 60;
            if boss.think(now, &[]).summon_at.is_some() {
                summoned += 1;
                boss.register_minion(EnemyId(100 + summoned));
            }
        }
        assert_eq!(summoned, 2);
        boss.retain_minions(|id| id != EnemyId(101));
        assert_eq!(boss.minions(), &[EnemyId(102)]);
    }

    #[test]
    fn projectile_hits_are_reported_with_effects() {
        let mut boss = Boss::new(EnemyId(0), Vec2::new(960.0, 200.0), BossTuning::default(), 0);
        let heroes = [hero(HeroName::Juan, 1150.0, 220.0)];
        boss.think(0, &heroes);
        let mut hits = Vec::new();
        for now in 1..=60 {
            hits.extend(boss.step_projectiles(now, &heroes));
        }
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, HeroName::Juan);
        assert_eq!(boss.projectiles().len(), 2);
        assert!(!boss.effects().is_empty());
    }

    #[test]
    fn lethal_damage_reports_kill_once() {
        let mut boss = Boss::new(EnemyId(0), Vec2::new(960.0, 200.0), BossTuning::default(), 0);
        assert_eq!(boss.take_damage(100), (100, false));
        assert_eq!(boss.take_damage(1_000), (500, true));
        assert_eq!(boss.take_damage(10), (0, false));
    }
}
