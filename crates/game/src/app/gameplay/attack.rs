use engine::{Rect, Vec2};

use super::projectile::{Projectile, ProjectileSpec, PROJECTILE_RADIUS};
use super::types::{
    cooldown_elapsed, ticks_from_secs, EnemyId, EnemyView, Facing, HeroName, Tick, BODY_HALF,
};

pub(crate) const ATTACK_PHASE_PER_TICK: f32 = 0.25;
const REGION_SIDE_OVERHANG: f32 = 20.0;
const REGION_CROSS_SPAN: f32 = 104.0;

/// Swing animation length per direction. A zero entry is a missing
/// sequence; a swing in that direction ends without damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttackFrames([u32; 4]);

impl AttackFrames {
    pub(crate) fn uniform(frames: u32) -> Self {
        Self([frames; 4])
    }

    fn slot(facing: Facing) -> usize {
        match facing {
            Facing::Up => 0,
            Facing::Down => 1,
            Facing::Left => 2,
            Facing::Right => 3,
        }
    }

    pub(crate) fn with(mut self, facing: Facing, frames: u32) -> Self {
        self.0[Self::slot(facing)] = frames;
        self
    }

    pub(crate) fn get(&self, facing: Facing) -> Option<u32> {
        let frames = self.0[Self::slot(facing)];
        (frames > 0).then_some(frames)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MeleeComboTuning {
    pub(crate) base_reach: f32,
    pub(crate) cooldown: Tick,
    pub(crate) max_combo: u32,
    pub(crate) combo_bonus: u32,
    pub(crate) frames: u32,
}

impl Default for MeleeComboTuning {
    fn default() -> Self {
        Self {
            base_reach: 60.0,
            cooldown: ticks_from_secs(0.45),
            max_combo: 3,
            combo_bonus: 5,
            frames: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MeleeRangedTuning {
    pub(crate) reach: f32,
    pub(crate) cooldown: Tick,
    pub(crate) frames: u32,
    pub(crate) ranged: ProjectileSpec,
    pub(crate) ranged_cooldown: Tick,
}

impl Default for MeleeRangedTuning {
    fn default() -> Self {
        Self {
            reach: 90.0,
            cooldown: ticks_from_secs(0.6),
            frames: 8,
            ranged: ProjectileSpec {
                speed: 400.0,
                damage: 25,
                max_range: 500.0,
                radius: PROJECTILE_RADIUS,
                special: false,
            },
            ranged_cooldown: ticks_from_secs(0.7),
        }
    }
}

/// Directional swing box for a body whose top-left is `origin`, clipped to
/// `bounds`. `None` when nothing of it lies inside the world.
pub(crate) fn attack_region(
    origin: Vec2,
    facing: Facing,
    reach: f32,
    bounds: &Rect,
) -> Option<Rect> {
    let side = origin.x - REGION_SIDE_OVERHANG;
    let top = origin.y - REGION_SIDE_OVERHANG;
    let region = match facing {
        Facing::Up => Rect::new(side, origin.y - reach, REGION_CROSS_SPAN, reach + BODY_HALF),
        Facing::Down => Rect::new(side, origin.y + BODY_HALF, REGION_CROSS_SPAN, reach),
        Facing::Left => Rect::new(origin.x - reach, top, reach + BODY_HALF, REGION_CROSS_SPAN),
        Facing::Right => Rect::new(origin.x + BODY_HALF, top, reach, REGION_CROSS_SPAN),
    };
    region.clip_to(bounds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hit {
    pub(crate) target: EnemyId,
    pub(crate) amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingDamage {
    pub(crate) amount: u32,
    pub(crate) targets: Vec<EnemyId>,
}

/// What the renderer needs about an in-flight swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AttackDraw {
    pub(crate) direction: Facing,
    pub(crate) frame: usize,
    pub(crate) region: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SwingCore {
    attacking: bool,
    direction: Facing,
    phase: f32,
    pending: Option<PendingDamage>,
    region: Option<Rect>,
    last_attack: Option<Tick>,
    cooldown: Tick,
    frames: AttackFrames,
}

impl SwingCore {
    fn new(cooldown: Tick, frames: u32) -> Self {
        Self {
            attacking: false,
            direction: Facing::Down,
            phase: 0.0,
            pending: None,
            region: None,
            last_attack: None,
            cooldown,
            frames: AttackFrames::uniform(frames),
        }
    }

    fn ready(&self, now: Tick) -> bool {
        !self.attacking && cooldown_elapsed(now, self.last_attack, self.cooldown)
    }

    fn snapshot_targets(region: Option<Rect>, enemies: &[EnemyView]) -> Vec<EnemyId> {
        let Some(region) = region else {
            return Vec::new();
        };
        enemies
            .iter()
            .filter(|enemy| enemy.alive && enemy.rect.intersects(&region))
            .map(|enemy| enemy.id)
            .collect()
    }

    fn start(
        &mut self,
        now: Tick,
        direction: Facing,
        amount: u32,
        region: Option<Rect>,
        enemies: &[EnemyView],
    ) {
        self.attacking = true;
        self.direction = direction;
        self.phase = 0.0;
        self.region = region;
        self.last_attack = Some(now);
        self.pending = Some(PendingDamage {
            amount,
            targets: Self::snapshot_targets(region, enemies),
        });
    }

    /// Moves the animation on one tick. True once the last frame is reached.
    fn advance(&mut self) -> bool {
        if !self.attacking {
            return false;
        }
        let Some(frames) = self.frames.get(self.direction) else {
            self.finish();
            return false;
        };
        self.phase += ATTACK_PHASE_PER_TICK;
        self.phase >= frames as f32
    }

    fn complete(&mut self, is_alive: &dyn Fn(EnemyId) -> bool) -> Vec<Hit> {
        let hits = self
            .pending
            .take()
            .map(|pending| {
                pending
                    .targets
                    .into_iter()
                    .filter(|target| is_alive(*target))
                    .map(|target| Hit {
                        target,
                        amount: pending.amount,
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.finish();
        hits
    }

    fn finish(&mut self) {
        self.attacking = false;
        self.phase = 0.0;
        self.pending = None;
        self.region = None;
    }

    fn draw(&self) -> Option<AttackDraw> {
        self.attacking.then(|| AttackDraw {
            direction: self.direction,
            frame: self.phase as usize,
            region: self.region,
        })
    }
}

/// Per-hero attack state machine. Player swings record their damage and
/// targets at the start and apply them once when the animation ends.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttackModule {
    MeleeCombo {
        core: SwingCore,
        tuning: MeleeComboTuning,
        combo_count: u32,
    },
    MeleeRanged {
        core: SwingCore,
        tuning: MeleeRangedTuning,
        last_ranged: Option<Tick>,
        projectiles: Vec<Projectile>,
    },
}

impl AttackModule {
    pub(crate) fn melee_combo(tuning: MeleeComboTuning) -> Self {
        Self::MeleeCombo {
            core: SwingCore::new(tuning.cooldown, tuning.frames),
            tuning,
            combo_count: 0,
        }
    }

    pub(crate) fn melee_ranged(tuning: MeleeRangedTuning) -> Self {
        Self::MeleeRanged {
            core: SwingCore::new(tuning.cooldown, tuning.frames),
            tuning,
            last_ranged: None,
            projectiles: Vec::new(),
        }
    }

    pub(crate) fn for_hero(hero: HeroName) -> Self {
        match hero {
            HeroName::Juan => Self::melee_combo(MeleeComboTuning::default()),
            HeroName::Adan => Self::melee_ranged(MeleeRangedTuning::default()),
        }
    }

    fn core(&self) -> &SwingCore {
        match self {
            Self::MeleeCombo { core, .. } | Self::MeleeRanged { core, .. } => core,
        }
    }

    fn core_mut(&mut self) -> &mut SwingCore {
        match self {
            Self::MeleeCombo { core, .. } | Self::MeleeRanged { core, .. } => core,
        }
    }

    pub(crate) fn is_attacking(&self) -> bool {
        self.core().attacking
    }

    pub(crate) fn pending(&self) -> Option<&PendingDamage> {
        self.core().pending.as_ref()
    }

    pub(crate) fn can_begin(&self, now: Tick) -> bool {
        self.core().ready(now)
    }

    #[cfg(test)]
    pub(crate) fn combo_count(&self) -> u32 {
        match self {
            Self::MeleeCombo { combo_count, .. } => *combo_count,
            Self::MeleeRanged { .. } => 0,
        }
    }

    pub(crate) fn frames(&self) -> AttackFrames {
        self.core().frames
    }

    pub(crate) fn set_frames(&mut self, frames: AttackFrames) {
        self.core_mut().frames = frames;
    }

    /// Reach used for the companion's engage distance.
    pub(crate) fn base_reach(&self) -> f32 {
        match self {
            Self::MeleeCombo { tuning, .. } => tuning.base_reach,
            Self::MeleeRanged { tuning, .. } => tuning.reach,
        }
    }

    /// Damage and reach of the next swing; advances the combo counter.
    fn next_swing(&mut self, base_damage: u32) -> (u32, f32) {
        match self {
            Self::MeleeCombo {
                tuning,
                combo_count,
                ..
            } => {
                let step = *combo_count;
                *combo_count = (step + 1) % tuning.max_combo.max(1);
                (
                    base_damage + tuning.combo_bonus * step,
                    tuning.base_reach * (1.0 + 0.5 * step as f32),
                )
            }
            Self::MeleeRanged { tuning, .. } => (base_damage, tuning.reach),
        }
    }

    /// Starts a swing if idle and off cooldown. Targets are every alive enemy
    /// overlapping the (world-clipped) region at this instant.
    pub(crate) fn begin(
        &mut self,
        now: Tick,
        origin: Vec2,
        facing: Facing,
        base_damage: u32,
        bounds: &Rect,
        enemies: &[EnemyView],
    ) -> bool {
        if !self.can_begin(now) {
            return false;
        }
        let (amount, reach) = self.next_swing(base_damage);
        let region = attack_region(origin, facing, reach, bounds);
        self.core_mut().start(now, facing, amount, region, enemies);
        true
    }

    /// Advances the swing animation; returns the hits once it completes.
    pub(crate) fn tick(&mut self, is_alive: &dyn Fn(EnemyId) -> bool) -> Vec<Hit> {
        if self.core_mut().advance() {
            return self.on_phase_end(is_alive);
        }
        Vec::new()
    }

    /// Ends the current swing, applying its pending damage to targets that
    /// are still alive.
    pub(crate) fn on_phase_end(&mut self, is_alive: &dyn Fn(EnemyId) -> bool) -> Vec<Hit> {
        if !self.is_attacking() {
            return Vec::new();
        }
        self.core_mut().complete(is_alive)
    }

    pub(crate) fn draw_intent(&self) -> Option<AttackDraw> {
        self.core().draw()
    }

    /// AI swing: same cooldown and combo rules, but damage lands at once and
    /// no animation gate is entered. `None` when the swing was not allowed.
    pub(crate) fn strike_immediately(
        &mut self,
        now: Tick,
        origin: Vec2,
        facing: Facing,
        base_damage: u32,
        bounds: &Rect,
        enemies: &[EnemyView],
    ) -> Option<Vec<Hit>> {
        if !self.can_begin(now) {
            return None;
        }
        let (amount, reach) = self.next_swing(base_damage);
        let region = attack_region(origin, facing, reach, bounds);
        let core = self.core_mut();
        core.last_attack = Some(now);
        core.direction = facing;
        Some(
            SwingCore::snapshot_targets(region, enemies)
                .into_iter()
                .map(|target| Hit { target, amount })
                .collect(),
        )
    }

    /// Launches a shot from `from` toward `toward`. Only the melee+ranged
    /// variant has one; it cannot fire mid-swing.
    pub(crate) fn fire_ranged(
        &mut self,
        now: Tick,
        from: Vec2,
        toward: Vec2,
        bonus_damage: u32,
    ) -> bool {
        let attacking = self.is_attacking();
        let Self::MeleeRanged {
            tuning,
            last_ranged,
            projectiles,
            ..
        } = self
        else {
            return false;
        };
        if attacking || !cooldown_elapsed(now, *last_ranged, tuning.ranged_cooldown) {
            return false;
        }
        let mut spec = tuning.ranged;
        spec.damage += bonus_damage;
        let shot = Projectile::launch(from, toward - from, spec, now);
        if !shot.is_active() {
            return false;
        }
        projectiles.push(shot);
        *last_ranged = Some(now);
        true
    }

    pub(crate) fn projectiles(&self) -> &[Projectile] {
        match self {
            Self::MeleeRanged { projectiles, .. } => projectiles,
            Self::MeleeCombo { .. } => &[],
        }
    }

    /// Moves this hero's shots one tick and drops spent ones.
    pub(crate) fn step_projectiles(&mut self, now: Tick, enemies: &[EnemyView]) -> Vec<Hit> {
        let Self::MeleeRanged { projectiles, .. } = self else {
            return Vec::new();
        };
        let mut hits = Vec::new();
        for shot in projectiles.iter_mut() {
            if let Some(target) = shot.step(now, enemies) {
                hits.push(Hit {
                    target,
                    amount: shot.damage(),
                });
            }
        }
        projectiles.retain(Projectile::is_active);
        hits
    }

    /// Back to idle with no swing, combo or shots in flight.
    pub(crate) fn reset(&mut self) {
        match self {
            Self::MeleeCombo {
                core, combo_count, ..
            } => {
                core.finish();
                *combo_count = 0;
            }
            Self::MeleeRanged {
                core, projectiles, ..
            } => {
                core.finish();
                projectiles.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Rect {
        Rect::new(0.0, 0.0, 1280.0, 720.0)
    }

    fn enemy(id: u32, x: f32, y: f32) -> EnemyView {
        EnemyView {
            id: EnemyId(id),
            rect: Rect::new(x, y, 64.0, 64.0),
            alive: true,
        }
    }

    fn run_to_completion(module: &mut AttackModule) -> (u32, Vec<Hit>) {
        let mut ticks = 0;
        loop {
            ticks += 1;
            let hits = module.tick(&|_| true);
            if !module.is_attacking() {
                return (ticks, hits);
            }
            assert!(ticks < 1_000, "swing never finished");
        }
    }

    #[test]
    fn region_table_matches_directions() {
        let origin = Vec2::new(400.0, 300.0);
        let big = Rect::new(0.0, 0.0, 4000.0, 4000.0);
        assert_eq!(
            attack_region(origin, Facing::Up, 60.0, &big),
            Some(Rect::new(380.0, 240.0, 104.0, 92.0))
        );
        assert_eq!(
            attack_region(origin, Facing::Down, 60.0, &big),
            Some(Rect::new(380.0, 332.0, 104.0, 60.0))
        );
        assert_eq!(
            attack_region(origin, Facing::Left, 60.0, &big),
            Some(Rect::new(340.0, 280.0, 92.0, 104.0))
        );
        assert_eq!(
            attack_region(origin, Facing::Right, 60.0, &big),
            Some(Rect::new(432.0, 280.0, 60.0, 104.0))
        );
    }

    #[test]
    fn region_is_clipped_to_world() {
        let region = attack_region(Vec2::new(0.0, 0.0), Facing::Left, 90.0, &bounds());
        assert_eq!(region, Some(Rect::new(0.0, 0.0, 32.0, 84.0)));
    }

    #[test]
    fn combo_damage_and_reach_scale_per_swing() {
        let mut juan = AttackModule::for_hero(HeroName::Juan);
        let enemies = [enemy(1, 470.0, 310.0)];
        let mut damages = Vec::new();
        let mut now = 0;
        for _ in 0..4 {
            let origin = Vec2::new(400.0, 300.0);
            assert!(juan.begin(now, origin, Facing::Right, 15, &bounds(), &enemies));
            let pending = juan.pending().expect("pending swing").clone();
            assert_eq!(pending.targets, vec![EnemyId(1)]);
            damages.push(pending.amount);
            let (ticks, hits) = run_to_completion(&mut juan);
            assert_eq!(ticks, 24);
            assert_eq!(hits.len(), 1);
            now += 60;
        }
        assert_eq!(damages, vec![15, 20, 25, 15]);
    }

    #[test]
    fn no_new_swing_while_attacking_or_cooling_down() {
        let mut adan = AttackModule::for_hero(HeroName::Adan);
        assert!(adan.begin(0, Vec2::ZERO, Facing::Down, 40, &bounds(), &[]));
        assert!(!adan.begin(100, Vec2::ZERO, Facing::Down, 40, &bounds(), &[]));
        let (ticks, hits) = run_to_completion(&mut adan);
        assert_eq!(ticks, 32);
        assert!(hits.is_empty());
        assert!(adan.pending().is_none());
        assert!(!adan.begin(35, Vec2::ZERO, Facing::Down, 40, &bounds(), &[]));
        assert!(adan.begin(36, Vec2::ZERO, Facing::Down, 40, &bounds(), &[]));
    }

    #[test]
    fn targets_dead_at_apply_time_are_skipped() {
        let mut adan = AttackModule::for_hero(HeroName::Adan);
        let enemies = [enemy(1, 80.0, 0.0), enemy(2, 100.0, 20.0)];
        assert!(adan.begin(0, Vec2::ZERO, Facing::Right, 40, &bounds(), &enemies));
        assert!(adan.tick(&|_| true).is_empty());
        let hits = adan.on_phase_end(&|id| id != EnemyId(1));
        assert_eq!(hits, vec![Hit { target: EnemyId(2), amount: 40 }]);
        assert!(!adan.is_attacking());
        assert!(adan.on_phase_end(&|_| true).is_empty());
    }

    #[test]
    fn missing_direction_sequence_ends_swing_without_damage() {
        let mut juan = AttackModule::for_hero(HeroName::Juan);
        juan.set_frames(AttackFrames::uniform(6).with(Facing::Left, 0));
        let enemies = [enemy(1, 0.0, 300.0)];
        assert!(juan.begin(0, Vec2::new(70.0, 300.0), Facing::Left, 15, &bounds(), &enemies));
        assert!(juan.tick(&|_| true).is_empty());
        assert!(!juan.is_attacking());
        assert!(juan.pending().is_none());
    }

    #[test]
    fn strike_immediately_consumes_cooldown_without_pending_state() {
        let mut juan = AttackModule::for_hero(HeroName::Juan);
        let enemies = [enemy(1, 470.0, 310.0)];
        let hits = juan
            .strike_immediately(0, Vec2::new(400.0, 300.0), Facing::Right, 15, &bounds(), &enemies)
            .expect("ready");
        assert_eq!(hits, vec![Hit { target: EnemyId(1), amount: 15 }]);
        assert!(!juan.is_attacking());
        assert!(juan
            .strike_immediately(10, Vec2::new(400.0, 300.0), Facing::Right, 15, &bounds(), &enemies)
            .is_none());
        assert_eq!(juan.combo_count(), 1);
    }

    #[test]
    fn ranged_respects_cooldown_and_variant() {
        let mut juan = AttackModule::for_hero(HeroName::Juan);
        assert!(!juan.fire_ranged(0, Vec2::ZERO, Vec2::new(10.0, 0.0), 0));

        let mut adan = AttackModule::for_hero(HeroName::Adan);
        assert!(adan.fire_ranged(0, Vec2::ZERO, Vec2::new(10.0, 0.0), 5));
        assert!(!adan.fire_ranged(41, Vec2::ZERO, Vec2::new(10.0, 0.0), 0));
        assert!(adan.fire_ranged(42, Vec2::ZERO, Vec2::new(0.0, 10.0), 0));
        assert_eq!(adan.projectiles().len(), 2);
        assert_eq!(adan.projectiles()[0].damage(), 30);
        adan.reset();
        assert!(adan.projectiles().is_empty());
    }
}
