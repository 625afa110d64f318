use engine::Vec2;

use super::types::{nearest_alive, EnemyId, EnemyView, Facing, HeroName};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CompanionTuning {
    pub(crate) follow_distance: f32,
    pub(crate) detection_range: f32,
    pub(crate) low_health_threshold: f32,
    pub(crate) retreat_hysteresis: f32,
    pub(crate) damage_reduction: f32,
    pub(crate) revive_distance: f32,
    pub(crate) revival_required: u32,
}

impl Default for CompanionTuning {
    fn default() -> Self {
        Self {
            follow_distance: 120.0,
            detection_range: 300.0,
            low_health_threshold: 0.25,
            retreat_hysteresis: 0.15,
            damage_reduction: 0.6,
            revive_distance: 80.0,
            revival_required: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompanionState {
    Follow,
    Attack,
    Retreat,
    Downed,
}

/// What the renderer should show for the companion this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct AnimationHint {
    pub(crate) is_moving: bool,
    pub(crate) direction: Option<Facing>,
    pub(crate) is_attacking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct CompanionIntent {
    pub(crate) movement: Vec2,
    pub(crate) face: Option<Facing>,
    pub(crate) attack: Option<EnemyId>,
    pub(crate) hint: AnimationHint,
}

impl CompanionIntent {
    fn moving(movement: Vec2) -> Self {
        let direction = Facing::from_delta(movement);
        Self {
            movement,
            face: direction,
            attack: None,
            hint: AnimationHint {
                is_moving: direction.is_some(),
                direction,
                is_attacking: false,
            },
        }
    }
}

/// Start-of-tick facts about the companion's own hero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CompanionView {
    pub(crate) center: Vec2,
    pub(crate) health_fraction: f32,
    pub(crate) alive: bool,
    pub(crate) attack_range: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RevivalProgress {
    Idle,
    InProgress(u32),
    Completed,
}

/// Drives the hero the player is not controlling. It only names the two
/// heroes; the level owns both.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompanionAi {
    target_hero: HeroName,
    companion: HeroName,
    tuning: CompanionTuning,
    state: CompanionState,
    current_enemy: Option<EnemyId>,
    revival_timer: u32,
    is_being_revived: bool,
    last_direction: Option<Facing>,
}

impl CompanionAi {
    pub(crate) fn new(target_hero: HeroName, tuning: CompanionTuning) -> Self {
        Self {
            target_hero,
            companion: target_hero.other(),
            tuning,
            state: CompanionState::Follow,
            current_enemy: None,
            revival_timer: 0,
            is_being_revived: false,
            last_direction: None,
        }
    }

    /// Rebuilt around an already downed hero, as after a control handover.
    pub(crate) fn new_downed(target_hero: HeroName, tuning: CompanionTuning) -> Self {
        Self {
            state: CompanionState::Downed,
            ..Self::new(target_hero, tuning)
        }
    }

    pub(crate) fn target_hero(&self) -> HeroName {
        self.target_hero
    }

    pub(crate) fn companion(&self) -> HeroName {
        self.companion
    }

    pub(crate) fn state(&self) -> CompanionState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn current_enemy(&self) -> Option<EnemyId> {
        self.current_enemy
    }

    pub(crate) fn revival_timer(&self) -> u32 {
        self.revival_timer
    }

    pub(crate) fn is_being_revived(&self) -> bool {
        self.is_being_revived
    }

    pub(crate) fn tuning(&self) -> &CompanionTuning {
        &self.tuning
    }

    fn update_health_state(&mut self, me: &CompanionView) {
        if !me.alive {
            self.state = CompanionState::Downed;
            self.current_enemy = None;
            return;
        }
        match self.state {
            CompanionState::Downed => self.state = CompanionState::Follow,
            CompanionState::Retreat => {
                let exit = self.tuning.low_health_threshold + self.tuning.retreat_hysteresis;
                if me.health_fraction > exit {
                    self.state = CompanionState::Follow;
                }
            }
            CompanionState::Follow | CompanionState::Attack => {
                if me.health_fraction <= self.tuning.low_health_threshold {
                    self.state = CompanionState::Retreat;
                    self.current_enemy = None;
                }
            }
        }
    }

    fn acquire_enemy(&mut self, center: Vec2, enemies: &[EnemyView]) -> Option<(EnemyView, f32)> {
        let in_range = |enemy: &EnemyView| {
            let distance = center.distance(enemy.center());
            (enemy.alive && distance <= self.tuning.detection_range).then_some((*enemy, distance))
        };
        let kept = self
            .current_enemy
            .and_then(|id| enemies.iter().find(|enemy| enemy.id == id))
            .and_then(in_range);
        let found = kept.or_else(|| {
            nearest_alive(center, enemies)
                .filter(|(_, distance)| *distance <= self.tuning.detection_range)
        });
        self.current_enemy = found.map(|(enemy, _)| enemy.id);
        found
    }

    /// Computes this tick's intent from the start-of-tick snapshot. In the
    /// attack state the movement is always zero.
    pub(crate) fn think(
        &mut self,
        me: &CompanionView,
        player_center: Vec2,
        enemies: &[EnemyView],
    ) -> CompanionIntent {
        self.update_health_state(me);
        let intent = match self.state {
            CompanionState::Downed => CompanionIntent::default(),
            CompanionState::Retreat => self.retreat(me, player_center, enemies),
            CompanionState::Follow | CompanionState::Attack => {
                self.engage_or_follow(me, player_center, enemies)
            }
        };
        if intent.hint.direction.is_some() {
            self.last_direction = intent.hint.direction;
        }
        intent
    }

    fn engage_or_follow(
        &mut self,
        me: &CompanionView,
        player_center: Vec2,
        enemies: &[EnemyView],
    ) -> CompanionIntent {
        let range = me.attack_range;
        if let Some((enemy, distance)) = self.acquire_enemy(me.center, enemies) {
            let engage = match self.state {
                CompanionState::Attack => distance <= range * 1.2,
                _ => distance <= range * 0.8,
            };
            if engage {
                self.state = CompanionState::Attack;
                let face = Facing::toward(me.center, enemy.center());
                return CompanionIntent {
                    movement: Vec2::ZERO,
                    face: Some(face),
                    attack: Some(enemy.id),
                    hint: AnimationHint {
                        is_moving: false,
                        direction: Some(face),
                        is_attacking: true,
                    },
                };
            }
            self.state = CompanionState::Follow;
            return CompanionIntent::moving(enemy.center() - me.center);
        }

        self.state = CompanionState::Follow;
        let to_player = player_center - me.center;
        if to_player.length() > self.tuning.follow_distance {
            CompanionIntent::moving(to_player)
        } else {
            CompanionIntent {
                hint: AnimationHint {
                    direction: self.last_direction,
                    ..AnimationHint::default()
                },
                ..CompanionIntent::default()
            }
        }
    }

    fn retreat(
        &mut self,
        me: &CompanionView,
        player_center: Vec2,
        enemies: &[EnemyView],
    ) -> CompanionIntent {
        let flee_radius = me.attack_range * 1.5;
        let mut movement = Vec2::ZERO;
        for enemy in enemies.iter().filter(|enemy| enemy.alive) {
            let away = me.center - enemy.center();
            if away.length() < flee_radius {
                movement += away.normalized_or_zero();
            }
        }
        let to_player = player_center - me.center;
        if to_player.length() > self.tuning.follow_distance * 0.7 {
            movement += to_player.normalized_or_zero();
        }
        if movement.length() < 1e-3 {
            return CompanionIntent {
                hint: AnimationHint {
                    direction: self.last_direction,
                    ..AnimationHint::default()
                },
                ..CompanionIntent::default()
            };
        }
        CompanionIntent::moving(movement)
    }

    /// Call once per tick with the player's input. Progress resets whenever
    /// the key is released or the player leaves revive range.
    pub(crate) fn update_revival(
        &mut self,
        revive_held: bool,
        player_distance: f32,
    ) -> RevivalProgress {
        if self.state != CompanionState::Downed {
            self.revival_timer = 0;
            self.is_being_revived = false;
            return RevivalProgress::Idle;
        }
        if !revive_held || player_distance > self.tuning.revive_distance {
            self.revival_timer = 0;
            self.is_being_revived = false;
            return RevivalProgress::Idle;
        }
        self.is_being_revived = true;
        self.revival_timer += 1;
        if self.revival_timer >= self.tuning.revival_required {
            self.revival_timer = 0;
            self.is_being_revived = false;
            self.state = CompanionState::Follow;
            return RevivalProgress::Completed;
        }
        RevivalProgress::InProgress(self.revival_timer)
    }
}

#[cfg(test)]
mod tests {
    use engine::Rect;

    use super::*;

    fn me(x: f32, health_fraction: f32) -> CompanionView {
        CompanionView {
            center: Vec2::new(x, 300.0),
            health_fraction,
            alive: health_fraction > 0.0,
            attack_range: 80.0,
        }
    }

    fn enemy(id: u32, cx: f32) -> EnemyView {
        EnemyView {
            id: EnemyId(id),
            rect: Rect::new(cx - 32.0, 268.0, 64.0, 64.0),
            alive: true,
        }
    }

    #[test]
    fn follows_player_beyond_follow_distance() {
        let mut ai = CompanionAi::new(HeroName::Juan, CompanionTuning::default());
        assert_eq!(ai.companion(), HeroName::Adan);
        let intent = ai.think(&me(100.0, 1.0), Vec2::new(300.0, 300.0), &[]);
        assert!(intent.movement.x > 0.0);
        let idle = ai.think(&me(250.0, 1.0), Vec2::new(300.0, 300.0), &[]);
        assert_eq!(idle.movement, Vec2::ZERO);
        assert_eq!(idle.hint.direction, Some(Facing::Right));
    }

    #[test]
    fn approaches_in_follow_and_attacks_standing_still() {
        let mut ai = CompanionAi::new(HeroName::Juan, CompanionTuning::default());
        let player = Vec2::new(100.0, 300.0);
        let approach = ai.think(&me(100.0, 1.0), player, &[enemy(1, 250.0)]);
        assert_eq!(ai.state(), CompanionState::Follow);
        assert!(approach.movement.x > 0.0);
        assert!(approach.attack.is_none());

        let strike = ai.think(&me(190.0, 1.0), player, &[enemy(1, 250.0)]);
        assert_eq!(ai.state(), CompanionState::Attack);
        assert_eq!(strike.movement, Vec2::ZERO);
        assert_eq!(strike.attack, Some(EnemyId(1)));
        assert_eq!(strike.face, Some(Facing::Right));
        assert!(strike.hint.is_attacking);

        // Hysteresis: stays in attack until past 1.2x range.
        let hold = ai.think(&me(160.0, 1.0), player, &[enemy(1, 250.0)]);
        assert_eq!(ai.state(), CompanionState::Attack);
        assert_eq!(hold.movement, Vec2::ZERO);
        ai.think(&me(150.0, 1.0), player, &[enemy(1, 250.0)]);
        assert_eq!(ai.state(), CompanionState::Follow);
    }

    #[test]
    fn ignores_enemies_outside_detection_range() {
        let mut ai = CompanionAi::new(HeroName::Adan, CompanionTuning::default());
        ai.think(&me(100.0, 1.0), Vec2::new(150.0, 300.0), &[enemy(1, 500.0)]);
        assert_eq!(ai.current_enemy(), None);
    }

    #[test]
    fn retreat_flees_nearby_enemies() {
        let mut ai = CompanionAi::new(HeroName::Juan, CompanionTuning::default());
        let intent = ai.think(&me(200.0, 0.2), Vec2::new(200.0, 300.0), &[enemy(1, 260.0)]);
        assert_eq!(ai.state(), CompanionState::Retreat);
        assert!(intent.movement.x < 0.0);
        assert!(intent.attack.is_none());
    }

    #[test]
    fn retreat_exits_only_above_hysteresis_band() {
        let mut ai = CompanionAi::new(HeroName::Juan, CompanionTuning::default());
        let player = Vec2::new(200.0, 300.0);
        ai.think(&me(200.0, 0.30), player, &[]);
        assert_eq!(ai.state(), CompanionState::Follow);
        ai.think(&me(200.0, 0.24), player, &[]);
        assert_eq!(ai.state(), CompanionState::Retreat);
        ai.think(&me(200.0, 0.39), player, &[]);
        assert_eq!(ai.state(), CompanionState::Retreat);
        ai.think(&me(200.0, 0.41), player, &[]);
        assert_eq!(ai.state(), CompanionState::Follow);
    }

    #[test]
    fn downed_emits_nothing() {
        let mut ai = CompanionAi::new(HeroName::Juan, CompanionTuning::default());
        let intent = ai.think(&me(100.0, 0.0), Vec2::new(400.0, 300.0), &[enemy(1, 150.0)]);
        assert_eq!(ai.state(), CompanionState::Downed);
        assert_eq!(intent, CompanionIntent::default());
    }

    #[test]
    fn revival_needs_uninterrupted_hold_in_range() {
        let tuning = CompanionTuning {
            revival_required: 5,
            ..CompanionTuning::default()
        };
        let mut ai = CompanionAi::new_downed(HeroName::Juan, tuning);
        for _ in 0..3 {
            ai.update_revival(true, 50.0);
        }
        assert_eq!(ai.update_revival(true, 120.0), RevivalProgress::Idle);
        assert_eq!(ai.revival_timer(), 0);
        for expected in 1..5 {
            assert_eq!(ai.update_revival(true, 50.0), RevivalProgress::InProgress(expected));
            assert!(ai.is_being_revived());
        }
        assert_eq!(ai.update_revival(true, 50.0), RevivalProgress::Completed);
        assert_eq!(ai.state(), CompanionState::Follow);
        assert_eq!(ai.update_revival(true, 50.0), RevivalProgress::Idle);
    }
}
