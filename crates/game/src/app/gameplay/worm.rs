use engine::Vec2;
use rand::Rng;

use super::collision::CollisionWorld;
use super::kinematics::Body;
use super::types::{
    cooldown_elapsed, nearest_alive, ticks_from_secs, EnemyId, EnemyView, Facing, Health,
    HeroName, HeroView, Tick,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WormTuning {
    pub(crate) max_health: u32,
    pub(crate) speed: f32,
    pub(crate) damage: u32,
    pub(crate) attack_cooldown: Tick,
    pub(crate) detection_range: f32,
    pub(crate) give_up_range: f32,
    pub(crate) attack_range: f32,
    pub(crate) patrol_offset: f32,
    pub(crate) patrol_arrival: f32,
    pub(crate) hurt_time: Tick,
    pub(crate) self_knockback: f32,
    pub(crate) target_knockback: f32,
}

impl Default for WormTuning {
    fn default() -> Self {
        Self {
            max_health: 40,
            speed: 90.0,
            damage: 10,
            attack_cooldown: ticks_from_secs(1.0),
            detection_range: 200.0,
            give_up_range: 400.0,
            attack_range: 60.0,
            patrol_offset: 120.0,
            patrol_arrival: 30.0,
            hurt_time: ticks_from_secs(0.25),
            self_knockback: 12.0,
            target_knockback: 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WormState {
    Patrol,
    Chase,
    Attack,
    Hurt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WormStrike {
    pub(crate) target: HeroName,
    pub(crate) damage: u32,
    pub(crate) knockback: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct WormIntent {
    pub(crate) movement: Vec2,
    pub(crate) strike: Option<WormStrike>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WormDamage {
    pub(crate) dealt: u32,
    pub(crate) killed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Worm {
    pub(crate) id: EnemyId,
    pub(crate) body: Body,
    health: Health,
    tuning: WormTuning,
    state: WormState,
    patrol_points: [Vec2; 4],
    patrol_index: usize,
    target: Option<HeroName>,
    last_attack: Option<Tick>,
    hurt_until: Tick,
    alive: bool,
    drop_rolled: bool,
    minion: bool,
}

impl Worm {
    /// Patrol points are four random offsets around the spawn position.
    pub(crate) fn new(id: EnemyId, position: Vec2, tuning: WormTuning, rng: &mut impl Rng) -> Self {
        let spread = tuning.patrol_offset.max(0.0);
        let mut offset = || {
            if spread == 0.0 {
                return Vec2::ZERO;
            }
            Vec2::new(rng.gen_range(-spread..=spread), rng.gen_range(-spread..=spread))
        };
        let patrol_points = [
            position + offset(),
            position + offset(),
            position + offset(),
            position + offset(),
        ];
        Self {
            id,
            body: Body::new(position),
            health: Health::new(tuning.max_health),
            tuning,
            state: WormState::Patrol,
            patrol_points,
            patrol_index: 0,
            target: None,
            last_attack: None,
            hurt_until: 0,
            alive: true,
            drop_rolled: false,
            minion: false,
        }
    }

    pub(crate) fn into_minion(mut self) -> Self {
        self.minion = true;
        self
    }

    pub(crate) fn is_minion(&self) -> bool {
        self.minion
    }

    #[cfg(test)]
    pub(crate) fn set_patrol_points(&mut self, points: [Vec2; 4]) {
        self.patrol_points = points;
        self.patrol_index = 0;
    }

    pub(crate) fn state(&self) -> WormState {
        self.state
    }

    pub(crate) fn health(&self) -> Health {
        self.health
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive
    }

    #[cfg(test)]
    pub(crate) fn target(&self) -> Option<HeroName> {
        self.target
    }

    pub(crate) fn view(&self) -> EnemyView {
        EnemyView {
            id: self.id,
            rect: self.body.rect(),
            alive: self.alive,
        }
    }

    /// Decides this tick's movement and strike from the start-of-tick hero
    /// snapshot.
    pub(crate) fn think(&mut self, now: Tick, heroes: &[HeroView]) -> WormIntent {
        if !self.alive {
            return WormIntent::default();
        }
        if self.state == WormState::Hurt {
            if now < self.hurt_until {
                return WormIntent::default();
            }
            self.state = if self.target.is_some() {
                WormState::Chase
            } else {
                WormState::Patrol
            };
        }

        let center = self.body.center();
        let nearest = nearest_alive(center, heroes);

        if self.state == WormState::Patrol {
            match nearest {
                Some((hero, distance)) if distance < self.tuning.detection_range => {
                    self.target = Some(hero.id);
                    self.state = WormState::Chase;
                }
                _ => return self.patrol_intent(),
            }
        }

        if self.state == WormState::Chase {
            let Some((hero, distance)) = nearest else {
                self.lose_target();
                return self.patrol_intent();
            };
            self.target = Some(hero.id);
            if distance > self.tuning.give_up_range {
                self.lose_target();
                return self.patrol_intent();
            }
            if distance > self.tuning.attack_range {
                return WormIntent {
                    movement: hero.center() - center,
                    strike: None,
                };
            }
            self.state = WormState::Attack;
        }

        let Some(target) = self
            .target
            .and_then(|name| heroes.iter().find(|hero| hero.id == name && hero.alive))
        else {
            self.state = WormState::Chase;
            self.target = None;
            return WormIntent::default();
        };
        let to_target = target.center() - center;
        if to_target.length() > self.tuning.attack_range * 1.5 {
            self.state = WormState::Chase;
            return WormIntent {
                movement: to_target,
                strike: None,
            };
        }
        self.body.face(Facing::toward(center, target.center()));
        if !cooldown_elapsed(now, self.last_attack, self.tuning.attack_cooldown) {
            return WormIntent::default();
        }
        self.last_attack = Some(now);
        WormIntent {
            movement: Vec2::ZERO,
            strike: Some(WormStrike {
                target: target.id,
                damage: self.tuning.damage,
                knockback: to_target.normalized_or_zero() * self.tuning.target_knockback,
            }),
        }
    }

    fn lose_target(&mut self) {
        self.target = None;
        self.state = WormState::Patrol;
    }

    fn patrol_intent(&mut self) -> WormIntent {
        let mut goal = self.patrol_points[self.patrol_index];
        if self.body.position.distance(goal) < self.tuning.patrol_arrival {
            self.patrol_index = (self.patrol_index + 1) % self.patrol_points.len();
            goal = self.patrol_points[self.patrol_index];
        }
        let to_goal = goal - self.body.position;
        WormIntent {
            movement: if to_goal.length() < self.tuning.patrol_arrival {
                Vec2::ZERO
            } else {
                to_goal
            },
            strike: None,
        }
    }

    pub(crate) fn speed(&self) -> f32 {
        self.tuning.speed
    }

    /// Hits that are not lethal stun the worm briefly and shove it a random
    /// short distance. The alive flag falls exactly once.
    pub(crate) fn take_damage(
        &mut self,
        amount: u32,
        now: Tick,
        rng: &mut impl Rng,
        world: &CollisionWorld,
    ) -> WormDamage {
        if !self.alive {
            return WormDamage {
                dealt: 0,
                killed: false,
            };
        }
        let dealt = self.health.apply_damage(amount);
        if !self.health.is_alive() {
            self.alive = false;
            self.body.stop();
            return WormDamage {
                dealt,
                killed: true,
            };
        }
        self.state = WormState::Hurt;
        self.hurt_until = now + self.tuning.hurt_time;
        if self.tuning.self_knockback > 0.0 {
            let angle = rng.gen_range(0.0..360.0_f32);
            let distance = rng.gen_range(0.0..=self.tuning.self_knockback);
            self.body.push(Vec2::from_angle_degrees(angle) * distance, world);
        }
        WormDamage {
            dealt,
            killed: false,
        }
    }

    /// True the first time it is asked after death, false ever after.
    pub(crate) fn claim_drop_roll(&mut self) -> bool {
        if self.alive || self.drop_rolled {
            return false;
        }
        self.drop_rolled = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use engine::Rect;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn hero_at(id: HeroName, x: f32, y: f32) -> HeroView {
        HeroView {
            id,
            rect: Rect::new(x, y, 64.0, 64.0),
            alive: true,
        }
    }

    fn worm_at(x: f32, y: f32) -> Worm {
        let mut rng = StdRng::seed_from_u64(1);
        let mut worm = Worm::new(EnemyId(1), Vec2::new(x, y), WormTuning::default(), &mut rng);
        worm.set_patrol_points([Vec2::new(x, y); 4]);
        worm
    }

    #[test]
    fn patrol_turns_to_chase_inside_detection_range() {
        let mut worm = worm_at(400.0, 300.0);
        let far = [hero_at(HeroName::Juan, 700.0, 300.0)];
        assert_eq!(worm.think(0, &far).movement, Vec2::ZERO);
        assert_eq!(worm.state(), WormState::Patrol);

        let near = [hero_at(HeroName::Juan, 550.0, 300.0)];
        let intent = worm.think(1, &near);
        assert_eq!(worm.state(), WormState::Chase);
        assert!(intent.movement.x > 0.0);
        assert_eq!(worm.target(), Some(HeroName::Juan));
    }

    #[test]
    fn chase_gives_up_beyond_range() {
        let mut worm = worm_at(400.0, 300.0);
        worm.think(0, &[hero_at(HeroName::Adan, 550.0, 300.0)]);
        worm.think(1, &[hero_at(HeroName::Adan, 900.0, 300.0)]);
        assert_eq!(worm.state(), WormState::Patrol);
        assert_eq!(worm.target(), None);
    }

    #[test]
    fn attack_strikes_on_cooldown_with_knockback() {
        let mut worm = worm_at(400.0, 300.0);
        let heroes = [hero_at(HeroName::Juan, 450.0, 300.0)];
        let strike = worm.think(0, &heroes).strike.expect("strike");
        assert_eq!(worm.state(), WormState::Attack);
        assert_eq!(strike.damage, 10);
        assert!((strike.knockback.x - 24.0).abs() < 1e-4);
        assert!(worm.think(30, &heroes).strike.is_none());
        assert!(worm.think(60, &heroes).strike.is_some());
    }

    #[test]
    fn attack_drops_back_to_chase_when_target_drifts() {
        let mut worm = worm_at(400.0, 300.0);
        worm.think(0, &[hero_at(HeroName::Juan, 450.0, 300.0)]);
        let intent = worm.think(1, &[hero_at(HeroName::Juan, 500.0, 300.0)]);
        assert_eq!(worm.state(), WormState::Chase);
        assert!(intent.strike.is_none());
        assert!(intent.movement.x > 0.0);
    }

    #[test]
    fn hurt_pauses_then_resumes() {
        let world = CollisionWorld::new(1280.0, 720.0);
        let mut rng = StdRng::seed_from_u64(9);
        let mut worm = worm_at(400.0, 300.0);
        let damage = worm.take_damage(15, 0, &mut rng, &world);
        assert_eq!(damage, WormDamage { dealt: 15, killed: false });
        assert_eq!(worm.state(), WormState::Hurt);
        let heroes = [hero_at(HeroName::Juan, 550.0, 300.0)];
        assert_eq!(worm.think(10, &heroes), WormIntent::default());
        worm.think(15, &heroes);
        assert_eq!(worm.state(), WormState::Chase);
    }

    #[test]
    fn death_happens_once_and_drop_roll_is_single_shot() {
        let world = CollisionWorld::new(1280.0, 720.0);
        let mut rng = StdRng::seed_from_u64(9);
        let mut worm = worm_at(400.0, 300.0);
        assert!(!worm.claim_drop_roll());
        assert!(worm.take_damage(100, 0, &mut rng, &world).killed);
        assert!(!worm.take_damage(100, 1, &mut rng, &world).killed);
        assert!(worm.claim_drop_roll());
        assert!(!worm.claim_drop_roll());
        assert_eq!(worm.health().current(), 0);
    }
}
