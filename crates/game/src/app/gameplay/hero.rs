use engine::{CarriedStats, Vec2};

use super::attack::AttackModule;
use super::items::{Shield, UpgradeChoice, UpgradeDeltas, Upgrades};
use super::kinematics::Body;
use super::types::{Health, HeroName, HeroView, Tick};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HeroDefaults {
    pub(crate) max_health: u32,
    pub(crate) speed: f32,
    pub(crate) damage: u32,
}

/// How incoming damage is shaped before it reaches a hero's health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DamageRules {
    pub(crate) shield_factor: f32,
    pub(crate) invulnerability: Tick,
    /// Set while the hero is AI-driven.
    pub(crate) companion_reduction: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Hero {
    pub(crate) name: HeroName,
    pub(crate) body: Body,
    pub(crate) attack: AttackModule,
    health: Health,
    base_max_health: u32,
    base_speed: f32,
    base_damage: u32,
    carried_damage_bonus: u32,
    upgrades: Upgrades,
    shield: Shield,
    invulnerable_until: Tick,
}

impl Hero {
    pub(crate) fn new(name: HeroName, position: Vec2, defaults: HeroDefaults) -> Self {
        Self {
            name,
            body: Body::new(position),
            attack: AttackModule::for_hero(name),
            health: Health::new(defaults.max_health),
            base_max_health: defaults.max_health,
            base_speed: defaults.speed,
            base_damage: defaults.damage,
            carried_damage_bonus: 0,
            upgrades: Upgrades::default(),
            shield: Shield::default(),
            invulnerable_until: 0,
        }
    }

    /// Starts from stats carried out of the previous level. A hero carried
    /// out while downed starts back on full health.
    pub(crate) fn from_carried(name: HeroName, position: Vec2, carried: &CarriedStats) -> Self {
        let mut hero = Self::new(
            name,
            position,
            HeroDefaults {
                max_health: carried.max_health,
                speed: carried.speed,
                damage: carried.damage,
            },
        );
        hero.carried_damage_bonus = carried.damage_bonus.min(carried.damage);
        if carried.health > 0 {
            hero.health = Health::with_current(carried.max_health, carried.health);
        }
        hero
    }

    pub(crate) fn carried_stats(&self, deltas: &UpgradeDeltas) -> CarriedStats {
        CarriedStats {
            max_health: self.max_health(deltas),
            health: self.health.current(),
            speed: self.speed(deltas),
            damage: self.damage(deltas),
            damage_bonus: self.damage_bonus(deltas),
        }
    }

    pub(crate) fn health(&self) -> Health {
        self.health
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    pub(crate) fn shield(&self) -> &Shield {
        &self.shield
    }

    pub(crate) fn shield_mut(&mut self) -> &mut Shield {
        &mut self.shield
    }

    pub(crate) fn speed(&self, deltas: &UpgradeDeltas) -> f32 {
        self.base_speed + self.upgrades.speed_bonus(deltas)
    }

    pub(crate) fn damage(&self, deltas: &UpgradeDeltas) -> u32 {
        self.base_damage + self.upgrades.damage_bonus(deltas)
    }

    /// Damage added on top of the hero's base by upgrades, including those
    /// taken in earlier levels.
    pub(crate) fn damage_bonus(&self, deltas: &UpgradeDeltas) -> u32 {
        self.carried_damage_bonus + self.upgrades.damage_bonus(deltas)
    }

    pub(crate) fn max_health(&self, deltas: &UpgradeDeltas) -> u32 {
        self.base_max_health + self.upgrades.health_bonus(deltas)
    }

    pub(crate) fn apply_upgrade(&mut self, choice: UpgradeChoice, deltas: &UpgradeDeltas) {
        self.upgrades.apply(choice);
        if choice == UpgradeChoice::MaxHealth {
            self.health.raise_max(deltas.max_health);
        }
    }

    pub(crate) fn is_invulnerable(&self, now: Tick) -> bool {
        now < self.invulnerable_until
    }

    /// Shield first, then the companion reduction, then invulnerability
    /// frames. Returns the health actually removed.
    pub(crate) fn receive_damage(&mut self, raw: u32, now: Tick, rules: &DamageRules) -> u32 {
        if !self.is_alive() {
            return 0;
        }
        let mut amount = self.shield.reduce(raw, rules.shield_factor, now);
        if let Some(reduction) = rules.companion_reduction {
            amount = (amount as f32 * reduction).floor() as u32;
        }
        if self.is_invulnerable(now) {
            return 0;
        }
        let dealt = self.health.apply_damage(amount);
        if dealt > 0 {
            self.invulnerable_until = now + rules.invulnerability;
        }
        dealt
    }

    #[cfg(test)]
    pub(crate) fn heal(&mut self, amount: u32) {
        self.health.heal(amount);
    }

    pub(crate) fn restore_full(&mut self) {
        self.health.restore_full();
    }

    pub(crate) fn view(&self) -> HeroView {
        HeroView {
            id: self.name,
            rect: self.body.rect(),
            alive: self.is_alive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTAS: UpgradeDeltas = UpgradeDeltas {
        speed: 20.0,
        damage: 5,
        max_health: 20,
    };

    fn juan() -> Hero {
        Hero::new(
            HeroName::Juan,
            Vec2::new(100.0, 100.0),
            HeroDefaults {
                max_health: 100,
                speed: 200.0,
                damage: 15,
            },
        )
    }

    fn rules(companion_reduction: Option<f32>) -> DamageRules {
        DamageRules {
            shield_factor: 0.5,
            invulnerability: 30,
            companion_reduction,
        }
    }

    #[test]
    fn invulnerability_blocks_follow_up_hits() {
        let mut hero = juan();
        assert_eq!(hero.receive_damage(10, 0, &rules(None)), 10);
        assert_eq!(hero.receive_damage(10, 29, &rules(None)), 0);
        assert_eq!(hero.receive_damage(10, 30, &rules(None)), 10);
        assert_eq!(hero.health().current(), 80);
    }

    #[test]
    fn shield_then_companion_reduction() {
        let mut hero = juan();
        hero.shield_mut().activate(0, 900);
        assert_eq!(hero.receive_damage(25, 0, &rules(Some(0.6))), 7);
    }

    #[test]
    fn upgrades_raise_stats() {
        let mut hero = juan();
        hero.apply_upgrade(UpgradeChoice::MaxHealth, &DELTAS);
        hero.apply_upgrade(UpgradeChoice::Damage, &DELTAS);
        hero.apply_upgrade(UpgradeChoice::Speed, &DELTAS);
        assert_eq!(hero.max_health(&DELTAS), 120);
        assert_eq!(hero.health().max(), 120);
        assert_eq!(hero.health().current(), 120);
        assert_eq!(hero.damage(&DELTAS), 20);
        assert_eq!(hero.speed(&DELTAS), 220.0);
    }

    #[test]
    fn carried_stats_round_trip_into_next_level() {
        let mut hero = juan();
        hero.apply_upgrade(UpgradeChoice::Damage, &DELTAS);
        hero.receive_damage(30, 0, &rules(None));
        let carried = hero.carried_stats(&DELTAS);
        let next = Hero::from_carried(HeroName::Juan, Vec2::ZERO, &carried);
        assert_eq!(next.health().current(), 70);
        assert_eq!(next.health().max(), 100);
        assert_eq!(next.damage(&DELTAS), 20);
        assert_eq!(next.damage_bonus(&DELTAS), 5);

        let downed = CarriedStats {
            health: 0,
            ..carried
        };
        let revived = Hero::from_carried(HeroName::Juan, Vec2::ZERO, &downed);
        assert_eq!(revived.health().current(), 100);
    }

    #[test]
    fn upgrade_bonus_keeps_counting_after_two_level_changes() {
        let mut adan = Hero::new(
            HeroName::Adan,
            Vec2::ZERO,
            HeroDefaults {
                max_health: 120,
                speed: 180.0,
                damage: 40,
            },
        );
        adan.apply_upgrade(UpgradeChoice::Damage, &DELTAS);
        assert_eq!(adan.damage_bonus(&DELTAS), 5);

        let mut next = Hero::from_carried(HeroName::Adan, Vec2::ZERO, &adan.carried_stats(&DELTAS));
        assert_eq!(next.damage(&DELTAS), 45);
        assert_eq!(next.damage_bonus(&DELTAS), 5);

        next.apply_upgrade(UpgradeChoice::Damage, &DELTAS);
        let last = Hero::from_carried(HeroName::Adan, Vec2::ZERO, &next.carried_stats(&DELTAS));
        assert_eq!(last.damage(&DELTAS), 50);
        assert_eq!(last.damage_bonus(&DELTAS), 10);
    }
}
