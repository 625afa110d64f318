use engine::{InputAction, Rect, Vec2};
use rand::Rng;

use super::collision::CollisionWorld;
use super::types::{cooldown_elapsed, ticks_from_secs, Tick, TICK_SECONDS};

pub(crate) const ITEM_SIZE: f32 = 32.0;
const DROP_JITTER: f32 = 16.0;
const BOB_RATE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ItemKind {
    Apple,
    Potion,
}

impl ItemKind {
    pub(crate) fn sprite_key(self) -> &'static str {
        match self {
            Self::Apple => "items/apple",
            Self::Potion => "items/potion",
        }
    }
}

/// `position` is the top-left of the item's square.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Item {
    pub(crate) kind: ItemKind,
    pub(crate) position: Vec2,
    active: bool,
    appear_at: Tick,
    collected: bool,
    bob_phase: f32,
}

impl Item {
    fn new(kind: ItemKind, position: Vec2, appear_at: Tick) -> Self {
        Self {
            kind,
            position,
            active: false,
            appear_at,
            collected: false,
            bob_phase: 0.0,
        }
    }

    pub(crate) fn rect(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, ITEM_SIZE, ITEM_SIZE)
    }

    pub(crate) fn center(&self) -> Vec2 {
        self.rect().center()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active && !self.collected
    }

    /// Visual offset only; pickups use the unshifted rect.
    pub(crate) fn bob_offset(&self) -> f32 {
        self.bob_phase.sin() * 3.0
    }
}

/// Independent per-kind chances for the one roll made when an enemy dies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DropTable {
    pub(crate) apple: f32,
    pub(crate) potion: f32,
}

impl DropTable {
    pub(crate) fn roll(&self, rng: &mut impl Rng) -> Option<ItemKind> {
        let roll: f32 = rng.gen();
        if roll < self.apple {
            Some(ItemKind::Apple)
        } else if roll < self.apple + self.potion {
            Some(ItemKind::Potion)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct UpgradeDeltas {
    pub(crate) speed: f32,
    pub(crate) damage: u32,
    pub(crate) max_health: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum UpgradeChoice {
    Speed,
    Damage,
    MaxHealth,
}

impl UpgradeChoice {
    pub(crate) fn from_action(action: InputAction) -> Option<Self> {
        match action {
            InputAction::UpgradeOne => Some(Self::Speed),
            InputAction::UpgradeTwo => Some(Self::Damage),
            InputAction::UpgradeThree => Some(Self::MaxHealth),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Damage => "damage",
            Self::MaxHealth => "max_health",
        }
    }
}

/// Upgrade levels bought this level. Stats derive from the counts, so the
/// order of purchases never matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Upgrades {
    pub(crate) speed_levels: u32,
    pub(crate) damage_levels: u32,
    pub(crate) health_levels: u32,
}

impl Upgrades {
    pub(crate) fn apply(&mut self, choice: UpgradeChoice) {
        match choice {
            UpgradeChoice::Speed => self.speed_levels += 1,
            UpgradeChoice::Damage => self.damage_levels += 1,
            UpgradeChoice::MaxHealth => self.health_levels += 1,
        }
    }

    pub(crate) fn speed_bonus(&self, deltas: &UpgradeDeltas) -> f32 {
        self.speed_levels as f32 * deltas.speed
    }

    pub(crate) fn damage_bonus(&self, deltas: &UpgradeDeltas) -> u32 {
        self.damage_levels * deltas.damage
    }

    pub(crate) fn health_bonus(&self, deltas: &UpgradeDeltas) -> u32 {
        self.health_levels * deltas.max_health
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Shield {
    expires_at: Option<Tick>,
}

impl Shield {
    pub(crate) fn activate(&mut self, now: Tick, duration: Tick) {
        self.expires_at = Some(now + duration);
    }

    pub(crate) fn is_active(&self, now: Tick) -> bool {
        self.expires_at.is_some_and(|expires_at| now < expires_at)
    }

    pub(crate) fn remaining(&self, now: Tick) -> Tick {
        self.expires_at
            .map(|expires_at| expires_at.saturating_sub(now))
            .unwrap_or(0)
    }

    /// Clears an elapsed shield; returns true on the tick it lapses.
    pub(crate) fn expire(&mut self, now: Tick) -> bool {
        if self.expires_at.is_some() && !self.is_active(now) {
            self.expires_at = None;
            return true;
        }
        false
    }

    pub(crate) fn reduce(&self, raw: u32, factor: f32, now: Tick) -> u32 {
        if self.is_active(now) {
            (raw as f32 * factor).floor() as u32
        } else {
            raw
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlannedItem {
    pub(crate) kind: ItemKind,
    pub(crate) position: Vec2,
    pub(crate) delay: Tick,
}

/// Rate-limited scattering of items over the map.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ItemPlan {
    pub(crate) cap: usize,
    pub(crate) interval: Tick,
    pub(crate) attempts: u32,
    pub(crate) item_spacing: f32,
    pub(crate) actor_spacing: f32,
    pub(crate) apple_share: f32,
    pub(crate) scheduled: Vec<PlannedItem>,
}

impl Default for ItemPlan {
    fn default() -> Self {
        Self {
            cap: 10,
            interval: ticks_from_secs(5.0),
            attempts: 50,
            item_spacing: 150.0,
            actor_spacing: 100.0,
            apple_share: 0.5,
            scheduled: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ItemField {
    items: Vec<Item>,
    last_spawn_attempt: Option<Tick>,
}

impl ItemField {
    pub(crate) fn items(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn active_items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| item.is_active())
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Appears at `appear_at`; until then it is neither drawn nor collectable.
    pub(crate) fn schedule(&mut self, kind: ItemKind, position: Vec2, appear_at: Tick) {
        self.items.push(Item::new(kind, position, appear_at));
    }

    /// Drops `kind` centred on `at`, nudged by a small random offset and kept
    /// inside the world.
    pub(crate) fn spawn_drop(
        &mut self,
        kind: ItemKind,
        at: Vec2,
        now: Tick,
        rng: &mut impl Rng,
        bounds: &Rect,
    ) {
        let jitter = Vec2::new(
            rng.gen_range(-DROP_JITTER..=DROP_JITTER),
            rng.gen_range(-DROP_JITTER..=DROP_JITTER),
        );
        let half = ITEM_SIZE * 0.5;
        let max_x = (bounds.right() - ITEM_SIZE).max(bounds.x);
        let max_y = (bounds.bottom() - ITEM_SIZE).max(bounds.y);
        let x = (at.x + jitter.x - half).clamp(bounds.x, max_x);
        let y = (at.y + jitter.y - half).clamp(bounds.y, max_y);
        let mut item = Item::new(kind, Vec2::new(x, y), now);
        item.active = true;
        self.items.push(item);
    }

    pub(crate) fn activate_due(&mut self, now: Tick) {
        for item in &mut self.items {
            if !item.active && !item.collected && now >= item.appear_at {
                item.active = true;
            }
        }
    }

    /// One placement attempt per `plan.interval`. Rejects spots on blocks,
    /// near other items or near any actor centre in `avoid`. Returns the
    /// placed item's position.
    pub(crate) fn try_distributed_spawn(
        &mut self,
        now: Tick,
        plan: &ItemPlan,
        rng: &mut impl Rng,
        world: &CollisionWorld,
        avoid: &[Vec2],
    ) -> Option<Vec2> {
        if !cooldown_elapsed(now, self.last_spawn_attempt, plan.interval) {
            return None;
        }
        self.last_spawn_attempt = Some(now);
        if self.items.iter().filter(|item| !item.collected).count() >= plan.cap {
            return None;
        }
        let bounds = world.bounds();
        let max_x = bounds.right() - ITEM_SIZE;
        let max_y = bounds.bottom() - ITEM_SIZE;
        if max_x <= 0.0 || max_y <= 0.0 {
            return None;
        }
        for _ in 0..plan.attempts {
            let position = Vec2::new(rng.gen_range(0.0..max_x), rng.gen_range(0.0..max_y));
            let rect = Rect::new(position.x, position.y, ITEM_SIZE, ITEM_SIZE);
            let center = rect.center();
            if world.overlaps_block(&rect) {
                continue;
            }
            if self
                .items
                .iter()
                .filter(|item| !item.collected)
                .any(|item| item.center().distance(center) < plan.item_spacing)
            {
                continue;
            }
            if avoid
                .iter()
                .any(|actor| actor.distance(center) < plan.actor_spacing)
            {
                continue;
            }
            let kind = if rng.gen::<f32>() < plan.apple_share {
                ItemKind::Apple
            } else {
                ItemKind::Potion
            };
            let mut item = Item::new(kind, position, now);
            item.active = true;
            self.items.push(item);
            return Some(position);
        }
        None
    }

    fn collect_first(&mut self, kind: ItemKind, hero: &Rect) -> bool {
        let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.kind == kind && item.is_active() && item.rect().intersects(hero))
        else {
            return false;
        };
        item.collected = true;
        true
    }

    /// Apples are picked up by touching them.
    pub(crate) fn collect_apple(&mut self, hero: &Rect) -> bool {
        self.collect_first(ItemKind::Apple, hero)
    }

    /// Potions need the revive key held down while touching.
    pub(crate) fn collect_potion(&mut self, hero: &Rect) -> bool {
        self.collect_first(ItemKind::Potion, hero)
    }

    pub(crate) fn prune_collected(&mut self) {
        self.items.retain(|item| !item.collected);
    }

    pub(crate) fn animate(&mut self) {
        for item in self.items.iter_mut().filter(|item| item.active) {
            item.bob_phase = (item.bob_phase + BOB_RATE * TICK_SECONDS) % std::f32::consts::TAU;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const LEVEL_ONE_DELTAS: UpgradeDeltas = UpgradeDeltas {
        speed: 20.0,
        damage: 5,
        max_health: 20,
    };

    #[test]
    fn drop_table_rates_are_roughly_honoured() {
        let table = DropTable {
            apple: 0.15,
            potion: 0.15,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let mut apples = 0;
        let mut potions = 0;
        for _ in 0..10_000 {
            match table.roll(&mut rng) {
                Some(ItemKind::Apple) => apples += 1,
                Some(ItemKind::Potion) => potions += 1,
                None => {}
            }
        }
        assert!((1_200..1_800).contains(&apples), "apples {apples}");
        assert!((1_200..1_800).contains(&potions), "potions {potions}");
    }

    #[test]
    fn upgrade_order_does_not_change_totals() {
        let choices = [
            UpgradeChoice::Speed,
            UpgradeChoice::Damage,
            UpgradeChoice::MaxHealth,
            UpgradeChoice::Damage,
        ];
        let mut forward = Upgrades::default();
        choices.iter().for_each(|choice| forward.apply(*choice));
        let mut backward = Upgrades::default();
        choices.iter().rev().for_each(|choice| backward.apply(*choice));
        assert_eq!(forward, backward);
        assert_eq!(forward.damage_bonus(&LEVEL_ONE_DELTAS), 10);
        assert_eq!(forward.speed_bonus(&LEVEL_ONE_DELTAS), 20.0);
        assert_eq!(forward.health_bonus(&LEVEL_ONE_DELTAS), 20);
    }

    #[test]
    fn shield_halves_until_expiry() {
        let mut shield = Shield::default();
        assert_eq!(shield.reduce(25, 0.5, 0), 25);
        shield.activate(10, ticks_from_secs(15.0));
        assert_eq!(shield.reduce(25, 0.5, 10), 12);
        assert_eq!(shield.remaining(10), 900);
        assert!(!shield.expire(909));
        assert!(shield.expire(910));
        assert_eq!(shield.reduce(25, 0.5, 910), 25);
    }

    #[test]
    fn scheduled_items_appear_on_time_and_collect_once() {
        let mut field = ItemField::default();
        field.schedule(ItemKind::Apple, Vec2::new(100.0, 100.0), 30);
        let hero = Rect::new(90.0, 90.0, 64.0, 64.0);
        assert!(!field.collect_apple(&hero));
        field.activate_due(30);
        assert!(field.collect_apple(&hero));
        assert!(!field.collect_apple(&hero));
        field.prune_collected();
        assert_eq!(field.len(), 0);
    }

    #[test]
    fn potion_is_not_collected_as_apple() {
        let mut field = ItemField::default();
        let mut rng = StdRng::seed_from_u64(1);
        let bounds = Rect::new(0.0, 0.0, 640.0, 480.0);
        field.spawn_drop(ItemKind::Potion, Vec2::new(200.0, 200.0), 0, &mut rng, &bounds);
        let hero = Rect::new(160.0, 160.0, 64.0, 64.0);
        assert!(!field.collect_apple(&hero));
        assert!(field.collect_potion(&hero));
    }

    #[test]
    fn drops_stay_inside_the_world() {
        let mut field = ItemField::default();
        let mut rng = StdRng::seed_from_u64(3);
        let bounds = Rect::new(0.0, 0.0, 640.0, 480.0);
        for _ in 0..20 {
            field.spawn_drop(ItemKind::Apple, Vec2::new(0.0, 479.0), 0, &mut rng, &bounds);
        }
        assert!(field.items().iter().all(|item| item.rect().is_within(&bounds)));
    }

    #[test]
    fn distributed_spawn_respects_interval_cap_and_spacing() {
        let world = CollisionWorld::new(1280.0, 720.0);
        let plan = ItemPlan {
            cap: 3,
            ..ItemPlan::default()
        };
        let mut field = ItemField::default();
        let mut rng = StdRng::seed_from_u64(11);
        let heroes = [Vec2::new(640.0, 360.0)];

        assert!(field
            .try_distributed_spawn(0, &plan, &mut rng, &world, &heroes)
            .is_some());
        assert!(field
            .try_distributed_spawn(10, &plan, &mut rng, &world, &heroes)
            .is_none());
        let mut now = 0;
        for _ in 0..10 {
            now += plan.interval;
            field.try_distributed_spawn(now, &plan, &mut rng, &world, &heroes);
        }
        assert_eq!(field.len(), 3);
        let items = field.items();
        for (index, item) in items.iter().enumerate() {
            assert!(item.center().distance(heroes[0]) >= 100.0);
            for other in &items[index + 1..] {
                assert!(item.center().distance(other.center()) >= 150.0);
            }
        }
    }

    #[test]
    fn distributed_spawn_gives_up_when_every_spot_is_blocked() {
        let mut world = CollisionWorld::new(128.0, 128.0);
        world.add_cells_between(Vec2::new(0.0, 0.0), Vec2::new(127.0, 127.0));
        let mut field = ItemField::default();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(field
            .try_distributed_spawn(0, &ItemPlan::default(), &mut rng, &world, &[])
            .is_none());
        assert_eq!(field.len(), 0);
    }
}
