use std::mem;

use engine::{AudioCue, HeroHandoff, Rect, Vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::attack::{AttackFrames, Hit};
use super::boss::{Boss, BossCast};
use super::collision::{BlockStore, CollisionEditor, CollisionWorld};
use super::companion::{AnimationHint, CompanionAi, CompanionView, RevivalProgress};
use super::config::{DefeatRule, LevelConfig, VictoryRule, WormSpawner};
use super::hero::{DamageRules, Hero, HeroDefaults};
use super::items::{ItemField, UpgradeChoice};
use super::progress::LevelOutcome;
use super::types::{
    cooldown_elapsed, EnemyId, EnemyView, HeroName, HeroView, Tick, BODY_HALF, BODY_SIZE,
    TICKS_PER_SECOND,
};
use super::worm::Worm;

const BOSS_ID: EnemyId = EnemyId(0);

/// Logical actions for one tick, already in world coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct LevelInput {
    pub(crate) movement: Vec2,
    pub(crate) basic_attack: bool,
    pub(crate) ranged_attack: bool,
    pub(crate) ranged_target: Option<Vec2>,
    pub(crate) switch: bool,
    pub(crate) revive_held: bool,
    pub(crate) pause: bool,
    pub(crate) editor_toggle: bool,
    pub(crate) editor_press: Option<Vec2>,
    pub(crate) editor_release: Option<Vec2>,
    pub(crate) editor_delete: Option<Vec2>,
    pub(crate) upgrade: Option<UpgradeChoice>,
    pub(crate) restart: bool,
    pub(crate) main_menu: bool,
    pub(crate) quit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LevelPhase {
    Playing,
    Paused,
    Editing,
    UpgradeMenu,
    Victory { since: Tick },
    Defeat,
}

impl LevelPhase {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Self::Victory { .. } | Self::Defeat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LevelCommand {
    None,
    Advance,
    Restart,
    MainMenu,
    Quit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LevelStats {
    pub(crate) worms_defeated: u32,
    /// Kills since the player's hero last went down.
    pub(crate) streak: u32,
    pub(crate) best_streak: u32,
    pub(crate) ticks_played: u64,
    pub(crate) drop_rolls: u32,
    pub(crate) boss_defeated: bool,
}

impl LevelStats {
    fn record_kill(&mut self) {
        self.worms_defeated += 1;
        self.streak += 1;
        self.best_streak = self.best_streak.max(self.streak);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct IncomingHit {
    target: HeroName,
    amount: u32,
    knockback: Vec2,
}

/// All per-level simulation state. The scene rebuilds it on every load, so
/// a restart starts from a fresh value.
pub(crate) struct LevelState {
    config: LevelConfig,
    now: Tick,
    rng: StdRng,
    collision: CollisionWorld,
    editor: CollisionEditor,
    block_store: Option<BlockStore>,
    heroes: [Hero; 2],
    active: HeroName,
    companion: CompanionAi,
    companion_hint: AnimationHint,
    last_switch: Option<Tick>,
    worms: Vec<Worm>,
    next_enemy_id: u32,
    boss: Option<Boss>,
    items: ItemField,
    phase: LevelPhase,
    cues: Vec<AudioCue>,
    stats: LevelStats,
    last_worm_spawn: Option<Tick>,
}

impl LevelState {
    pub(crate) fn new(
        config: LevelConfig,
        handoff: Option<&HeroHandoff>,
        block_store: Option<BlockStore>,
    ) -> Self {
        let mut collision = CollisionWorld::new(config.world_width, config.world_height);
        if let Some(store) = &block_store {
            if let Err(error) = store.load_into(&mut collision) {
                warn!(error = %error, "block_file_load_failed");
            }
        }

        let heroes = [
            spawn_hero(HeroName::Juan, config.juan_spawn, config.juan, handoff),
            spawn_hero(HeroName::Adan, config.adan_spawn, config.adan, handoff),
        ];

        let mut items = ItemField::default();
        if let Some(plan) = &config.item_plan {
            for planned in &plan.scheduled {
                items.schedule(planned.kind, planned.position, planned.delay);
            }
        }

        let boss = config
            .boss_spawn
            .map(|position| Boss::new(BOSS_ID, position, config.boss, 0));
        let active = HeroName::Juan;
        let mut level = Self {
            rng: StdRng::seed_from_u64(config.rng_seed),
            now: 0,
            collision,
            editor: CollisionEditor::default(),
            block_store,
            heroes,
            active,
            companion: CompanionAi::new(active, config.companion),
            companion_hint: AnimationHint::default(),
            last_switch: None,
            worms: Vec::new(),
            next_enemy_id: BOSS_ID.0 + 1,
            boss,
            items,
            phase: LevelPhase::Playing,
            cues: Vec::new(),
            stats: LevelStats::default(),
            last_worm_spawn: None,
            config,
        };

        if let Some(spawner) = level.config.spawner.clone() {
            for _ in 0..spawner.initial {
                if let Some(position) =
                    pick_spawn_position(&spawner, &mut level.rng, &level.collision, &level.heroes)
                {
                    level.spawn_enemy(position, false);
                }
            }
        }

        info!(
            level = level.config.level,
            blocks = level.collision.len(),
            worms = level.worms.len(),
            boss = level.boss.is_some(),
            carried = handoff.is_some(),
            "level_started"
        );
        level
    }

    pub(crate) fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> Tick {
        self.now
    }

    pub(crate) fn phase(&self) -> LevelPhase {
        self.phase
    }

    pub(crate) fn active(&self) -> HeroName {
        self.active
    }

    pub(crate) fn hero(&self, name: HeroName) -> &Hero {
        &self.heroes[name.index()]
    }

    pub(crate) fn active_hero(&self) -> &Hero {
        self.hero(self.active)
    }

    pub(crate) fn heroes(&self) -> &[Hero; 2] {
        &self.heroes
    }

    pub(crate) fn companion(&self) -> &CompanionAi {
        &self.companion
    }

    pub(crate) fn companion_hint(&self) -> AnimationHint {
        self.companion_hint
    }

    pub(crate) fn worms(&self) -> &[Worm] {
        &self.worms
    }

    pub(crate) fn boss(&self) -> Option<&Boss> {
        self.boss.as_ref()
    }

    pub(crate) fn items(&self) -> &ItemField {
        &self.items
    }

    pub(crate) fn collision(&self) -> &CollisionWorld {
        &self.collision
    }

    pub(crate) fn editor(&self) -> &CollisionEditor {
        &self.editor
    }

    pub(crate) fn stats(&self) -> LevelStats {
        self.stats
    }

    pub(crate) fn is_simulation_paused(&self) -> bool {
        matches!(
            self.phase,
            LevelPhase::Paused | LevelPhase::Editing | LevelPhase::UpgradeMenu
        )
    }

    pub(crate) fn take_cues(&mut self) -> Vec<AudioCue> {
        mem::take(&mut self.cues)
    }

    pub(crate) fn set_attack_frames(&mut self, name: HeroName, frames: AttackFrames) {
        self.heroes[name.index()].attack.set_frames(frames);
    }

    /// Stats each hero carries into the next level.
    pub(crate) fn export_handoff(&self) -> HeroHandoff {
        self.heroes
            .iter()
            .map(|hero| {
                (
                    hero.name.as_str().to_string(),
                    hero.carried_stats(&self.config.upgrades),
                )
            })
            .collect()
    }

    /// `Some` once the level has ended either way.
    pub(crate) fn outcome(&self) -> Option<LevelOutcome> {
        let victory = match self.phase {
            LevelPhase::Victory { .. } => true,
            LevelPhase::Defeat => false,
            _ => return None,
        };
        Some(LevelOutcome {
            level: self.config.level,
            victory,
            worms_defeated: self.stats.worms_defeated,
            best_worm_streak: self.stats.best_streak,
            ticks_played: self.stats.ticks_played,
            blocks_placed: self.editor.placed_this_session(),
        })
    }

    fn spawn_enemy(&mut self, position: Vec2, minion: bool) -> EnemyId {
        let id = EnemyId(self.next_enemy_id);
        self.next_enemy_id += 1;
        let worm = Worm::new(id, position, self.config.worm, &mut self.rng);
        self.worms.push(if minion { worm.into_minion() } else { worm });
        debug!(id = id.0, minion, x = position.x, y = position.y, "worm_spawned");
        id
    }

    /// Runs one fixed tick. Terminal phases only listen for restart and menu.
    pub(crate) fn tick(&mut self, input: &LevelInput) -> LevelCommand {
        if input.quit {
            return LevelCommand::Quit;
        }
        if self.phase.is_terminal() {
            return self.tick_terminal(input);
        }

        self.handle_mode_toggles(input);
        match self.phase {
            LevelPhase::Editing => self.handle_editor(input),
            LevelPhase::UpgradeMenu => self.handle_upgrade_menu(input),
            LevelPhase::Playing => self.simulate(input),
            LevelPhase::Paused | LevelPhase::Victory { .. } | LevelPhase::Defeat => {}
        }
        LevelCommand::None
    }

    fn tick_terminal(&mut self, input: &LevelInput) -> LevelCommand {
        if input.restart {
            return LevelCommand::Restart;
        }
        if input.main_menu {
            return LevelCommand::MainMenu;
        }
        self.now += 1;
        if let LevelPhase::Victory { since } = self.phase {
            if self.config.advance_after_victory
                && self.now.saturating_sub(since) >= self.config.victory_banner
            {
                return LevelCommand::Advance;
            }
        }
        LevelCommand::None
    }

    fn handle_mode_toggles(&mut self, input: &LevelInput) {
        if input.editor_toggle && matches!(self.phase, LevelPhase::Playing | LevelPhase::Editing) {
            let active = self.editor.toggle();
            self.phase = if active {
                LevelPhase::Editing
            } else {
                LevelPhase::Playing
            };
            info!(active, blocks = self.collision.len(), "editor_toggled");
            return;
        }
        if input.pause {
            match self.phase {
                LevelPhase::Playing => self.phase = LevelPhase::Paused,
                LevelPhase::Paused => self.phase = LevelPhase::Playing,
                _ => return,
            }
            self.cues.push(AudioCue::Pause);
            debug!(paused = self.phase == LevelPhase::Paused, "pause_toggled");
        }
    }

    fn handle_editor(&mut self, input: &LevelInput) {
        let mut changed = false;
        if let Some(point) = input.editor_press {
            self.editor.pointer_pressed(point);
        }
        if let Some(point) = input.editor_release {
            // New cells on top of an actor would trap it; they are taken back.
            let actors = self.actor_rects();
            let placement = self.editor.pointer_released(point, &mut self.collision, |cell| {
                !actors.iter().any(|actor| actor.intersects(cell))
            });
            if placement.kept > 0 {
                debug!(added = placement.kept, evicted = placement.rejected, "blocks_added");
                changed = true;
            }
        }
        if let Some(point) = input.editor_delete {
            if self.editor.delete_at(point, &mut self.collision) {
                debug!(x = point.x, y = point.y, "block_removed");
                changed = true;
            }
        }
        if changed {
            self.persist_blocks();
        }
    }

    fn actor_rects(&self) -> Vec<Rect> {
        let mut actors: Vec<_> = self.heroes.iter().map(|hero| hero.body.rect()).collect();
        actors.extend(
            self.worms
                .iter()
                .filter(|worm| worm.is_alive())
                .map(|worm| worm.body.rect()),
        );
        actors.extend(self.boss.iter().map(|boss| boss.body.rect()));
        actors
    }

    fn persist_blocks(&self) {
        let Some(store) = &self.block_store else {
            return;
        };
        if let Err(error) = store.save(&self.collision) {
            warn!(error = %error, "block_file_save_failed");
        }
    }

    fn handle_upgrade_menu(&mut self, input: &LevelInput) {
        let Some(choice) = input.upgrade else {
            return;
        };
        let deltas = self.config.upgrades;
        let hero = &mut self.heroes[self.active.index()];
        hero.apply_upgrade(choice, &deltas);
        self.cues.push(AudioCue::UpgradeSelect);
        info!(hero = hero.name.as_str(), choice = choice.label(), "upgrade_applied");
        self.phase = LevelPhase::Playing;
    }

    fn try_switch(&mut self) -> bool {
        let both_alive = self.heroes.iter().all(Hero::is_alive);
        let idle = self.heroes.iter().all(|hero| !hero.attack.is_attacking());
        if !both_alive
            || !idle
            || !cooldown_elapsed(self.now, self.last_switch, self.config.switch_cooldown)
        {
            return false;
        }
        self.active = self.active.other();
        self.companion = CompanionAi::new(self.active, self.config.companion);
        self.last_switch = Some(self.now);
        self.heroes[self.companion.companion().index()].body.stop();
        self.cues.push(AudioCue::CharacterSwitch);
        info!(active = self.active.as_str(), "character_switched");
        true
    }

    fn hero_views(&self) -> Vec<HeroView> {
        self.heroes.iter().map(Hero::view).collect()
    }

    fn enemy_views(&self) -> Vec<EnemyView> {
        let mut views: Vec<EnemyView> = self.boss.iter().map(Boss::view).collect();
        views.extend(self.worms.iter().map(Worm::view));
        views
    }

    /// One simulation step. Every intent reads the start-of-tick snapshot;
    /// damage is applied afterwards in a single ordered sweep.
    fn simulate(&mut self, input: &LevelInput) {
        self.now += 1;
        self.stats.ticks_played += 1;
        let now = self.now;
        let bounds = self.collision.bounds();
        let deltas = self.config.upgrades;

        if input.switch {
            self.try_switch();
        }

        let hero_views = self.hero_views();
        let enemy_views = self.enemy_views();
        let mut hits: Vec<Hit> = Vec::new();
        let mut incoming: Vec<IncomingHit> = Vec::new();

        let player = &mut self.heroes[self.active.index()];
        if player.is_alive() {
            let speed = player.speed(&deltas);
            player.body.step(input.movement, speed, &self.collision);
            let (origin, facing) = (player.body.position, player.body.facing);
            let damage = player.damage(&deltas);
            if input.basic_attack
                && player
                    .attack
                    .begin(now, origin, facing, damage, &bounds, &enemy_views)
            {
                self.cues.push(AudioCue::AttackBasic);
            }
            if let Some(target) = input.ranged_target.filter(|_| input.ranged_attack) {
                let bonus = player.damage_bonus(&deltas);
                let from = player.body.center();
                if player.attack.fire_ranged(now, from, target, bonus) {
                    self.cues.push(AudioCue::AttackRanged);
                }
            }
        } else {
            player.body.stop();
        }
        let player_center = player.body.center();

        hits.extend(self.drive_companion(player_center, &enemy_views));
        self.update_revival(input, player_center);

        for worm in &mut self.worms {
            if !worm.is_alive() {
                continue;
            }
            let intent = worm.think(now, &hero_views);
            let speed = worm.speed();
            worm.body.step(intent.movement, speed, &self.collision);
            if let Some(strike) = intent.strike {
                incoming.push(IncomingHit {
                    target: strike.target,
                    amount: strike.damage,
                    knockback: strike.knockback,
                });
            }
        }

        let mut summon_at = None;
        if let Some(boss) = &mut self.boss {
            let intent = boss.think(now, &hero_views);
            let speed = boss.speed();
            boss.body.step(intent.movement, speed, &self.collision);
            if let Some(cast) = intent.cast {
                self.cues.push(AudioCue::BossSpell);
                debug!(special = cast == BossCast::Special, "boss_cast");
            }
            summon_at = intent.summon_at;
        }
        if let Some(center) = summon_at {
            self.summon_minion(center);
        }

        let enemies_now = self.enemy_views();
        let heroes_now = self.hero_views();
        let alive_at_start = |id: EnemyId| {
            enemy_views
                .iter()
                .any(|enemy| enemy.id == id && enemy.alive)
        };
        for hero in &mut self.heroes {
            hits.extend(hero.attack.tick(&alive_at_start));
            hits.extend(hero.attack.step_projectiles(now, &enemies_now));
        }
        if let Some(boss) = &mut self.boss {
            incoming.extend(boss.step_projectiles(now, &heroes_now).into_iter().map(|hit| {
                IncomingHit {
                    target: hit.target,
                    amount: hit.amount,
                    knockback: Vec2::ZERO,
                }
            }));
        }

        self.apply_enemy_damage(&hits);
        self.apply_hero_damage(&incoming);
        self.resolve_deaths();
        self.update_items(input);

        for hero in &mut self.heroes {
            if hero.shield_mut().expire(now) {
                debug!(hero = hero.name.as_str(), "shield_expired");
            }
        }
        if let Some(boss) = &mut self.boss {
            boss.tick_effects();
        }

        self.run_spawner();
        self.evaluate_outcome();
    }

    fn drive_companion(&mut self, player_center: Vec2, enemies: &[EnemyView]) -> Vec<Hit> {
        let now = self.now;
        let bounds = self.collision.bounds();
        let deltas = self.config.upgrades;
        let mate = &mut self.heroes[self.companion.companion().index()];
        let me = CompanionView {
            center: mate.body.center(),
            health_fraction: mate.health().fraction(),
            alive: mate.is_alive(),
            attack_range: mate.attack.base_reach(),
        };
        let intent = self.companion.think(&me, player_center, enemies);
        self.companion_hint = intent.hint;
        if !mate.is_alive() {
            mate.body.stop();
            return Vec::new();
        }

        let speed = mate.speed(&deltas);
        mate.body.step(intent.movement, speed, &self.collision);
        if let Some(face) = intent.face {
            mate.body.face(face);
        }
        if intent.attack.is_none() {
            return Vec::new();
        }
        let (origin, facing) = (mate.body.position, mate.body.facing);
        let damage = mate.damage(&deltas);
        let swing = mate
            .attack
            .strike_immediately(now, origin, facing, damage, &bounds, enemies);
        match swing {
            Some(hits) => {
                self.cues.push(AudioCue::AttackBasic);
                hits
            }
            None => Vec::new(),
        }
    }

    fn update_revival(&mut self, input: &LevelInput, player_center: Vec2) {
        let player_alive = self.heroes[self.active.index()].is_alive();
        let mate = &mut self.heroes[self.companion.companion().index()];
        let distance = player_center.distance(mate.body.center());
        let held = input.revive_held && player_alive;
        if self.companion.update_revival(held, distance) == RevivalProgress::Completed {
            mate.restore_full();
            self.cues.push(AudioCue::Revive);
            info!(hero = mate.name.as_str(), "companion_revived");
        }
    }

    fn summon_minion(&mut self, center: Vec2) {
        let max_x = (self.config.world_width - BODY_SIZE).max(0.0);
        let max_y = (self.config.world_height - BODY_SIZE).max(0.0);
        let position = Vec2::new(
            (center.x - BODY_HALF).clamp(0.0, max_x),
            (center.y - BODY_HALF).clamp(0.0, max_y),
        );
        if !self
            .collision
            .can_move(Vec2::new(BODY_SIZE, BODY_SIZE), position)
        {
            debug!(x = position.x, y = position.y, "summon_blocked");
            return;
        }
        let id = self.spawn_enemy(position, true);
        if let Some(boss) = &mut self.boss {
            boss.register_minion(id);
        }
        self.cues.push(AudioCue::BossSummon);
        info!(id = id.0, "minion_summoned");
    }

    /// Hits on dead targets are no-ops, so a kill earlier in the sweep
    /// absorbs any later hit on the same enemy.
    fn apply_enemy_damage(&mut self, hits: &[Hit]) {
        let now = self.now;
        for hit in hits {
            if let Some(boss) = self.boss.as_mut().filter(|boss| boss.id == hit.target) {
                let (dealt, killed) = boss.take_damage(hit.amount);
                if killed {
                    self.stats.boss_defeated = true;
                    self.cues.push(AudioCue::EnemyDeath);
                    info!(damage = dealt, "boss_defeated");
                } else if dealt > 0 {
                    self.cues.push(AudioCue::EnemyHit);
                }
                continue;
            }
            let Some(worm) = self.worms.iter_mut().find(|worm| worm.id == hit.target) else {
                continue;
            };
            let result = worm.take_damage(hit.amount, now, &mut self.rng, &self.collision);
            if result.killed {
                self.stats.record_kill();
                self.cues.push(AudioCue::EnemyDeath);
                info!(
                    id = worm.id.0,
                    minion = worm.is_minion(),
                    defeated = self.stats.worms_defeated,
                    "worm_died"
                );
            } else if result.dealt > 0 {
                self.cues.push(AudioCue::EnemyHit);
            }
        }
    }

    fn apply_hero_damage(&mut self, incoming: &[IncomingHit]) {
        let now = self.now;
        for hit in incoming {
            let rules = DamageRules {
                shield_factor: self.config.shield_factor,
                invulnerability: self.config.invulnerability,
                companion_reduction: (hit.target != self.active)
                    .then_some(self.companion.tuning().damage_reduction),
            };
            let hero = &mut self.heroes[hit.target.index()];
            let was_alive = hero.is_alive();
            let dealt = hero.receive_damage(hit.amount, now, &rules);
            if dealt == 0 {
                continue;
            }
            self.cues.push(AudioCue::PlayerHurt);
            if !hit.knockback.is_zero() {
                hero.body.push(hit.knockback, &self.collision);
            }
            if was_alive && !hero.is_alive() {
                hero.attack.reset();
                hero.body.stop();
                self.cues.push(AudioCue::PlayerDeath);
                if hit.target == self.active {
                    self.stats.streak = 0;
                }
                info!(hero = hero.name.as_str(), "hero_downed");
            }
        }
    }

    /// Each dead worm gets its one drop roll, then leaves the roster.
    fn resolve_deaths(&mut self) {
        let bounds = self.collision.bounds();
        for worm in &mut self.worms {
            if !worm.claim_drop_roll() {
                continue;
            }
            self.stats.drop_rolls += 1;
            if let Some(kind) = self.config.drops.roll(&mut self.rng) {
                self.items
                    .spawn_drop(kind, worm.body.center(), self.now, &mut self.rng, &bounds);
                debug!(?kind, "item_dropped");
            }
        }
        self.worms.retain(Worm::is_alive);
        let worms = &self.worms;
        if let Some(boss) = &mut self.boss {
            boss.retain_minions(|id| worms.iter().any(|worm| worm.id == id));
        }
    }

    fn update_items(&mut self, input: &LevelInput) {
        let now = self.now;
        self.items.activate_due(now);
        if let Some(plan) = &self.config.item_plan {
            let mut avoid: Vec<Vec2> = self.heroes.iter().map(|hero| hero.body.center()).collect();
            avoid.extend(
                self.boss
                    .iter()
                    .filter(|boss| boss.is_alive())
                    .map(|boss| boss.body.center()),
            );
            if let Some(position) =
                self.items
                    .try_distributed_spawn(now, plan, &mut self.rng, &self.collision, &avoid)
            {
                debug!(x = position.x, y = position.y, "item_spawned");
            }
        }

        let player = &mut self.heroes[self.active.index()];
        if player.is_alive() {
            let rect = player.body.rect();
            if self.items.collect_apple(&rect) {
                self.cues.push(AudioCue::CollectItem);
                self.phase = LevelPhase::UpgradeMenu;
                info!(hero = player.name.as_str(), "apple_collected");
            }
            if input.revive_held && self.items.collect_potion(&rect) {
                player
                    .shield_mut()
                    .activate(now, self.config.shield_duration);
                self.cues.push(AudioCue::CollectItem);
                self.cues.push(AudioCue::ShieldActivate);
                info!(hero = player.name.as_str(), "shield_activated");
            }
        }
        self.items.prune_collected();
        self.items.animate();
    }

    fn run_spawner(&mut self) {
        let Some(spawner) = self.config.spawner.as_ref() else {
            return;
        };
        let alive = self
            .worms
            .iter()
            .filter(|worm| worm.is_alive() && !worm.is_minion())
            .count();
        if alive >= spawner.max_alive
            || !cooldown_elapsed(self.now, self.last_worm_spawn, spawner.interval)
        {
            return;
        }
        self.last_worm_spawn = Some(self.now);
        let attempts = spawner.attempts;
        match pick_spawn_position(spawner, &mut self.rng, &self.collision, &self.heroes) {
            Some(position) => {
                self.spawn_enemy(position, false);
            }
            None => debug!(attempts, "worm_spawn_rejected"),
        }
    }

    fn evaluate_outcome(&mut self) {
        let victory = match self.config.victory {
            VictoryRule::WormsDefeated(goal) => self.stats.worms_defeated >= goal,
            VictoryRule::BossDefeated => self.boss.as_ref().is_some_and(|boss| !boss.is_alive()),
        };
        if victory {
            self.phase = LevelPhase::Victory { since: self.now };
            self.cues.push(AudioCue::Victory);
            info!(
                level = self.config.level,
                worms = self.stats.worms_defeated,
                ticks = self.stats.ticks_played,
                "level_victory"
            );
            return;
        }

        let active_down = !self.active_hero().is_alive();
        let both_down = self.heroes.iter().all(|hero| !hero.is_alive());
        let defeated = match self.config.defeat {
            DefeatRule::ActiveHeroDown => active_down,
            DefeatRule::BothHeroesDown => both_down,
        };
        if defeated {
            self.phase = LevelPhase::Defeat;
            self.cues.push(AudioCue::GameOver);
            info!(level = self.config.level, ticks = self.stats.ticks_played, "level_defeat");
        } else if active_down {
            self.hand_over_control();
        }
    }

    /// The standing hero takes over; the downed one becomes the companion
    /// waiting to be revived.
    fn hand_over_control(&mut self) {
        self.active = self.active.other();
        self.companion = CompanionAi::new_downed(self.active, self.config.companion);
        self.cues.push(AudioCue::CharacterSwitch);
        info!(active = self.active.as_str(), "control_handed_over");
    }

    pub(crate) fn status_line(&self) -> String {
        let level = self.config.level;
        let health = |name: HeroName| {
            let health = self.hero(name).health();
            format!("{} {}/{}", name.as_str(), health.current(), health.max())
        };
        let goal = match self.config.victory {
            VictoryRule::WormsDefeated(goal) => {
                format!("Worms {}/{}", self.stats.worms_defeated, goal)
            }
            VictoryRule::BossDefeated => match &self.boss {
                Some(boss) => format!(
                    "Shaman {}/{}",
                    boss.health().current(),
                    boss.health().max()
                ),
                None => "Shaman -".to_string(),
            },
        };
        match self.phase {
            LevelPhase::Playing => {
                let mut line = format!(
                    "Level {level} | {} | {} | {goal} | Playing as {}",
                    health(HeroName::Juan),
                    health(HeroName::Adan),
                    self.active.as_str()
                );
                let shield = self.active_hero().shield().remaining(self.now);
                if shield > 0 {
                    let seconds = shield.div_ceil(TICKS_PER_SECOND);
                    line.push_str(&format!(" | Shield {seconds}s"));
                }
                if self.companion.is_being_revived() {
                    let required = self.companion.tuning().revival_required.max(1);
                    let percent = self.companion.revival_timer() * 100 / required;
                    line.push_str(&format!(" | Reviving {percent}%"));
                }
                line
            }
            LevelPhase::Paused => format!("Level {level} | Paused"),
            LevelPhase::Editing => {
                format!("Level {level} | Editor | {} blocks", self.collision.len())
            }
            LevelPhase::UpgradeMenu => format!(
                "Choose an upgrade: 1) {} 2) {} 3) {}",
                UpgradeChoice::Speed.label(),
                UpgradeChoice::Damage.label(),
                UpgradeChoice::MaxHealth.label()
            ),
            LevelPhase::Victory { .. } if self.config.advance_after_victory => {
                format!("Level {level} | Victory! {goal}")
            }
            LevelPhase::Victory { .. } => {
                format!("Level {level} | Victory! R to play again, M for menu")
            }
            LevelPhase::Defeat => format!("Level {level} | Defeat. R to restart, M for menu"),
        }
    }
}

#[cfg(test)]
impl LevelState {
    pub(crate) fn hero_mut(&mut self, name: HeroName) -> &mut Hero {
        &mut self.heroes[name.index()]
    }

    pub(crate) fn spawn_worm(&mut self, position: Vec2) -> EnemyId {
        self.spawn_enemy(position, false)
    }

    pub(crate) fn place_item(&mut self, kind: super::items::ItemKind, position: Vec2) {
        self.items.schedule(kind, position, self.now);
    }
}

fn spawn_hero(
    name: HeroName,
    position: Vec2,
    defaults: HeroDefaults,
    handoff: Option<&HeroHandoff>,
) -> Hero {
    let carried = handoff.and_then(|handoff| {
        handoff
            .iter()
            .find(|(key, _)| HeroName::from_name(key) == Some(name))
            .map(|(_, stats)| stats)
    });
    match carried {
        Some(stats) => Hero::from_carried(name, position, stats),
        None => Hero::new(name, position, defaults),
    }
}

/// A random free spot inside one of the spawn areas, clear of blocks and of
/// both heroes.
fn pick_spawn_position(
    spawner: &WormSpawner,
    rng: &mut StdRng,
    collision: &CollisionWorld,
    heroes: &[Hero; 2],
) -> Option<Vec2> {
    if spawner.areas.is_empty() {
        return None;
    }
    let size = Vec2::new(BODY_SIZE, BODY_SIZE);
    for _ in 0..spawner.attempts {
        let area = spawner.areas[rng.gen_range(0..spawner.areas.len())];
        let span_x = (area.w - BODY_SIZE).max(0.0);
        let span_y = (area.h - BODY_SIZE).max(0.0);
        let position = Vec2::new(
            area.x + rng.gen_range(0.0..=span_x),
            area.y + rng.gen_range(0.0..=span_y),
        );
        let rect = Rect::at(position, size);
        if !collision.can_move(size, position)
            || heroes.iter().any(|hero| hero.body.rect().intersects(&rect))
        {
            continue;
        }
        return Some(position);
    }
    None
}
