use std::path::PathBuf;

use engine::{
    screen_to_world_px, sequence_key, Camera2D, DrawLayer, HeroHandoff, InputAction,
    InputSnapshot, Rect, RenderableKind, Scene, SceneCommand, SceneKey, SceneWorld, SpriteDesc,
    SpriteLibrary, Vec2,
};
use tracing::{error, info, warn};

use super::attack::AttackFrames;
use super::boss::BossState;
use super::collision::{BlockStore, Cell};
use super::config::LevelConfig;
use super::hero::Hero;
use super::items::UpgradeChoice;
use super::kinematics::display_facing;
use super::level::{LevelCommand, LevelInput, LevelState};
use super::progress::ProgressStore;
use super::types::{Facing, HeroName};

const PLAYER_PROJECTILE_COLOR: [u8; 4] = [250, 230, 120, 255];
const BOSS_PROJECTILE_COLOR: [u8; 4] = [170, 90, 230, 255];
const SPECIAL_PROJECTILE_COLOR: [u8; 4] = [230, 60, 160, 255];
const EFFECT_COLOR: [u8; 4] = [200, 120, 255, 255];
const SHIELD_COLOR: [u8; 4] = [120, 200, 255, 255];
const BLOCK_COLOR: [u8; 4] = [255, 80, 80, 255];
const DRAG_COLOR: [u8; 4] = [255, 220, 80, 255];
const ATTACK_REGION_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Where a level scene reads and writes its files.
#[derive(Debug, Clone)]
pub(crate) struct LevelPaths {
    pub(crate) assets_dir: PathBuf,
    pub(crate) blocks_dir: PathBuf,
    pub(crate) data_dir: PathBuf,
}

/// One playable level hosted by the engine's scene machine. The simulation
/// state is rebuilt on every load; only the received handoff survives.
pub(crate) struct LevelScene {
    key: SceneKey,
    config: LevelConfig,
    paths: LevelPaths,
    handoff: Option<HeroHandoff>,
    state: Option<LevelState>,
    load_error: Option<String>,
    outcome_recorded: bool,
}

impl LevelScene {
    pub(crate) fn new(key: SceneKey, config: LevelConfig, paths: LevelPaths) -> Self {
        Self {
            key,
            config,
            paths,
            handoff: None,
            state: None,
            load_error: None,
            outcome_recorded: false,
        }
    }

    pub(crate) fn state(&self) -> Option<&LevelState> {
        self.state.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> Option<&mut LevelState> {
        self.state.as_mut()
    }

    fn next_scene(&self) -> SceneKey {
        match self.key {
            SceneKey::LevelOne => SceneKey::LevelTwo,
            SceneKey::LevelTwo => SceneKey::LevelOne,
        }
    }

    /// Without assets the level cannot run. Level 2 falls back to the menu;
    /// the menu itself just shows the error.
    fn failed_update(&self, input: &InputSnapshot) -> SceneCommand {
        if input.pressed(InputAction::Quit) || input.quit_requested() {
            return SceneCommand::Quit;
        }
        match self.key {
            SceneKey::LevelOne => SceneCommand::None,
            SceneKey::LevelTwo => SceneCommand::ReturnToMenu,
        }
    }

    fn record_outcome_once(&mut self) {
        if self.outcome_recorded {
            return;
        }
        let Some(outcome) = self.state.as_ref().and_then(LevelState::outcome) else {
            return;
        };
        self.outcome_recorded = true;
        let store = ProgressStore::in_data_dir(&self.paths.data_dir);
        if let Err(error) = store.record(&outcome) {
            warn!(error = %error, "progress_save_failed");
        }
    }
}

impl Scene for LevelScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.outcome_recorded = false;
        self.state = None;
        let level = self.config.level;
        let library = match SpriteLibrary::open(&self.paths.assets_dir) {
            Ok(library) => library,
            Err(error) => {
                error!(level, error = %error, "level_assets_unavailable");
                let message = format!("Level {level} could not load its assets: {error}");
                world.set_status_line(Some(message.clone()));
                self.load_error = Some(message);
                return;
            }
        };
        self.load_error = None;

        let store = BlockStore::for_level(&self.paths.blocks_dir, level);
        let mut state = LevelState::new(self.config.clone(), self.handoff.as_ref(), Some(store));
        for name in HeroName::BOTH {
            let defaults = state.hero(name).attack.frames();
            state.set_attack_frames(name, attack_frames_from(&library, name, defaults));
        }

        world.set_world_size(self.config.world_width, self.config.world_height);
        world.set_background_level(Some(level));
        let (world_w, world_h) = (self.config.world_width, self.config.world_height);
        let focus = state.active_hero().body.center();
        world.camera_mut().center_on(focus, world_w, world_h);
        world.set_status_line(Some(state.status_line()));
        info!(
            level,
            carried = self.handoff.is_some(),
            blocks = state.collision().len(),
            "scene_loaded"
        );
        self.state = Some(state);
    }

    fn update(
        &mut self,
        _fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if self.state.is_none() {
            return self.failed_update(input);
        }
        let Some(state) = self.state.as_mut() else {
            return SceneCommand::None;
        };

        let (width, height) = input.window_size();
        world.camera_mut().set_view_size(width, height);
        let level_input = translate_input(input, world.camera(), state);
        let command = state.tick(&level_input);

        for cue in state.take_cues() {
            world.push_cue(cue);
        }
        let focus = state.active_hero().body.center();
        let (world_w, world_h) = (self.config.world_width, self.config.world_height);
        world
            .camera_mut()
            .follow(focus, self.config.camera_alpha, world_w, world_h);
        world.set_status_line(Some(state.status_line()));
        self.record_outcome_once();

        match command {
            LevelCommand::None => SceneCommand::None,
            LevelCommand::Advance => {
                info!(from = ?self.key, to = ?self.next_scene(), "level_advance");
                SceneCommand::Advance(self.next_scene())
            }
            LevelCommand::Restart => SceneCommand::HardResetTo(self.key),
            LevelCommand::MainMenu => SceneCommand::ReturnToMenu,
            LevelCommand::Quit => SceneCommand::Quit,
        }
    }

    fn render(&mut self, world: &mut SceneWorld) {
        let Some(state) = &self.state else {
            world.set_status_line(self.load_error.clone());
            return;
        };
        push_items(state, world);
        for hero in state.heroes() {
            push_hero(state, hero, world);
        }
        push_enemies(state, world);
        push_projectiles(state, world);
        push_effects(state, world);
        if state.editor().is_active() {
            push_editor(state, world);
        }
        world.set_status_line(Some(state.status_line()));
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.record_outcome_once();
        if let Some(state) = self.state.take() {
            info!(
                level = self.config.level,
                ticks = state.stats().ticks_played,
                worms = state.stats().worms_defeated,
                "scene_unloaded"
            );
        }
    }

    fn export_handoff(&self) -> Option<HeroHandoff> {
        self.state.as_ref().map(LevelState::export_handoff)
    }

    fn accept_handoff(&mut self, handoff: Option<HeroHandoff>) {
        self.handoff = handoff;
    }

    fn is_simulation_paused(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(LevelState::is_simulation_paused)
    }

    fn debug_title(&self, world: &SceneWorld) -> Option<String> {
        world
            .status_line()
            .map(|line| format!("Juan & Adán | {line}"))
    }
}

/// Attack animation lengths come from the sprite sheets on disk when present.
fn attack_frames_from(
    library: &SpriteLibrary,
    name: HeroName,
    defaults: AttackFrames,
) -> AttackFrames {
    Facing::ALL.into_iter().fold(defaults, |frames, facing| {
        let shown = display_facing(name, facing);
        let key = sequence_key(name.sprite_kind(), "attack", shown.as_token());
        match library.sequence_len(&key) {
            Some(len) => frames.with(facing, len as u32),
            None => frames,
        }
    })
}

fn axis(input: &InputSnapshot, negative: InputAction, positive: InputAction) -> f32 {
    let value = |action| if input.is_down(action) { 1.0 } else { 0.0 };
    value(positive) - value(negative)
}

fn translate_input(input: &InputSnapshot, camera: &Camera2D, state: &LevelState) -> LevelInput {
    let cursor = input
        .cursor_position_px()
        .map(|screen| screen_to_world_px(screen, camera));
    let upgrade = [
        InputAction::UpgradeOne,
        InputAction::UpgradeTwo,
        InputAction::UpgradeThree,
    ]
    .into_iter()
    .find(|action| input.pressed(*action))
    .and_then(UpgradeChoice::from_action);

    // Without a cursor, shots go straight ahead.
    let hero = state.active_hero();
    let ahead = hero.body.center()
        + Vec2::from_angle_degrees(hero.body.facing.angle_degrees()) * 100.0;

    LevelInput {
        movement: Vec2::new(
            axis(input, InputAction::MoveLeft, InputAction::MoveRight),
            axis(input, InputAction::MoveUp, InputAction::MoveDown),
        ),
        basic_attack: input.pressed(InputAction::BasicAttack),
        ranged_attack: input.pressed(InputAction::RangedAttack),
        ranged_target: Some(cursor.unwrap_or(ahead)),
        switch: input.pressed(InputAction::Switch),
        revive_held: input.is_down(InputAction::Revive),
        pause: input.pressed(InputAction::Pause),
        editor_toggle: input.pressed(InputAction::EditorToggle),
        editor_press: cursor.filter(|_| input.left_click_pressed()),
        editor_release: cursor.filter(|_| input.left_click_released()),
        editor_delete: cursor.filter(|_| input.pressed(InputAction::EditorDelete)),
        upgrade,
        restart: input.pressed(InputAction::Restart),
        main_menu: input.pressed(InputAction::MainMenu),
        quit: input.pressed(InputAction::Quit) || input.quit_requested(),
    }
}

fn sprite(sequence: String, frame: usize, rect: Rect, layer: DrawLayer) -> SpriteDesc {
    SpriteDesc {
        kind: RenderableKind::Sprite {
            sequence,
            frame,
            mirror_x: false,
        },
        rect,
        layer,
    }
}

fn push_items(state: &LevelState, world: &mut SceneWorld) {
    for item in state.items().active_items() {
        let rect = item.rect().translated(Vec2::new(0.0, item.bob_offset()));
        world.push_sprite(sprite(item.kind.sprite_key().to_string(), 0, rect, DrawLayer::Items));
    }
}

fn push_hero(state: &LevelState, hero: &Hero, world: &mut SceneWorld) {
    let rect = hero.body.rect();
    let is_companion = hero.name != state.active();
    let (action, facing, frame) = if !hero.is_alive() {
        ("downed", Facing::Down, 0)
    } else if let Some(draw) = hero.attack.draw_intent() {
        if let Some(region) = draw.region {
            world.push_sprite(SpriteDesc {
                kind: RenderableKind::Outline {
                    color: ATTACK_REGION_COLOR,
                },
                rect: region,
                layer: DrawLayer::Effects,
            });
        }
        ("attack", draw.direction, draw.frame)
    } else if hero.body.is_moving() {
        ("walk", hero.body.facing, hero.body.anim_phase() as usize)
    } else if is_companion {
        let hint = state.companion_hint();
        ("idle", hint.direction.unwrap_or(hero.body.facing), 0)
    } else {
        ("idle", hero.body.facing, 0)
    };
    let shown = display_facing(hero.name, facing);
    let key = sequence_key(hero.name.sprite_kind(), action, shown.as_token());
    world.push_sprite(sprite(key, frame, rect, DrawLayer::Actors));

    if hero.shield().is_active(state.now()) {
        world.push_sprite(SpriteDesc {
            kind: RenderableKind::Ring {
                color: SHIELD_COLOR,
                alpha: 0.6,
            },
            rect,
            layer: DrawLayer::Effects,
        });
    }
}

fn push_enemies(state: &LevelState, world: &mut SceneWorld) {
    for worm in state.worms().iter().filter(|worm| worm.is_alive()) {
        let action = if worm.body.is_moving() { "walk" } else { "idle" };
        let key = sequence_key("worm", action, worm.body.facing.as_token());
        let frame = worm.body.anim_phase() as usize;
        world.push_sprite(sprite(key, frame, worm.body.rect(), DrawLayer::Actors));
    }
    if let Some(boss) = state.boss().filter(|boss| boss.is_alive()) {
        let action = match boss.state() {
            BossState::AttackingBasic | BossState::AttackingSpecial => "spell",
            BossState::Moving => "walk",
            BossState::Idle => "idle",
        };
        let key = sequence_key("shaman", action, boss.body.facing.as_token());
        let frame = boss.body.anim_phase() as usize;
        world.push_sprite(sprite(key, frame, boss.body.rect(), DrawLayer::Actors));
    }
}

fn push_projectiles(state: &LevelState, world: &mut SceneWorld) {
    for hero in state.heroes() {
        for shot in hero.attack.projectiles() {
            world.push_sprite(SpriteDesc {
                kind: RenderableKind::Solid {
                    color: PLAYER_PROJECTILE_COLOR,
                },
                rect: shot.rect(),
                layer: DrawLayer::Projectiles,
            });
        }
    }
    let Some(boss) = state.boss() else {
        return;
    };
    for shot in boss.projectiles() {
        let color = if shot.is_special() {
            SPECIAL_PROJECTILE_COLOR
        } else {
            BOSS_PROJECTILE_COLOR
        };
        world.push_sprite(SpriteDesc {
            kind: RenderableKind::Solid { color },
            rect: shot.rect(),
            layer: DrawLayer::Projectiles,
        });
    }
}

fn push_effects(state: &LevelState, world: &mut SceneWorld) {
    let Some(boss) = state.boss() else {
        return;
    };
    for effect in boss.effects() {
        let rect = Rect::new(
            effect.center.x - effect.radius,
            effect.center.y - effect.radius,
            effect.radius * 2.0,
            effect.radius * 2.0,
        );
        world.push_sprite(SpriteDesc {
            kind: RenderableKind::Ring {
                color: EFFECT_COLOR,
                alpha: effect.alpha.clamp(0.0, 1.0),
            },
            rect,
            layer: DrawLayer::Effects,
        });
    }
}

fn push_editor(state: &LevelState, world: &mut SceneWorld) {
    for rect in state.collision().block_rects() {
        world.push_sprite(SpriteDesc {
            kind: RenderableKind::Outline { color: BLOCK_COLOR },
            rect,
            layer: DrawLayer::Editor,
        });
    }
    if let Some(anchor) = state.editor().drag_anchor() {
        world.push_sprite(SpriteDesc {
            kind: RenderableKind::Outline { color: DRAG_COLOR },
            rect: Cell::containing(anchor).rect(),
            layer: DrawLayer::Editor,
        });
    }
}
