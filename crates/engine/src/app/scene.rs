use std::collections::BTreeMap;

use super::input::{ActionStates, InputAction};
use super::{AudioCue, Camera2D, Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKey {
    LevelOne,
    LevelTwo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    /// Load `next`, handing it the current scene's exported hero stats.
    Advance(SceneKey),
    /// Rebuild `next` from scratch, keeping whatever handoff it last received.
    HardResetTo(SceneKey),
    ReturnToMenu,
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_mouse_down: bool,
    left_click_pressed: bool,
    left_click_released: bool,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        quit_requested: bool,
        actions: ActionStates,
        cursor_position_px: Option<Vec2>,
        left_mouse_down: bool,
        left_click_pressed: bool,
        left_click_released: bool,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            actions,
            cursor_position_px,
            left_mouse_down,
            left_click_pressed,
            left_click_released,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// True only on the tick the action went from up to down.
    pub fn pressed(&self, action: InputAction) -> bool {
        self.actions.was_pressed(action)
    }

    /// Held state only; no press edge.
    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self.actions.set_pressed(action, false);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.set(action, true);
        self.actions.set_pressed(action, true);
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_left_click_pressed(mut self, left_click_pressed: bool) -> Self {
        self.left_click_pressed = left_click_pressed;
        self.left_mouse_down = left_click_pressed || self.left_mouse_down;
        self
    }

    pub fn with_left_click_released(mut self, left_click_released: bool) -> Self {
        self.left_click_released = left_click_released;
        if left_click_released {
            self.left_mouse_down = false;
        }
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_mouse_down(&self) -> bool {
        self.left_mouse_down
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn left_click_released(&self) -> bool {
        self.left_click_released
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

/// Per-hero stats carried from one level into the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarriedStats {
    pub max_health: u32,
    pub health: u32,
    pub speed: f32,
    pub damage: u32,
    /// Part of `damage` that came from upgrades.
    pub damage_bonus: u32,
}

/// Hero name to carried stats.
pub type HeroHandoff = BTreeMap<String, CarriedStats>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrawLayer {
    Ground,
    Items,
    Actors,
    Projectiles,
    Effects,
    Editor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderableKind {
    Solid {
        color: [u8; 4],
    },
    Outline {
        color: [u8; 4],
    },
    Sprite {
        sequence: String,
        frame: usize,
        mirror_x: bool,
    },
    /// Circle outline centred in the rect; alpha in `0..=1`.
    Ring {
        color: [u8; 4],
        alpha: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDesc {
    pub kind: RenderableKind,
    pub rect: Rect,
    pub layer: DrawLayer,
}

/// Read-only render snapshot published by the active scene each frame, plus
/// the audio cue outbox the loop drains after each tick.
#[derive(Debug, Clone, Default)]
pub struct SceneWorld {
    camera: Camera2D,
    world_width: f32,
    world_height: f32,
    background_level: Option<u32>,
    sprites: Vec<SpriteDesc>,
    cues: Vec<AudioCue>,
    status_line: Option<String>,
}

impl SceneWorld {
    pub fn set_world_size(&mut self, width: f32, height: f32) {
        self.world_width = width;
        self.world_height = height;
    }

    pub fn world_size(&self) -> (f32, f32) {
        (self.world_width, self.world_height)
    }

    pub fn set_background_level(&mut self, level: Option<u32>) {
        self.background_level = level;
    }

    pub fn background_level(&self) -> Option<u32> {
        self.background_level
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn begin_frame(&mut self) {
        self.sprites.clear();
    }

    pub fn push_sprite(&mut self, sprite: SpriteDesc) {
        self.sprites.push(sprite);
    }

    /// Sprites in draw order: by layer, then by insertion within a layer.
    pub fn sprites(&self) -> &[SpriteDesc] {
        &self.sprites
    }

    pub fn sort_sprites_for_draw(&mut self) {
        self.sprites.sort_by_key(|sprite| sprite.layer);
    }

    pub fn push_cue(&mut self, cue: AudioCue) {
        self.cues.push(cue);
    }

    pub fn drain_cues(&mut self) -> Vec<AudioCue> {
        std::mem::take(&mut self.cues)
    }

    pub fn set_status_line(&mut self, status_line: Option<String>) {
        self.status_line = status_line;
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn clear(&mut self) {
        self.sprites.clear();
        self.cues.clear();
        self.status_line = None;
        self.background_level = None;
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn render(&mut self, world: &mut SceneWorld);
    fn unload(&mut self, world: &mut SceneWorld);
    fn export_handoff(&self) -> Option<HeroHandoff> {
        None
    }
    fn accept_handoff(&mut self, _handoff: Option<HeroHandoff>) {}
    fn is_simulation_paused(&self) -> bool {
        false
    }
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneRuntime {
    fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    fn load(&mut self) {
        let (scene, world) = (&mut self.scene, &mut self.world);
        scene.load(world);
        self.is_loaded = true;
    }

    fn unload(&mut self) {
        if self.is_loaded {
            let (scene, world) = (&mut self.scene, &mut self.world);
            scene.unload(world);
        }
        self.world.clear();
        self.is_loaded = false;
    }
}

pub(crate) struct SceneMachine {
    level_one: SceneRuntime,
    level_two: SceneRuntime,
    active_scene: SceneKey,
}

impl SceneMachine {
    pub(crate) fn new(
        level_one: Box<dyn Scene>,
        level_two: Box<dyn Scene>,
        active_scene: SceneKey,
    ) -> Self {
        Self {
            level_one: SceneRuntime::new(level_one),
            level_two: SceneRuntime::new(level_two),
            active_scene,
        }
    }

    pub(crate) fn active_scene(&self) -> SceneKey {
        self.active_scene
    }

    pub(crate) fn load_active(&mut self) {
        let runtime = self.active_runtime_mut();
        if !runtime.is_loaded {
            runtime.load();
        }
    }

    pub(crate) fn update_active(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
    ) -> SceneCommand {
        let runtime = self.active_runtime_mut();
        let (scene, world) = (&mut runtime.scene, &mut runtime.world);
        scene.update(fixed_dt_seconds, input, world)
    }

    pub(crate) fn render_active(&mut self) {
        let runtime = self.active_runtime_mut();
        let (scene, world) = (&mut runtime.scene, &mut runtime.world);
        world.begin_frame();
        scene.render(world);
        world.sort_sprites_for_draw();
    }

    pub(crate) fn active_world(&self) -> &SceneWorld {
        &self.active_runtime_ref().world
    }

    pub(crate) fn drain_cues_active(&mut self) -> Vec<AudioCue> {
        self.active_runtime_mut().world.drain_cues()
    }

    pub(crate) fn is_active_paused(&self) -> bool {
        self.active_runtime_ref().scene.is_simulation_paused()
    }

    pub(crate) fn debug_title_active(&self) -> Option<String> {
        let runtime = self.active_runtime_ref();
        runtime.scene.debug_title(&runtime.world)
    }

    /// Applies a scene command; returns true when the active scene changed or
    /// was rebuilt.
    pub(crate) fn apply_command(&mut self, command: SceneCommand) -> bool {
        match command {
            SceneCommand::None | SceneCommand::Quit => false,
            SceneCommand::Advance(next) => self.advance_to(next),
            SceneCommand::HardResetTo(next) => self.hard_reset_to(next),
            SceneCommand::ReturnToMenu => self.return_to_menu(),
        }
    }

    pub(crate) fn advance_to(&mut self, next_scene: SceneKey) -> bool {
        if self.active_scene == next_scene {
            return false;
        }
        let handoff = self.active_runtime_ref().scene.export_handoff();
        self.active_runtime_mut().unload();

        let target = self.runtime_mut(next_scene);
        target.unload();
        target.scene.accept_handoff(handoff);
        target.load();
        self.active_scene = next_scene;
        true
    }

    pub(crate) fn hard_reset_to(&mut self, next_scene: SceneKey) -> bool {
        if self.active_scene != next_scene {
            self.active_runtime_mut().unload();
        }
        let runtime = self.runtime_mut(next_scene);
        runtime.unload();
        runtime.load();
        self.active_scene = next_scene;
        true
    }

    /// The menu presenter lives outside the engine; returning to it drops all
    /// carried stats and parks the machine on a fresh first level.
    pub(crate) fn return_to_menu(&mut self) -> bool {
        for runtime in [&mut self.level_one, &mut self.level_two] {
            runtime.unload();
            runtime.scene.accept_handoff(None);
        }
        self.level_one.load();
        self.active_scene = SceneKey::LevelOne;
        true
    }

    pub(crate) fn shutdown_all(&mut self) {
        for runtime in [&mut self.level_one, &mut self.level_two] {
            if runtime.is_loaded {
                runtime.unload();
            }
        }
    }

    fn active_runtime_mut(&mut self) -> &mut SceneRuntime {
        self.runtime_mut(self.active_scene)
    }

    fn active_runtime_ref(&self) -> &SceneRuntime {
        self.runtime_ref(self.active_scene)
    }

    fn runtime_mut(&mut self, key: SceneKey) -> &mut SceneRuntime {
        match key {
            SceneKey::LevelOne => &mut self.level_one,
            SceneKey::LevelTwo => &mut self.level_two,
        }
    }

    fn runtime_ref(&self, key: SceneKey) -> &SceneRuntime {
        match key {
            SceneKey::LevelOne => &self.level_one,
            SceneKey::LevelTwo => &self.level_two,
        }
    }
}
