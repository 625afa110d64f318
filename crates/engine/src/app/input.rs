#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    BasicAttack,
    RangedAttack,
    Switch,
    Revive,
    Pause,
    EditorToggle,
    EditorDelete,
    UpgradeOne,
    UpgradeTwo,
    UpgradeThree,
    Restart,
    MainMenu,
    Quit,
}

const ACTION_COUNT: usize = 17;

/// Held state plus a press edge that survives until the next tick snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        let index = action.index();
        if is_down && !self.down[index] {
            self.pressed[index] = true;
        }
        self.down[index] = is_down;
    }

    pub(crate) fn set_pressed(&mut self, action: InputAction, pressed: bool) {
        self.pressed[action.index()] = pressed;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub(crate) fn clear_edges(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::BasicAttack => 4,
            InputAction::RangedAttack => 5,
            InputAction::Switch => 6,
            InputAction::Revive => 7,
            InputAction::Pause => 8,
            InputAction::EditorToggle => 9,
            InputAction::EditorDelete => 10,
            InputAction::UpgradeOne => 11,
            InputAction::UpgradeTwo => 12,
            InputAction::UpgradeThree => 13,
            InputAction::Restart => 14,
            InputAction::MainMenu => 15,
            InputAction::Quit => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_fires_once_per_transition() {
        let mut states = ActionStates::default();
        states.set(InputAction::Switch, true);
        assert!(states.was_pressed(InputAction::Switch));
        states.clear_edges();
        states.set(InputAction::Switch, true);
        assert!(!states.was_pressed(InputAction::Switch));
        assert!(states.is_down(InputAction::Switch));
        states.set(InputAction::Switch, false);
        states.set(InputAction::Switch, true);
        assert!(states.was_pressed(InputAction::Switch));
    }

    #[test]
    fn release_keeps_pending_edge_until_cleared() {
        let mut states = ActionStates::default();
        states.set(InputAction::BasicAttack, true);
        states.set(InputAction::BasicAttack, false);
        assert!(states.was_pressed(InputAction::BasicAttack));
        assert!(!states.is_down(InputAction::BasicAttack));
    }
}
