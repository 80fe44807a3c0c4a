//! Keyboard and mouse state, rebuilt from winit events each frame.

use std::collections::HashSet;
use std::hash::Hash;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Held / just-pressed / just-released tracking for one class of buttons.
///
/// OS key repeat re-delivers presses while a key is held; `press` only
/// records a just-press on the held-state edge.
#[derive(Debug)]
struct ButtonTracker<T> {
    held: HashSet<T>,
    just_pressed: HashSet<T>,
    just_released: HashSet<T>,
}

impl<T> Default for ButtonTracker<T> {
    fn default() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> ButtonTracker<T> {
    fn press(&mut self, button: T) {
        if self.held.insert(button) {
            self.just_pressed.insert(button);
        }
    }

    fn release(&mut self, button: T) {
        if self.held.remove(&button) {
            self.just_released.insert(button);
        }
    }

    fn clear_edges(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

/// Input snapshot the app queries during event handling.
#[derive(Debug, Default)]
pub struct InputState {
    keys: ButtonTracker<KeyCode>,
    buttons: ButtonTracker<MouseButton>,
    mouse_position: (f32, f32),
    mouse_delta: (f32, f32),
    scroll_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the per-frame edges and deltas. Call once per frame, after
    /// the frame's events have been consumed.
    pub fn begin_frame(&mut self) {
        self.keys.clear_edges();
        self.buttons.clear_edges();
        self.mouse_delta = (0.0, 0.0);
        self.scroll_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        self.keys.press(key);
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.keys.release(key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.buttons.press(button);
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.buttons.release(button);
    }

    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        let (old_x, old_y) = self.mouse_position;
        self.mouse_position = (x, y);
        self.mouse_delta = (x - old_x, y - old_y);
    }

    pub fn on_scroll(&mut self, delta_x: f32, delta_y: f32) {
        self.scroll_delta = (delta_x, delta_y);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys.held.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.keys.just_pressed.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.buttons.held.contains(&button)
    }

    pub fn mouse_position(&self) -> (f32, f32) {
        self.mouse_position
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    pub fn scroll_delta(&self) -> (f32, f32) {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_survives_until_begin_frame() {
        let mut input = InputState::new();

        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));
    }

    #[test]
    fn key_repeat_does_not_retrigger_just_pressed() {
        let mut input = InputState::new();

        input.on_key_pressed(KeyCode::Space);
        input.begin_frame();
        // OS key repeat delivers the same key again while held.
        input.on_key_pressed(KeyCode::Space);
        assert!(!input.is_key_just_pressed(KeyCode::Space));
    }

    #[test]
    fn mouse_delta_derives_from_positions() {
        let mut input = InputState::new();

        input.on_mouse_moved(100.0, 100.0);
        input.begin_frame();
        input.on_mouse_moved(110.0, 95.0);

        assert_eq!(input.mouse_delta(), (10.0, -5.0));
        assert_eq!(input.mouse_position(), (110.0, 95.0));
    }

    #[test]
    fn begin_frame_clears_scroll_and_buttons() {
        let mut input = InputState::new();

        input.on_scroll(0.0, 1.0);
        input.on_mouse_pressed(MouseButton::Left);
        input.begin_frame();

        assert_eq!(input.scroll_delta(), (0.0, 0.0));
        assert!(input.is_mouse_pressed(MouseButton::Left));
        input.on_mouse_released(MouseButton::Left);
        assert!(!input.is_mouse_pressed(MouseButton::Left));
    }
}
