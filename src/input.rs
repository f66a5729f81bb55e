//! Keyboard and mouse button state, fed from winit window events.

use std::collections::HashSet;

use winit::{
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

#[derive(Clone, Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    buttons: HashSet<MouseButton>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track key and button transitions. Other events are ignored.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed => self.press(*code),
                ElementState::Released => self.release(*code),
            },
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.buttons.insert(*button);
                }
                ElementState::Released => {
                    self.buttons.remove(button);
                }
            },
            WindowEvent::Focused(false) => self.clear(),
            _ => {}
        }
    }

    pub fn press(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    /// Forget everything held, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.buttons.clear();
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_released(&self, key: KeyCode) -> bool {
        !self.is_pressed(key)
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_held_until_released() {
        let mut input = InputState::new();
        assert!(input.is_released(KeyCode::KeyW));
        input.press(KeyCode::KeyW);
        input.press(KeyCode::ShiftLeft);
        assert!(input.is_pressed(KeyCode::KeyW));
        input.release(KeyCode::KeyW);
        assert!(input.is_released(KeyCode::KeyW));
        assert!(input.is_pressed(KeyCode::ShiftLeft));
    }

    fn mouse(state: ElementState, button: MouseButton) -> WindowEvent {
        WindowEvent::MouseInput {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            state,
            button,
        }
    }

    #[test]
    fn buttons_follow_mouse_events() {
        let mut input = InputState::new();
        input.handle_window_event(&mouse(ElementState::Pressed, MouseButton::Left));
        assert!(input.is_button_pressed(MouseButton::Left));
        assert!(!input.is_button_pressed(MouseButton::Right));
        input.handle_window_event(&mouse(ElementState::Released, MouseButton::Left));
        assert!(!input.is_button_pressed(MouseButton::Left));
    }

    #[test]
    fn losing_focus_releases_everything() {
        let mut input = InputState::new();
        input.press(KeyCode::KeyA);
        input.handle_window_event(&mouse(ElementState::Pressed, MouseButton::Left));
        input.handle_window_event(&WindowEvent::Focused(false));
        assert!(input.is_released(KeyCode::KeyA));
        assert!(!input.is_button_pressed(MouseButton::Left));
    }
}
