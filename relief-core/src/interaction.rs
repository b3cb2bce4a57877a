/// Pointer and wheel handling for the view parameters
use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::config::InputSettings;
use crate::transform::ViewParams;

/// Which pointer button started a drag. Only left vs not-left matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
    Other,
}

/// Raw input, in surface pixels with Y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { button: PointerButton, x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    PointerLeave,
    /// Negative `delta_y` scrolls up (zoom in)
    Wheel { delta_y: f32 },
}

/// Events collected between frames.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        button: PointerButton,
        last_x: f32,
        last_y: f32,
    },
}

/// Idle/dragging state machine that turns input into view changes.
///
/// Left drags rotate proportionally to the cursor delta. Any other button
/// pans by a fixed step per move event, whatever the delta size. The wheel
/// steps the zoom level without clamping.
#[derive(Debug, Clone)]
pub struct InteractionController {
    state: DragState,
    settings: InputSettings,
}

impl InteractionController {
    pub fn new(settings: InputSettings) -> Self {
        Self {
            state: DragState::Idle,
            settings,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Apply every queued event in arrival order.
    pub fn process(&mut self, queue: &mut InputQueue, params: &mut ViewParams) {
        for event in queue.drain() {
            self.handle(event, params);
        }
    }

    pub fn handle(&mut self, event: InputEvent, params: &mut ViewParams) {
        match event {
            InputEvent::PointerDown { button, x, y } => {
                debug!(?button, x, y, "drag started");
                self.state = DragState::Dragging {
                    button,
                    last_x: x,
                    last_y: y,
                };
            }
            InputEvent::PointerMove { x, y } => {
                let DragState::Dragging {
                    button,
                    last_x,
                    last_y,
                } = self.state
                else {
                    return;
                };

                let dx = x - last_x;
                let dy = y - last_y;
                if button == PointerButton::Left {
                    self.rotate(dx, dy, params);
                } else {
                    self.pan(dx, dy, params);
                }

                self.state = DragState::Dragging {
                    button,
                    last_x: x,
                    last_y: y,
                };
            }
            InputEvent::PointerUp | InputEvent::PointerLeave => {
                if self.is_dragging() {
                    debug!("drag ended");
                }
                self.state = DragState::Idle;
            }
            InputEvent::Wheel { delta_y } => {
                if delta_y < 0.0 {
                    params.scale += self.settings.wheel_step;
                } else {
                    params.scale -= self.settings.wheel_step;
                }
                trace!(scale = params.scale, "zoom changed");
            }
        }
    }

    fn rotate(&self, dx: f32, dy: f32, params: &mut ViewParams) {
        let sensitivity = self.settings.drag_sensitivity;
        params.rotate(
            dx.to_radians() * sensitivity,
            dy.to_radians() * sensitivity,
        );
        trace!(
            y = params.y_rotation,
            z = params.z_rotation,
            "rotation changed"
        );
    }

    fn pan(&self, dx: f32, dy: f32, params: &mut ViewParams) {
        let step = self.settings.pan_step;
        if dx > 0.0 {
            params.pan_x += step;
        } else if dx < 0.0 {
            params.pan_x -= step;
        }

        // Screen Y grows downwards, so moving up pans forward
        if dy < 0.0 {
            params.pan_z += step;
        } else if dy > 0.0 {
            params.pan_z -= step;
        }
        trace!(x = params.pan_x, z = params.pan_z, "pan changed");
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(InputSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(button: PointerButton, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerDown { button, x, y }
    }

    fn to(x: f32, y: f32) -> InputEvent {
        InputEvent::PointerMove { x, y }
    }

    #[test]
    fn test_drag_state_machine() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams::default();
        assert_eq!(controller.state(), DragState::Idle);

        controller.handle(down(PointerButton::Right, 3.0, 4.0), &mut params);
        assert_eq!(
            controller.state(),
            DragState::Dragging {
                button: PointerButton::Right,
                last_x: 3.0,
                last_y: 4.0
            }
        );

        controller.handle(InputEvent::PointerUp, &mut params);
        assert_eq!(controller.state(), DragState::Idle);

        controller.handle(down(PointerButton::Left, 0.0, 0.0), &mut params);
        controller.handle(InputEvent::PointerLeave, &mut params);
        assert!(!controller.is_dragging());
    }

    #[test]
    fn test_move_while_idle_is_ignored() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams::default();
        controller.handle(to(100.0, 100.0), &mut params);
        assert_eq!(params, ViewParams::default());
    }

    #[test]
    fn test_left_drag_rotates_proportionally() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams {
            y_rotation: 100.0,
            z_rotation: 200.0,
            ..ViewParams::default()
        };

        controller.handle(down(PointerButton::Left, 10.0, 10.0), &mut params);
        controller.handle(to(28.0, 1.0), &mut params);

        // 18 px * pi/180 * 5 and -9 px * pi/180 * 5
        let dy = 18.0f32.to_radians() * 5.0;
        let dz = -9.0f32.to_radians() * 5.0;
        assert!((params.y_rotation - (100.0 + dy)).abs() < 1e-4);
        assert!((params.z_rotation - (200.0 + dz)).abs() < 1e-4);
        assert_eq!(params.pan_x, 0.0);
        assert_eq!(params.pan_z, 0.0);

        // The next delta is measured from the last position
        let before = params.y_rotation;
        controller.handle(to(28.0, 1.0), &mut params);
        assert_eq!(params.y_rotation, before);
    }

    #[test]
    fn test_left_drag_wraps_rotation() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams {
            y_rotation: 359.9,
            z_rotation: 0.5,
            ..ViewParams::default()
        };

        controller.handle(down(PointerButton::Left, 0.0, 0.0), &mut params);
        controller.handle(to(10.0, -10.0), &mut params);
        assert_eq!(params.y_rotation, 1.0);
        assert_eq!(params.z_rotation, 360.0);
    }

    #[test]
    fn test_other_buttons_step_pan() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams::default();

        controller.handle(down(PointerButton::Right, 50.0, 50.0), &mut params);
        // A one pixel nudge moves as far as a long drag
        controller.handle(to(51.0, 49.0), &mut params);
        assert_eq!((params.pan_x, params.pan_z), (5.0, 5.0));

        controller.handle(to(500.0, 400.0), &mut params);
        assert_eq!((params.pan_x, params.pan_z), (10.0, 0.0));

        controller.handle(to(10.0, 400.0), &mut params);
        assert_eq!((params.pan_x, params.pan_z), (5.0, 0.0));

        // Rotation untouched
        assert_eq!(params.y_rotation, 360.0);
        assert_eq!(params.z_rotation, 360.0);
    }

    #[test]
    fn test_middle_button_pans() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams::default();
        controller.handle(down(PointerButton::Middle, 0.0, 0.0), &mut params);
        controller.handle(to(-2.0, 0.0), &mut params);
        assert_eq!(params.pan_x, -5.0);
    }

    #[test]
    fn test_wheel_is_unclamped() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams::default();

        controller.handle(InputEvent::Wheel { delta_y: -120.0 }, &mut params);
        assert_eq!(params.scale, 1.0);

        for _ in 0..4 {
            controller.handle(InputEvent::Wheel { delta_y: 3.0 }, &mut params);
        }
        assert_eq!(params.scale, -3.0);

        // Works mid-drag too and does not end it
        controller.handle(down(PointerButton::Left, 0.0, 0.0), &mut params);
        controller.handle(InputEvent::Wheel { delta_y: 0.0 }, &mut params);
        assert_eq!(params.scale, -4.0);
        assert!(controller.is_dragging());
    }

    #[test]
    fn test_queue_is_drained_in_order() {
        let mut controller = InteractionController::default();
        let mut params = ViewParams::default();
        let mut queue = InputQueue::new();

        queue.push(down(PointerButton::Right, 0.0, 0.0));
        queue.push(to(1.0, 0.0));
        queue.push(InputEvent::PointerUp);
        queue.push(to(50.0, 0.0));
        assert_eq!(queue.len(), 4);

        controller.process(&mut queue, &mut params);
        assert!(queue.is_empty());
        assert_eq!(params.pan_x, 5.0);
        assert!(!controller.is_dragging());
    }
}
