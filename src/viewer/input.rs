//! Mouse controls for the orbit camera.
//!
//! * left drag: rotate
//! * middle drag: pan in the view plane
//! * shift + right drag: dolly
//! * wheel: zoom

use super::camera::Camera;
use cgmath::{vec4, Vector3};

pub const ROTATE_SPEED: f32 = 0.5;
pub const DOLLY_SPEED: f32 = 0.1;
pub const WHEEL_STEP: f32 = 0.38;
/// Wheel delta of one notch, in eighths of a degree.
pub const WHEEL_NOTCH: f32 = 120.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Button {
    Left,
    Middle,
    Right,
}

/// Held buttons and the last cursor position.
#[derive(Default)]
pub struct Mouse {
    pub pos: Option<(f64, f64)>,
    pub left: bool,
    pub middle: bool,
    pub right: bool,
}

impl Mouse {
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        match button {
            Button::Left => self.left = pressed,
            Button::Middle => self.middle = pressed,
            Button::Right => self.right = pressed,
        }
    }

    /// The button being dragged with. Chords don't drag.
    pub fn drag_button(&self) -> Option<Button> {
        match (self.left, self.middle, self.right) {
            (true, false, false) => Some(Button::Left),
            (false, true, false) => Some(Button::Middle),
            (false, false, true) => Some(Button::Right),
            _ => None,
        }
    }

    /// Records a cursor move, returning how far it moved.
    pub fn moved_to(&mut self, pos: (f64, f64)) -> (f32, f32) {
        let delta = match self.pos {
            Some((x, y)) => ((pos.0 - x) as f32, (pos.1 - y) as f32),
            None => (0.0, 0.0),
        };
        self.pos = Some(pos);
        delta
    }

    pub fn release_all(&mut self) {
        self.left = false;
        self.middle = false;
        self.right = false;
    }
}

/// Applies a drag of `(dx, dy)` pixels to the camera.
pub fn drag(
    camera: &mut Camera,
    button: Button,
    (dx, dy): (f32, f32),
    shift: bool,
    (width, height): (u32, u32),
) {
    if dx == 0.0 && dy == 0.0 {
        return;
    }
    match button {
        Button::Left => camera.rotate(dx * ROTATE_SPEED, dy * ROTATE_SPEED),
        Button::Middle => {
            // One pixel moves the look-at by distance/viewport-size
            let sx = camera.distance() / width.max(1) as f32;
            let sy = camera.distance() / height.max(1) as f32;
            let v = camera.inverse_rotation() * vec4(-dx * sx, dy * sy, 0.0, 0.0);
            camera.pan(Vector3::new(v.x, v.y, v.z));
        }
        Button::Right => {
            if shift {
                camera.zoom_distance(dy * DOLLY_SPEED);
            }
        }
    }
}

/// Applies a wheel turn; positive `delta` (away from the user) zooms in.
pub fn wheel(camera: &mut Camera, delta: f32) {
    if delta != 0.0 {
        camera.zoom_factor(1.0 - delta / WHEEL_NOTCH * WHEEL_STEP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{vec3, InnerSpace};

    #[test]
    fn left_drag_rotates() {
        let mut cam = Camera::default();
        drag(&mut cam, Button::Left, (10.0, -4.0), false, (800, 600));
        assert_eq!(cam.yaw(), 5.0);
        assert_eq!(cam.pitch(), 358.0);
    }

    #[test]
    fn middle_drag_pans_in_view_plane() {
        let mut cam = Camera::default();
        drag(&mut cam, Button::Middle, (8.0, 6.0), false, (800, 600));
        assert!((cam.look_at() - vec3(-1.0, 1.0, 0.0)).magnitude() < 1e-5);

        // Yawed half a turn, screen-right is the other way
        let mut cam = Camera::default();
        cam.rotate(180.0, 0.0);
        drag(&mut cam, Button::Middle, (8.0, 0.0), false, (800, 600));
        assert!((cam.look_at().x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn right_drag_needs_shift() {
        let mut cam = Camera::default();
        drag(&mut cam, Button::Right, (0.0, 50.0), false, (800, 600));
        assert_eq!(cam.distance(), 100.0);
        drag(&mut cam, Button::Right, (0.0, 50.0), true, (800, 600));
        assert_eq!(cam.distance(), 105.0);
    }

    #[test]
    fn wheel_zooms_by_factor() {
        let mut cam = Camera::default();
        wheel(&mut cam, 120.0);
        assert!((cam.distance() - 62.0).abs() < 1e-4);
        wheel(&mut cam, -120.0);
        assert!((cam.distance() - 62.0 * 1.38).abs() < 1e-3);
    }

    #[test]
    fn chords_do_not_drag() {
        let mut mouse = Mouse::default();
        mouse.set_button(Button::Left, true);
        assert_eq!(mouse.drag_button(), Some(Button::Left));
        mouse.set_button(Button::Right, true);
        assert_eq!(mouse.drag_button(), None);
        mouse.release_all();
        assert_eq!(mouse.drag_button(), None);
        assert_eq!(mouse.moved_to((5.0, 5.0)), (0.0, 0.0));
        assert_eq!(mouse.moved_to((7.0, 4.0)), (2.0, -1.0));
    }
}
