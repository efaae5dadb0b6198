//! Orbit camera.
//!
//! The camera circles a look-at point: `yaw` turns around the vertical
//! axis, `pitch` tilts, `distance` is how far back the eye sits. Every
//! mutator notifies the listeners exactly once, after the change.

use cgmath::{vec3, Deg, Matrix4, PerspectiveFov, Rad, Vector3};
use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

pub const MIN_DISTANCE: f32 = 1.0;
pub const MAX_DISTANCE: f32 = 10000.0;
pub const DEFAULT_DISTANCE: f32 = 100.0;

pub const FOV_Y: Deg<f32> = Deg(40.0);
pub const Z_NEAR: f32 = 10.0;
pub const Z_FAR: f32 = 10000.0;

pub type ListenerId = u32;
type Listener = Box<dyn FnMut(&Camera)>;

pub struct Camera {
    look_at: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    distance: f32,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
}

impl Default for Camera {
    fn default() -> Camera {
        Camera {
            look_at: vec3(0.0, 0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            distance: DEFAULT_DISTANCE,
            listeners: vec![],
            next_listener_id: 0,
        }
    }
}

impl Camera {
    pub fn look_at(&self) -> Vector3<f32> { self.look_at }
    pub fn yaw(&self) -> f32 { self.yaw }
    pub fn pitch(&self) -> f32 { self.pitch }
    pub fn distance(&self) -> f32 { self.distance }

    pub fn set_distance(&mut self, d: f32) {
        self.distance = clamp_distance(d);
        self.changed();
    }

    pub fn set_look_at(&mut self, p: Vector3<f32>) {
        self.look_at = p;
        self.changed();
    }

    pub fn pan(&mut self, delta: Vector3<f32>) {
        self.look_at += delta;
        self.changed();
    }

    /// Angles in degrees.
    pub fn rotate(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw = wrap(self.yaw + d_yaw, 0.0, 360.0);
        self.pitch = wrap(self.pitch + d_pitch, 0.0, 360.0);
        self.changed();
    }

    pub fn zoom_distance(&mut self, d: f32) {
        self.distance = clamp_distance(self.distance + d);
        self.changed();
    }

    pub fn zoom_factor(&mut self, k: f32) {
        self.distance = clamp_distance(self.distance * k);
        self.changed();
    }

    /// Registers `f` to be called after every change.
    pub fn subscribe<F: FnMut(&Camera) + 'static>(&mut self, f: F) -> ListenerId {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(f)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.retain(|&(x, _)| x != id);
    }

    fn changed(&mut self) {
        // Listeners get &self, so they're moved out while they run
        let mut listeners = mem::replace(&mut self.listeners, vec![]);
        for (_, f) in listeners.iter_mut() {
            f(self);
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }

    /// World-to-view matrix. Converts from the Z-up scene convention to
    /// Y-up before orbiting.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let flip = Matrix4::new(
            -1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        Matrix4::from_translation(vec3(0.0, 0.0, -self.distance))
            * Matrix4::from_angle_x(Deg(self.pitch))
            * Matrix4::from_angle_y(Deg(self.yaw))
            * Matrix4::from_translation(-self.look_at)
            * flip
    }

    /// Undoes the orbit rotation, taking a view-space direction to the
    /// space `look_at` lives in.
    pub fn inverse_rotation(&self) -> Matrix4<f32> {
        Matrix4::from_angle_y(Deg(-self.yaw)) * Matrix4::from_angle_x(Deg(-self.pitch))
    }
}

pub fn projection(width: u32, height: u32) -> Matrix4<f32> {
    let aspect = if height == 0 { 1.0 } else { width as f32 / height as f32 };
    PerspectiveFov {
        fovy: Rad::from(FOV_Y),
        aspect,
        near: Z_NEAR,
        far: Z_FAR,
    }.into()
}

/// Wraps `v` into `[min, max)`, also for negative `v`.
pub fn wrap(v: f32, min: f32, max: f32) -> f32 {
    let r = max - min;
    let w = ((v - min) % r + r) % r + min;
    // (-tiny % r) + r rounds to r
    if w >= max { min } else { w }
}

fn clamp_distance(d: f32) -> f32 {
    d.max(MIN_DISTANCE).min(MAX_DISTANCE)
}

thread_local! {
    static SHARED_CAMERA: RefCell<Weak<RefCell<Camera>>> = RefCell::new(Weak::new());
}

/// The camera previews share, created if no preview holds one. The bool
/// is true if it was just created.
pub fn shared_camera() -> (Rc<RefCell<Camera>>, bool) {
    SHARED_CAMERA.with(|shared| {
        if let Some(camera) = shared.borrow().upgrade() {
            return (camera, false);
        }
        let camera = Rc::new(RefCell::new(Camera::default()));
        *shared.borrow_mut() = Rc::downgrade(&camera);
        (camera, true)
    })
}
