use super::input::{self, Button, Mouse};
use super::scene_viewer::SceneViewer;
use super::window;
use crate::errors::Result;
use glium::winit;
use glium::texture::RawImage2d;
use std::path::{Path, PathBuf};
use winit::dpi::PhysicalSize;
use winit::keyboard::ModifiersState;

pub fn main_loop(
    make_viewer: impl FnOnce(&super::Display) -> SceneViewer,
    title: String,
    snapshot_path: PathBuf,
    debug_gl: bool,
) -> Result<()> {
    let event_loop = winit::event_loop::EventLoop::builder()
        .build()
        .map_err(|e| format!("couldn't create event loop: {}", e))?;
    let size = (super::WINDOW_WIDTH, super::WINDOW_HEIGHT);
    let (window, display) = window::open(&event_loop, &title, size, debug_gl)?;

    let mut viewer = make_viewer(&display);
    let PhysicalSize { width, height } = window.inner_size();
    viewer.resize(width, height);

    struct State {
        mouse: Mouse,
        modifiers: ModifiersState,
        size: (u32, u32),
    }

    let mut state = State {
        mouse: Mouse::default(),
        modifiers: Default::default(),
        size: (width, height),
    };

    let res = event_loop.run(move |ev, window_target| {
        use winit::event::Event as Ev;
        use winit::event::WindowEvent as WEv;

        match ev {
            Ev::WindowEvent { event, .. } => match event {
                WEv::RedrawRequested => {
                    let mut frame = display.draw();
                    viewer.paint(&mut frame);
                    if let Err(e) = frame.finish() {
                        error!("rendering error: {}", e);
                    }
                }
                WEv::Resized(size) => {
                    display.resize(size.into());
                    state.size = (size.width, size.height);
                    viewer.resize(size.width, size.height);
                }
                WEv::CloseRequested => {
                    viewer.cleanup();
                    window_target.exit();
                }
                WEv::KeyboardInput { event: e, .. } => {
                    use winit::keyboard::{KeyCode, PhysicalKey};
                    let pressed = e.state == winit::event::ElementState::Pressed;
                    if pressed && !e.repeat && e.physical_key == PhysicalKey::Code(KeyCode::KeyP) {
                        match snapshot(&display, &snapshot_path) {
                            Ok(()) => info!("saved {}", snapshot_path.display()),
                            Err(e) => error!("couldn't save snapshot: {}", e),
                        }
                    }
                }
                WEv::ModifiersChanged(m) => {
                    state.modifiers = m.state();
                }
                WEv::MouseInput { state: mouse_state, button, .. } => {
                    use winit::event::MouseButton as MB;
                    let pressed = mouse_state == winit::event::ElementState::Pressed;
                    let button = match button {
                        MB::Left => Button::Left,
                        MB::Middle => Button::Middle,
                        MB::Right => Button::Right,
                        _ => return,
                    };
                    state.mouse.set_button(button, pressed);
                }
                WEv::CursorMoved { position, .. } => {
                    let delta = state.mouse.moved_to((position.x, position.y));
                    if let Some(button) = state.mouse.drag_button() {
                        let shift = state.modifiers.shift_key();
                        let mut camera = viewer.camera().borrow_mut();
                        input::drag(&mut camera, button, delta, shift, state.size);
                    }
                }
                WEv::MouseWheel { delta, .. } => {
                    use winit::event::MouseScrollDelta;
                    let delta = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y * input::WHEEL_NOTCH,
                        MouseScrollDelta::PixelDelta(p) => p.y as f32,
                    };
                    input::wheel(&mut viewer.camera().borrow_mut(), delta);
                }
                WEv::Focused(false) => {
                    state.mouse.release_all();
                }
                _ => ()
            },
            Ev::AboutToWait => {
                if viewer.take_redraw() {
                    window.request_redraw();
                }
            },
            _ => (),
        }
    });
    res.map_err(|e| format!("event loop: {}", e))?;
    Ok(())
}

fn snapshot(display: &super::Display, path: &Path) -> Result<()> {
    let image: RawImage2d<u8> = display
        .read_front_buffer()
        .map_err(|e| format!("couldn't read framebuffer: {:?}", e))?;
    crate::png::write_bottom_up(path, &image.data, image.width, image.height)
}
