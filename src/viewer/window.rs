//! Window and GL context creation.
//!
//! With `debug_gl` the context is created with the debug flag and every
//! message the driver reports goes to the log.

use super::Display;
use crate::errors::Result;
use glium::debug::{DebugCallbackBehavior, MessageType, Severity, Source};
use glium::glutin;
use glium::winit;
use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextAttributesBuilder, NotCurrentGlContext};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use std::num::NonZeroU32;
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::raw_window_handle::HasWindowHandle;
use winit::window::Window;

pub fn open(
    event_loop: &EventLoop<()>,
    title: &str,
    (width, height): (u32, u32),
    debug_gl: bool,
) -> Result<(Window, Display)> {
    let attributes = Window::default_attributes()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width, height));
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_attributes(Some(attributes))
        .build(event_loop, ConfigTemplateBuilder::new(), |mut configs| {
            // The picker has to return something
            configs.next().expect("no usable GL config")
        })
        .map_err(|e| format!("couldn't create a GL window: {}", e))?;
    let window = match window {
        Some(w) => w,
        None => bail!("no window was created"),
    };

    let raw_handle = window
        .window_handle()
        .map_err(|e| format!("couldn't get the window handle: {}", e))?
        .as_raw();
    let PhysicalSize { width, height } = window.inner_size();
    let surface_attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw_handle,
        NonZeroU32::new(width.max(1)).unwrap_or(NonZeroU32::MIN),
        NonZeroU32::new(height.max(1)).unwrap_or(NonZeroU32::MIN),
    );
    let gl_display = gl_config.display();
    let surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attributes) }
        .map_err(|e| format!("couldn't create a window surface: {}", e))?;

    let context_attributes = ContextAttributesBuilder::new()
        .with_debug(debug_gl)
        .build(Some(raw_handle));
    let context = unsafe { gl_display.create_context(&gl_config, &context_attributes) }
        .map_err(|e| format!("couldn't create a GL context: {}", e))?
        .make_current(&surface)
        .map_err(|e| format!("couldn't make the GL context current: {}", e))?;

    if let Err(e) = surface.set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN)) {
        debug!("couldn't enable vsync: {}", e);
    }

    let behavior = if debug_gl {
        info!("GL debug output enabled");
        DebugCallbackBehavior::Custom {
            callback: Box::new(log_gl_message),
            synchronous: true,
        }
    } else {
        DebugCallbackBehavior::default()
    };
    let display = Display::with_debug(context, surface, behavior)
        .map_err(|e| format!("OpenGL isn't usable: {}", e))?;
    Ok((window, display))
}

fn log_gl_message(source: Source, ty: MessageType, severity: Severity, id: u32, _: bool, message: &str) {
    log!(gl_message_level(ty, severity), "GL {:?} {:?} {}: {}", source, ty, id, message.trim_end());
}

/// Errors are always logged as errors. Everything else goes by severity.
pub fn gl_message_level(ty: MessageType, severity: Severity) -> log::Level {
    match (ty, severity) {
        (MessageType::Error, _) | (_, Severity::High) => log::Level::Error,
        (_, Severity::Medium) => log::Level::Warn,
        (_, Severity::Low) => log::Level::Info,
        (_, Severity::Notification) => log::Level::Debug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_messages_map_to_log_levels() {
        use log::Level;
        assert_eq!(gl_message_level(MessageType::Error, Severity::Low), Level::Error);
        assert_eq!(gl_message_level(MessageType::Performance, Severity::High), Level::Error);
        assert_eq!(gl_message_level(MessageType::Performance, Severity::Medium), Level::Warn);
        assert_eq!(gl_message_level(MessageType::Portability, Severity::Low), Level::Info);
        assert_eq!(gl_message_level(MessageType::Other, Severity::Notification), Level::Debug);
    }
}
