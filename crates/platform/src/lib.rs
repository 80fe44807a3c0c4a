//! Windowing and input for the renderer: winit windows, Vulkan surfaces,
//! and per-frame keyboard/mouse state.

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};

pub use winit::event::{Event, WindowEvent};
pub use winit::event_loop::EventLoop;
