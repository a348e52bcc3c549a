pub mod backend;
mod data;
pub mod double;
pub mod field;
pub mod fluid;
pub mod gl;
pub mod grid;
pub mod pointer;
pub mod render;
pub mod session;
pub mod settings;
pub mod software;

pub use backend::{Backend, Format};
pub use gl::GlBackend;
pub use grid::{get_resolution, Resolution};
pub use pointer::{PointerEvent, State};
pub use session::{Problem, SimulationSession, MAX_FRAME_TIME};
pub use settings::{Color, Mode, PressureMode, Settings};
pub use software::Software;
