use glutin::dpi::{LogicalSize, PhysicalPosition};
use glutin::event::{ElementState, Event, MouseButton, TouchPhase, WindowEvent};
use glutin::event_loop::{ControlFlow, EventLoop};
use glutin::window::Window;
use glutin::PossiblyCurrent;
use inkflow::{GlBackend, PointerEvent, Settings, SimulationSession};
use std::rc::Rc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let settings = match read_settings(std::env::args().nth(1)) {
        Ok(settings) => Rc::new(settings),
        Err(message) => exit_with(&message),
    };

    let logical_size = LogicalSize::new(1280, 800);
    let (context, window, event_loop) = match get_rendering_context(logical_size) {
        Ok(rendering_context) => rendering_context,
        Err(message) => exit_with(&message),
    };
    let physical_size = window.window().inner_size();

    let context = Rc::new(context);
    let session = GlBackend::new(&context).and_then(|backend| {
        SimulationSession::new(
            backend,
            physical_size.width,
            physical_size.height,
            &settings,
        )
    });
    let mut session = match session {
        Ok(session) => Some(session),
        Err(problem) => exit_with(&problem.to_string()),
    };

    let start = std::time::Instant::now();
    let mut cursor = PhysicalPosition::new(0.0, 0.0);

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::LoopDestroyed => {
                if let Some(session) = session.take() {
                    session.dispose();
                }
            }

            Event::MainEventsCleared => {
                window.window().request_redraw();
            }

            Event::RedrawRequested(_) => {
                if let Some(session) = session.as_mut() {
                    session.animate(start.elapsed().as_secs_f64() * 1000.0);
                }

                if let Err(err) = window.swap_buffers() {
                    log::error!("Cannot swap buffers: {}", err);
                }
            }

            Event::WindowEvent { ref event, .. } => {
                let Some(session) = session.as_mut() else {
                    return;
                };

                match event {
                    WindowEvent::Resized(physical_size) => {
                        window.resize(*physical_size);
                        if let Err(problem) = session.resize(physical_size.width, physical_size.height) {
                            log::error!("{}", problem);
                            *control_flow = ControlFlow::Exit;
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = *position;
                        session.handle_pointer(PointerEvent::Move {
                            x: position.x as f32,
                            y: position.y as f32,
                        });
                    }

                    WindowEvent::MouseInput {
                        state: ElementState::Released,
                        button: MouseButton::Left,
                        ..
                    } => {
                        session.handle_pointer(PointerEvent::Click {
                            x: cursor.x as f32,
                            y: cursor.y as f32,
                        });
                    }

                    WindowEvent::Touch(touch) if touch.phase == TouchPhase::Moved => {
                        session.handle_pointer(PointerEvent::Touch {
                            x: touch.location.x as f32,
                            y: touch.location.y as f32,
                        });
                    }

                    WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                    _ => (),
                }
            }
            _ => (),
        }
    });
}

// Settings come from an optional JSON file. Without one, the drift hands over
// to the pointer after three seconds.
fn read_settings(path: Option<String>) -> Result<Settings, String> {
    let Some(path) = path else {
        return Ok(Settings {
            idle_timeout: Some(3.0),
            ..Default::default()
        });
    };

    log::info!("Reading settings from {}", path);
    let json = std::fs::read_to_string(&path)
        .map_err(|err| format!("Cannot read settings from {}: {}", path, err))?;
    serde_json::from_str(&json).map_err(|err| format!("Cannot parse settings: {}", err))
}

fn exit_with(message: &str) -> ! {
    log::error!("{}", message);
    std::process::exit(1)
}

pub fn get_rendering_context(
    logical_size: LogicalSize<u32>,
) -> Result<
    (
        glow::Context,
        glutin::ContextWrapper<PossiblyCurrent, Window>,
        EventLoop<()>,
    ),
    String,
> {
    let event_loop = glutin::event_loop::EventLoop::new();

    let window_builder = glutin::window::WindowBuilder::new()
        .with_title("Inkflow")
        .with_decorations(true)
        .with_resizable(true)
        .with_transparent(true)
        .with_inner_size(logical_size);

    let window = glutin::ContextBuilder::new()
        .with_vsync(true)
        .with_multisampling(0)
        .with_double_buffer(Some(true))
        .with_gl(glutin::GlRequest::Specific(glutin::Api::OpenGl, (3, 3)))
        .with_gl_profile(glutin::GlProfile::Core)
        .build_windowed(window_builder, &event_loop)
        .map_err(|err| format!("Cannot create a window: {}", err))?;
    let window = unsafe { window.make_current() }
        .map_err(|(_, err)| format!("Cannot make the GL context current: {}", err))?;

    let gl =
        unsafe { glow::Context::from_loader_function(|s| window.get_proc_address(s) as *const _) };

    Ok((gl, window, event_loop))
}
