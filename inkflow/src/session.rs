use crate::backend::{Advection, Backend, Splat};
use crate::fluid::Fluid;
use crate::grid::Resolution;
use crate::pointer::{Impulse, Pointer, PointerEvent};
use crate::render;
use crate::settings::{Mode, Settings};

use glam::{Vec2, Vec3};
use std::rc::Rc;
use thiserror::Error;

/// The longest timestep a single frame may take, in seconds. Frames that take
/// longer, like the first one after a background tab wakes up, are slowed
/// down instead.
pub const MAX_FRAME_TIME: f32 = 1.0 / 10.0;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("The graphics context does not support rendering to float textures")]
    UnsupportedContext,

    #[error("Cannot create a render target with no texels")]
    EmptyTarget,

    #[error(transparent)]
    CannotRender(#[from] render::Problem),
}

/// A running simulation: the grids, the pointer driver and the clock.
///
/// Hosts forward input to [`handle_pointer`](Self::handle_pointer) and call
/// [`animate`](Self::animate) once per display refresh.
pub struct SimulationSession<B: Backend> {
    backend: B,
    fluid: Fluid<B>,
    settings: Rc<Settings>,
    pointer: Pointer,

    viewport: Resolution,
    elapsed_time: f64,
    last_timestamp: Option<f64>,
}

impl<B: Backend> SimulationSession<B> {
    pub fn new(
        mut backend: B,
        width: u32,
        height: u32,
        settings: &Rc<Settings>,
    ) -> Result<Self, Problem> {
        log::info!("💧 Initialising inkflow");

        settings.validate()?;
        if width == 0 || height == 0 {
            return Err(Problem::EmptyTarget);
        }

        log::debug!(
            "Dye fades to half strength after {:.0} frames",
            Settings::half_life(settings.density_dissipation)
        );

        let viewport = Resolution { width, height };
        let fluid = Fluid::new(&mut backend, settings, viewport)?;

        Ok(Self {
            backend,
            fluid,
            settings: Rc::clone(settings),
            pointer: Pointer::new(viewport),

            viewport,
            elapsed_time: 0.0,
            last_timestamp: None,
        })
    }

    pub fn update(&mut self, settings: &Rc<Settings>) -> Result<(), Problem> {
        settings.validate()?;

        let reallocate = settings.sim_resolution != self.settings.sim_resolution
            || settings.dye_resolution != self.settings.dye_resolution;

        // Adopt the new settings only once their grids exist.
        if reallocate {
            self.fluid = Fluid::new(&mut self.backend, settings, self.viewport)?;
        }
        self.settings = Rc::clone(settings);

        Ok(())
    }

    /// Reallocate the grids for a new viewport. The fluid starts over from
    /// rest.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Problem> {
        if width == 0 || height == 0 {
            log::warn!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        let viewport = Resolution { width, height };
        if viewport == self.viewport {
            return Ok(());
        }

        log::debug!("Resizing to {}x{}", width, height);
        self.fluid = Fluid::new(&mut self.backend, &self.settings, viewport)?;
        self.pointer.rescale(self.viewport, viewport);
        self.viewport = viewport;

        Ok(())
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.pointer.handle(event);
    }

    /// Step and draw a frame. `timestamp` is in milliseconds, as handed out by
    /// `requestAnimationFrame`.
    pub fn animate(&mut self, timestamp: f64) {
        let timestep = match self.last_timestamp {
            Some(last_timestamp) => (0.001 * (timestamp - last_timestamp)) as f32,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);

        self.step(timestep);
        self.render();
    }

    /// Advance the simulation by `timestep` seconds.
    pub fn step(&mut self, timestep: f32) {
        let timestep = timestep.clamp(0.0, MAX_FRAME_TIME);
        self.elapsed_time += timestep as f64;

        if let Some(idle_timeout) = self.settings.idle_timeout {
            if self.pointer.is_idle() && self.elapsed_time >= idle_timeout as f64 {
                self.pointer.go_live();
            }
        }

        self.pointer.drift(1000.0 * self.elapsed_time, self.viewport);

        if let Some(impulse) = self.pointer.take_impulse() {
            self.apply_impulse(impulse);
        }

        let settings = &self.settings;
        let backend = &mut self.backend;
        let fluid = &mut self.fluid;

        fluid.calculate_divergence(backend);
        fluid.solve_pressure(backend, settings.pressure_mode, settings.pressure_iterations);
        fluid.subtract_gradient(backend);
        fluid.advect_velocity(
            backend,
            &Advection {
                timestep,
                dissipation: settings.velocity_dissipation,
            },
        );
        fluid.advect_dye(
            backend,
            &Advection {
                timestep,
                dissipation: settings.density_dissipation,
            },
        );
    }

    pub fn render(&mut self) {
        let mode = self.settings.mode;
        let source = match mode {
            Mode::Normal => self.fluid.dye(),
            Mode::DebugVelocity => self.fluid.velocity(),
            Mode::DebugPressure => self.fluid.pressure(),
            Mode::DebugDivergence => self.fluid.divergence(),
        };

        self.backend.display(source, mode, self.viewport);
    }

    /// Tear down the session. Every GPU object is released as it is dropped.
    pub fn dispose(self) {
        log::info!("Disposing inkflow after {:.1}s", self.elapsed_time);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn fluid(&self) -> &Fluid<B> {
        &self.fluid
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn settings(&self) -> &Rc<Settings> {
        &self.settings
    }

    pub fn viewport(&self) -> Resolution {
        self.viewport
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    fn apply_impulse(&mut self, impulse: Impulse) {
        let Resolution { width, height } = self.viewport;
        let size = Vec2::new(width as f32, height as f32);

        let mut point = impulse.position / size;
        point.y = 1.0 - point.y;
        let radius = self.settings.splat_radius / size.y;
        let aspect_ratio = size.x / size.y;

        self.fluid.splat_velocity(
            &mut self.backend,
            &Splat {
                point,
                value: Vec3::new(impulse.delta.x, -impulse.delta.y, 1.0),
                radius,
                aspect_ratio,
            },
        );
        self.fluid.splat_dye(
            &mut self.backend,
            &Splat {
                point,
                value: self.settings.splat_color.inverted(),
                radius,
                aspect_ratio,
            },
        );
    }
}
