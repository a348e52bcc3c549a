use crate::backend::{Advection, Backend, Format, Splat};
use crate::double::DoubleBuffer;
use crate::grid::{self, Resolution};
use crate::settings::{PressureMode, Settings};
use crate::Problem;

use glam::Vec4;

/// The simulation grids and the passes that update them.
///
/// Velocity, pressure and divergence share the coarse simulation grid. The
/// dye lives on its own, finer grid.
pub struct Fluid<B: Backend> {
    velocity: DoubleBuffer<B::Target>,
    pressure: DoubleBuffer<B::Target>,
    divergence: B::Target,
    dye: DoubleBuffer<B::Target>,
}

impl<B: Backend> Fluid<B> {
    pub fn new(backend: &mut B, settings: &Settings, viewport: Resolution) -> Result<Self, Problem> {
        let sim = grid::get_resolution(settings.sim_resolution, viewport.width, viewport.height);
        let dye = grid::get_resolution(settings.dye_resolution, viewport.width, viewport.height);

        log::debug!(
            "Allocating {}x{} simulation and {}x{} dye grids",
            sim.width,
            sim.height,
            dye.width,
            dye.height
        );

        Ok(Self {
            velocity: new_double_buffer(backend, sim, Format::Rgba)?,
            pressure: new_double_buffer(backend, sim, Format::Scalar)?,
            divergence: backend.create_target(sim, Format::Scalar)?,
            dye: new_double_buffer(backend, dye, Format::Rgba)?,
        })
    }

    pub fn sim_resolution(&self) -> Resolution {
        self.velocity.resolution()
    }

    pub fn dye_resolution(&self) -> Resolution {
        self.dye.resolution()
    }

    pub fn velocity(&self) -> &B::Target {
        self.velocity.read()
    }

    pub fn pressure(&self) -> &B::Target {
        self.pressure.read()
    }

    pub fn divergence(&self) -> &B::Target {
        &self.divergence
    }

    pub fn dye(&self) -> &B::Target {
        self.dye.read()
    }

    pub fn splat_velocity(&mut self, backend: &mut B, splat: &Splat) {
        self.velocity
            .draw_to(|velocity, output| backend.splat(velocity, output, splat));
    }

    pub fn splat_dye(&mut self, backend: &mut B, splat: &Splat) {
        self.dye
            .draw_to(|dye, output| backend.splat(dye, output, splat));
    }

    pub fn calculate_divergence(&mut self, backend: &mut B) {
        backend.divergence(self.velocity.read(), &mut self.divergence);
    }

    pub fn solve_pressure(&mut self, backend: &mut B, mode: PressureMode, iterations: u32) {
        if let PressureMode::ClearWith(value) = mode {
            let clear = Vec4::new(value, 0.0, 0.0, 1.0);
            let (front, back) = self.pressure.both_mut();
            backend.clear(front, clear);
            backend.clear(back, clear);
        }

        let divergence = &self.divergence;
        for _ in 0..iterations {
            self.pressure.draw_to(|pressure, output| {
                backend.relax_pressure(pressure, divergence, output)
            });
        }
    }

    pub fn subtract_gradient(&mut self, backend: &mut B) {
        let pressure = self.pressure.read();
        self.velocity.draw_to(|velocity, output| {
            backend.subtract_gradient(pressure, velocity, output)
        });
    }

    pub fn advect_velocity(&mut self, backend: &mut B, advection: &Advection) {
        self.velocity.draw_to(|velocity, output| {
            backend.advect(velocity, velocity, output, advection)
        });
    }

    pub fn advect_dye(&mut self, backend: &mut B, advection: &Advection) {
        let velocity = self.velocity.read();
        self.dye
            .draw_to(|dye, output| backend.advect(velocity, dye, output, advection));
    }
}

fn new_double_buffer<B: Backend>(
    backend: &mut B,
    resolution: Resolution,
    format: Format,
) -> Result<DoubleBuffer<B::Target>, Problem> {
    let front = backend.create_target(resolution, format)?;
    let back = backend.create_target(resolution, format)?;
    Ok(DoubleBuffer::new(resolution, front, back))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::Field;
    use crate::software::Software;
    use glam::{Vec2, Vec3};

    fn settings() -> Settings {
        Settings {
            sim_resolution: 16,
            dye_resolution: 32,
            ..Default::default()
        }
    }

    const VIEWPORT: Resolution = Resolution {
        width: 200,
        height: 100,
    };

    fn splat() -> Splat {
        Splat {
            point: Vec2::new(0.5, 0.5),
            value: Vec3::new(10.0, -10.0, 1.0),
            radius: 0.03,
            aspect_ratio: 2.0,
        }
    }

    #[test]
    fn grids_follow_the_viewport() {
        let mut backend = Software::new();
        let fluid = Fluid::new(&mut backend, &settings(), VIEWPORT).unwrap();

        assert_eq!(
            fluid.sim_resolution(),
            Resolution {
                width: 32,
                height: 16
            }
        );
        assert_eq!(
            fluid.dye_resolution(),
            Resolution {
                width: 64,
                height: 32
            }
        );
        assert_eq!(fluid.divergence().resolution(), fluid.sim_resolution());
        assert_eq!(fluid.pressure().resolution(), fluid.sim_resolution());
    }

    #[test]
    fn starts_at_rest() {
        let mut backend = Software::new();
        let fluid = Fluid::new(&mut backend, &settings(), VIEWPORT).unwrap();

        assert_eq!(fluid.velocity().max_abs(), 0.0);
        assert_eq!(fluid.dye().max_abs(), 0.0);
    }

    #[test]
    fn splat_lands_in_the_read_buffer() {
        let mut backend = Software::new();
        let mut fluid = Fluid::new(&mut backend, &settings(), VIEWPORT).unwrap();

        fluid.splat_velocity(&mut backend, &splat());

        // The centre texel is half a texel away from the splat point.
        let peak = fluid.velocity().get(16, 8);
        assert!(peak.x > 5.0 && peak.y < -5.0);
        assert_eq!(fluid.dye().max_abs(), 0.0);
    }

    #[test]
    fn projection_pushes_pressure_up_where_flow_converges() {
        let mut backend = Software::new();
        let mut fluid = Fluid::new(&mut backend, &settings(), VIEWPORT).unwrap();

        fluid.splat_velocity(&mut backend, &splat());
        fluid.calculate_divergence(&mut backend);
        fluid.solve_pressure(&mut backend, PressureMode::Retain, 10);

        assert!(fluid.divergence().max_abs() > 0.0);
        assert!(fluid.pressure().max_abs() > 0.0);
    }

    #[test]
    fn clearing_pressure_resets_the_warm_start() {
        let mut backend = Software::new();
        let mut fluid = Fluid::new(&mut backend, &settings(), VIEWPORT).unwrap();

        fluid.splat_velocity(&mut backend, &splat());
        fluid.calculate_divergence(&mut backend);
        fluid.solve_pressure(&mut backend, PressureMode::Retain, 10);
        let warm: Field = fluid.pressure().clone();

        fluid.solve_pressure(&mut backend, PressureMode::ClearWith(0.0), 10);
        let cold = fluid.pressure().clone();

        // From a cleared start, ten iterations reproduce the first solve.
        assert_eq!(warm, cold);
    }

    #[test]
    fn dye_follows_the_velocity() {
        let mut backend = Software::new();
        let mut fluid = Fluid::new(&mut backend, &settings(), VIEWPORT).unwrap();

        fluid.splat_dye(
            &mut backend,
            &Splat {
                value: Vec3::ONE,
                ..splat()
            },
        );
        let before = fluid.dye().clone();

        let still = Advection {
            timestep: 0.0,
            dissipation: 0.5,
        };
        fluid.advect_dye(&mut backend, &still);

        for (after, before) in fluid.dye().texels().iter().zip(before.texels()) {
            assert_eq!(after.x, 0.5 * before.x);
        }
    }
}
