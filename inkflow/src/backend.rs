use crate::grid::Resolution;
use crate::settings::Mode;
use crate::Problem;

use glam::{Vec2, Vec3, Vec4};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    // Velocity and dye
    Rgba,
    // Pressure and divergence
    Scalar,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    // In UV space, with the origin at the bottom left.
    pub point: Vec2,
    pub value: Vec3,
    pub radius: f32,
    pub aspect_ratio: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Advection {
    pub timestep: f32,
    pub dissipation: f32,
}

/// The full-screen passes that make up a simulation step.
///
/// Every pass reads from its input targets and renders into `output`. Texel
/// sizes are taken from the targets themselves.
pub trait Backend {
    type Target;

    fn create_target(
        &mut self,
        resolution: Resolution,
        format: Format,
    ) -> Result<Self::Target, Problem>;

    fn clear(&mut self, target: &mut Self::Target, value: Vec4);

    fn splat(&mut self, input: &Self::Target, output: &mut Self::Target, splat: &Splat);

    fn divergence(&mut self, velocity: &Self::Target, output: &mut Self::Target);

    /// A single Jacobi iteration of the pressure Poisson equation.
    fn relax_pressure(
        &mut self,
        pressure: &Self::Target,
        divergence: &Self::Target,
        output: &mut Self::Target,
    );

    fn subtract_gradient(
        &mut self,
        pressure: &Self::Target,
        velocity: &Self::Target,
        output: &mut Self::Target,
    );

    fn advect(
        &mut self,
        velocity: &Self::Target,
        input: &Self::Target,
        output: &mut Self::Target,
        advection: &Advection,
    );

    /// Draw a target to the screen.
    fn display(&mut self, source: &Self::Target, mode: Mode, viewport: Resolution);
}
