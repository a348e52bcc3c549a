use crate::Problem;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub mode: Mode,

    // Target texel count along the shorter axis of the viewport.
    pub sim_resolution: u32,
    pub dye_resolution: u32,

    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    pub pressure_mode: PressureMode,
    pub pressure_iterations: u32,

    // Divided by the viewport height to get the falloff of a splat in UV
    // space.
    pub splat_radius: f32,
    pub splat_color: Color,

    // Stop drifting after this many seconds without any input.
    pub idle_timeout: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: Mode::Normal,
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 0.995,
            velocity_dissipation: 0.9,
            pressure_mode: PressureMode::Retain,
            pressure_iterations: 10,
            splat_radius: 3.0,
            splat_color: Color {
                r: 0.8,
                g: 0.5,
                b: 0.2,
            },
            idle_timeout: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.sim_resolution == 0 || self.dye_resolution == 0 {
            return Err(Problem::InvalidSettings(
                "resolutions must be greater than zero".to_string(),
            ));
        }

        for (name, value) in [
            ("densityDissipation", self.density_dissipation),
            ("velocityDissipation", self.velocity_dissipation),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Problem::InvalidSettings(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        if !(self.splat_radius > 0.0) {
            return Err(Problem::InvalidSettings(format!(
                "splatRadius must be positive, got {}",
                self.splat_radius
            )));
        }

        Ok(())
    }

    // The number of frames it takes for a field to fade to half its strength.
    // A field that never dissipates has no half-life.
    pub fn half_life(dissipation: f32) -> f32 {
        if dissipation >= 1.0 {
            return f32::INFINITY;
        }
        0.5_f32.ln() / dissipation.ln()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Mode {
    #[default]
    Normal,
    DebugVelocity,
    DebugPressure,
    DebugDivergence,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub enum PressureMode {
    #[default]
    Retain,
    ClearWith(f32),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    // Dye is stored inverted so that the display pass can draw light ink on
    // white.
    pub fn inverted(&self) -> glam::Vec3 {
        glam::Vec3::new(1.0 - self.r, 1.0 - self.g, 1.0 - self.b)
    }
}
