// A CPU implementation of the fluid passes.
//
// Each pass runs the same arithmetic as its fragment shader, one texel at a
// time. Nothing here is fast, but it runs without a GPU, which makes it
// useful for headless rendering and for checking the passes in tests.

use crate::backend::{Advection, Backend, Format, Splat};
use crate::field::Field;
use crate::grid::Resolution;
use crate::settings::Mode;
use crate::Problem;

use glam::{IVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use image::{Rgba, RgbaImage};

pub struct Software {
    frame: RgbaImage,
}

impl Default for Software {
    fn default() -> Self {
        Self::new()
    }
}

impl Software {
    pub fn new() -> Self {
        Self {
            frame: RgbaImage::new(0, 0),
        }
    }

    /// The last frame produced by the display pass.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }
}

impl Backend for Software {
    type Target = Field;

    fn create_target(&mut self, resolution: Resolution, _format: Format) -> Result<Field, Problem> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(Problem::EmptyTarget);
        }

        Ok(Field::new(resolution))
    }

    fn clear(&mut self, target: &mut Field, value: Vec4) {
        target.fill(value);
    }

    fn splat(&mut self, input: &Field, output: &mut Field, splat: &Splat) {
        let size = texture_size(output);

        output.render(|x, y| {
            let uv = texel_centre(x, y) / size;
            let mut p = uv - splat.point;
            p.x *= splat.aspect_ratio;

            let impulse = (-p.dot(p) / splat.radius).exp2() * splat.value;
            let base = input.get(x, y).xyz();
            (base + impulse).extend(1.0)
        });
    }

    fn divergence(&mut self, velocity: &Field, output: &mut Field) {
        output.render(|x, y| {
            let [left, right, top, bottom] = neighbours(velocity, x, y);
            let divergence = 0.5 * ((right.x - left.x) + (top.y - bottom.y));
            Vec4::new(divergence, 0.0, 0.0, 1.0)
        });
    }

    fn relax_pressure(&mut self, pressure: &Field, divergence: &Field, output: &mut Field) {
        output.render(|x, y| {
            let [left, right, top, bottom] = neighbours(pressure, x, y);
            let divergence = divergence.get(x, y).x;
            let pressure = (left.x + right.x + top.x + bottom.x - divergence) * 0.25;
            Vec4::new(pressure, 0.0, 0.0, 1.0)
        });
    }

    fn subtract_gradient(&mut self, pressure: &Field, velocity: &Field, output: &mut Field) {
        output.render(|x, y| {
            let [left, right, top, bottom] = neighbours(pressure, x, y);
            let gradient = Vec2::new(right.x - left.x, top.x - bottom.x);
            let velocity = velocity.get(x, y).xy() - gradient;
            Vec4::new(velocity.x, velocity.y, 0.0, 1.0)
        });
    }

    fn advect(&mut self, velocity: &Field, input: &Field, output: &mut Field, advection: &Advection) {
        debug_assert_eq!(input.resolution(), output.resolution());

        // Work in texel space so that a zero timestep lands exactly on texel
        // centres.
        let to_velocity = texture_size(velocity) / texture_size(output);
        let to_input = texture_size(input) / texture_size(velocity);

        output.render(|x, y| {
            let centre = Vec2::new(x as f32, y as f32);
            let velocity_st = (centre + 0.5) * to_velocity - 0.5;
            let flow = velocity.bilerp_texel(velocity_st).xy();

            let st = centre - advection.timestep * flow * to_input;
            let mut value = advection.dissipation * input.bilerp_texel(st);
            value.w = 1.0;
            value
        });
    }

    fn display(&mut self, source: &Field, mode: Mode, viewport: Resolution) {
        if self.frame.dimensions() != (viewport.width, viewport.height) {
            self.frame = RgbaImage::new(viewport.width, viewport.height);
        }

        let size = Vec2::new(viewport.width as f32, viewport.height as f32);

        for (px, py, pixel) in self.frame.enumerate_pixels_mut() {
            // Images are stored top row first.
            let mut uv = texel_centre(px, py) / size;
            uv.y = 1.0 - uv.y;
            let color = source.sample(uv).xyz();

            let rgba = match mode {
                Mode::Normal => ink(color),
                Mode::DebugVelocity | Mode::DebugPressure | Mode::DebugDivergence => {
                    (Vec3::splat(0.5) + 0.5 * color).extend(1.0)
                }
            };

            *pixel = to_rgba8(rgba);
        }
    }
}

fn texture_size(field: &Field) -> Vec2 {
    Vec2::new(field.width as f32, field.height as f32)
}

fn texel_centre(x: u32, y: u32) -> Vec2 {
    Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
}

// Left, right, top and bottom neighbours, clamped to the edges.
fn neighbours(field: &Field, x: u32, y: u32) -> [Vec4; 4] {
    let centre = IVec2::new(x as i32, y as i32);
    [
        field.texel(centre - IVec2::X),
        field.texel(centre + IVec2::X),
        field.texel(centre + IVec2::Y),
        field.texel(centre - IVec2::Y),
    ]
}

// Invert the dye and fade the ink in with a steep curve.
fn ink(color: Vec3) -> Vec4 {
    let strength = color.max_element().max(0.0);
    let alpha = (0.1 * strength).powf(0.1).clamp(0.0, 1.0);
    (Vec3::ONE - color).extend(1.0 - alpha)
}

fn to_rgba8(color: Vec4) -> Rgba<u8> {
    let [r, g, b, a] = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round().to_array();
    Rgba([r as u8, g as u8, b as u8, a as u8])
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    const GRID: Resolution = Resolution {
        width: 16,
        height: 8,
    };

    fn swirl() -> Field {
        Field::from_fn(GRID, |x, y| {
            let (x, y) = (x as f32, y as f32);
            Vec4::new((0.7 * y).sin(), (0.3 * x).cos(), 0.0, 1.0)
        })
    }

    #[test]
    fn divergence_of_uniform_flow_is_zero() {
        let mut backend = Software::new();
        let velocity = Field::filled(GRID, Vec4::new(3.5, -1.25, 0.0, 1.0));
        let mut divergence = Field::new(GRID);

        backend.divergence(&velocity, &mut divergence);

        assert!(divergence.texels().iter().all(|texel| texel.x == 0.0));
    }

    #[test]
    fn divergence_of_expanding_flow_is_positive() {
        let mut backend = Software::new();
        let velocity = Field::from_fn(GRID, |x, y| Vec4::new(x as f32, y as f32, 0.0, 1.0));
        let mut divergence = Field::new(GRID);

        backend.divergence(&velocity, &mut divergence);

        // Neighbours are two texels apart on both axes.
        assert_eq!(divergence.get(5, 4).x, 2.0);
        // The left edge is clamped, so x only spans one texel there.
        assert_eq!(divergence.get(0, 4).x, 1.5);
    }

    #[test]
    fn advection_without_timestep_only_dissipates() {
        let mut backend = Software::new();
        let velocity = swirl();
        let input = Field::from_fn(GRID, |x, y| {
            Vec4::new(x as f32 * 0.1, y as f32 * 0.2, 0.5, 1.0)
        });
        let mut output = Field::new(GRID);

        let dissipation = 0.9;
        backend.advect(
            &velocity,
            &input,
            &mut output,
            &Advection {
                timestep: 0.0,
                dissipation,
            },
        );

        for y in 0..GRID.height {
            for x in 0..GRID.width {
                let expected = input.get(x, y).xyz() * dissipation;
                assert_eq!(output.get(x, y).xyz(), expected);
                assert_eq!(output.get(x, y).w, 1.0);
            }
        }
    }

    #[test]
    fn advection_transports_along_the_flow() {
        let mut backend = Software::new();
        // One texel per second to the right.
        let velocity = Field::filled(GRID, Vec4::new(1.0, 0.0, 0.0, 1.0));
        let mut input = Field::new(GRID);
        input.set(4, 3, Vec4::new(1.0, 1.0, 1.0, 1.0));
        let mut output = Field::new(GRID);

        backend.advect(
            &velocity,
            &input,
            &mut output,
            &Advection {
                timestep: 1.0,
                dissipation: 1.0,
            },
        );

        assert_eq!(output.get(5, 3).x, 1.0);
        assert_eq!(output.get(4, 3).x, 0.0);
    }

    #[test]
    fn advection_of_fine_dye_by_coarse_velocity() {
        let mut backend = Software::new();
        let velocity = Field::filled(GRID, Vec4::new(1.0, 0.0, 0.0, 1.0));
        let dye_grid = Resolution {
            width: 32,
            height: 16,
        };
        let mut input = Field::new(dye_grid);
        input.set(10, 6, Vec4::new(0.0, 0.0, 1.0, 1.0));
        let mut output = Field::new(dye_grid);

        backend.advect(
            &velocity,
            &input,
            &mut output,
            &Advection {
                timestep: 1.0,
                dissipation: 1.0,
            },
        );

        // A velocity texel is two dye texels wide.
        assert_eq!(output.get(12, 6).z, 1.0);
    }

    #[test]
    fn splat_peaks_at_the_point() {
        let mut backend = Software::new();
        let input = Field::new(GRID);
        let mut output = Field::new(GRID);

        let splat = Splat {
            point: Vec2::new(4.5 / 16.0, 2.5 / 8.0),
            value: Vec3::new(2.0, -1.0, 1.0),
            radius: 0.001,
            aspect_ratio: 2.0,
        };
        backend.splat(&input, &mut output, &splat);

        let peak = output.get(4, 2);
        assert_eq!(peak.xyz(), splat.value);
        assert_eq!(peak.w, 1.0);

        let neighbour = output.get(5, 2).x;
        assert!(neighbour > 0.0 && neighbour < splat.value.x);
        assert!(output.get(12, 6).x.abs() < 1e-6);
    }

    #[test]
    fn splat_adds_to_the_base() {
        let mut backend = Software::new();
        let input = Field::filled(GRID, Vec4::new(1.0, 1.0, 1.0, 1.0));
        let mut output = Field::new(GRID);

        backend.splat(
            &input,
            &mut output,
            &Splat {
                point: Vec2::new(-10.0, -10.0),
                value: Vec3::ONE,
                radius: 0.001,
                aspect_ratio: 1.0,
            },
        );

        assert_relative_eq!(output.get(8, 4).x, 1.0);
    }

    #[test]
    fn pressure_relaxation_stays_at_rest_without_divergence() {
        let mut backend = Software::new();
        let pressure = Field::new(GRID);
        let divergence = Field::new(GRID);
        let mut output = Field::filled(GRID, Vec4::ONE);

        backend.relax_pressure(&pressure, &divergence, &mut output);

        assert_eq!(output.max_abs(), 0.0);
    }

    #[test]
    fn subtracts_the_pressure_gradient() {
        let mut backend = Software::new();
        let pressure = Field::from_fn(GRID, |x, _| Vec4::new(x as f32, 0.0, 0.0, 1.0));
        let velocity = Field::filled(GRID, Vec4::new(3.0, 1.0, 0.0, 1.0));
        let mut output = Field::new(GRID);

        backend.subtract_gradient(&pressure, &velocity, &mut output);

        assert_eq!(output.get(6, 3), Vec4::new(1.0, 1.0, 0.0, 1.0));
        assert_eq!(output.get(0, 3), Vec4::new(2.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn uniform_pressure_leaves_velocity_alone() {
        let mut backend = Software::new();
        let pressure = Field::filled(GRID, Vec4::new(0.7, 0.0, 0.0, 1.0));
        let velocity = swirl();
        let mut output = Field::new(GRID);

        backend.subtract_gradient(&pressure, &velocity, &mut output);

        assert_eq!(output, velocity_without_extra_channels(&velocity));
    }

    fn velocity_without_extra_channels(velocity: &Field) -> Field {
        Field::from_fn(velocity.resolution(), |x, y| {
            velocity.get(x, y).xy().extend(0.0).extend(1.0)
        })
    }

    #[test]
    fn displays_white_paper_without_dye() {
        let mut backend = Software::new();
        let dye = Field::new(GRID);
        let viewport = Resolution {
            width: 20,
            height: 10,
        };

        backend.display(&dye, Mode::Normal, viewport);

        assert_eq!(backend.frame().dimensions(), (20, 10));
        assert!(backend
            .frame()
            .pixels()
            .all(|pixel| *pixel == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn displays_ink_where_there_is_dye() {
        let mut backend = Software::new();
        let dye = Field::filled(GRID, Vec4::new(0.2, 0.5, 0.8, 1.0));
        let viewport = Resolution {
            width: 4,
            height: 4,
        };

        backend.display(&dye, Mode::Normal, viewport);

        let Rgba([r, g, b, a]) = *backend.frame().get_pixel(1, 1);
        assert_eq!((r, g, b), (204, 128, 51));
        assert!(a < 255);
    }

    #[test]
    fn debug_modes_centre_signed_values() {
        let mut backend = Software::new();
        let pressure = Field::filled(GRID, Vec4::new(-1.0, 0.0, 1.0, 1.0));
        let viewport = Resolution {
            width: 2,
            height: 2,
        };

        backend.display(&pressure, Mode::DebugPressure, viewport);

        assert_eq!(*backend.frame().get_pixel(0, 0), Rgba([0, 128, 255, 255]));
    }

    #[test]
    fn refuses_empty_targets() {
        let mut backend = Software::new();
        let result = backend.create_target(
            Resolution {
                width: 0,
                height: 8,
            },
            Format::Rgba,
        );
        assert!(matches!(result, Err(Problem::EmptyTarget)));
    }
}
