use crate::backend::{Advection, Backend, Format, Splat};
use crate::grid::Resolution;
use crate::settings::Mode;
use crate::{data, render, Problem};
use render::{
    Buffer, Context, Framebuffer, Program, TextureOptions, Uniform, UniformValue,
    VertexArrayObject,
};

use glam::Vec4;
use glow::HasContext;
use std::rc::Rc;

static FLUID_VERT_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/fluid.vert"));
static SPLAT_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/splat.frag"));
static DIVERGENCE_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/divergence.frag"));
static SOLVE_PRESSURE_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/solve_pressure.frag"));
static SUBTRACT_GRADIENT_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/subtract_gradient.frag"));
static ADVECTION_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/advection.frag"));
static DISPLAY_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/display.frag"));
static TEXTURE_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/texture.frag"));

/// Runs the fluid passes as fragment shaders over a full-screen quad.
pub struct GlBackend {
    context: Context,

    // The VAO keeps references to these.
    _plane_vertices: Buffer,
    _plane_indices: Buffer,
    plane: VertexArrayObject,

    splat_pass: Program,
    divergence_pass: Program,
    pressure_pass: Program,
    subtract_gradient_pass: Program,
    advection_pass: Program,
    display_pass: Program,
    texture_pass: Program,
}

impl GlBackend {
    pub fn new(context: &Context) -> Result<Self, Problem> {
        let plane_vertices = Buffer::from_f32(
            context,
            &data::PLANE_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;
        let plane_indices = Buffer::from_u16(
            context,
            &data::PLANE_INDICES,
            glow::ELEMENT_ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        let splat_pass = Program::new(context, (FLUID_VERT_SHADER, SPLAT_FRAG_SHADER))?;
        let divergence_pass = Program::new(context, (FLUID_VERT_SHADER, DIVERGENCE_FRAG_SHADER))?;
        let pressure_pass = Program::new(context, (FLUID_VERT_SHADER, SOLVE_PRESSURE_FRAG_SHADER))?;
        let subtract_gradient_pass =
            Program::new(context, (FLUID_VERT_SHADER, SUBTRACT_GRADIENT_FRAG_SHADER))?;
        let advection_pass = Program::new(context, (FLUID_VERT_SHADER, ADVECTION_FRAG_SHADER))?;
        let display_pass = Program::new(context, (FLUID_VERT_SHADER, DISPLAY_FRAG_SHADER))?;
        let texture_pass = Program::new(context, (FLUID_VERT_SHADER, TEXTURE_FRAG_SHADER))?;

        // Texture units never change, so bind the samplers once.
        splat_pass.set_uniforms(&[&Uniform {
            name: "inputTexture",
            value: UniformValue::Texture2D(0),
        }]);
        divergence_pass.set_uniforms(&[&Uniform {
            name: "velocityTexture",
            value: UniformValue::Texture2D(0),
        }]);
        pressure_pass.set_uniforms(&[
            &Uniform {
                name: "pressureTexture",
                value: UniformValue::Texture2D(0),
            },
            &Uniform {
                name: "divergenceTexture",
                value: UniformValue::Texture2D(1),
            },
        ]);
        subtract_gradient_pass.set_uniforms(&[
            &Uniform {
                name: "pressureTexture",
                value: UniformValue::Texture2D(0),
            },
            &Uniform {
                name: "velocityTexture",
                value: UniformValue::Texture2D(1),
            },
        ]);
        advection_pass.set_uniforms(&[
            &Uniform {
                name: "velocityTexture",
                value: UniformValue::Texture2D(0),
            },
            &Uniform {
                name: "inputTexture",
                value: UniformValue::Texture2D(1),
            },
        ]);
        display_pass.set_uniforms(&[&Uniform {
            name: "dyeTexture",
            value: UniformValue::Texture2D(0),
        }]);
        texture_pass.set_uniforms(&[&Uniform {
            name: "inputTexture",
            value: UniformValue::Texture2D(0),
        }]);

        // Every program shares the vertex shader, so one VAO fits them all.
        let plane = VertexArrayObject::new(
            context,
            &splat_pass,
            &[(
                &plane_vertices,
                render::VertexBufferLayout {
                    name: "position",
                    size: 2,
                    type_: glow::FLOAT,
                    ..Default::default()
                },
            )],
            Some(&plane_indices),
        )?;

        unsafe {
            context.disable(glow::BLEND);
            context.disable(glow::DEPTH_TEST);
        }

        Ok(Self {
            context: Rc::clone(context),
            _plane_vertices: plane_vertices,
            _plane_indices: plane_indices,
            plane,
            splat_pass,
            divergence_pass,
            pressure_pass,
            subtract_gradient_pass,
            advection_pass,
            display_pass,
            texture_pass,
        })
    }

    fn bind_textures(&self, textures: &[&Framebuffer]) {
        for (unit, framebuffer) in textures.iter().enumerate() {
            unsafe {
                self.context.active_texture(glow::TEXTURE0 + unit as u32);
                self.context
                    .bind_texture(glow::TEXTURE_2D, Some(framebuffer.texture));
            }
        }
    }

    fn draw_plane(&self) {
        unsafe {
            self.context.bind_vertex_array(Some(self.plane.id));
            self.context
                .draw_elements(glow::TRIANGLES, 6, glow::UNSIGNED_SHORT, 0);
            self.context.bind_vertex_array(None);
        }
    }

    // Render a pass into `output`, sampling `inputs` on consecutive texture
    // units.
    fn run(
        &self,
        program: &Program,
        output: &Framebuffer,
        inputs: &[&Framebuffer],
        texel_size: &[f32; 2],
        uniforms: &[&Uniform],
    ) {
        program.set_uniforms(uniforms);
        program.set_uniform(&Uniform {
            name: "texelSize",
            value: UniformValue::Vec2(texel_size),
        });

        output.draw_to(|| {
            self.bind_textures(inputs);
            self.draw_plane();
        });
    }
}

impl Backend for GlBackend {
    type Target = Framebuffer;

    fn create_target(
        &mut self,
        resolution: Resolution,
        format: Format,
    ) -> Result<Framebuffer, Problem> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(Problem::EmptyTarget);
        }

        let format = match format {
            Format::Rgba => glow::RGBA16F,
            Format::Scalar => glow::R16F,
        };

        let framebuffer = Framebuffer::new(
            &self.context,
            resolution.width,
            resolution.height,
            TextureOptions {
                format,
                ..Default::default()
            },
        )?;

        Ok(framebuffer)
    }

    fn clear(&mut self, target: &mut Framebuffer, value: Vec4) {
        target.clear_color_with(&value.to_array());
    }

    fn splat(&mut self, input: &Framebuffer, output: &mut Framebuffer, splat: &Splat) {
        let point = splat.point.to_array();
        let value = splat.value.to_array();

        self.run(
            &self.splat_pass,
            output,
            &[input],
            &output.texel_size(),
            &[
                &Uniform {
                    name: "aspectRatio",
                    value: UniformValue::Float(splat.aspect_ratio),
                },
                &Uniform {
                    name: "splatPoint",
                    value: UniformValue::Vec2(&point),
                },
                &Uniform {
                    name: "splatValue",
                    value: UniformValue::Vec3(&value),
                },
                &Uniform {
                    name: "splatRadius",
                    value: UniformValue::Float(splat.radius),
                },
            ],
        );
    }

    fn divergence(&mut self, velocity: &Framebuffer, output: &mut Framebuffer) {
        self.run(
            &self.divergence_pass,
            output,
            &[velocity],
            &velocity.texel_size(),
            &[],
        );
    }

    fn relax_pressure(
        &mut self,
        pressure: &Framebuffer,
        divergence: &Framebuffer,
        output: &mut Framebuffer,
    ) {
        self.run(
            &self.pressure_pass,
            output,
            &[pressure, divergence],
            &pressure.texel_size(),
            &[],
        );
    }

    fn subtract_gradient(
        &mut self,
        pressure: &Framebuffer,
        velocity: &Framebuffer,
        output: &mut Framebuffer,
    ) {
        self.run(
            &self.subtract_gradient_pass,
            output,
            &[pressure, velocity],
            &pressure.texel_size(),
            &[],
        );
    }

    fn advect(
        &mut self,
        velocity: &Framebuffer,
        input: &Framebuffer,
        output: &mut Framebuffer,
        advection: &Advection,
    ) {
        let input_texel_size = input.texel_size();

        self.run(
            &self.advection_pass,
            output,
            &[velocity, input],
            &velocity.texel_size(),
            &[
                &Uniform {
                    name: "inputTexelSize",
                    value: UniformValue::Vec2(&input_texel_size),
                },
                &Uniform {
                    name: "deltaTime",
                    value: UniformValue::Float(advection.timestep),
                },
                &Uniform {
                    name: "dissipation",
                    value: UniformValue::Float(advection.dissipation),
                },
            ],
        );
    }

    fn display(&mut self, source: &Framebuffer, mode: Mode, viewport: Resolution) {
        let program = match mode {
            Mode::Normal => &self.display_pass,
            Mode::DebugVelocity | Mode::DebugPressure | Mode::DebugDivergence => {
                &self.texture_pass
            }
        };

        program.set_uniforms(&[&Uniform {
            name: "texelSize",
            value: UniformValue::Vec2(&source.texel_size()),
        }]);

        unsafe {
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context
                .viewport(0, 0, viewport.width as i32, viewport.height as i32);
            self.context.clear_color(0.0, 0.0, 0.0, 0.0);
            self.context.clear(glow::COLOR_BUFFER_BIT);
        }

        self.bind_textures(&[source]);
        self.draw_plane();
    }
}
