use crate::grid::Resolution;

use glam::{IVec2, Vec2, Vec4};

/// A CPU-side float texture. Sampling mirrors a GL texture with nearest
/// filtering and clamp-to-edge wrapping.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub width: u32,
    pub height: u32,
    texels: Vec<Vec4>,
}

impl Field {
    pub fn new(resolution: Resolution) -> Self {
        Self::filled(resolution, Vec4::ZERO)
    }

    pub fn filled(resolution: Resolution, value: Vec4) -> Self {
        let Resolution { width, height } = resolution;
        Self {
            width,
            height,
            texels: vec![value; (width * height) as usize],
        }
    }

    pub fn from_fn<F>(resolution: Resolution, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> Vec4,
    {
        let Resolution { width, height } = resolution;
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                texels.push(f(x, y));
            }
        }

        Self {
            width,
            height,
            texels,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn fill(&mut self, value: Vec4) {
        self.texels.fill(value);
    }

    /// Overwrite every texel with the result of `shader`, called with the
    /// texel's column and row.
    pub fn render<F>(&mut self, mut shader: F)
    where
        F: FnMut(u32, u32) -> Vec4,
    {
        let width = self.width;
        for (index, texel) in self.texels.iter_mut().enumerate() {
            let index = index as u32;
            *texel = shader(index % width, index / width);
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.texels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.width + x) as usize;
        self.texels[index] = value;
    }

    /// Fetch a texel, clamping out-of-range coordinates to the border.
    pub fn texel(&self, coord: IVec2) -> Vec4 {
        let x = coord.x.clamp(0, self.width as i32 - 1);
        let y = coord.y.clamp(0, self.height as i32 - 1);
        self.texels[(y as u32 * self.width + x as u32) as usize]
    }

    /// Nearest sample at a UV coordinate.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let size = Vec2::new(self.width as f32, self.height as f32);
        self.texel((uv * size).floor().as_ivec2())
    }

    /// Bilinear sample in texel space, where integer coordinates land on
    /// texel centres.
    pub fn bilerp_texel(&self, st: Vec2) -> Vec4 {
        let iuv = st.floor();
        let fuv = st - iuv;
        let i = iuv.as_ivec2();

        let a = self.texel(i);
        let b = self.texel(i + IVec2::new(1, 0));
        let c = self.texel(i + IVec2::new(0, 1));
        let d = self.texel(i + IVec2::new(1, 1));

        a.lerp(b, fuv.x).lerp(c.lerp(d, fuv.x), fuv.y)
    }

    /// Bilinear sample at a UV coordinate.
    pub fn bilerp(&self, uv: Vec2) -> Vec4 {
        let size = Vec2::new(self.width as f32, self.height as f32);
        self.bilerp_texel(uv * size - 0.5)
    }

    pub fn max_abs(&self) -> f32 {
        self.texels
            .iter()
            .map(|texel| texel.truncate().abs().max_element())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> Field {
        Field::from_fn(
            Resolution {
                width: 4,
                height: 3,
            },
            |x, y| Vec4::new(x as f32, y as f32, 0.0, 1.0),
        )
    }

    #[test]
    fn clamps_to_edge() {
        let field = ramp();
        assert_eq!(field.texel(IVec2::new(-3, 1)), field.get(0, 1));
        assert_eq!(field.texel(IVec2::new(9, 9)), field.get(3, 2));
    }

    #[test]
    fn bilerp_is_exact_at_texel_centres() {
        let field = ramp();
        for y in 0..3 {
            for x in 0..4 {
                let st = Vec2::new(x as f32, y as f32);
                assert_eq!(field.bilerp_texel(st), field.get(x, y));
            }
        }
    }

    #[test]
    fn bilerp_interpolates_between_centres() {
        let field = ramp();
        let value = field.bilerp_texel(Vec2::new(1.25, 0.5));
        assert_relative_eq!(value.x, 1.25);
        assert_relative_eq!(value.y, 0.5);
    }

    #[test]
    fn nearest_sample_picks_containing_texel() {
        let field = ramp();
        assert_eq!(field.sample(Vec2::new(0.9, 0.1)), field.get(3, 0));
        assert_eq!(field.sample(Vec2::new(0.3, 0.5)), field.get(1, 1));
    }

    #[test]
    fn max_abs_ignores_alpha() {
        let mut field = Field::filled(
            Resolution {
                width: 2,
                height: 2,
            },
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        );
        assert_eq!(field.max_abs(), 0.0);

        field.set(1, 1, Vec4::new(0.0, -2.0, 0.5, 1.0));
        assert_eq!(field.max_abs(), 2.0);
    }
}
