// Size the simulation grids from the shape of the viewport.
//
// The shorter axis always gets `target` texels and the longer axis is scaled
// by the aspect ratio. This keeps the cost of a step roughly constant no matter
// how the window is shaped.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }
}

pub fn get_resolution(target: u32, width: u32, height: u32) -> Resolution {
    let mut aspect_ratio = width as f32 / height as f32;
    if aspect_ratio < 1.0 {
        aspect_ratio = 1.0 / aspect_ratio;
    }

    let min = target;
    let max = (target as f32 * aspect_ratio).round() as u32;

    if width > height {
        Resolution {
            width: max,
            height: min,
        }
    } else {
        Resolution {
            width: min,
            height: max,
        }
    }
}
