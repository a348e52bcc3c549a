// Full-screen quad in clip space

pub static PLANE_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
pub static PLANE_VERTICES: [f32; 8] = [
    -1.0, -1.0, //
    -1.0, 1.0, //
    1.0, 1.0, //
    1.0, -1.0, //
];
