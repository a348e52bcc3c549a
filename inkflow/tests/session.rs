use inkflow::backend::{Advection, Splat};
use inkflow::field::Field;
use inkflow::{
    Backend, Format, Mode, PointerEvent, Problem, Resolution, Settings, SimulationSession,
    Software, State,
};

use approx::assert_relative_eq;
use glam::{Vec2, Vec3, Vec4};
use std::rc::Rc;

// A software backend that remembers every splat it was asked to draw.
#[derive(Default)]
struct Recording {
    inner: Software,
    splats: Vec<Splat>,
}

impl Backend for Recording {
    type Target = Field;

    fn create_target(&mut self, resolution: Resolution, format: Format) -> Result<Field, Problem> {
        self.inner.create_target(resolution, format)
    }

    fn clear(&mut self, target: &mut Field, value: Vec4) {
        self.inner.clear(target, value)
    }

    fn splat(&mut self, input: &Field, output: &mut Field, splat: &Splat) {
        self.splats.push(*splat);
        self.inner.splat(input, output, splat)
    }

    fn divergence(&mut self, velocity: &Field, output: &mut Field) {
        self.inner.divergence(velocity, output)
    }

    fn relax_pressure(&mut self, pressure: &Field, divergence: &Field, output: &mut Field) {
        self.inner.relax_pressure(pressure, divergence, output)
    }

    fn subtract_gradient(&mut self, pressure: &Field, velocity: &Field, output: &mut Field) {
        self.inner.subtract_gradient(pressure, velocity, output)
    }

    fn advect(&mut self, velocity: &Field, input: &Field, output: &mut Field, advection: &Advection) {
        self.inner.advect(velocity, input, output, advection)
    }

    fn display(&mut self, source: &Field, mode: Mode, viewport: Resolution) {
        self.inner.display(source, mode, viewport)
    }
}

fn small_grids() -> Rc<Settings> {
    Rc::new(Settings {
        sim_resolution: 32,
        dye_resolution: 64,
        ..Default::default()
    })
}

#[test]
fn idle_drift_leaves_visible_ink() {
    let mut session = SimulationSession::new(Software::new(), 256, 128, &small_grids()).unwrap();

    let mut timestamp = 1_000.0;
    for _ in 0..180 {
        session.animate(timestamp);
        timestamp += 1000.0 / 60.0;
    }

    assert_eq!(session.pointer().state(), State::Idle);
    assert!(session.fluid().dye().max_abs() > 0.0);

    let frame = session.backend().frame();
    assert_eq!(frame.dimensions(), (256, 128));
    assert!(frame.pixels().any(|pixel| pixel.0[3] < 255));
}

#[test]
fn click_before_the_first_frame_splats_once() {
    let mut session = SimulationSession::new(Recording::default(), 256, 128, &small_grids()).unwrap();

    session.handle_pointer(PointerEvent::Click { x: 128.0, y: 64.0 });
    session.animate(0.0);

    assert_eq!(session.pointer().state(), State::Live);

    let splats = &session.backend().splats;
    assert_eq!(splats.len(), 2);

    let (velocity, dye) = (splats[0], splats[1]);
    assert_eq!(velocity.point, Vec2::new(0.5, 0.5));
    assert_eq!(velocity.value, Vec3::new(10.0, -10.0, 1.0));
    assert_eq!(velocity.aspect_ratio, 2.0);
    assert_relative_eq!(velocity.radius, 3.0 / 128.0);

    assert_eq!(dye.point, Vec2::new(0.5, 0.5));
    assert_relative_eq!(dye.value.x, 0.2, epsilon = 1e-6);
    assert_relative_eq!(dye.value.y, 0.5, epsilon = 1e-6);
    assert_relative_eq!(dye.value.z, 0.8, epsilon = 1e-6);

    // Nothing moves on the following frames.
    session.animate(16.0);
    session.animate(32.0);
    assert_eq!(session.backend().splats.len(), 2);
}

#[test]
fn resize_starts_over_from_rest() {
    let mut session = SimulationSession::new(Software::new(), 256, 128, &small_grids()).unwrap();
    for frame in 0..10 {
        session.animate(frame as f64 * 16.0);
    }
    assert!(session.fluid().dye().max_abs() > 0.0);

    session.resize(128, 256).unwrap();

    assert_eq!(
        session.fluid().dye_resolution(),
        Resolution {
            width: 64,
            height: 128
        }
    );
    assert_eq!(session.fluid().dye().max_abs(), 0.0);

    session.animate(176.0);
    assert_eq!(session.backend().frame().dimensions(), (128, 256));

    session.dispose();
}
