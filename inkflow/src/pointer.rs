// Turns input events, or an idle drift path while nobody has touched the page,
// into impulses for the fluid.
//
// Positions are in viewport pixels with the origin at the top left, the way
// input events report them.

use crate::grid::Resolution;

use glam::{DVec2, Vec2};

const MOUSE_GAIN: f32 = 5.0;
const TOUCH_GAIN: f32 = 8.0;
const DRIFT_GAIN: f32 = 10.0;
const CLICK_DELTA: Vec2 = Vec2::splat(10.0);

/// The driver starts out `Idle` and goes `Live` on the first interaction.
/// There is no way back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Live,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Move { x: f32, y: f32 },
    Touch { x: f32, y: f32 },
    Click { x: f32, y: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impulse {
    pub position: Vec2,
    pub delta: Vec2,
}

#[derive(Clone, Debug)]
pub struct Pointer {
    pub position: Vec2,
    pub delta: Vec2,
    moved: bool,
    state: State,
}

impl Pointer {
    pub fn new(viewport: Resolution) -> Self {
        Self {
            position: drift_position(0.0, viewport),
            delta: Vec2::ZERO,
            moved: false,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    pub fn has_moved(&self) -> bool {
        self.moved
    }

    pub fn go_live(&mut self) {
        if self.state == State::Idle {
            log::debug!("Pointer is live");
            self.state = State::Live;
        }
    }

    pub fn handle(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Move { x, y } => self.move_to(Vec2::new(x, y), MOUSE_GAIN),
            PointerEvent::Touch { x, y } => self.move_to(Vec2::new(x, y), TOUCH_GAIN),
            PointerEvent::Click { x, y } => {
                self.position = Vec2::new(x, y);
                self.delta = CLICK_DELTA;
                self.moved = true;
            }
        }

        self.go_live();
    }

    /// Follow the idle path. `time` is in milliseconds. Does nothing once the
    /// pointer is live.
    pub fn drift(&mut self, time: f64, viewport: Resolution) {
        if self.state == State::Live {
            return;
        }

        self.move_to(drift_position(time, viewport), DRIFT_GAIN);
    }

    /// Carry the position over to a resized viewport, so that the next
    /// movement is measured in the new viewport's pixels.
    pub fn rescale(&mut self, from: Resolution, to: Resolution) {
        let scale = Vec2::new(
            to.width as f32 / from.width as f32,
            to.height as f32 / from.height as f32,
        );
        self.position *= scale;
    }

    /// Consume this frame's movement, if there was any.
    pub fn take_impulse(&mut self) -> Option<Impulse> {
        if !std::mem::take(&mut self.moved) {
            return None;
        }

        Some(Impulse {
            position: self.position,
            delta: self.delta,
        })
    }

    fn move_to(&mut self, position: Vec2, gain: f32) {
        self.delta = gain * (position - self.position);
        self.position = position;
        self.moved = true;
    }
}

// A slow Lissajous-like loop to the right of centre.
fn drift_position(time: f64, viewport: Resolution) -> Vec2 {
    let size = DVec2::new(viewport.width as f64, viewport.height as f64);
    let x = 0.65 + 0.2 * (0.006 * time).cos() * (0.008 * time).sin();
    let y = 0.5 + 0.12 * (0.01 * time).sin();
    (DVec2::new(x, y) * size).as_vec2()
}
