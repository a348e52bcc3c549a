use crate::grid::Resolution;

/// A pair of render targets for passes that feed on their own output.
///
/// Passes read from [`read`](Self::read), render into [`write`](Self::write)
/// and then [`swap`](Self::swap). [`split`](Self::split) and
/// [`draw_to`](Self::draw_to) hand out both halves at once, so the borrow
/// checker rules out a pass that samples the target it is rendering to.
pub struct DoubleBuffer<T> {
    pub width: u32,
    pub height: u32,
    front: T,
    back: T,
}

impl<T> DoubleBuffer<T> {
    pub fn new(resolution: Resolution, front: T, back: T) -> Self {
        Self {
            width: resolution.width,
            height: resolution.height,
            front,
            back,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.resolution().texel_size()
    }

    pub fn read(&self) -> &T {
        &self.front
    }

    pub fn write(&self) -> &T {
        &self.back
    }

    pub fn split(&mut self) -> (&T, &mut T) {
        (&self.front, &mut self.back)
    }

    pub fn both_mut(&mut self) -> (&mut T, &mut T) {
        (&mut self.front, &mut self.back)
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    pub fn draw_to<F>(&mut self, draw_call: F)
    where
        F: FnOnce(&T, &mut T),
    {
        let (read, write) = self.split();
        draw_call(read, write);
        self.swap();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pair() -> DoubleBuffer<&'static str> {
        DoubleBuffer::new(
            Resolution {
                width: 4,
                height: 2,
            },
            "front",
            "back",
        )
    }

    #[test]
    fn swap_parity() {
        for k in 0..7 {
            let mut buffers = pair();
            for _ in 0..k {
                buffers.swap();
            }

            if k % 2 == 0 {
                assert_eq!(*buffers.read(), "front");
                assert_eq!(*buffers.write(), "back");
            } else {
                assert_eq!(*buffers.read(), "back");
                assert_eq!(*buffers.write(), "front");
            }
        }
    }

    #[test]
    fn draw_to_writes_back_then_swaps() {
        let mut buffers = DoubleBuffer::new(
            Resolution {
                width: 1,
                height: 1,
            },
            1,
            0,
        );

        buffers.draw_to(|read, write| *write = read + 1);
        assert_eq!(*buffers.read(), 2);

        buffers.draw_to(|read, write| *write = read * 10);
        assert_eq!(*buffers.read(), 20);
        assert_eq!(*buffers.write(), 2);
    }

    #[test]
    fn texel_size_follows_resolution() {
        assert_eq!(pair().texel_size(), [0.25, 0.5]);
    }
}
