use crate::error::{SolverError, SolverResult};
use tl_core::Real;

/// Fixed-length history of one quantity, advanced once per timestep.
///
/// Holds `steps + 1` values. After `update(x_k)`, [`read`](Self::read)
/// returns `x_{k - steps}` and [`newest`](Self::newest) returns `x_k`.
/// Read before this step's update, `newest()` is the value as of the end of
/// the previous step.
#[derive(Clone, Debug)]
pub struct Delay {
    buffer: Vec<Real>,
    newest: usize,
}

impl Delay {
    pub fn new(steps: usize, seed: Real) -> SolverResult<Self> {
        if steps == 0 {
            return Err(SolverError::DelayLength { steps });
        }
        Ok(Self {
            buffer: vec![seed; steps + 1],
            newest: 0,
        })
    }

    /// Delay spanning `time` seconds at timestep `dt`, at least one step.
    pub fn for_time(time: Real, dt: Real, seed: Real) -> SolverResult<Self> {
        Self::new(tl_core::step_count(time, dt).max(1), seed)
    }

    /// Number of steps between a pushed value and its `read()`.
    pub fn steps(&self) -> usize {
        self.buffer.len() - 1
    }

    /// Refill every slot with `seed`.
    pub fn reset(&mut self, seed: Real) {
        self.buffer.fill(seed);
        self.newest = 0;
    }

    /// Push `value`, evicting the oldest, and return the delayed value.
    pub fn update(&mut self, value: Real) -> Real {
        self.newest = (self.newest + 1) % self.buffer.len();
        self.buffer[self.newest] = value;
        self.read()
    }

    pub fn read(&self) -> Real {
        self.buffer[self.position(self.steps())]
    }

    pub fn newest(&self) -> Real {
        self.buffer[self.newest]
    }

    /// Value pushed `i` updates before the newest; `None` past the buffer.
    pub fn value(&self, i: usize) -> Option<Real> {
        (i <= self.steps()).then(|| self.buffer[self.position(i)])
    }

    fn position(&self, back: usize) -> usize {
        let len = self.buffer.len();
        (self.newest + len - back) % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_step_delay_returns_previous_value() {
        let mut d = Delay::new(1, 10.0).unwrap();
        assert_eq!(d.read(), 10.0);
        d.update(11.0);
        assert_eq!(d.read(), 10.0);
        d.update(12.0);
        assert_eq!(d.read(), 11.0);
        assert_eq!(d.newest(), 12.0);
    }

    #[test]
    fn zero_length_is_rejected() {
        assert_eq!(
            Delay::new(0, 1.0).unwrap_err(),
            SolverError::DelayLength { steps: 0 }
        );
    }

    #[test]
    fn for_time_rounds_to_whole_steps() {
        assert_eq!(Delay::for_time(0.01, 0.001, 0.0).unwrap().steps(), 10);
        assert_eq!(Delay::for_time(0.0, 0.001, 0.0).unwrap().steps(), 1);
    }

    #[test]
    fn value_indexes_back_from_newest() {
        let mut d = Delay::new(3, 0.0).unwrap();
        for v in [1.0, 2.0, 3.0, 4.0] {
            d.update(v);
        }
        assert_eq!(d.value(0), Some(4.0));
        assert_eq!(d.value(3), Some(1.0));
        assert_eq!(d.value(4), None);
    }

    #[test]
    fn reset_reseeds() {
        let mut d = Delay::new(2, 0.0).unwrap();
        d.update(5.0);
        d.reset(7.0);
        assert_eq!(d.read(), 7.0);
        assert_eq!(d.newest(), 7.0);
    }
}
