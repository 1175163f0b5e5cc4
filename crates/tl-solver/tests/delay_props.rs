use proptest::prelude::*;
use std::collections::VecDeque;
use tl_solver::Delay;

proptest! {
    #[test]
    fn read_lags_by_exactly_n_updates(
        n in 1usize..12,
        seed in -1e6f64..1e6,
        values in prop::collection::vec(-1e6f64..1e6, 0..64),
    ) {
        let mut d = Delay::new(n, seed).unwrap();
        let mut model: VecDeque<f64> = std::iter::repeat_n(seed, n + 1).collect();
        for v in values {
            model.pop_front();
            model.push_back(v);
            let out = d.update(v);
            prop_assert_eq!(out, model[0]);
            prop_assert_eq!(d.newest(), v);
        }
    }

    #[test]
    fn seeded_buffer_reads_seed_everywhere(n in 1usize..16, seed in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let d = Delay::new(n, seed).unwrap();
        for i in 0..=n {
            prop_assert_eq!(d.value(i), Some(seed));
        }
    }
}
