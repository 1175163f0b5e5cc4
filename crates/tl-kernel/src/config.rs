use serde::{Deserialize, Serialize};

/// Run configuration passed explicitly into `ComponentSystem::initialize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Evaluate independent components of one phase level on a worker pool.
    pub multicore: bool,
    /// Worker count; 0 lets rayon pick.
    pub threads: usize,
    /// Record every N-th step. The final step is always recorded.
    pub log_every: usize,
    /// Number of retained runs in the log data.
    pub max_generations: usize,
    /// Stop the run when a component writes a non-finite node value.
    pub check_finite: bool,
    /// Consecutive singular Jacobians a Q component tolerates before it stops the run.
    pub singular_streak_limit: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            multicore: false,
            threads: 0,
            log_every: 1,
            max_generations: 5,
            check_finite: true,
            singular_streak_limit: 50,
        }
    }
}

impl SimConfig {
    pub fn multicore(threads: usize) -> Self {
        Self {
            multicore: true,
            threads,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: SimConfig = serde_yaml::from_str("multicore: true\nthreads: 4\n").unwrap();
        assert!(cfg.multicore);
        assert_eq!(cfg.threads, 4);
        assert_eq!(cfg.log_every, 1);
        assert_eq!(cfg.max_generations, 5);
        assert!(cfg.check_finite);
    }
}
