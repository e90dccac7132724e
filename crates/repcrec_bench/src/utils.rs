//! Benchmark utilities.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of a generated script workload.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    /// Total number of transactions.
    pub transactions: usize,
    /// Transactions running at the same time.
    pub concurrency: usize,
    /// Reads and writes per transaction.
    pub ops_per_txn: usize,
    /// Number of variables (`x1..`).
    pub variables: u32,
    /// Number of sites.
    pub sites: u32,
    /// Probability that an operation is a write.
    pub write_ratio: f64,
    /// Probability of a fail/recover pair after each round of operations.
    pub failure_rate: f64,
    /// RNG seed, so runs are comparable.
    pub seed: u64,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            transactions: 100,
            concurrency: 4,
            ops_per_txn: 5,
            variables: 20,
            sites: 10,
            write_ratio: 0.3,
            failure_rate: 0.0,
            seed: 42,
        }
    }
}

impl Workload {
    /// Renders the workload as a script.
    ///
    /// Transactions run in batches of `concurrency`: the batch begins, its
    /// operations interleave round by round, then every member ends.
    pub fn script(&self) -> String {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut script = String::new();
        let batch = self.concurrency.max(1);

        let mut next = 1;
        while next <= self.transactions {
            let labels: Vec<String> = (next..=self.transactions.min(next + batch - 1))
                .map(|i| format!("T{i}"))
                .collect();
            next += labels.len();

            for label in &labels {
                script.push_str(&format!("begin({label})\n"));
            }
            for _ in 0..self.ops_per_txn {
                for label in &labels {
                    let var = rng.gen_range(1..=self.variables);
                    if rng.gen_bool(self.write_ratio) {
                        let value: i64 = rng.gen_range(0..1000);
                        script.push_str(&format!("W({label}, x{var}, {value})\n"));
                    } else {
                        script.push_str(&format!("R({label}, x{var})\n"));
                    }
                }
                if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
                    let site = rng.gen_range(1..=self.sites);
                    script.push_str(&format!("fail({site})\nrecover({site})\n"));
                }
            }
            for label in &labels {
                script.push_str(&format!("end({label})\n"));
            }
        }
        script
    }
}

/// Generates `count` transactions that each write one variable and commit,
/// one after another.
pub fn serial_writers(count: usize, variables: u32) -> String {
    let mut rng = StdRng::seed_from_u64(7);
    (1..=count)
        .map(|i| {
            let var = rng.gen_range(1..=variables);
            let value: i64 = rng.gen();
            format!("begin(T{i})\nW(T{i}, x{var}, {value})\nend(T{i})\n")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_is_reproducible() {
        let workload = Workload {
            transactions: 6,
            ..Workload::default()
        };
        assert_eq!(workload.script(), workload.script());
        assert_eq!(workload.script().matches("begin(").count(), 6);
        assert_eq!(workload.script().matches("end(").count(), 6);
    }

    #[test]
    fn serial_writers_shape() {
        let script = serial_writers(3, 20);
        assert_eq!(script.lines().count(), 9);
        assert!(script.starts_with("begin(T1)\nW(T1, x"));
    }
}
