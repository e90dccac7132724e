//! Property-based test generators using proptest.
//!
//! Generated scripts are syntactically valid but otherwise unconstrained:
//! they may name transactions that never began, end a transaction twice or
//! fail a site that is already down. The driver has to cope with all of it.

use proptest::prelude::*;
use repcrec_core::{Value, VariableId};
use repcrec_script::{DumpTarget, Instruction};

/// Shape of generated scripts.
#[derive(Debug, Clone, Copy)]
pub struct ScriptShape {
    /// Number of distinct transaction labels (`T1` ..).
    pub transactions: u32,
    /// Number of sites.
    pub sites: u32,
    /// Number of variables.
    pub variables: u32,
}

impl Default for ScriptShape {
    fn default() -> Self {
        Self {
            transactions: 4,
            sites: 10,
            variables: 20,
        }
    }
}

/// Strategy for transaction labels `T1..=Tn`.
pub fn label_strategy(transactions: u32) -> impl Strategy<Value = String> + Clone {
    (1..=transactions).prop_map(|i| format!("T{i}"))
}

/// Strategy for variable identifiers `x1..=xn`.
pub fn variable_strategy(variables: u32) -> impl Strategy<Value = VariableId> + Clone {
    (1..=variables).prop_map(VariableId::new)
}

/// Strategy for site numbers `1..=n`.
pub fn site_strategy(sites: u32) -> impl Strategy<Value = u32> + Clone {
    1..=sites
}

/// Strategy for small written values.
pub fn value_strategy() -> impl Strategy<Value = Value> + Clone {
    -1000i64..1000
}

/// Strategy for a single instruction.
///
/// Reads and writes dominate; failures and recoveries are rarer so that most
/// transactions get a chance to commit.
pub fn instruction_strategy(shape: ScriptShape) -> impl Strategy<Value = Instruction> {
    let label = label_strategy(shape.transactions);
    let var = variable_strategy(shape.variables);
    let site = site_strategy(shape.sites);
    prop_oneof![
        3 => label.clone().prop_map(|txn| Instruction::Begin { txn }),
        1 => label.clone().prop_map(|txn| Instruction::BeginReadOnly { txn }),
        5 => (label.clone(), var.clone())
            .prop_map(|(txn, variable)| Instruction::Read { txn, variable }),
        5 => (label.clone(), var.clone(), value_strategy()).prop_map(|(txn, variable, value)| {
            Instruction::Write {
                txn,
                variable,
                value,
            }
        }),
        3 => label.prop_map(|txn| Instruction::End { txn }),
        1 => site.clone().prop_map(|site| Instruction::Fail { site }),
        1 => site.prop_map(|site| Instruction::Recover { site }),
        1 => var.prop_map(|v| Instruction::Dump(DumpTarget::Variable(v))),
    ]
}

/// Strategy for a script of `len` instructions.
pub fn script_strategy(
    shape: ScriptShape,
    len: impl Into<prop::collection::SizeRange>,
) -> impl Strategy<Value = Vec<Instruction>> {
    prop::collection::vec(instruction_strategy(shape), len)
}

/// How much work a property test does.
#[derive(Debug, Clone, Copy)]
pub struct PropertyBudget {
    /// Generated scripts per test.
    pub cases: u32,
    /// Upper bound on instructions per script.
    pub max_script_len: usize,
}

impl Default for PropertyBudget {
    fn default() -> Self {
        Self {
            cases: 128,
            max_script_len: 60,
        }
    }
}

impl PropertyBudget {
    /// Small budget for the default test run.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_script_len: 40,
        }
    }

    /// Large budget for soak runs.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_script_len: 200,
        }
    }

    /// Converts to a proptest configuration.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            ..ProptestConfig::default()
        }
    }
}

/// Renders instructions as script text, one per line.
pub fn render_script(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .map(|i| format!("{i}\n"))
        .collect()
}
