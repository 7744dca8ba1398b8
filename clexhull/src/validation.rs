// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail harness for the validation binary.
//!
//! Each check records what was observed and what was required; `finish`
//! prints the tally and exits 0 only if every check passed.

use std::collections::BTreeSet;
use std::fmt;
use std::process;

/// What a check compared.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckKind {
    /// |observed − expected| ≤ tolerance
    Absolute {
        observed: f64,
        expected: f64,
        tolerance: f64,
    },
    /// observed ≤ bound
    Upper { observed: f64, bound: f64 },
    /// observed ≥ bound
    Lower { observed: f64, bound: f64 },
    /// A condition that must hold
    Condition,
    /// Two index sets must be equal
    IndexSet {
        observed: Vec<usize>,
        expected: Vec<usize>,
    },
    /// An operation was expected to fail with a named error
    ExpectedError { detail: String },
}

/// One recorded check.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub label: String,
    pub passed: bool,
    pub kind: CheckKind,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = if self.passed { "✓" } else { "✗" };
        write!(f, "  {icon} {}: ", self.label)?;
        match &self.kind {
            CheckKind::Absolute {
                observed,
                expected,
                tolerance,
            } => write!(f, "{observed:.6e} vs {expected:.6e} (tol {tolerance:.1e})"),
            CheckKind::Upper { observed, bound } => write!(f, "{observed:.6e} ≤ {bound:.6e}"),
            CheckKind::Lower { observed, bound } => write!(f, "{observed:.6e} ≥ {bound:.6e}"),
            CheckKind::Condition => write!(f, "{}", if self.passed { "holds" } else { "violated" }),
            CheckKind::IndexSet { observed, expected } => {
                write!(f, "{observed:?} vs {expected:?}")
            }
            CheckKind::ExpectedError { detail } => write!(f, "{detail}"),
        }
    }
}

/// Accumulates checks for one validation run.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    pub name: String,
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, passed: bool, kind: CheckKind) {
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            kind,
        });
    }

    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = (observed - expected).abs() <= tolerance;
        self.push(
            label,
            passed,
            CheckKind::Absolute {
                observed,
                expected,
                tolerance,
            },
        );
    }

    pub fn check_upper(&mut self, label: &str, observed: f64, bound: f64) {
        self.push(label, observed <= bound, CheckKind::Upper { observed, bound });
    }

    pub fn check_lower(&mut self, label: &str, observed: f64, bound: f64) {
        self.push(label, observed >= bound, CheckKind::Lower { observed, bound });
    }

    pub fn check_bool(&mut self, label: &str, passed: bool) {
        self.push(label, passed, CheckKind::Condition);
    }

    /// Order-insensitive comparison of index sets.
    pub fn check_indices(&mut self, label: &str, observed: &[usize], expected: &[usize]) {
        let a: BTreeSet<usize> = observed.iter().copied().collect();
        let b: BTreeSet<usize> = expected.iter().copied().collect();
        self.push(
            label,
            a == b,
            CheckKind::IndexSet {
                observed: a.into_iter().collect(),
                expected: b.into_iter().collect(),
            },
        );
    }

    /// Record that `result` failed and `is_expected` accepts the error.
    pub fn check_err<T, E: fmt::Display>(
        &mut self,
        label: &str,
        result: &Result<T, E>,
        is_expected: impl Fn(&E) -> bool,
    ) {
        let (passed, detail) = match result {
            Ok(_) => (false, "succeeded, expected an error".to_string()),
            Err(e) => (is_expected(e), e.to_string()),
        };
        self.push(label, passed, CheckKind::ExpectedError { detail });
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Tally line followed by one line per check.
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write;
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {}: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        for check in &self.checks {
            let _ = writeln!(s, "{check}");
        }
        s
    }

    /// Print the summary and exit: 0 if everything passed, 1 otherwise.
    pub fn finish(&self) -> ! {
        println!();
        print!("{}", self.summary());
        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        }
        let failed: Vec<&str> = self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.label.as_str())
            .collect();
        println!("FAILED CHECKS: {}", failed.join(", "));
        process::exit(1);
    }
}
