//! Formula evaluation.
//!
//! A formula is `=` followed by either one of the whole-grid aggregates
//! (`SUM`, `AVG`, `MAX`, `MIN`, matched case-insensitively by prefix) or a
//! plain arithmetic expression handled by [`super::expr`]. Evaluation is a
//! pure function of the formula text and a matrix.

use thiserror::Error;

use super::cell_ref::CellRef;
use super::expr::{MAX_DEPTH, eval_arithmetic};
use super::matrix::Matrix;

/// Why a formula could not produce a number.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("empty formula")]
    Empty,

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected '{found}' at {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("formula nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Whole-grid aggregate functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Avg,
    Max,
    Min,
}

impl Aggregate {
    const ALL: [(&'static str, Aggregate); 4] = [
        ("SUM", Aggregate::Sum),
        ("AVG", Aggregate::Avg),
        ("MAX", Aggregate::Max),
        ("MIN", Aggregate::Min),
    ];

    /// Detect an aggregate by prefix, ignoring case. `=sum(anything)` is still SUM.
    pub fn detect(body: &str) -> Option<Aggregate> {
        let head = body.get(..3)?;
        Self::ALL
            .iter()
            .find(|(name, _)| head.eq_ignore_ascii_case(name))
            .map(|(_, agg)| *agg)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Max => "MAX",
            Aggregate::Min => "MIN",
        }
    }

    /// Apply to a stream of values. Empty input yields 0.0 for every aggregate.
    pub fn apply(&self, values: impl Iterator<Item = f64>) -> f64 {
        match self {
            Aggregate::Sum => values.sum(),
            Aggregate::Avg => {
                let (total, count) = values.fold((0.0, 0usize), |(t, n), v| (t + v, n + 1));
                if count == 0 { 0.0 } else { total / count as f64 }
            }
            Aggregate::Max => values.reduce(f64::max).unwrap_or(0.0),
            Aggregate::Min => values.reduce(f64::min).unwrap_or(0.0),
        }
    }
}

/// Strip the leading `=` and surrounding whitespace from formula text.
pub fn formula_body(formula: &str) -> &str {
    let trimmed = formula.trim();
    trimmed.strip_prefix('=').unwrap_or(trimmed).trim()
}

fn finish(value: f64) -> Result<f64, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}

/// Evaluate formula text against the whole matrix.
pub fn evaluate(formula: &str, matrix: &Matrix) -> Result<f64, EvalError> {
    let body = formula_body(formula);
    match Aggregate::detect(body) {
        Some(agg) => finish(agg.apply(matrix.iter())),
        None => eval_arithmetic(body),
    }
}

/// Evaluate formula text that lives at `at`. Aggregates skip that cell so a
/// formula never reads its own previous result.
pub fn evaluate_at(formula: &str, matrix: &Matrix, at: CellRef) -> Result<f64, EvalError> {
    let body = formula_body(formula);
    match Aggregate::detect(body) {
        Some(agg) => finish(agg.apply(matrix.iter_excluding(at))),
        None => eval_arithmetic(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Matrix {
        Matrix::from_vec(2, 3, vec![1.0, -2.0, 3.0, 4.0, 10.0, -6.0]).unwrap()
    }

    #[test]
    fn test_aggregates() {
        let m = sample();
        assert_eq!(evaluate("=SUM", &m), Ok(10.0));
        assert_eq!(evaluate("=AVG", &m), Ok(10.0 / 6.0));
        assert_eq!(evaluate("=MAX", &m), Ok(10.0));
        assert_eq!(evaluate("=MIN", &m), Ok(-6.0));
    }

    #[test]
    fn test_aggregates_case_insensitive_prefix() {
        let m = sample();
        assert_eq!(evaluate("=sum", &m), Ok(10.0));
        assert_eq!(evaluate("= Max(A1:B2)", &m), Ok(10.0));
        assert_eq!(evaluate("=avgerage", &m), Ok(10.0 / 6.0));
    }

    #[test]
    fn test_aggregates_on_zero_grid() {
        let m = Matrix::zeros(50, 26);
        for f in ["=SUM", "=AVG", "=MAX", "=MIN"] {
            assert_eq!(evaluate(f, &m), Ok(0.0), "{f}");
        }
    }

    #[test]
    fn test_aggregates_on_empty_matrix() {
        let m = Matrix::zeros(0, 0);
        for f in ["=SUM", "=AVG", "=MAX", "=MIN"] {
            assert_eq!(evaluate(f, &m), Ok(0.0), "{f}");
        }
    }

    #[test]
    fn test_evaluate_at_excludes_own_cell() {
        let mut m = sample();
        m.set(CellRef::new(1, 1), 1000.0);
        assert_eq!(evaluate_at("=SUM", &m, CellRef::new(1, 1)), Ok(0.0));
        assert_eq!(evaluate_at("=MAX", &m, CellRef::new(1, 1)), Ok(4.0));
        assert_eq!(evaluate_at("=AVG", &m, CellRef::new(1, 1)), Ok(0.0));
        assert_eq!(evaluate_at("=2*3", &m, CellRef::new(1, 1)), Ok(6.0));
    }

    #[test]
    fn test_arithmetic_fallback() {
        let m = sample();
        assert_eq!(evaluate("=(2 + 3) * 4", &m), Ok(20.0));
        assert_eq!(evaluate("=1/0", &m), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("=", &m), Err(EvalError::Empty));
    }

    #[test]
    fn test_host_access_is_rejected() {
        let m = sample();
        for hostile in [
            "=__import__('os').system('rm -rf /')",
            "=open('/etc/passwd').read()",
            "=exec(\"print(1)\")",
            "=std::process::exit(1)",
            "=1; 2",
            "=[1,2].len()",
        ] {
            assert!(evaluate(hostile, &m).is_err(), "{hostile}");
        }
    }

    #[test]
    fn test_non_finite_aggregate_is_error() {
        let m = Matrix::from_vec(1, 2, vec![f64::MAX, f64::MAX]).unwrap();
        assert_eq!(evaluate("=SUM", &m), Err(EvalError::NonFinite));
    }
}
