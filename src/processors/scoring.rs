//! Regression scores for capacity predictions.

use thiserror::Error;

/// Errors that can occur while scoring.
#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("length mismatch: y_true has {truth} values, y_pred has {pred}")]
    LengthMismatch { truth: usize, pred: usize },

    #[error("cannot score an empty sample")]
    Empty,
}

fn check(y_true: &[f64], y_pred: &[f64]) -> Result<(), ScoreError> {
    if y_true.len() != y_pred.len() {
        return Err(ScoreError::LengthMismatch {
            truth: y_true.len(),
            pred: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(ScoreError::Empty);
    }
    Ok(())
}

/// Coefficient of determination, `1 - SSres / SStot`.
///
/// Returns exactly `0.0` when the targets have zero total variance.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64, ScoreError> {
    check(y_true, y_pred)?;

    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_total: f64 = y_true.iter().map(|&t| (t - mean).powi(2)).sum();
    let ss_residual: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();

    if ss_total == 0.0 {
        return Ok(0.0);
    }
    Ok(1.0 - ss_residual / ss_total)
}

/// Root mean squared error.
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Result<f64, ScoreError> {
    check(y_true, y_pred)?;

    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

/// Root mean squared error relative to the true value, `sqrt(mean(((t - p) / t)^2))`.
pub fn relative_rmse(y_true: &[f64], y_pred: &[f64]) -> Result<f64, ScoreError> {
    check(y_true, y_pred)?;

    let msre = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| ((t - p) / t).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(msre.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2_perfect() {
        let y = vec![1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &y), Ok(1.0));
    }

    #[test]
    fn test_r2_mean_prediction_is_zero() {
        let y = vec![1.0, 2.0, 3.0];
        let pred = vec![2.0, 2.0, 2.0];
        assert_eq!(r2_score(&y, &pred), Ok(0.0));
    }

    #[test]
    fn test_r2_zero_variance_returns_zero() {
        let y = vec![5.0, 5.0, 5.0];
        let pred = vec![1.0, 9.0, 4.0];
        assert_eq!(r2_score(&y, &pred), Ok(0.0));
    }

    #[test]
    fn test_r2_can_be_negative() {
        let y = vec![1.0, 2.0, 3.0];
        let pred = vec![3.0, 2.0, 1.0];
        assert_eq!(r2_score(&y, &pred), Ok(-3.0));
    }

    #[test]
    fn test_rmse() {
        let y = vec![0.0, 0.0];
        let pred = vec![3.0, 4.0];
        let expected = (12.5f64).sqrt();
        assert!((rmse(&y, &pred).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_relative_rmse() {
        let y = vec![100.0, 200.0];
        let pred = vec![110.0, 180.0];
        // relative errors 0.1 and 0.1
        assert!((relative_rmse(&y, &pred).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            r2_score(&[1.0], &[1.0, 2.0]),
            Err(ScoreError::LengthMismatch { truth: 1, pred: 2 })
        );
        assert_eq!(rmse(&[], &[]), Err(ScoreError::Empty));
    }
}
