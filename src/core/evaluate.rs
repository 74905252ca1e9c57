//! Accuracy assessment on the held-out partition

use crate::core::sampling::SampleTable;
use crate::core::svm::SvmModel;
use crate::types::{ClassCode, LandcoverError, LandcoverResult};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Square count matrix over a fixed class order.
///
/// `counts[[i, j]]` is the number of samples of true class `classes[i]`
/// predicted as `classes[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    classes: Vec<ClassCode>,
    counts: Array2<u64>,
}

impl ConfusionMatrix {
    pub fn from_predictions(
        classes: &[ClassCode],
        actual: &[ClassCode],
        predicted: &[ClassCode],
    ) -> LandcoverResult<Self> {
        if actual.len() != predicted.len() {
            return Err(LandcoverError::InvalidParameter(format!(
                "{} actual labels but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }
        if actual.is_empty() {
            return Err(LandcoverError::EmptyCollection(
                "no test samples to evaluate".to_string(),
            ));
        }

        let position = |code: ClassCode| {
            classes.iter().position(|c| *c == code).ok_or_else(|| {
                LandcoverError::InvalidParameter(format!("class {} not in {:?}", code, classes))
            })
        };

        let n = classes.len();
        let mut counts = Array2::<u64>::zeros((n, n));
        for (a, p) in actual.iter().zip(predicted) {
            counts[[position(*a)?, position(*p)?]] += 1;
        }

        Ok(Self {
            classes: classes.to_vec(),
            counts,
        })
    }

    pub fn classes(&self) -> &[ClassCode] {
        &self.classes
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    pub fn get(&self, actual: ClassCode, predicted: ClassCode) -> Option<u64> {
        let i = self.classes.iter().position(|c| *c == actual)?;
        let j = self.classes.iter().position(|c| *c == predicted)?;
        Some(self.counts[[i, j]])
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    pub fn trace(&self) -> u64 {
        self.counts.diag().sum()
    }

    /// Samples per true class
    pub fn row_sums(&self) -> Array1<u64> {
        self.counts.sum_axis(Axis(1))
    }

    /// Samples per predicted class
    pub fn column_sums(&self) -> Array1<u64> {
        self.counts.sum_axis(Axis(0))
    }

    /// Overall accuracy, trace / total
    pub fn accuracy(&self) -> f64 {
        ratio(self.trace(), self.total())
    }

    /// Cohen's kappa
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let observed = self.accuracy();
        let expected: f64 = self
            .row_sums()
            .iter()
            .zip(self.column_sums().iter())
            .map(|(r, c)| (*r as f64) * (*c as f64))
            .sum::<f64>()
            / (total * total);

        if (1.0 - expected).abs() < f64::EPSILON {
            1.0
        } else {
            (observed - expected) / (1.0 - expected)
        }
    }

    /// Per-class recall: correct / row total
    pub fn producers_accuracy(&self) -> Vec<f64> {
        let rows = self.row_sums();
        (0..self.classes.len())
            .map(|i| ratio(self.counts[[i, i]], rows[i]))
            .collect()
    }

    /// Per-class precision: correct / column total
    pub fn consumers_accuracy(&self) -> Vec<f64> {
        let columns = self.column_sums();
        (0..self.classes.len())
            .map(|j| ratio(self.counts[[j, j]], columns[j]))
            .collect()
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "actual")?;
        for class in &self.classes {
            write!(f, "{:>7}", class)?;
        }
        writeln!(f)?;
        for (i, class) in self.classes.iter().enumerate() {
            write!(f, "{:>8}", class)?;
            for j in 0..self.classes.len() {
                write!(f, "{:>7}", self.counts[[i, j]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Diagnostics of one trained model on the test partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyAssessment {
    pub classes: Vec<ClassCode>,
    /// Row-major confusion counts, rows = true class
    pub confusion_matrix: Vec<Vec<u64>>,
    pub overall_accuracy: f64,
    pub kappa: f64,
    pub producers_accuracy: Vec<f64>,
    pub consumers_accuracy: Vec<f64>,
    pub test_samples: u64,
}

impl From<&ConfusionMatrix> for AccuracyAssessment {
    fn from(matrix: &ConfusionMatrix) -> Self {
        Self {
            classes: matrix.classes().to_vec(),
            confusion_matrix: matrix
                .counts()
                .outer_iter()
                .map(|row| row.to_vec())
                .collect(),
            overall_accuracy: matrix.accuracy(),
            kappa: matrix.kappa(),
            producers_accuracy: matrix.producers_accuracy(),
            consumers_accuracy: matrix.consumers_accuracy(),
            test_samples: matrix.total(),
        }
    }
}

/// Evaluates a model against held-out samples
pub struct Evaluator;

impl Evaluator {
    /// Confusion matrix of `model` on `testing` over `classes`
    pub fn confusion_matrix(
        model: &SvmModel,
        testing: &SampleTable,
        classes: &[ClassCode],
    ) -> LandcoverResult<ConfusionMatrix> {
        if testing.is_empty() {
            return Err(LandcoverError::EmptyCollection(
                "test partition is empty".to_string(),
            ));
        }
        let predicted = model.predict_table(testing)?;
        let actual: Vec<ClassCode> = testing.rows.iter().map(|r| r.class_code).collect();
        ConfusionMatrix::from_predictions(classes, &actual, &predicted)
    }

    /// Full assessment, logged at info level
    pub fn assess(model: &SvmModel, testing: &SampleTable, classes: &[ClassCode]) -> LandcoverResult<AccuracyAssessment> {
        log::info!("Evaluating model on {} test samples", testing.len());
        let matrix = Self::confusion_matrix(model, testing, classes)?;
        let assessment = AccuracyAssessment::from(&matrix);

        log::info!("Confusion matrix:\n{}", matrix);
        log::info!(
            "Overall accuracy {:.4}, kappa {:.4}",
            assessment.overall_accuracy,
            assessment.kappa
        );
        log::info!("Producer's accuracy: {:?}", assessment.producers_accuracy);
        log::info!("Consumer's accuracy: {:?}", assessment.consumers_accuracy);
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix() -> ConfusionMatrix {
        // Rows: true 1, 2, 3
        let actual = [1, 1, 1, 1, 2, 2, 2, 3, 3, 3];
        let predicted = [1, 1, 1, 2, 2, 2, 3, 3, 3, 1];
        ConfusionMatrix::from_predictions(&[1, 2, 3], &actual, &predicted).unwrap()
    }

    #[test]
    fn test_trace_total_and_accuracy() {
        let m = matrix();
        assert_eq!(m.total(), 10);
        assert_eq!(m.trace(), 7);
        assert_relative_eq!(m.accuracy(), 0.7);
        assert_eq!(m.get(1, 2), Some(1));
        assert_eq!(m.get(3, 1), Some(1));
        assert_eq!(m.row_sums().to_vec(), vec![4, 3, 3]);
        assert_eq!(m.column_sums().to_vec(), vec![4, 3, 3]);
    }

    #[test]
    fn test_kappa() {
        let m = matrix();
        // pe = (4*4 + 3*3 + 3*3) / 100
        let pe = 0.34;
        assert_relative_eq!(m.kappa(), (0.7 - pe) / (1.0 - pe), epsilon = 1e-12);
    }

    #[test]
    fn test_per_class_accuracies() {
        let m = matrix();
        let producers = m.producers_accuracy();
        assert_relative_eq!(producers[0], 0.75);
        assert_relative_eq!(producers[1], 2.0 / 3.0);
        let consumers = m.consumers_accuracy();
        assert_relative_eq!(consumers[0], 0.75);
        assert_relative_eq!(consumers[2], 2.0 / 3.0);
    }

    #[test]
    fn test_zero_denominators_and_perfect_agreement() {
        let m = ConfusionMatrix::from_predictions(&[0, 5], &[0, 0], &[0, 0]).unwrap();
        assert_eq!(m.producers_accuracy(), vec![1.0, 0.0]);
        assert_eq!(m.consumers_accuracy(), vec![1.0, 0.0]);
        assert_eq!(m.kappa(), 1.0);
    }

    #[test]
    fn test_empty_and_unknown_inputs() {
        assert!(matches!(
            ConfusionMatrix::from_predictions(&[1, 2], &[], &[]),
            Err(LandcoverError::EmptyCollection(_))
        ));
        assert!(ConfusionMatrix::from_predictions(&[1, 2], &[1], &[7]).is_err());
        assert!(ConfusionMatrix::from_predictions(&[1, 2], &[1, 2], &[1]).is_err());
    }

    #[test]
    fn test_assessment_serializes() {
        let assessment = AccuracyAssessment::from(&matrix());
        let json = serde_json::to_string(&assessment).unwrap();
        assert!(json.contains("\"kappa\""));
        assert_eq!(assessment.confusion_matrix[0], vec![3, 1, 0]);
    }
}
