#![allow(missing_docs)]

use crate::summary::{mean, sum_sq_dev};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

/// Alternative hypothesis of a t-test, stated for `mean(a) - mean(b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alternative {
    TwoSided,
    Less,
    Greater,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTestResult {
    pub statistic: f64,
    pub pvalue: f64,
}

impl TTestResult {
    const UNDEFINED: TTestResult = TTestResult {
        statistic: f64::NAN,
        pvalue: f64::NAN,
    };
}

/// Two-sample Student t-test assuming equal variances.
pub fn ttest_ind(a: &[f64], b: &[f64], alternative: Alternative) -> TTestResult {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let df = n1 + n2 - 2.0;
    if a.is_empty() || b.is_empty() || df <= 0.0 {
        return TTestResult::UNDEFINED;
    }
    let diff = mean(a) - mean(b);
    let pooled = (sum_sq_dev(a) + sum_sq_dev(b)) / df;
    let se = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();

    if se > 0.0 {
        let statistic = diff / se;
        let Ok(dist) = StudentsT::new(0.0, 1.0, df) else {
            return TTestResult::UNDEFINED;
        };
        let pvalue = match alternative {
            Alternative::Less => dist.cdf(statistic),
            Alternative::Greater => dist.sf(statistic),
            Alternative::TwoSided => (2.0 * dist.sf(statistic.abs())).min(1.0),
        };
        TTestResult { statistic, pvalue }
    } else if diff == 0.0 {
        TTestResult::UNDEFINED
    } else {
        // both samples are constant but their means differ
        let statistic = diff.signum() * f64::INFINITY;
        let pvalue = match alternative {
            Alternative::Less => (diff > 0.0) as u8 as f64,
            Alternative::Greater => (diff < 0.0) as u8 as f64,
            Alternative::TwoSided => 0.0,
        };
        TTestResult { statistic, pvalue }
    }
}

/// Upper tail of the chi-squared distribution.
pub fn chi2_sf(x: f64, df: f64) -> f64 {
    ChiSquared::new(df).map_or(f64::NAN, |dist| dist.sf(x))
}

/// Two-sided p-value of a standard normal z statistic.
pub fn normal_two_sided_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    Normal::new(0.0, 1.0).map_or(f64::NAN, |dist| 2.0 * dist.sf(z.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_ttest_against_scipy() {
        // scipy.stats.ttest_ind([1, 2, 3, 4], [2, 4, 6, 8])
        //   statistic=-1.7320508075688772, pvalue=0.13397459621556135
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let two = ttest_ind(&a, &b, Alternative::TwoSided);
        assert!(close(two.statistic, -1.732_050_807_568_877_2, 1e-9));
        assert!(close(two.pvalue, 0.133_974_596_215_561_35, 1e-6));

        let less = ttest_ind(&a, &b, Alternative::Less);
        let greater = ttest_ind(&a, &b, Alternative::Greater);
        assert!(close(less.pvalue, two.pvalue / 2.0, 1e-6));
        assert!(close(less.pvalue + greater.pvalue, 1.0, 1e-9));
    }

    #[test]
    fn test_ttest_constant_samples() {
        let same = ttest_ind(&[1.0, 1.0], &[1.0, 1.0], Alternative::Less);
        assert!(same.statistic.is_nan() && same.pvalue.is_nan());

        let apart = ttest_ind(&[2.0, 2.0], &[1.0, 1.0], Alternative::Greater);
        assert_eq!(apart.statistic, f64::INFINITY);
        assert_eq!(apart.pvalue, 0.0);
        let apart = ttest_ind(&[2.0, 2.0], &[1.0, 1.0], Alternative::Less);
        assert_eq!(apart.pvalue, 1.0);
    }

    #[test]
    fn test_ttest_too_small() {
        assert!(ttest_ind(&[1.0], &[2.0], Alternative::TwoSided)
            .pvalue
            .is_nan());
        assert!(ttest_ind(&[], &[2.0, 3.0], Alternative::TwoSided)
            .pvalue
            .is_nan());
    }

    #[test]
    fn test_tails() {
        // scipy.stats.chi2.sf(3.84, 1) ~= 0.05004
        assert!(close(chi2_sf(3.84, 1.0), 0.050_043, 1e-4));
        assert!(close(normal_two_sided_p(1.959_964), 0.05, 1e-5));
        assert!(close(normal_two_sided_p(0.0), 1.0, 1e-12));
    }
}
