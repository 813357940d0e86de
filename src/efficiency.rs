//! Trigger efficiencies and their exact binomial confidence intervals

use crate::{
    histogram::{Binning, Hist1D, Hist2D},
    numeric::Real,
    Result,
};
use eyre::ensure;
use nalgebra::DMatrix;
use statrs::function::beta::inv_beta_reg;

/// Coverage of the error bars (one gaussian standard deviation)
pub const CONFIDENCE_LEVEL: Real = 0.682689492137;

/// Vertical range of efficiency plots
pub const DISPLAY_RANGE: (Real, Real) = (0., 1.2);

/// Central value and confidence interval of a binomial efficiency
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    /// passed / total
    pub central: Real,

    /// Lower bound
    pub low: Real,

    /// Upper bound
    pub high: Real,
}

/// Clopper-Pearson interval for `passed` successes out of `total` trials
pub fn clopper_pearson(passed: u64, total: u64, level: Real) -> Result<Interval> {
    ensure!(total > 0, "Efficiency of an empty sample is undefined");
    ensure!(
        passed <= total,
        "More passing events ({passed}) than events ({total})"
    );
    let alpha = 1. - level;
    let (k, n) = (passed as Real, total as Real);

    // Quantiles of the beta distribution
    let low = if passed == 0 {
        0.
    } else {
        inv_beta_reg(k, n - k + 1., alpha / 2.)
    };
    let high = if passed == total {
        1.
    } else {
        inv_beta_reg(k + 1., n - k, 1. - alpha / 2.)
    };
    Ok(Interval {
        central: k / n,
        low,
        high,
    })
}

/// Efficiency in one bin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EfficiencyPoint {
    /// Bin center
    pub x: Real,

    /// Bin edges
    pub x_range: (Real, Real),

    /// Efficiency and its interval
    pub value: Interval,
}

/// Efficiency as a function of one variable
#[derive(Clone, Debug, PartialEq)]
pub struct Efficiency1D {
    /// Title of the x axis
    pub x_title: String,

    /// Binning of the x axis
    pub binning: Binning,

    /// One point per bin with a non-empty denominator
    pub points: Vec<EfficiencyPoint>,
}
//
impl Efficiency1D {
    /// Divide a numerator by its denominator
    pub fn new(passed: &Hist1D, total: &Hist1D) -> Result<Self> {
        ensure!(
            passed.binning() == total.binning(),
            "Numerator and denominator binnings differ"
        );
        for (bin, (&k, &n)) in passed.counts().iter().zip(total.counts()).enumerate() {
            ensure!(k <= n, "Numerator exceeds denominator in bin {bin} ({k} > {n})");
        }

        let binning = total.binning();
        let mut points = Vec::new();
        for bin in 1..=binning.num_bins() {
            let n = total.count(bin);
            if n == 0 {
                continue;
            }
            points.push(EfficiencyPoint {
                x: binning.bin_center(bin),
                x_range: binning.bin_range(bin),
                value: clopper_pearson(passed.count(bin), n, CONFIDENCE_LEVEL)?,
            });
        }
        Ok(Self {
            x_title: total.x_title.clone(),
            binning: binning.clone(),
            points,
        })
    }
}

/// Efficiency as a function of two variables, central values only
#[derive(Clone, Debug, PartialEq)]
pub struct Efficiency2D {
    /// Title of the x axis
    pub x_title: String,

    /// Title of the y axis
    pub y_title: String,

    /// Binning of the x axis
    pub x_binning: Binning,

    /// Binning of the y axis
    pub y_binning: Binning,

    /// Efficiency of each in-range cell, None where the denominator is empty.
    /// Rows are x bins, columns are y bins, both starting from 0.
    pub values: DMatrix<Option<Real>>,
}
//
impl Efficiency2D {
    /// Divide a numerator map by its denominator
    pub fn new(passed: &Hist2D, total: &Hist2D) -> Result<Self> {
        ensure!(
            passed.x_binning() == total.x_binning() && passed.y_binning() == total.y_binning(),
            "Numerator and denominator binnings differ"
        );
        let (k, n) = (passed.counts(), total.counts());
        ensure!(
            k.iter().zip(n.iter()).all(|(k, n)| k <= n),
            "Numerator exceeds denominator in at least one cell"
        );

        let (nx, ny) = (total.x_binning().num_bins(), total.y_binning().num_bins());
        let values = DMatrix::from_fn(nx, ny, |ix, iy| {
            let cell = (ix + 1, iy + 1);
            (n[cell] > 0).then(|| k[cell] as Real / n[cell] as Real)
        });
        Ok(Self {
            x_title: total.x_title.clone(),
            y_title: total.y_title.clone(),
            x_binning: total.x_binning().clone(),
            y_binning: total.y_binning().clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Real, b: Real) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn half_efficiency() {
        let eff = clopper_pearson(50, 100, CONFIDENCE_LEVEL).unwrap();
        assert_eq!(eff.central, 0.5);
        assert!(eff.low < 0.5 && eff.high > 0.5);
        // Symmetric around one half
        assert!(close(eff.low, 1. - eff.high));
        // Roughly one binomial standard deviation
        assert!((eff.high - eff.low - 0.1).abs() < 0.01);
    }

    #[test]
    fn interval_edges() {
        let alpha = 1. - CONFIDENCE_LEVEL;
        let none = clopper_pearson(0, 10, CONFIDENCE_LEVEL).unwrap();
        assert_eq!(none.low, 0.);
        assert!(close(none.high, 1. - (alpha / 2.).powf(0.1)));

        let all = clopper_pearson(1, 1, CONFIDENCE_LEVEL).unwrap();
        assert_eq!(all.high, 1.);
        assert!(close(all.low, alpha / 2.));

        // Quantiles are exact, not bisected to a coarse grid
        let one = clopper_pearson(1, 10, CONFIDENCE_LEVEL).unwrap();
        assert!(close(one.low, 1. - (1. - alpha / 2.).powf(0.1)));

        assert!(clopper_pearson(0, 0, CONFIDENCE_LEVEL).is_err());
        assert!(clopper_pearson(3, 2, CONFIDENCE_LEVEL).is_err());
    }

    #[test]
    fn efficiency_curve() {
        let binning = Binning::variable(&[0., 10., 20., 40.]);
        let mut total = Hist1D::new("x", binning.clone());
        let mut passed = Hist1D::new("x", binning);
        for _ in 0..100 {
            total.fill(5.);
        }
        for _ in 0..50 {
            passed.fill(5.);
        }
        total.fill(30.);
        passed.fill(30.);
        total.fill(-1.);

        let eff = Efficiency1D::new(&passed, &total).unwrap();
        assert_eq!(eff.points.len(), 2);
        assert_eq!(eff.points[0].x, 5.);
        assert_eq!(eff.points[0].value.central, 0.5);
        assert_eq!(eff.points[1].x_range, (20., 40.));
        assert_eq!(eff.points[1].value.central, 1.);

        // Swapping numerator and denominator is inconsistent
        assert!(Efficiency1D::new(&total, &passed).is_err());
        let other = Hist1D::new("x", Binning::uniform(3, 0., 40.));
        assert!(Efficiency1D::new(&other, &total).is_err());
    }

    #[test]
    fn efficiency_map() {
        let make = || Hist2D::new("x", Binning::uniform(2, 0., 2.), "y", Binning::uniform(2, 0., 2.));
        let (mut total, mut passed) = (make(), make());
        for _ in 0..4 {
            total.fill(0.5, 1.5);
        }
        passed.fill(0.5, 1.5);
        let eff = Efficiency2D::new(&passed, &total).unwrap();
        assert_eq!(eff.values[(0, 1)], Some(0.25));
        assert_eq!(eff.values[(1, 1)], None);
        assert!(Efficiency2D::new(&total, &passed).is_err());
    }
}
