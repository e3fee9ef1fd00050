//! Diverging stacked-bar layout of a transition summary
//!
//! One horizontal bar per destination group. Each origin group is a series;
//! its gains stack rightwards from zero and its losses leftwards, each
//! series starting where the previous ones ended.

use crate::landcover::taxonomy::ClassTaxonomy;
use crate::landcover::transitions::{Epochs, TransitionSummary};
use serde::Serialize;
use soilcarbon_colormap::Rgb;
use soilcarbon_core::Result;

pub const X_LABEL: &str = "SOC stock change (t C/ha)";

/// One origin group across every bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: String,
    pub color: Rgb,
    /// Per category, bottom to top; zero where the series has no loss/gain
    pub positive: Vec<f64>,
    pub negative: Vec<f64>,
    /// Where each segment starts
    pub positive_left: Vec<f64>,
    pub negative_left: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergingChart {
    /// Destination groups, bottom bar first
    pub categories: Vec<String>,
    pub series: Vec<ChartSeries>,
    pub x_label: String,
    pub y_label: String,
    pub legend_title: String,
}

impl DivergingChart {
    /// Lay out `summary`. Bars run bottom to top in reverse summary order,
    /// so the destination with the largest total is drawn at the bottom.
    /// Series follow the taxonomy's group order.
    pub fn from_summary(
        summary: &TransitionSummary,
        taxonomy: &ClassTaxonomy,
        epochs: Epochs,
    ) -> Result<Self> {
        let categories: Vec<String> = summary.destinations().rev().map(String::from).collect();

        let mut labels: Vec<&str> = Vec::new();
        for entry in summary.entries() {
            for (origin, _) in &entry.origins {
                if !labels.contains(&origin.as_str()) {
                    labels.push(origin);
                }
            }
        }
        labels.sort_by_key(|l| taxonomy.group_rank(l).unwrap_or(usize::MAX));

        let n = categories.len();
        let mut pos_offset = vec![0.0; n];
        let mut neg_offset = vec![0.0; n];
        let mut series = Vec::with_capacity(labels.len());

        for label in labels {
            let mut positive = vec![0.0; n];
            let mut negative = vec![0.0; n];
            for (i, category) in categories.iter().enumerate() {
                if let Some(value) = summary.get(category, label) {
                    if value > 0.0 {
                        positive[i] = value;
                    } else {
                        negative[i] = value;
                    }
                }
            }

            series.push(ChartSeries {
                label: label.to_string(),
                color: taxonomy.group_color(label)?,
                positive_left: pos_offset.clone(),
                negative_left: neg_offset.clone(),
                positive: positive.clone(),
                negative: negative.clone(),
            });

            for i in 0..n {
                pos_offset[i] += positive[i];
                neg_offset[i] += negative[i];
            }
        }

        Ok(Self {
            categories,
            series,
            x_label: X_LABEL.to_string(),
            y_label: format!("Land Cover {}", epochs.after),
            legend_title: format!("Land Cover {}", epochs.before),
        })
    }

    /// Extent of the stacked bars as (most negative, most positive)
    pub fn x_extent(&self) -> (f64, f64) {
        let (mut lo, mut hi) = (0.0f64, 0.0f64);
        for s in &self.series {
            for i in 0..self.categories.len() {
                lo = lo.min(s.negative_left[i] + s.negative[i]);
                hi = hi.max(s.positive_left[i] + s.positive[i]);
            }
        }
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landcover::transitions::{aggregate, EpochLayers, RasterPair};
    use approx::assert_relative_eq;
    use soilcarbon_core::Raster;

    fn summary() -> TransitionSummary {
        // Cropland: +4 from Tree cover, -2 from Grassland
        // Urban areas: -6 from Cropland, +1 from Tree cover
        let before = EpochLayers::new(
            Raster::from_vec(vec![10.0, 10.0, 10.0, 10.0], 1, 4).unwrap(),
            Raster::from_vec(vec![50, 130, 10, 50], 1, 4).unwrap(),
        );
        let after = EpochLayers::new(
            Raster::from_vec(vec![14.0, 8.0, 4.0, 11.0], 1, 4).unwrap(),
            Raster::from_vec(vec![10, 10, 190, 190], 1, 4).unwrap(),
        );
        let pair = RasterPair::new(Epochs::default(), before, after).unwrap();
        aggregate(&pair, &ClassTaxonomy::esa_cci()).unwrap()
    }

    #[test]
    fn test_categories_bottom_to_top() {
        let s = summary();
        let order: Vec<&str> = s.destinations().collect();
        assert_eq!(order, vec!["Urban areas", "Cropland"]);

        let chart =
            DivergingChart::from_summary(&s, &ClassTaxonomy::esa_cci(), Epochs::default())
                .unwrap();
        assert_eq!(chart.categories, vec!["Cropland", "Urban areas"]);
        assert_eq!(chart.y_label, "Land Cover 2018");
        assert_eq!(chart.legend_title, "Land Cover 2000");
        assert_eq!(chart.x_label, X_LABEL);
    }

    #[test]
    fn test_series_stack_cumulatively() {
        let chart =
            DivergingChart::from_summary(&summary(), &ClassTaxonomy::esa_cci(), Epochs::default())
                .unwrap();
        let labels: Vec<&str> = chart.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Cropland", "Tree cover", "Grassland"]);

        let cropland = &chart.series[0];
        assert_eq!(cropland.color, Rgb::from_u32(0xffff64));
        assert_eq!(cropland.negative, vec![0.0, -6.0]);

        let tree = &chart.series[1];
        // Tree cover -> Cropland +4, Tree cover -> Urban +1
        assert_eq!(tree.positive, vec![4.0, 1.0]);
        assert_eq!(tree.negative_left, vec![0.0, -6.0]);

        let grass = &chart.series[2];
        assert_eq!(grass.negative, vec![-2.0, 0.0]);
        assert_eq!(grass.positive_left, vec![4.0, 1.0]);
        assert_eq!(grass.negative_left, vec![0.0, -6.0]);

        let (lo, hi) = chart.x_extent();
        assert_relative_eq!(lo, -6.0);
        assert_relative_eq!(hi, 4.0);
    }

    #[test]
    fn test_empty_summary_gives_empty_chart() {
        let chart = DivergingChart::from_summary(
            &TransitionSummary::default(),
            &ClassTaxonomy::esa_cci(),
            Epochs::default(),
        )
        .unwrap();
        assert!(chart.categories.is_empty());
        assert!(chart.series.is_empty());
        assert_eq!(chart.x_extent(), (0.0, 0.0));
    }
}
