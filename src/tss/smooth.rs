//! Local-regression smoothing of the aggregate enrichment profile.

/// Smooths a series with local linear least-squares fits over tricube
/// neighborhood weights, evaluated at every input position. Non-finite
/// input values are excluded from the fits; a position with no usable
/// neighborhood stays NaN.
pub fn loess_smooth(values: &[f64], span: f64) -> Vec<f64> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, y)| y.is_finite())
        .map(|(i, &y)| (i as f64, y))
        .collect();
    if points.is_empty() {
        return vec![f64::NAN; values.len()];
    }

    let neighborhood = ((span * points.len() as f64).ceil() as usize)
        .clamp(2.min(points.len()), points.len());

    (0..values.len())
        .map(|i| fit_at(i as f64, &points, neighborhood))
        .collect()
}

fn fit_at(x0: f64, points: &[(f64, f64)], neighborhood: usize) -> f64 {
    // nearest `neighborhood` points by distance; points are sorted by x
    let mut distances: Vec<(f64, f64, f64)> = points
        .iter()
        .map(|&(x, y)| ((x - x0).abs(), x, y))
        .collect();
    distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    distances.truncate(neighborhood);

    let dmax = distances.last().unwrap().0;
    if dmax == 0.0 {
        return distances[0].2;
    }

    let mut w_sum = 0.0;
    let (mut wx, mut wy, mut wxx, mut wxy) = (0.0, 0.0, 0.0, 0.0);
    for &(d, x, y) in &distances {
        let u = (d / dmax).min(1.0);
        let w = (1.0 - u * u * u).powi(3);
        w_sum += w;
        wx += w * x;
        wy += w * y;
        wxx += w * x * x;
        wxy += w * x * y;
    }
    if w_sum == 0.0 {
        return f64::NAN;
    }

    let denom = w_sum * wxx - wx * wx;
    if denom.abs() < 1e-12 {
        return wy / w_sum;
    }
    let slope = (w_sum * wxy - wx * wy) / denom;
    let intercept = (wy - slope * wx) / w_sum;
    intercept + slope * x0
}
