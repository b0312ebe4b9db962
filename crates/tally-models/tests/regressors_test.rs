//! Every regressor behind the same capability, driven the way the pipeline drives it.

use approx::assert_relative_eq;
use ndarray::{Array1, Array2, Axis, s};
use rstest::rstest;
use tally_models::{
    FeedForwardNetwork, LinearRegression, MeanRegressor, ModelError, NetworkConfig, Regressor,
    SensitivityAnalyzer, SensitivityError, evaluate,
};

fn models() -> Vec<Box<dyn Regressor>> {
    vec![
        Box::new(MeanRegressor::new()),
        Box::new(LinearRegression::default()),
        Box::new(FeedForwardNetwork::with_config(NetworkConfig {
            hidden_layers: vec![8],
            max_epochs: 20,
            ..NetworkConfig::default()
        })),
    ]
}

/// Scaled-space table: holiday flag, one exogenous column, two lags.
fn table(rows: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((rows, 4), |(i, j)| match j {
        0 => {
            if i % 6 == 3 {
                1.0
            } else {
                0.0
            }
        }
        1 => (i as f64 * 0.37).sin().abs(),
        2 => i as f64 / rows as f64,
        _ => ((i * 7) % 11) as f64 / 11.0,
    });
    let y = x.map_axis(Axis(1), |r| 0.2 + 0.3 * r[1] + 0.4 * r[2] + 0.1 * r[0]);
    (x, y)
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
fn test_fit_predict_and_sensitivity(#[case] index: usize) {
    let mut model = models().remove(index);
    let (x, y) = table(30);
    let train_x = x.slice(s![..21, ..]).to_owned();
    let test_x = x.slice(s![21.., ..]).to_owned();
    let train_y = y.slice(s![..21]).to_owned();

    model.fit(&train_x, &train_y).unwrap();
    let predictions = model.predict(&test_x).unwrap();
    assert_eq!(predictions.len(), 9);

    let eval = evaluate(&y.slice(s![21..]).to_owned(), &predictions).unwrap();
    assert!(eval.rmse.is_finite());

    let analyzer = SensitivityAnalyzer::default();
    let profile = analyzer.profile(&model, &test_x).unwrap();
    assert_eq!(profile.len(), 3);
    assert!(profile.iter().all(|p| p.overall.is_finite()));
}

#[test]
fn test_mean_model_has_zero_sensitivity() {
    let (x, y) = table(20);
    let mut model = MeanRegressor::new();
    model.fit(&x, &y).unwrap();

    let profile = SensitivityAnalyzer::default().profile(&model, &x).unwrap();
    for entry in profile {
        assert_eq!(entry.overall, 0.0);
    }
}

#[test]
fn test_linear_sensitivity_matches_coefficient() {
    let (x, y) = table(40);
    let mut model = LinearRegression::default();
    model.fit(&x, &y).unwrap();

    let last = x.row(x.nrows() - 1).to_owned();
    let baseline = 0.2 + 0.3 * last[1] + 0.4 * last[2] + 0.1 * last[0];
    let expected = 0.3 * last[1] * 0.1 / baseline * 100.0;

    let pct = SensitivityAnalyzer::default().sensitivity(&model, &x, 1).unwrap();
    assert_relative_eq!(pct, expected, epsilon = 1e-6);
}

#[test]
fn test_unfitted_model_surfaces_model_error() {
    let model = LinearRegression::default();
    let (x, _) = table(5);
    let err = SensitivityAnalyzer::default().sensitivity(&model, &x, 1).unwrap_err();
    assert!(matches!(err, SensitivityError::Model(ModelError::NotFitted(_))));
}
