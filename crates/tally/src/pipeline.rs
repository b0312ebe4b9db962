//! Segment Pipeline
//!
//! Runs one (store, department) segment from raw panel rows to a
//! [`SensitivityRecord`]:
//!
//! ```text
//! extract -> window/join -> split -> scale -> fit -> evaluate -> sensitivity
//! ```
//!
//! The split is taken on the raw table and both sides are scaled with the same
//! fitted state, which is equivalent to scaling first because min/max scaling
//! acts row by row. Scalers and the regressor are created inside the call and
//! dropped when it returns.
//!
//! Sensitivities are measured on the scaled evaluation rows, in the scaled
//! target space the regressor was trained in.

use crate::config::{ConfigError, PipelineConfig};
use crate::models::{ModelFactory, RegressorFactory};
use crate::outcome::{
    ForecastPoint, ForecastReport, NamedSensitivity, RowCounts, SegmentOutcome,
    SensitivityRecord, SkipReason, SplitSide,
};
use ndarray::{Array1, Array2};
use std::fmt;
use std::sync::Arc;
use tally_data::{Panel, SegmentKey};
use tally_features::{
    Alignment, FeatureError, LagWindowConfig, LagWindower, MinMaxScaler, ScalerFit, ScalerState,
    SegmentFeatureBuilder, TARGET_COLUMN, TimeOrderedSplit,
};
use tally_models::{CancelFlag, Evaluation, Regressor, SensitivityAnalyzer, evaluate};
use tracing::{debug, info, warn};

/// Train/test halves in scaled space, plus what is needed to get back to sales units.
#[derive(Debug)]
struct ScaledSplit {
    train_x: Array2<f64>,
    test_x: Array2<f64>,
    train_y: Array1<f64>,
    actual_train: Array1<f64>,
    actual_test: Array1<f64>,
    target_scaler: ScalerState,
    boundary: usize,
}

/// Fitted model with real-scale predictions for both halves.
struct FittedSegment {
    model: Box<dyn Regressor>,
    train_predictions: Array1<f64>,
    test_predictions: Array1<f64>,
    train: Evaluation,
    test: Evaluation,
}

/// Per-segment forecasting and sensitivity pipeline.
#[derive(Clone)]
pub struct SegmentPipeline {
    config: PipelineConfig,
    factory: Arc<dyn RegressorFactory>,
    builder: SegmentFeatureBuilder,
    split: TimeOrderedSplit,
    analyzer: SensitivityAnalyzer,
}

impl fmt::Debug for SegmentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SegmentPipeline {
    /// Create a pipeline that asks `factory` for a fresh regressor per segment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: PipelineConfig,
        factory: impl RegressorFactory + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            builder: SegmentFeatureBuilder::new(config.lag_order),
            split: TimeOrderedSplit::new(config.test_ratio)?,
            analyzer: SensitivityAnalyzer::new(config.sensitivity.clone()),
            factory: Arc::new(factory),
            config,
        })
    }

    /// Create a pipeline using the model named in `config`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ConfigError> {
        let factory = ModelFactory::from_config(&config);
        Self::new(config, factory)
    }

    /// Current configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the sensitivity pipeline for one segment.
    ///
    /// Never fails: anything that stops the segment becomes
    /// [`SegmentOutcome::Skipped`] and is logged at `warn`.
    pub fn run_segment(&self, panel: &Panel, key: SegmentKey) -> SegmentOutcome {
        self.run_segment_until(panel, key, &CancelFlag::new())
    }

    /// [`Self::run_segment`], giving up once `cancel` is set.
    ///
    /// The flag is checked between stages and handed to
    /// [`Regressor::fit_until`], so a long fit stops early.
    pub fn run_segment_until(
        &self,
        panel: &Panel,
        key: SegmentKey,
        cancel: &CancelFlag,
    ) -> SegmentOutcome {
        match self.analyze(panel, key, cancel) {
            Ok(record) => {
                info!(
                    %key,
                    model = %record.model,
                    rows = record.rows.features,
                    test_rmse = record.test.rmse,
                    "segment completed"
                );
                SegmentOutcome::Completed(record)
            }
            Err(reason) => {
                warn!(%key, %reason, "segment skipped");
                SegmentOutcome::Skipped { key, reason }
            }
        }
    }

    /// One-step forecast of a segment from its own lagged sales only.
    ///
    /// Sales are windowed in the forecasting layout and the offset-0 column is
    /// discarded, so each row predicts week `t` from weeks `t-1 .. t-k`.
    ///
    /// # Errors
    /// Returns the [`SkipReason`] that stopped the segment.
    pub fn run_forecast(&self, panel: &Panel, key: SegmentKey) -> Result<ForecastReport, SkipReason> {
        let segment = panel.segment(key).ok_or(SkipReason::UnknownSegment)?;

        let windower = LagWindower::with_config(LagWindowConfig {
            lag_order: self.config.lag_order,
            alignment: Alignment::Forecasting,
        });
        let table = windower.window(TARGET_COLUMN, &segment.sales_series())?;
        let (x, y) = table.forecasting_pair();
        debug!(%key, rows = table.len(), lag_order = self.config.lag_order, "windowed sales");

        let scaled = self.scale_and_split(&x, &y)?;
        let fitted = self.fit_and_evaluate(&scaled, &CancelFlag::new())?;

        let points = table
            .dates()
            .iter()
            .zip(y.iter())
            .zip(fitted.train_predictions.iter().chain(fitted.test_predictions.iter()))
            .enumerate()
            .map(|(i, ((week, actual), predicted))| ForecastPoint {
                week: *week,
                side: if i < scaled.boundary {
                    SplitSide::Train
                } else {
                    SplitSide::Test
                },
                actual: *actual,
                predicted: *predicted,
            })
            .collect();

        info!(
            %key,
            model = fitted.model.name(),
            train_rmse = fitted.train.rmse,
            test_rmse = fitted.test.rmse,
            "forecast completed"
        );

        Ok(ForecastReport {
            key,
            model: fitted.model.name().to_string(),
            lag_order: self.config.lag_order,
            boundary: scaled.boundary,
            points,
            train: fitted.train,
            test: fitted.test,
        })
    }

    fn analyze(
        &self,
        panel: &Panel,
        key: SegmentKey,
        cancel: &CancelFlag,
    ) -> Result<SensitivityRecord, SkipReason> {
        let segment = panel.segment(key).ok_or(SkipReason::UnknownSegment)?;

        let features = self.builder.build(&segment)?;
        debug!(
            %key,
            weeks = segment.len(),
            rows = features.len(),
            windowed = features.windowed_rows,
            dropped = features.dropped_rows,
            "built feature table"
        );

        cancel.check()?;
        let scaled = self.scale_and_split(&features.features, &features.target)?;
        let fitted = self.fit_and_evaluate(&scaled, cancel)?;

        cancel.check()?;
        let profile = self
            .analyzer
            .profile(fitted.model.as_ref(), &scaled.test_x)
            .map_err(|e| SkipReason::from_sensitivity(e, &features.feature_names))?;

        let sensitivities = profile
            .into_iter()
            .map(|s| NamedSensitivity {
                feature: features
                    .feature_names
                    .get(s.feature)
                    .cloned()
                    .unwrap_or_else(|| format!("column {}", s.feature)),
                overall: s.overall,
                holiday: s.holiday,
            })
            .collect();

        Ok(SensitivityRecord {
            key,
            model: fitted.model.name().to_string(),
            sensitivities,
            train: fitted.train,
            test: fitted.test,
            rows: RowCounts {
                segment: segment.len(),
                features: features.len(),
                windowed: features.windowed_rows,
                dropped: features.dropped_rows,
                boundary: scaled.boundary,
            },
        })
    }

    fn scale_and_split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ScaledSplit, FeatureError> {
        let raw = self.split.split(x, y)?;

        let (feature_scaler, target_scaler) = match self.config.scaler_fit {
            ScalerFit::FullTable => (MinMaxScaler::fit(x)?, MinMaxScaler::fit_column(y)?),
            ScalerFit::TrainOnly => (
                MinMaxScaler::fit(&raw.train_x)?,
                MinMaxScaler::fit_column(&raw.train_y)?,
            ),
        };
        debug!(
            boundary = raw.boundary,
            rows = x.nrows(),
            fit = ?self.config.scaler_fit,
            "scaled and split"
        );

        Ok(ScaledSplit {
            train_x: feature_scaler.transform(&raw.train_x)?,
            test_x: feature_scaler.transform(&raw.test_x)?,
            train_y: target_scaler.transform_column(&raw.train_y)?,
            actual_train: raw.train_y,
            actual_test: raw.test_y,
            target_scaler,
            boundary: raw.boundary,
        })
    }

    fn fit_and_evaluate(
        &self,
        scaled: &ScaledSplit,
        cancel: &CancelFlag,
    ) -> Result<FittedSegment, SkipReason> {
        let mut model = self.factory.create();
        model.fit_until(&scaled.train_x, &scaled.train_y, cancel)?;
        debug!(model = model.name(), rows = scaled.train_x.nrows(), "fitted regressor");

        let train_predictions = scaled
            .target_scaler
            .invert_column(&model.predict(&scaled.train_x)?)?;
        let test_predictions = scaled
            .target_scaler
            .invert_column(&model.predict(&scaled.test_x)?)?;

        Ok(FittedSegment {
            train: evaluate(&scaled.actual_train, &train_predictions)?,
            test: evaluate(&scaled.actual_test, &test_predictions)?,
            model,
            train_predictions,
            test_predictions,
        })
    }
}
