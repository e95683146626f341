//! The polling control loop.
//!
//! Strictly sequential: query the metric, read the current size, decide,
//! mutate if needed, sleep. Every remote failure propagates out of the loop
//! and kills the process - restarts are the supervisor's job, not ours.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{app::ScalableTarget, config::Config, metric::MetricSource, scaler::ScaleDecision};

/// Fixed delay between iterations
const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct ControlLoop<M, T> {
    config: Config,
    metrics: M,
    target: T,
}

impl<M, T> ControlLoop<M, T>
where
    M: MetricSource,
    T: ScalableTarget,
{
    pub fn new(config: Config, metrics: M, target: T) -> Self {
        Self {
            config,
            metrics,
            target,
        }
    }

    /// Poll forever. Only returns with the error that should end the process.
    pub async fn run(&self) -> Result<()> {
        loop {
            self.tick().await?;

            debug!("sleeping for {} seconds", POLL_INTERVAL.as_secs());
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// One full iteration: query, decide, act.
    ///
    /// The size is read fresh on every tick rather than cached, so decisions
    /// never act on a stale count (and the status reporter stays current
    /// even while the metric sits between the thresholds).
    pub async fn tick(&self) -> Result<()> {
        let value = self
            .metrics
            .query()
            .await
            .context("failed to query the metric")?;

        info!("current value: {value}");

        let size = self
            .target
            .current_size()
            .await
            .context("failed to fetch the current app size")?;

        let decision = ScaleDecision::evaluate(
            value,
            self.config.threshold_up,
            self.config.threshold_down,
            size,
            self.config.max_size,
        );

        match decision {
            ScaleDecision::Up => {
                info!("scaling up to {}", size + 1);
                self.target
                    .set_size(size + 1)
                    .await
                    .context("failed to update the app size")?;
            }
            ScaleDecision::Down => {
                info!("scaling down to {}", size - 1);
                self.target
                    .set_size(size - 1)
                    .await
                    .context("failed to update the app size")?;
            }
            ScaleDecision::AtMax => info!("already at maximum size"),
            ScaleDecision::AtMin => info!("already at minimum size"),
            ScaleDecision::Hold => debug!("within thresholds, nothing to do"),
        }

        Ok(())
    }
}
