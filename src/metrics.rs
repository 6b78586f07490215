use crate::source::Source;
use crate::Error;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tokio::time::Instant;

#[derive(Clone)]
pub struct Metrics {
    pub syntheses: IntCounter,
    pub failures: IntCounterVec,
    pub synthesis_duration: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let synthesis_duration = HistogramVec::new(
            histogram_opts!(
                "naiserator_synthesis_duration_seconds",
                "The duration of resource synthesis to complete in seconds"
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.25, 0.5, 1., 5., 15.]),
            &["kind"],
        )
        .unwrap();
        let failures = IntCounterVec::new(
            opts!("naiserator_synthesis_errors_total", "synthesis errors",),
            &["kind", "instance", "error"],
        )
        .unwrap();
        let syntheses =
            IntCounter::new("naiserator_synthesis_total", "resource syntheses").unwrap();
        Metrics {
            syntheses,
            failures,
            synthesis_duration,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.synthesis_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.syntheses.clone()))?;
        Ok(self)
    }

    pub fn synthesis_failure(&self, kind: &str, source: &impl Source, e: &Error) {
        self.failures
            .with_label_values(&[
                kind,
                format!("{}/{}", source.namespace(), source.name()).as_ref(),
                e.metric_label(),
            ])
            .inc()
    }

    pub fn count_and_measure(&self, kind: &str) -> SynthesisMeasurer {
        self.syntheses.inc();
        SynthesisMeasurer {
            start: Instant::now(),
            metric: self.synthesis_duration.clone(),
            kind: kind.to_owned(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct SynthesisMeasurer {
    start: Instant,
    metric: HistogramVec,
    kind: String,
}

impl Drop for SynthesisMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric
            .with_label_values(&[self.kind.as_str()])
            .observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn measures_and_counts_failures() {
        let registry = Registry::new();
        let metrics = Metrics::default().register(&registry).unwrap();
        let app = testing::minimal_application();

        {
            let _timer = metrics.count_and_measure("Application");
        }
        metrics.synthesis_failure(
            "Application",
            &app,
            &Error::InvalidConfiguration("nope".into()),
        );

        assert_eq!(metrics.syntheses.get(), 1);
        assert_eq!(
            metrics
                .failures
                .with_label_values(&["Application", "mynamespace/myapplication", "InvalidConfiguration"])
                .get(),
            1
        );
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "naiserator_synthesis_duration_seconds"));
    }
}
