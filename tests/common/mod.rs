use anyhow::Result;
use hostmetrics::sampler::{GaugeSource, MemoryUsage};
use hostmetrics::store::{GnocchiClient, MeasureStore};
use hostmetrics::test_utils::FakeGnocchi;
use std::sync::Arc;

/// A fake Gnocchi server and a real client talking to it
pub struct TestStore {
    pub server: FakeGnocchi,
    pub client: Arc<GnocchiClient>,
}

impl TestStore {
    pub async fn start() -> Result<Self> {
        let server = FakeGnocchi::start().await?;
        let client = Arc::new(GnocchiClient::new(server.settings())?);
        Ok(Self { server, client })
    }

    pub fn store(&self) -> Arc<dyn MeasureStore> {
        self.client.clone()
    }
}

/// Gauges always reading the same values
pub struct FixedGauges {
    pub cpu: f64,
    pub memory: MemoryUsage,
}

impl GaugeSource for FixedGauges {
    fn cpu_percent(&mut self) -> f64 {
        self.cpu
    }

    fn memory(&mut self) -> MemoryUsage {
        self.memory
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "Expected {}, got {}",
        expected,
        actual
    );
}
