//! Focus detector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_types::ObservationValue;

use super::{Detector, DetectorKind};
use crate::error::ProctorResult;
use crate::media::FocusSource;

/// Reports whether the hosting page has input focus.
pub struct FocusDetector {
    source: Arc<dyn FocusSource>,
    interval: Duration,
}

impl FocusDetector {
    pub fn new(source: Arc<dyn FocusSource>, interval: Duration) -> Self {
        Self { source, interval }
    }
}

#[async_trait]
impl Detector for FocusDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Focus
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn sample(&mut self) -> ProctorResult<Vec<ObservationValue>> {
        Ok(vec![ObservationValue::FocusState(self.source.has_focus())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToggleFocus;

    #[tokio::test]
    async fn test_reports_focus_changes() {
        let focus = Arc::new(ToggleFocus::new(true));
        let mut detector = FocusDetector::new(focus.clone(), Duration::from_secs(1));

        assert_eq!(
            detector.sample().await.unwrap(),
            vec![ObservationValue::FocusState(true)]
        );
        focus.set(false);
        assert_eq!(
            detector.sample().await.unwrap(),
            vec![ObservationValue::FocusState(false)]
        );
    }
}
