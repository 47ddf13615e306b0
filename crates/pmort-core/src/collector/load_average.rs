//! Built-in collector recording the host's load averages.

use crate::collector::procfs::LoadSource;
use crate::collector::{CollectError, Collector};

/// Records `"load1, load5, load15"`.
pub struct LoadAverageCollector<L: LoadSource> {
    source: L,
}

impl<L: LoadSource> LoadAverageCollector<L> {
    pub fn new(source: L) -> Self {
        Self { source }
    }
}

impl<L: LoadSource> Collector for LoadAverageCollector<L> {
    fn name(&self) -> &str {
        "load_average"
    }

    fn collect(&self) -> Result<String, CollectError> {
        let load = self.source.load_average()?;
        Ok(format!("{}, {}, {}\n", load.load1, load.load5, load.load15))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::procfs::ProcLoadSource;

    #[test]
    fn test_load_average_text() {
        let collector = LoadAverageCollector::new(ProcLoadSource::new(MockFs::busy_system(), "/proc"));
        assert_eq!(collector.collect().unwrap(), "4.5, 3.2, 2.1\n");
    }

    #[test]
    fn test_load_average_missing_proc() {
        let collector = LoadAverageCollector::new(ProcLoadSource::new(MockFs::new(), "/proc"));
        assert!(matches!(collector.collect(), Err(CollectError::Load(_))));
    }
}
