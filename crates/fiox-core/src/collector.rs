//! Prometheus collector over the snapshot store.
//!
//! One unlabeled gauge per schema field, named after the field. Fields
//! missing from the store are not exported at all, so a fresh process
//! exposes nothing until the first status line decodes.

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto;
use prometheus::Registry;

use fiox_common::schema::FIELDS;

use crate::store::SnapshotStore;

/// Exposes the latest fio snapshot as gauges.
pub struct FioCollector {
    store: Arc<SnapshotStore>,
    descs: Vec<(&'static str, Desc)>,
}

impl FioCollector {
    /// Build descriptors for every schema field.
    ///
    /// Field names double as metric names; a name prometheus rejects is a
    /// schema defect and fails startup.
    pub fn new(store: Arc<SnapshotStore>) -> Result<Self, prometheus::Error> {
        let mut descs = Vec::with_capacity(FIELDS.len());
        for name in FIELDS {
            let desc = Desc::new(
                name.to_string(),
                name.to_string(),
                Vec::new(),
                HashMap::new(),
            )?;
            descs.push((name, desc));
        }
        Ok(Self { store, descs })
    }
}

impl Collector for FioCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().map(|(_, desc)| desc).collect()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        // One snapshot per scrape keeps the exported set consistent
        let snapshot = self.store.snapshot();
        let mut families = Vec::with_capacity(snapshot.len());
        for (name, desc) in &self.descs {
            if let Some(value) = snapshot.get(name) {
                families.push(gauge_family(desc, *value));
            }
        }
        families
    }
}

fn gauge_family(desc: &Desc, value: f64) -> proto::MetricFamily {
    let mut gauge = proto::Gauge::default();
    gauge.set_value(value);

    let mut metric = proto::Metric::default();
    metric.set_gauge(gauge);

    let mut family = proto::MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(proto::MetricType::GAUGE);
    family.mut_metric().push(metric);
    family
}

/// Build the private registry with the fio collector registered.
pub fn build_registry(store: Arc<SnapshotStore>) -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();
    registry.register(Box::new(FioCollector::new(store)?))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiox_common::schema::FIELD_COUNT;
    use fiox_common::MetricMap;
    use prometheus::{Encoder, TextEncoder};

    fn render(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_descriptors_cover_schema() {
        let collector = FioCollector::new(Arc::new(SnapshotStore::new())).unwrap();
        assert_eq!(collector.desc().len(), FIELD_COUNT);
    }

    #[test]
    fn test_empty_store_exports_nothing() {
        let store = Arc::new(SnapshotStore::new());
        let collector = FioCollector::new(Arc::clone(&store)).unwrap();
        assert!(collector.collect().is_empty());

        let registry = build_registry(store).unwrap();
        assert_eq!(render(&registry), "");
    }

    #[test]
    fn test_present_fields_only() {
        let store = Arc::new(SnapshotStore::new());
        let mut metrics = MetricMap::new();
        metrics.insert("read_kb", 1024.0);
        metrics.insert("read_bandwidth", 2048.0);
        store.update(metrics);

        let collector = FioCollector::new(Arc::clone(&store)).unwrap();
        let families = collector.collect();
        assert_eq!(families.len(), 2);
        for family in &families {
            assert_eq!(family.get_field_type(), proto::MetricType::GAUGE);
            assert_eq!(family.get_metric().len(), 1);
            assert!(family.get_metric()[0].get_label().is_empty());
        }
    }

    #[test]
    fn test_rendered_exposition_format() {
        let store = Arc::new(SnapshotStore::new());
        let mut metrics = MetricMap::new();
        metrics.insert("read_kb", 1024.0);
        store.update(metrics);

        let registry = build_registry(store).unwrap();
        let output = render(&registry);
        assert!(output.contains("# HELP read_kb read_kb"));
        assert!(output.contains("# TYPE read_kb gauge"));
        assert!(output.contains("read_kb 1024"));
        assert!(!output.contains("write_kb"));
    }

    #[test]
    fn test_full_snapshot_exports_all_fields() {
        let store = Arc::new(SnapshotStore::new());
        let mut metrics = MetricMap::new();
        for name in FIELDS {
            metrics.insert(name, 1.5);
        }
        store.update(metrics);

        let collector = FioCollector::new(Arc::clone(&store)).unwrap();
        assert_eq!(collector.collect().len(), FIELD_COUNT);
    }

    #[test]
    fn test_collect_tracks_store_updates() {
        let store = Arc::new(SnapshotStore::new());
        let collector = FioCollector::new(Arc::clone(&store)).unwrap();

        let mut metrics = MetricMap::new();
        metrics.insert("error", 0.0);
        store.update(metrics);
        assert_eq!(collector.collect().len(), 1);

        let mut metrics = MetricMap::new();
        metrics.insert("error", 1.0);
        metrics.insert("cpu_user", 12.5);
        store.update(metrics);

        let families = collector.collect();
        assert_eq!(families.len(), 2);
        let error_family = families
            .iter()
            .find(|f| f.get_name() == "error")
            .unwrap();
        assert_eq!(error_family.get_metric()[0].get_gauge().get_value(), 1.0);
    }
}
