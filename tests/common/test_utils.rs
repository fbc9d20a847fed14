use std::{cell::RefCell, sync::Once};

use hdri_viewer::data_structures::{instance::Instance, scene::SceneNode};

thread_local! {
    static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Collects log records per thread so tests running in parallel don't see each other.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Install the capturing logger and forget everything logged so far on this thread.
pub fn capture_logs() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger is installed in tests");
        log::set_max_level(log::LevelFilter::Trace);
    });
    RECORDS.with(|records| records.borrow_mut().clear());
}

/// Messages logged on this thread at exactly `level`.
pub fn logged(level: log::Level) -> Vec<String> {
    RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

/// Stand-in for a prefiltered environment map.
#[derive(Debug, PartialEq)]
pub struct FakeEnvironment(pub &'static str);

/// Stand-in for an uploaded model.
#[derive(Debug)]
pub struct FakeNode {
    pub name: String,
    local: Instance,
}

impl FakeNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            local: Instance::new(),
        }
    }
}

impl SceneNode for FakeNode {
    fn local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}
