//! A provider fault degrades the feature to an empty result and leaves
//! exactly one warning behind.
//!
//! Kept in its own test binary because it installs the global logger.

mod helpers;

use std::sync::{Arc, Mutex, OnceLock};

use helpers::providers::{FailingProvider, StaticProvider};
use helpers::scenario::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{CodeLens, Range};
use utsushi::feature::{CodeLensItem, HostCodeLens};
use utsushi::{Collaborators, Settings, Utsushi};

struct CapturingLogger {
    records: Mutex<Vec<(Level, String, String)>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records.lock().unwrap().push((
            record.level(),
            record.target().to_string(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}

fn logger() -> &'static CapturingLogger {
    static LOGGER: OnceLock<&'static CapturingLogger> = OnceLock::new();
    LOGGER.get_or_init(|| {
        let logger: &'static CapturingLogger = Box::leak(Box::new(CapturingLogger {
            records: Mutex::new(Vec::new()),
        }));
        log::set_logger(logger).unwrap();
        log::set_max_level(LevelFilter::Trace);
        logger
    })
}

fn warnings() -> Vec<(String, String)> {
    logger()
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, target, _)| *level <= Level::Warn && target.starts_with("utsushi"))
        .map(|(_, target, message)| (target.clone(), message.clone()))
        .collect()
}

#[tokio::test]
async fn provider_fault_is_logged_once_and_yields_empty_result() {
    logger();
    let service = Utsushi::new(
        Settings::default(),
        Collaborators {
            open_documents: Arc::new(|_: &url::Url| false),
            code_lenses: StaticProvider::<CodeLens>::none(),
            references: Arc::new(FailingProvider),
            file_info: None,
        },
    );
    open_scenario(service.manager());
    let before = warnings().len();

    let resolved = service
        .resolve_code_lens(
            CodeLensItem::Host(HostCodeLens {
                host_uri: host_uri(),
                range: Range {
                    start: pos(11, 4),
                    end: pos(11, 5),
                },
                command: None,
                references: Vec::new(),
            }),
            &CancellationToken::new(),
        )
        .await;

    let Some(CodeLensItem::Host(lens)) = resolved else {
        panic!("host lens expected");
    };
    assert_eq!(lens.title(), Some(""));
    assert!(lens.references.is_empty());

    let new_warnings: Vec<_> = warnings().into_iter().skip(before).collect();
    assert_eq!(new_warnings.len(), 1, "got {new_warnings:?}");
    assert!(new_warnings[0].1.contains("analysis engine crashed"));
}
