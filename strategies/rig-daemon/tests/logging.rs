use rig_daemon::{init_logging, Runtime, RuntimeError};

// Only one global subscriber can be installed per process
#[test]
fn test_logging_installs_once() {
    init_logging("info").unwrap();

    let error = init_logging("debug").unwrap_err();
    assert!(matches!(error, RuntimeError::Logging(_)));

    let error = Runtime::builder().logging("info").build().unwrap_err();
    assert!(matches!(error, RuntimeError::Logging(_)));
}
