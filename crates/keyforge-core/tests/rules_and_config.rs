// Keyforge Rules and Configuration Tests
//
// Rule validation through the public API and the settings file round trip.

mod common;

use std::time::Duration;

use common::ScriptedProvider;
use keyforge_core::{
    ui_channel, ForegroundGate, GateStatus, KeyCapture, KeyName, KeySource, RemapMode, RuleError,
    RuleRecord, RuleTable, Settings, UiEvent,
};

// =========================================================================
// Rule validation
// =========================================================================

#[test]
fn test_closing_a_cycle_is_rejected_and_table_unchanged() {
    let mut table = RuleTable::new();
    table.add("a", "b", RemapMode::Hold, true).unwrap();
    table.add("b", "c", RemapMode::Hold, true).unwrap();

    let err = table.add("c", "a", RemapMode::Hold, true).unwrap_err();
    match err {
        RuleError::Cycle(cycle) => {
            assert_eq!(cycle.to_string(), "Remap cycle detected: c -> a -> b -> c");
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
    assert_eq!(table.len(), 2);
    assert!(table.dispatch_handle().lookup("c").is_none());
}

#[test]
fn test_self_map_is_allowed() {
    let mut table = RuleTable::new();
    table.add("f5", "f5", RemapMode::Hold, true).unwrap();
    assert_eq!(table.enabled_count(), 1);
}

#[test]
fn test_swap_pair_is_a_cycle() {
    let mut table = RuleTable::new();
    table.add("a", "b", RemapMode::Toggle, true).unwrap();
    assert!(matches!(
        table.add("b", "a", RemapMode::Hold, true),
        Err(RuleError::Cycle(_))
    ));
}

#[test]
fn test_lookup_at_scale() {
    let mut table = RuleTable::new();
    for i in 0..500 {
        table
            .add(&format!("src{}", i), &format!("dst{}", i), RemapMode::Hold, true)
            .unwrap();
    }
    let handle = table.dispatch_handle();
    assert_eq!(handle.enabled_count(), 500);
    let rule = handle.lookup("src437").unwrap();
    assert_eq!(rule.target(), &KeyName::new("dst437"));
    assert!(handle.lookup("dst437").is_none());
}

#[test]
fn test_invalid_load_keeps_previous_rules() {
    let mut table = RuleTable::new();
    table.add("alt", "shift", RemapMode::Hold, true).unwrap();

    let bad = vec![
        RuleRecord::new("x", "y", RemapMode::Hold, true),
        RuleRecord::new("y", "x", RemapMode::Hold, true),
    ];
    assert!(table.load(&bad).is_err());
    assert_eq!(table.len(), 1);
    assert!(table.dispatch_handle().lookup("alt").is_some());
}

// =========================================================================
// Settings
// =========================================================================

#[test]
fn test_settings_rules_round_trip_through_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
enforce_app_focus = true
target_app_name = "Notepad"
theme = "dark"

[[rules]]
key_to_replace = "Caps Lock"
replacement_key = "Ctrl"

[[rules]]
key_to_replace = "f1"
replacement_key = "f2"
mode = "intercalar"
enabled = false
"#,
    )
    .unwrap();

    let mut settings = Settings::from_file(&path).unwrap();
    let table = RuleTable::from_records(settings.rules()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.enabled_count(), 1);
    assert_eq!(table.get(1).unwrap().mode(), RemapMode::Toggle);

    settings.set_rules(table.export());
    settings.save(&path).unwrap();

    let reloaded = Settings::from_file(&path).unwrap();
    let exported = reloaded.rules();
    assert_eq!(exported[0].key_to_replace, "caps lock");
    assert_eq!(exported[0].replacement_key, "ctrl");
    assert_eq!(exported[1].mode, RemapMode::Toggle);
    assert!(!exported[1].enabled);
    assert_eq!(reloaded.target_app_name(), "Notepad");
}

#[test]
fn test_settings_drive_gate() {
    let settings = Settings::from_toml(
        r#"
enforce_app_focus = true
target_app_name = "calc"
[gate]
cache_ttl_ms = 0
"#,
    )
    .unwrap();

    let provider = ScriptedProvider::default();
    provider.focus("Calculator");
    let gate = ForegroundGate::with_cache_ttl(Box::new(provider.clone()), settings.cache_ttl());
    gate.set_target_app(settings.target_app_name());
    gate.set_enforce_focus(settings.enforce_app_focus());

    assert!(gate.update_status());
    assert_eq!(gate.status(), GateStatus::Active);

    provider.focus("Untitled - Notepad");
    assert!(!gate.is_active_for_dispatch());
}

#[test]
fn test_open_window_listing_is_clean() {
    let provider = ScriptedProvider::default();
    provider.set_open_windows(&["Notepad", "", "calculator", "Notepad", "  "]);
    let gate = ForegroundGate::new(Box::new(provider));
    assert_eq!(gate.enumerate_open_windows(), vec!["calculator", "Notepad"]);
}

// =========================================================================
// Key capture
// =========================================================================

struct Scripted(Vec<&'static str>);

impl KeySource for Scripted {
    fn next_key_down(&mut self) -> Result<KeyName, keyforge_core::CaptureError> {
        self.0
            .pop()
            .map(KeyName::new)
            .ok_or_else(|| keyforge_core::CaptureError::Failed("no more keys".into()))
    }
}

#[test]
fn test_capture_reports_through_ui_channel() {
    let (notifier, inbox) = ui_channel(4);
    let capture = KeyCapture::new(notifier);

    assert!(capture.listen_for_next_key(|| Ok(Scripted(vec!["Page Up"]))));
    assert_eq!(
        inbox.recv_timeout(Duration::from_secs(2)),
        Some(UiEvent::KeyCaptured(Ok(KeyName::new("page up"))))
    );
}
