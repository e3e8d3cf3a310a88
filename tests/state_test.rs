//! Tests for building the state layer from configuration.

use std::sync::Arc;
use std::time::Duration;

use muninn::{Config, CredentialRecord, ManualClock, Muninn, SignaturePolicy, StateLayer};

#[test]
fn builder_lays_out_files_under_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("state");

    let state = Muninn::builder().data_dir(&root).build().unwrap();

    assert_eq!(state.data_dir(), root);
    assert_eq!(state.credentials().path(), root.join("accounts.json"));
    assert_eq!(state.cooldowns().path(), root.join("cooldowns.json"));
    assert_eq!(state.signatures().dir(), root.join("signatures"));
    // cooldown document is created eagerly
    assert!(root.join("cooldowns.json").exists());
}

#[test]
fn build_fails_when_data_dir_cannot_be_created() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();

    let result = Muninn::builder().data_dir(blocker.join("state")).build();
    assert!(result.is_err());
}

#[test]
fn from_config_applies_file_names_and_policy() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        r#"
        [storage]
        data_dir = "{}"
        credentials_file = "tokens.json"
        signatures_dir = "sigs"

        [credentials]
        cache_ttl_secs = 0

        [signatures]
        cache_tool_signatures = true
        "#,
        dir.path().display()
    );
    let config = Config::from_toml_str(&toml).unwrap();
    let state = StateLayer::from_config(&config).unwrap();

    assert_eq!(state.credentials().path(), dir.path().join("tokens.json"));
    assert_eq!(state.signatures().dir(), dir.path().join("sigs"));
    assert!(state.signature_policy().cache_tool_signatures);
    assert!(!state.signature_policy().cache_all);

    let opts = state.signature_options(true);
    assert!(opts.has_tools);
    assert_eq!(opts.policy, state.signature_policy());

    // zero TTL: external edits are visible at once
    state
        .credentials()
        .write_all(&[CredentialRecord::new("a")])
        .unwrap();
    muninn::CredentialRepository::new(state.credentials().path())
        .write_all(&[CredentialRecord::new("b")])
        .unwrap();
    assert_eq!(state.credentials().read_all()[0].refresh_token, "b");
}

#[test]
fn shared_clock_drives_cooldowns() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let state = Muninn::builder()
        .data_dir(dir.path())
        .clock(clock.clone())
        .credential_cache_ttl(Duration::from_secs(1))
        .build()
        .unwrap();

    state
        .cooldowns()
        .set_cooldown_for("acct", "claude-sonnet-4", Duration::from_secs(30));
    assert!(!state.cooldowns().is_available("acct", "claude-opus-4"));

    clock.advance_ms(30_000);
    assert!(state.cooldowns().is_available("acct", "claude-opus-4"));
}

#[test]
fn clones_share_components() {
    let dir = tempfile::tempdir().unwrap();
    let state = Muninn::builder()
        .data_dir(dir.path())
        .signature_policy(SignaturePolicy::new().cache_all(true))
        .build()
        .unwrap();
    let other = state.clone();

    let opts = state.signature_options(false);
    state.signatures().set_signature("claude-sonnet-4", "s1", "", &opts);
    assert_eq!(
        other
            .signatures()
            .get_signature("claude-sonnet-4", &opts)
            .unwrap()
            .signature,
        "s1"
    );
    assert!(Arc::ptr_eq(state.cooldowns(), other.cooldowns()));
}

#[test]
fn signatures_dir_equal_to_data_dir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    for signatures_dir in ["", "."] {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.storage.signatures_dir = signatures_dir.to_string();

        let err = StateLayer::from_config(&config).err().unwrap();
        assert!(matches!(err, muninn::MuninnError::Configuration(_)));
    }
}
