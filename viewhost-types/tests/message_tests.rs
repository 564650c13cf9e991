use pretty_assertions::assert_eq;
use serde_json::json;
use viewhost_types::message::{ACTIVE_APPS, DEFAULT_INIT_MSG, GET_ACTIVE_APPS, LAUNCH_APP};
use viewhost_types::{ActiveAppsSnapshot, AppId, ApplicationDescriptor, LaunchRequest};

// ── Message names ─────────────────────────────────────────────────

#[test]
fn control_message_names() {
    assert_eq!(ACTIVE_APPS, "active_apps");
    assert_eq!(LAUNCH_APP, "launch_app");
    assert_eq!(GET_ACTIVE_APPS, "get_active_apps");
    assert_eq!(DEFAULT_INIT_MSG, "first-dummy-message");
}

// ── ApplicationDescriptor ─────────────────────────────────────────

#[test]
fn descriptor_decodes_wire_shape() {
    let d = ApplicationDescriptor::from_value(json!({
        "id": "a1",
        "html": "<p>hi</p>",
        "namespace": "/app/a1",
        "name": "Clock",
        "icon": "clock.png"
    }))
    .unwrap();
    assert_eq!(d.id.as_str(), "a1");
    assert_eq!(d.markup, "<p>hi</p>");
    assert_eq!(d.namespace.as_deref(), Some("/app/a1"));
    assert_eq!(d.display.get("name"), Some(&json!("Clock")));
    assert_eq!(d.display.get("icon"), Some(&json!("clock.png")));
    assert!(!d.display.contains_key("id"));
}

#[test]
fn descriptor_accepts_markup_alias() {
    let d = ApplicationDescriptor::from_value(json!({"id": "a1", "markup": "<b/>"})).unwrap();
    assert_eq!(d.markup, "<b/>");
}

#[test]
fn descriptor_requires_markup() {
    assert!(ApplicationDescriptor::from_value(json!({"id": "a1"})).is_err());
}

#[test]
fn descriptor_template_params_include_display() {
    let d = ApplicationDescriptor::new(AppId::new("a1").unwrap(), "<p/>")
        .with_namespace("/app/a1")
        .with_display("title", json!("Hello"));
    let params = d.template_params();
    assert_eq!(params["id"], json!("a1"));
    assert_eq!(params["html"], json!("<p/>"));
    assert_eq!(params["namespace"], json!("/app/a1"));
    assert_eq!(params["title"], json!("Hello"));
}

// ── ActiveAppsSnapshot ────────────────────────────────────────────

#[test]
fn snapshot_parses_apps_and_active_id() {
    let snap = ActiveAppsSnapshot::parse(&json!({
        "apps": [{"id": "a1", "html": "x"}, {"id": "a2", "html": "y"}],
        "activeAppId": "a2"
    }))
    .unwrap();
    assert_eq!(snap.apps.len(), 2);
    assert_eq!(snap.apps[0].id.as_str(), "a1");
    assert_eq!(snap.active_app_id, Some(AppId::new("a2").unwrap()));
    assert!(snap.is_complete());
}

#[test]
fn snapshot_rejects_non_object() {
    assert!(ActiveAppsSnapshot::parse(&json!([1, 2])).is_err());
    assert!(ActiveAppsSnapshot::parse(&json!("apps")).is_err());
}

#[test]
fn snapshot_rejects_missing_apps() {
    assert!(ActiveAppsSnapshot::parse(&json!({"activeAppId": "a1"})).is_err());
    assert!(ActiveAppsSnapshot::parse(&json!({"apps": {"id": "a1"}})).is_err());
}

#[test]
fn snapshot_skips_malformed_entries() {
    let snap = ActiveAppsSnapshot::parse(&json!({
        "apps": [{"id": "a1", "html": "x"}, {"html": "no id"}, 42, {"id": "", "html": "z"}],
        "activeAppId": "a1"
    }))
    .unwrap();
    assert_eq!(snap.apps.len(), 1);
    assert_eq!(snap.skipped.len(), 3);
    assert_eq!(snap.skipped[0].index, 1);
    assert_eq!(snap.skipped[1].index, 2);
    assert_eq!(snap.skipped[2].index, 3);
    assert!(!snap.is_complete());
}

#[test]
fn snapshot_active_id_missing_or_wrong_type() {
    let snap = ActiveAppsSnapshot::parse(&json!({"apps": []})).unwrap();
    assert_eq!(snap.active_app_id, None);
    let snap = ActiveAppsSnapshot::parse(&json!({"apps": [], "activeAppId": null})).unwrap();
    assert_eq!(snap.active_app_id, None);
    let snap = ActiveAppsSnapshot::parse(&json!({"apps": [], "activeAppId": 7})).unwrap();
    assert_eq!(snap.active_app_id, None);
}

// ── LaunchRequest ─────────────────────────────────────────────────

#[test]
fn launch_request_reads_app_id() {
    let req = LaunchRequest::parse(&json!({"appId": "a1", "reason": "user"}));
    assert_eq!(req.app_id, Some(AppId::new("a1").unwrap()));
    assert_eq!(req.extra.get("reason"), Some(&json!("user")));
    assert_eq!(req.notice(), "launching app a1.");
}

#[test]
fn launch_request_tolerates_anything() {
    let req = LaunchRequest::parse(&json!(null));
    assert_eq!(req.app_id, None);
    assert_eq!(req.notice(), "launching app.");
}
