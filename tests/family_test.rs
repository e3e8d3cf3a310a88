//! Model family classification as seen by callers.

use muninn::{ModelFamily, is_image_model};

#[test]
fn classify_known_models() {
    let cases = [
        ("claude-3-opus", ModelFamily::Claude),
        ("claude-sonnet-4-5-thinking", ModelFamily::Claude),
        ("CLAUDE-3-HAIKU", ModelFamily::Claude),
        ("gemini-2.5-pro", ModelFamily::Gemini),
        ("gemini-3-pro-high", ModelFamily::Gemini),
        ("gemini-3-pro-image", ModelFamily::GeminiImage),
        ("gemini-3-pro-image-4K", ModelFamily::GeminiImage),
        ("Gemini-3-Pro-Image-2k", ModelFamily::GeminiImage),
        ("gpt-4o", ModelFamily::Other),
        ("", ModelFamily::Other),
    ];
    for (model, expected) in cases {
        assert_eq!(ModelFamily::classify(model), expected, "{model}");
    }
}

#[test]
fn claude_is_checked_before_gemini() {
    assert_eq!(
        ModelFamily::classify("gemini-proxy-for-claude"),
        ModelFamily::Claude
    );
}

#[test]
fn image_marker_is_checked_before_gemini() {
    // Only the exact image variant gets its own family.
    assert_eq!(
        ModelFamily::classify("gemini-2.5-flash-image"),
        ModelFamily::Gemini
    );
    assert!(is_image_model("gemini-2.5-flash-image"));
}

#[test]
fn family_keys_round_trip_through_strings() {
    for family in ModelFamily::ALL {
        assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), family);
        assert_eq!(family.to_string(), family.as_str());
    }
    assert!("unknown".parse::<ModelFamily>().is_err());
}

#[test]
fn image_marker_reads_as_image_family() {
    assert_eq!(
        "gemini-3-pro-image".parse::<ModelFamily>().unwrap(),
        ModelFamily::GeminiImage
    );
    let family: ModelFamily = serde_json::from_str("\"gemini-3-pro-image\"").unwrap();
    assert_eq!(family, ModelFamily::GeminiImage);
}

#[test]
fn family_serializes_as_kebab_case() {
    let json = serde_json::to_string(&ModelFamily::GeminiImage).unwrap();
    assert_eq!(json, "\"gemini-image\"");
}
