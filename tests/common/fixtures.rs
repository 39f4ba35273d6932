use std::path::PathBuf;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

/// Load an HTML fixture and substitute `{{key}}` placeholders
pub fn render_fixture(relative: &str, vars: &[(&str, &str)]) -> String {
    let mut content = load_fixture(relative);
    for (key, value) in vars {
        content = content.replace(&format!("{{{{{}}}}}", key), value);
    }
    content
}
