use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Drop a settings template next to the build artifacts
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../live-segmenter.template.toml");

    let template = r#"# live-segmenter settings template
# Copy this file to 'live-segmenter.toml' and pass it with --config

# Read the transport stream from this file instead of stdin
# input = "/var/spool/live/feed.ts"

# "final-segment-only" or "every-segment"
trailer_policy = "final-segment-only"

# Bytes of input inspected for stream parameters before segmenting
probe_size = 5000000
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
