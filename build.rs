use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=GSTREAMER_1_0_ROOT_MSVC_X86_64");

    // Only the GStreamer backend links against system libraries.
    if env::var_os("CARGO_FEATURE_GSTREAMER").is_none() {
        return;
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "windows" {
        return;
    }

    if env::var_os("PKG_CONFIG_PATH").is_some() {
        return;
    }

    let gstreamer_root = match env::var("GSTREAMER_1_0_ROOT_MSVC_X86_64") {
        Ok(value) => value,
        Err(_) => {
            println!(
                "cargo:warning=PKG_CONFIG_PATH is not set. On Windows, install the GStreamer MSVC runtime and development packages and point PKG_CONFIG_PATH at its lib/pkgconfig directory."
            );
            return;
        }
    };

    let pkgconfig_dir = PathBuf::from(&gstreamer_root).join("lib").join("pkgconfig");

    if pkgconfig_dir.exists() {
        println!(
            "cargo:warning=Detected GStreamer at {}. Set PKG_CONFIG_PATH={} so gstreamer-sys can locate it.",
            gstreamer_root,
            pkgconfig_dir.display(),
        );
    } else {
        println!(
            "cargo:warning=GSTREAMER_1_0_ROOT_MSVC_X86_64 is set but no pkg-config files were found at {}.",
            pkgconfig_dir.display(),
        );
    }
}
