use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // 只在 Windows 目标上嵌入版本资源
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let mut res = winres::WindowsResource::new();
    res.set("ProductName", "Connection Manager")
        .set("FileDescription", "Connection Manager launcher")
        .set("ProductVersion", &version);
    let _ = res.compile();
}
