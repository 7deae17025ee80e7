/// Build script for DistBootstrap
///
/// # Shader Strategy:
/// - WGSL sources are embedded with `include_str!` and translated by the driver at runtime
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=src/renderer/shaders/cube.wgsl");
    println!("cargo:rerun-if-changed=src/renderer/shaders/triangle.wgsl");
}
