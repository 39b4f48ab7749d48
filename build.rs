fn main() -> Result<(), Box<dyn std::error::Error>> {
    // No system protoc in this environment; use the vendored binary.
    unsafe {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    tonic_prost_build::configure()
        .build_server(false)
        .compile_protos(&["proto/rfc.proto"], &["proto"])?;
    Ok(())
}
