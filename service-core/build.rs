fn main() -> Result<(), Box<dyn std::error::Error>> {
    unsafe {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    // Tell cargo to recompile if any proto files change
    println!("cargo:rerun-if-changed=../proto/roofcrm/auth/v1/");

    // Compile auth service protos (client-side)
    tonic_build::configure()
        .build_server(false) // No server code in service-core
        .build_client(true) // Build clients for calling auth-service
        .compile_protos(&["../proto/roofcrm/auth/v1/auth.proto"], &["../proto"])?;

    Ok(())
}
